//! 长度前缀 NALU 编码.
//!
//! 输出帧和配置记录中的 NALU 使用 1-4 字节大端长度前缀 (AVCC/HVCC 风格), 代替 Annex B 起始码.

use esparse_core::{EsError, EsResult};

/// 能容纳 `size` 的最小前缀宽度
pub fn required_size_length(size: usize) -> usize {
    match size {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// 将 `size` 编码为 `length` 字节的大端字段并追加到 `out`
///
/// `size` 超出字段范围时返回 [`EsError::NaluSizeTooSmall`], 携带最小可用宽度.
pub fn write_nalu_size(out: &mut Vec<u8>, size: usize, length: usize) -> EsResult<()> {
    if !(1..=4).contains(&length) {
        return Err(EsError::InvalidArgument(format!(
            "NALU 长度前缀宽度必须为 1-4, 实际为 {}",
            length
        )));
    }
    let required = required_size_length(size);
    if required > length || size > u32::MAX as usize {
        return Err(EsError::NaluSizeTooSmall {
            required_length: required,
        });
    }
    write_size_unchecked(out, size, length);
    Ok(())
}

/// 截断写入: 只保留 `size` 的低 `length` 字节
pub(crate) fn write_size_unchecked(out: &mut Vec<u8>, size: usize, length: usize) {
    let bytes = (size as u32).to_be_bytes();
    out.extend_from_slice(&bytes[4 - length..]);
}

/// 从 `data` 开头读取 `length` 字节的大端长度
pub fn read_nalu_size(data: &[u8], length: usize) -> EsResult<usize> {
    if !(1..=4).contains(&length) {
        return Err(EsError::InvalidArgument(format!(
            "NALU 长度前缀宽度必须为 1-4, 实际为 {}",
            length
        )));
    }
    if data.len() < length {
        return Err(EsError::Eof);
    }
    Ok(data[..length]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize))
}

/// 追加一个带长度前缀的 NALU
pub fn write_size_prefixed(out: &mut Vec<u8>, nalu: &[u8], length: usize) -> EsResult<()> {
    write_nalu_size(out, nalu.len(), length)?;
    out.extend_from_slice(nalu);
    Ok(())
}

/// 将长度前缀数据拆分为 NALU 列表
pub fn split_size_prefixed(data: &[u8], length: usize) -> EsResult<Vec<&[u8]>> {
    let mut units = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let size = read_nalu_size(&data[pos..], length)?;
        pos += length;
        if pos + size > data.len() {
            return Err(EsError::InvalidData(format!(
                "长度前缀 NALU 截断: 声明 {} 字节, 剩余 {} 字节",
                size,
                data.len() - pos
            )));
        }
        units.push(&data[pos..pos + size]);
        pos += size;
    }
    Ok(units)
}

/// 追加 2 字节长度前缀的 NALU (配置记录使用)
pub(crate) fn write_u16_prefixed(out: &mut Vec<u8>, nalu: &[u8]) -> EsResult<()> {
    write_size_prefixed(out, nalu, 2)
}

/// 配置记录读取游标
pub(crate) struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn u8(&mut self) -> EsResult<u8> {
        let b = *self.data.get(self.pos).ok_or(EsError::Eof)?;
        self.pos += 1;
        Ok(b)
    }

    pub(crate) fn u16(&mut self) -> EsResult<u16> {
        Ok(u16::from(self.u8()?) << 8 | u16::from(self.u8()?))
    }

    pub(crate) fn bytes(&mut self, n: usize) -> EsResult<&'a [u8]> {
        let end = self.pos + n;
        let slice = self.data.get(self.pos..end).ok_or(EsError::Eof)?;
        self.pos = end;
        Ok(slice)
    }

    /// 读取 {u16 长度, 数据}
    pub(crate) fn u16_prefixed(&mut self) -> EsResult<Vec<u8>> {
        let len = self.u16()? as usize;
        Ok(self.bytes(len)?.to_vec())
    }
}
