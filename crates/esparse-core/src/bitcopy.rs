//! 复制式比特读取器.
//!
//! 读取 RBSP 的同时把读到的位原样写入 [`BitWriter`], 用于重写参数集头部:
//! `copy_*` 读取并复制, `read_*` 只读取 (即在输出中丢弃该字段),
//! 需要改写的字段通过 [`BitCopier::writer_mut`] 直接写入新值.

use crate::bitreader::{BitReader, rbsp_stop_bit_position};
use crate::bitwriter::BitWriter;
use crate::{EsError, EsResult};

/// 复制式比特读取器
#[derive(Debug)]
pub struct BitCopier<'a> {
    reader: BitReader<'a>,
    writer: BitWriter,
}

impl<'a> BitCopier<'a> {
    /// 基于 RBSP 数据创建
    pub fn new(rbsp: &'a [u8]) -> Self {
        Self {
            reader: BitReader::new(rbsp),
            writer: BitWriter::with_capacity(rbsp.len() + 4),
        }
    }

    /// 只读取 1 位, 不写入输出
    pub fn read_bit(&mut self) -> EsResult<u32> {
        self.reader.read_bit()
    }

    /// 只读取 N 位, 不写入输出
    pub fn read_bits(&mut self, n: u32) -> EsResult<u32> {
        self.reader.read_bits(n)
    }

    /// 只读取 ue(v), 不写入输出
    pub fn read_ue(&mut self) -> EsResult<u32> {
        self.reader.read_ue()
    }

    /// 只读取 se(v), 不写入输出
    pub fn read_se(&mut self) -> EsResult<i32> {
        self.reader.read_se()
    }

    /// 读取并复制 1 位
    pub fn copy_bit(&mut self) -> EsResult<u32> {
        let bit = self.reader.read_bit()?;
        self.writer.write_bit(bit);
        Ok(bit)
    }

    /// 读取并复制 1 位标志
    pub fn copy_flag(&mut self) -> EsResult<bool> {
        Ok(self.copy_bit()? == 1)
    }

    /// 读取并复制 N 位 (最多 32 位)
    pub fn copy_bits(&mut self, n: u32) -> EsResult<u32> {
        let value = self.reader.read_bits(n)?;
        self.writer.write_bits(value, n);
        Ok(value)
    }

    /// 读取并复制 ue(v)
    ///
    /// Exp-Golomb 编码是唯一的, 重新编码得到的位与原始位一致.
    pub fn copy_ue(&mut self) -> EsResult<u32> {
        let value = self.reader.read_ue()?;
        self.writer.write_ue(value);
        Ok(value)
    }

    /// 读取并复制 se(v)
    pub fn copy_se(&mut self) -> EsResult<i32> {
        let value = self.reader.read_se()?;
        self.writer.write_se(value);
        Ok(value)
    }

    /// 访问输出写入器, 用于写入改写后的字段
    pub fn writer_mut(&mut self) -> &mut BitWriter {
        &mut self.writer
    }

    /// 访问底层读取器
    pub fn reader(&self) -> &BitReader<'a> {
        &self.reader
    }

    /// 复制剩余语法位直到 rbsp_stop_one_bit, 写入新的尾部位并返回输出 RBSP
    pub fn finish(mut self) -> EsResult<Vec<u8>> {
        let stop = rbsp_stop_bit_position(self.reader.data())
            .ok_or_else(|| EsError::InvalidData("RBSP 缺少停止位".into()))?;
        let pos = self.reader.bits_read();
        if pos > stop {
            return Err(EsError::InvalidData(format!(
                "读取位置 {} 越过 RBSP 停止位 {}",
                pos, stop,
            )));
        }

        let mut remaining = stop - pos;
        while remaining > 0 {
            let n = remaining.min(32) as u32;
            self.copy_bits(n)?;
            remaining -= n as usize;
        }
        self.writer.write_rbsp_trailing_bits();
        Ok(self.writer.finish())
    }
}
