//! RBSP 比特读取.
//!
//! 大端位序 (MSB first), 支持 H.264/H.265 头部使用的 ue(v)/se(v).

use crate::{EsError, EsResult};

/// ue(v) 允许的最大前导零个数, 超过即视为损坏
const MAX_EXP_GOLOMB_ZEROS: u32 = 31;

/// RBSP 比特读取器
///
/// 内部只记录一个绝对位游标. 越过缓冲区末尾的读取返回 [`EsError::Eof`],
/// 失败的读取不移动游标.
///
/// ```
/// use esparse_core::bitreader::BitReader;
///
/// let rbsp = [0b1011_0001, 0b0101_0101];
/// let mut br = BitReader::new(&rbsp);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// // 0001 010 -> 2^3 - 1 + 2
/// assert_eq!(br.read_ue().unwrap(), 9);
/// assert_eq!(br.bits_left(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// 底层缓冲区
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// 已消耗的位数
    pub fn bits_read(&self) -> usize {
        self.pos
    }

    /// 剩余位数
    pub fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    fn ensure(&self, n: usize) -> EsResult<()> {
        if n > self.bits_left() {
            Err(EsError::Eof)
        } else {
            Ok(())
        }
    }

    pub fn read_bit(&mut self) -> EsResult<u32> {
        self.ensure(1)?;
        let byte = self.data[self.pos >> 3];
        let bit = (byte >> (7 - (self.pos & 7))) & 1;
        self.pos += 1;
        Ok(u32::from(bit))
    }

    pub fn read_flag(&mut self) -> EsResult<bool> {
        self.read_bit().map(|b| b != 0)
    }

    /// 读取 `n` 位 (0..=32), 结果右对齐
    pub fn read_bits(&mut self, n: u32) -> EsResult<u32> {
        if n > 32 {
            return Err(EsError::InvalidArgument(format!(
                "一次最多读取 32 位, 请求 {} 位",
                n
            )));
        }
        self.ensure(n as usize)?;
        let mut value = 0u64;
        let mut left = n as usize;
        while left > 0 {
            let offset = self.pos & 7;
            let take = left.min(8 - offset);
            let byte = u64::from(self.data[self.pos >> 3]);
            let chunk = (byte >> (8 - offset - take)) & ((1 << take) - 1);
            value = (value << take) | chunk;
            self.pos += take;
            left -= take;
        }
        Ok(value as u32)
    }

    pub fn skip_bits(&mut self, n: u32) -> EsResult<()> {
        self.ensure(n as usize)?;
        self.pos += n as usize;
        Ok(())
    }

    /// ue(v): k 个前导零, 一个 1, 再 k 位后缀; 值为 2^k - 1 + 后缀
    pub fn read_ue(&mut self) -> EsResult<u32> {
        let start = self.pos;
        let mut zeros = 0u32;
        loop {
            match self.read_bit() {
                Ok(1) => break,
                Ok(_) => zeros += 1,
                Err(e) => {
                    self.pos = start;
                    return Err(e);
                }
            }
            if zeros > MAX_EXP_GOLOMB_ZEROS {
                self.pos = start;
                return Err(EsError::InvalidData("Exp-Golomb 前导零过多".into()));
            }
        }
        match self.read_bits(zeros) {
            Ok(suffix) => Ok(((1u64 << zeros) - 1 + u64::from(suffix)) as u32),
            Err(e) => {
                self.pos = start;
                Err(e)
            }
        }
    }

    /// se(v): 码值 k 映射为 (-1)^(k+1) * ceil(k/2)
    pub fn read_se(&mut self) -> EsResult<i32> {
        let k = i64::from(self.read_ue()?);
        let magnitude = (k + 1) / 2;
        let value = if k % 2 == 0 { -magnitude } else { magnitude };
        Ok(value as i32)
    }

    /// more_rbsp_data(): 游标是否仍在 rbsp_stop_one_bit 之前
    pub fn more_rbsp_data(&self) -> bool {
        rbsp_stop_bit_position(self.data).is_some_and(|stop| self.pos < stop)
    }
}

/// rbsp_stop_one_bit 的绝对位位置; 全零缓冲区返回 None
pub fn rbsp_stop_bit_position(data: &[u8]) -> Option<usize> {
    let last = data.iter().rposition(|&b| b != 0)?;
    Some(last * 8 + 7 - data[last].trailing_zeros() as usize)
}
