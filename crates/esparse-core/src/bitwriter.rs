//! RBSP 比特写入, 与 [`BitReader`](crate::bitreader::BitReader) 对应.
//!
//! 用于重写 SPS 以及构造合成码流.

/// 大端位序 (MSB first) 的比特写入器
///
/// ```
/// use esparse_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_ue(0);
/// bw.write_rbsp_trailing_bits();
/// assert_eq!(bw.finish(), vec![0b1011_1100]);
/// ```
#[derive(Debug, Default)]
pub struct BitWriter {
    out: Vec<u8>,
    /// 尚未凑满一个字节的位, 右对齐
    pending: u32,
    /// `pending` 中的有效位数 (0..8)
    pending_len: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预分配 `capacity` 字节
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            out: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn write_bit(&mut self, bit: u32) {
        self.write_bits(bit & 1, 1);
    }

    pub fn write_flag(&mut self, flag: bool) {
        self.write_bits(u32::from(flag), 1);
    }

    /// 写入 `value` 的低 `n` 位 (0..=32), 高位在前
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "一次最多写入 32 位, 请求 {} 位", n);
        let mut left = n.min(32);
        while left > 0 {
            let take = left.min(8 - self.pending_len);
            let chunk = (u64::from(value) >> (left - take)) & ((1 << take) - 1);
            self.pending = (self.pending << take) | chunk as u32;
            self.pending_len += take;
            left -= take;
            if self.pending_len == 8 {
                self.out.push(self.pending as u8);
                self.pending = 0;
                self.pending_len = 0;
            }
        }
    }

    /// ue(v): 写入 value+1 的二进制, 前面补 (位宽-1) 个 0
    pub fn write_ue(&mut self, value: u32) {
        let code = u64::from(value) + 1;
        let width = 64 - code.leading_zeros();
        self.write_bits(0, width - 1);
        if width > 32 {
            // 仅 value == u32::MAX 时出现, 高位是单独的 1
            self.write_bits(1, width - 32);
        }
        self.write_bits(code as u32, width.min(32));
    }

    /// se(v): 正数映射为 2v-1, 非正数映射为 -2v
    pub fn write_se(&mut self, value: i32) {
        let v = i64::from(value);
        let code = if v > 0 { 2 * v - 1 } else { -2 * v };
        self.write_ue(code as u32);
    }

    /// 原样写入字节, 允许未对齐
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.pending_len == 0 {
            self.out.extend_from_slice(bytes);
        } else {
            bytes.iter().for_each(|&b| self.write_bits(u32::from(b), 8));
        }
    }

    /// rbsp_trailing_bits(): 停止位 1 加对齐零
    pub fn write_rbsp_trailing_bits(&mut self) {
        self.write_bits(1, 1);
        self.pad_to_byte();
    }

    fn pad_to_byte(&mut self) {
        if self.pending_len > 0 {
            self.write_bits(0, 8 - self.pending_len);
        }
    }

    /// 补零到字节边界并返回缓冲区
    pub fn finish(mut self) -> Vec<u8> {
        self.pad_to_byte();
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitReader;

    #[test]
    fn test_write_bits_straddles_bytes() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b101, 3);
        bw.write_bits(0xFF00_FF00, 32);
        bw.write_bits(0, 0);
        let data = bw.finish();
        assert_eq!(data, vec![0b1011_1111, 0b1110_0000, 0b0001_1111, 0b1110_0000, 0]);
    }

    #[test]
    fn test_write_ue_reference_vectors() {
        let mut bw = BitWriter::new();
        (0..5).for_each(|v| bw.write_ue(v));
        // 1 | 010 | 011 | 00100 | 00101
        assert_eq!(bw.finish(), vec![0b1010_0110, 0b0100_0010, 0b1000_0000]);
    }

    #[test]
    fn test_exp_golomb_read_back() {
        let unsigned = [0u32, 7, 8, 65535, 1 << 20, u32::MAX - 1];
        let signed = [0i32, -1, 1000, -1000, i32::MAX, -i32::MAX];

        let mut bw = BitWriter::with_capacity(32);
        unsigned.iter().for_each(|&v| bw.write_ue(v));
        signed.iter().for_each(|&v| bw.write_se(v));
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        for &v in &unsigned {
            assert_eq!(br.read_ue().unwrap(), v, "ue(v) 读回不一致: {}", v);
        }
        for &v in &signed {
            assert_eq!(br.read_se().unwrap(), v, "se(v) 读回不一致: {}", v);
        }
        assert!(!br.more_rbsp_data(), "尾部应只剩停止位");
    }

    #[test]
    fn test_rbsp_trailing_bits() {
        let mut bw = BitWriter::new();
        bw.write_flag(true);
        bw.write_flag(true);
        bw.write_rbsp_trailing_bits();
        assert_eq!(bw.finish(), vec![0b1110_0000]);

        // 已对齐时停止位独占一个字节
        let mut bw = BitWriter::new();
        bw.write_bytes(&[0x42]);
        bw.write_rbsp_trailing_bits();
        assert_eq!(bw.finish(), vec![0x42, 0x80]);
    }

    #[test]
    fn test_write_bytes_unaligned() {
        let mut bw = BitWriter::new();
        bw.write_bit(1);
        bw.write_bytes(&[0xFF, 0x00]);
        assert_eq!(bw.finish(), vec![0xFF, 0x80, 0x00]);
    }
}
