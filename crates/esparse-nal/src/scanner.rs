//! Annex B 起始码扫描器.
//!
//! Annex B 使用起始码分隔 NAL 单元:
//! - 3 字节起始码: `00 00 01`
//! - 4 字节起始码: `00 00 00 01`
//!
//! 输入可以按任意边界分块送入, 扫描器在两次调用之间保留尚未闭合的尾部数据.
//! 一个 NAL 单元在下一个起始码出现时才能确定结束位置, 流末尾的最后一个单元由 [`ByteStreamScanner::flush`] 输出.

use bytes::{Buf, BytesMut};

use crate::nal::NalUnit;

/// flush 时尾部数据 (含起始码) 的最小长度
const MIN_FLUSH_LEN: usize = 5;

/// 分块 Annex B 字节流扫描器
#[derive(Debug, Default)]
pub struct ByteStreamScanner {
    /// 保留的尾部数据; 找到起始码后总是从起始码开始
    tail: BytesMut,
    /// tail[0] 在输入流中的偏移
    tail_offset: u64,
    /// 下一次搜索的起点 (tail 内索引), 之前的位置均已检查
    scan_pos: usize,
    /// tail 开头起始码的长度, 0 表示尚未找到起始码
    marker_size: usize,
    /// 已送入的总字节数
    stream_position: u64,
}

impl ByteStreamScanner {
    /// 创建扫描器
    pub fn new() -> Self {
        Self::default()
    }

    /// 已送入的总字节数
    pub fn stream_position(&self) -> u64 {
        self.stream_position
    }

    /// 当前保留的尾部字节数
    pub fn retained_len(&self) -> usize {
        self.tail.len()
    }

    /// 送入一块数据, 返回其中已闭合的 NAL 单元
    pub fn add_bytes(&mut self, data: &[u8]) -> Vec<NalUnit> {
        let mut out = Vec::new();
        if data.is_empty() {
            return out;
        }
        self.tail.extend_from_slice(data);
        self.stream_position += data.len() as u64;

        let mut i = self.scan_pos;
        while i + 3 <= self.tail.len() {
            let b2 = self.tail[i + 2];
            if b2 > 1 {
                // i, i+1, i+2 处都不可能开始起始码
                i += 3;
                continue;
            }
            if b2 != 1 || self.tail[i] != 0 || self.tail[i + 1] != 0 {
                i += 1;
                continue;
            }

            // 前一个字节为 0 且不属于上一个起始码时, 视为 4 字节起始码
            let (start, size) = if i > self.marker_size && self.tail[i - 1] == 0 {
                (i - 1, 4)
            } else {
                (i, 3)
            };

            self.close_unit(start, &mut out);
            self.marker_size = size;
            i = i - start + 3;
        }
        self.scan_pos = i;

        if self.marker_size == 0 {
            // 尚无起始码: 只保留可能构成起始码前缀的字节
            let keep_from = self.scan_pos.saturating_sub(1);
            self.discard_front(keep_from);
        }

        out
    }

    /// 流结束: 输出保留的最后一个 NAL 单元
    pub fn flush(&mut self) -> Option<NalUnit> {
        let unit = if self.marker_size > 0 && self.tail.len() >= MIN_FLUSH_LEN {
            let chunk = self.tail.split().freeze();
            let end = trimmed_end(&chunk, self.marker_size);
            (end > self.marker_size)
                .then(|| NalUnit::new(chunk.slice(self.marker_size..end), self.tail_offset))
        } else {
            None
        };

        self.tail_offset = self.stream_position;
        self.tail.clear();
        self.scan_pos = 0;
        self.marker_size = 0;
        unit
    }

    /// 在 `start` 处出现新起始码: 输出前一个单元并丢弃其数据
    fn close_unit(&mut self, start: usize, out: &mut Vec<NalUnit>) {
        if self.marker_size == 0 {
            // 第一个起始码之前的数据不属于任何 NAL 单元
            self.discard_front(start);
            return;
        }

        let offset = self.tail_offset;
        let chunk = self.tail.split_to(start).freeze();
        self.tail_offset += start as u64;
        let end = trimmed_end(&chunk, self.marker_size);
        if end > self.marker_size {
            out.push(NalUnit::new(chunk.slice(self.marker_size..end), offset));
        }
    }

    fn discard_front(&mut self, n: usize) {
        self.tail.advance(n);
        self.tail_offset += n as u64;
        self.scan_pos = self.scan_pos.saturating_sub(n);
    }
}

/// 去除尾部零字节 (trailing_zero_8bits) 后的结束位置, 不小于 `min`
fn trimmed_end(data: &[u8], min: usize) -> usize {
    let mut end = data.len();
    while end > min && data[end - 1] == 0 {
        end -= 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(chunks: &[&[u8]]) -> Vec<NalUnit> {
        let mut scanner = ByteStreamScanner::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(scanner.add_bytes(chunk));
        }
        out.extend(scanner.flush());
        out
    }

    #[test]
    fn test_split_mixed_start_codes() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1E, // 4 字节起始码 + SPS
            0x00, 0x00, 0x01, 0x68, 0xCE, 0x38, 0x80, // 3 字节起始码 + PPS
            0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x00, // IDR
        ];
        let units = scan_all(&[&data]);
        assert_eq!(units.len(), 3, "应分割出 3 个 NAL");
        assert_eq!(&units[0].data[..], &[0x67, 0x42, 0x00, 0x1E]);
        assert_eq!(units[0].offset, 0);
        assert_eq!(&units[1].data[..], &[0x68, 0xCE, 0x38, 0x80]);
        assert_eq!(units[1].offset, 8);
        assert_eq!(&units[2].data[..], &[0x65, 0x88, 0x84], "尾部零字节应去除");
        assert_eq!(units[2].offset, 15);
    }

    #[test]
    fn test_leading_garbage_dropped() {
        let data = [0xAA, 0xBB, 0x00, 0x00, 0x01, 0x09, 0xF0, 0x00, 0x00, 0x01, 0x41];
        let units = scan_all(&[&data]);
        assert_eq!(units.len(), 1, "末尾单元不足 5 字节, flush 不输出");
        assert_eq!(&units[0].data[..], &[0x09, 0xF0]);
        assert_eq!(units[0].offset, 2);
    }

    #[test]
    fn test_chunking_independent() {
        let data: Vec<u8> = [
            &[0x00, 0x00, 0x00, 0x01, 0x67, 0x64, 0x00, 0x1F, 0xAC][..],
            &[0x00, 0x00, 0x01, 0x68, 0xEB, 0xE3, 0xCB],
            &[0x00, 0x00, 0x00, 0x00, 0x01, 0x06, 0x05, 0x01, 0x80],
            &[0x00, 0x00, 0x01, 0x65, 0x88, 0x80, 0x40, 0x00, 0x00, 0x03, 0x01],
        ]
        .concat();

        let whole = scan_all(&[&data]);
        let bytes: Vec<&[u8]> = data.chunks(1).collect();
        let byte_by_byte = scan_all(&bytes);
        assert_eq!(whole, byte_by_byte, "逐字节输入与整块输入的结果应一致");

        for split in 1..data.len() {
            let (a, b) = data.split_at(split);
            assert_eq!(scan_all(&[a, b]), whole, "在 {} 处切分结果不一致", split);
        }
        assert_eq!(whole.len(), 4);
        assert_eq!(whole[2].offset, 17, "多余的零字节归入前一个单元的尾部");
    }

    #[test]
    fn test_stream_position_and_retention() {
        let mut scanner = ByteStreamScanner::new();
        assert!(scanner.add_bytes(&[0x11; 100]).is_empty());
        assert_eq!(scanner.stream_position(), 100);
        assert!(scanner.retained_len() <= 3, "无起始码时只保留少量尾部字节");
        assert!(scanner.flush().is_none());
    }
}
