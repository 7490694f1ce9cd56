//! 防竞争字节 (emulation prevention) 处理.
//!
//! NAL 载荷中不能出现 `00 00 00`/`00 00 01`/`00 00 02`, 编码器在 `00 00` 之后插入 `03` 避免伪起始码.
//! 解析头部前需要去除这些字节得到 RBSP, 重写参数集后再插回.

/// NALU → RBSP: 将每个 `00 00 03` 替换为 `00 00`
pub fn nalu_to_rbsp(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 3 {
            out.extend_from_slice(&[0, 0]);
            i += 3;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}

/// RBSP → NALU: 在 `00 00` 之后、下一字节 ≤ 3 时插入 `03`
pub fn rbsp_to_nalu(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 64 + 1);
    let mut i = 0;
    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0 && data[i + 1] == 0 && data[i + 2] <= 3 {
            out.extend_from_slice(&[0, 0, 3]);
            i += 2;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}

/// 取 NALU 开头部分转换为 RBSP, 用于只需要头部字段的场景 (slice header)
pub fn nalu_prefix_to_rbsp(data: &[u8], max_len: usize) -> Vec<u8> {
    nalu_to_rbsp(&data[..data.len().min(max_len)])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 枚举字母表 {0, 1, 3, 4} 上长度不超过 `max_len` 的所有序列
    fn all_sequences(max_len: usize) -> Vec<Vec<u8>> {
        let alphabet = [0u8, 1, 3, 4];
        let mut result = vec![Vec::new()];
        let mut layer = vec![Vec::new()];
        for _ in 0..max_len {
            let mut next = Vec::new();
            for seq in &layer {
                for &b in &alphabet {
                    let mut s: Vec<u8> = seq.clone();
                    s.push(b);
                    next.push(s);
                }
            }
            result.extend(next.iter().cloned());
            layer = next;
        }
        result
    }

    #[test]
    fn test_nalu_to_rbsp_basic() {
        let nalu = [0x67, 0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x03, 0x00];
        assert_eq!(
            nalu_to_rbsp(&nalu),
            vec![0x67, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_rbsp_to_nalu_basic() {
        let rbsp = [0x67, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x05];
        assert_eq!(
            rbsp_to_nalu(&rbsp),
            vec![0x67, 0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x03, 0x00, 0x05]
        );
    }

    #[test]
    fn test_roundtrip_all_short_sequences() {
        for rbsp in all_sequences(6) {
            let nalu = rbsp_to_nalu(&rbsp);
            assert_eq!(nalu_to_rbsp(&nalu), rbsp, "往返失败: {:?}", rbsp);
            assert_eq!(rbsp_to_nalu(&nalu_to_rbsp(&nalu)), nalu, "合法 NALU 往返失败: {:?}", nalu);
            for w in nalu.windows(3) {
                assert!(
                    !(w[0] == 0 && w[1] == 0 && w[2] <= 2),
                    "输出中出现伪起始码: {:?}",
                    nalu
                );
            }
        }
    }

    #[test]
    fn test_prefix() {
        let nalu = [0x41, 0x9A, 0x00, 0x00, 0x03, 0x02, 0xFF];
        assert_eq!(nalu_prefix_to_rbsp(&nalu, 5), vec![0x41, 0x9A, 0x00, 0x00]);
        assert_eq!(nalu_prefix_to_rbsp(&nalu, 100).len(), 6);
    }
}
