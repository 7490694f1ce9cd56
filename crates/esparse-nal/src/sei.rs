//! SEI 消息检查.
//!
//! 只关心是否包含恢复点 (recovery point, payloadType 6): 它标记一个可以作为随机访问点的非 IDR 图像.

use esparse_core::{BitReader, EsResult};

/// recovery_point SEI 的 payloadType
pub const SEI_RECOVERY_POINT: u32 = 6;

/// 读取 ff_byte 累加编码的值 (payloadType / payloadSize)
fn read_sei_value(br: &mut BitReader<'_>) -> EsResult<u32> {
    let mut value = 0u32;
    loop {
        let byte = br.read_bits(8)?;
        value = value.saturating_add(byte);
        if byte != 0xFF {
            return Ok(value);
        }
    }
}

/// 逐条遍历 SEI RBSP (不含 NAL 头部) 中的消息, 对每个 payloadType 调用 `visit`
///
/// `visit` 返回 true 时立即停止, 不再读取该消息的负载. 返回值表示是否提前停止.
fn walk_messages(rbsp: &[u8], mut visit: impl FnMut(u32) -> bool) -> EsResult<bool> {
    let mut br = BitReader::new(rbsp);
    while br.more_rbsp_data() {
        let payload_type = read_sei_value(&mut br)?;
        if visit(payload_type) {
            return Ok(true);
        }
        let payload_size = read_sei_value(&mut br)?;
        br.skip_bits(payload_size.saturating_mul(8))?;
    }
    Ok(false)
}

/// 列出所有消息的 payloadType
///
/// 数据被截断时返回 [`esparse_core::EsError::Eof`].
pub fn payload_types(rbsp: &[u8]) -> EsResult<Vec<u32>> {
    let mut types = Vec::new();
    walk_messages(rbsp, |t| {
        types.push(t);
        false
    })?;
    Ok(types)
}

/// SEI RBSP 中是否包含恢复点消息
///
/// 一旦读到恢复点的 payloadType 即返回, 之后的截断不影响结果.
pub fn has_recovery_point(rbsp: &[u8]) -> EsResult<bool> {
    walk_messages(rbsp, |t| t == SEI_RECOVERY_POINT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use esparse_core::tolerate_eof;

    #[test]
    fn test_recovery_point_detected() {
        // user_data_unregistered(5, 2 字节) + recovery_point(6, 1 字节) + 停止位
        let rbsp = [0x05, 0x02, 0xAA, 0xBB, 0x06, 0x01, 0x84, 0x80];
        assert_eq!(payload_types(&rbsp).unwrap(), vec![5, 6]);
        assert!(has_recovery_point(&rbsp).unwrap());
    }

    #[test]
    fn test_ff_extended_type() {
        // payloadType = 255 + 1 = 256
        let rbsp = [0xFF, 0x01, 0x00, 0x80];
        assert_eq!(payload_types(&rbsp).unwrap(), vec![256]);
    }

    #[test]
    fn test_truncated_is_eof() {
        // user_data_unregistered 声明 16 字节负载, 实际只有 1 字节
        let rbsp = [0x05, 0x10, 0xAA];
        assert!(payload_types(&rbsp).unwrap_err().is_eof());
        assert!(has_recovery_point(&rbsp).unwrap_err().is_eof());
        assert_eq!(tolerate_eof(has_recovery_point(&rbsp)).unwrap(), None);
    }

    #[test]
    fn test_recovery_point_before_truncated_message() {
        let rbsp = [0x06, 0x01, 0x84, 0x05, 0x10, 0xAA, 0x80];
        assert!(payload_types(&rbsp).unwrap_err().is_eof());
        assert_eq!(
            tolerate_eof(has_recovery_point(&rbsp)).unwrap(),
            Some(true),
            "截断发生在恢复点之后, 恢复点仍应生效"
        );
    }
}
