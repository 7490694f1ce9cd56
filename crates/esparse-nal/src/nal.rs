//! 扫描器输出的 NAL 单元.
//!
//! NAL 单元在这一层不区分编码类型, 类型标签由 [`crate::codec::Codec::nal_type`] 解析.

use bytes::Bytes;

/// 一个已去除起始码的 NAL 单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NalUnit {
    /// NAL 单元数据 (含 NAL 头部, 不含起始码和尾部零字节)
    pub data: Bytes,
    /// 起始码在输入流中的字节偏移
    pub offset: u64,
}

impl NalUnit {
    /// 创建 NAL 单元
    pub fn new(data: impl Into<Bytes>, offset: u64) -> Self {
        Self {
            data: data.into(),
            offset,
        }
    }

    /// 数据长度
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
