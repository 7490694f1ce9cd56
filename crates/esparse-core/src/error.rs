//! 统一错误类型定义.
//!
//! 所有 esparse crate 共用的错误类型, 支持跨模块传播.
//!
//! 码流解析中的错误分两类:
//! - 可恢复的解析失败 (`InvalidData`, `Eof`): 调用方丢弃当前 NAL 单元后继续.
//! - 内部计数不一致 (`Internal`): 作为错误向上传播, 不终止进程.

use thiserror::Error;

/// esparse 统一错误类型
#[derive(Debug, Error)]
pub enum EsError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的特性
    #[error("不支持的特性: {0}")]
    Unsupported(String),

    /// 无效数据 (损坏的码流, 未解析的参数集 id 等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 比特读取越过缓冲区末尾
    #[error("已到达数据末尾")]
    Eof,

    /// NALU 长度超出长度前缀宽度
    #[error("NALU 长度前缀过短, 至少需要 {required_length} 字节")]
    NaluSizeTooSmall {
        /// 能容纳该长度的最小前缀宽度
        required_length: usize,
    },

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl EsError {
    /// 是否为数据末尾错误
    pub fn is_eof(&self) -> bool {
        matches!(self, EsError::Eof)
    }
}

/// esparse 统一 Result 类型
pub type EsResult<T> = Result<T, EsError>;

/// 将数据末尾错误转换为 `Ok(None)`, 其余错误原样传播.
///
/// 用于推测性解析 (SEI 检查等): 数据被截断时视为"没有更多信息".
pub fn tolerate_eof<T>(res: EsResult<T>) -> EsResult<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(EsError::Eof) => Ok(None),
        Err(e) => Err(e),
    }
}
