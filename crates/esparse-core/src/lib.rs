//! # esparse-core
//!
//! esparse 基础库, 提供错误类型、比特流读写 (含 Exp-Golomb)、复制式比特读取器和内容校验.
//!
//! 上层的 NAL 解析 crate 只依赖这里的类型, 不直接接触字节序细节.

pub mod bitcopy;
pub mod bitreader;
pub mod bitwriter;
pub mod crc;
pub mod error;
pub mod rational;

// 重导出常用类型
pub use bitcopy::BitCopier;
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{EsError, EsResult, tolerate_eof};
pub use rational::Rational;
