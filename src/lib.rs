//! # esparse
//!
//! 纯 Rust 实现的 H.264/AVC 与 H.265/HEVC Annex B 基本流解析器.
//!
//! - 按任意分块接收字节流, 拆分 NAL 单元
//! - 管理 VPS/SPS/PPS, 生成 avcC / hvcC 配置记录
//! - 组装访问单元, 由 POC 重建显示顺序并分配时间戳
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use esparse::nal::{HevcEsParser, ParserConfig};
//!
//! let data = std::fs::read("input.h265").unwrap();
//! let mut parser = HevcEsParser::new(ParserConfig::default()).unwrap();
//! parser.add_bytes(&data).unwrap();
//! parser.flush().unwrap();
//! while let Some(frame) = parser.next_frame() {
//!     println!("{} ns, 关键帧: {}", frame.start, frame.keyframe);
//! }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `esparse-core` | 错误类型、比特流读写、校验 |
//! | `esparse-nal` | NAL 拆分、参数集、帧组装与时间戳 |

/// 基础类型与比特流工具
pub use esparse_core as core;

/// 基本流解析
pub use esparse_nal as nal;

pub mod logging;

/// 获取 esparse 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
