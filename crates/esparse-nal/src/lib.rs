//! # esparse-nal
//!
//! H.264/AVC 与 H.265/HEVC Annex B 基本流解析库.
//!
//! 输入任意分块的 Annex B 字节流, 输出按解码顺序排列、带长度前缀的访问单元,
//! 附带关键帧标记、时间戳和参考偏移, 并生成容器使用的配置记录 (avcC / hvcC).
//!
//! ## 使用示例
//!
//! ```rust
//! use esparse_nal::{AvcEsParser, ParserConfig};
//!
//! let mut parser = AvcEsParser::new(ParserConfig::default()).unwrap();
//! parser.add_bytes(&[0x00, 0x00, 0x00, 0x01, 0x09, 0xF0]).unwrap();
//! parser.flush().unwrap();
//! while let Some(frame) = parser.next_frame() {
//!     println!("{} 字节, 开始于 {} ns", frame.data.len(), frame.start);
//! }
//! ```
//!
//! AVC 与 HEVC 共用同一个解析引擎 [`EsParser`], 差异由 [`Codec`] trait 描述.

pub mod avc;
pub mod codec;
pub mod config;
pub mod duration;
pub mod emulation;
pub mod frame;
pub mod hevc;
pub mod nal;
pub mod param_store;
pub mod parser;
pub mod reorder;
pub mod scanner;
pub mod sei;
pub mod size_prefix;
pub mod synth;
mod vui;

// 重导出常用类型
pub use avc::Avc;
pub use codec::{Codec, NalClass, PocMode, SliceInfo, SliceType, TimingInfo};
pub use config::ParserConfig;
pub use duration::{DurationEstimator, FALLBACK_DURATION};
pub use emulation::{nalu_to_rbsp, rbsp_to_nalu};
pub use frame::Frame;
pub use hevc::Hevc;
pub use nal::NalUnit;
pub use param_store::{ParamKind, ParameterSetStore, RegisterOutcome};
pub use parser::{AvcEsParser, EsParser, HevcEsParser, ParserStats};
pub use reorder::OrderReconstructor;
pub use scanner::ByteStreamScanner;
pub use size_prefix::{read_nalu_size, split_size_prefixed, write_nalu_size};
