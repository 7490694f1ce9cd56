//! H.264 NAL 单元类型.
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────────┘
//! ```

use esparse_core::{EsError, EsResult};

use crate::codec::NalClass;

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvcNalType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A (DPA)
    SliceDpa,
    /// 数据分区 B (DPB)
    SliceDpb,
    /// 数据分区 C (DPC)
    SliceDpc,
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
    /// SPS 扩展
    SpsExtension,
    /// 未知类型
    Unknown(u8),
}

impl AvcNalType {
    /// 从 NAL 类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            13 => Self::SpsExtension,
            _ => Self::Unknown(type_id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDpa => 2,
            Self::SliceDpb => 3,
            Self::SliceDpc => 4,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::SpsExtension => 13,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            Self::Slice | Self::SliceDpa | Self::SliceDpb | Self::SliceDpc | Self::SliceIdr
        )
    }

    /// 是否为 IDR
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::SliceIdr)
    }

    /// 解析流程中的角色
    ///
    /// 数据分区 B/C 不携带 slice header, 与其他未知类型一样作为分帧边界处理.
    pub fn class(&self) -> NalClass {
        match self {
            Self::Slice | Self::SliceDpa | Self::SliceIdr => NalClass::Slice,
            Self::Sei => NalClass::PrefixSei,
            Self::Sps => NalClass::Sps,
            Self::Pps => NalClass::Pps,
            Self::Aud => NalClass::AccessUnitDelimiter,
            Self::EndOfSequence => NalClass::EndOfSequence,
            Self::EndOfStream => NalClass::EndOfStream,
            Self::FillerData => NalClass::Filler,
            Self::SliceDpb | Self::SliceDpc | Self::SpsExtension | Self::Unknown(_) => {
                NalClass::Other
            }
        }
    }
}

impl std::fmt::Display for AvcNalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceDpa => write!(f, "SliceDPA"),
            Self::SliceDpb => write!(f, "SliceDPB"),
            Self::SliceDpc => write!(f, "SliceDPC"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "Filler"),
            Self::SpsExtension => write!(f, "SPSExt"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// 解析 NAL 头部, 返回 (类型, nal_ref_idc)
pub fn parse_nal_header(data: &[u8]) -> EsResult<(AvcNalType, u8)> {
    let Some(&header) = data.first() else {
        return Err(EsError::InvalidData("H.264: NAL 单元数据为空".into()));
    };
    let forbidden = (header >> 7) & 1;
    if forbidden != 0 {
        return Err(EsError::InvalidData(format!(
            "H.264: forbidden_zero_bit 非法, value={}",
            forbidden
        )));
    }
    let ref_idc = (header >> 5) & 0x03;
    Ok((AvcNalType::from_type_id(header & 0x1F), ref_idc))
}
