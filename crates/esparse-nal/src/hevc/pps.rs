//! H.265/HEVC PPS 解析器.

use esparse_core::{BitReader, EsError, EsResult};

use crate::codec::{ParameterSet, PictureParameters};
use crate::emulation::nalu_prefix_to_rbsp;

/// PPS 解析结果 (slice header 依赖的字段)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcPps {
    /// pps_pic_parameter_set_id
    pub pps_id: u32,
    /// pps_seq_parameter_set_id
    pub sps_id: u32,
    /// dependent_slice_segments_enabled_flag
    pub dependent_slice_segments_enabled: bool,
    /// output_flag_present_flag
    pub output_flag_present: bool,
    /// num_extra_slice_header_bits
    pub num_extra_slice_header_bits: u32,
}

impl ParameterSet for HevcPps {
    fn id(&self) -> u32 {
        self.pps_id
    }
}

impl PictureParameters for HevcPps {
    fn sps_id(&self) -> u32 {
        self.sps_id
    }
}

/// 解析 PPS NALU (含 2 字节 NAL 头部)
pub fn parse_pps(nal: &[u8]) -> EsResult<HevcPps> {
    if nal.len() < 3 {
        return Err(EsError::InvalidData("H.265: PPS 太短".into()));
    }
    let rbsp = nalu_prefix_to_rbsp(&nal[2..], 32);
    let mut br = BitReader::new(&rbsp);

    let pps_id = br.read_ue()?;
    if pps_id > 63 {
        return Err(EsError::InvalidData(format!(
            "H.265: pps_id 超出范围, pps_id={}",
            pps_id
        )));
    }
    let sps_id = br.read_ue()?;
    if sps_id > 15 {
        return Err(EsError::InvalidData(format!(
            "H.265: PPS 引用的 sps_id 超出范围, sps_id={}",
            sps_id
        )));
    }
    let dependent_slice_segments_enabled = br.read_flag()?;
    let output_flag_present = br.read_flag()?;
    let num_extra_slice_header_bits = br.read_bits(3)?;

    Ok(HevcPps {
        pps_id,
        sps_id,
        dependent_slice_segments_enabled,
        output_flag_present,
        num_extra_slice_header_bits,
    })
}
