//! H.264 PPS (Picture Parameter Set) 解析器.
//!
//! 只解析 slice header 依赖的前几个字段.

use esparse_core::{BitReader, EsError, EsResult};

use crate::codec::{ParameterSet, PictureParameters};
use crate::emulation::nalu_prefix_to_rbsp;

/// PPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcPps {
    /// pic_parameter_set_id
    pub pps_id: u32,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// entropy_coding_mode_flag (CABAC)
    pub entropy_coding_mode: bool,
    /// bottom_field_pic_order_in_frame_present_flag
    pub bottom_field_pic_order_in_frame_present: bool,
    /// num_slice_groups_minus1 + 1
    pub num_slice_groups: u32,
}

impl ParameterSet for AvcPps {
    fn id(&self) -> u32 {
        self.pps_id
    }
}

impl PictureParameters for AvcPps {
    fn sps_id(&self) -> u32 {
        self.sps_id
    }
}

/// 解析 PPS NALU (含 1 字节 NAL 头部)
pub fn parse_pps(nal: &[u8]) -> EsResult<AvcPps> {
    if nal.len() < 2 {
        return Err(EsError::InvalidData("H.264: PPS 太短".into()));
    }
    let rbsp = nalu_prefix_to_rbsp(&nal[1..], 32);
    let mut br = BitReader::new(&rbsp);

    let pps_id = br.read_ue()?;
    if pps_id > 255 {
        return Err(EsError::InvalidData(format!(
            "H.264: pps_id 超出范围, pps_id={}",
            pps_id
        )));
    }
    let sps_id = br.read_ue()?;
    if sps_id > 31 {
        return Err(EsError::InvalidData(format!(
            "H.264: PPS 引用的 sps_id 超出范围, sps_id={}",
            sps_id
        )));
    }
    let entropy_coding_mode = br.read_flag()?;
    let bottom_field_pic_order_in_frame_present = br.read_flag()?;
    let num_slice_groups = br.read_ue()? + 1;

    Ok(AvcPps {
        pps_id,
        sps_id,
        entropy_coding_mode,
        bottom_field_pic_order_in_frame_present,
        num_slice_groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{AvcPpsParams, avc_pps};

    #[test]
    fn test_pps_fields() {
        let nal = avc_pps(&AvcPpsParams {
            pps_id: 7,
            sps_id: 2,
            bottom_field_pic_order_in_frame_present: true,
        });
        let pps = parse_pps(&nal).unwrap();
        assert_eq!(pps.id(), 7);
        assert_eq!(pps.sps_id(), 2);
        assert!(!pps.entropy_coding_mode);
        assert!(pps.bottom_field_pic_order_in_frame_present);
        assert_eq!(pps.num_slice_groups, 1);
    }

    #[test]
    fn test_pps_reject_sps_id_out_of_range() {
        let nal = avc_pps(&AvcPpsParams {
            sps_id: 40,
            ..AvcPpsParams::default()
        });
        assert!(parse_pps(&nal).is_err());
    }

    #[test]
    fn test_pps_too_short() {
        assert!(parse_pps(&[0x68]).is_err());
    }
}
