//! H.265/HEVC slice segment header 解析.
//!
//! 读到 slice_pic_order_cnt_lsb 为止. 依赖切片段 (dependent slice segment)
//! 不携带切片类型和 POC, 它们只会追加到已打开的帧.

use esparse_core::{BitReader, EsError, EsResult};

use crate::codec::{PocMode, SequenceParameters, SliceInfo, SliceType};
use crate::emulation::nalu_prefix_to_rbsp;
use crate::param_store::ParameterSetStore;

use super::Hevc;
use super::nal::HevcNalType;

/// 解析 slice header 时最多转换的 NALU 字节数
const SLICE_HEADER_MAX_LEN: usize = 64;

/// 解析 slice segment header
pub fn parse_slice_header(
    nal: &[u8],
    nal_type: HevcNalType,
    store: &ParameterSetStore<Hevc>,
) -> EsResult<SliceInfo> {
    if nal.len() < 3 {
        return Err(EsError::InvalidData("H.265: 切片太短".into()));
    }
    let temporal_id = (nal[1] & 0x07).saturating_sub(1);
    let rbsp = nalu_prefix_to_rbsp(&nal[2..], SLICE_HEADER_MAX_LEN);
    let mut br = BitReader::new(&rbsp);

    let first_slice_segment_in_pic = br.read_flag()?;
    if (16..=23).contains(&nal_type.type_id()) {
        br.skip_bits(1)?; // no_output_of_prior_pics_flag
    }
    let pps_id = br.read_ue()?;
    let pps = store
        .pps(pps_id)
        .ok_or_else(|| EsError::InvalidData(format!("H.265: 切片引用的 PPS {} 不存在", pps_id)))?;
    let sps = store.sps(pps.sps_id).ok_or_else(|| {
        EsError::InvalidData(format!(
            "H.265: PPS {} 引用的 SPS {} 不存在",
            pps_id, pps.sps_id
        ))
    })?;

    let mut dependent = false;
    if !first_slice_segment_in_pic {
        if pps.dependent_slice_segments_enabled {
            dependent = br.read_flag()?;
        }
        br.skip_bits(sps.slice_address_bits())?; // slice_segment_address
    }

    let mut slice_type = SliceType::P;
    let mut pic_order_cnt_lsb = 0;
    if !dependent {
        br.skip_bits(pps.num_extra_slice_header_bits)?; // slice_reserved_flag
        slice_type = match br.read_ue()? {
            0 => SliceType::B,
            1 => SliceType::P,
            2 => SliceType::I,
            other => {
                return Err(EsError::InvalidData(format!(
                    "H.265: slice_type 非法, value={}",
                    other
                )));
            }
        };
        if pps.output_flag_present {
            br.skip_bits(1)?; // pic_output_flag
        }
        if sps.separate_colour_plane {
            br.skip_bits(2)?; // colour_plane_id
        }
        if !nal_type.is_idr() {
            pic_order_cnt_lsb = br.read_bits(sps.log2_max_poc_lsb)?;
        }
    }

    Ok(SliceInfo {
        nal_type: nal_type.type_id(),
        random_access: nal_type.is_irap(),
        is_reference: temporal_id == 0 && nal_type.is_poc_anchor(),
        pps_id,
        sps_id: pps.sps_id,
        first_slice_in_picture: first_slice_segment_in_pic,
        slice_type,
        frame_num: 0,
        field_pic: false,
        bottom_field: false,
        idr_pic_id: None,
        pic_order_cnt_lsb,
        delta_pic_order_cnt_bottom: 0,
        delta_pic_order_cnt: [0, 0],
        poc_mode: PocMode::Lsb {
            log2_max_poc_lsb: sps.log2_max_poc_lsb,
        },
        sps_frame_duration: sps.frame_duration(),
    })
}
