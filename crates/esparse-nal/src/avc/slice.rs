//! H.264 slice header 解析.
//!
//! 只读到 POC 相关字段为止, 后续的参考列表和宏块数据与分帧无关.

use esparse_core::{BitReader, EsError, EsResult};

use crate::codec::{PocMode, SequenceParameters, SliceInfo, SliceType};
use crate::emulation::nalu_prefix_to_rbsp;
use crate::param_store::ParameterSetStore;

use super::Avc;
use super::nal::AvcNalType;

/// 解析 slice header 时最多转换的 NALU 字节数
const SLICE_HEADER_MAX_LEN: usize = 64;

/// slice_type 原始值 (0-9) 映射为切片类型; 5-9 表示整帧同类型
fn map_slice_type(raw: u32) -> SliceType {
    match raw % 5 {
        0 | 3 => SliceType::P,
        1 => SliceType::B,
        _ => SliceType::I,
    }
}

/// 解析 slice header
///
/// PPS 和 SPS 必须已在 `store` 中.
pub fn parse_slice_header(
    nal: &[u8],
    nal_type: AvcNalType,
    store: &ParameterSetStore<Avc>,
) -> EsResult<SliceInfo> {
    if nal.len() < 2 {
        return Err(EsError::InvalidData("H.264: 切片太短".into()));
    }
    let ref_idc = (nal[0] >> 5) & 0x03;
    let rbsp = nalu_prefix_to_rbsp(&nal[1..], SLICE_HEADER_MAX_LEN);
    let mut br = BitReader::new(&rbsp);

    let first_mb_in_slice = br.read_ue()?;
    let raw_slice_type = br.read_ue()?;
    if raw_slice_type > 9 {
        return Err(EsError::InvalidData(format!(
            "H.264: slice_type 非法, value={}",
            raw_slice_type
        )));
    }
    let pps_id = br.read_ue()?;
    let pps = store
        .pps(pps_id)
        .ok_or_else(|| EsError::InvalidData(format!("H.264: 切片引用的 PPS {} 不存在", pps_id)))?;
    let sps = store.sps(pps.sps_id).ok_or_else(|| {
        EsError::InvalidData(format!(
            "H.264: PPS {} 引用的 SPS {} 不存在",
            pps_id, pps.sps_id
        ))
    })?;

    if sps.separate_colour_plane {
        br.skip_bits(2)?; // colour_plane_id
    }
    let frame_num = br.read_bits(sps.log2_max_frame_num)?;
    let mut field_pic = false;
    let mut bottom_field = false;
    if !sps.frame_mbs_only {
        field_pic = br.read_flag()?;
        if field_pic {
            bottom_field = br.read_flag()?;
        }
    }
    let idr_pic_id = if nal_type.is_idr() {
        Some(br.read_ue()?)
    } else {
        None
    };

    let mut pic_order_cnt_lsb = 0;
    let mut delta_pic_order_cnt_bottom = 0;
    let mut delta_pic_order_cnt = [0i32; 2];
    let bottom_present = pps.bottom_field_pic_order_in_frame_present && !field_pic;
    match &sps.poc {
        PocMode::Lsb { log2_max_poc_lsb } => {
            pic_order_cnt_lsb = br.read_bits(*log2_max_poc_lsb)?;
            if bottom_present {
                delta_pic_order_cnt_bottom = br.read_se()?;
            }
        }
        PocMode::FrameNumCycle(_) if !sps.delta_pic_order_always_zero => {
            delta_pic_order_cnt[0] = br.read_se()?;
            if bottom_present {
                delta_pic_order_cnt[1] = br.read_se()?;
            }
        }
        _ => {}
    }

    Ok(SliceInfo {
        nal_type: nal_type.type_id(),
        random_access: nal_type.is_idr(),
        is_reference: ref_idc != 0,
        pps_id,
        sps_id: pps.sps_id,
        first_slice_in_picture: first_mb_in_slice == 0,
        slice_type: map_slice_type(raw_slice_type),
        frame_num,
        field_pic,
        bottom_field,
        idr_pic_id,
        pic_order_cnt_lsb,
        delta_pic_order_cnt_bottom,
        delta_pic_order_cnt,
        poc_mode: sps.poc_mode(),
        sps_frame_duration: sps.frame_duration(),
    })
}
