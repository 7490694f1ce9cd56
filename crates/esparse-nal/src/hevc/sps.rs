//! H.265/HEVC SPS 解析器.
//!
//! 解析 slice header 定长字段所需的尺寸信息 (PicSizeInCtbsY, POC LSB 位宽),
//! 完整跨过 st_ref_pic_set (含帧间预测)、长期参考和 VUI, 以获取 timing 与
//! bitstream_restriction 中的 min_spatial_segmentation_idc.

use esparse_core::{BitCopier, EsError, EsResult, Rational};

use crate::codec::{ParameterSet, ParsedSps, PocMode, SequenceParameters, TimingInfo};
use crate::emulation::nalu_to_rbsp;
use crate::vui::{copy_aspect_ratio, copy_timing, rebuild_nalu};

use super::vps::{ProfileTierLevel, copy_profile_tier_level};

/// pic_width/height_in_luma_samples 上限: Sqrt(MaxLumaPs * 8), MaxLumaPs 取 level 6.2
const MAX_PIC_DIMENSION: u32 = 16888;

/// 短期参考图像集
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortTermRps {
    /// 是否由前一个集合预测
    pub inter_predicted: bool,
    /// NumDeltaPocs
    pub num_delta_pocs: u32,
}

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcSps {
    /// 引用的 VPS id
    pub vps_id: u32,
    /// 最大子层数
    pub max_sub_layers: u32,
    /// sps_temporal_id_nesting_flag
    pub temporal_id_nesting: bool,
    /// profile/tier/level
    pub ptl: ProfileTierLevel,
    /// sps_seq_parameter_set_id
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// separate_colour_plane_flag
    pub separate_colour_plane: bool,
    /// 原始宽度 (像素, 未裁剪)
    pub pic_width: u32,
    /// 原始高度 (像素, 未裁剪)
    pub pic_height: u32,
    /// 图像宽度 (像素, 已应用 conformance window)
    pub width: u32,
    /// 图像高度 (像素, 已应用 conformance window)
    pub height: u32,
    /// 亮度位深
    pub bit_depth_luma: u32,
    /// 色度位深
    pub bit_depth_chroma: u32,
    /// log2(MaxPicOrderCntLsb)
    pub log2_max_poc_lsb: u32,
    /// log2(MinCbSizeY)
    pub log2_min_cb_size: u32,
    /// log2(CtbSizeY)
    pub log2_ctb_size: u32,
    /// 短期参考图像集
    pub short_term_rps: Vec<ShortTermRps>,
    /// long_term_ref_pics_present_flag
    pub long_term_ref_pics_present: bool,
    /// num_long_term_ref_pics_sps
    pub num_long_term_ref_pics: u32,
    /// 像素宽高比
    pub sar: Option<Rational>,
    /// VUI timing 信息
    pub timing: Option<TimingInfo>,
    /// min_spatial_segmentation_idc (无 bitstream_restriction 时为 0)
    pub min_spatial_segmentation_idc: u32,
}

impl HevcSps {
    /// PicSizeInCtbsY
    pub fn pic_size_in_ctbs(&self) -> u32 {
        let ctb = 1u32 << self.log2_ctb_size;
        self.pic_width.div_ceil(ctb) * self.pic_height.div_ceil(ctb)
    }

    /// slice_segment_address 的位宽: Ceil(Log2(PicSizeInCtbsY))
    pub fn slice_address_bits(&self) -> u32 {
        let size = self.pic_size_in_ctbs();
        if size <= 1 {
            0
        } else {
            u32::BITS - (size - 1).leading_zeros()
        }
    }
}

impl ParameterSet for HevcSps {
    fn id(&self) -> u32 {
        self.sps_id
    }
}

impl SequenceParameters for HevcSps {
    fn vps_id(&self) -> Option<u32> {
        Some(self.vps_id)
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn sample_aspect_ratio(&self) -> Option<Rational> {
        self.sar
    }

    fn timing(&self) -> Option<TimingInfo> {
        self.timing
    }

    /// HEVC 中一帧 (或一场) 占一个时钟周期
    fn frame_duration(&self) -> Option<i64> {
        self.timing.and_then(|t| t.ticks_to_ns(1))
    }

    fn poc_mode(&self) -> PocMode {
        PocMode::Lsb {
            log2_max_poc_lsb: self.log2_max_poc_lsb,
        }
    }
}

fn invalid(msg: String) -> EsError {
    EsError::InvalidData(format!("H.265: {}", msg))
}

/// 复制 scaling_list_data
fn copy_scaling_list_data(bc: &mut BitCopier<'_>) -> EsResult<()> {
    for size_id in 0..4u32 {
        let step = if size_id == 3 { 3 } else { 1 };
        for _ in (0..6).step_by(step) {
            if !bc.copy_flag()? {
                bc.copy_ue()?; // scaling_list_pred_matrix_id_delta
            } else {
                let coef_num = 64.min(1u32 << (4 + (size_id << 1)));
                if size_id > 1 {
                    bc.copy_se()?; // scaling_list_dc_coef_minus8
                }
                for _ in 0..coef_num {
                    bc.copy_se()?; // scaling_list_delta_coef
                }
            }
        }
    }
    Ok(())
}

/// 复制 SPS 中第 `idx` 个 st_ref_pic_set
fn copy_st_ref_pic_set(
    bc: &mut BitCopier<'_>,
    idx: usize,
    previous: &[ShortTermRps],
) -> EsResult<ShortTermRps> {
    let inter_predicted = idx != 0 && bc.copy_flag()?;
    if inter_predicted {
        // SPS 中不携带 delta_idx_minus1, 参考集合固定为前一个
        let reference = previous[idx - 1];
        bc.copy_flag()?; // delta_rps_sign
        let abs_delta_rps_minus1 = bc.copy_ue()?;
        if abs_delta_rps_minus1 > (1 << 15) - 1 {
            return Err(invalid(format!(
                "abs_delta_rps_minus1 超出范围, value={}",
                abs_delta_rps_minus1
            )));
        }
        let mut num_delta_pocs = 0;
        for _ in 0..=reference.num_delta_pocs {
            let used_by_curr_pic = bc.copy_flag()?;
            let use_delta = used_by_curr_pic || bc.copy_flag()?;
            if use_delta {
                num_delta_pocs += 1;
            }
        }
        return Ok(ShortTermRps {
            inter_predicted,
            num_delta_pocs,
        });
    }

    let num_negative = bc.copy_ue()?;
    let num_positive = bc.copy_ue()?;
    if num_negative > 16 || num_positive > 16 {
        return Err(invalid(format!(
            "短期参考图像个数非法, negative={}, positive={}",
            num_negative, num_positive
        )));
    }
    for _ in 0..num_negative + num_positive {
        bc.copy_ue()?; // delta_poc_s0/s1_minus1
        bc.copy_flag()?; // used_by_curr_pic_s0/s1_flag
    }
    Ok(ShortTermRps {
        inter_predicted,
        num_delta_pocs: num_negative + num_positive,
    })
}

/// 复制 sub_layer_hrd_parameters
fn copy_sub_layer_hrd(bc: &mut BitCopier<'_>, cpb_cnt: u32, sub_pic: bool) -> EsResult<()> {
    for _ in 0..cpb_cnt {
        bc.copy_ue()?; // bit_rate_value_minus1
        bc.copy_ue()?; // cpb_size_value_minus1
        if sub_pic {
            bc.copy_ue()?; // cpb_size_du_value_minus1
            bc.copy_ue()?; // bit_rate_du_value_minus1
        }
        bc.copy_flag()?; // cbr_flag
    }
    Ok(())
}

/// 复制 hrd_parameters(1, max_sub_layers_minus1)
fn copy_hrd_parameters(bc: &mut BitCopier<'_>, max_sub_layers_minus1: u32) -> EsResult<()> {
    let nal_hrd = bc.copy_flag()?;
    let vcl_hrd = bc.copy_flag()?;
    let mut sub_pic = false;
    if nal_hrd || vcl_hrd {
        sub_pic = bc.copy_flag()?;
        if sub_pic {
            // tick_divisor_minus2(8) du_cpb_removal_delay_increment_length_minus1(5)
            // sub_pic_cpb_params_in_pic_timing_sei_flag(1) dpb_output_delay_du_length_minus1(5)
            bc.copy_bits(19)?;
        }
        bc.copy_bits(8)?; // bit_rate_scale, cpb_size_scale
        if sub_pic {
            bc.copy_bits(4)?; // cpb_size_du_scale
        }
        // initial_cpb_removal_delay_length_minus1, au_cpb_removal_delay_length_minus1,
        // dpb_output_delay_length_minus1
        bc.copy_bits(15)?;
    }

    for _ in 0..=max_sub_layers_minus1 {
        let fixed_general = bc.copy_flag()?;
        let fixed_within_cvs = fixed_general || bc.copy_flag()?;
        let mut low_delay = false;
        if fixed_within_cvs {
            bc.copy_ue()?; // elemental_duration_in_tc_minus1
        } else {
            low_delay = bc.copy_flag()?;
        }
        let mut cpb_cnt_minus1 = 0;
        if !low_delay {
            cpb_cnt_minus1 = bc.copy_ue()?;
            if cpb_cnt_minus1 > 31 {
                return Err(invalid(format!(
                    "cpb_cnt_minus1 超出范围, value={}",
                    cpb_cnt_minus1
                )));
            }
        }
        if nal_hrd {
            copy_sub_layer_hrd(bc, cpb_cnt_minus1 + 1, sub_pic)?;
        }
        if vcl_hrd {
            copy_sub_layer_hrd(bc, cpb_cnt_minus1 + 1, sub_pic)?;
        }
    }
    Ok(())
}

/// VUI 中本模块关心的字段
#[derive(Debug, Default)]
struct VuiInfo {
    sar: Option<Rational>,
    stripped: bool,
    timing: Option<TimingInfo>,
    min_spatial_segmentation_idc: u32,
}

fn copy_vui(
    bc: &mut BitCopier<'_>,
    keep_ar_info: bool,
    max_sub_layers_minus1: u32,
) -> EsResult<VuiInfo> {
    let ar = copy_aspect_ratio(bc, keep_ar_info)?;
    let mut vui = VuiInfo {
        sar: ar.sar,
        stripped: ar.stripped,
        ..VuiInfo::default()
    };

    if bc.copy_flag()? {
        bc.copy_flag()?; // overscan_appropriate_flag
    }
    if bc.copy_flag()? {
        bc.copy_bits(4)?; // video_format, video_full_range_flag
        if bc.copy_flag()? {
            bc.copy_bits(24)?; // colour_primaries, transfer_characteristics, matrix_coeffs
        }
    }
    if bc.copy_flag()? {
        bc.copy_ue()?; // chroma_sample_loc_type_top_field
        bc.copy_ue()?; // chroma_sample_loc_type_bottom_field
    }
    bc.copy_bits(3)?; // neutral_chroma_indication_flag, field_seq_flag, frame_field_info_present_flag
    if bc.copy_flag()? {
        for _ in 0..4 {
            bc.copy_ue()?; // def_disp_win_*_offset
        }
    }
    if bc.copy_flag()? {
        vui.timing = copy_timing(bc)?;
        if bc.copy_flag()? {
            bc.copy_ue()?; // vui_num_ticks_poc_diff_one_minus1
        }
        if bc.copy_flag()? {
            copy_hrd_parameters(bc, max_sub_layers_minus1)?;
        }
    }
    if bc.copy_flag()? {
        bc.copy_bits(3)?; // tiles_fixed_structure_flag, motion_vectors_over_pic_boundaries_flag, restricted_ref_pic_lists_flag
        vui.min_spatial_segmentation_idc = bc.copy_ue()?;
        if vui.min_spatial_segmentation_idc > 4095 {
            return Err(invalid(format!(
                "min_spatial_segmentation_idc 超出范围, value={}",
                vui.min_spatial_segmentation_idc
            )));
        }
        bc.copy_ue()?; // max_bytes_per_pic_denom
        bc.copy_ue()?; // max_bits_per_min_cu_denom
        bc.copy_ue()?; // log2_max_mv_length_horizontal
        bc.copy_ue()?; // log2_max_mv_length_vertical
    }
    Ok(vui)
}

/// 解析 SPS NALU (含 2 字节 NAL 头部)
///
/// `keep_ar_info` 为 false 且 VUI 携带宽高比时, 额外返回去除宽高比字段后的 NALU.
pub fn parse_sps(nal: &[u8], keep_ar_info: bool) -> EsResult<ParsedSps<HevcSps>> {
    if nal.len() < 2 + 1 + 12 + 1 {
        return Err(invalid(format!("SPS 太短, len={}", nal.len())));
    }
    let rbsp = nalu_to_rbsp(&nal[2..]);
    let mut bc = BitCopier::new(&rbsp);

    let vps_id = bc.copy_bits(4)?;
    let max_sub_layers_minus1 = bc.copy_bits(3)?;
    if max_sub_layers_minus1 > 6 {
        return Err(invalid(format!(
            "sps_max_sub_layers_minus1 非法, value={}",
            max_sub_layers_minus1
        )));
    }
    let temporal_id_nesting = bc.copy_flag()?;
    let ptl = copy_profile_tier_level(&mut bc, max_sub_layers_minus1)?;

    let sps_id = bc.copy_ue()?;
    if sps_id > 15 {
        return Err(invalid(format!("sps_id 超出范围, sps_id={}", sps_id)));
    }
    let chroma_format_idc = bc.copy_ue()?;
    if chroma_format_idc > 3 {
        return Err(invalid(format!(
            "chroma_format_idc 非法, value={}",
            chroma_format_idc
        )));
    }
    let separate_colour_plane = chroma_format_idc == 3 && bc.copy_flag()?;
    let pic_width = bc.copy_ue()?;
    let pic_height = bc.copy_ue()?;
    let valid_dimension = |v: u32| (1..=MAX_PIC_DIMENSION).contains(&v);
    if !valid_dimension(pic_width) || !valid_dimension(pic_height) {
        return Err(invalid(format!(
            "图像尺寸非法, width={}, height={}",
            pic_width, pic_height
        )));
    }

    let (mut win_left, mut win_right, mut win_top, mut win_bottom) = (0, 0, 0, 0);
    if bc.copy_flag()? {
        win_left = bc.copy_ue()?;
        win_right = bc.copy_ue()?;
        win_top = bc.copy_ue()?;
        win_bottom = bc.copy_ue()?;
    }

    let luma_minus8 = bc.copy_ue()?;
    let chroma_minus8 = bc.copy_ue()?;
    if luma_minus8 > 8 || chroma_minus8 > 8 {
        return Err(invalid(format!(
            "位深非法, bit_depth_luma_minus8={}, bit_depth_chroma_minus8={}",
            luma_minus8, chroma_minus8
        )));
    }
    let bit_depth_luma = luma_minus8 + 8;
    let bit_depth_chroma = chroma_minus8 + 8;
    let log2_max_poc_lsb_minus4 = bc.copy_ue()?;
    if log2_max_poc_lsb_minus4 > 12 {
        return Err(invalid(format!(
            "log2_max_pic_order_cnt_lsb_minus4 超出范围, value={}",
            log2_max_poc_lsb_minus4
        )));
    }
    let log2_max_poc_lsb = log2_max_poc_lsb_minus4 + 4;

    let sub_layer_ordering_info_present = bc.copy_flag()?;
    let first = if sub_layer_ordering_info_present {
        0
    } else {
        max_sub_layers_minus1
    };
    for _ in first..=max_sub_layers_minus1 {
        bc.copy_ue()?; // sps_max_dec_pic_buffering_minus1
        bc.copy_ue()?; // sps_max_num_reorder_pics
        bc.copy_ue()?; // sps_max_latency_increase_plus1
    }

    let log2_min_cb_size_minus3 = bc.copy_ue()?;
    let log2_diff_max_min_cb_size = bc.copy_ue()?;
    if log2_min_cb_size_minus3 > 3 || log2_diff_max_min_cb_size > 3 {
        return Err(invalid(format!(
            "CTB 尺寸非法, log2_min_luma_coding_block_size_minus3={}, log2_diff_max_min={}",
            log2_min_cb_size_minus3, log2_diff_max_min_cb_size
        )));
    }
    let log2_min_cb_size = log2_min_cb_size_minus3 + 3;
    let log2_ctb_size = log2_min_cb_size + log2_diff_max_min_cb_size;
    if log2_ctb_size > 6 {
        return Err(invalid(format!("CTB 尺寸非法, log2={}", log2_ctb_size)));
    }
    bc.copy_ue()?; // log2_min_luma_transform_block_size_minus2
    bc.copy_ue()?; // log2_diff_max_min_luma_transform_block_size
    bc.copy_ue()?; // max_transform_hierarchy_depth_inter
    bc.copy_ue()?; // max_transform_hierarchy_depth_intra

    if bc.copy_flag()? && bc.copy_flag()? {
        copy_scaling_list_data(&mut bc)?;
    }
    bc.copy_flag()?; // amp_enabled_flag
    bc.copy_flag()?; // sample_adaptive_offset_enabled_flag
    if bc.copy_flag()? {
        bc.copy_bits(8)?; // pcm_sample_bit_depth_luma_minus1, pcm_sample_bit_depth_chroma_minus1
        bc.copy_ue()?; // log2_min_pcm_luma_coding_block_size_minus3
        bc.copy_ue()?; // log2_diff_max_min_pcm_luma_coding_block_size
        bc.copy_flag()?; // pcm_loop_filter_disabled_flag
    }

    let num_short_term_rps = bc.copy_ue()?;
    if num_short_term_rps > 64 {
        return Err(invalid(format!(
            "num_short_term_ref_pic_sets 超出范围, value={}",
            num_short_term_rps
        )));
    }
    let mut short_term_rps = Vec::with_capacity(num_short_term_rps as usize);
    for idx in 0..num_short_term_rps as usize {
        let rps = copy_st_ref_pic_set(&mut bc, idx, &short_term_rps)?;
        short_term_rps.push(rps);
    }

    let long_term_ref_pics_present = bc.copy_flag()?;
    let mut num_long_term_ref_pics = 0;
    if long_term_ref_pics_present {
        num_long_term_ref_pics = bc.copy_ue()?;
        if num_long_term_ref_pics > 32 {
            return Err(invalid(format!(
                "num_long_term_ref_pics_sps 超出范围, value={}",
                num_long_term_ref_pics
            )));
        }
        for _ in 0..num_long_term_ref_pics {
            bc.copy_bits(log2_max_poc_lsb)?; // lt_ref_pic_poc_lsb_sps
            bc.copy_flag()?; // used_by_curr_pic_lt_sps_flag
        }
    }
    bc.copy_flag()?; // sps_temporal_mvp_enabled_flag
    bc.copy_flag()?; // strong_intra_smoothing_enabled_flag

    let vui = if bc.copy_flag()? {
        copy_vui(&mut bc, keep_ar_info, max_sub_layers_minus1)?
    } else {
        VuiInfo::default()
    };

    let (sub_width_c, sub_height_c) = match chroma_format_idc {
        1 => (2, 2),
        2 => (2, 1),
        _ => (1, 1),
    };
    let crop_x = win_left
        .checked_add(win_right)
        .and_then(|v| v.checked_mul(sub_width_c))
        .filter(|&v| v < pic_width)
        .ok_or_else(|| invalid("conformance window 水平裁剪非法".into()))?;
    let crop_y = win_top
        .checked_add(win_bottom)
        .and_then(|v| v.checked_mul(sub_height_c))
        .filter(|&v| v < pic_height)
        .ok_or_else(|| invalid("conformance window 垂直裁剪非法".into()))?;

    let rewritten = if vui.stripped {
        Some(rebuild_nalu(&nal[..2], bc)?)
    } else {
        None
    };

    Ok(ParsedSps {
        sps: HevcSps {
            vps_id,
            max_sub_layers: max_sub_layers_minus1 + 1,
            temporal_id_nesting,
            ptl,
            sps_id,
            chroma_format_idc,
            separate_colour_plane,
            pic_width,
            pic_height,
            width: pic_width - crop_x,
            height: pic_height - crop_y,
            bit_depth_luma,
            bit_depth_chroma,
            log2_max_poc_lsb,
            log2_min_cb_size,
            log2_ctb_size,
            short_term_rps,
            long_term_ref_pics_present,
            num_long_term_ref_pics,
            sar: vui.sar,
            timing: vui.timing,
            min_spatial_segmentation_idc: vui.min_spatial_segmentation_idc,
        },
        rewritten,
    })
}
