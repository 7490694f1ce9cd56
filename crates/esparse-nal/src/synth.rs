//! 合成码流构造.
//!
//! 用 [`BitWriter`] 按语法逐字段写出最小的 AVC/HEVC 参数集、SEI 和切片, 供单元测试、
//! 集成测试和基准测试使用. 切片只写出 slice header 的前半部分, 随后是填充载荷.

use esparse_core::BitWriter;

use crate::emulation::rbsp_to_nalu;

/// 4 字节起始码
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// 用 4 字节起始码拼接 NALU
pub fn annexb(nalus: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for nalu in nalus {
        out.extend_from_slice(&START_CODE);
        out.extend_from_slice(nalu);
    }
    out
}

/// VUI 宽高比
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatioParams {
    /// aspect_ratio_idc 表项 (1-16)
    Idc(u8),
    /// Extended_SAR (idc 255)
    Extended(u16, u16),
}

fn write_aspect_ratio(bw: &mut BitWriter, aspect: Option<AspectRatioParams>) {
    match aspect {
        None => bw.write_flag(false),
        Some(AspectRatioParams::Idc(idc)) => {
            bw.write_flag(true);
            bw.write_bits(u32::from(idc), 8);
        }
        Some(AspectRatioParams::Extended(w, h)) => {
            bw.write_flag(true);
            bw.write_bits(255, 8);
            bw.write_bits(u32::from(w), 16);
            bw.write_bits(u32::from(h), 16);
        }
    }
}

fn finish_nalu(header: &[u8], mut bw: BitWriter) -> Vec<u8> {
    bw.write_rbsp_trailing_bits();
    let rbsp = bw.finish();
    let mut nalu = header.to_vec();
    nalu.extend(rbsp_to_nalu(&rbsp));
    nalu
}

fn write_payload(bw: &mut BitWriter, len: usize) {
    for i in 0..len {
        bw.write_bits(0x5A ^ (i as u32 & 0x0F), 8);
    }
}

/// 恢复点 SEI 消息 (payloadType 6, 1 字节载荷)
fn recovery_point_rbsp() -> BitWriter {
    let mut bw = BitWriter::new();
    bw.write_bits(6, 8);
    bw.write_bits(1, 8);
    bw.write_bits(0x80, 8);
    bw
}

// ============================================================
// AVC
// ============================================================

/// AVC POC 类型参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvcPocParams {
    /// pic_order_cnt_type 0
    Type0 {
        /// log2(MaxPicOrderCntLsb)
        log2_max_poc_lsb: u32,
    },
    /// pic_order_cnt_type 1
    Type1 {
        /// offset_for_non_ref_pic
        offset_for_non_ref_pic: i32,
        /// offset_for_top_to_bottom_field
        offset_for_top_to_bottom_field: i32,
        /// offset_for_ref_frame
        offset_for_ref_frame: Vec<i32>,
    },
    /// pic_order_cnt_type 2
    Type2,
}

/// AVC SPS 参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcSpsParams {
    /// profile_idc
    pub profile_idc: u8,
    /// constraint_set 标志字节
    pub constraint_flags: u8,
    /// level_idc
    pub level_idc: u8,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// bit_depth_luma_minus8, 仅 High 系列 profile 写出
    pub bit_depth_luma_minus8: u32,
    /// log2(MaxFrameNum)
    pub log2_max_frame_num: u32,
    /// POC 类型
    pub poc: AvcPocParams,
    /// 宽度 (宏块)
    pub width_mbs: u32,
    /// 高度 (map unit)
    pub height_map_units: u32,
    /// frame_mbs_only_flag
    pub frame_mbs_only: bool,
    /// 裁剪 (左, 右, 上, 下)
    pub crop: Option<(u32, u32, u32, u32)>,
    /// 宽高比
    pub aspect_ratio: Option<AspectRatioParams>,
    /// (num_units_in_tick, time_scale)
    pub timing: Option<(u32, u32)>,
}

impl Default for AvcSpsParams {
    fn default() -> Self {
        Self {
            profile_idc: 66,
            constraint_flags: 0xC0,
            level_idc: 30,
            sps_id: 0,
            bit_depth_luma_minus8: 0,
            log2_max_frame_num: 4,
            poc: AvcPocParams::Type0 {
                log2_max_poc_lsb: 4,
            },
            width_mbs: 20,
            height_map_units: 15,
            frame_mbs_only: true,
            crop: None,
            aspect_ratio: None,
            timing: None,
        }
    }
}

fn is_avc_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

/// 生成 AVC SPS NALU
pub fn avc_sps(params: &AvcSpsParams) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(u32::from(params.profile_idc), 8);
    bw.write_bits(u32::from(params.constraint_flags), 8);
    bw.write_bits(u32::from(params.level_idc), 8);
    bw.write_ue(params.sps_id);
    if is_avc_high_profile(params.profile_idc) {
        bw.write_ue(1); // chroma_format_idc
        bw.write_ue(params.bit_depth_luma_minus8);
        bw.write_ue(0); // bit_depth_chroma_minus8
        bw.write_flag(false); // qpprime_y_zero_transform_bypass_flag
        bw.write_flag(false); // seq_scaling_matrix_present_flag
    }
    bw.write_ue(params.log2_max_frame_num - 4);
    match &params.poc {
        AvcPocParams::Type0 { log2_max_poc_lsb } => {
            bw.write_ue(0);
            bw.write_ue(log2_max_poc_lsb - 4);
        }
        AvcPocParams::Type1 {
            offset_for_non_ref_pic,
            offset_for_top_to_bottom_field,
            offset_for_ref_frame,
        } => {
            bw.write_ue(1);
            bw.write_flag(false); // delta_pic_order_always_zero_flag
            bw.write_se(*offset_for_non_ref_pic);
            bw.write_se(*offset_for_top_to_bottom_field);
            bw.write_ue(offset_for_ref_frame.len() as u32);
            for &offset in offset_for_ref_frame {
                bw.write_se(offset);
            }
        }
        AvcPocParams::Type2 => bw.write_ue(2),
    }
    bw.write_ue(4); // max_num_ref_frames
    bw.write_flag(false); // gaps_in_frame_num_value_allowed_flag
    bw.write_ue(params.width_mbs - 1);
    bw.write_ue(params.height_map_units - 1);
    bw.write_flag(params.frame_mbs_only);
    if !params.frame_mbs_only {
        bw.write_flag(false); // mb_adaptive_frame_field_flag
    }
    bw.write_flag(true); // direct_8x8_inference_flag
    match params.crop {
        Some((l, r, t, b)) => {
            bw.write_flag(true);
            bw.write_ue(l);
            bw.write_ue(r);
            bw.write_ue(t);
            bw.write_ue(b);
        }
        None => bw.write_flag(false),
    }

    let vui = params.aspect_ratio.is_some() || params.timing.is_some();
    bw.write_flag(vui);
    if vui {
        write_aspect_ratio(&mut bw, params.aspect_ratio);
        bw.write_flag(false); // overscan_info_present_flag
        bw.write_flag(false); // video_signal_type_present_flag
        bw.write_flag(false); // chroma_loc_info_present_flag
        match params.timing {
            Some((num_units, time_scale)) => {
                bw.write_flag(true);
                bw.write_bits(num_units, 32);
                bw.write_bits(time_scale, 32);
                bw.write_flag(true); // fixed_frame_rate_flag
            }
            None => bw.write_flag(false),
        }
        bw.write_flag(false); // nal_hrd_parameters_present_flag
        bw.write_flag(false); // vcl_hrd_parameters_present_flag
        bw.write_flag(false); // pic_struct_present_flag
        bw.write_flag(false); // bitstream_restriction_flag
    }
    finish_nalu(&[0x67], bw)
}

/// AVC PPS 参数
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AvcPpsParams {
    /// pic_parameter_set_id
    pub pps_id: u32,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// bottom_field_pic_order_in_frame_present_flag
    pub bottom_field_pic_order_in_frame_present: bool,
}

/// 生成 AVC PPS NALU
pub fn avc_pps(params: &AvcPpsParams) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(params.pps_id);
    bw.write_ue(params.sps_id);
    bw.write_flag(false); // entropy_coding_mode_flag
    bw.write_flag(params.bottom_field_pic_order_in_frame_present);
    bw.write_ue(0); // num_slice_groups_minus1
    bw.write_ue(0); // num_ref_idx_l0_default_active_minus1
    bw.write_ue(0); // num_ref_idx_l1_default_active_minus1
    bw.write_flag(false); // weighted_pred_flag
    bw.write_bits(0, 2); // weighted_bipred_idc
    bw.write_se(0); // pic_init_qp_minus26
    bw.write_se(0); // pic_init_qs_minus26
    bw.write_se(0); // chroma_qp_index_offset
    bw.write_flag(true); // deblocking_filter_control_present_flag
    bw.write_flag(false); // constrained_intra_pred_flag
    bw.write_flag(false); // redundant_pic_cnt_present_flag
    finish_nalu(&[0x68], bw)
}

/// AVC 切片参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcSliceParams {
    /// 是否为 IDR
    pub idr: bool,
    /// nal_ref_idc
    pub ref_idc: u8,
    /// first_mb_in_slice
    pub first_mb: u32,
    /// slice_type 原始值 (0-9)
    pub slice_type: u32,
    /// pic_parameter_set_id
    pub pps_id: u32,
    /// frame_num
    pub frame_num: u32,
    /// idr_pic_id
    pub idr_pic_id: u32,
    /// pic_order_cnt_lsb
    pub poc_lsb: u32,
    /// 场编码: Some(bottom_field_flag)
    pub field: Option<bool>,
    /// delta_pic_order_cnt_bottom / delta_pic_order_cnt[0..2]
    pub delta_poc: [i32; 2],
    /// 填充载荷字节数
    pub payload_len: usize,
}

impl Default for AvcSliceParams {
    fn default() -> Self {
        Self {
            idr: false,
            ref_idc: 2,
            first_mb: 0,
            slice_type: 5,
            pps_id: 0,
            frame_num: 0,
            idr_pic_id: 0,
            poc_lsb: 0,
            field: None,
            delta_poc: [0, 0],
            payload_len: 16,
        }
    }
}

impl AvcSliceParams {
    /// IDR I 切片
    pub fn idr(poc_lsb: u32) -> Self {
        Self {
            idr: true,
            ref_idc: 3,
            slice_type: 7,
            poc_lsb,
            ..Self::default()
        }
    }

    /// 非 IDR 切片; `slice_type` 取 0 (P), 1 (B), 2 (I)
    pub fn non_idr(slice_type: u32, ref_idc: u8, frame_num: u32, poc_lsb: u32) -> Self {
        Self {
            ref_idc,
            slice_type: slice_type + 5,
            frame_num,
            poc_lsb,
            ..Self::default()
        }
    }
}

/// 生成 AVC 切片 NALU
pub fn avc_slice(slice: &AvcSliceParams, sps: &AvcSpsParams, pps: &AvcPpsParams) -> Vec<u8> {
    let nal_type = if slice.idr { 5 } else { 1 };
    let header = ((slice.ref_idc & 0x03) << 5) | nal_type;

    let mut bw = BitWriter::new();
    bw.write_ue(slice.first_mb);
    bw.write_ue(slice.slice_type);
    bw.write_ue(slice.pps_id);
    bw.write_bits(slice.frame_num, sps.log2_max_frame_num);
    if !sps.frame_mbs_only {
        bw.write_flag(slice.field.is_some());
        if let Some(bottom) = slice.field {
            bw.write_flag(bottom);
        }
    }
    if slice.idr {
        bw.write_ue(slice.idr_pic_id);
    }
    let frame_picture = slice.field.is_none();
    match &sps.poc {
        AvcPocParams::Type0 { log2_max_poc_lsb } => {
            bw.write_bits(slice.poc_lsb, *log2_max_poc_lsb);
            if pps.bottom_field_pic_order_in_frame_present && frame_picture {
                bw.write_se(slice.delta_poc[0]);
            }
        }
        AvcPocParams::Type1 { .. } => {
            bw.write_se(slice.delta_poc[0]);
            if pps.bottom_field_pic_order_in_frame_present && frame_picture {
                bw.write_se(slice.delta_poc[1]);
            }
        }
        AvcPocParams::Type2 => {}
    }
    write_payload(&mut bw, slice.payload_len);
    finish_nalu(&[header], bw)
}

/// AVC 访问单元分隔符
pub fn avc_aud() -> Vec<u8> {
    vec![0x09, 0xF0]
}

/// 含恢复点消息的 AVC SEI NALU
pub fn avc_recovery_point_sei() -> Vec<u8> {
    finish_nalu(&[0x06], recovery_point_rbsp())
}

// ============================================================
// HEVC
// ============================================================

/// HEVC general profile_tier_level 的 12 字节 (Main profile, level 3.1)
pub const HEVC_MAIN_PTL: [u8; 12] = [
    0x01, 0x60, 0x00, 0x00, 0x00, 0x90, 0x00, 0x00, 0x00, 0x00, 0x00, 0x5D,
];

/// 只写 general 部分的 profile_tier_level (max_sub_layers_minus1 = 0)
fn write_ptl(bw: &mut BitWriter) {
    bw.write_bytes(&HEVC_MAIN_PTL);
}

fn hevc_header(nal_type: u8) -> [u8; 2] {
    [nal_type << 1, 0x01]
}

/// 生成 HEVC VPS NALU
pub fn hevc_vps(vps_id: u32) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(vps_id, 4);
    bw.write_flag(true); // vps_base_layer_internal_flag
    bw.write_flag(true); // vps_base_layer_available_flag
    bw.write_bits(0, 6); // vps_max_layers_minus1
    bw.write_bits(0, 3); // vps_max_sub_layers_minus1
    bw.write_flag(true); // vps_temporal_id_nesting_flag
    bw.write_bits(0xFFFF, 16); // vps_reserved_0xffff_16bits
    write_ptl(&mut bw);
    bw.write_flag(true); // vps_sub_layer_ordering_info_present_flag
    bw.write_ue(4); // vps_max_dec_pic_buffering_minus1
    bw.write_ue(2); // vps_max_num_reorder_pics
    bw.write_ue(0); // vps_max_latency_increase_plus1
    bw.write_bits(0, 6); // vps_max_layer_id
    bw.write_ue(0); // vps_num_layer_sets_minus1
    bw.write_flag(false); // vps_timing_info_present_flag
    bw.write_flag(false); // vps_extension_flag
    finish_nalu(&hevc_header(32), bw)
}

/// HEVC 短期参考图像集
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StRpsParams {
    /// 显式写出的参考图像集
    Explicit {
        /// 前向参考个数
        num_negative: u32,
        /// 后向参考个数
        num_positive: u32,
    },
    /// 由前一个参考图像集预测; 每项为 (used_by_curr_pic_flag, use_delta_flag)
    Predicted {
        /// 长度必须等于被参考集合的 NumDeltaPocs + 1
        entries: Vec<(bool, bool)>,
    },
}

/// HEVC SPS 参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcSpsParams {
    /// sps_video_parameter_set_id
    pub vps_id: u32,
    /// sps_seq_parameter_set_id
    pub sps_id: u32,
    /// pic_width_in_luma_samples
    pub width: u32,
    /// pic_height_in_luma_samples
    pub height: u32,
    /// bit_depth_luma_minus8
    pub bit_depth_luma_minus8: u32,
    /// log2(MaxPicOrderCntLsb)
    pub log2_max_poc_lsb: u32,
    /// log2(CtbSizeY)
    pub log2_ctb_size: u32,
    /// 短期参考图像集
    pub short_term_rps: Vec<StRpsParams>,
    /// 宽高比
    pub aspect_ratio: Option<AspectRatioParams>,
    /// (num_units_in_tick, time_scale)
    pub timing: Option<(u32, u32)>,
    /// bitstream_restriction 中的 min_spatial_segmentation_idc
    pub min_spatial_segmentation: Option<u32>,
}

impl Default for HevcSpsParams {
    fn default() -> Self {
        Self {
            vps_id: 0,
            sps_id: 0,
            width: 320,
            height: 240,
            bit_depth_luma_minus8: 0,
            log2_max_poc_lsb: 8,
            log2_ctb_size: 6,
            short_term_rps: vec![StRpsParams::Explicit {
                num_negative: 1,
                num_positive: 0,
            }],
            aspect_ratio: None,
            timing: None,
            min_spatial_segmentation: None,
        }
    }
}

impl HevcSpsParams {
    /// 图像中的 CTB 个数
    pub fn pic_size_in_ctbs(&self) -> u32 {
        let ctb = 1u32 << self.log2_ctb_size;
        self.width.div_ceil(ctb) * self.height.div_ceil(ctb)
    }
}

/// 生成 HEVC SPS NALU
pub fn hevc_sps(params: &HevcSpsParams) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(params.vps_id, 4);
    bw.write_bits(0, 3); // sps_max_sub_layers_minus1
    bw.write_flag(true); // sps_temporal_id_nesting_flag
    write_ptl(&mut bw);
    bw.write_ue(params.sps_id);
    bw.write_ue(1); // chroma_format_idc
    bw.write_ue(params.width);
    bw.write_ue(params.height);
    bw.write_flag(false); // conformance_window_flag
    bw.write_ue(params.bit_depth_luma_minus8);
    bw.write_ue(0); // bit_depth_chroma_minus8
    bw.write_ue(params.log2_max_poc_lsb - 4);
    bw.write_flag(true); // sps_sub_layer_ordering_info_present_flag
    bw.write_ue(4);
    bw.write_ue(2);
    bw.write_ue(0);
    bw.write_ue(0); // log2_min_luma_coding_block_size_minus3
    bw.write_ue(params.log2_ctb_size - 3); // log2_diff_max_min_luma_coding_block_size
    bw.write_ue(0); // log2_min_luma_transform_block_size_minus2
    bw.write_ue(3); // log2_diff_max_min_luma_transform_block_size
    bw.write_ue(1); // max_transform_hierarchy_depth_inter
    bw.write_ue(1); // max_transform_hierarchy_depth_intra
    bw.write_flag(false); // scaling_list_enabled_flag
    bw.write_flag(false); // amp_enabled_flag
    bw.write_flag(false); // sample_adaptive_offset_enabled_flag
    bw.write_flag(false); // pcm_enabled_flag
    bw.write_ue(params.short_term_rps.len() as u32);
    for (idx, rps) in params.short_term_rps.iter().enumerate() {
        if idx != 0 {
            bw.write_flag(matches!(rps, StRpsParams::Predicted { .. }));
        }
        match rps {
            StRpsParams::Explicit {
                num_negative,
                num_positive,
            } => {
                bw.write_ue(*num_negative);
                bw.write_ue(*num_positive);
                for _ in 0..(num_negative + num_positive) {
                    bw.write_ue(0); // delta_poc_minus1
                    bw.write_flag(true); // used_by_curr_pic_flag
                }
            }
            StRpsParams::Predicted { entries } => {
                bw.write_flag(false); // delta_rps_sign
                bw.write_ue(0); // abs_delta_rps_minus1
                for &(used, use_delta) in entries {
                    bw.write_flag(used);
                    if !used {
                        bw.write_flag(use_delta);
                    }
                }
            }
        }
    }
    bw.write_flag(false); // long_term_ref_pics_present_flag
    bw.write_flag(true); // sps_temporal_mvp_enabled_flag
    bw.write_flag(true); // strong_intra_smoothing_enabled_flag

    let vui = params.aspect_ratio.is_some()
        || params.timing.is_some()
        || params.min_spatial_segmentation.is_some();
    bw.write_flag(vui);
    if vui {
        write_aspect_ratio(&mut bw, params.aspect_ratio);
        bw.write_flag(false); // overscan_info_present_flag
        bw.write_flag(false); // video_signal_type_present_flag
        bw.write_flag(false); // chroma_loc_info_present_flag
        bw.write_flag(false); // neutral_chroma_indication_flag
        bw.write_flag(false); // field_seq_flag
        bw.write_flag(false); // frame_field_info_present_flag
        bw.write_flag(false); // default_display_window_flag
        match params.timing {
            Some((num_units, time_scale)) => {
                bw.write_flag(true);
                bw.write_bits(num_units, 32);
                bw.write_bits(time_scale, 32);
                bw.write_flag(false); // vui_poc_proportional_to_timing_flag
                bw.write_flag(false); // vui_hrd_parameters_present_flag
            }
            None => bw.write_flag(false),
        }
        match params.min_spatial_segmentation {
            Some(idc) => {
                bw.write_flag(true);
                bw.write_flag(false); // tiles_fixed_structure_flag
                bw.write_flag(true); // motion_vectors_over_pic_boundaries_flag
                bw.write_flag(false); // restricted_ref_pic_lists_flag
                bw.write_ue(idc);
                bw.write_ue(2); // max_bytes_per_pic_denom
                bw.write_ue(1); // max_bits_per_min_cu_denom
                bw.write_ue(15); // log2_max_mv_length_horizontal
                bw.write_ue(15); // log2_max_mv_length_vertical
            }
            None => bw.write_flag(false),
        }
    }
    bw.write_flag(false); // sps_extension_present_flag
    finish_nalu(&hevc_header(33), bw)
}

/// HEVC PPS 参数
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HevcPpsParams {
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

/// 生成 HEVC PPS NALU
pub fn hevc_pps(params: &HevcPpsParams) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(params.pps_id);
    bw.write_ue(params.sps_id);
    bw.write_flag(params.dependent_slice_segments_enabled);
    bw.write_flag(params.output_flag_present);
    bw.write_bits(params.num_extra_slice_header_bits, 3);
    bw.write_flag(false); // sign_data_hiding_enabled_flag
    bw.write_flag(false); // cabac_init_present_flag
    bw.write_ue(0); // num_ref_idx_l0_default_active_minus1
    bw.write_ue(0); // num_ref_idx_l1_default_active_minus1
    bw.write_se(0); // init_qp_minus26
    bw.write_flag(false); // constrained_intra_pred_flag
    bw.write_flag(false); // transform_skip_enabled_flag
    bw.write_flag(false); // cu_qp_delta_enabled_flag
    bw.write_se(0); // pps_cb_qp_offset
    bw.write_se(0); // pps_cr_qp_offset
    bw.write_flag(false); // pps_slice_chroma_qp_offsets_present_flag
    bw.write_flag(false); // weighted_pred_flag
    bw.write_flag(false); // weighted_bipred_flag
    bw.write_flag(false); // transquant_bypass_enabled_flag
    bw.write_flag(false); // tiles_enabled_flag
    bw.write_flag(false); // entropy_coding_sync_enabled_flag
    bw.write_flag(false); // pps_loop_filter_across_slices_enabled_flag
    bw.write_flag(false); // deblocking_filter_control_present_flag
    bw.write_flag(false); // pps_scaling_list_data_present_flag
    bw.write_flag(false); // lists_modification_present_flag
    bw.write_ue(0); // log2_parallel_merge_level_minus2
    bw.write_flag(false); // slice_segment_header_extension_present_flag
    bw.write_flag(false); // pps_extension_present_flag
    finish_nalu(&hevc_header(34), bw)
}

/// HEVC 切片参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcSliceParams {
    /// nal_unit_type
    pub nal_type: u8,
    /// first_slice_segment_in_pic_flag
    pub first_slice: bool,
    /// dependent_slice_segment_flag
    pub dependent: bool,
    /// slice_segment_address
    pub segment_address: u32,
    /// slice_pic_parameter_set_id
    pub pps_id: u32,
    /// slice_type (0=B, 1=P, 2=I)
    pub slice_type: u32,
    /// slice_pic_order_cnt_lsb
    pub poc_lsb: u32,
    /// 填充载荷字节数
    pub payload_len: usize,
}

impl HevcSliceParams {
    /// 指定 NAL 类型、切片类型和 POC LSB 的首切片
    pub fn new(nal_type: u8, slice_type: u32, poc_lsb: u32) -> Self {
        Self {
            nal_type,
            first_slice: true,
            dependent: false,
            segment_address: 0,
            pps_id: 0,
            slice_type,
            poc_lsb,
            payload_len: 16,
        }
    }
}

/// 生成 HEVC 切片 NALU
pub fn hevc_slice(slice: &HevcSliceParams, sps: &HevcSpsParams, pps: &HevcPpsParams) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_flag(slice.first_slice);
    if (16..=23).contains(&slice.nal_type) {
        bw.write_flag(false); // no_output_of_prior_pics_flag
    }
    bw.write_ue(slice.pps_id);
    let mut dependent = false;
    if !slice.first_slice {
        if pps.dependent_slice_segments_enabled {
            dependent = slice.dependent;
            bw.write_flag(dependent);
        }
        let bits = u32::BITS - (sps.pic_size_in_ctbs() - 1).leading_zeros();
        bw.write_bits(slice.segment_address, bits);
    }
    if !dependent {
        bw.write_bits(0, pps.num_extra_slice_header_bits);
        bw.write_ue(slice.slice_type);
        if pps.output_flag_present {
            bw.write_flag(true); // pic_output_flag
        }
        if slice.nal_type != 19 && slice.nal_type != 20 {
            bw.write_bits(slice.poc_lsb, sps.log2_max_poc_lsb);
        }
    }
    write_payload(&mut bw, slice.payload_len);
    finish_nalu(&hevc_header(slice.nal_type), bw)
}

/// HEVC 访问单元分隔符
pub fn hevc_aud() -> Vec<u8> {
    vec![0x46, 0x01, 0x50]
}

/// 含恢复点消息的 HEVC 前缀 SEI NALU
pub fn hevc_recovery_point_sei() -> Vec<u8> {
    finish_nalu(&hevc_header(39), recovery_point_rbsp())
}

/// HEVC 后缀 SEI NALU (decoded picture hash 占位)
pub fn hevc_suffix_sei() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(132, 8);
    bw.write_bits(2, 8);
    bw.write_bits(0xABCD, 16);
    finish_nalu(&hevc_header(40), bw)
}
