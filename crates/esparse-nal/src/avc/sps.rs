//! H.264 SPS (Sequence Parameter Set) 解析器.
//!
//! 解析分帧和排序所需的字段: 图像尺寸、POC 推导方式、宽高比与帧率.
//! 解析经由 [`BitCopier`] 进行, 需要时同时产出去除宽高比信息的 SPS.

use esparse_core::{BitCopier, EsError, EsResult, Rational};

use crate::codec::{
    ParameterSet, ParsedSps, PocCycle, PocMode, SequenceParameters, TimingInfo,
};
use crate::emulation::nalu_to_rbsp;
use crate::vui::{copy_aspect_ratio, copy_timing, rebuild_nalu};

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcSps {
    /// profile_idc (66=Baseline, 77=Main, 100=High)
    pub profile_idc: u8,
    /// constraint_set 标志位
    pub constraint_set_flags: u8,
    /// level_idc (30=3.0, 41=4.1)
    pub level_idc: u8,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// separate_colour_plane_flag
    pub separate_colour_plane: bool,
    /// 亮度位深
    pub bit_depth_luma: u32,
    /// 色度位深
    pub bit_depth_chroma: u32,
    /// 最大参考帧数
    pub max_num_ref_frames: u32,
    /// 以宏块为单位的宽度
    pub pic_width_in_mbs: u32,
    /// 以 map unit 为单位的高度
    pub pic_height_in_map_units: u32,
    /// 是否为帧编码 (非场编码)
    pub frame_mbs_only: bool,
    /// 图像宽度 (像素, 已应用 cropping)
    pub width: u32,
    /// 图像高度 (像素, 已应用 cropping)
    pub height: u32,
    /// log2(MaxFrameNum)
    pub log2_max_frame_num: u32,
    /// pic_order_cnt_type
    pub poc_type: u32,
    /// delta_pic_order_always_zero_flag (poc_type 1)
    pub delta_pic_order_always_zero: bool,
    /// POC 推导方式
    pub poc: PocMode,
    /// 像素宽高比
    pub sar: Option<Rational>,
    /// VUI timing 信息
    pub timing: Option<TimingInfo>,
}

impl ParameterSet for AvcSps {
    fn id(&self) -> u32 {
        self.sps_id
    }
}

impl SequenceParameters for AvcSps {
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

    /// 一帧占两个时钟周期 (每个场一个)
    fn frame_duration(&self) -> Option<i64> {
        self.timing.and_then(|t| t.ticks_to_ns(2))
    }

    fn poc_mode(&self) -> PocMode {
        self.poc.clone()
    }
}

/// 是否为 High Profile 或更高 (携带 chroma_format_idc 等字段)
fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

/// 获取 cropping 单位
fn cropping_unit(chroma_array_type: u32, frame_mbs_only: bool) -> (u32, u32) {
    let sub_width = match chroma_array_type {
        0 | 3 => 1,
        _ => 2,
    };
    let sub_height = match chroma_array_type {
        1 => 2,
        _ => 1,
    };
    let height_mult = if frame_mbs_only { 1 } else { 2 };
    (sub_width, sub_height * height_mult)
}

/// 复制一组缩放矩阵 (只需跳过, 值不参与计算)
fn copy_scaling_list(bc: &mut BitCopier<'_>, size: usize) -> EsResult<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = bc.copy_se()?;
            next_scale = (last_scale + delta_scale + 256).rem_euclid(256);
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(())
}

fn invalid(msg: String) -> EsError {
    EsError::InvalidData(format!("H.264: {}", msg))
}

/// 解析 SPS NALU (含 1 字节 NAL 头部)
///
/// `keep_ar_info` 为 false 且 VUI 携带宽高比时, 额外返回去除宽高比字段后的 NALU.
pub fn parse_sps(nal: &[u8], keep_ar_info: bool) -> EsResult<ParsedSps<AvcSps>> {
    if nal.len() < 4 {
        return Err(invalid(format!("SPS 太短, len={}", nal.len())));
    }
    let rbsp = nalu_to_rbsp(&nal[1..]);
    let mut bc = BitCopier::new(&rbsp);

    let profile_idc = bc.copy_bits(8)? as u8;
    let constraint_set_flags = bc.copy_bits(8)? as u8;
    let level_idc = bc.copy_bits(8)? as u8;
    let sps_id = bc.copy_ue()?;
    if sps_id > 31 {
        return Err(invalid(format!("sps_id 超出范围, sps_id={}", sps_id)));
    }

    let mut chroma_format_idc = 1;
    let mut separate_colour_plane = false;
    let mut bit_depth_luma = 8;
    let mut bit_depth_chroma = 8;
    if is_high_profile(profile_idc) {
        chroma_format_idc = bc.copy_ue()?;
        if chroma_format_idc > 3 {
            return Err(invalid(format!(
                "chroma_format_idc 非法, value={}",
                chroma_format_idc
            )));
        }
        if chroma_format_idc == 3 {
            separate_colour_plane = bc.copy_flag()?;
        }
        let luma_minus8 = bc.copy_ue()?;
        let chroma_minus8 = bc.copy_ue()?;
        if luma_minus8 > 6 || chroma_minus8 > 6 {
            return Err(invalid(format!(
                "位深非法, bit_depth_luma_minus8={}, bit_depth_chroma_minus8={}",
                luma_minus8, chroma_minus8
            )));
        }
        bit_depth_luma = luma_minus8 + 8;
        bit_depth_chroma = chroma_minus8 + 8;
        bc.copy_flag()?; // qpprime_y_zero_transform_bypass_flag
        if bc.copy_flag()? {
            let list_count = if chroma_format_idc == 3 { 12 } else { 8 };
            for idx in 0..list_count {
                if bc.copy_flag()? {
                    copy_scaling_list(&mut bc, if idx < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    let log2_max_frame_num_minus4 = bc.copy_ue()?;
    if log2_max_frame_num_minus4 > 12 {
        return Err(invalid(format!(
            "log2_max_frame_num_minus4 超出范围, value={}",
            log2_max_frame_num_minus4
        )));
    }
    let log2_max_frame_num = log2_max_frame_num_minus4 + 4;

    let poc_type = bc.copy_ue()?;
    let mut delta_pic_order_always_zero = false;
    let poc = match poc_type {
        0 => {
            let log2_max_poc_lsb_minus4 = bc.copy_ue()?;
            if log2_max_poc_lsb_minus4 > 12 {
                return Err(invalid(format!(
                    "log2_max_pic_order_cnt_lsb_minus4 超出范围, value={}",
                    log2_max_poc_lsb_minus4
                )));
            }
            PocMode::Lsb {
                log2_max_poc_lsb: log2_max_poc_lsb_minus4 + 4,
            }
        }
        1 => {
            delta_pic_order_always_zero = bc.copy_flag()?;
            let offset_for_non_ref_pic = bc.copy_se()?;
            let offset_for_top_to_bottom_field = bc.copy_se()?;
            let num_ref_in_cycle = bc.copy_ue()?;
            if num_ref_in_cycle > 255 {
                return Err(invalid(format!(
                    "num_ref_frames_in_pic_order_cnt_cycle 超出范围, value={}",
                    num_ref_in_cycle
                )));
            }
            let offset_for_ref_frame = (0..num_ref_in_cycle)
                .map(|_| bc.copy_se())
                .collect::<EsResult<Vec<_>>>()?;
            PocMode::FrameNumCycle(PocCycle {
                log2_max_frame_num,
                offset_for_non_ref_pic,
                offset_for_top_to_bottom_field,
                offset_for_ref_frame,
            })
        }
        2 => PocMode::FrameNum { log2_max_frame_num },
        _ => {
            return Err(invalid(format!("pic_order_cnt_type 非法, value={}", poc_type)));
        }
    };

    let max_num_ref_frames = bc.copy_ue()?;
    bc.copy_flag()?; // gaps_in_frame_num_value_allowed_flag
    let pic_width_in_mbs = bc
        .copy_ue()?
        .checked_add(1)
        .ok_or_else(|| invalid("pic_width_in_mbs_minus1 超出范围".into()))?;
    let pic_height_in_map_units = bc
        .copy_ue()?
        .checked_add(1)
        .ok_or_else(|| invalid("pic_height_in_map_units_minus1 超出范围".into()))?;
    let frame_mbs_only = bc.copy_flag()?;
    if !frame_mbs_only {
        bc.copy_flag()?; // mb_adaptive_frame_field_flag
    }
    bc.copy_flag()?; // direct_8x8_inference_flag

    let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0, 0, 0, 0);
    if bc.copy_flag()? {
        crop_left = bc.copy_ue()?;
        crop_right = bc.copy_ue()?;
        crop_top = bc.copy_ue()?;
        crop_bottom = bc.copy_ue()?;
    }

    let chroma_array_type = if separate_colour_plane {
        0
    } else {
        chroma_format_idc
    };
    let (crop_unit_x, crop_unit_y) = cropping_unit(chroma_array_type, frame_mbs_only);
    let raw_width = pic_width_in_mbs
        .checked_mul(16)
        .ok_or_else(|| invalid("计算宽度时发生溢出".into()))?;
    let raw_height = pic_height_in_map_units
        .checked_mul(if frame_mbs_only { 16 } else { 32 })
        .ok_or_else(|| invalid("计算高度时发生溢出".into()))?;
    let crop_x = crop_left
        .checked_add(crop_right)
        .and_then(|v| v.checked_mul(crop_unit_x))
        .ok_or_else(|| invalid("计算水平裁剪时发生溢出".into()))?;
    let crop_y = crop_top
        .checked_add(crop_bottom)
        .and_then(|v| v.checked_mul(crop_unit_y))
        .ok_or_else(|| invalid("计算垂直裁剪时发生溢出".into()))?;
    if crop_x >= raw_width || crop_y >= raw_height {
        return Err(invalid(format!(
            "裁剪参数非法, raw={}x{}, crop_x={}, crop_y={}",
            raw_width, raw_height, crop_x, crop_y
        )));
    }

    let mut sar = None;
    let mut timing = None;
    let mut stripped = false;
    if bc.copy_flag()? {
        let ar = copy_aspect_ratio(&mut bc, keep_ar_info)?;
        sar = ar.sar;
        stripped = ar.stripped;

        if bc.copy_flag()? {
            bc.copy_flag()?; // overscan_appropriate_flag
        }
        if bc.copy_flag()? {
            bc.copy_bits(4)?; // video_format, video_full_range_flag
            if bc.copy_flag()? {
                bc.copy_bits(24)?; // colour_primaries, transfer_characteristics, matrix_coefficients
            }
        }
        if bc.copy_flag()? {
            bc.copy_ue()?; // chroma_sample_loc_type_top_field
            bc.copy_ue()?; // chroma_sample_loc_type_bottom_field
        }
        if bc.copy_flag()? {
            timing = copy_timing(&mut bc)?;
        }
    }

    let rewritten = if stripped {
        Some(rebuild_nalu(&nal[..1], bc)?)
    } else {
        None
    };

    Ok(ParsedSps {
        sps: AvcSps {
            profile_idc,
            constraint_set_flags,
            level_idc,
            sps_id,
            chroma_format_idc,
            separate_colour_plane,
            bit_depth_luma,
            bit_depth_chroma,
            max_num_ref_frames,
            pic_width_in_mbs,
            pic_height_in_map_units,
            frame_mbs_only,
            width: raw_width - crop_x,
            height: raw_height - crop_y,
            log2_max_frame_num,
            poc_type,
            delta_pic_order_always_zero,
            poc,
            sar,
            timing,
        },
        rewritten,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{AspectRatioParams, AvcPocParams, AvcSpsParams, avc_sps};

    fn parse(params: &AvcSpsParams, keep_ar_info: bool) -> ParsedSps<AvcSps> {
        parse_sps(&avc_sps(params), keep_ar_info).unwrap()
    }

    #[test]
    fn test_sps_baseline_profile() {
        let parsed = parse(&AvcSpsParams::default(), true);
        let sps = parsed.sps;
        assert_eq!(sps.profile_idc, 66);
        assert_eq!(sps.sps_id, 0);
        assert_eq!((sps.width, sps.height), (320, 240));
        assert_eq!(sps.poc, PocMode::Lsb { log2_max_poc_lsb: 4 });
        assert_eq!(sps.sar, None);
        assert_eq!(sps.frame_duration(), None);
        assert!(parsed.rewritten.is_none());
    }

    #[test]
    fn test_sps_high_profile_with_cropping() {
        let params = AvcSpsParams {
            profile_idc: 100,
            sps_id: 3,
            crop: Some((0, 0, 0, 4)),
            ..AvcSpsParams::default()
        };
        let sps = parse(&params, true).sps;
        assert_eq!(sps.id(), 3);
        assert_eq!(sps.chroma_format_idc, 1);
        assert_eq!((sps.width, sps.height), (320, 232), "4:2:0 下裁剪单位为 2 行");
    }

    #[test]
    fn test_sps_timing_and_interlaced() {
        let params = AvcSpsParams {
            frame_mbs_only: false,
            height_map_units: 8,
            timing: Some((1001, 60000)),
            ..AvcSpsParams::default()
        };
        let sps = parse(&params, true).sps;
        assert!(!sps.frame_mbs_only);
        assert_eq!(sps.height, 256, "场编码时 map unit 为两个宏块行");
        assert_eq!(sps.frame_duration(), Some(33_366_666));
    }

    #[test]
    fn test_sps_poc_type1_fields() {
        let params = AvcSpsParams {
            poc: AvcPocParams::Type1 {
                offset_for_non_ref_pic: -2,
                offset_for_top_to_bottom_field: 1,
                offset_for_ref_frame: vec![2, 4],
            },
            ..AvcSpsParams::default()
        };
        let sps = parse(&params, true).sps;
        assert_eq!(
            sps.poc,
            PocMode::FrameNumCycle(PocCycle {
                log2_max_frame_num: 4,
                offset_for_non_ref_pic: -2,
                offset_for_top_to_bottom_field: 1,
                offset_for_ref_frame: vec![2, 4],
            })
        );
    }

    #[test]
    fn test_sps_keep_aspect_ratio() {
        let params = AvcSpsParams {
            aspect_ratio: Some(AspectRatioParams::Idc(2)),
            ..AvcSpsParams::default()
        };
        let parsed = parse(&params, true);
        assert_eq!(parsed.sps.sar, Some(Rational::new(12, 11)));
        assert!(parsed.rewritten.is_none());
    }

    #[test]
    fn test_sps_strip_aspect_ratio() {
        let params = AvcSpsParams {
            aspect_ratio: Some(AspectRatioParams::Extended(4, 3)),
            timing: Some((1, 50)),
            ..AvcSpsParams::default()
        };
        let parsed = parse(&params, false);
        assert_eq!(parsed.sps.sar, Some(Rational::new(4, 3)), "解码字段仍含宽高比");
        let rewritten = parsed.rewritten.expect("应生成去除宽高比的 SPS");
        assert_eq!(rewritten[0], 0x67);

        let reparsed = parse_sps(&rewritten, true).unwrap();
        assert_eq!(reparsed.sps.sar, None);
        assert_eq!(reparsed.sps.timing, parsed.sps.timing);
        assert_eq!(reparsed.sps.width, parsed.sps.width);

        let expected = avc_sps(&AvcSpsParams {
            aspect_ratio: None,
            ..params
        });
        assert_eq!(rewritten, expected, "重写结果应与不含宽高比的 SPS 一致");
    }

    #[test]
    fn test_sps_strip_without_aspect_ratio_is_noop() {
        let params = AvcSpsParams {
            timing: Some((1, 50)),
            ..AvcSpsParams::default()
        };
        assert!(parse(&params, false).rewritten.is_none());
    }

    #[test]
    fn test_sps_reject_sps_id_out_of_range() {
        let params = AvcSpsParams {
            sps_id: 32,
            ..AvcSpsParams::default()
        };
        assert!(parse_sps(&avc_sps(&params), true).is_err());
    }

    #[test]
    fn test_sps_reject_huge_bit_depth() {
        let params = AvcSpsParams {
            profile_idc: 100,
            bit_depth_luma_minus8: u32::MAX - 1,
            ..AvcSpsParams::default()
        };
        let err = parse_sps(&avc_sps(&params), true).unwrap_err();
        assert!(matches!(err, EsError::InvalidData(_)), "位深越界应报数据错误: {:?}", err);

        let params = AvcSpsParams {
            profile_idc: 100,
            bit_depth_luma_minus8: 2,
            ..AvcSpsParams::default()
        };
        assert_eq!(parse(&params, true).sps.bit_depth_luma, 10);
    }

    #[test]
    fn test_sps_truncated() {
        let nal = avc_sps(&AvcSpsParams::default());
        assert!(parse_sps(&nal[..5], true).is_err());
        assert!(parse_sps(&[0x67, 0x42], true).is_err());
    }
}
