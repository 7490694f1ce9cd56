//! VUI 中 AVC 与 HEVC 共用的部分: 宽高比与 timing.
//!
//! 宽高比字段在复制 SPS 时可以被丢弃: 输出中 aspect_ratio_info_present_flag 改写为 0,
//! 后续字段原样复制.

use esparse_core::{BitCopier, EsResult, Rational};

use crate::codec::TimingInfo;
use crate::emulation::rbsp_to_nalu;

/// 预定义的 SAR 表 (H.264 表 E-1 / H.265 表 E-1)
const SAR_TABLE: [(i32, i32); 17] = [
    (0, 1),    // 0: 未指定
    (1, 1),    // 1: 1:1
    (12, 11),  // 2: 12:11
    (10, 11),  // 3: 10:11
    (16, 11),  // 4: 16:11
    (40, 33),  // 5: 40:33
    (24, 11),  // 6: 24:11
    (20, 11),  // 7: 20:11
    (32, 11),  // 8: 32:11
    (80, 33),  // 9: 80:33
    (18, 11),  // 10: 18:11
    (15, 11),  // 11: 15:11
    (64, 33),  // 12: 64:33
    (160, 99), // 13: 160:99
    (4, 3),    // 14: 4:3
    (3, 2),    // 15: 3:2
    (2, 1),    // 16: 2:1
];

const EXTENDED_SAR: u32 = 255;

/// 宽高比解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AspectRatio {
    /// 像素宽高比; 未指定或非法时为 None
    pub sar: Option<Rational>,
    /// 输出中是否丢弃了宽高比字段
    pub stripped: bool,
}

/// 读取 N 位, `keep` 为 true 时同时复制到输出
fn pass_bits(bc: &mut BitCopier<'_>, n: u32, keep: bool) -> EsResult<u32> {
    if keep {
        bc.copy_bits(n)
    } else {
        bc.read_bits(n)
    }
}

/// 解析 aspect_ratio_info_present_flag 及其字段
///
/// `keep_ar_info` 为 false 且字段存在时, 输出中写入标志 0 并丢弃后续字段.
pub(crate) fn copy_aspect_ratio(
    bc: &mut BitCopier<'_>,
    keep_ar_info: bool,
) -> EsResult<AspectRatio> {
    let present = bc.read_bit()? == 1;
    let keep = keep_ar_info || !present;
    bc.writer_mut().write_flag(present && keep);
    if !present {
        return Ok(AspectRatio {
            sar: None,
            stripped: false,
        });
    }

    let idc = pass_bits(bc, 8, keep)?;
    let sar = if idc == EXTENDED_SAR {
        let w = pass_bits(bc, 16, keep)?;
        let h = pass_bits(bc, 16, keep)?;
        (w != 0 && h != 0).then(|| Rational::new(w as i32, h as i32))
    } else {
        SAR_TABLE
            .get(idc as usize)
            .filter(|(w, _)| *w != 0)
            .map(|&(w, h)| Rational::new(w, h))
    };
    Ok(AspectRatio {
        sar,
        stripped: !keep,
    })
}

/// 复制 timing_info 的 num_units_in_tick 和 time_scale; 任一为 0 时返回 None
pub(crate) fn copy_timing(bc: &mut BitCopier<'_>) -> EsResult<Option<TimingInfo>> {
    let num_units_in_tick = bc.copy_bits(32)?;
    let time_scale = bc.copy_bits(32)?;
    if num_units_in_tick == 0 || time_scale == 0 {
        return Ok(None);
    }
    Ok(Some(TimingInfo {
        num_units_in_tick,
        time_scale,
    }))
}

/// 完成复制并重新组装 NALU (NAL 头部 + 插入防竞争字节的 RBSP)
pub(crate) fn rebuild_nalu(header: &[u8], bc: BitCopier<'_>) -> EsResult<Vec<u8>> {
    let rbsp = bc.finish()?;
    let mut nalu = Vec::with_capacity(header.len() + rbsp.len() + 4);
    nalu.extend_from_slice(header);
    nalu.extend(rbsp_to_nalu(&rbsp));
    Ok(nalu)
}
