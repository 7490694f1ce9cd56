//! H.265/HEVC VPS 与 profile_tier_level 解析.

use esparse_core::{BitCopier, EsError, EsResult};

use crate::codec::ParameterSet;
use crate::emulation::nalu_to_rbsp;

/// general profile_tier_level 的字节数
pub const GENERAL_PTL_LEN: usize = 12;

/// profile_tier_level 中的 general 部分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileTierLevel {
    /// general 部分原始 12 字节, 原样写入 hvcC
    pub general: [u8; GENERAL_PTL_LEN],
    /// general_profile_idc
    pub profile_idc: u8,
    /// general_tier_flag
    pub tier_flag: bool,
    /// general_level_idc
    pub level_idc: u8,
}

/// 解析 profile_tier_level(1, max_sub_layers_minus1)
///
/// 经由 [`BitCopier`] 读取, 所有位原样复制.
pub(crate) fn copy_profile_tier_level(
    bc: &mut BitCopier<'_>,
    max_sub_layers_minus1: u32,
) -> EsResult<ProfileTierLevel> {
    let mut general = [0u8; GENERAL_PTL_LEN];
    for byte in general.iter_mut() {
        *byte = bc.copy_bits(8)? as u8;
    }

    if max_sub_layers_minus1 > 0 {
        let mut profile_present = Vec::with_capacity(max_sub_layers_minus1 as usize);
        let mut level_present = Vec::with_capacity(max_sub_layers_minus1 as usize);
        for _ in 0..max_sub_layers_minus1 {
            profile_present.push(bc.copy_flag()?);
            level_present.push(bc.copy_flag()?);
        }
        // 对齐到 8 个子层
        for _ in max_sub_layers_minus1..8 {
            bc.copy_bits(2)?;
        }
        for (profile, level) in profile_present.into_iter().zip(level_present) {
            if profile {
                // sub_layer_profile_space .. sub_layer_reserved_zero_bit (88 bits)
                bc.copy_bits(32)?;
                bc.copy_bits(32)?;
                bc.copy_bits(24)?;
            }
            if level {
                bc.copy_bits(8)?;
            }
        }
    }

    Ok(ProfileTierLevel {
        general,
        profile_idc: general[0] & 0x1F,
        tier_flag: general[0] & 0x20 != 0,
        level_idc: general[GENERAL_PTL_LEN - 1],
    })
}

/// VPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcVps {
    /// vps_video_parameter_set_id
    pub vps_id: u32,
    /// 最大子层数
    pub max_sub_layers: u32,
    /// vps_temporal_id_nesting_flag
    pub temporal_id_nesting: bool,
    /// profile/tier/level
    pub ptl: ProfileTierLevel,
}

impl ParameterSet for HevcVps {
    fn id(&self) -> u32 {
        self.vps_id
    }
}

/// 解析 VPS NALU (含 2 字节 NAL 头部)
pub fn parse_vps(nal: &[u8]) -> EsResult<HevcVps> {
    if nal.len() < 2 + 4 + GENERAL_PTL_LEN {
        return Err(EsError::InvalidData(format!(
            "H.265: VPS 太短, len={}",
            nal.len()
        )));
    }
    let rbsp = nalu_to_rbsp(&nal[2..]);
    let mut bc = BitCopier::new(&rbsp);

    let vps_id = bc.read_bits(4)?;
    bc.read_bits(2)?; // vps_base_layer_internal_flag, vps_base_layer_available_flag
    bc.read_bits(6)?; // vps_max_layers_minus1
    let max_sub_layers_minus1 = bc.read_bits(3)?;
    if max_sub_layers_minus1 > 6 {
        return Err(EsError::InvalidData(format!(
            "H.265: vps_max_sub_layers_minus1 非法, value={}",
            max_sub_layers_minus1
        )));
    }
    let temporal_id_nesting = bc.read_bit()? == 1;
    bc.read_bits(16)?; // vps_reserved_0xffff_16bits
    let ptl = copy_profile_tier_level(&mut bc, max_sub_layers_minus1)?;

    Ok(HevcVps {
        vps_id,
        max_sub_layers: max_sub_layers_minus1 + 1,
        temporal_id_nesting,
        ptl,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{HEVC_MAIN_PTL, hevc_vps};
    use esparse_core::BitWriter;

    #[test]
    fn test_parse_vps() {
        let vps = parse_vps(&hevc_vps(3)).unwrap();
        assert_eq!(vps.id(), 3);
        assert_eq!(vps.max_sub_layers, 1);
        assert!(vps.temporal_id_nesting);
        assert_eq!(vps.ptl.general, HEVC_MAIN_PTL);
        assert_eq!(vps.ptl.profile_idc, 1);
        assert!(!vps.ptl.tier_flag);
        assert_eq!(vps.ptl.level_idc, 93);
    }

    #[test]
    fn test_ptl_with_sub_layers() {
        let mut bw = BitWriter::new();
        bw.write_bytes(&HEVC_MAIN_PTL);
        // 两个子层: 第一个只有 level, 第二个有 profile 和 level
        bw.write_flag(false);
        bw.write_flag(true);
        bw.write_flag(true);
        bw.write_flag(true);
        for _ in 2..8 {
            bw.write_bits(0, 2);
        }
        bw.write_bits(90, 8);
        bw.write_bits(0x0123_4567, 32);
        bw.write_bits(0x89AB_CDEF, 32);
        bw.write_bits(0x00AB_CDEF, 24);
        bw.write_bits(87, 8);
        bw.write_rbsp_trailing_bits();
        let rbsp = bw.finish();

        let mut bc = BitCopier::new(&rbsp);
        let ptl = copy_profile_tier_level(&mut bc, 2).unwrap();
        assert_eq!(ptl.level_idc, 93);
        assert_eq!(bc.reader().bits_left(), 8, "只剩尾部字节");
        assert_eq!(bc.finish().unwrap(), rbsp, "复制结果应与输入一致");
    }

    #[test]
    fn test_vps_too_short() {
        assert!(parse_vps(&[0x40, 0x01, 0x0C]).is_err());
    }
}
