//! HEVCDecoderConfigurationRecord (hvcC) 的生成与解析.
//!
//! ```text
//! configurationVersion(8) = 1
//! general_profile_space(2) .. general_level_idc(8)     12 字节, 取自第一个 VPS
//! 1111(4) | min_spatial_segmentation_idc(12)
//! 111111(6) | parallelismType(2)
//! 111111(6) | chromaFormat(2)
//! 11111(5) | bitDepthLumaMinus8(3)
//! 11111(5) | bitDepthChromaMinus8(3)
//! avgFrameRate(16)
//! constantFrameRate(2) | numTemporalLayers(3) | temporalIdNested(1) | lengthSizeMinusOne(2)
//! numOfArrays(8)
//! { array_completeness(1) | 1(1) | NAL_unit_type(6), numNalus(16), { nalUnitLength(16), nalUnit }* }*
//! ```
//!
//! 参数集数组的 completeness 为 1, SEI 数组为 0.

use bytes::Bytes;
use esparse_core::{EsError, EsResult};

use crate::param_store::ParameterSetStore;
use crate::size_prefix::{RecordReader, write_u16_prefixed};

use super::Hevc;
use super::vps::GENERAL_PTL_LEN;

const NAL_VPS: u8 = 32;
const NAL_SPS: u8 = 33;
const NAL_PPS: u8 = 34;
const NAL_PREFIX_SEI: u8 = 39;

/// hvcC 中的一个 NAL 数组
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcNalArray {
    /// array_completeness
    pub complete: bool,
    /// NAL_unit_type
    pub nal_type: u8,
    /// NALU 列表
    pub nalus: Vec<Vec<u8>>,
}

/// hvcC 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcConfigRecord {
    /// general profile_tier_level 12 字节
    pub general_ptl: [u8; GENERAL_PTL_LEN],
    /// min_spatial_segmentation_idc
    pub min_spatial_segmentation_idc: u16,
    /// chromaFormat
    pub chroma_format_idc: u8,
    /// 亮度位深
    pub bit_depth_luma: u8,
    /// 色度位深
    pub bit_depth_chroma: u8,
    /// numTemporalLayers
    pub num_temporal_layers: u8,
    /// temporalIdNested
    pub temporal_id_nested: bool,
    /// NALU 长度前缀宽度
    pub nalu_size_length: usize,
    /// NAL 数组
    pub arrays: Vec<HevcNalArray>,
}

impl HevcConfigRecord {
    /// 指定类型数组中的 NALU
    pub fn nalus(&self, nal_type: u8) -> Vec<&[u8]> {
        self.arrays
            .iter()
            .filter(|a| a.nal_type == nal_type)
            .flat_map(|a| a.nalus.iter().map(Vec::as_slice))
            .collect()
    }
}

fn write_array(out: &mut Vec<u8>, nal_type: u8, complete: bool, nalus: &[&Bytes]) -> EsResult<()> {
    if nalus.len() > u16::MAX as usize {
        return Err(EsError::InvalidData(format!(
            "H.265: NAL 数组过大, type={}, count={}",
            nal_type,
            nalus.len()
        )));
    }
    out.push((u8::from(complete) << 7) | 0x40 | (nal_type & 0x3F));
    out.extend_from_slice(&(nalus.len() as u16).to_be_bytes());
    for nalu in nalus {
        write_u16_prefixed(out, nalu)?;
    }
    Ok(())
}

/// 由参数集存储生成 hvcC
pub fn pack_hevc_config(
    store: &ParameterSetStore<Hevc>,
    nalu_size_length: usize,
) -> EsResult<Vec<u8>> {
    if !(1..=4).contains(&nalu_size_length) {
        return Err(EsError::InvalidArgument(format!(
            "NALU 长度前缀宽度必须为 1-4, 实际为 {}",
            nalu_size_length
        )));
    }
    let vps = store
        .vps_list()
        .first()
        .ok_or_else(|| EsError::InvalidArgument("H.265: 构建 hvcC 需要至少一个 VPS".into()))?;
    let sps = store
        .sps_list()
        .first()
        .ok_or_else(|| EsError::InvalidArgument("H.265: 构建 hvcC 需要至少一个 SPS".into()))?;
    let sps = &sps.params;

    let min_spatial = sps.min_spatial_segmentation_idc.min(0x0FFF) as u16;
    let mut out = Vec::with_capacity(128);
    out.push(1);
    out.extend_from_slice(&vps.params.ptl.general);
    out.extend_from_slice(&(0xF000 | min_spatial).to_be_bytes());
    out.push(0xFC); // parallelismType = 0
    out.push(0xFC | (sps.chroma_format_idc as u8 & 0x03));
    out.push(0xF8 | ((sps.bit_depth_luma - 8) as u8 & 0x07));
    out.push(0xF8 | ((sps.bit_depth_chroma - 8) as u8 & 0x07));
    out.extend_from_slice(&0u16.to_be_bytes()); // avgFrameRate
    out.push(
        ((sps.max_sub_layers as u8 & 0x07) << 3)
            | (u8::from(sps.temporal_id_nesting) << 2)
            | (nalu_size_length as u8 - 1),
    );

    let vps_nalus: Vec<&Bytes> = store.vps_list().iter().map(|e| &e.nalu).collect();
    let sps_nalus: Vec<&Bytes> = store.sps_list().iter().map(|e| &e.nalu).collect();
    let pps_nalus: Vec<&Bytes> = store.pps_list().iter().map(|e| &e.nalu).collect();
    let sei_nalus: Vec<&Bytes> = store.sei().iter().collect();
    let arrays = [
        (NAL_VPS, true, vps_nalus),
        (NAL_SPS, true, sps_nalus),
        (NAL_PPS, true, pps_nalus),
        (NAL_PREFIX_SEI, false, sei_nalus),
    ];

    out.push(arrays.iter().filter(|(_, _, n)| !n.is_empty()).count() as u8);
    for (nal_type, complete, nalus) in &arrays {
        if !nalus.is_empty() {
            write_array(&mut out, *nal_type, *complete, nalus)?;
        }
    }
    Ok(out)
}

/// 解析 hvcC
pub fn unpack_hevc_config(data: &[u8]) -> EsResult<HevcConfigRecord> {
    let mut rd = RecordReader::new(data);
    let parse = |rd: &mut RecordReader<'_>| -> EsResult<HevcConfigRecord> {
        let version = rd.u8()?;
        if version != 1 {
            return Err(EsError::Unsupported(format!(
                "H.265: hvcC 版本 {} 不受支持",
                version
            )));
        }
        let mut general_ptl = [0u8; GENERAL_PTL_LEN];
        general_ptl.copy_from_slice(rd.bytes(GENERAL_PTL_LEN)?);
        let min_spatial_segmentation_idc = rd.u16()? & 0x0FFF;
        rd.u8()?; // parallelismType
        let chroma_format_idc = rd.u8()? & 0x03;
        let bit_depth_luma = (rd.u8()? & 0x07) + 8;
        let bit_depth_chroma = (rd.u8()? & 0x07) + 8;
        rd.u16()?; // avgFrameRate
        let flags = rd.u8()?;
        let num_arrays = rd.u8()?;
        let mut arrays = Vec::with_capacity(num_arrays as usize);
        for _ in 0..num_arrays {
            let header = rd.u8()?;
            let count = rd.u16()?;
            let nalus = (0..count)
                .map(|_| rd.u16_prefixed())
                .collect::<EsResult<Vec<_>>>()?;
            arrays.push(HevcNalArray {
                complete: header & 0x80 != 0,
                nal_type: header & 0x3F,
                nalus,
            });
        }
        Ok(HevcConfigRecord {
            general_ptl,
            min_spatial_segmentation_idc,
            chroma_format_idc,
            bit_depth_luma,
            bit_depth_chroma,
            num_temporal_layers: (flags >> 3) & 0x07,
            temporal_id_nested: flags & 0x04 != 0,
            nalu_size_length: usize::from(flags & 0x03) + 1,
            arrays,
        })
    };
    parse(&mut rd).map_err(|e| {
        if e.is_eof() {
            EsError::InvalidData("H.265: hvcC 数据截断".into())
        } else {
            e
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_store::ParamKind;
    use crate::synth::{
        HEVC_MAIN_PTL, HevcPpsParams, HevcSpsParams, hevc_pps, hevc_recovery_point_sei, hevc_sps,
        hevc_vps,
    };

    fn ready_store(sps_params: &HevcSpsParams) -> (ParameterSetStore<Hevc>, [Vec<u8>; 3]) {
        let nalus = [
            hevc_vps(0),
            hevc_sps(sps_params),
            hevc_pps(&HevcPpsParams::default()),
        ];
        let mut store = ParameterSetStore::<Hevc>::new(true);
        for (kind, nalu) in [ParamKind::Vps, ParamKind::Sps, ParamKind::Pps]
            .into_iter()
            .zip(&nalus)
        {
            store.register(kind, Bytes::from(nalu.clone())).unwrap();
        }
        (store, nalus)
    }

    #[test]
    fn test_pack_header_fields() {
        let (store, _) = ready_store(&HevcSpsParams {
            min_spatial_segmentation: Some(0x123),
            ..HevcSpsParams::default()
        });
        let record = pack_hevc_config(&store, 4).unwrap();
        assert_eq!(record[0], 1);
        assert_eq!(&record[1..13], &HEVC_MAIN_PTL);
        assert_eq!(&record[13..15], &[0xF1, 0x23]);
        assert_eq!(record[15], 0xFC);
        assert_eq!(record[16], 0xFD, "4:2:0");
        assert_eq!(record[17], 0xF8);
        assert_eq!(record[18], 0xF8);
        assert_eq!(record[21], (1 << 3) | (1 << 2) | 3);
        assert_eq!(record[22], 3, "VPS/SPS/PPS 三个数组");
        assert_eq!(record[23], 0x80 | 0x40 | 32);
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let (store, nalus) = ready_store(&HevcSpsParams::default());
        let record = pack_hevc_config(&store, 4).unwrap();
        let parsed = unpack_hevc_config(&record).unwrap();
        assert_eq!(parsed.general_ptl, HEVC_MAIN_PTL);
        assert_eq!(parsed.nalu_size_length, 4);
        assert_eq!(parsed.num_temporal_layers, 1);
        assert!(parsed.temporal_id_nested);
        assert_eq!(parsed.nalus(32), vec![nalus[0].as_slice()]);
        assert_eq!(parsed.nalus(33), vec![nalus[1].as_slice()]);
        assert_eq!(parsed.nalus(34), vec![nalus[2].as_slice()]);
        assert!(parsed.arrays.iter().all(|a| a.complete));
    }

    #[test]
    fn test_sei_array_incomplete() {
        let (mut store, _) = ready_store(&HevcSpsParams::default());
        let sei = hevc_recovery_point_sei();
        store.add_sei(Bytes::from(sei.clone()));
        let parsed = unpack_hevc_config(&pack_hevc_config(&store, 2).unwrap()).unwrap();
        assert_eq!(parsed.arrays.len(), 4);
        let sei_array = &parsed.arrays[3];
        assert_eq!(sei_array.nal_type, 39);
        assert!(!sei_array.complete, "SEI 数组 completeness 为 0");
        assert_eq!(sei_array.nalus, vec![sei]);
    }

    #[test]
    fn test_unpack_truncated() {
        let (store, _) = ready_store(&HevcSpsParams::default());
        let record = pack_hevc_config(&store, 4).unwrap();
        let err = unpack_hevc_config(&record[..30]).unwrap_err();
        assert!(matches!(err, EsError::InvalidData(_)), "实际错误: {:?}", err);
    }
}
