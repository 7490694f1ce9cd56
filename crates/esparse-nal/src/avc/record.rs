//! AVCDecoderConfigurationRecord (avcC) 的生成与解析.
//!
//! ```text
//! configurationVersion(8) = 1
//! AVCProfileIndication(8) | profile_compatibility(8) | AVCLevelIndication(8)
//! reserved(6)=111111 | lengthSizeMinusOne(2)
//! reserved(3)=111 | numOfSequenceParameterSets(5)
//! { sequenceParameterSetLength(16), sequenceParameterSetNALUnit }*
//! numOfPictureParameterSets(8)
//! { pictureParameterSetLength(16), pictureParameterSetNALUnit }*
//! ```

use esparse_core::{EsError, EsResult};

use crate::param_store::ParameterSetStore;
use crate::size_prefix::{RecordReader, write_u16_prefixed};

use super::Avc;

/// avcC 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcConfigRecord {
    /// AVCProfileIndication
    pub profile_idc: u8,
    /// profile_compatibility
    pub constraint_flags: u8,
    /// AVCLevelIndication
    pub level_idc: u8,
    /// NALU 长度前缀宽度
    pub nalu_size_length: usize,
    /// SPS NALU 列表
    pub sps: Vec<Vec<u8>>,
    /// PPS NALU 列表
    pub pps: Vec<Vec<u8>>,
}

fn check_size_length(nalu_size_length: usize) -> EsResult<u8> {
    if !(1..=4).contains(&nalu_size_length) {
        return Err(EsError::InvalidArgument(format!(
            "NALU 长度前缀宽度必须为 1-4, 实际为 {}",
            nalu_size_length
        )));
    }
    Ok(nalu_size_length as u8 - 1)
}

/// 由参数集存储生成 avcC
///
/// profile/level 取自第一个 SPS 的前三个载荷字节.
pub fn pack_avc_config(store: &ParameterSetStore<Avc>, nalu_size_length: usize) -> EsResult<Vec<u8>> {
    let length_minus_one = check_size_length(nalu_size_length)?;
    let first = store
        .sps_list()
        .first()
        .ok_or_else(|| EsError::InvalidArgument("H.264: 构建 avcC 需要至少一个 SPS".into()))?;
    if first.nalu.len() < 4 {
        return Err(EsError::InvalidData("H.264: SPS 数据太短".into()));
    }
    let sps_count = store.sps_list().len();
    let pps_count = store.pps_list().len();
    if sps_count > 31 || pps_count > 255 {
        return Err(EsError::InvalidData(format!(
            "H.264: 参数集过多, sps={}, pps={}",
            sps_count, pps_count
        )));
    }

    let mut out = vec![
        1,
        first.nalu[1],
        first.nalu[2],
        first.nalu[3],
        0xFC | length_minus_one,
        0xE0 | sps_count as u8,
    ];
    for sps in store.sps_list().iter() {
        write_u16_prefixed(&mut out, &sps.nalu)?;
    }
    out.push(pps_count as u8);
    for pps in store.pps_list().iter() {
        write_u16_prefixed(&mut out, &pps.nalu)?;
    }
    Ok(out)
}

/// 解析 avcC
pub fn unpack_avc_config(data: &[u8]) -> EsResult<AvcConfigRecord> {
    let truncated = |e: EsError| {
        if e.is_eof() {
            EsError::InvalidData("H.264: avcC 数据截断".into())
        } else {
            e
        }
    };
    let mut rd = RecordReader::new(data);
    let version = rd.u8().map_err(truncated)?;
    if version != 1 {
        return Err(EsError::Unsupported(format!(
            "H.264: avcC 版本 {} 不受支持",
            version
        )));
    }
    let profile_idc = rd.u8().map_err(truncated)?;
    let constraint_flags = rd.u8().map_err(truncated)?;
    let level_idc = rd.u8().map_err(truncated)?;
    let nalu_size_length = usize::from(rd.u8().map_err(truncated)? & 0x03) + 1;

    let sps_count = rd.u8().map_err(truncated)? & 0x1F;
    let sps = (0..sps_count)
        .map(|_| rd.u16_prefixed())
        .collect::<EsResult<Vec<_>>>()
        .map_err(truncated)?;
    let pps_count = rd.u8().map_err(truncated)?;
    let pps = (0..pps_count)
        .map(|_| rd.u16_prefixed())
        .collect::<EsResult<Vec<_>>>()
        .map_err(truncated)?;

    Ok(AvcConfigRecord {
        profile_idc,
        constraint_flags,
        level_idc,
        nalu_size_length,
        sps,
        pps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_store::ParamKind;
    use crate::synth::{AvcPpsParams, AvcSpsParams, avc_pps, avc_sps};
    use bytes::Bytes;

    fn ready_store() -> (ParameterSetStore<Avc>, Vec<u8>, Vec<u8>) {
        let sps = avc_sps(&AvcSpsParams::default());
        let pps = avc_pps(&AvcPpsParams::default());
        let mut store = ParameterSetStore::<Avc>::new(true);
        store
            .register(ParamKind::Sps, Bytes::from(sps.clone()))
            .unwrap();
        store
            .register(ParamKind::Pps, Bytes::from(pps.clone()))
            .unwrap();
        (store, sps, pps)
    }

    #[test]
    fn test_pack_layout() {
        let (store, sps, pps) = ready_store();
        let record = pack_avc_config(&store, 4).unwrap();
        assert_eq!(&record[..6], &[1, sps[1], sps[2], sps[3], 0xFF, 0xE1]);
        assert_eq!(
            u16::from_be_bytes([record[6], record[7]]) as usize,
            sps.len()
        );
        let pps_pos = 8 + sps.len();
        assert_eq!(record[pps_pos], 1, "PPS 个数");
        assert_eq!(&record[pps_pos + 3..], pps.as_slice());
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let (store, sps, pps) = ready_store();
        let record = pack_avc_config(&store, 2).unwrap();
        let parsed = unpack_avc_config(&record).unwrap();
        assert_eq!(parsed.profile_idc, 66);
        assert_eq!(parsed.nalu_size_length, 2);
        assert_eq!(parsed.sps, vec![sps]);
        assert_eq!(parsed.pps, vec![pps]);
    }

    #[test]
    fn test_pack_rejects_bad_size_length() {
        let (store, _, _) = ready_store();
        assert!(matches!(
            pack_avc_config(&store, 5),
            Err(EsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unpack_truncated() {
        let (store, _, _) = ready_store();
        let record = pack_avc_config(&store, 4).unwrap();
        let err = unpack_avc_config(&record[..record.len() - 1]).unwrap_err();
        assert!(matches!(err, EsError::InvalidData(_)), "实际错误: {:?}", err);
        assert!(unpack_avc_config(&[2, 0, 0, 0]).is_err());
    }
}
