//! H.265/HEVC 编码参数.
//!
//! - [`nal`]: 2 字节 NAL 头部与类型
//! - [`vps`] / [`sps`] / [`pps`]: 参数集解析
//! - [`slice`]: slice segment header 解析
//! - [`record`]: hvcC 配置记录

pub mod nal;
pub mod pps;
pub mod record;
pub mod slice;
pub mod sps;
pub mod vps;

use esparse_core::EsResult;

use crate::codec::{Codec, NalClass, ParsedSps, SliceInfo};
use crate::param_store::ParameterSetStore;

pub use nal::{HevcNalHeader, HevcNalType, parse_nal_header};
pub use pps::HevcPps;
pub use record::{HevcConfigRecord, HevcNalArray, pack_hevc_config, unpack_hevc_config};
pub use sps::{HevcSps, ShortTermRps};
pub use vps::{HevcVps, ProfileTierLevel};

/// H.265/HEVC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hevc;

impl Codec for Hevc {
    const NAME: &'static str = "H.265";
    const NAL_HEADER_LEN: usize = 2;
    const USES_VPS: bool = true;

    type NalType = HevcNalType;
    type Vps = HevcVps;
    type Sps = HevcSps;
    type Pps = HevcPps;

    fn nal_type(nal: &[u8]) -> EsResult<HevcNalType> {
        parse_nal_header(nal).map(|h| h.nal_type)
    }

    fn nal_type_id(nal_type: HevcNalType) -> u8 {
        nal_type.type_id()
    }

    fn classify(nal_type: HevcNalType) -> NalClass {
        nal_type.class()
    }

    fn parse_vps(nal: &[u8]) -> EsResult<HevcVps> {
        vps::parse_vps(nal)
    }

    fn parse_sps(nal: &[u8], keep_ar_info: bool) -> EsResult<ParsedSps<HevcSps>> {
        sps::parse_sps(nal, keep_ar_info)
    }

    fn parse_pps(nal: &[u8]) -> EsResult<HevcPps> {
        pps::parse_pps(nal)
    }

    fn parse_slice(
        nal: &[u8],
        nal_type: HevcNalType,
        store: &ParameterSetStore<Self>,
    ) -> EsResult<SliceInfo> {
        slice::parse_slice_header(nal, nal_type, store)
    }

    fn pack_config(store: &ParameterSetStore<Self>, nalu_size_length: usize) -> EsResult<Vec<u8>> {
        pack_hevc_config(store, nalu_size_length)
    }
}
