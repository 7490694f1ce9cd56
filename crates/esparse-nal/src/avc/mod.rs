//! H.264/AVC 编码参数.
//!
//! - [`nal`]: NAL 头部与类型
//! - [`sps`] / [`pps`]: 参数集解析
//! - [`slice`]: slice header 解析
//! - [`record`]: avcC 配置记录

pub mod nal;
pub mod pps;
pub mod record;
pub mod slice;
pub mod sps;

use esparse_core::{EsError, EsResult};

use crate::codec::{Codec, NalClass, NoVps, ParsedSps, SliceInfo};
use crate::param_store::ParameterSetStore;

pub use nal::{AvcNalType, parse_nal_header};
pub use pps::AvcPps;
pub use record::{AvcConfigRecord, pack_avc_config, unpack_avc_config};
pub use sps::AvcSps;

/// H.264/AVC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Avc;

impl Codec for Avc {
    const NAME: &'static str = "H.264";
    const NAL_HEADER_LEN: usize = 1;
    const USES_VPS: bool = false;

    type NalType = AvcNalType;
    type Vps = NoVps;
    type Sps = AvcSps;
    type Pps = AvcPps;

    fn nal_type(nal: &[u8]) -> EsResult<AvcNalType> {
        parse_nal_header(nal).map(|(nal_type, _)| nal_type)
    }

    fn nal_type_id(nal_type: AvcNalType) -> u8 {
        nal_type.type_id()
    }

    fn classify(nal_type: AvcNalType) -> NalClass {
        nal_type.class()
    }

    fn parse_vps(_nal: &[u8]) -> EsResult<NoVps> {
        Err(EsError::Unsupported("H.264 没有 VPS".into()))
    }

    fn parse_sps(nal: &[u8], keep_ar_info: bool) -> EsResult<ParsedSps<AvcSps>> {
        sps::parse_sps(nal, keep_ar_info)
    }

    fn parse_pps(nal: &[u8]) -> EsResult<AvcPps> {
        pps::parse_pps(nal)
    }

    fn parse_slice(
        nal: &[u8],
        nal_type: AvcNalType,
        store: &ParameterSetStore<Self>,
    ) -> EsResult<SliceInfo> {
        slice::parse_slice_header(nal, nal_type, store)
    }

    fn pack_config(store: &ParameterSetStore<Self>, nalu_size_length: usize) -> EsResult<Vec<u8>> {
        pack_avc_config(store, nalu_size_length)
    }

    /// 主编码图像第一个 VCL NAL 的判定 (H.264 7.4.1.2.4)
    fn starts_new_picture(prev: &SliceInfo, cur: &SliceInfo) -> bool {
        cur.first_slice_in_picture
            || prev.frame_num != cur.frame_num
            || prev.pps_id != cur.pps_id
            || prev.field_pic != cur.field_pic
            || prev.bottom_field != cur.bottom_field
            || prev.is_reference != cur.is_reference
            || prev.random_access != cur.random_access
            || prev.idr_pic_id != cur.idr_pic_id
            || prev.pic_order_cnt_lsb != cur.pic_order_cnt_lsb
            || prev.delta_pic_order_cnt_bottom != cur.delta_pic_order_cnt_bottom
            || prev.delta_pic_order_cnt != cur.delta_pic_order_cnt
    }
}
