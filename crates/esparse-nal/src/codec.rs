//! 编码类型抽象.
//!
//! AVC 与 HEVC 的基本流解析流程相同, 只在 NAL 头部格式、参数集语法、slice header
//! 字段宽度和配置记录布局上不同. 这些差异收敛到 [`Codec`] trait, 解析引擎
//! [`crate::parser::EsParser`] 对两者共用.

use std::fmt::{Debug, Display};

use esparse_core::{EsResult, Rational};

use crate::param_store::ParameterSetStore;

/// NAL 单元在解析流程中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalClass {
    /// 视频参数集 (仅 HEVC)
    Vps,
    /// 序列参数集
    Sps,
    /// 图像参数集
    Pps,
    /// 前缀 SEI (AVC 的所有 SEI)
    PrefixSei,
    /// 后缀 SEI (HEVC), 附加到当前帧
    SuffixSei,
    /// 访问单元分隔符
    AccessUnitDelimiter,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    Filler,
    /// 图像切片
    Slice,
    /// 其他类型
    Other,
}

impl NalClass {
    /// 是否为参数集
    pub fn is_parameter_set(self) -> bool {
        matches!(self, Self::Vps | Self::Sps | Self::Pps)
    }
}

/// 切片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliceType {
    /// 前向预测 (AVC 的 SP 归入此类)
    P,
    /// 双向预测
    B,
    /// 帧内 (AVC 的 SI 归入此类)
    I,
}

impl Display for SliceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P => write!(f, "P"),
            Self::B => write!(f, "B"),
            Self::I => write!(f, "I"),
        }
    }
}

/// POC type 1 的循环参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PocCycle {
    /// log2(MaxFrameNum)
    pub log2_max_frame_num: u32,
    /// offset_for_non_ref_pic
    pub offset_for_non_ref_pic: i32,
    /// offset_for_top_to_bottom_field
    pub offset_for_top_to_bottom_field: i32,
    /// offset_for_ref_frame 列表
    pub offset_for_ref_frame: Vec<i32>,
}

/// 图像顺序计数 (POC) 的推导方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PocMode {
    /// 由 pic_order_cnt_lsb 和回绕推导 (AVC type 0, HEVC)
    Lsb {
        /// log2(MaxPicOrderCntLsb)
        log2_max_poc_lsb: u32,
    },
    /// 由 frame_num 和期望增量循环推导 (AVC type 1)
    FrameNumCycle(PocCycle),
    /// 直接由 frame_num 推导 (AVC type 2)
    FrameNum {
        /// log2(MaxFrameNum)
        log2_max_frame_num: u32,
    },
}

/// VUI timing 信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingInfo {
    /// num_units_in_tick
    pub num_units_in_tick: u32,
    /// time_scale
    pub time_scale: u32,
}

impl TimingInfo {
    /// `ticks` 个时钟周期对应的纳秒数; time_scale 为 0 时返回 None
    pub fn ticks_to_ns(&self, ticks: u64) -> Option<i64> {
        if self.time_scale == 0 || self.num_units_in_tick == 0 {
            return None;
        }
        let ns = 1_000_000_000u128 * u128::from(self.num_units_in_tick) * u128::from(ticks)
            / u128::from(self.time_scale);
        i64::try_from(ns).ok()
    }
}

/// slice header 中与分帧和排序相关的字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceInfo {
    /// NAL 类型编号
    pub nal_type: u8,
    /// NAL 类型是否满足随机访问条件 (AVC: IDR; HEVC: IRAP)
    pub random_access: bool,
    /// 是否可被其他图像参考 (AVC: nal_ref_idc != 0)
    pub is_reference: bool,
    /// 引用的 PPS id
    pub pps_id: u32,
    /// 经 PPS 解析得到的 SPS id
    pub sps_id: u32,
    /// 是否为图像的第一个切片
    pub first_slice_in_picture: bool,
    /// 切片类型
    pub slice_type: SliceType,
    /// frame_num (AVC)
    pub frame_num: u32,
    /// field_pic_flag (AVC)
    pub field_pic: bool,
    /// bottom_field_flag (AVC)
    pub bottom_field: bool,
    /// idr_pic_id (AVC IDR)
    pub idr_pic_id: Option<u32>,
    /// pic_order_cnt_lsb
    pub pic_order_cnt_lsb: u32,
    /// delta_pic_order_cnt_bottom (AVC POC type 0)
    pub delta_pic_order_cnt_bottom: i32,
    /// delta_pic_order_cnt[0..2] (AVC POC type 1)
    pub delta_pic_order_cnt: [i32; 2],
    /// 活动 SPS 的 POC 推导方式
    pub poc_mode: PocMode,
    /// 活动 SPS 的 timing 信息换算出的帧时长 (纳秒)
    pub sps_frame_duration: Option<i64>,
}

/// 可按 id 注册的参数集
pub trait ParameterSet: Debug + Clone {
    /// 参数集 id
    fn id(&self) -> u32;
}

/// 序列参数集需要向解析引擎提供的信息
pub trait SequenceParameters: ParameterSet {
    /// 引用的 VPS id (HEVC)
    fn vps_id(&self) -> Option<u32> {
        None
    }
    /// 图像宽度 (像素, 已裁剪)
    fn width(&self) -> u32;
    /// 图像高度 (像素, 已裁剪)
    fn height(&self) -> u32;
    /// 像素宽高比
    fn sample_aspect_ratio(&self) -> Option<Rational>;
    /// VUI timing 信息
    fn timing(&self) -> Option<TimingInfo>;
    /// 一帧的时长 (纳秒)
    fn frame_duration(&self) -> Option<i64>;
    /// POC 推导方式
    fn poc_mode(&self) -> PocMode;
}

/// 图像参数集需要向解析引擎提供的信息
pub trait PictureParameters: ParameterSet {
    /// 引用的 SPS id
    fn sps_id(&self) -> u32;
}

/// 不存在的参数集类型 (AVC 没有 VPS)
#[derive(Debug, Clone)]
pub enum NoVps {}

impl ParameterSet for NoVps {
    fn id(&self) -> u32 {
        match *self {}
    }
}

/// SPS 解析结果
#[derive(Debug, Clone)]
pub struct ParsedSps<S> {
    /// 解码后的字段
    pub sps: S,
    /// 去除宽高比信息后重写的 NALU (仅在不保留宽高比且原 SPS 含该信息时存在)
    pub rewritten: Option<Vec<u8>>,
}

/// 编码类型
pub trait Codec: Debug + Sized + 'static {
    /// 编码名称
    const NAME: &'static str;
    /// NAL 头部字节数
    const NAL_HEADER_LEN: usize;
    /// 是否需要 VPS
    const USES_VPS: bool;

    /// NAL 类型标签
    type NalType: Copy + Debug + Display + PartialEq + Eq;
    /// 视频参数集
    type Vps: ParameterSet;
    /// 序列参数集
    type Sps: SequenceParameters;
    /// 图像参数集
    type Pps: PictureParameters;

    /// 解析 NAL 头部得到类型
    fn nal_type(nal: &[u8]) -> EsResult<Self::NalType>;
    /// NAL 类型编号
    fn nal_type_id(nal_type: Self::NalType) -> u8;
    /// NAL 类型在解析流程中的角色
    fn classify(nal_type: Self::NalType) -> NalClass;
    /// 解析 VPS NALU
    fn parse_vps(nal: &[u8]) -> EsResult<Self::Vps>;
    /// 解析 SPS NALU; `keep_ar_info` 为 false 时同时生成去除宽高比信息的 NALU
    fn parse_sps(nal: &[u8], keep_ar_info: bool) -> EsResult<ParsedSps<Self::Sps>>;
    /// 解析 PPS NALU
    fn parse_pps(nal: &[u8]) -> EsResult<Self::Pps>;
    /// 解析 slice header
    fn parse_slice(
        nal: &[u8],
        nal_type: Self::NalType,
        store: &ParameterSetStore<Self>,
    ) -> EsResult<SliceInfo>;
    /// 生成配置记录 (avcC / hvcC)
    fn pack_config(store: &ParameterSetStore<Self>, nalu_size_length: usize)
    -> EsResult<Vec<u8>>;

    /// `cur` 是否开始一个新图像 (`prev` 为当前帧最后一个切片)
    fn starts_new_picture(_prev: &SliceInfo, cur: &SliceInfo) -> bool {
        cur.first_slice_in_picture
    }
}
