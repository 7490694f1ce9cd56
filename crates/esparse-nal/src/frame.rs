//! 输出帧.

use bytes::Bytes;

use crate::codec::{SliceInfo, SliceType};

/// 一个访问单元
///
/// `data` 是若干带长度前缀的 NALU: 先是帧前缓存的参数集/SEI 等带外 NALU,
/// 然后是本帧的切片. 时间戳在所在的解码顺序序列整理后才有效.
#[derive(Debug, Clone)]
pub struct Frame {
    /// 带长度前缀的 NALU 序列
    pub data: Bytes,
    /// 是否为关键帧
    pub keyframe: bool,
    /// 第一个切片的 header 信息
    pub slice: SliceInfo,
    /// 是否附带了外部提供的时间戳
    pub has_provided_timecode: bool,
    /// 开始时间 (纳秒)
    pub start: i64,
    /// 结束时间 (纳秒)
    pub end: i64,
    /// 参考偏移: 解码顺序上前一帧的开始时间减去本帧的开始时间; 序列首帧为 None
    pub ref_delta: Option<i64>,
    /// 解码顺序编号, 从 0 开始连续递增
    pub decode_order: u64,
    /// 显示顺序 (POC 或解码顺序)
    pub presentation_order: i64,
    /// 第一个切片在输入流中的字节偏移
    pub offset: u64,
}

impl Frame {
    /// 帧时长 (纳秒)
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    /// 第一个切片的类型
    pub fn slice_type(&self) -> SliceType {
        self.slice.slice_type
    }
}

/// 正在组装的帧
#[derive(Debug)]
pub(crate) struct FrameBuilder {
    pub(crate) data: Vec<u8>,
    pub(crate) keyframe: bool,
    pub(crate) first_slice: SliceInfo,
    pub(crate) last_slice: SliceInfo,
    pub(crate) has_provided_timecode: bool,
    pub(crate) offset: u64,
}

impl FrameBuilder {
    pub(crate) fn new(slice: SliceInfo, keyframe: bool, offset: u64) -> Self {
        Self {
            data: Vec::new(),
            keyframe,
            first_slice: slice.clone(),
            last_slice: slice,
            has_provided_timecode: false,
            offset,
        }
    }

    /// 结束组装, 分配解码顺序
    pub(crate) fn finish(self, decode_order: u64) -> Frame {
        Frame {
            data: Bytes::from(self.data),
            keyframe: self.keyframe,
            slice: self.first_slice,
            has_provided_timecode: self.has_provided_timecode,
            start: 0,
            end: 0,
            ref_delta: None,
            decode_order,
            presentation_order: 0,
            offset: self.offset,
        }
    }
}
