//! 显示顺序重建与时间戳分配.
//!
//! 解码顺序的帧按关键帧切分为序列, 每个序列整理一次:
//! 1. 首帧强制为关键帧
//! 2. 由 POC 推导显示顺序并稳定排序; 序列中途 SPS 变化时, 之后的帧保持解码顺序
//! 3. 按显示顺序分配时间戳: 外部时间戳从小到大依次使用, 其余帧接续前一帧的结束时间
//! 4. 恢复解码顺序, 计算参考偏移并记录帧时长

use esparse_core::{EsError, EsResult};
use log::debug;

use crate::codec::{PocCycle, PocMode, SliceInfo};
use crate::config::ParserConfig;
use crate::duration::{DurationEstimator, FALLBACK_DURATION};
use crate::frame::Frame;

/// 序列内的 POC 推导状态
#[derive(Debug, Default)]
struct PocState {
    prev_msb: i64,
    prev_lsb: i64,
    prev_frame_num: u32,
    prev_frame_num_offset: i64,
}

impl PocState {
    fn compute(&mut self, slice: &SliceInfo) -> i64 {
        match &slice.poc_mode {
            PocMode::Lsb { log2_max_poc_lsb } => self.from_lsb(slice, *log2_max_poc_lsb),
            PocMode::FrameNumCycle(cycle) => self.from_cycle(slice, cycle),
            PocMode::FrameNum { log2_max_frame_num } => {
                self.from_frame_num(slice, *log2_max_frame_num)
            }
        }
    }

    /// AVC POC type 0 与 HEVC: 由 lsb 的半模回绕推导 msb
    fn from_lsb(&mut self, slice: &SliceInfo, log2_max_poc_lsb: u32) -> i64 {
        let max_lsb = 1i64 << log2_max_poc_lsb;
        let lsb = i64::from(slice.pic_order_cnt_lsb);

        let msb = if slice.random_access {
            0
        } else if lsb < self.prev_lsb && self.prev_lsb - lsb >= max_lsb / 2 {
            self.prev_msb + max_lsb
        } else if lsb > self.prev_lsb && lsb - self.prev_lsb > max_lsb / 2 {
            self.prev_msb - max_lsb
        } else {
            self.prev_msb
        };

        // 非参考帧不更新状态
        if slice.random_access || slice.is_reference {
            self.prev_msb = msb;
            self.prev_lsb = lsb;
        }

        let top = msb + lsb;
        let bottom_delta = i64::from(slice.delta_pic_order_cnt_bottom);
        if !slice.field_pic && bottom_delta < 0 {
            top + bottom_delta
        } else {
            top
        }
    }

    fn frame_num_offset(&mut self, slice: &SliceInfo, log2_max_frame_num: u32) -> i64 {
        let offset = if slice.random_access {
            0
        } else if self.prev_frame_num > slice.frame_num {
            self.prev_frame_num_offset + (1i64 << log2_max_frame_num)
        } else {
            self.prev_frame_num_offset
        };
        self.prev_frame_num = slice.frame_num;
        self.prev_frame_num_offset = offset;
        offset
    }

    /// AVC POC type 1
    fn from_cycle(&mut self, slice: &SliceInfo, cycle: &PocCycle) -> i64 {
        let offset = self.frame_num_offset(slice, cycle.log2_max_frame_num);
        let cycle_len = cycle.offset_for_ref_frame.len() as i64;

        let mut abs_frame_num = if cycle_len != 0 {
            offset + i64::from(slice.frame_num)
        } else {
            0
        };
        if !slice.is_reference && abs_frame_num > 0 {
            abs_frame_num -= 1;
        }

        let mut expected = 0i64;
        if abs_frame_num > 0 {
            let cycle_count = (abs_frame_num - 1) / cycle_len;
            let in_cycle = ((abs_frame_num - 1) % cycle_len) as usize;
            let delta_per_cycle: i64 = cycle.offset_for_ref_frame.iter().map(|&v| i64::from(v)).sum();
            expected = cycle_count * delta_per_cycle
                + cycle.offset_for_ref_frame[..=in_cycle]
                    .iter()
                    .map(|&v| i64::from(v))
                    .sum::<i64>();
        }
        if !slice.is_reference {
            expected += i64::from(cycle.offset_for_non_ref_pic);
        }

        let top_to_bottom = i64::from(cycle.offset_for_top_to_bottom_field);
        let [delta0, delta1] = slice.delta_pic_order_cnt.map(i64::from);
        if !slice.field_pic {
            let top = expected + delta0;
            let bottom = top + top_to_bottom + delta1;
            top.min(bottom)
        } else if slice.bottom_field {
            expected + top_to_bottom + delta0
        } else {
            expected + delta0
        }
    }

    /// AVC POC type 2
    fn from_frame_num(&mut self, slice: &SliceInfo, log2_max_frame_num: u32) -> i64 {
        let offset = self.frame_num_offset(slice, log2_max_frame_num);
        if slice.random_access {
            return 0;
        }
        let doubled = 2 * (offset + i64::from(slice.frame_num));
        if slice.is_reference {
            doubled
        } else {
            doubled - 1
        }
    }
}

/// 显示顺序重建器, 在整个流的生命周期内保存时间轴状态
#[derive(Debug)]
pub struct OrderReconstructor {
    forced_default_duration: Option<i64>,
    container_default_duration: Option<i64>,
    stream_default_duration: Option<i64>,
    max_timecode: i64,
    durations: DurationEstimator,
}

impl OrderReconstructor {
    /// 按解析器配置创建
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            forced_default_duration: config.forced_default_duration,
            container_default_duration: config.container_default_duration,
            stream_default_duration: None,
            max_timecode: 0,
            durations: DurationEstimator::new(),
        }
    }

    /// 设置流默认帧时长; 只有第一次设置生效
    pub fn set_stream_default_duration(&mut self, duration: i64) {
        if self.stream_default_duration.is_none() && duration > 0 {
            debug!("流默认帧时长: {} ns", duration);
            self.stream_default_duration = Some(duration);
        }
    }

    /// 流默认帧时长
    pub fn stream_default_duration(&self) -> Option<i64> {
        self.stream_default_duration
    }

    /// 已分配的最大结束时间
    pub fn max_timecode(&self) -> i64 {
        self.max_timecode
    }

    /// 帧时长直方图
    pub fn durations(&self) -> &DurationEstimator {
        &self.durations
    }

    /// 一帧的时长
    ///
    /// 依次取: 强制时长, 活动 SPS 的 timing, 流默认时长, 容器默认时长, 固定值.
    /// 场图像取一半.
    pub fn duration_for(&self, slice: &SliceInfo) -> i64 {
        let duration = self
            .forced_default_duration
            .or(slice.sps_frame_duration)
            .or(self.stream_default_duration)
            .or(self.container_default_duration)
            .unwrap_or(FALLBACK_DURATION);
        if slice.field_pic {
            duration / 2
        } else {
            duration
        }
    }

    /// 整理一个解码顺序序列
    ///
    /// `timecodes` 是附加到本序列各帧上的外部时间戳. 返回按解码顺序排列、
    /// 已分配时间戳的帧.
    pub fn cleanup(&mut self, mut run: Vec<Frame>, mut timecodes: Vec<i64>) -> EsResult<Vec<Frame>> {
        let Some(first) = run.first_mut() else {
            return Ok(run);
        };
        first.keyframe = true;

        let sps_id = first.slice.sps_id;
        let poc_len = run
            .iter()
            .position(|f| f.slice.sps_id != sps_id)
            .unwrap_or(run.len());
        if poc_len < run.len() {
            debug!(
                "SPS 在第 {} 帧从 {} 变为 {}, 其后的帧按解码顺序输出",
                run[poc_len].decode_order, sps_id, run[poc_len].slice.sps_id
            );
        }

        let mut poc = PocState::default();
        for frame in &mut run[..poc_len] {
            frame.presentation_order = poc.compute(&frame.slice);
        }
        run[..poc_len].sort_by_key(|f| f.presentation_order);
        let base = run[..poc_len]
            .last()
            .map_or(0, |f| f.presentation_order + 1);
        for (i, frame) in run[poc_len..].iter_mut().enumerate() {
            frame.presentation_order = base + i as i64;
        }

        timecodes.sort_unstable();
        let mut timecodes = timecodes.into_iter();
        let mut prev_end: Option<i64> = None;
        for frame in &mut run {
            let start = if frame.has_provided_timecode {
                timecodes.next().ok_or_else(|| {
                    EsError::Internal(format!(
                        "外部时间戳不足: 第 {} 帧没有可用的时间戳",
                        frame.decode_order
                    ))
                })?
            } else {
                prev_end.unwrap_or(self.max_timecode)
            };
            frame.start = start;
            frame.end = start + self.duration_for(&frame.slice);
            prev_end = Some(frame.end);
            self.max_timecode = self.max_timecode.max(frame.end);
        }

        run.sort_by_key(|f| f.decode_order);
        if let Some(pair) = run
            .windows(2)
            .find(|w| w[1].decode_order != w[0].decode_order + 1)
        {
            return Err(EsError::Internal(format!(
                "解码顺序不连续: {} 之后是 {}",
                pair[0].decode_order, pair[1].decode_order
            )));
        }

        let mut prev_start: Option<i64> = None;
        for frame in &mut run {
            frame.ref_delta = prev_start.map(|p| p - frame.start);
            prev_start = Some(frame.start);
            self.durations.add(frame.duration());
        }
        Ok(run)
    }
}
