//! 帧时长直方图.
//!
//! 统计每帧时长出现的次数, 取众数作为流的默认帧时长, 并吸附到最接近的标准帧率.

use std::collections::BTreeMap;

/// 没有任何样本时使用的帧时长 (25 fps)
pub const FALLBACK_DURATION: i64 = 40_000_000;

/// 吸附到标准帧率的最大误差 (20 微秒)
const SNAP_TOLERANCE: i64 = 20_000;

/// 标准帧时长 (纳秒): PAL/电影/NTSC 及其 1000/1001 变体
const CANONICAL_DURATIONS: [i64; 10] = [
    1_000_000_000 / 50,
    1_000_000_000 / 48,
    1_000_000_000 / 24,
    1_000_000_000 / 25,
    1_000_000_000 / 60,
    1_000_000_000 / 30,
    1_000_000_000 * 1001 / 48_000,
    1_000_000_000 * 1001 / 24_000,
    1_000_000_000 * 1001 / 60_000,
    1_000_000_000 * 1001 / 30_000,
];

/// 帧时长直方图
#[derive(Debug, Clone, Default)]
pub struct DurationEstimator {
    counts: BTreeMap<i64, u64>,
}

impl DurationEstimator {
    /// 创建空直方图
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个帧时长 (纳秒)
    pub fn add(&mut self, duration: i64) {
        *self.counts.entry(duration).or_insert(0) += 1;
    }

    /// 样本总数
    pub fn len(&self) -> u64 {
        self.counts.values().sum()
    }

    /// 是否没有样本
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// 出现次数最多的帧时长
    ///
    /// 与某个标准帧时长相差不超过 20 微秒时返回该标准值, 否则返回原始众数.
    /// 次数相同时取较小的时长.
    pub fn most_common(&self) -> i64 {
        let mut best: Option<(i64, u64)> = None;
        for (&duration, &count) in &self.counts {
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((duration, count));
            }
        }
        let Some((mode, _)) = best else {
            return FALLBACK_DURATION;
        };

        CANONICAL_DURATIONS
            .iter()
            .copied()
            .map(|canonical| (canonical, (canonical - mode).abs()))
            .filter(|&(_, diff)| diff <= SNAP_TOLERANCE)
            .min_by_key(|&(_, diff)| diff)
            .map_or(mode, |(canonical, _)| canonical)
    }
}
