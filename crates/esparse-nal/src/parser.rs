//! 基本流解析引擎.
//!
//! 数据流: 字节块 → [`ByteStreamScanner`] → NAL 单元 → 参数集存储 / 切片解析 → 帧组装
//! → [`OrderReconstructor`] → 输出队列 (解码顺序, 已分配时间戳).
//!
//! 帧组装是一个两状态机 (无帧 / 帧内):
//! - 参数集: 结束当前帧, 注册到存储, 原始数据缓存为下一帧的前置数据
//! - 前缀 SEI: 结束当前帧, 检查恢复点, 缓存为前置数据
//! - 后缀 SEI: 附加到当前帧
//! - 切片: 新图像的第一个切片结束当前帧并开始新帧, 否则附加到当前帧
//! - AUD / 序列结束 / 流结束: 结束当前帧
//!
//! 存储尚未具备完整参数集时, 切片和 SEI 暂存, 参数集齐备后按原顺序重放.

use std::collections::VecDeque;

use bytes::Bytes;
use esparse_core::{EsError, EsResult, Rational, tolerate_eof};
use log::{debug, trace, warn};
use serde::Serialize;

use crate::avc::Avc;
use crate::codec::{Codec, NalClass, SequenceParameters, SliceType};
use crate::config::ParserConfig;
use crate::emulation::nalu_to_rbsp;
use crate::frame::{Frame, FrameBuilder};
use crate::hevc::Hevc;
use crate::nal::NalUnit;
use crate::param_store::{ParamKind, ParameterSetStore};
use crate::reorder::OrderReconstructor;
use crate::scanner::ByteStreamScanner;
use crate::sei;
use crate::size_prefix::{required_size_length, write_size_prefixed, write_size_unchecked};

/// H.264 基本流解析器
pub type AvcEsParser = EsParser<Avc>;

/// H.265 基本流解析器
pub type HevcEsParser = EsParser<Hevc>;

/// 解析统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParserStats {
    /// 送入的字节数
    pub bytes: u64,
    /// NAL 单元总数
    pub nal_units: u64,
    /// VPS 个数
    pub vps: u64,
    /// SPS 个数
    pub sps: u64,
    /// PPS 个数
    pub pps: u64,
    /// SEI 个数 (前缀与后缀)
    pub sei: u64,
    /// 切片个数
    pub slices: u64,
    /// 其他 NAL 单元个数 (AUD, 结束标记, 填充, 未知类型)
    pub other: u64,
    /// 因解析失败或参数集缺失而丢弃的 NAL 单元
    pub dropped: u64,
    /// 已整理的帧数
    pub frames: u64,
    /// 其中的关键帧数
    pub keyframes: u64,
}

impl ParserStats {
    fn count(&mut self, class: NalClass) {
        self.nal_units += 1;
        let counter = match class {
            NalClass::Vps => &mut self.vps,
            NalClass::Sps => &mut self.sps,
            NalClass::Pps => &mut self.pps,
            NalClass::PrefixSei | NalClass::SuffixSei => &mut self.sei,
            NalClass::Slice => &mut self.slices,
            NalClass::AccessUnitDelimiter
            | NalClass::EndOfSequence
            | NalClass::EndOfStream
            | NalClass::Filler
            | NalClass::Other => &mut self.other,
        };
        *counter += 1;
    }
}

/// 追加一个带长度前缀的 NALU; 按配置决定前缀宽度不足时报错还是截断
fn append_nalu(config: &ParserConfig, out: &mut Vec<u8>, nalu: &[u8]) -> EsResult<()> {
    let length = config.nalu_size_length;
    match write_size_prefixed(out, nalu, length) {
        Err(EsError::NaluSizeTooSmall { required_length })
            if config.ignore_nalu_size_length_errors =>
        {
            warn!(
                "NALU 长度 {} 需要 {} 字节前缀, 当前为 {} 字节, 截断写入",
                nalu.len(),
                required_length,
                length
            );
            write_size_unchecked(out, nalu.len(), length);
            out.extend_from_slice(nalu);
            Ok(())
        }
        other => other,
    }
}

/// Annex B 基本流解析器
#[derive(Debug)]
pub struct EsParser<C: Codec> {
    config: ParserConfig,
    scanner: ByteStreamScanner,
    store: ParameterSetStore<C>,
    /// 参数集齐备前暂存的 NAL 单元
    deferred: VecDeque<NalUnit>,
    /// 下一帧的前置 NALU
    extra_data: Vec<Bytes>,
    open: Option<FrameBuilder>,
    /// 自上一关键帧以来已结束的帧 (解码顺序)
    run: Vec<Frame>,
    run_timecodes: Vec<i64>,
    /// 外部时间戳及其送入时的流位置
    provided_timecodes: VecDeque<(i64, u64)>,
    reorder: OrderReconstructor,
    output: VecDeque<Frame>,
    next_decode_order: u64,
    recovery_point_pending: bool,
    b_since_keyframe: bool,
    first_frame_seen: bool,
    flushed: bool,
    stats: ParserStats,
}

impl<C: Codec> EsParser<C> {
    /// 创建解析器
    pub fn new(config: ParserConfig) -> EsResult<Self> {
        config.validate()?;
        Ok(Self {
            store: ParameterSetStore::new(config.keep_ar_info),
            reorder: OrderReconstructor::new(&config),
            config,
            scanner: ByteStreamScanner::new(),
            deferred: VecDeque::new(),
            extra_data: Vec::new(),
            open: None,
            run: Vec::new(),
            run_timecodes: Vec::new(),
            provided_timecodes: VecDeque::new(),
            output: VecDeque::new(),
            next_decode_order: 0,
            recovery_point_pending: false,
            b_since_keyframe: false,
            first_frame_seen: false,
            flushed: false,
            stats: ParserStats::default(),
        })
    }

    /// 送入一块 Annex B 数据
    ///
    /// 块边界可以任意. 单个 NAL 单元处理失败不影响同一块中的其余单元,
    /// 返回第一个错误.
    pub fn add_bytes(&mut self, data: &[u8]) -> EsResult<()> {
        if self.flushed {
            return Err(EsError::Internal(format!(
                "{}: flush 之后不能再送入数据",
                C::NAME
            )));
        }
        self.stats.bytes += data.len() as u64;

        let mut first_error = None;
        for nal in self.scanner.add_bytes(data) {
            if let Err(e) = self.handle_nal(nal) {
                if first_error.is_some() {
                    warn!("{}: {}", C::NAME, e);
                } else {
                    first_error = Some(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// 送入一个外部时间戳 (纳秒)
    ///
    /// 时间戳与当前流位置配对, 附加到之后开始的第一个帧.
    pub fn add_timecode(&mut self, timecode: i64) {
        self.provided_timecodes
            .push_back((timecode, self.scanner.stream_position()));
    }

    /// 结束输入: 输出尾部 NAL 单元, 结束当前帧并整理最后一个序列
    ///
    /// 只能调用一次.
    pub fn flush(&mut self) -> EsResult<()> {
        if self.flushed {
            return Err(EsError::Internal(format!("{}: flush 只能调用一次", C::NAME)));
        }
        self.flushed = true;

        if let Some(nal) = self.scanner.flush() {
            self.handle_nal(nal)?;
        }
        if !self.deferred.is_empty() {
            debug!(
                "{}: 参数集始终不完整, 丢弃 {} 个暂存 NAL 单元",
                C::NAME,
                self.deferred.len()
            );
            self.stats.dropped += self.deferred.len() as u64;
            self.deferred.clear();
        }
        self.close_frame();
        self.flush_run()
    }

    /// 是否有已整理的帧
    pub fn frames_available(&self) -> bool {
        !self.output.is_empty()
    }

    /// 取出下一个帧 (解码顺序)
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.output.pop_front()
    }

    /// 参数集是否齐备
    pub fn config_ready(&self) -> bool {
        self.store.ready()
    }

    /// 生成配置记录 (avcC / hvcC)
    pub fn config_record(&self) -> EsResult<Vec<u8>> {
        self.store.pack(self.config.nalu_size_length)
    }

    /// 参数集是否发生过变化
    pub fn config_changed(&self) -> bool {
        self.store.config_changed()
    }

    /// 清除参数集变化标记
    pub fn clear_config_changed(&mut self) {
        self.store.clear_config_changed();
    }

    /// 第一个 SPS 给出的图像尺寸 (已裁剪)
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.store
            .sps_list()
            .first()
            .map(|e| (e.params.width(), e.params.height()))
    }

    /// 第一个 SPS 给出的像素宽高比
    pub fn pixel_aspect_ratio(&self) -> Option<Rational> {
        self.store
            .sps_list()
            .first()
            .and_then(|e| e.params.sample_aspect_ratio())
    }

    /// 已整理帧中最常见的帧时长 (纳秒)
    pub fn most_common_duration(&self) -> i64 {
        self.reorder.durations().most_common()
    }

    /// 由第一个带 timing 信息的 SPS 得到的默认帧时长
    pub fn stream_default_duration(&self) -> Option<i64> {
        self.reorder.stream_default_duration()
    }

    /// 解析统计
    pub fn stats(&self) -> &ParserStats {
        &self.stats
    }

    /// 参数集存储
    pub fn store(&self) -> &ParameterSetStore<C> {
        &self.store
    }

    /// 解析器配置
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    fn handle_nal(&mut self, nal: NalUnit) -> EsResult<()> {
        let nal_type = match C::nal_type(&nal.data) {
            Ok(t) => t,
            Err(e) => {
                debug!("{}: 丢弃偏移 {} 处的 NAL 单元: {}", C::NAME, nal.offset, e);
                self.stats.nal_units += 1;
                self.stats.dropped += 1;
                return Ok(());
            }
        };
        let class = C::classify(nal_type);
        trace!(
            "{}: NAL {} ({:?}) 偏移 {} 长度 {}",
            C::NAME,
            nal_type,
            class,
            nal.offset,
            nal.len()
        );
        self.stats.count(class);

        let written = !matches!(
            class,
            NalClass::AccessUnitDelimiter
                | NalClass::EndOfSequence
                | NalClass::EndOfStream
                | NalClass::Filler
        );
        if written {
            // 在改动任何状态之前拒绝写不下的 NAL 单元, 已缓存的前置数据保持可写
            self.check_size(&nal)?;
        }

        match class {
            NalClass::Vps => self.handle_parameter_set(ParamKind::Vps, nal),
            NalClass::Sps => self.handle_parameter_set(ParamKind::Sps, nal),
            NalClass::Pps => self.handle_parameter_set(ParamKind::Pps, nal),
            NalClass::PrefixSei => self.handle_prefix_sei(nal),
            NalClass::SuffixSei => self.handle_suffix_sei(nal),
            NalClass::Slice => self.handle_slice(nal, nal_type),
            NalClass::AccessUnitDelimiter | NalClass::EndOfSequence | NalClass::EndOfStream => {
                self.close_frame();
                Ok(())
            }
            NalClass::Filler => Ok(()),
            NalClass::Other => {
                self.close_frame();
                self.extra_data.push(nal.data);
                Ok(())
            }
        }
    }

    fn check_size(&self, nal: &NalUnit) -> EsResult<()> {
        let required_length = required_size_length(nal.len());
        if required_length > self.config.nalu_size_length
            && !self.config.ignore_nalu_size_length_errors
        {
            debug!(
                "{}: 偏移 {} 处的 NAL 单元需要 {} 字节长度前缀",
                C::NAME,
                nal.offset,
                required_length
            );
            return Err(EsError::NaluSizeTooSmall { required_length });
        }
        Ok(())
    }

    fn handle_parameter_set(&mut self, kind: ParamKind, nal: NalUnit) -> EsResult<()> {
        self.close_frame();

        let was_ready = self.store.ready();
        let registration = match self.store.register(kind, nal.data) {
            Ok(r) => r,
            Err(e) => {
                debug!("{}: 丢弃偏移 {} 处的 {}: {}", C::NAME, nal.offset, kind, e);
                self.stats.dropped += 1;
                return Ok(());
            }
        };

        if kind == ParamKind::Sps {
            if let Some(duration) = self
                .store
                .sps(registration.id)
                .and_then(|sps| sps.frame_duration())
            {
                self.reorder.set_stream_default_duration(duration);
            }
        }
        self.extra_data.push(registration.nalu);

        if !was_ready && self.store.ready() {
            self.replay_deferred()?;
        }
        Ok(())
    }

    fn replay_deferred(&mut self) -> EsResult<()> {
        if self.deferred.is_empty() {
            return Ok(());
        }
        debug!("{}: 参数集齐备, 重放 {} 个暂存 NAL 单元", C::NAME, self.deferred.len());
        let deferred = std::mem::take(&mut self.deferred);
        for nal in deferred {
            let nal_type = C::nal_type(&nal.data)?;
            match C::classify(nal_type) {
                NalClass::PrefixSei => self.handle_prefix_sei(nal)?,
                _ => self.handle_slice(nal, nal_type)?,
            }
        }
        Ok(())
    }

    fn handle_prefix_sei(&mut self, nal: NalUnit) -> EsResult<()> {
        if !self.store.ready() {
            self.deferred.push_back(nal);
            return Ok(());
        }
        self.close_frame();

        let payload = nal.data.get(C::NAL_HEADER_LEN..).unwrap_or_default();
        match tolerate_eof(sei::has_recovery_point(&nalu_to_rbsp(payload))) {
            Ok(Some(true)) => {
                trace!("{}: 偏移 {} 处的恢复点 SEI", C::NAME, nal.offset);
                self.recovery_point_pending = true;
            }
            Ok(_) => {}
            Err(e) => debug!("{}: SEI 解析失败: {}", C::NAME, e),
        }

        if !self.first_frame_seen {
            self.store.add_sei(nal.data.clone());
        }
        self.extra_data.push(nal.data);
        Ok(())
    }

    fn handle_suffix_sei(&mut self, nal: NalUnit) -> EsResult<()> {
        match self.open.as_mut() {
            Some(open) => append_nalu(&self.config, &mut open.data, &nal.data),
            None => {
                self.extra_data.push(nal.data);
                Ok(())
            }
        }
    }

    fn handle_slice(&mut self, nal: NalUnit, nal_type: C::NalType) -> EsResult<()> {
        if !self.store.ready() {
            self.deferred.push_back(nal);
            return Ok(());
        }

        let slice = match C::parse_slice(&nal.data, nal_type, &self.store) {
            Ok(s) => s,
            Err(e) => {
                debug!(
                    "{}: 丢弃偏移 {} 处的切片 ({}): {}",
                    C::NAME,
                    nal.offset,
                    nal_type,
                    e
                );
                self.stats.dropped += 1;
                return Ok(());
            }
        };

        if let Some(open) = self.open.as_mut() {
            if !C::starts_new_picture(&open.last_slice, &slice) {
                append_nalu(&self.config, &mut open.data, &nal.data)?;
                if slice.slice_type == SliceType::B {
                    self.b_since_keyframe = true;
                }
                open.last_slice = slice;
                return Ok(());
            }
        }
        self.close_frame();

        // 默认只有随机访问类型的 I 帧是关键帧, 不要求此前没有 B 切片;
        // "I 帧且此前无 B 切片" 这一条只在 keyframes_without_b_frames 打开时生效
        let keyframe = self.recovery_point_pending
            || (slice.slice_type == SliceType::I
                && (slice.random_access
                    || (self.config.keyframes_without_b_frames && !self.b_since_keyframe)));
        self.recovery_point_pending = false;
        if keyframe {
            self.flush_run()?;
            self.b_since_keyframe = false;
        }
        if slice.slice_type == SliceType::B {
            self.b_since_keyframe = true;
        }

        let mut builder = FrameBuilder::new(slice, keyframe, nal.offset);
        for nalu in self.extra_data.drain(..) {
            append_nalu(&self.config, &mut builder.data, &nalu)?;
        }
        append_nalu(&self.config, &mut builder.data, &nal.data)?;

        if let Some(&(timecode, position)) = self.provided_timecodes.front() {
            if position <= nal.offset {
                self.provided_timecodes.pop_front();
                builder.has_provided_timecode = true;
                self.run_timecodes.push(timecode);
            }
        }

        self.open = Some(builder);
        self.first_frame_seen = true;
        Ok(())
    }

    fn close_frame(&mut self) {
        if let Some(builder) = self.open.take() {
            let frame = builder.finish(self.next_decode_order);
            trace!(
                "{}: 帧 {} 结束, {} 字节, 关键帧 {}",
                C::NAME,
                frame.decode_order,
                frame.data.len(),
                frame.keyframe
            );
            self.next_decode_order += 1;
            self.run.push(frame);
        }
    }

    /// 整理已结束的序列并移入输出队列
    fn flush_run(&mut self) -> EsResult<()> {
        if self.run.is_empty() {
            return Ok(());
        }
        let run = std::mem::take(&mut self.run);
        let timecodes = std::mem::take(&mut self.run_timecodes);
        let frames = self.reorder.cleanup(run, timecodes)?;

        self.stats.frames += frames.len() as u64;
        self.stats.keyframes += frames.iter().filter(|f| f.keyframe).count() as u64;
        if self.config.discard_actual_frames {
            trace!("{}: 丢弃 {} 帧数据", C::NAME, frames.len());
        } else {
            self.output.extend(frames);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avc::unpack_avc_config;
    use crate::size_prefix::split_size_prefixed;
    use crate::synth::*;

    const D: i64 = 40_000_000;

    fn parse_all(config: ParserConfig, stream: &[u8]) -> (AvcEsParser, Vec<Frame>) {
        let mut parser = AvcEsParser::new(config).unwrap();
        parser.add_bytes(stream).unwrap();
        parser.flush().unwrap();
        let mut frames = Vec::new();
        while let Some(frame) = parser.next_frame() {
            frames.push(frame);
        }
        (parser, frames)
    }

    fn header_nalus(sps: &AvcSpsParams, pps: &AvcPpsParams) -> Vec<Vec<u8>> {
        vec![avc_sps(sps), avc_pps(pps)]
    }

    fn ibp_stream(sps: &AvcSpsParams, pps: &AvcPpsParams) -> Vec<u8> {
        let mut nalus = header_nalus(sps, pps);
        nalus.push(avc_slice(&AvcSliceParams::idr(0), sps, pps));
        nalus.push(avc_slice(&AvcSliceParams::non_idr(1, 0, 1, 4), sps, pps));
        nalus.push(avc_slice(&AvcSliceParams::non_idr(0, 2, 1, 2), sps, pps));
        annexb(&nalus)
    }

    #[test]
    fn test_ibp_reorder() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        let (parser, frames) = parse_all(ParserConfig::default(), &ibp_stream(&sps, &pps));

        assert_eq!(frames.len(), 3);
        let types: Vec<SliceType> = frames.iter().map(|f| f.slice_type()).collect();
        assert_eq!(types, vec![SliceType::I, SliceType::B, SliceType::P], "输出应为解码顺序");
        let starts: Vec<i64> = frames.iter().map(|f| f.start).collect();
        assert_eq!(starts, vec![0, 2 * D, D]);
        let deltas: Vec<Option<i64>> = frames.iter().map(|f| f.ref_delta).collect();
        assert_eq!(deltas, vec![None, Some(-2 * D), Some(D)]);
        assert!(frames[0].keyframe);
        assert!(!frames[1].keyframe && !frames[2].keyframe);

        let first = split_size_prefixed(&frames[0].data, 4).unwrap();
        assert_eq!(first.len(), 3, "首帧应包含 SPS, PPS 和切片");
        assert_eq!(first[0], avc_sps(&sps).as_slice());
        assert_eq!(first[1], avc_pps(&pps).as_slice());
        assert_eq!(split_size_prefixed(&frames[1].data, 4).unwrap().len(), 1);

        assert_eq!(parser.dimensions(), Some((320, 240)));
        assert_eq!(parser.most_common_duration(), D);
        assert_eq!(parser.stats().slices, 3);
        assert_eq!(parser.stats().frames, 3);
        assert_eq!(parser.stats().keyframes, 1);
    }

    #[test]
    fn test_chunking_independent() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        let stream = ibp_stream(&sps, &pps);

        let (_, whole) = parse_all(ParserConfig::default(), &stream);

        let mut parser = AvcEsParser::new(ParserConfig::default()).unwrap();
        for byte in &stream {
            parser.add_bytes(std::slice::from_ref(byte)).unwrap();
        }
        parser.flush().unwrap();
        let mut split = Vec::new();
        while let Some(frame) = parser.next_frame() {
            split.push(frame);
        }

        assert_eq!(whole.len(), split.len());
        for (a, b) in whole.iter().zip(&split) {
            assert_eq!(a.data, b.data, "逐字节送入应得到相同的帧数据");
            assert_eq!(a.start, b.start);
            assert_eq!(a.offset, b.offset);
        }
    }

    #[test]
    fn test_slices_deferred_until_ready() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        let stream = annexb(&[
            avc_sps(&sps),
            avc_slice(&AvcSliceParams::idr(0), &sps, &pps),
            avc_pps(&pps),
            avc_slice(&AvcSliceParams::non_idr(0, 2, 1, 2), &sps, &pps),
        ]);
        let (parser, frames) = parse_all(ParserConfig::default(), &stream);

        assert_eq!(frames.len(), 2, "PPS 到达后暂存的切片应被重放");
        assert_eq!(frames[0].slice_type(), SliceType::I);
        let first = split_size_prefixed(&frames[0].data, 4).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(parser.stats().dropped, 0);
    }

    #[test]
    fn test_never_ready_drops_slices() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        let stream = annexb(&[avc_sps(&sps), avc_slice(&AvcSliceParams::idr(0), &sps, &pps)]);
        let (parser, frames) = parse_all(ParserConfig::default(), &stream);
        assert!(frames.is_empty());
        assert_eq!(parser.stats().dropped, 1);
        assert!(parser.config_record().is_err(), "缺少 PPS 时不能生成配置记录");
    }

    #[test]
    fn test_multi_slice_picture() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        let second = AvcSliceParams {
            first_mb: 150,
            ..AvcSliceParams::idr(0)
        };
        let mut nalus = header_nalus(&sps, &pps);
        nalus.push(avc_slice(&AvcSliceParams::idr(0), &sps, &pps));
        nalus.push(avc_slice(&second, &sps, &pps));
        nalus.push(avc_slice(&AvcSliceParams::non_idr(0, 2, 1, 2), &sps, &pps));
        let (_, frames) = parse_all(ParserConfig::default(), &annexb(&nalus));

        assert_eq!(frames.len(), 2);
        assert_eq!(split_size_prefixed(&frames[0].data, 4).unwrap().len(), 4);
    }

    #[test]
    fn test_aud_closes_frame() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        // 第二个切片 first_mb 不为 0, 只有 AUD 能把它分到新帧
        let tail = AvcSliceParams {
            first_mb: 150,
            ..AvcSliceParams::idr(0)
        };
        let mut nalus = header_nalus(&sps, &pps);
        nalus.push(avc_slice(&AvcSliceParams::idr(0), &sps, &pps));
        nalus.push(avc_aud());
        nalus.push(avc_slice(&tail, &sps, &pps));
        let (parser, frames) = parse_all(ParserConfig::default(), &annexb(&nalus));
        assert_eq!(frames.len(), 2);
        assert_eq!(parser.stats().other, 1);
    }

    #[test]
    fn test_recovery_point_keyframe() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        let mut nalus = header_nalus(&sps, &pps);
        nalus.push(avc_slice(&AvcSliceParams::idr(0), &sps, &pps));
        nalus.push(avc_slice(&AvcSliceParams::non_idr(2, 2, 1, 2), &sps, &pps));
        nalus.push(avc_recovery_point_sei());
        nalus.push(avc_slice(&AvcSliceParams::non_idr(2, 2, 2, 4), &sps, &pps));
        nalus.push(avc_slice(&AvcSliceParams::non_idr(0, 2, 3, 6), &sps, &pps));
        let (_, frames) = parse_all(ParserConfig::default(), &annexb(&nalus));

        let keyframes: Vec<bool> = frames.iter().map(|f| f.keyframe).collect();
        assert_eq!(
            keyframes,
            vec![true, false, true, false],
            "非 IDR 的 I 帧只有在恢复点之后才是关键帧"
        );
        let sei = split_size_prefixed(&frames[2].data, 4).unwrap();
        assert_eq!(sei.len(), 2, "SEI 应作为前置数据进入下一帧");
        assert_eq!(frames[2].start, 2 * D, "新序列接续之前的时间轴");
    }

    #[test]
    fn test_recovery_point_before_truncated_sei_message() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        let mut nalus = header_nalus(&sps, &pps);
        nalus.push(avc_slice(&AvcSliceParams::idr(0), &sps, &pps));
        nalus.push(avc_slice(&AvcSliceParams::non_idr(0, 2, 1, 2), &sps, &pps));
        // 恢复点消息完整, 其后的消息声明 16 字节负载但只剩 2 字节
        nalus.push(vec![0x06, 0x06, 0x01, 0x84, 0x05, 0x10, 0xAA, 0x80]);
        nalus.push(avc_slice(&AvcSliceParams::non_idr(2, 2, 2, 4), &sps, &pps));
        let (parser, frames) = parse_all(ParserConfig::default(), &annexb(&nalus));

        let keyframes: Vec<bool> = frames.iter().map(|f| f.keyframe).collect();
        assert_eq!(keyframes, vec![true, false, true], "截断的后续消息不应丢掉已读到的恢复点");
        assert_eq!(parser.stats().dropped, 0);
    }

    #[test]
    fn test_keyframes_without_b_frames() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        let mut nalus = header_nalus(&sps, &pps);
        nalus.push(avc_slice(&AvcSliceParams::idr(0), &sps, &pps));
        nalus.push(avc_slice(&AvcSliceParams::non_idr(2, 2, 1, 2), &sps, &pps));
        nalus.push(avc_slice(&AvcSliceParams::non_idr(1, 0, 2, 6), &sps, &pps));
        nalus.push(avc_slice(&AvcSliceParams::non_idr(2, 2, 2, 8), &sps, &pps));
        let stream = annexb(&nalus);

        let config = ParserConfig {
            keyframes_without_b_frames: true,
            ..ParserConfig::default()
        };
        let (_, frames) = parse_all(config, &stream);
        let keyframes: Vec<bool> = frames.iter().map(|f| f.keyframe).collect();
        assert_eq!(keyframes, vec![true, true, false, false], "出现 B 切片后 I 帧不再视为关键帧");

        let (_, frames) = parse_all(ParserConfig::default(), &stream);
        assert_eq!(frames.iter().filter(|f| f.keyframe).count(), 1);
    }

    #[test]
    fn test_nalu_size_too_small() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        let big = AvcSliceParams {
            payload_len: 300,
            ..AvcSliceParams::idr(0)
        };
        let mut nalus = header_nalus(&sps, &pps);
        nalus.push(avc_slice(&big, &sps, &pps));
        nalus.push(avc_aud());
        let stream = annexb(&nalus);

        let config = ParserConfig {
            nalu_size_length: 1,
            ..ParserConfig::default()
        };
        let mut parser = AvcEsParser::new(config.clone()).unwrap();
        let err = parser.add_bytes(&stream).unwrap_err();
        assert!(matches!(
            err,
            EsError::NaluSizeTooSmall { required_length: 2 }
        ));

        let lenient = ParserConfig {
            ignore_nalu_size_length_errors: true,
            ..config
        };
        let (_, frames) = parse_all(lenient, &stream);
        assert_eq!(frames.len(), 1, "忽略长度错误时应截断写入");
    }

    #[test]
    fn test_nalu_size_too_small_keeps_previous_frame() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        // payload_type 5, payload_size 255 + 46 = 301
        let mut big_sei = vec![0x06, 0x05, 0xFF, 0x2E];
        big_sei.extend(std::iter::repeat_n(0x11, 301));
        big_sei.push(0x80);

        let mut nalus = header_nalus(&sps, &pps);
        nalus.push(avc_slice(&AvcSliceParams::idr(0), &sps, &pps));
        nalus.push(big_sei);
        nalus.push(avc_slice(&AvcSliceParams::non_idr(0, 2, 1, 2), &sps, &pps));
        let stream = annexb(&nalus);

        let config = ParserConfig {
            nalu_size_length: 1,
            ..ParserConfig::default()
        };
        let mut parser = AvcEsParser::new(config).unwrap();
        let err = parser.add_bytes(&stream).unwrap_err();
        assert!(matches!(
            err,
            EsError::NaluSizeTooSmall { required_length: 2 }
        ));
        parser.flush().unwrap();
        let mut frames = Vec::new();
        while let Some(frame) = parser.next_frame() {
            frames.push(frame);
        }

        assert_eq!(frames.len(), 2, "超长 SEI 被拒绝后前后两帧都应保留");
        let first = split_size_prefixed(&frames[0].data, 1).unwrap();
        assert_eq!(first.len(), 3, "首帧应完整包含 SPS, PPS 和切片");
        assert_eq!(split_size_prefixed(&frames[1].data, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_huge_bit_depth_sps_dropped() {
        let sps = AvcSpsParams {
            profile_idc: 100,
            bit_depth_luma_minus8: u32::MAX - 1,
            ..AvcSpsParams::default()
        };
        let pps = AvcPpsParams::default();
        let mut nalus = header_nalus(&sps, &pps);
        nalus.push(avc_slice(&AvcSliceParams::idr(0), &sps, &pps));
        let (parser, frames) = parse_all(ParserConfig::default(), &annexb(&nalus));

        assert!(frames.is_empty(), "SPS 被丢弃后不应产生帧");
        assert!(parser.stats().dropped >= 1);
        assert!(parser.config_record().is_err());
        assert_eq!(parser.dimensions(), None);
    }

    #[test]
    fn test_flush_misuse() {
        let mut parser = AvcEsParser::new(ParserConfig::default()).unwrap();
        parser.flush().unwrap();
        assert!(matches!(parser.flush(), Err(EsError::Internal(_))));
        assert!(matches!(parser.add_bytes(&[0, 0, 1]), Err(EsError::Internal(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ParserConfig {
            nalu_size_length: 0,
            ..ParserConfig::default()
        };
        assert!(AvcEsParser::new(config).is_err());
    }

    #[test]
    fn test_provided_timecodes() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        let stream = ibp_stream(&sps, &pps);

        let mut parser = AvcEsParser::new(ParserConfig::default()).unwrap();
        parser.add_timecode(1_000_000_000);
        parser.add_bytes(&stream).unwrap();
        parser.flush().unwrap();

        let first = parser.next_frame().unwrap();
        assert!(first.has_provided_timecode);
        assert_eq!(first.start, 1_000_000_000);
        let second = parser.next_frame().unwrap();
        assert!(!second.has_provided_timecode);
        assert_eq!(second.start, 1_000_000_000 + 2 * D);
    }

    #[test]
    fn test_discard_actual_frames() {
        let sps = AvcSpsParams {
            timing: Some((1001, 60000)),
            ..AvcSpsParams::default()
        };
        let pps = AvcPpsParams::default();
        let config = ParserConfig {
            discard_actual_frames: true,
            ..ParserConfig::default()
        };
        let (parser, frames) = parse_all(config, &ibp_stream(&sps, &pps));

        assert!(frames.is_empty());
        assert!(!parser.frames_available());
        assert_eq!(parser.stats().frames, 3);
        assert_eq!(parser.most_common_duration(), 33_366_666);
        assert_eq!(parser.stream_default_duration(), Some(33_366_666));
    }

    #[test]
    fn test_config_record_and_changes() {
        let sps = AvcSpsParams::default();
        let pps = AvcPpsParams::default();
        let mut parser = AvcEsParser::new(ParserConfig::default()).unwrap();
        parser.add_bytes(&ibp_stream(&sps, &pps)).unwrap();
        assert!(parser.config_ready());
        assert!(parser.config_changed());

        let record = unpack_avc_config(&parser.config_record().unwrap()).unwrap();
        assert_eq!(record.sps, vec![avc_sps(&sps)]);
        assert_eq!(record.pps, vec![avc_pps(&pps)]);

        parser.clear_config_changed();
        parser.add_bytes(&annexb(&header_nalus(&sps, &pps))).unwrap();
        assert!(!parser.config_changed(), "重复的参数集不应标记变化");

        let changed = AvcSpsParams {
            width_mbs: 40,
            ..AvcSpsParams::default()
        };
        parser.add_bytes(&annexb(&[avc_sps(&changed)])).unwrap();
        parser.flush().unwrap();
        assert!(parser.config_changed());
        assert_eq!(parser.dimensions(), Some((640, 240)), "同 id 的 SPS 被原位替换");
    }

    #[test]
    fn test_stripped_sps_in_frame_data() {
        let sps = AvcSpsParams {
            aspect_ratio: Some(AspectRatioParams::Idc(2)),
            timing: Some((1, 50)),
            ..AvcSpsParams::default()
        };
        let pps = AvcPpsParams::default();
        let config = ParserConfig {
            keep_ar_info: false,
            ..ParserConfig::default()
        };
        let (parser, frames) = parse_all(config, &ibp_stream(&sps, &pps));

        let plain = avc_sps(&AvcSpsParams {
            aspect_ratio: None,
            ..sps.clone()
        });
        let first = split_size_prefixed(&frames[0].data, 4).unwrap();
        assert_eq!(first[0], plain.as_slice(), "帧中的 SPS 应为去除宽高比后的版本");
        assert_eq!(parser.pixel_aspect_ratio(), Some(Rational::new(12, 11)));
    }
}
