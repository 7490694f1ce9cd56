//! esparse 解析性能基准测试.
//!
//! 覆盖起始码扫描、去除防竞争字节和完整的 AVC/HEVC 解析流程.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use esparse::nal::synth::*;
use esparse::nal::{AvcEsParser, ByteStreamScanner, HevcEsParser, ParserConfig, nalu_to_rbsp};

/// 生成 `gops` 个 GOP 的 AVC 码流, 每个 GOP 为 IDR + 14 个 P/B 帧
fn avc_stream(gops: usize, payload_len: usize) -> Vec<u8> {
    let sps = AvcSpsParams {
        timing: Some((1001, 60000)),
        log2_max_frame_num: 8,
        poc: AvcPocParams::Type0 {
            log2_max_poc_lsb: 8,
        },
        ..AvcSpsParams::default()
    };
    let pps = AvcPpsParams::default();
    let mut nalus = Vec::new();
    for gop in 0..gops {
        nalus.push(avc_sps(&sps));
        nalus.push(avc_pps(&pps));
        nalus.push(avc_slice(
            &AvcSliceParams {
                idr_pic_id: gop as u32 & 0xFF,
                payload_len,
                ..AvcSliceParams::idr(0)
            },
            &sps,
            &pps,
        ));
        // 解码顺序 P B P B ..., POC 为 P=2k+2, B=2k
        for k in 0..7u32 {
            let p = AvcSliceParams {
                payload_len,
                ..AvcSliceParams::non_idr(0, 2, k + 1, 4 * k + 4)
            };
            let b = AvcSliceParams {
                payload_len,
                ..AvcSliceParams::non_idr(1, 0, k + 2, 4 * k + 2)
            };
            nalus.push(avc_slice(&p, &sps, &pps));
            nalus.push(avc_slice(&b, &sps, &pps));
        }
    }
    annexb(&nalus)
}

fn hevc_stream(gops: usize, payload_len: usize) -> Vec<u8> {
    let sps = HevcSpsParams {
        timing: Some((1001, 30000)),
        ..HevcSpsParams::default()
    };
    let pps = HevcPpsParams::default();
    let mut nalus = vec![hevc_vps(0), hevc_sps(&sps), hevc_pps(&pps)];
    for _ in 0..gops {
        nalus.push(hevc_slice(
            &HevcSliceParams {
                payload_len,
                ..HevcSliceParams::new(19, 2, 0)
            },
            &sps,
            &pps,
        ));
        for k in 0..7u32 {
            nalus.push(hevc_slice(
                &HevcSliceParams {
                    payload_len,
                    ..HevcSliceParams::new(1, 1, 4 * k + 4)
                },
                &sps,
                &pps,
            ));
            nalus.push(hevc_slice(
                &HevcSliceParams {
                    payload_len,
                    ..HevcSliceParams::new(0, 0, 4 * k + 2)
                },
                &sps,
                &pps,
            ));
        }
    }
    annexb(&nalus)
}

fn bench_scanner(c: &mut Criterion) {
    let stream = avc_stream(16, 4096);
    let mut group = c.benchmark_group("scanner");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("annexb_split_64k_chunks", |b| {
        b.iter(|| {
            let mut scanner = ByteStreamScanner::new();
            let mut count = 0usize;
            for chunk in stream.chunks(64 * 1024) {
                count += scanner.add_bytes(black_box(chunk)).len();
            }
            count += usize::from(scanner.flush().is_some());
            count
        });
    });
    group.finish();
}

fn bench_emulation(c: &mut Criterion) {
    // 每 64 字节出现一次 00 00 03
    let mut data = Vec::with_capacity(1 << 20);
    while data.len() < (1 << 20) {
        data.extend_from_slice(&[0x00, 0x00, 0x03, 0x01]);
        data.extend((0..60u8).map(|i| i | 0x10));
    }
    let mut group = c.benchmark_group("emulation");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("nalu_to_rbsp_1m", |b| {
        b.iter(|| nalu_to_rbsp(black_box(&data)));
    });
    group.finish();
}

fn bench_avc_parser(c: &mut Criterion) {
    let stream = avc_stream(16, 4096);
    let mut group = c.benchmark_group("avc");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("parse_16_gops", |b| {
        b.iter(|| {
            let mut parser = AvcEsParser::new(ParserConfig::default()).unwrap();
            for chunk in stream.chunks(64 * 1024) {
                parser.add_bytes(black_box(chunk)).unwrap();
            }
            parser.flush().unwrap();
            let mut frames = 0usize;
            while parser.next_frame().is_some() {
                frames += 1;
            }
            frames
        });
    });
    group.finish();
}

fn bench_hevc_parser(c: &mut Criterion) {
    let stream = hevc_stream(16, 4096);
    let mut group = c.benchmark_group("hevc");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("parse_16_gops", |b| {
        b.iter(|| {
            let mut parser = HevcEsParser::new(ParserConfig::default()).unwrap();
            for chunk in stream.chunks(64 * 1024) {
                parser.add_bytes(black_box(chunk)).unwrap();
            }
            parser.flush().unwrap();
            parser.stats().frames
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_scanner,
    bench_emulation,
    bench_avc_parser,
    bench_hevc_parser
);
criterion_main!(benches);
