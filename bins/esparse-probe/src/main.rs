//! esparse-probe - 基本流探测工具
//!
//! 把 Annex B 文件按块送入解析器, 输出帧列表、时间戳统计和配置记录.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};

use esparse::logging::{self, LoggingConfig};
use esparse::nal::avc::unpack_avc_config;
use esparse::nal::hevc::unpack_hevc_config;
use esparse::nal::{Avc, Codec, EsParser, Hevc, ParserConfig, ParserStats};

/// 编码类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CodecArg {
    /// H.264/AVC
    Avc,
    /// H.265/HEVC
    Hevc,
}

/// 基本流探测工具
#[derive(Parser, Debug)]
#[command(name = "esparse-probe", version, about = "H.264/H.265 Annex B 基本流探测工具")]
struct Cli {
    /// 输入文件路径
    input: PathBuf,

    /// 编码类型; 缺省时按扩展名判断
    #[arg(long, value_enum)]
    codec: Option<CodecArg>,

    /// 解析器配置文件 (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// 每次送入的字节数
    #[arg(long, default_value_t = 64 * 1024)]
    chunk_size: usize,

    /// NALU 长度前缀字节数 (1-4), 覆盖配置文件
    #[arg(long)]
    nalu_size_length: Option<usize>,

    /// 去除 SPS 中的宽高比信息
    #[arg(long)]
    strip_aspect_ratio: bool,

    /// 强制帧时长 (纳秒)
    #[arg(long)]
    default_duration: Option<i64>,

    /// 列出每一帧
    #[arg(long)]
    show_frames: bool,

    /// 解包配置记录并核对参数集个数
    #[arg(long)]
    verify: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 日志详细程度 (-v debug, -vv trace)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// 日志文件目录
    #[arg(long)]
    log_dir: Option<String>,
}

// ============================================================
// 输出结构体
// ============================================================

/// 完整探测结果
#[derive(Serialize)]
struct ProbeOutput {
    filename: String,
    codec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_aspect_ratio: Option<String>,
    default_duration_ns: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_default_duration_ns: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_record: Option<RecordInfo>,
    stats: ParserStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<Vec<FrameInfo>>,
}

/// 配置记录信息
#[derive(Serialize)]
struct RecordInfo {
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameter_sets: Option<usize>,
}

/// 单帧信息
#[derive(Serialize)]
struct FrameInfo {
    decode_order: u64,
    keyframe: bool,
    slice_type: String,
    start_ns: i64,
    end_ns: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_delta_ns: Option<i64>,
    size: usize,
    offset: u64,
}

// ============================================================
// 主逻辑
// ============================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LoggingConfig {
        level: logging::verbosity_level(cli.verbose).to_string(),
        directory: cli.log_dir.clone(),
        file_prefix: "esparse-probe".to_string(),
        ..LoggingConfig::default()
    })?;

    let config = build_config(&cli)?;
    let codec = match cli.codec {
        Some(codec) => codec,
        None => detect_codec(&cli.input)?,
    };
    info!("探测 {} ({:?})", cli.input.display(), codec);

    let output = match codec {
        CodecArg::Avc => probe::<Avc>(&cli, config, |r| {
            let record = unpack_avc_config(r)?;
            Ok(record.sps.len() + record.pps.len())
        })?,
        CodecArg::Hevc => probe::<Hevc>(&cli, config, |r| {
            let record = unpack_hevc_config(r)?;
            Ok(record.arrays.iter().map(|a| a.nalus.len()).sum())
        })?,
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("序列化探测结果失败")?;
        println!("{json}");
    } else {
        print_text(&output);
    }
    Ok(())
}

/// 合并配置文件与命令行参数
fn build_config(cli: &Cli) -> Result<ParserConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("读取配置文件失败, path={}", path.display()))?;
            ParserConfig::from_json(&text)?
        }
        None => ParserConfig::default(),
    };
    if let Some(length) = cli.nalu_size_length {
        config.nalu_size_length = length;
    }
    if cli.strip_aspect_ratio {
        config.keep_ar_info = false;
    }
    if cli.default_duration.is_some() {
        config.forced_default_duration = cli.default_duration;
    }
    if !cli.show_frames {
        config.discard_actual_frames = true;
    }
    config.validate()?;
    Ok(config)
}

/// 按扩展名判断编码类型
fn detect_codec(path: &Path) -> Result<CodecArg> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("h264" | "264" | "avc" | "jsv") => Ok(CodecArg::Avc),
        Some("h265" | "265" | "hevc") => Ok(CodecArg::Hevc),
        _ => bail!("无法从扩展名判断编码类型, 请使用 --codec 指定"),
    }
}

fn probe<C: Codec>(
    cli: &Cli,
    config: ParserConfig,
    verify: impl Fn(&[u8]) -> esparse::core::EsResult<usize>,
) -> Result<ProbeOutput> {
    let mut file = File::open(&cli.input)
        .with_context(|| format!("无法打开文件, path={}", cli.input.display()))?;
    let mut parser = EsParser::<C>::new(config)?;
    let mut frames = Vec::new();
    let mut buf = vec![0u8; cli.chunk_size.max(1)];

    loop {
        let n = file.read(&mut buf).context("读取输入失败")?;
        if n == 0 {
            break;
        }
        parser
            .add_bytes(&buf[..n])
            .with_context(|| format!("{} 解析失败", C::NAME))?;
        drain_frames(&mut parser, &mut frames);
    }
    parser.flush().with_context(|| format!("{} 解析失败", C::NAME))?;
    drain_frames(&mut parser, &mut frames);
    debug!("共 {} 帧, {} 字节", parser.stats().frames, parser.stats().bytes);

    let config_record = match parser.config_record() {
        Ok(record) => {
            let parameter_sets = if cli.verify {
                Some(verify(&record).context("配置记录解包失败")?)
            } else {
                None
            };
            Some(RecordInfo {
                size: record.len(),
                parameter_sets,
            })
        }
        Err(e) => {
            info!("未生成配置记录: {}", e);
            None
        }
    };

    Ok(ProbeOutput {
        filename: cli.input.display().to_string(),
        codec: C::NAME.to_string(),
        width: parser.dimensions().map(|(w, _)| w),
        height: parser.dimensions().map(|(_, h)| h),
        sample_aspect_ratio: parser.pixel_aspect_ratio().map(|r| r.to_string()),
        display_aspect_ratio: parser
            .pixel_aspect_ratio()
            .zip(parser.dimensions())
            .and_then(|(sar, (w, h))| sar.display_aspect(w, h))
            .map(|r| r.to_string()),
        default_duration_ns: parser.most_common_duration(),
        stream_default_duration_ns: parser.stream_default_duration(),
        config_record,
        stats: parser.stats().clone(),
        frames: cli.show_frames.then_some(frames),
    })
}

fn drain_frames<C: Codec>(parser: &mut EsParser<C>, out: &mut Vec<FrameInfo>) {
    while let Some(frame) = parser.next_frame() {
        out.push(FrameInfo {
            decode_order: frame.decode_order,
            keyframe: frame.keyframe,
            slice_type: frame.slice_type().to_string(),
            start_ns: frame.start,
            end_ns: frame.end,
            ref_delta_ns: frame.ref_delta,
            size: frame.data.len(),
            offset: frame.offset,
        });
    }
}

fn print_text(output: &ProbeOutput) {
    println!("[STREAM]");
    println!("  文件名       : {}", output.filename);
    println!("  编码         : {}", output.codec);
    if let (Some(w), Some(h)) = (output.width, output.height) {
        println!("  分辨率       : {w}x{h}");
    }
    if let Some(sar) = &output.sample_aspect_ratio {
        println!("  像素宽高比   : {sar}");
    }
    if let Some(dar) = &output.display_aspect_ratio {
        println!("  显示宽高比   : {dar}");
    }
    println!(
        "  帧时长       : {:.3} ms",
        output.default_duration_ns as f64 / 1_000_000.0
    );
    if let Some(record) = &output.config_record {
        match record.parameter_sets {
            Some(n) => println!("  配置记录     : {} 字节, {} 个 NALU", record.size, n),
            None => println!("  配置记录     : {} 字节", record.size),
        }
    }
    let stats = &output.stats;
    println!("  NAL 单元     : {} (丢弃 {})", stats.nal_units, stats.dropped);
    println!("  帧数         : {} (关键帧 {})", stats.frames, stats.keyframes);
    println!("[/STREAM]");

    if let Some(frames) = &output.frames {
        println!();
        for frame in frames {
            println!(
                "#{:<6} {} {} {:>12} ns ~ {:>12} ns {:>8} 字节",
                frame.decode_order,
                if frame.keyframe { "K" } else { " " },
                frame.slice_type,
                frame.start_ns,
                frame.end_ns,
                frame.size
            );
        }
    }
}
