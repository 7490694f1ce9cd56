//! 应用日志初始化.
//!
//! 库 crate 只通过 `log` 门面输出日志, 由这里安装 `tracing-subscriber`:
//! - console: 输出到 stderr, 可选彩色, 带时间戳和源码位置
//! - file: 可选, 无色, 记录 target, 按天滚动, 非阻塞写入
//!
//! 级别默认取配置, 环境变量 `ESPARSE_LOG` 可覆盖 (EnvFilter 语法).

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// 覆盖日志级别的环境变量
pub const LOG_ENV: &str = "ESPARSE_LOG";

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 默认级别 (EnvFilter 语法)
    pub level: String,
    /// 日志文件目录; None 时只输出到 console
    pub directory: Option<String>,
    /// 日志文件前缀
    pub file_prefix: String,
    /// console 是否彩色
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "esparse".to_string(),
            color: true,
        }
    }
}

/// `-v` 次数对应的级别: 0=info, 1=debug, 2+=trace
pub fn verbosity_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
static INITIALIZED: OnceLock<()> = OnceLock::new();

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level))
}

/// 初始化日志系统; 重复调用直接返回
pub fn init(config: &LoggingConfig) -> Result<()> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(config.color)
        .event_format(LineFormat {
            color: config.color,
            ..LineFormat::CONSOLE_PLAIN
        })
        .with_filter(build_filter(&config.level));

    let file_layer = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)
                .with_context(|| format!("创建日志目录失败, path={}", directory))?;
            let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix(&config.file_prefix)
                .filename_suffix("log")
                .build(Path::new(directory))
                .with_context(|| format!("创建日志文件失败, directory={}", directory))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            LOG_GUARD.set(guard).ok();
            Some(
                fmt::Layer::default()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(LineFormat::FILE)
                    .with_filter(build_filter(&config.level)),
            )
        }
        None => None,
    };

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("安装日志订阅器失败")?;
    INITIALIZED.set(()).ok();
    Ok(())
}

/// 单行日志格式
///
/// console 带颜色和源码位置; 文件写入 target (如 `esparse_nal::parser`) 便于按模块过滤.
#[derive(Debug, Clone, Copy)]
struct LineFormat {
    color: bool,
    location: bool,
}

impl LineFormat {
    const CONSOLE_PLAIN: Self = Self {
        color: false,
        location: true,
    };
    const FILE: Self = Self {
        color: false,
        location: false,
    };

    fn level_color(level: tracing::Level) -> &'static str {
        match level {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write!(writer, "[{}] ", Local::now().format("%m-%d %H:%M:%S%.3f"))?;
        let level = meta.level().as_str();
        if self.color {
            write!(writer, "{}{:5}\x1b[0m ", Self::level_color(*meta.level()), level)?;
        } else {
            write!(writer, "{:5} ", level)?;
        }
        if self.location {
            let file = meta.file().unwrap_or("?");
            write!(writer, "{}:{} > ", file, meta.line().unwrap_or(0))?;
        } else {
            write!(writer, "{} > ", meta.target())?;
        }
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
