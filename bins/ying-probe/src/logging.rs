//! 日志初始化模块.
//!
//! 双输出:
//! - console: 写到 stderr (stdout 留给探测结果), 默认 warn, -v/-vv 提升
//! - file: 无色, 默认 info, -v/-vv 提升
//!
//! 两路都可以用 YING_LOG 环境变量覆盖. 日志文件输出到 $cwd/logs/{prefix}.{date}.log

use std::io::IsTerminal;
use std::sync::OnceLock;

use chrono::{Datelike, Local, Timelike};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// 日志级别的环境变量
const ENV_FILTER: &str = "YING_LOG";

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(ENV_FILTER).unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// 初始化日志系统
///
/// - `file_prefix`: 日志文件前缀 (如 "ying-probe")
/// - `verbosity`: 由 -v/-vv 控制
///
/// 日志目录创建失败时只输出到 console. 库 crate 通过 `log` 宏输出的记录
/// 也会被转发到这里.
pub fn init(file_prefix: &str, verbosity: u8) {
    let (console_level, file_level) = match verbosity {
        0 => ("warn", "info"),
        1 => ("debug", "debug"),
        _ => ("trace", "trace"),
    };

    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .event_format(ConsoleFormatter {
            color: std::io::stderr().is_terminal(),
        })
        .with_filter(filter(console_level));

    let appender = std::fs::create_dir_all("logs")
        .map_err(|e| e.to_string())
        .and_then(|()| {
            tracing_appender::rolling::RollingFileAppender::builder()
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix(file_prefix)
                .filename_suffix("log")
                .build("logs")
                .map_err(|e| e.to_string())
        });
    let file_layer = match appender {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            LOG_GUARD.set(guard).ok();
            Some(
                fmt::Layer::default()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(FileFormatter)
                    .with_filter(filter(file_level)),
            )
        }
        Err(e) => {
            eprintln!("警告: 无法创建日志文件, 只输出到终端: {e}");
            None
        }
    };

    if let Err(e) = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("警告: 日志系统已初始化: {e}");
    }
}

/// 时间戳前缀: [月-日 时:分:秒.毫秒]
fn write_timestamp(writer: &mut Writer<'_>) -> std::fmt::Result {
    let now = Local::now();
    write!(
        writer,
        "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] ",
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.timestamp_subsec_millis(),
    )
}

/// Console 格式: 终端上彩色显示级别
struct ConsoleFormatter {
    color: bool,
}

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
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
        let level = *event.metadata().level();
        write_timestamp(&mut writer)?;
        if self.color {
            let color = match level {
                tracing::Level::ERROR => "\x1b[31m",
                tracing::Level::WARN => "\x1b[33m",
                tracing::Level::INFO => "\x1b[32m",
                _ => "\x1b[34m",
            };
            write!(writer, "{}{:5}\x1b[0m > ", color, level)?;
        } else {
            write!(writer, "{:5} > ", level)?;
        }
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// File 格式: 无色, 无 target, 时间戳 + 级别 + 消息
struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
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
        write_timestamp(&mut writer)?;
        write!(writer, "{:5} > ", event.metadata().level())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
