//! Run log setup.
//!
//! Every run appends `HH:MM:SS LEVEL message` lines to `video.log` inside the
//! input directory and, unless disabled, echoes them to stderr. The subscriber
//! is installed as the default for the current thread only while the returned
//! [`LogGuard`] is alive, so nothing is registered process-wide.

use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::{self, time::FormatTime, FmtContext};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

use crate::filename::LOG_FILE_NAME;

const TIME_FORMAT: &str = "%H:%M:%S";

/// Local wall-clock time, without the date
#[derive(Debug, Clone, Copy)]
struct ClockTime;

impl FormatTime for ClockTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format(TIME_FORMAT))
    }
}

/// One `HH:MM:SS LEVEL message` line per event, single-space separated
#[derive(Debug, Clone, Copy)]
struct RunLogFormat;

impl<S, N> FormatEvent<S, N> for RunLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        ClockTime.format_time(&mut writer)?;
        write!(writer, " {} ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub level: Level,
    pub console: bool,
}

impl LogConfig {
    /// Log into `<input_dir>/video.log` at INFO, echoing to stderr
    pub fn for_input<P: AsRef<Path>>(input_dir: P) -> Self {
        Self {
            log_dir: input_dir.as_ref().to_path_buf(),
            level: Level::INFO,
            console: true,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.level = if debug { Level::DEBUG } else { Level::INFO };
        self
    }

    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }
}

/// Keeps the run log installed; dropping it detaches the subscriber
pub struct LogGuard {
    _default: DefaultGuard,
}

pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory: {}", config.log_dir.display()))?;

    // NEVER rotation appends to the same file across runs
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(&config.log_dir)
        .with_context(|| format!("Failed to open log file: {}", config.log_file().display()))?;

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .event_format(RunLogFormat);

    let console_layer = config.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .event_format(RunLogFormat)
    });

    let subscriber = tracing_subscriber::registry()
        .with(LevelFilter::from_level(config.level))
        .with(file_layer)
        .with(console_layer);

    let guard = tracing::subscriber::set_default(subscriber);

    tracing::debug!(
        "Logging to {} at {}",
        config.log_file().display(),
        config.level
    );

    Ok(LogGuard { _default: guard })
}
