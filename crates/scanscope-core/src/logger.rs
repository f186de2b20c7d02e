//! Console logger.
//!
//! Prints `[YYYY-mm-dd HH:MM:SS LEVEL] message` to stderr, matching the
//! timestamp format of the per-scan log files. Use `init_with_level` to
//! install it once at startup.

use std::io::Write;
use std::sync::OnceLock;

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::{format::FmtSpan, time::ChronoLocal};
#[cfg(feature = "tracing")]
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Wall-clock format shared by console output and scan log files.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

struct ConsoleLogger {
    level: LevelFilter,
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let now = Local::now().format(LOG_TIMESTAMP_FORMAT);
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "[{now} {:>5}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<ConsoleLogger> = OnceLock::new();

/// Install the console logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| ConsoleLogger { level });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing` subscriber on stderr with the console timestamp
/// format.
///
/// `RUST_LOG` wins when set; otherwise events at `default_level` and above
/// are shown. At debug level and below, span close events carry timings for
/// planning and tile capture.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, default_level: LevelFilter) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(default_level)));
    let spans = if default_level >= LevelFilter::Debug {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(spans)
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::new(LOG_TIMESTAMP_FORMAT.to_owned()));
    if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder.finish().try_init()
    }
}

#[cfg(feature = "tracing")]
fn default_directive(level: LevelFilter) -> String {
    level.to_string().to_ascii_lowercase()
}
