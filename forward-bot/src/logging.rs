//! Logging setup: console output plus optional daily rolling files, both
//! stamped in the local timezone.

use std::path::Path;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "forward_bot=info,feed_platforms=info,onebot=info";

/// Number of daily log files kept on disk.
const LOG_RETENTION_FILES: usize = 7;

const LOG_FILE_PREFIX: &str = "forward-bot";

/// Timer that formats timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Resolve the filter: `RUST_LOG` wins over the configured directive.
fn build_filter(directive: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = if directive.trim().is_empty() {
        DEFAULT_LOG_FILTER
    } else {
        directive
    };
    EnvFilter::try_new(directive)
        .map_err(|e| Error::config(format!("invalid log filter '{directive}': {e}")))
}

/// Install the global subscriber.
///
/// When `log_dir` is set, logs are also written to daily files there. Keep
/// the returned guard alive for the lifetime of the process so buffered
/// lines get flushed.
pub fn init_logging(directive: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(directive)?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix("log")
                .max_log_files(LOG_RETENTION_FILES)
                .build(dir)
                .map_err(|e| Error::Other(format!("Failed to create log appender: {e}")))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter() {
        // SAFETY: tests in this module do not read RUST_LOG concurrently
        unsafe { std::env::remove_var("RUST_LOG") };
        assert!(build_filter("forward_bot=debug").is_ok());
        assert!(build_filter("").is_ok());
        assert!(build_filter("forward_bot=loud").is_err());
    }
}
