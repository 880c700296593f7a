//! Tracing subscriber setup for front ends.
//!
//! The library only emits `tracing` events. Binaries call [`init_logging`]
//! once at startup to route them to stderr and, optionally, to a daily
//! rolling log file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Prefix of rolled log file names.
pub const LOG_FILE_PREFIX: &str = "orbitlapse.log";

/// Builds the filter from `RUST_LOG`, falling back to `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber.
///
/// When `log_dir` is given, events are also written to a daily rolling file
/// in that directory. The returned guard flushes the file writer on drop and
/// must be held for the life of the program.
///
/// Calling this twice is harmless; the second call leaves the first
/// subscriber in place.
pub fn init_logging(default_filter: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_writer(writer).with_ansi(false);
            let _ = tracing_subscriber::registry()
                .with(env_filter(default_filter))
                .with(console)
                .with(file)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(env_filter(default_filter))
                .with(console)
                .try_init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_with_file_layer_returns_guard() {
        let temp = TempDir::new().unwrap();
        let guard = init_logging("debug", Some(temp.path()));
        assert!(guard.is_some());
        tracing::info!("written to file");
        drop(guard);

        // A second install is ignored rather than panicking.
        assert!(init_logging("info", None).is_none());
    }
}
