//! Diagnostic logging for plantdoc
//!
//! Everything goes to a daily-rolling file next to [`Config::log_path`]
//! (`~/.local/state/plantdoc/plantdoc.log.<date>`). Stdout stays clean for
//! reports and `--format json` output.

use crate::config::{Config, LoggingConfig};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// HTTP and TLS crates are chatty at debug; keep them at warn unless
/// `RUST_LOG` asks otherwise.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

/// Start file logging. Keep the returned guard alive until exit so buffered
/// lines are flushed.
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_path = Config::log_path();
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let prefix = log_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plantdoc.log".to_string());
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // A subscriber may already be installed when embedded or under test
    let _ = tracing_subscriber::registry()
        .with(filter(config))
        .with(file_layer)
        .try_init();

    tracing::info!(
        log_path = %log_path.display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Route library logs to the test harness's captured output
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("plantdoc_core=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Flushes pending log lines when dropped
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// `RUST_LOG` wins; otherwise the configured level with HTTP internals
/// quieted. An unknown level falls back to info.
fn filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = config
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    EnvFilter::new(format!("{},{}", level, QUIET_DEPENDENCIES))
}
