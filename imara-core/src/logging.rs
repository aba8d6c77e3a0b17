//! Logging infrastructure for imara
//!
//! Logs are written to `~/.local/state/imara/imara.log` following XDG standards.
//! The terminal stays free for session output, so every session transition,
//! dropped frame and transport failure ends up in the file only.

use crate::config::Config;
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// File name prefix of the rotated log files
const LOG_FILE_PREFIX: &str = "imara.log";

/// Transport and HTTP crates that log every frame and handshake at debug
const CHATTY_TARGETS: &[&str] = &[
    "tungstenite",
    "tokio_tungstenite",
    "hyper",
    "hyper_util",
    "reqwest",
    "rustls",
];

/// Initialize the logging system
///
/// Sets up tracing with:
/// - File output to XDG state directory, rotated daily, keeping
///   `logging.max_files` files
/// - `logging.level` for imara, with the websocket and HTTP stacks held at
///   warn unless RUST_LOG says otherwise
///
/// The first record names the endpoints in use, so a log file always says
/// which backend its sessions talked to.
pub fn init(config: &Config) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    let logging = &config.logging;

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(logging.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("failed to create log file appender: {}", e)))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&logging.level)));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %logging.level,
        ws_url = %config.server.ws_url,
        api_url = %config.server.api_url,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests
///
/// Session and transport events go to the test writer, so they show up
/// only for failing tests. RUST_LOG overrides the default of debug.
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives("debug")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Filter directives for `level`, with the chatty crates capped at warn
fn filter_directives(level: &str) -> String {
    let mut directives = level.to_string();
    for target in CHATTY_TARGETS {
        directives.push_str(&format!(",{}=warn", target));
    }
    directives
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Returns the log file path
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path() {
        let path = log_file_path();
        assert!(path.ends_with(format!("imara/{}", LOG_FILE_PREFIX)));
    }

    #[test]
    fn test_filter_caps_transport_crates() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("tungstenite=warn"));
        assert!(directives.contains("reqwest=warn"));

        // Every directive must parse, or EnvFilter would drop it silently
        for directive in directives.split(',') {
            assert!(
                directive.parse::<tracing_subscriber::filter::Directive>().is_ok(),
                "bad directive {directive}"
            );
        }
    }
}
