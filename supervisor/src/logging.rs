//! Logging setup with file rotation.

use crate::{SupervisorError, SupervisorResult};

use fleet_config::LoggingConfig;

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

const MAX_LOG_FILES: usize = 7;

/// Setup logging with console and optional rotating file output.
///
/// # Log Layers
/// - Console: human-readable, colored when `logging.colored`
/// - File: plain text, daily rotation, 7-day retention, only when
///   `logging.file` names a file prefix
///
/// `RUST_LOG` overrides the configured level. Records from the `log`
/// crate are bridged into tracing.
pub fn setup_logging(logging: &LoggingConfig, log_dir: &Path) -> SupervisorResult<()> {
    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(logging.colored);

    let file_layer = match logging.file.as_deref() {
        Some(prefix) => {
            std::fs::create_dir_all(log_dir)?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(MAX_LOG_FILES)
                .filename_prefix(prefix)
                .filename_suffix("log")
                .build(log_dir)
                .map_err(|e| SupervisorError::logging(e.to_string()))?;

            Some(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(false)
                    .with_writer(file_appender),
            )
        }
        None => None,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SupervisorError::logging(e.to_string()))?;

    Ok(())
}
