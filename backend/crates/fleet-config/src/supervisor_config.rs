use crate::{ConfigError, ConfigErrorResult};

use std::time::Duration;

use serde::Deserialize;

// Launch attempts per service, including the first one
pub const MIN_MAX_ATTEMPTS: u32 = 1;
pub const MAX_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub const MIN_RETRY_DELAY_MS: u64 = 100;
pub const MAX_RETRY_DELAY_MS: u64 = 10_000;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_500;

pub const MIN_READY_TIMEOUT_SECS: u64 = 1;
pub const MAX_READY_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 10;

pub const MIN_SHUTDOWN_GRACE_SECS: u64 = 1;
pub const MAX_SHUTDOWN_GRACE_SECS: u64 = 60;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

pub const MIN_PORT_SCAN_ATTEMPTS: u16 = 1;
pub const MAX_PORT_SCAN_ATTEMPTS: u16 = 1_000;
pub const DEFAULT_PORT_SCAN_ATTEMPTS: u16 = 100;

pub const MIN_SETTLE_TIMEOUT_SECS: u64 = 1;
pub const MAX_SETTLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_SETTLE_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_READY_MARKER: &str = "listening on";

/// Process supervision settings.
///
/// Retries use a fixed delay; a service that exits `max_attempts` times
/// in a row is marked failed for the rest of the run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Maximum launch attempts per service (including the initial launch)
    pub max_attempts: u32,
    /// Fixed delay before relaunching an exited service
    pub retry_delay_ms: u64,
    /// Grace delay after which a live service without a ready marker counts as running
    pub ready_timeout_secs: u64,
    /// Time between SIGTERM and SIGKILL during shutdown
    pub shutdown_grace_secs: u64,
    /// Number of consecutive ports scanned when the preferred port is taken
    pub port_scan_attempts: u16,
    /// Upper bound on waiting for every service to leave `pending`/`starting`
    pub settle_timeout_secs: u64,
    /// Output substring that marks a service as ready (case-insensitive)
    pub ready_marker: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            ready_timeout_secs: DEFAULT_READY_TIMEOUT_SECS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            port_scan_attempts: DEFAULT_PORT_SCAN_ATTEMPTS,
            settle_timeout_secs: DEFAULT_SETTLE_TIMEOUT_SECS,
            ready_marker: String::from(DEFAULT_READY_MARKER),
        }
    }
}

impl SupervisorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.settle_timeout_secs)
    }

    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.max_attempts < MIN_MAX_ATTEMPTS || self.max_attempts > MAX_MAX_ATTEMPTS {
            return Err(ConfigError::supervisor(format!(
                "supervisor.max_attempts must be {}-{}, got {}",
                MIN_MAX_ATTEMPTS, MAX_MAX_ATTEMPTS, self.max_attempts
            )));
        }

        if self.retry_delay_ms < MIN_RETRY_DELAY_MS || self.retry_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(ConfigError::supervisor(format!(
                "supervisor.retry_delay_ms must be {}-{}, got {}",
                MIN_RETRY_DELAY_MS, MAX_RETRY_DELAY_MS, self.retry_delay_ms
            )));
        }

        if self.ready_timeout_secs < MIN_READY_TIMEOUT_SECS
            || self.ready_timeout_secs > MAX_READY_TIMEOUT_SECS
        {
            return Err(ConfigError::supervisor(format!(
                "supervisor.ready_timeout_secs must be {}-{}, got {}",
                MIN_READY_TIMEOUT_SECS, MAX_READY_TIMEOUT_SECS, self.ready_timeout_secs
            )));
        }

        if self.shutdown_grace_secs < MIN_SHUTDOWN_GRACE_SECS
            || self.shutdown_grace_secs > MAX_SHUTDOWN_GRACE_SECS
        {
            return Err(ConfigError::supervisor(format!(
                "supervisor.shutdown_grace_secs must be {}-{}, got {}",
                MIN_SHUTDOWN_GRACE_SECS, MAX_SHUTDOWN_GRACE_SECS, self.shutdown_grace_secs
            )));
        }

        if self.port_scan_attempts < MIN_PORT_SCAN_ATTEMPTS
            || self.port_scan_attempts > MAX_PORT_SCAN_ATTEMPTS
        {
            return Err(ConfigError::supervisor(format!(
                "supervisor.port_scan_attempts must be {}-{}, got {}",
                MIN_PORT_SCAN_ATTEMPTS, MAX_PORT_SCAN_ATTEMPTS, self.port_scan_attempts
            )));
        }

        if self.settle_timeout_secs < MIN_SETTLE_TIMEOUT_SECS
            || self.settle_timeout_secs > MAX_SETTLE_TIMEOUT_SECS
        {
            return Err(ConfigError::supervisor(format!(
                "supervisor.settle_timeout_secs must be {}-{}, got {}",
                MIN_SETTLE_TIMEOUT_SECS, MAX_SETTLE_TIMEOUT_SECS, self.settle_timeout_secs
            )));
        }

        if self.ready_marker.trim().is_empty() {
            return Err(ConfigError::supervisor(
                "supervisor.ready_marker cannot be empty",
            ));
        }

        Ok(())
    }
}
