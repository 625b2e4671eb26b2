use crate::{ConfigError, ConfigErrorResult, DEFAULT_HOST};

use std::time::Duration;

use serde::Deserialize;

pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

pub const MIN_POLL_INTERVAL_MS: u64 = 50;
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

pub const MIN_MAX_ATTEMPTS: u32 = 1;
pub const MAX_MAX_ATTEMPTS: u32 = 600;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

pub const MIN_MONITOR_INTERVAL_SECS: u64 = 1;
pub const MAX_MONITOR_INTERVAL_SECS: u64 = 3_600;
pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Host the health probes connect to
    pub host: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Delay between polling rounds
    pub poll_interval_ms: u64,
    /// Polling rounds before giving up on a service
    pub max_attempts: u32,
    /// Interval between rounds in `--monitor` mode
    pub monitor_interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            host: String::from(DEFAULT_HOST),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            monitor_interval_secs: DEFAULT_MONITOR_INTERVAL_SECS,
        }
    }
}

impl HealthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.host != DEFAULT_HOST && self.host != "localhost" {
            return Err(ConfigError::health(format!(
                "health.host must be {DEFAULT_HOST} or localhost, got {}",
                self.host
            )));
        }

        if self.timeout_secs < MIN_TIMEOUT_SECS || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::health(format!(
                "health.timeout_secs must be {}-{}, got {}",
                MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS, self.timeout_secs
            )));
        }

        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS
            || self.poll_interval_ms > MAX_POLL_INTERVAL_MS
        {
            return Err(ConfigError::health(format!(
                "health.poll_interval_ms must be {}-{}, got {}",
                MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS, self.poll_interval_ms
            )));
        }

        if self.max_attempts < MIN_MAX_ATTEMPTS || self.max_attempts > MAX_MAX_ATTEMPTS {
            return Err(ConfigError::health(format!(
                "health.max_attempts must be {}-{}, got {}",
                MIN_MAX_ATTEMPTS, MAX_MAX_ATTEMPTS, self.max_attempts
            )));
        }

        if self.monitor_interval_secs < MIN_MONITOR_INTERVAL_SECS
            || self.monitor_interval_secs > MAX_MONITOR_INTERVAL_SECS
        {
            return Err(ConfigError::health(format!(
                "health.monitor_interval_secs must be {}-{}, got {}",
                MIN_MONITOR_INTERVAL_SECS, MAX_MONITOR_INTERVAL_SECS, self.monitor_interval_secs
            )));
        }

        Ok(())
    }
}
