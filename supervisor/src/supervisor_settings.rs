use fleet_config::{Config, LogLevel};

use std::time::Duration;

/// Everything the supervisor needs from configuration, resolved once.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Launches per service including the first
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub ready_timeout: Duration,
    pub shutdown_grace: Duration,
    pub port_scan_attempts: u16,
    /// Default ready marker, matched case-insensitively
    pub ready_marker: String,
    /// Host the services bind and are probed on
    pub host: String,
    /// Forwarded to children as `FLEET_LOG_LEVEL`
    pub log_level: LogLevel,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SupervisorSettings {
    pub fn from_config(config: &Config) -> Self {
        let supervisor = &config.supervisor;
        Self {
            max_attempts: supervisor.max_attempts,
            retry_delay: supervisor.retry_delay(),
            ready_timeout: supervisor.ready_timeout(),
            shutdown_grace: supervisor.shutdown_grace(),
            port_scan_attempts: supervisor.port_scan_attempts,
            ready_marker: supervisor.ready_marker.clone(),
            host: config.health.host.clone(),
            log_level: config.logging.level,
        }
    }
}
