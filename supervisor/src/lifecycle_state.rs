use std::fmt;

use serde::Serialize;

/// Lifecycle state of one supervised service.
///
/// `pending -> starting -> {running | failed}`, `running -> {stopped | pending | failed}`,
/// and `running <-> unhealthy` from health observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Waiting for its first launch or for a retry
    Pending,
    /// Process spawned, not yet ready
    Starting,
    Running,
    /// Process alive but failing health checks
    Unhealthy,
    /// Retries exhausted or no port available; terminal for this run
    Failed,
    /// Stopped by supervisor shutdown; terminal
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Unhealthy => "unhealthy",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }

    /// Neither waiting to launch nor still starting.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending | Self::Starting)
    }

    /// Up and serving, healthy or not. Only these states are health-checked.
    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Running | Self::Unhealthy)
    }

    /// State after a health observation; only serving states move.
    pub fn with_health(self, healthy: bool) -> Self {
        match (self, healthy) {
            (Self::Running, false) => Self::Unhealthy,
            (Self::Unhealthy, true) => Self::Running,
            (state, _) => state,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
