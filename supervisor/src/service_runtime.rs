use crate::LifecycleState;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle record of one service's launch attempts.
///
/// Owned and mutated only by the supervisor's event loop; everyone else
/// sees clones published through `ServiceSupervisor::subscribe`. Carries
/// no secrets so it can be logged and serialized freely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRuntime {
    pub name: String,
    /// Resolved port of the current or last attempt; may differ from the preferred port
    pub port: Option<u16>,
    pub preferred_port: u16,
    pub state: LifecycleState,
    /// Launches so far, including the first
    pub attempts: u32,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub health_path: String,
    pub requires_auth: bool,
}

impl ServiceRuntime {
    pub fn new(spec: &fleet_config::ServiceSpec) -> Self {
        Self {
            name: spec.name.clone(),
            port: None,
            preferred_port: spec.preferred_port,
            state: LifecycleState::Pending,
            attempts: 0,
            pid: None,
            started_at: None,
            last_error: None,
            health_path: spec.health_path.clone(),
            requires_auth: spec.requires_auth,
        }
    }

    /// Relaunches after the first attempt.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// `host:port` base URL when a port has been resolved.
    pub fn base_url(&self, host: &str) -> Option<String> {
        self.port.map(|port| format!("http://{host}:{port}"))
    }
}
