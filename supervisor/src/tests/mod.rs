mod error;
mod lifecycle_state;
mod port;

use crate::{LifecycleState, ServiceRuntime};

pub(crate) fn runtime(name: &str, port: Option<u16>, state: LifecycleState) -> ServiceRuntime {
    ServiceRuntime {
        name: name.to_string(),
        port,
        preferred_port: port.unwrap_or(3000),
        state,
        attempts: 1,
        pid: None,
        started_at: None,
        last_error: None,
        health_path: String::from("/api/health"),
        requires_auth: false,
    }
}
