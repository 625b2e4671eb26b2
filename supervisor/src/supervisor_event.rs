use crate::HealthStatus;

use tokio::sync::oneshot;

/// Messages applied one at a time by the supervisor's event loop.
///
/// Child and timer notifications carry the generation of the launch they
/// belong to so late arrivals from an earlier attempt are ignored.
#[derive(Debug)]
pub(crate) enum SupervisorEvent {
    /// Ready marker seen in the child's output
    Ready { name: String, generation: u64 },
    /// Ready timeout elapsed without a marker
    ReadyTimeout { name: String, generation: u64 },
    Exited {
        name: String,
        generation: u64,
        exit_code: Option<i32>,
    },
    /// Retry delay elapsed
    RetryDue { name: String, generation: u64 },
    /// Health observation from the verifier
    Health { name: String, status: HealthStatus },
    /// Stop everything; `done` resolves once every child has exited
    Shutdown { done: oneshot::Sender<()> },
}
