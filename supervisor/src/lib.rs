//! Port allocation, child-process supervision with bounded retry, and
//! health verification for a fleet of local HTTP services.

mod child;
mod error;
mod health;
mod lifecycle_state;
mod port;
mod report;
mod service_runtime;
mod supervisor;
mod supervisor_event;
mod supervisor_settings;

pub mod cli;
pub mod logging;
pub mod monitor;
pub mod shutdown_signal;

#[cfg(test)]
mod tests;

pub use child::{resolve_command, substitute_port};
pub use error::{Result as SupervisorResult, SupervisorError};
pub use health::{HealthCheck, HealthStatus, HealthVerifier, StatusProbe};
pub use lifecycle_state::LifecycleState;
pub use port::PortAllocator;
pub use report::{FleetReport, HealthCounts, ServiceOutcome};
pub use service_runtime::ServiceRuntime;
pub use supervisor::ServiceSupervisor;
pub use supervisor_settings::SupervisorSettings;
