use crate::{HealthCheck, HealthStatus, LifecycleState, ServiceRuntime};

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Final word on one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOutcome {
    pub name: String,
    pub port: Option<u16>,
    pub state: LifecycleState,
    /// `None` when the service was not serving and therefore not probed
    pub health: Option<HealthStatus>,
    pub attempts: u32,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthCounts {
    pub healthy: usize,
    pub unhealthy: usize,
    pub unreachable: usize,
    pub timeout: usize,
    pub not_checked: usize,
}

/// Per-service outcomes and counts per health classification.
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub services: Vec<ServiceOutcome>,
    pub counts: HealthCounts,
    pub generated_at: DateTime<Utc>,
}

impl FleetReport {
    /// Combine lifecycle snapshots with health results.
    ///
    /// Serving states reflect the probe the same way the supervisor will
    /// once the result is recorded.
    pub fn new(runtimes: &[ServiceRuntime], checks: &HashMap<String, HealthCheck>) -> Self {
        let mut counts = HealthCounts::default();

        let services = runtimes
            .iter()
            .map(|runtime| {
                let check = checks.get(&runtime.name);
                let health = check.map(|c| c.status);

                match health {
                    Some(HealthStatus::Healthy) => counts.healthy += 1,
                    Some(HealthStatus::Unhealthy) => counts.unhealthy += 1,
                    Some(HealthStatus::Unreachable) => counts.unreachable += 1,
                    Some(HealthStatus::Timeout) => counts.timeout += 1,
                    None => counts.not_checked += 1,
                }

                let state = match health {
                    Some(status) => runtime.state.with_health(status.is_healthy()),
                    None => runtime.state,
                };

                let detail = check
                    .and_then(|c| c.detail.clone())
                    .or_else(|| runtime.last_error.clone());

                ServiceOutcome {
                    name: runtime.name.clone(),
                    port: runtime.port,
                    state,
                    health,
                    attempts: runtime.attempts,
                    detail,
                }
            })
            .collect();

        Self {
            services,
            counts,
            generated_at: Utc::now(),
        }
    }

    /// True when every service is running and healthy.
    pub fn is_all_healthy(&self) -> bool {
        !self.services.is_empty()
            && self.services.iter().all(|s| {
                s.state == LifecycleState::Running && s.health == Some(HealthStatus::Healthy)
            })
    }

    /// Process exit code for this report: 0 iff all healthy.
    pub fn exit_code(&self) -> u8 {
        if self.is_all_healthy() { 0 } else { 1 }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceOutcome> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Human-readable lines for every service whose state, health or port
    /// differs from `previous`.
    pub fn changes_since(&self, previous: &FleetReport) -> Vec<String> {
        self.services
            .iter()
            .filter_map(|current| {
                let before = previous.service(&current.name);
                let changed = before.is_none_or(|b| {
                    b.state != current.state || b.health != current.health || b.port != current.port
                });
                if !changed {
                    return None;
                }

                let describe = |o: &ServiceOutcome| {
                    format!("{}/{}", o.state, health_label(o.health))
                };
                Some(match before {
                    Some(b) => format!("{}: {} -> {}", current.name, describe(b), describe(current)),
                    None => format!("{}: {}", current.name, describe(current)),
                })
            })
            .collect()
    }
}

fn health_label(health: Option<HealthStatus>) -> &'static str {
    health.map_or("-", |h| h.as_str())
}

impl fmt::Display for FleetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_width = self
            .services
            .iter()
            .map(|s| s.name.len())
            .max()
            .unwrap_or(0)
            .max("SERVICE".len());

        writeln!(
            f,
            "{:<name_width$}  {:>5}  {:<9}  {:<11}  {:>8}  DETAIL",
            "SERVICE", "PORT", "STATE", "HEALTH", "ATTEMPTS"
        )?;

        for s in &self.services {
            let port = s.port.map_or_else(|| String::from("-"), |p| p.to_string());
            writeln!(
                f,
                "{:<name_width$}  {:>5}  {:<9}  {:<11}  {:>8}  {}",
                s.name,
                port,
                s.state.as_str(),
                health_label(s.health),
                s.attempts,
                s.detail.as_deref().unwrap_or("")
            )?;
        }

        write!(
            f,
            "{} services: {} healthy, {} unhealthy, {} unreachable, {} timeout, {} not checked",
            self.services.len(),
            self.counts.healthy,
            self.counts.unhealthy,
            self.counts.unreachable,
            self.counts.timeout,
            self.counts.not_checked
        )
    }
}
