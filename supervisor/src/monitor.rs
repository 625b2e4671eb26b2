//! Startup verification and continuous monitoring of a supervised fleet.

use crate::{FleetReport, HealthVerifier, ServiceSupervisor};

use std::time::Duration;

use tracing::{info, warn};

/// Timing for health polling.
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub settle_timeout: Duration,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub monitor_interval: Duration,
}

impl MonitorSettings {
    pub fn from_config(config: &fleet_config::Config) -> Self {
        Self {
            settle_timeout: config.supervisor.settle_timeout(),
            poll_interval: config.health.poll_interval(),
            max_attempts: config.health.max_attempts,
            monitor_interval: config.health.monitor_interval(),
        }
    }
}

/// Wait for the fleet to settle, poll health, feed the results back into
/// the supervisor and return the report.
pub async fn verify_fleet(
    supervisor: &ServiceSupervisor,
    verifier: &HealthVerifier,
    settings: &MonitorSettings,
) -> FleetReport {
    supervisor
        .wait_settled(settings.settle_timeout, settings.poll_interval)
        .await;

    let report = verifier
        .verify_supervised(supervisor, settings.poll_interval, settings.max_attempts)
        .await;

    record(supervisor, &report);
    report
}

/// Re-check health every `monitor_interval` forever, logging and printing
/// the report whenever anything changes. `latest` always holds the most
/// recent report so the caller can still read it after cancelling.
pub async fn monitor(
    supervisor: &ServiceSupervisor,
    verifier: &HealthVerifier,
    settings: &MonitorSettings,
    latest: &mut FleetReport,
) {
    info!(
        interval_secs = settings.monitor_interval.as_secs(),
        "Monitoring fleet health"
    );

    loop {
        tokio::time::sleep(settings.monitor_interval).await;

        if supervisor.is_shutting_down() {
            break;
        }

        let report = verifier
            .verify_supervised(supervisor, settings.poll_interval, 1)
            .await;
        record(supervisor, &report);

        let changes = report.changes_since(latest);
        if !changes.is_empty() {
            for change in &changes {
                warn!("Fleet change: {change}");
            }
            println!("{report}");
        }

        *latest = report;
    }
}

fn record(supervisor: &ServiceSupervisor, report: &FleetReport) {
    for outcome in &report.services {
        if let Some(health) = outcome.health {
            supervisor.record_health(&outcome.name, health);
        }
    }
}
