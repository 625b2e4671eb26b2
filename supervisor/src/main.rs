//! fleet - launch, supervise and health-check the local service fleet
//!
//! ```bash
//! # Start the fleet, verify health, print the report, stop the fleet
//! fleet
//!
//! # Keep the fleet running and re-check health until Ctrl+C
//! fleet --monitor
//! ```

use fleet_supervisor::cli::Cli;
use fleet_supervisor::monitor::{self, MonitorSettings};
use fleet_supervisor::{
    FleetReport, HealthVerifier, ServiceSupervisor, SupervisorResult, SupervisorSettings,
    logging, shutdown_signal,
};

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            eprintln!("Hint: {}", e.recovery_hint());
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> SupervisorResult<u8> {
    // Load and validate configuration
    let config = fleet_config::Config::load()?;
    config.validate()?;

    // Initialize logging (before any other logging)
    logging::setup_logging(&config.logging, &config.log_dir()?)?;

    info!("Starting fleet v{}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    let verifier = HealthVerifier::from_config(&config.health, &config.services)?;
    let settings = MonitorSettings::from_config(&config);

    let supervisor = ServiceSupervisor::start(
        config.services.clone(),
        SupervisorSettings::from_config(&config),
    )?;
    let mut signal_rx = shutdown_signal::listen(supervisor.clone())?;

    let mut latest: Option<FleetReport> = None;

    tokio::select! {
        _ = supervise(&cli, &supervisor, &verifier, &settings, &mut latest) => {}
        sig = &mut signal_rx => {
            if let Ok(sig) = sig {
                info!("Stopping fleet after signal {sig}");
            }
        }
    }

    supervisor.shutdown_all().await;

    let code = match latest {
        Some(report) => report.exit_code(),
        None => {
            warn!("Fleet stopped before the first health report");
            1
        }
    };

    info!(exit_code = code, "Fleet stopped");
    Ok(code)
}

/// Verify once and print the report; with `--monitor`, keep watching.
async fn supervise(
    cli: &Cli,
    supervisor: &ServiceSupervisor,
    verifier: &HealthVerifier,
    settings: &MonitorSettings,
    latest: &mut Option<FleetReport>,
) {
    let report = monitor::verify_fleet(supervisor, verifier, settings).await;
    println!("{report}");

    if report.is_all_healthy() {
        info!("All services running and healthy");
    } else {
        warn!("Not all services are running and healthy");
    }

    if !cli.monitor {
        *latest = Some(report);
        return;
    }

    let current = latest.insert(report);
    monitor::monitor(supervisor, verifier, settings, current).await;
}
