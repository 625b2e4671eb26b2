use fleet_stub::{AppState, StubConfig, build_router, logger};

use std::error::Error;

use log::{error, info, warn};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    let config = StubConfig::from_env()?;

    // Initialize logger (before any other logging)
    logger::initialize(
        &config.service_name,
        config.log_level,
        config.log_file.as_deref(),
        config.colored,
    )?;

    info!(
        "Starting {} (fleet-stub v{})",
        config.service_name,
        env!("CARGO_PKG_VERSION")
    );
    info!("Auth: {}", config.auth_mode());
    if config.require_auth && config.auth_token.is_none() {
        warn!("Authentication required but no token configured; /api/status will reject all requests");
    }

    let bind_addr = config.bind_addr();
    let app = build_router(AppState::new(config));

    let listener = TcpListener::bind(bind_addr).await?;

    // Get actual bound address
    let actual_addr = listener.local_addr()?;
    info!("Server listening on {}", actual_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Graceful shutdown complete");
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on unix, SIGTERM from the supervisor.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
