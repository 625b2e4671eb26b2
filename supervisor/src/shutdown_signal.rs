//! SIGINT/SIGTERM handling for the `fleet` binary.

use crate::{ServiceSupervisor, SupervisorResult};

use tokio::sync::oneshot;
use tracing::info;

/// Start shutting the fleet down on the first SIGINT or SIGTERM.
///
/// Runs on a dedicated thread; `request_shutdown` flags the supervisor
/// synchronously before the async side hears about the signal.
/// The receiver resolves with the signal number.
#[cfg(unix)]
pub fn listen(supervisor: ServiceSupervisor) -> SupervisorResult<oneshot::Receiver<i32>> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let (tx, rx) = oneshot::channel();

    std::thread::Builder::new()
        .name(String::from("fleet-signals"))
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("Received signal {sig}, shutting down...");
                let _ = supervisor.request_shutdown();
                let _ = tx.send(sig);
            }
        })?;

    Ok(rx)
}

#[cfg(not(unix))]
pub fn listen(supervisor: ServiceSupervisor) -> SupervisorResult<oneshot::Receiver<i32>> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            let _ = supervisor.request_shutdown();
            let _ = tx.send(2);
        }
    });

    Ok(rx)
}
