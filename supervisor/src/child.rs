//! Spawning one service process and watching it until it exits.

use crate::supervisor_event::SupervisorEvent;
use crate::{SupervisorError, SupervisorResult, SupervisorSettings};

use fleet_config::{
    ENV_AUTH_TOKEN, ENV_LOG_COLORED, ENV_LOG_FILE, ENV_LOG_LEVEL, ENV_REQUIRE_AUTH,
    ENV_SERVICE_HOST, ENV_SERVICE_NAME, ENV_SERVICE_PORT, PORT_PLACEHOLDER, ServiceSpec,
};

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use error_location::ErrorLocation;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// The supervisor's side of a live child: its pid and a way to stop it.
///
/// The `Child` itself is owned by the watcher task, so this is the only
/// process handle the supervisor keeps per service.
#[derive(Debug)]
pub(crate) struct ChildHandle {
    pub pid: Option<u32>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl ChildHandle {
    /// Ask the watcher to terminate the process (SIGTERM, grace, kill).
    /// The exit still arrives as a normal `Exited` event.
    pub fn request_stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// One launch of one service.
pub(crate) struct Launch<'a> {
    pub spec: &'a ServiceSpec,
    pub port: u16,
    pub generation: u64,
    pub settings: &'a SupervisorSettings,
    pub events: mpsc::UnboundedSender<SupervisorEvent>,
}

/// Find the program to run for a service command.
///
/// Search order for bare names:
/// 1. Sibling to current exe (the fleet binaries are built side by side)
/// 2. System PATH (left to the OS at spawn time)
///
/// Commands containing a path separator are used as given.
pub fn resolve_command(command: &str) -> PathBuf {
    let path = Path::new(command);
    if path.is_absolute() || path.components().count() > 1 {
        return path.to_path_buf();
    }

    if let Ok(exe) = std::env::current_exe()
        && let Some(exe_dir) = exe.parent()
    {
        let sibling = exe_dir.join(format!("{command}{}", std::env::consts::EXE_SUFFIX));
        if sibling.is_file() {
            debug!("Using {} (sibling): {}", command, sibling.display());
            return sibling;
        }
    }

    PathBuf::from(command)
}

/// Replace every `{port}` in the arguments with the resolved port.
pub fn substitute_port(args: &[String], port: u16) -> Vec<String> {
    let port = port.to_string();
    args.iter()
        .map(|arg| arg.replace(PORT_PLACEHOLDER, &port))
        .collect()
}

/// Spawn the process for one launch and start its watcher and output readers.
#[track_caller]
pub(crate) fn spawn(launch: Launch<'_>) -> SupervisorResult<ChildHandle> {
    let Launch {
        spec,
        port,
        generation,
        settings,
        events,
    } = launch;

    let program = resolve_command(&spec.command);
    let args = substitute_port(&spec.args, port);

    let mut cmd = Command::new(&program);
    cmd.args(&args)
        .envs(&spec.env)
        .env(spec.port_env_var(), port.to_string())
        .env(ENV_SERVICE_NAME, &spec.name)
        .env(ENV_SERVICE_PORT, port.to_string())
        .env(ENV_SERVICE_HOST, &settings.host)
        .env(ENV_REQUIRE_AUTH, spec.requires_auth.to_string())
        .env(ENV_LOG_LEVEL, settings.log_level.as_str())
        // Output is piped and scanned for the ready marker
        .env(ENV_LOG_COLORED, "false")
        .env_remove(ENV_LOG_FILE)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match spec.token() {
        Some(token) => cmd.env(ENV_AUTH_TOKEN, token),
        None => cmd.env_remove(ENV_AUTH_TOKEN),
    };

    let mut child = cmd.spawn().map_err(|source| SupervisorError::ProcessSpawn {
        command: program.clone(),
        source,
        location: ErrorLocation::from(Location::caller()),
    })?;

    let pid = child.id();
    info!(
        service = %spec.name,
        pid = ?pid,
        port,
        attempt = generation,
        "Spawned {}",
        program.display()
    );

    let marker = spec
        .ready_marker
        .as_deref()
        .unwrap_or(&settings.ready_marker)
        .to_lowercase();

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(read_output(
            stdout,
            "stdout",
            spec.name.clone(),
            generation,
            marker.clone(),
            events.clone(),
        ));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(read_output(
            stderr,
            "stderr",
            spec.name.clone(),
            generation,
            marker,
            events.clone(),
        ));
    }

    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(watch(
        child,
        stop_rx,
        settings.shutdown_grace,
        spec.name.clone(),
        generation,
        events,
    ));

    Ok(ChildHandle {
        pid,
        stop_tx: Some(stop_tx),
    })
}

/// Re-emit each output line as a log event and report the ready marker once.
async fn read_output<R>(
    stream: R,
    stream_name: &'static str,
    name: String,
    generation: u64,
    marker: String,
    events: mpsc::UnboundedSender<SupervisorEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    let mut ready_sent = false;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                info!(target: "fleet::service", service = %name, stream = stream_name, "{line}");

                if !ready_sent && line.to_lowercase().contains(&marker) {
                    ready_sent = true;
                    let _ = events.send(SupervisorEvent::Ready {
                        name: name.clone(),
                        generation,
                    });
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(service = %name, stream = stream_name, error = %e, "Output stream closed");
                break;
            }
        }
    }
}

/// Own the child until it exits, terminating it when asked.
async fn watch(
    mut child: Child,
    stop_rx: oneshot::Receiver<()>,
    grace: Duration,
    name: String,
    generation: u64,
    events: mpsc::UnboundedSender<SupervisorEvent>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = stop_rx => terminate(&mut child, grace, &name).await,
    };

    let exit_code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(service = %name, error = %e, "Failed to collect exit status");
            None
        }
    };

    let _ = events.send(SupervisorEvent::Exited {
        name,
        generation,
        exit_code,
    });
}

/// SIGTERM, bounded grace period, then force kill.
async fn terminate(child: &mut Child, grace: Duration, name: &str) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            info!(service = %name, pid, "Sending SIGTERM");
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!(service = %name, pid, error = %e, "SIGTERM failed");
            }
        }
    }

    #[cfg(not(unix))]
    {
        info!(service = %name, "Terminating process");
        child.start_kill()?;
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!(
                service = %name,
                grace_secs = grace.as_secs(),
                "Process did not exit within grace period, force killing"
            );
            child.kill().await?;
            child.wait().await
        }
    }
}
