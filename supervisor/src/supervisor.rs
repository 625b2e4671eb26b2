//! Service process lifecycle with bounded retry.

use crate::child::{self, ChildHandle, Launch};
use crate::supervisor_event::SupervisorEvent;
use crate::{
    HealthStatus, LifecycleState, PortAllocator, ServiceRuntime, SupervisorError,
    SupervisorResult, SupervisorSettings,
};

use fleet_config::ServiceSpec;

use std::collections::{HashMap, HashSet};
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use error_location::ErrorLocation;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Handle to the supervising event loop.
///
/// Cheap to clone. Every method is safe to call from any task; only
/// `request_shutdown` is needed from a signal-handling thread, and it
/// does not block.
#[derive(Debug, Clone)]
pub struct ServiceSupervisor {
    events: mpsc::UnboundedSender<SupervisorEvent>,
    snapshot_rx: watch::Receiver<Vec<ServiceRuntime>>,
    shutting_down: Arc<AtomicBool>,
}

impl ServiceSupervisor {
    /// Start supervising `specs`, launching them in declared order.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(specs: Vec<ServiceSpec>, settings: SupervisorSettings) -> SupervisorResult<Self> {
        if specs.is_empty() {
            return Err(SupervisorError::no_services());
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shutting_down = Arc::new(AtomicBool::new(false));

        let order: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();
        let services: HashMap<String, ManagedService> = specs
            .into_iter()
            .map(|spec| (spec.name.clone(), ManagedService::new(spec)))
            .collect();

        let initial: Vec<ServiceRuntime> = order
            .iter()
            .filter_map(|name| services.get(name).map(|s| s.runtime.clone()))
            .collect();
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        info!(
            services = order.len(),
            max_attempts = settings.max_attempts,
            "Starting supervisor"
        );

        let event_loop = EventLoop {
            allocator: PortAllocator::new(settings.port_scan_attempts),
            services,
            order,
            settings,
            events_tx: events_tx.clone(),
            events_rx,
            snapshot_tx,
            shutting_down: shutting_down.clone(),
            shutdown_started: false,
            shutdown_waiters: Vec::new(),
        };
        tokio::spawn(event_loop.run());

        Ok(Self {
            events: events_tx,
            snapshot_rx,
            shutting_down,
        })
    }

    /// Current runtimes in declared order.
    pub fn snapshot(&self) -> Vec<ServiceRuntime> {
        self.snapshot_rx.borrow().clone()
    }

    pub fn runtime(&self, name: &str) -> Option<ServiceRuntime> {
        self.snapshot_rx
            .borrow()
            .iter()
            .find(|r| r.name == name)
            .cloned()
    }

    /// Receive a new snapshot after every applied event.
    pub fn subscribe(&self) -> watch::Receiver<Vec<ServiceRuntime>> {
        self.snapshot_rx.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Begin shutdown without waiting for it.
    ///
    /// Sets the shutting-down flag before queueing the command, so an exit
    /// or retry processed in between can no longer launch anything.
    /// The returned receiver resolves once every child has exited.
    pub fn request_shutdown(&self) -> oneshot::Receiver<()> {
        self.shutting_down.store(true, Ordering::SeqCst);

        let (done_tx, done_rx) = oneshot::channel();
        if self
            .events
            .send(SupervisorEvent::Shutdown { done: done_tx })
            .is_err()
        {
            debug!("Supervisor loop already finished");
        }
        done_rx
    }

    /// Stop every service (SIGTERM, grace period, SIGKILL) and wait for all
    /// of them to exit. Idempotent.
    pub async fn shutdown_all(&self) {
        // A closed channel means the loop already finished a shutdown
        let _ = self.request_shutdown().await;
    }

    /// Record a health observation; moves a service between running and unhealthy.
    pub fn record_health(&self, name: &str, status: HealthStatus) {
        let _ = self.events.send(SupervisorEvent::Health {
            name: name.to_string(),
            status,
        });
    }

    /// Poll until no service is pending or starting.
    ///
    /// Bounded: at most `timeout / poll_interval` checks. Returns whether
    /// the fleet settled.
    pub async fn wait_settled(&self, timeout: Duration, poll_interval: Duration) -> bool {
        let poll_interval = poll_interval.max(Duration::from_millis(10));
        let max_polls = (timeout.as_millis() / poll_interval.as_millis()).max(1);

        for _ in 0..max_polls {
            if self.snapshot().iter().all(|r| r.state.is_settled()) {
                return true;
            }
            tokio::time::sleep(poll_interval).await;
        }

        let settled = self.snapshot().iter().all(|r| r.state.is_settled());
        if !settled {
            warn!(
                timeout_secs = timeout.as_secs(),
                "Services still starting after settle timeout"
            );
        }
        settled
    }
}

/// Supervisor-private state of one service.
struct ManagedService {
    spec: ServiceSpec,
    runtime: ServiceRuntime,
    /// Bumped on every launch; events from older launches are ignored
    generation: u64,
    /// At most one live process per service
    child: Option<ChildHandle>,
    ready_timer: Option<JoinHandle<()>>,
    retry_timer: Option<JoinHandle<()>>,
}

impl ManagedService {
    fn new(spec: ServiceSpec) -> Self {
        Self {
            runtime: ServiceRuntime::new(&spec),
            spec,
            generation: 0,
            child: None,
            ready_timer: None,
            retry_timer: None,
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(timer) = self.ready_timer.take() {
            timer.abort();
        }
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
    }
}

/// The single task that owns every `ManagedService`.
struct EventLoop {
    allocator: PortAllocator,
    services: HashMap<String, ManagedService>,
    order: Vec<String>,
    settings: SupervisorSettings,
    events_tx: mpsc::UnboundedSender<SupervisorEvent>,
    events_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
    snapshot_tx: watch::Sender<Vec<ServiceRuntime>>,
    shutting_down: Arc<AtomicBool>,
    shutdown_started: bool,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
}

impl EventLoop {
    async fn run(mut self) {
        for name in self.order.clone() {
            self.launch(&name);
        }
        self.publish();

        while let Some(event) = self.events_rx.recv().await {
            self.apply(event);
            self.publish();

            if self.shutdown_started && self.all_exited() {
                info!("All services stopped");
                for waiter in self.shutdown_waiters.drain(..) {
                    let _ = waiter.send(());
                }
                break;
            }
        }

        debug!("Supervisor loop finished");
    }

    fn apply(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Ready { name, generation } => {
                self.on_ready(&name, generation, "ready marker seen");
            }
            SupervisorEvent::ReadyTimeout { name, generation } => {
                self.on_ready(&name, generation, "no ready marker, promoted after grace delay");
            }
            SupervisorEvent::Exited {
                name,
                generation,
                exit_code,
            } => self.on_exit(&name, generation, exit_code),
            SupervisorEvent::RetryDue { name, generation } => {
                self.on_retry_due(&name, generation);
            }
            SupervisorEvent::Health { name, status } => self.on_health(&name, status),
            SupervisorEvent::Shutdown { done } => self.on_shutdown(done),
        }
    }

    /// Resolve a port and spawn one attempt of `name`.
    fn launch(&mut self, name: &str) {
        let reserved = self.reserved_ports(name);
        let shutting_down = self.shutting_down.load(Ordering::SeqCst);

        let Some(service) = self.services.get_mut(name) else {
            warn!(service = name, "Launch requested for unknown service");
            return;
        };

        if shutting_down {
            debug!(service = name, "Shutdown in progress, not launching");
            service.runtime.state = LifecycleState::Stopped;
            return;
        }

        if service.child.is_some() {
            warn!(service = name, "Launch skipped, process still running");
            return;
        }

        service.generation += 1;
        service.runtime.attempts += 1;
        service.runtime.pid = None;
        let attempt = service.runtime.attempts;

        let port = match self.allocator.allocate(service.spec.preferred_port, &reserved) {
            Ok(port) => port,
            Err(e) => {
                // No retry can produce a port the scan just failed to find
                error!(service = name, error = %e, "{}", e.recovery_hint());
                service.runtime.state = LifecycleState::Failed;
                service.runtime.port = None;
                service.runtime.last_error = Some(e.to_string());
                return;
            }
        };

        service.runtime.port = Some(port);
        service.runtime.state = LifecycleState::Starting;
        service.runtime.started_at = Some(Utc::now());

        info!(
            service = name,
            port,
            attempt,
            max_attempts = self.settings.max_attempts,
            "Launching service"
        );

        let spawned = child::spawn(Launch {
            spec: &service.spec,
            port,
            generation: service.generation,
            settings: &self.settings,
            events: self.events_tx.clone(),
        });

        match spawned {
            Ok(handle) => {
                service.runtime.pid = handle.pid;
                service.runtime.last_error = None;
                service.child = Some(handle);
                service.ready_timer = Some(spawn_timer(
                    self.settings.ready_timeout,
                    self.events_tx.clone(),
                    SupervisorEvent::ReadyTimeout {
                        name: name.to_string(),
                        generation: service.generation,
                    },
                ));
            }
            Err(e) => {
                error!(service = name, error = %e, "{}", e.recovery_hint());
                service.runtime.last_error = Some(e.to_string());
                self.retry_or_fail(name);
            }
        }
    }

    fn on_ready(&mut self, name: &str, generation: u64, reason: &str) {
        let Some(service) = self.services.get_mut(name) else {
            return;
        };

        if service.generation != generation
            || service.runtime.state != LifecycleState::Starting
            || service.child.is_none()
        {
            return;
        }

        if let Some(timer) = service.ready_timer.take() {
            timer.abort();
        }

        service.runtime.state = LifecycleState::Running;
        info!(
            service = name,
            port = ?service.runtime.port,
            reason,
            "Service running"
        );
    }

    fn on_exit(&mut self, name: &str, generation: u64, exit_code: Option<i32>) {
        let shutting_down = self.shutting_down.load(Ordering::SeqCst);

        let Some(service) = self.services.get_mut(name) else {
            return;
        };

        if service.generation != generation {
            debug!(service = name, generation, "Ignoring exit of an earlier launch");
            return;
        }

        service.child = None;
        service.runtime.pid = None;
        if let Some(timer) = service.ready_timer.take() {
            timer.abort();
        }

        if shutting_down {
            info!(service = name, exit_code = ?exit_code, "Service stopped");
            service.runtime.state = LifecycleState::Stopped;
            return;
        }

        let exit = SupervisorError::UnexpectedExit {
            name: name.to_string(),
            code: exit_code,
            location: ErrorLocation::from(Location::caller()),
        };
        warn!(service = name, exit_code = ?exit_code, "{exit}");
        service.runtime.last_error = Some(format!("exited with code {exit_code:?}"));

        self.retry_or_fail(name);
    }

    /// Schedule another launch while attempts remain, else mark failed.
    fn retry_or_fail(&mut self, name: &str) {
        let Some(service) = self.services.get_mut(name) else {
            return;
        };

        let attempts = service.runtime.attempts;
        let max_attempts = self.settings.max_attempts;

        if attempts >= max_attempts {
            error!(
                service = name,
                attempts, "Maximum launch attempts reached, giving up"
            );
            service.runtime.state = LifecycleState::Failed;
            return;
        }

        info!(
            service = name,
            attempt = attempts + 1,
            max_attempts,
            delay_ms = self.settings.retry_delay.as_millis() as u64,
            "Scheduling retry"
        );
        service.runtime.state = LifecycleState::Pending;
        service.retry_timer = Some(spawn_timer(
            self.settings.retry_delay,
            self.events_tx.clone(),
            SupervisorEvent::RetryDue {
                name: name.to_string(),
                generation: service.generation,
            },
        ));
    }

    fn on_retry_due(&mut self, name: &str, generation: u64) {
        let shutting_down = self.shutting_down.load(Ordering::SeqCst);

        let Some(service) = self.services.get_mut(name) else {
            return;
        };
        service.retry_timer = None;

        if service.generation != generation || service.runtime.state != LifecycleState::Pending {
            return;
        }

        if shutting_down {
            debug!(service = name, "Retry cancelled by shutdown");
            service.runtime.state = LifecycleState::Stopped;
            return;
        }

        self.launch(name);
    }

    fn on_health(&mut self, name: &str, status: HealthStatus) {
        let Some(service) = self.services.get_mut(name) else {
            return;
        };

        let before = service.runtime.state;
        let after = before.with_health(status.is_healthy());
        if before != after {
            info!(service = name, health = %status, "{} -> {}", before, after);
            service.runtime.state = after;
        }
    }

    fn on_shutdown(&mut self, done: oneshot::Sender<()>) {
        self.shutdown_waiters.push(done);

        if self.shutdown_started {
            return;
        }
        self.shutdown_started = true;
        self.shutting_down.store(true, Ordering::SeqCst);

        info!("Shutting down all services");

        for name in &self.order {
            let Some(service) = self.services.get_mut(name) else {
                continue;
            };

            service.cancel_timers();

            match service.child.as_mut() {
                Some(child) => child.request_stop(),
                None if service.runtime.state != LifecycleState::Failed => {
                    service.runtime.state = LifecycleState::Stopped;
                }
                None => {}
            }
        }
    }

    fn all_exited(&self) -> bool {
        self.services.values().all(|s| s.child.is_none())
    }

    /// Ports held by other services that may still bind them.
    fn reserved_ports(&self, except: &str) -> HashSet<u16> {
        self.services
            .values()
            .filter(|s| s.spec.name != except && !s.runtime.state.is_terminal())
            .filter_map(|s| s.runtime.port)
            .collect()
    }

    fn publish(&self) {
        let snapshot: Vec<ServiceRuntime> = self
            .order
            .iter()
            .filter_map(|name| self.services.get(name).map(|s| s.runtime.clone()))
            .collect();

        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

fn spawn_timer(
    delay: Duration,
    events: mpsc::UnboundedSender<SupervisorEvent>,
    event: SupervisorEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = events.send(event);
    })
}
