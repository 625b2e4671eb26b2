//! Health probes against supervised services.

use crate::{FleetReport, ServiceRuntime, ServiceSupervisor, SupervisorError, SupervisorResult};

use fleet_config::{HealthConfig, ServiceSpec};

use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::time::{Duration, Instant};

use error_location::ErrorLocation;
use futures::future::join_all;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use tracing::{debug, info, warn};

const STATUS_PATH: &str = "/api/status";

/// Classification of one health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// HTTP 200 with a parseable JSON body
    Healthy,
    /// Any other status, or an unparseable body
    Unhealthy,
    /// Connection failed
    Unreachable,
    Timeout,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Unreachable => "unreachable",
            Self::Timeout => "timeout",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub latency_ms: u64,
    /// Why the probe was not healthy
    pub detail: Option<String>,
}

impl HealthCheck {
    fn new(status: HealthStatus, started: Instant, detail: Option<String>) -> Self {
        Self {
            status,
            latency_ms: started.elapsed().as_millis() as u64,
            detail,
        }
    }
}

/// Outcome of an authenticated request to a service's status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusProbe {
    Authorized,
    /// 401 from the service
    Unauthorized,
    /// Any other non-success status
    Error(u16),
    Unreachable,
    Timeout,
}

/// Polls service health endpoints over plain HTTP with a bounded timeout.
///
/// Sends `Authorization: Bearer <token>` for services that have a token;
/// tokens stay inside the verifier and never reach a `ServiceRuntime`.
#[derive(Debug, Clone)]
pub struct HealthVerifier {
    client: reqwest::Client,
    host: String,
    timeout: Duration,
    tokens: HashMap<String, String>,
}

impl HealthVerifier {
    /// Create a verifier probing `host` with a per-request `timeout`.
    pub fn new(host: &str, timeout: Duration) -> SupervisorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(1)
            .build()?;

        Ok(Self {
            client,
            host: host.to_string(),
            timeout,
            tokens: HashMap::new(),
        })
    }

    pub fn from_config(health: &HealthConfig, services: &[ServiceSpec]) -> SupervisorResult<Self> {
        Ok(Self::new(&health.host, health.timeout())?.with_tokens(services))
    }

    /// Remember the bearer token of every service that has one.
    pub fn with_tokens(mut self, services: &[ServiceSpec]) -> Self {
        self.tokens = services
            .iter()
            .filter_map(|spec| spec.token().map(|t| (spec.name.clone(), t.to_string())))
            .collect();
        self
    }

    /// Probe one service's health endpoint.
    ///
    /// A runtime without a resolved port is unreachable by definition.
    pub async fn check(&self, runtime: &ServiceRuntime) -> HealthCheck {
        let started = Instant::now();

        let Some(base) = runtime.base_url(&self.host) else {
            return HealthCheck::new(
                HealthStatus::Unreachable,
                started,
                Some(String::from("no port resolved")),
            );
        };
        let url = format!("{base}{}", runtime.health_path);

        let mut request = self.client.get(&url);
        if let Some(token) = self.tokens.get(&runtime.name) {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return self.classify_error(&url, e, started),
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return HealthCheck::new(
                HealthStatus::Unhealthy,
                started,
                Some(format!("HTTP {status}")),
            );
        }

        match response.bytes().await {
            Ok(body) => match serde_json::from_slice::<serde_json::Value>(&body) {
                Ok(_) => HealthCheck::new(HealthStatus::Healthy, started, None),
                Err(e) => HealthCheck::new(
                    HealthStatus::Unhealthy,
                    started,
                    Some(format!("Invalid response: {e}")),
                ),
            },
            Err(e) => self.classify_error(&url, e, started),
        }
    }

    /// Poll every serving runtime until all are healthy or `max_attempts`
    /// rounds elapse. Services that are not serving are reported unprobed.
    pub async fn verify_all(
        &self,
        runtimes: &[ServiceRuntime],
        poll_interval: Duration,
        max_attempts: u32,
    ) -> FleetReport {
        self.verify_with(|| runtimes.to_vec(), poll_interval, max_attempts)
            .await
    }

    /// Like `verify_all`, but reads a fresh snapshot from `supervisor` every
    /// round, so services that finish starting or relaunch on another port
    /// while polling are picked up.
    pub async fn verify_supervised(
        &self,
        supervisor: &ServiceSupervisor,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> FleetReport {
        self.verify_with(|| supervisor.snapshot(), poll_interval, max_attempts)
            .await
    }

    /// Polling loop over whatever `current` returns each round.
    ///
    /// A result only counts while the service is still serving on the port
    /// it was probed on. Polling continues while any service is still
    /// pending or starting.
    pub(crate) async fn verify_with<F>(
        &self,
        current: F,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> FleetReport
    where
        F: Fn() -> Vec<ServiceRuntime>,
    {
        let mut checks: HashMap<String, (Option<u16>, HealthCheck)> = HashMap::new();
        let mut runtimes = current();

        for round in 1..=max_attempts.max(1) {
            if round > 1 {
                runtimes = current();
            }

            checks.retain(|name, (port, _)| {
                runtimes
                    .iter()
                    .any(|r| &r.name == name && r.state.is_serving() && r.port == *port)
            });

            let pending: Vec<&ServiceRuntime> = runtimes
                .iter()
                .filter(|r| r.state.is_serving())
                .filter(|r| {
                    !checks
                        .get(&r.name)
                        .is_some_and(|(_, check)| check.status.is_healthy())
                })
                .collect();
            let starting = runtimes.iter().any(|r| !r.state.is_settled());

            if pending.is_empty() && !starting {
                break;
            }

            if !pending.is_empty() {
                debug!(round, services = pending.len(), "Health polling round");

                let results = join_all(pending.iter().map(|r| self.check(r))).await;
                for (runtime, check) in pending.iter().zip(results) {
                    checks.insert(runtime.name.clone(), (runtime.port, check));
                }
            }

            let all_healthy = !starting
                && runtimes.iter().filter(|r| r.state.is_serving()).all(|r| {
                    checks
                        .get(&r.name)
                        .is_some_and(|(_, check)| check.status.is_healthy())
                });
            if all_healthy {
                info!(round, "All serving services healthy");
                break;
            }

            if round < max_attempts {
                tokio::time::sleep(poll_interval).await;
            }
        }

        let checks: HashMap<String, HealthCheck> = checks
            .into_iter()
            .map(|(name, (_, check))| (name, check))
            .collect();

        for runtime in runtimes.iter().filter(|r| r.state.is_serving()) {
            if let Some(check) = checks.get(&runtime.name)
                && !check.status.is_healthy()
            {
                warn!(
                    service = %runtime.name,
                    status = %check.status,
                    detail = check.detail.as_deref().unwrap_or(""),
                    "Service not healthy after polling"
                );
            }
        }

        FleetReport::new(&runtimes, &checks)
    }

    /// Request the status endpoint with `token` (or none) and classify the answer.
    pub async fn probe_status(&self, runtime: &ServiceRuntime, token: Option<&str>) -> StatusProbe {
        let Some(base) = runtime.base_url(&self.host) else {
            return StatusProbe::Unreachable;
        };
        let url = format!("{base}{STATUS_PATH}");

        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => StatusProbe::Authorized,
            Ok(response) if response.status() == reqwest::StatusCode::UNAUTHORIZED => {
                StatusProbe::Unauthorized
            }
            Ok(response) => StatusProbe::Error(response.status().as_u16()),
            Err(e) if e.is_timeout() => StatusProbe::Timeout,
            Err(_) => StatusProbe::Unreachable,
        }
    }

    #[track_caller]
    fn classify_error(&self, url: &str, e: reqwest::Error, started: Instant) -> HealthCheck {
        if e.is_timeout() {
            let error = SupervisorError::HealthCheckTimeout {
                url: url.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
                location: ErrorLocation::from(Location::caller()),
            };
            debug!("{error}");
            return HealthCheck::new(
                HealthStatus::Timeout,
                started,
                Some(format!("timed out after {}ms", self.timeout.as_millis())),
            );
        }

        let error = SupervisorError::HealthCheckUnreachable {
            url: url.to_string(),
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        };
        debug!("{error}");
        HealthCheck::new(HealthStatus::Unreachable, started, Some(e.to_string()))
    }
}
