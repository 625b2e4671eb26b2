//! Lifecycle tests against real child processes.
#![cfg(unix)]

use fleet_config::ServiceSpec;
use fleet_supervisor::{
    HealthStatus, LifecycleState, ServiceRuntime, ServiceSupervisor, SupervisorSettings,
};

use std::net::TcpListener;
use std::time::{Duration, Instant};

use serial_test::serial;

const SH: &str = "/bin/sh";

fn settings() -> SupervisorSettings {
    SupervisorSettings {
        max_attempts: 3,
        retry_delay: Duration::from_millis(50),
        ready_timeout: Duration::from_millis(200),
        shutdown_grace: Duration::from_millis(500),
        port_scan_attempts: 50,
        ..SupervisorSettings::default()
    }
}

fn shell(name: &str, port: u16, script: &str) -> ServiceSpec {
    ServiceSpec::new(name, port, SH).with_args(["-c", script])
}

fn free_port() -> u16 {
    let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll the named service until `predicate` holds or the deadline passes.
async fn wait_for<F>(supervisor: &ServiceSupervisor, name: &str, timeout: Duration, predicate: F) -> ServiceRuntime
where
    F: Fn(&ServiceRuntime) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let runtime = supervisor.runtime(name).unwrap();
        if predicate(&runtime) {
            return runtime;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {name}, last runtime: {runtime:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
#[serial]
async fn test_crashing_service_fails_after_max_attempts() {
    let supervisor =
        ServiceSupervisor::start(vec![shell("crashy", free_port(), "exit 1")], settings()).unwrap();

    let runtime = wait_for(&supervisor, "crashy", Duration::from_secs(5), |r| {
        r.state == LifecycleState::Failed
    })
    .await;
    assert_eq!(runtime.attempts, 3);
    assert!(runtime.last_error.unwrap().contains("exited"));

    // No launches after the service is marked failed
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(supervisor.runtime("crashy").unwrap().attempts, 3);
    assert_eq!(
        supervisor.runtime("crashy").unwrap().state,
        LifecycleState::Failed
    );

    supervisor.shutdown_all().await;
    assert_eq!(
        supervisor.runtime("crashy").unwrap().state,
        LifecycleState::Failed
    );
}

#[tokio::test]
#[serial]
async fn test_clean_exit_outside_shutdown_is_retried() {
    let supervisor =
        ServiceSupervisor::start(vec![shell("oneshot", free_port(), "exit 0")], settings()).unwrap();

    let runtime = wait_for(&supervisor, "oneshot", Duration::from_secs(5), |r| {
        r.state == LifecycleState::Failed
    })
    .await;
    assert_eq!(runtime.attempts, 3);

    supervisor.shutdown_all().await;
}

#[tokio::test]
#[serial]
async fn test_shutdown_cancels_pending_retry() {
    let settings = SupervisorSettings {
        retry_delay: Duration::from_secs(5),
        ..settings()
    };
    let supervisor =
        ServiceSupervisor::start(vec![shell("crashy", free_port(), "exit 1")], settings).unwrap();

    wait_for(&supervisor, "crashy", Duration::from_secs(5), |r| {
        r.state == LifecycleState::Pending && r.attempts == 1
    })
    .await;

    supervisor.shutdown_all().await;
    assert!(supervisor.is_shutting_down());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let runtime = supervisor.runtime("crashy").unwrap();
    assert_eq!(runtime.state, LifecycleState::Stopped);
    assert_eq!(runtime.attempts, 1);
}

#[tokio::test]
#[serial]
async fn test_shared_preferred_port_gets_distinct_ports() {
    let port = free_port();
    let specs = vec![
        shell("first", port, "sleep 30"),
        shell("second", port, "sleep 30"),
        shell("third", port.saturating_add(1), "sleep 30"),
    ];
    let supervisor = ServiceSupervisor::start(specs, settings()).unwrap();

    for name in ["first", "second", "third"] {
        wait_for(&supervisor, name, Duration::from_secs(5), |r| {
            r.state == LifecycleState::Running
        })
        .await;
    }

    let ports: Vec<u16> = supervisor
        .snapshot()
        .iter()
        .map(|r| r.port.unwrap())
        .collect();
    assert_eq!(ports[0], port);
    assert_ne!(ports[0], ports[1]);
    assert_ne!(ports[1], ports[2]);
    assert_ne!(ports[0], ports[2]);

    supervisor.shutdown_all().await;
}

#[tokio::test]
#[serial]
async fn test_ready_marker_sees_injected_environment() {
    let port = free_port();
    let spec = shell(
        "alpha",
        port,
        r#"echo "$FLEET_SERVICE_NAME up on $ALPHA_PORT and $FLEET_SERVICE_PORT"; sleep 30"#,
    )
    .with_ready_marker(&format!("ALPHA UP ON {port} AND {port}"));
    let settings = SupervisorSettings {
        ready_timeout: Duration::from_secs(60),
        ..settings()
    };
    let supervisor = ServiceSupervisor::start(vec![spec], settings).unwrap();

    let runtime = wait_for(&supervisor, "alpha", Duration::from_secs(5), |r| {
        r.state == LifecycleState::Running
    })
    .await;
    assert_eq!(runtime.port, Some(port));
    assert!(runtime.pid.is_some());
    assert!(runtime.started_at.is_some());

    supervisor.shutdown_all().await;
}

#[tokio::test]
#[serial]
async fn test_port_placeholder_in_args_is_substituted() {
    let port = free_port();
    let spec = ServiceSpec::new("beta", port, SH)
        .with_args(["-c", "echo \"bound $0\"; sleep 30", "{port}"])
        .with_ready_marker(&format!("bound {port}"));
    let settings = SupervisorSettings {
        ready_timeout: Duration::from_secs(60),
        ..settings()
    };
    let supervisor = ServiceSupervisor::start(vec![spec], settings).unwrap();

    wait_for(&supervisor, "beta", Duration::from_secs(5), |r| {
        r.state == LifecycleState::Running
    })
    .await;

    supervisor.shutdown_all().await;
}

#[tokio::test]
#[serial]
async fn test_silent_service_is_promoted_after_ready_timeout() {
    let supervisor =
        ServiceSupervisor::start(vec![shell("quiet", free_port(), "sleep 30")], settings()).unwrap();

    assert!(!supervisor.runtime("quiet").unwrap().state.is_settled());

    let runtime = wait_for(&supervisor, "quiet", Duration::from_secs(5), |r| {
        r.state == LifecycleState::Running
    })
    .await;
    assert_eq!(runtime.attempts, 1);

    supervisor.shutdown_all().await;
}

#[tokio::test]
#[serial]
async fn test_shutdown_stops_every_service() {
    let specs = vec![
        shell("one", free_port(), "sleep 30"),
        shell("two", free_port(), "sleep 30"),
    ];
    let supervisor = ServiceSupervisor::start(specs, settings()).unwrap();

    for name in ["one", "two"] {
        wait_for(&supervisor, name, Duration::from_secs(5), |r| {
            r.state == LifecycleState::Running
        })
        .await;
    }

    tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown_all())
        .await
        .unwrap();

    for runtime in supervisor.snapshot() {
        assert_eq!(runtime.state, LifecycleState::Stopped);
        assert_eq!(runtime.pid, None);
    }
}

#[tokio::test]
#[serial]
async fn test_service_ignoring_sigterm_is_killed_after_grace() {
    let spec = shell("stubborn", free_port(), r#"trap "" TERM; echo ignoring; sleep 30"#);
    let settings = SupervisorSettings {
        shutdown_grace: Duration::from_millis(300),
        ..settings()
    };
    let supervisor = ServiceSupervisor::start(vec![spec], settings).unwrap();

    wait_for(&supervisor, "stubborn", Duration::from_secs(5), |r| {
        r.state == LifecycleState::Running
    })
    .await;

    let started = Instant::now();
    tokio::time::timeout(Duration::from_secs(10), supervisor.shutdown_all())
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(
        supervisor.runtime("stubborn").unwrap().state,
        LifecycleState::Stopped
    );
}

#[tokio::test]
#[serial]
async fn test_shutdown_all_is_idempotent() {
    let supervisor =
        ServiceSupervisor::start(vec![shell("once", free_port(), "sleep 30")], settings()).unwrap();

    wait_for(&supervisor, "once", Duration::from_secs(5), |r| {
        r.state == LifecycleState::Running
    })
    .await;

    tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown_all())
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown_all())
        .await
        .unwrap();

    assert_eq!(
        supervisor.runtime("once").unwrap().state,
        LifecycleState::Stopped
    );
}

#[tokio::test]
async fn test_start_without_services_is_an_error() {
    let result = ServiceSupervisor::start(Vec::new(), settings());

    assert!(result.is_err());
}

#[tokio::test]
#[serial]
async fn test_missing_binary_fails_after_max_attempts() {
    let spec = ServiceSpec::new("ghost", free_port(), "/nonexistent/fleet-missing-binary");
    let supervisor = ServiceSupervisor::start(vec![spec], settings()).unwrap();

    let runtime = wait_for(&supervisor, "ghost", Duration::from_secs(5), |r| {
        r.state == LifecycleState::Failed
    })
    .await;
    assert_eq!(runtime.attempts, 3);
    assert!(runtime.last_error.unwrap().contains("fleet-missing-binary"));

    supervisor.shutdown_all().await;
}

#[tokio::test]
#[serial]
async fn test_health_observations_toggle_running_and_unhealthy() {
    let supervisor =
        ServiceSupervisor::start(vec![shell("flaky", free_port(), "sleep 30")], settings()).unwrap();

    wait_for(&supervisor, "flaky", Duration::from_secs(5), |r| {
        r.state == LifecycleState::Running
    })
    .await;

    supervisor.record_health("flaky", HealthStatus::Unreachable);
    wait_for(&supervisor, "flaky", Duration::from_secs(2), |r| {
        r.state == LifecycleState::Unhealthy
    })
    .await;

    supervisor.record_health("flaky", HealthStatus::Healthy);
    wait_for(&supervisor, "flaky", Duration::from_secs(2), |r| {
        r.state == LifecycleState::Running
    })
    .await;

    supervisor.shutdown_all().await;
}

#[tokio::test]
#[serial]
async fn test_wait_settled_reports_starting_fleet() {
    let settings = SupervisorSettings {
        ready_timeout: Duration::from_secs(60),
        ..settings()
    };
    let supervisor =
        ServiceSupervisor::start(vec![shell("slow", free_port(), "sleep 30")], settings).unwrap();

    let settled = supervisor
        .wait_settled(Duration::from_millis(200), Duration::from_millis(50))
        .await;
    assert!(!settled);

    supervisor.shutdown_all().await;
    assert!(
        supervisor
            .wait_settled(Duration::from_millis(200), Duration::from_millis(50))
            .await
    );
}
