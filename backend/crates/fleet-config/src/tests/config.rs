use crate::tests::{EnvGuard, setup_config_dir, write_config};
use crate::{Config, supervisor_config};

use googletest::assert_that;
use googletest::prelude::{anything, eq, ok};
use log::LevelFilter;
use serial_test::serial;

// =========================================================================
// Happy Path Tests
// =========================================================================

#[test]
#[serial]
fn given_no_config_file_when_load_then_ok_with_defaults() {
    // Given
    let (_temp, _guard) = setup_config_dir();

    // When
    let result = Config::load();

    // Then
    assert_that!(result, ok(anything()));
    let config = result.unwrap();
    assert_that!(
        config.supervisor.max_attempts,
        eq(supervisor_config::DEFAULT_MAX_ATTEMPTS)
    );
    assert_that!(config.services.len(), eq(6));
    assert_that!(config.health.host.as_str(), eq("127.0.0.1"));
}

#[test]
#[serial]
fn given_no_config_file_when_load_and_validate_then_ok() {
    // Given
    let (_temp, _guard) = setup_config_dir();

    // When
    let config = Config::load().unwrap();
    let result = config.validate();

    // Then
    assert_that!(result, ok(anything()));
}

#[test]
#[serial]
fn given_missing_config_dir_when_load_then_directory_created() {
    // Given
    let temp = tempfile::TempDir::new().unwrap();
    let nested = temp.path().join("nested").join("fleet");
    let _guard = EnvGuard::set(crate::ENV_CONFIG_DIR, nested.to_str().unwrap());

    // When
    let result = Config::load();

    // Then
    assert_that!(result, ok(anything()));
    assert!(nested.is_dir());
}

#[test]
#[serial]
fn given_toml_services_when_load_then_defaults_replaced() {
    // Given
    let (temp, _guard) = setup_config_dir();
    write_config(
        &temp,
        r#"
            [supervisor]
            max_attempts = 5

            [[services]]
            name = "alpha"
            preferred_port = 9001
            command = "/usr/bin/alpha"
            args = ["--port", "{port}"]

            [[services]]
            name = "beta"
            preferred_port = 9002
            command = "beta"
            requires_auth = true
            health_path = "/health"
        "#,
    );

    // When
    let config = Config::load().unwrap();

    // Then
    assert_that!(config.supervisor.max_attempts, eq(5));
    assert_that!(config.services.len(), eq(2));
    assert_that!(config.services[0].args.len(), eq(2));
    assert_that!(config.services[1].requires_auth, eq(true));
    assert_that!(config.services[1].health_path.as_str(), eq("/health"));
    assert_that!(config.services[0].health_path.as_str(), eq("/api/health"));
}

#[test]
#[serial]
fn given_env_var_and_toml_when_load_then_env_var_overrides_toml() {
    // Given
    let (temp, _guard) = setup_config_dir();
    write_config(&temp, "[health]\ntimeout_secs = 4");
    let _timeout = EnvGuard::set("FLEET_HEALTH_TIMEOUT_SECS", "2");

    // When
    let config = Config::load().unwrap();

    // Then
    assert_that!(config.health.timeout_secs, eq(2));
}

#[test]
#[serial]
fn given_multiple_env_overrides_when_load_then_all_apply() {
    // Given
    let (_temp, _guard) = setup_config_dir();
    let _attempts = EnvGuard::set("FLEET_SUPERVISOR_MAX_ATTEMPTS", "4");
    let _delay = EnvGuard::set("FLEET_SUPERVISOR_RETRY_DELAY_MS", "250");
    let _level = EnvGuard::set("FLEET_LOG_LEVEL", "debug");
    let _colored = EnvGuard::set("FLEET_LOG_COLORED", "false");

    // When
    let config = Config::load().unwrap();

    // Then
    assert_that!(config.supervisor.max_attempts, eq(4));
    assert_that!(config.supervisor.retry_delay_ms, eq(250));
    assert_that!(config.logging.level.0, eq(LevelFilter::Debug));
    assert_that!(config.logging.colored, eq(false));
}

#[test]
#[serial]
fn given_invalid_log_level_when_load_then_falls_back_to_info() {
    // Given
    let (_temp, _guard) = setup_config_dir();
    let _level = EnvGuard::set("FLEET_LOG_LEVEL", "loud");

    // When
    let config = Config::load().unwrap();

    // Then
    assert_that!(config.logging.level.0, eq(LevelFilter::Info));
}
