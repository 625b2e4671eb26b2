use crate::{
    CONFIG_DIR_NAME, CONFIG_FILENAME, ConfigError, ConfigErrorResult, ENV_CONFIG_DIR,
    HealthConfig, LoggingConfig, ServiceSpec, SupervisorConfig, default_services,
};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub supervisor: SupervisorConfig,
    pub health: HealthConfig,
    pub logging: LoggingConfig,
    pub services: Vec<ServiceSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supervisor: SupervisorConfig::default(),
            health: HealthConfig::default(),
            logging: LoggingConfig::default(),
            services: default_services(),
        }
    }
}

impl Config {
    /// Load config once at startup.
    ///
    /// Loading order:
    /// 1. Check for FLEET_CONFIG_DIR env var, else use ./.fleet/
    /// 2. Auto-create config directory if it doesn't exist
    /// 3. Load config.toml if it exists, else use defaults
    /// 4. Apply FLEET_* environment variable overrides
    /// 5. Resolve service tokens from <NAME>_API_KEY where not set in the file
    ///
    /// Does NOT validate - call validate() after load().
    pub fn load() -> ConfigErrorResult<Self> {
        let config_dir = Self::config_dir()?;

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::Io {
                path: config_dir.clone(),
                source: e,
            })?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            Self::load_toml(&config_path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.resolve_service_tokens();

        Ok(config)
    }

    /// Parse a config file without consulting the environment.
    pub fn from_toml_str(contents: &str) -> ConfigErrorResult<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::Toml {
            path: PathBuf::from(CONFIG_FILENAME),
            source: e,
        })
    }

    fn load_toml(path: &Path) -> ConfigErrorResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the config directory.
    /// Priority: FLEET_CONFIG_DIR env var > ./.fleet/ (relative to cwd)
    pub fn config_dir() -> ConfigErrorResult<PathBuf> {
        if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
            return Ok(PathBuf::from(dir));
        }

        let cwd = std::env::current_dir()
            .map_err(|_| ConfigError::config("Cannot determine current working directory"))?;
        Ok(cwd.join(CONFIG_DIR_NAME))
    }

    /// Validate all configuration.
    /// Call after load() to catch all errors at startup.
    pub fn validate(&self) -> ConfigErrorResult<()> {
        self.supervisor.validate()?;
        self.health.validate()?;

        if self.logging.dir.contains("..") || Path::new(&self.logging.dir).is_absolute() {
            return Err(ConfigError::logging(
                "logging.dir must be relative and cannot contain '..'",
            ));
        }

        if self.services.is_empty() {
            return Err(ConfigError::service("at least one service must be configured"));
        }

        let mut names = HashSet::new();
        let mut port_vars = HashSet::new();
        for spec in &self.services {
            spec.validate()?;

            if !names.insert(spec.name.as_str()) {
                return Err(ConfigError::service(format!(
                    "duplicate service name '{}'",
                    spec.name
                )));
            }

            // Two names that collapse to the same env prefix would share a port variable
            if !port_vars.insert(spec.port_env_var()) {
                return Err(ConfigError::service(format!(
                    "service '{}' maps to an already used variable {}",
                    spec.name,
                    spec.port_env_var()
                )));
            }
        }

        Ok(())
    }

    /// Absolute directory for supervisor log files.
    pub fn log_dir(&self) -> ConfigErrorResult<PathBuf> {
        Ok(Self::config_dir()?.join(&self.logging.dir))
    }

    /// Log configuration summary (NEVER logs tokens).
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!(
            "  supervisor: attempts={}, retry_delay={}ms, ready_timeout={}s, grace={}s, scan={} ports",
            self.supervisor.max_attempts,
            self.supervisor.retry_delay_ms,
            self.supervisor.ready_timeout_secs,
            self.supervisor.shutdown_grace_secs,
            self.supervisor.port_scan_attempts
        );
        info!(
            "  health: host={}, timeout={}s, poll={}ms x{}, monitor={}s",
            self.health.host,
            self.health.timeout_secs,
            self.health.poll_interval_ms,
            self.health.max_attempts,
            self.health.monitor_interval_secs
        );
        info!(
            "  logging: {} (colored: {}, file: {})",
            self.logging.level,
            self.logging.colored,
            self.logging.file.as_deref().unwrap_or("none")
        );

        for spec in &self.services {
            let auth = match (spec.requires_auth, spec.token()) {
                (false, _) => "none",
                (true, Some(_)) => "bearer (token set)",
                (true, None) => "bearer (NO TOKEN)",
            };
            info!(
                "  service {}: port={}, command={}, health={}, auth={}",
                spec.name, spec.preferred_port, spec.command, spec.health_path, auth
            );
        }
    }

    fn apply_env_overrides(&mut self) {
        // Supervisor
        Self::apply_env_parse(
            "FLEET_SUPERVISOR_MAX_ATTEMPTS",
            &mut self.supervisor.max_attempts,
        );
        Self::apply_env_parse(
            "FLEET_SUPERVISOR_RETRY_DELAY_MS",
            &mut self.supervisor.retry_delay_ms,
        );
        Self::apply_env_parse(
            "FLEET_SUPERVISOR_READY_TIMEOUT_SECS",
            &mut self.supervisor.ready_timeout_secs,
        );
        Self::apply_env_parse(
            "FLEET_SUPERVISOR_SHUTDOWN_GRACE_SECS",
            &mut self.supervisor.shutdown_grace_secs,
        );
        Self::apply_env_parse(
            "FLEET_SUPERVISOR_PORT_SCAN_ATTEMPTS",
            &mut self.supervisor.port_scan_attempts,
        );
        Self::apply_env_parse(
            "FLEET_SUPERVISOR_SETTLE_TIMEOUT_SECS",
            &mut self.supervisor.settle_timeout_secs,
        );
        Self::apply_env_string(
            "FLEET_SUPERVISOR_READY_MARKER",
            &mut self.supervisor.ready_marker,
        );

        // Health
        Self::apply_env_string("FLEET_HEALTH_HOST", &mut self.health.host);
        Self::apply_env_parse("FLEET_HEALTH_TIMEOUT_SECS", &mut self.health.timeout_secs);
        Self::apply_env_parse(
            "FLEET_HEALTH_POLL_INTERVAL_MS",
            &mut self.health.poll_interval_ms,
        );
        Self::apply_env_parse("FLEET_HEALTH_MAX_ATTEMPTS", &mut self.health.max_attempts);
        Self::apply_env_parse(
            "FLEET_HEALTH_MONITOR_INTERVAL_SECS",
            &mut self.health.monitor_interval_secs,
        );

        // Logging
        Self::apply_env_parse(crate::ENV_LOG_LEVEL, &mut self.logging.level);
        Self::apply_env_bool(crate::ENV_LOG_COLORED, &mut self.logging.colored);
        Self::apply_env_option_string(crate::ENV_LOG_FILE, &mut self.logging.file);
        Self::apply_env_string("FLEET_LOG_DIR", &mut self.logging.dir);
    }

    fn resolve_service_tokens(&mut self) {
        for spec in self.services.iter_mut().filter(|s| s.auth_token.is_none()) {
            Self::apply_env_option_string(&spec.token_env_var(), &mut spec.auth_token);
        }
    }

    /// Helper: Apply environment variable override for String values
    fn apply_env_string(var_name: &str, target: &mut String) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val;
        }
    }

    /// Helper: Apply environment variable override for bool values (accepts "true"/"1")
    fn apply_env_bool(var_name: &str, target: &mut bool) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val == "true" || val == "1";
        }
    }

    /// Helper: Apply environment variable override for parseable values
    fn apply_env_parse<T: std::str::FromStr>(var_name: &str, target: &mut T) {
        if let Ok(val) = std::env::var(var_name)
            && let Ok(parsed) = val.parse()
        {
            *target = parsed;
        }
    }

    /// Helper: Apply environment variable override for Option<String> values
    fn apply_env_option_string(var_name: &str, target: &mut Option<String>) {
        if let Ok(val) = std::env::var(var_name) {
            *target = Some(val);
        }
    }
}
