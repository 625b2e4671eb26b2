use crate::{ConfigError, ConfigErrorResult, DEFAULT_HEALTH_PATH};

use std::collections::BTreeMap;

use serde::Deserialize;

const PORT_ENV_SUFFIX: &str = "_PORT";
const TOKEN_ENV_SUFFIX: &str = "_API_KEY";

/// Static declaration of one launchable service.
///
/// Built once at startup (defaults or `[[services]]` in `config.toml`)
/// and never mutated afterwards.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceSpec {
    /// Unique service name
    pub name: String,
    pub preferred_port: u16,
    /// Program to execute; bare names are looked up next to the supervisor, then on PATH
    pub command: String,
    /// Arguments; `{port}` is replaced with the resolved port
    #[serde(default)]
    pub args: Vec<String>,
    /// Whether `/api/status` requires a bearer token
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    /// Bearer token; falls back to `<NAME>_API_KEY` from the environment
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Overrides the supervisor-wide ready marker
    #[serde(default)]
    pub ready_marker: Option<String>,
    /// Extra environment passed to the process
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_health_path() -> String {
    String::from(DEFAULT_HEALTH_PATH)
}

impl ServiceSpec {
    pub fn new(name: &str, preferred_port: u16, command: &str) -> Self {
        Self {
            name: name.to_string(),
            preferred_port,
            command: command.to_string(),
            args: Vec::new(),
            requires_auth: false,
            health_path: default_health_path(),
            auth_token: None,
            ready_marker: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_auth(mut self, token: Option<&str>) -> Self {
        self.requires_auth = true;
        self.auth_token = token.map(str::to_string);
        self
    }

    pub fn with_health_path(mut self, path: &str) -> Self {
        self.health_path = path.to_string();
        self
    }

    pub fn with_ready_marker(mut self, marker: &str) -> Self {
        self.ready_marker = Some(marker.to_string());
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Uppercased name with every non-alphanumeric character stripped.
    pub fn env_prefix(&self) -> String {
        self.name
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }

    /// Environment variable carrying the resolved port, e.g. `GITHUBMCP_PORT`.
    pub fn port_env_var(&self) -> String {
        format!("{}{PORT_ENV_SUFFIX}", self.env_prefix())
    }

    /// Environment variable consulted for the bearer token, e.g. `TASKMASTER_API_KEY`.
    pub fn token_env_var(&self) -> String {
        format!("{}{TOKEN_ENV_SUFFIX}", self.env_prefix())
    }

    /// Token with empty strings treated as absent.
    pub fn token(&self) -> Option<&str> {
        self.auth_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::service("service name cannot be empty"));
        }

        if self.env_prefix().is_empty() {
            return Err(ConfigError::service(format!(
                "service name '{}' must contain at least one alphanumeric character",
                self.name
            )));
        }

        if self.preferred_port == 0 {
            return Err(ConfigError::service(format!(
                "service '{}': preferred_port must be 1-65535",
                self.name
            )));
        }

        if self.command.trim().is_empty() {
            return Err(ConfigError::service(format!(
                "service '{}': command cannot be empty",
                self.name
            )));
        }

        if !self.health_path.starts_with('/') {
            return Err(ConfigError::service(format!(
                "service '{}': health_path must start with '/', got '{}'",
                self.name, self.health_path
            )));
        }

        Ok(())
    }
}
