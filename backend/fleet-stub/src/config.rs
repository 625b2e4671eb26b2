use crate::error::{Result as StubResult, StubError};

use fleet_config::{
    ENV_AUTH_TOKEN, ENV_LOG_COLORED, ENV_LOG_FILE, ENV_LOG_LEVEL, ENV_REQUIRE_AUTH,
    ENV_SERVICE_HOST, ENV_SERVICE_NAME, ENV_SERVICE_PORT, LogLevel,
};

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_SERVICE_NAME: &str = "fleet-stub";
const DEFAULT_HOST: &str = "127.0.0.1";
const LOCALHOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;

/// Runtime settings of a single stub service.
///
/// Read from the environment the supervisor prepares for each child, so a
/// stub can also be started by hand with the same variables.
#[derive(Debug, Clone)]
pub struct StubConfig {
    pub service_name: String,
    pub host: IpAddr,
    pub port: u16,
    pub require_auth: bool,
    /// Expected bearer token; `None` with `require_auth` rejects every status request
    pub auth_token: Option<String>,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    pub colored: bool,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            service_name: String::from(DEFAULT_SERVICE_NAME),
            host: IpAddr::from([127, 0, 0, 1]),
            port: DEFAULT_PORT,
            require_auth: false,
            auth_token: None,
            log_level: LogLevel(log::LevelFilter::Info),
            log_file: None,
            colored: true,
        }
    }
}

impl StubConfig {
    /// Build the configuration from `FLEET_*` environment variables.
    pub fn from_env() -> StubResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> StubResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let service_name = lookup(ENV_SERVICE_NAME)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(defaults.service_name);

        let host_value = lookup(ENV_SERVICE_HOST).unwrap_or_else(|| String::from(DEFAULT_HOST));
        let host = parse_host(&host_value)?;

        let port = match lookup(ENV_SERVICE_PORT) {
            Some(value) => {
                let port = value
                    .parse::<u16>()
                    .map_err(|e| StubError::env_var(ENV_SERVICE_PORT, &value, e.to_string()))?;
                if port == 0 {
                    return Err(StubError::env_var(
                        ENV_SERVICE_PORT,
                        &value,
                        "port must be 1-65535",
                    ));
                }
                port
            }
            None => defaults.port,
        };

        let require_auth = lookup(ENV_REQUIRE_AUTH)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults.require_auth);

        let auth_token = lookup(ENV_AUTH_TOKEN).filter(|t| !t.is_empty());

        let log_level = lookup(ENV_LOG_LEVEL)
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.log_level);

        let colored = lookup(ENV_LOG_COLORED)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults.colored);

        let log_file = lookup(ENV_LOG_FILE)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            service_name,
            host,
            port,
            require_auth,
            auth_token,
            log_level,
            log_file,
            colored,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Auth mode for logs and the status body; never includes the token.
    pub fn auth_mode(&self) -> &'static str {
        match (self.require_auth, self.auth_token.is_some()) {
            (false, _) => "none",
            (true, true) => "bearer",
            (true, false) => "bearer (no token configured, all requests rejected)",
        }
    }
}

/// IP literal, or `localhost` as the IPv4 loopback address.
fn parse_host(value: &str) -> StubResult<IpAddr> {
    if value.eq_ignore_ascii_case(LOCALHOST) {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    value
        .parse::<IpAddr>()
        .map_err(|e| StubError::env_var(ENV_SERVICE_HOST, value, e.to_string()))
}
