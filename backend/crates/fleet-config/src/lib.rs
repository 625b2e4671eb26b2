mod config;
mod default_services;
mod error;
mod health_config;
mod log_level;
mod logging_config;
mod service_spec;
mod supervisor_config;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use default_services::default_services;
pub use error::{ConfigError, ConfigErrorResult};
pub use health_config::HealthConfig;
pub use log_level::LogLevel;
pub use logging_config::LoggingConfig;
pub use service_spec::ServiceSpec;
pub use supervisor_config::SupervisorConfig;

// Environment contract between the supervisor and the services it launches.
pub const ENV_SERVICE_NAME: &str = "FLEET_SERVICE_NAME";
pub const ENV_SERVICE_HOST: &str = "FLEET_SERVICE_HOST";
pub const ENV_SERVICE_PORT: &str = "FLEET_SERVICE_PORT";
pub const ENV_REQUIRE_AUTH: &str = "FLEET_REQUIRE_AUTH";
pub const ENV_AUTH_TOKEN: &str = "FLEET_AUTH_TOKEN";
pub const ENV_LOG_LEVEL: &str = "FLEET_LOG_LEVEL";
pub const ENV_LOG_COLORED: &str = "FLEET_LOG_COLORED";
pub const ENV_LOG_FILE: &str = "FLEET_LOG_FILE";
pub const ENV_CONFIG_DIR: &str = "FLEET_CONFIG_DIR";

/// Substituted with the resolved port in service arguments.
pub const PORT_PLACEHOLDER: &str = "{port}";

const CONFIG_DIR_NAME: &str = ".fleet";
const CONFIG_FILENAME: &str = "config.toml";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_HEALTH_PATH: &str = "/api/health";
const DEFAULT_LOG_LEVEL_STRING: &str = "info";
const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;
const DEFAULT_LOG_DIRECTORY: &str = "logs";
