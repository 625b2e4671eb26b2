use std::panic::Location;
use std::path::PathBuf;

use error_location::ErrorLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("No services configured {location}")]
    NoServices { location: ErrorLocation },

    #[error("Port {port} is in use or cannot be bound {location}")]
    PortUnavailable { port: u16, location: ErrorLocation },

    #[error("No available port in range {start}-{end} {location}")]
    NoPortInRange {
        start: u16,
        end: u16,
        location: ErrorLocation,
    },

    #[error("Failed to spawn {}: {source} {location}", command.display())]
    ProcessSpawn {
        command: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Service {name} exited unexpectedly with code {code:?} {location}")]
    UnexpectedExit {
        name: String,
        code: Option<i32>,
        location: ErrorLocation,
    },

    #[error("Health check of {url} timed out after {timeout_ms}ms {location}")]
    HealthCheckTimeout {
        url: String,
        timeout_ms: u64,
        location: ErrorLocation,
    },

    #[error("Health check of {url} could not connect: {message} {location}")]
    HealthCheckUnreachable {
        url: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Config error: {0}")]
    Config(#[from] fleet_config::ConfigError),

    #[error("Logging setup failed: {message} {location}")]
    Logging {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO error: {source} {location}")]
    Io {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("HTTP error: {source} {location}")]
    Http {
        #[source]
        source: reqwest::Error,
        location: ErrorLocation,
    },
}

impl SupervisorError {
    /// Whether this error is recoverable via retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::PortUnavailable { .. }
                | Self::ProcessSpawn { .. }
                | Self::UnexpectedExit { .. }
                | Self::HealthCheckTimeout { .. }
                | Self::HealthCheckUnreachable { .. }
                | Self::Http { .. }
        )
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::NoServices { .. } => {
                "Declare at least one [[services]] entry in config.toml \
                   or delete the file to use the default fleet."
            }
            Self::PortUnavailable { .. } => {
                "Another application is using the preferred port. \
                   The next free port will be used instead."
            }
            Self::NoPortInRange { .. } => {
                "No free port found near the preferred one. \
                   Stop other services or raise supervisor.port_scan_attempts."
            }
            Self::ProcessSpawn { .. } => {
                "The service command could not be started. \
                   Check that it is installed and executable."
            }
            Self::UnexpectedExit { .. } => {
                "The service keeps exiting. \
                   Check its output in the supervisor log."
            }
            Self::HealthCheckTimeout { .. } | Self::HealthCheckUnreachable { .. } => {
                "The service is not answering on its health endpoint. \
                   Check that it binds the port it was given."
            }
            Self::Config(_) => {
                "Configuration file has invalid settings. \
                   Check the logs for details or delete the config file to use defaults."
            }
            _ => "An unexpected error occurred. Please check the logs for details.",
        }
    }

    #[track_caller]
    pub fn no_services() -> Self {
        Self::NoServices {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn logging<S: Into<String>>(message: S) -> Self {
        Self::Logging {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for SupervisorError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for SupervisorError {
    #[track_caller]
    fn from(source: reqwest::Error) -> Self {
        Self::Http {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
