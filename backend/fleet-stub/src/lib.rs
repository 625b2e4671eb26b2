pub mod api_error;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod logger;
pub mod routes;
pub mod state;
pub mod status;

#[cfg(test)]
mod tests;

pub use crate::api_error::ApiError;
pub use crate::auth::BearerAuth;
pub use crate::config::StubConfig;
pub use crate::error::{Result as StubResult, StubError};
pub use crate::routes::build_router;
pub use crate::state::AppState;
