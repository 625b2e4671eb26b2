//! Bearer-token extractor for protected endpoints

use crate::{ApiError, AppState};

use std::future::Future;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

const BEARER_PREFIX: &str = "Bearer ";

/// Proof that the request passed the service's bearer-token check.
///
/// Services without `require_auth` accept every request. Services that
/// require auth but have no configured token reject every request.
#[derive(Debug, Clone, Copy)]
pub struct BearerAuth {
    pub authenticated: bool,
}

impl FromRequestParts<AppState> for BearerAuth {
    type Rejection = ApiError;

    #[allow(clippy::manual_async_fn)]
    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            if !state.config.require_auth {
                return Ok(BearerAuth {
                    authenticated: false,
                });
            }

            let Some(expected) = state.config.auth_token.as_deref() else {
                return Err(ApiError::unauthorized(
                    "authentication required but no token is configured",
                ));
            };

            let header = parts
                .headers
                .get(AUTHORIZATION)
                .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;

            let value = header
                .to_str()
                .map_err(|_| ApiError::unauthorized("malformed Authorization header"))?;

            let token = value
                .strip_prefix(BEARER_PREFIX)
                .ok_or_else(|| ApiError::unauthorized("expected a Bearer token"))?;

            if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
                return Err(ApiError::unauthorized("invalid token"));
            }

            log::debug!("Authenticated request for {}", parts.uri.path());
            Ok(BearerAuth {
                authenticated: true,
            })
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
