use crate::AppState;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// GET /health and /api/health - never auth-gated
pub async fn health_check(State(state): State<AppState>) -> Response {
    let health = json!({
        "status": "ok",
        "service": state.config.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (StatusCode::OK, Json(health)).into_response()
}

/// GET /live - is the process alive?
pub async fn liveness_check() -> Response {
    (StatusCode::OK, "OK").into_response()
}

/// GET /ready - ready to accept traffic?
pub async fn readiness_check() -> Response {
    // The listener is bound before the router serves, so answering means ready
    (StatusCode::OK, "Ready").into_response()
}
