use crate::{AppState, BearerAuth};

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// GET /api/status - service description, bearer-gated when auth is required
pub async fn status(State(state): State<AppState>, auth: BearerAuth) -> Response {
    let config = &state.config;

    let body = json!({
        "service": config.service_name,
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "port": config.port,
        "auth": {
            "required": config.require_auth,
            "authenticated": auth.authenticated,
        },
        "uptime_secs": state.uptime_secs(),
        "started_at": state.started_at.to_rfc3339(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (StatusCode::OK, Json(body)).into_response()
}
