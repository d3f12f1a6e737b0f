//! Liveness endpoint of the API server itself.
//!
//! This does not contact the log backend; see `/api/v1/datasource/health`
//! for that.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"healthy"`, or `"disposed"` once the datasource has shut down.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Creates the liveness routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = if state.datasource().is_disposed() {
        (StatusCode::SERVICE_UNAVAILABLE, "disposed")
    } else {
        (StatusCode::OK, "healthy")
    };

    (
        code,
        Json(HealthResponse {
            status,
            service: "logbridge-api",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
