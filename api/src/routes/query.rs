//! Datasource query endpoints.
//!
//! - `POST /api/v1/query` runs a batch of panel queries
//! - `GET /api/v1/datasource/health` checks the log backend

use crate::response::{CheckHealthResult, HealthStatus, QueryDataResponse};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::query::QueryBatch;

/// Error response for batch-level failures.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type.
    pub error: String,
    /// Detailed error message.
    pub message: String,
}

/// Creates the query routes with application state.
pub fn query_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/query", post(query_data))
        .route("/api/v1/datasource/health", get(datasource_health))
        .with_state(state)
}

/// Runs a query batch.
///
/// Individual query failures are reported inside the response map; the
/// request itself only fails if the datasource is gone. If the client
/// disconnects, the queries still running are cancelled.
async fn query_data(
    State(state): State<AppState>,
    Json(batch): Json<QueryBatch>,
) -> Result<Json<QueryDataResponse>, (StatusCode, Json<ErrorResponse>)> {
    let datasource = state.datasource();
    if datasource.is_disposed() {
        tracing::debug!("Rejecting query batch, datasource disposed");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "datasource_disposed".to_string(),
                message: "The datasource has been shut down".to_string(),
            }),
        ));
    }

    let token = datasource.cancellation_token();
    let _guard = token.clone().drop_guard();
    let response = datasource.query_data(batch, &token).await;

    tracing::debug!(results = response.results.len(), "Query batch answered");
    Ok(Json(response))
}

/// Runs the datasource health check.
async fn datasource_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<CheckHealthResult>) {
    let result = state.datasource().check_health().await;
    let status = match result.status {
        HealthStatus::Ok => StatusCode::OK,
        HealthStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(result))
}
