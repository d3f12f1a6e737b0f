//! Integration tests for the liveness and datasource health endpoints.
//!
//! Tests cover:
//! - Liveness of the server itself
//! - Backend health check against a live and an unreachable backend
//! - Liveness after the datasource is disposed

use axum::http::StatusCode;
use shared::config::DatasourceSettings;

use super::common::{get_json, test_app, FakeBackend};

#[tokio::test]
async fn test_health_check() {
    let (app, _state) = test_app(DatasourceSettings::new("http://127.0.0.1:9"));

    let (status, response) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["service"], "logbridge-api");
}

#[tokio::test]
async fn test_datasource_health_ok() {
    let backend = FakeBackend::start().await;
    let (app, _state) = test_app(DatasourceSettings::new(&backend.url));

    let (status, response) = get_json(app, "/api/v1/datasource/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "OK");
    assert_eq!(response["message"], "Data source is working");
}

#[tokio::test]
async fn test_datasource_health_wrong_path() {
    let backend = FakeBackend::start().await;
    let (app, _state) = test_app(DatasourceSettings::new(format!("{}/missing", backend.url)));

    let (status, response) = get_json(app, "/api/v1/datasource/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response["status"], "ERROR");
    assert_eq!(response["message"], "got response code 404");
}

#[tokio::test]
async fn test_datasource_health_unreachable() {
    let (app, _state) = test_app(DatasourceSettings::new("http://127.0.0.1:9"));

    let (status, response) = get_json(app, "/api/v1/datasource/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response["message"], "request error");
}

#[tokio::test]
async fn test_health_after_dispose() {
    let (app, state) = test_app(DatasourceSettings::new("http://127.0.0.1:9"));
    state.datasource().dispose();

    let (status, response) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response["status"], "disposed");
}
