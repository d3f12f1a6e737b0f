//! Integration tests for panel query batches.
//!
//! Tests cover:
//! - Decoding a streamed backend answer into a frame
//! - Request parameters sent to the backend
//! - Per-query failure isolation, including malformed query JSON
//! - Cancellation through datasource disposal

use api::{create_router, AppState, Datasource, HttpTransport};
use axum::http::{Method, StatusCode};
use serde_json::json;
use shared::config::DatasourceSettings;
use std::sync::Arc;
use std::time::Duration;

use super::common::{post_json, test_app, FakeBackend};

#[tokio::test]
async fn test_query_returns_frame() {
    let backend = FakeBackend::start().await;
    let (app, _state) = test_app(DatasourceSettings::new(&backend.url));

    let batch = json!({
        "from": "now-1h",
        "to": "now",
        "queries": [{"refId": "A", "expr": "*", "maxLines": 5}]
    });
    let (status, response) = post_json(app, "/api/v1/query", batch).await;

    assert_eq!(status, StatusCode::OK);
    let result = &response["results"]["A"];
    assert_eq!(result["status"], 200);

    let frame = &result["frames"][0];
    assert_eq!(frame["message"], json!(["service started", "listening", "ready"]));
    assert_eq!(
        frame["time"],
        json!([
            "2024-05-01T12:00:00Z",
            "2024-05-01T12:00:05.250Z",
            "2024-05-01T12:00:10Z"
        ])
    );
    assert_eq!(frame["labels"]["app"], json!(vec!["api"; 5]));
    assert_eq!(frame["labels"]["port"], json!(vec!["8080"; 5]));
}

#[tokio::test]
async fn test_query_request_parameters() {
    let backend = FakeBackend::start().await;
    let settings = DatasourceSettings::new(&backend.url)
        .with_custom_query_params("limit=7&extra_filters=app:api");
    let (app, _state) = test_app(settings);

    let batch = json!({
        "from": "2024-05-01T00:00:00Z",
        "to": "2024-05-03T00:00:00Z",
        "queries": [{
            "refId": "A",
            "expr": "* | stats by (_time:$__interval) count()",
            "maxLines": 20,
            "maxDataPoints": 100
        }]
    });
    let (status, _) = post_json(app, "/api/v1/query", batch).await;
    assert_eq!(status, StatusCode::OK);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.values("query"), vec!["* | stats by (_time:30m) count()"]);
    assert_eq!(request.values("limit"), vec!["20", "7"]);
    assert_eq!(request.values("start"), vec!["2024-05-01T00:00:00.000Z"]);
    assert_eq!(request.values("end"), vec!["2024-05-03T00:00:00.000Z"]);
    assert_eq!(request.values("step"), vec!["30m"]);
    assert_eq!(request.values("extra_filters"), vec!["app:api"]);
}

#[tokio::test]
async fn test_query_uses_configured_method() {
    let backend = FakeBackend::start().await;
    let (app, _state) = test_app(DatasourceSettings::new(&backend.url).with_http_method("GET"));

    let batch = json!({"from": "now-5m", "to": "now", "queries": [{"refId": "A", "expr": "*"}]});
    post_json(app, "/api/v1/query", batch).await;

    assert_eq!(backend.requests()[0].method, Method::GET);
}

#[tokio::test]
async fn test_failures_stay_per_query() {
    let backend = FakeBackend::start().await;
    let (app, _state) = test_app(DatasourceSettings::new(&backend.url));

    let batch = json!({
        "from": "now-1h",
        "to": "now",
        "queries": [
            {"refId": "ok", "expr": "*"},
            {"refId": "upstream", "expr": "fail"},
            {"refId": "truncated", "expr": "broken"},
            {"refId": "bad-interval", "expr": "*", "interval": "a3"},
            {"refId": "bad-range", "expr": "*", "timeRange": {"from": "soon", "to": "now"}}
        ]
    });
    let (status, response) = post_json(app, "/api/v1/query", batch).await;

    assert_eq!(status, StatusCode::OK);
    let results = &response["results"];
    assert_eq!(results.as_object().unwrap().len(), 5);
    assert_eq!(results["ok"]["status"], 200);
    assert_eq!(results["ok"]["frames"][0]["message"].as_array().unwrap().len(), 3);
    assert_eq!(results["upstream"]["status"], 500);
    assert_eq!(results["truncated"]["status"], 500);
    assert_eq!(results["bad-interval"]["status"], 400);
    assert_eq!(results["bad-range"]["status"], 400);
    assert!(results["bad-range"]["error"].is_string());
}

#[tokio::test]
async fn test_malformed_queries_stay_per_query() {
    let backend = FakeBackend::start().await;
    let (app, _state) = test_app(DatasourceSettings::new(&backend.url));

    let batch = json!({
        "from": "now-1h",
        "to": "now",
        "queries": [
            {"refId": "A", "expr": "*"},
            {"refId": "B", "maxLines": "ten"},
            {"refId": "C", "expr": "*", "maxLines": 1_u64 << 50},
            {"expr": "*"}
        ]
    });
    let (status, response) = post_json(app, "/api/v1/query", batch).await;

    assert_eq!(status, StatusCode::OK);
    let results = &response["results"];
    assert_eq!(results.as_object().unwrap().len(), 4);
    assert_eq!(results["A"]["status"], 200);
    assert_eq!(results["B"]["status"], 400);
    assert_eq!(results["C"]["status"], 400);
    assert_eq!(results["queries[3]"]["status"], 400);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_query_through_provided_client() {
    let backend = FakeBackend::start().await;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let datasource = Datasource::with_transport(
        DatasourceSettings::new(&backend.url),
        Arc::new(HttpTransport::with_client(client)),
    );
    let app = create_router(AppState::new(Arc::new(datasource)));

    let batch = json!({"from": "now-1h", "to": "now", "queries": [{"refId": "A", "expr": "*"}]});
    let (status, response) = post_json(app, "/api/v1/query", batch).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["results"]["A"]["status"], 200);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_unreachable_backend() {
    let (app, _state) = test_app(DatasourceSettings::new("http://127.0.0.1:9"));

    let batch = json!({"from": "now-1h", "to": "now", "queries": [{"refId": "A"}]});
    let (status, response) = post_json(app, "/api/v1/query", batch).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["results"]["A"]["status"], 400);
}

#[tokio::test]
async fn test_dispose_cancels_running_batch() {
    let backend = FakeBackend::start().await;
    let (app, state) = test_app(DatasourceSettings::new(&backend.url));

    let batch = json!({
        "from": "now-1h",
        "to": "now",
        "queries": [{"refId": "slow", "expr": "slow"}, {"refId": "fast", "expr": "*"}]
    });
    let running = tokio::spawn(post_json(app, "/api/v1/query", batch));

    tokio::time::sleep(Duration::from_millis(200)).await;
    state.datasource().dispose();

    let (status, response) = tokio::time::timeout(Duration::from_secs(10), running)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["results"]["slow"]["status"], 408);
    assert_eq!(response["results"]["fast"]["status"], 200);
}
