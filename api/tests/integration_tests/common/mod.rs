//! Common test utilities and helpers for integration tests.
//!
//! This module provides a fake log backend plus the app setup and HTTP
//! request helpers used across all integration tests.

use api::{create_router, AppState, Datasource};
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use shared::config::DatasourceSettings;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Log lines served for any query the backend does not treat specially.
pub const LOG_LINES: [&str; 3] = [
    r#"{"_time":"2024-05-01T12:00:00Z","_msg":"service started","_stream":"{app=\"api\",env=\"prod\"}"}"#,
    r#"{"_time":"2024-05-01T12:00:05.250Z","_msg":"listening","port":"8080"}"#,
    r#"{"_time":"1714564810","_msg":"ready","_stream":"{app=\"api\",env=\"prod\"}"}"#,
];

/// A request seen by the fake backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: Method,
    /// Query string pairs in order.
    pub params: Vec<(String, String)>,
}

impl RecordedRequest {
    /// Returns every value of `key`.
    pub fn values(&self, key: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// A log backend listening on a local port.
///
/// The `query` parameter picks the answer:
/// - `fail` answers 500
/// - `broken` streams a truncated record
/// - `slow` waits a minute before answering
/// - anything else streams [`LOG_LINES`], split across chunks
pub struct FakeBackend {
    /// Base URL of the backend.
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeBackend {
    /// Starts the backend in the background.
    pub async fn start() -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new()
            .route("/health", get(|| async { StatusCode::OK }))
            .route("/select/logsql/query", any(serve_query))
            .with_state(Arc::clone(&requests));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            requests,
        }
    }

    /// Returns the query requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve_query(
    State(requests): State<Arc<Mutex<Vec<RecordedRequest>>>>,
    method: Method,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let expr = params
        .iter()
        .find(|(k, _)| k == "query")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    requests
        .lock()
        .unwrap()
        .push(RecordedRequest { method, params });

    match expr.as_str() {
        "fail" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        "broken" => format!("{}\n{{\"_msg\":\"cut", LOG_LINES[0]).into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(60)).await;
            StatusCode::OK.into_response()
        }
        _ => {
            let body = LOG_LINES.join("\n");
            let (head, tail) = body.split_at(body.len() / 2);
            let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
                Ok(Bytes::copy_from_slice(head.as_bytes())),
                Ok(Bytes::copy_from_slice(tail.as_bytes())),
            ];
            Body::from_stream(futures::stream::iter(chunks)).into_response()
        }
    }
}

/// Creates a test router around a datasource built from `settings`.
///
/// # Returns
///
/// A tuple containing the configured router and the app state.
pub fn test_app(settings: DatasourceSettings) -> (Router, AppState) {
    let datasource = Datasource::new(settings).unwrap();
    let state = AppState::new(Arc::new(datasource));
    let router = create_router(state.clone());
    (router, state)
}

/// Helper to make a POST request with JSON body.
///
/// # Returns
///
/// A tuple containing the response status code and parsed JSON response body.
pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap();
    send(app, request).await
}

/// Helper to make a GET request.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}
