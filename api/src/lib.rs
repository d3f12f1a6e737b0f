//! Logbridge API Server
//!
//! This crate hosts the Logbridge log datasource behind an HTTP API. A
//! dashboard posts a batch of panel queries; each query is turned into a
//! request to the log backend, the streamed answer is decoded into a frame,
//! and all results come back keyed by `refId`.
//!
//! # Architecture
//!
//! The API server is built on Axum and Tokio, providing:
//! - A [`Datasource`] with an explicit `new`/`dispose` lifecycle
//! - A pluggable [`Transport`] to the backend, with `reqwest` by default
//! - Concurrent per-query execution through [`dispatch`]
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
mod datasource;
mod dispatcher;
mod error;
mod response;
mod routes;
mod state;
mod transport;

pub use config::{Config, DEFAULT_DATASOURCE_URL};
pub use datasource::{Datasource, DatasourceError, HEALTH_PATH};
pub use dispatcher::dispatch;
pub use error::QueryError;
pub use response::{CheckHealthResult, DataResponse, HealthStatus, QueryDataResponse};
pub use routes::ErrorResponse;
pub use state::AppState;
pub use transport::{is_trivial_error, HttpTransport, Transport, TransportError, TransportResponse};

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Runs the Logbridge API server.
///
/// This function initializes the server with configuration from environment variables
/// and starts listening for incoming connections. It handles graceful shutdown on
/// SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The datasource settings are invalid
/// - The server fails to bind to the configured address
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the Logbridge API server with the provided configuration.
///
/// The datasource is disposed once the server has shut down.
///
/// # Errors
///
/// Returns an error if:
/// - The datasource settings are invalid
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        datasource = %config.datasource.url,
        "Logbridge API server starting"
    );

    let datasource = Arc::new(Datasource::new(config.datasource)?);
    let app = create_router(AppState::new(Arc::clone(&datasource)));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    datasource.dispose();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::query_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
