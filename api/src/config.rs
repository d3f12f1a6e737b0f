//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use shared::config::{DatasourceSettings, DEFAULT_HTTP_METHOD};
use std::net::SocketAddr;

/// Default log backend URL.
pub const DEFAULT_DATASOURCE_URL: &str = "http://localhost:9428";

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `LOGBRIDGE_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `LOGBRIDGE_PORT`: The port to listen on (default: 8080)
/// - `LOGBRIDGE_DATASOURCE_URL`: Base URL of the log backend
///   (default: "http://localhost:9428")
/// - `LOGBRIDGE_HTTP_METHOD`: Method for query requests (default: "POST")
/// - `LOGBRIDGE_QUERY_PARAMS`: Extra `key=value&...` query parameters
/// - `LOGBRIDGE_TIME_INTERVAL`: Datasource-level minimum interval, e.g. "30s"
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Settings of the hosted datasource.
    pub datasource: DatasourceSettings,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `LOGBRIDGE_PORT` is set but is not a valid port
    /// number.
    pub fn from_env() -> Result<Self> {
        let host = env_or("LOGBRIDGE_HOST", "0.0.0.0");

        let port = std::env::var("LOGBRIDGE_PORT")
            .ok()
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("LOGBRIDGE_PORT must be a port number")?
            .unwrap_or(8080);

        let datasource = DatasourceSettings::new(env_or(
            "LOGBRIDGE_DATASOURCE_URL",
            DEFAULT_DATASOURCE_URL,
        ))
        .with_http_method(env_or("LOGBRIDGE_HTTP_METHOD", DEFAULT_HTTP_METHOD))
        .with_custom_query_params(env_or("LOGBRIDGE_QUERY_PARAMS", ""))
        .with_time_interval(env_or("LOGBRIDGE_TIME_INTERVAL", ""));

        Ok(Self {
            host,
            port,
            datasource,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            datasource: DatasourceSettings::new(DEFAULT_DATASOURCE_URL),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
