//! HTTP transport to the log backend.
//!
//! The datasource only needs one request/response exchange per query. The
//! [`Transport`] trait is the seam tests use to stand in for the backend.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, Method};
use std::error::Error as StdError;
use std::io::ErrorKind;
use thiserror::Error;
use url::Url;

/// Errors that can occur while talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The configured HTTP method is not a valid method token.
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// The request failed before a response arrived.
    #[error("{0}")]
    Request(String),

    /// Reading the response body failed.
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Response of a single backend request.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// The response body, consumed as it arrives.
    pub body: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Sends requests to the log backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one request and returns the status and body stream.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if no response could be obtained.
    async fn send(&self, method: &str, url: Url) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a `reqwest` client.
///
/// A request that fails with a trivial disconnect is sent once more before
/// the error is reported.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with a fresh connection pool.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Client` if the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("logbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Creates a transport from an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, method: &str, url: Url) -> Result<TransportResponse, TransportError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(method.to_string()))?;

        let response = match self.client.request(method.clone(), url.clone()).send().await {
            Ok(response) => response,
            Err(e) if is_trivial_error(&e) => {
                tracing::warn!(error = %e, %url, "Backend closed the connection, retrying once");
                self.client
                    .request(method, url)
                    .send()
                    .await
                    .map_err(|e| TransportError::Request(e.to_string()))?
            }
            Err(e) => return Err(TransportError::Request(e.to_string())),
        };

        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Body(e.to_string())))
            .boxed();

        Ok(TransportResponse { status, body })
    }
}

/// Returns `true` if `err` is a disconnect worth one more attempt.
///
/// Walks the source chain looking for an unexpected end of stream, a
/// broken pipe or a connection reset by the peer.
#[must_use]
pub fn is_trivial_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe | ErrorKind::ConnectionReset
            ) {
                return true;
            }
        }
        let message = e.to_string();
        if message.contains("broken pipe") || message.contains("reset by peer") {
            return true;
        }
        current = e.source();
    }
    false
}
