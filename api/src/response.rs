//! Query and health responses.

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use shared::frame::Frame;
use std::collections::BTreeMap;

/// Result of one panel query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataResponse {
    /// HTTP-style status of the query.
    pub status: u16,
    /// Decoded frames; empty on error.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<Frame>,
    /// Error message, if the query failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DataResponse {
    /// Creates a successful response holding one frame.
    #[must_use]
    pub fn ok(frame: Frame) -> Self {
        Self {
            status: 200,
            frames: vec![frame],
            error: None,
        }
    }

    /// Creates a failed response.
    #[must_use]
    pub fn from_error(error: &QueryError) -> Self {
        Self {
            status: error.status().as_u16(),
            frames: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    /// Returns `true` if the query succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl From<Result<Frame, QueryError>> for DataResponse {
    fn from(result: Result<Frame, QueryError>) -> Self {
        match result {
            Ok(frame) => Self::ok(frame),
            Err(e) => Self::from_error(&e),
        }
    }
}

/// Results of a query batch keyed by `refId`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDataResponse {
    /// One entry per query in the batch.
    pub results: BTreeMap<String, DataResponse>,
}

/// Outcome of a datasource health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// The backend answered the health check.
    Ok,
    /// The health check failed.
    Error,
}

/// Result of [`Datasource::check_health`](crate::Datasource::check_health).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckHealthResult {
    /// Overall status.
    pub status: HealthStatus,
    /// Human-readable detail.
    pub message: String,
}

impl CheckHealthResult {
    /// Creates a healthy result.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Ok,
            message: message.into(),
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            message: message.into(),
        }
    }
}
