//! Per-query error type.
//!
//! Every failure of a single panel query is folded into [`QueryError`] and
//! reported under that query's `refId`; it never fails the whole batch.

use crate::transport::TransportError;
use axum::http::StatusCode;
use shared::frame::DecodeError;
use shared::query::{QueryBuildError, TimeRangeError};
use shared::validator::ValidationErrors;
use thiserror::Error;

/// Errors that can occur while running one panel query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The query's JSON does not describe a query.
    #[error("failed to parse query json: {0}")]
    Parse(#[from] serde_json::Error),

    /// The query failed validation.
    #[error("invalid query: {0}")]
    Invalid(#[from] ValidationErrors),

    /// The query's time range could not be parsed.
    #[error("failed to parse time range: {0}")]
    TimeRange(#[from] TimeRangeError),

    /// The backend request could not be built.
    #[error("failed to create request URL: {0}")]
    Build(#[from] QueryBuildError),

    /// The request did not complete.
    #[error("failed to make http request: {0}")]
    Transport(#[from] TransportError),

    /// The backend answered with a non-success status.
    #[error("got unexpected response status code: {0}")]
    UpstreamStatus(u16),

    /// The response stream could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] DecodeError),

    /// The query was cancelled before it finished.
    #[error("query cancelled")]
    Cancelled,

    /// The query task stopped unexpectedly.
    #[error("query task failed: {0}")]
    Internal(String),
}

impl QueryError {
    /// Returns the HTTP status reported for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Parse(_)
            | Self::Invalid(_)
            | Self::TimeRange(_)
            | Self::Build(_)
            | Self::Transport(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamStatus(code) => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Decode(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cancelled => StatusCode::REQUEST_TIMEOUT,
        }
    }
}
