//! Columnar log frames.
//!
//! A frame holds one time column and one message column with an entry per
//! decoded log record, plus one column per label.
//!
//! # Example
//!
//! ```
//! use shared::frame::StreamDecoder;
//! use shared::query::LogsqlSelectorParser;
//!
//! let body = br#"
//! {"_time": "2024-05-01T12:00:00Z", "_msg": "started", "_stream": "{app=\"api\"}"}
//! {"_time": "2024-05-01T12:00:01Z", "_msg": "ready", "host": "h1"}
//! "#;
//!
//! let frame = StreamDecoder::new(&LogsqlSelectorParser, 3)
//!     .decode_slice(body)
//!     .unwrap();
//!
//! assert_eq!(frame.len(), 2);
//! assert_eq!(frame.message, vec!["started", "ready"]);
//! assert_eq!(frame.labels["app"], vec!["api"; 3]);
//! ```

mod decoder;

pub use decoder::{
    DecodeError, FieldRole, LogRecord, StreamDecoder, MESSAGE_FIELD, STREAM_FIELD, TIME_FIELD,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, TryReserveError};

/// A decoded log frame.
///
/// `time` and `message` always have the same length. Each label column is
/// filled with the label's final value, repeated for the row count the
/// frame was built with, which need not match the number of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Event time of each record, in stream order.
    pub time: Vec<DateTime<Utc>>,
    /// Message of each record, in stream order.
    pub message: Vec<String>,
    /// Label columns keyed by label name.
    pub labels: BTreeMap<String, Vec<String>>,
}

impl Frame {
    /// Returns the number of decoded records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Returns `true` if no records were decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Builds a frame from its row columns and a label set.
    ///
    /// Every label is broadcast to `label_rows` entries.
    ///
    /// # Errors
    ///
    /// Returns a `TryReserveError` if a label column of `label_rows` entries
    /// cannot be allocated.
    pub fn from_columns(
        time: Vec<DateTime<Utc>>,
        message: Vec<String>,
        labels: BTreeMap<String, String>,
        label_rows: usize,
    ) -> Result<Self, TryReserveError> {
        debug_assert_eq!(time.len(), message.len());
        let mut columns = BTreeMap::new();
        for (name, value) in labels {
            let mut column = Vec::new();
            column.try_reserve_exact(label_rows)?;
            column.resize(label_rows, value);
            columns.insert(name, column);
        }
        Ok(Self {
            time,
            message,
            labels: columns,
        })
    }
}
