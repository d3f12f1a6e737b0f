//! Log stream decoding.
//!
//! The backend answers a log query with a sequence of JSON objects, one per
//! record, without an enclosing array. Each field of a record is classified
//! by name: the message, the event time, the stream selector, or a plain
//! label. Labels found in stream selectors and plain label fields are merged
//! into one label set for the whole stream, last write wins.

use super::Frame;
use crate::query::{SelectorError, SelectorParser};
use crate::time::{instant_from_seconds, TimestampError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::io::Read;
use std::ops::Range;
use thiserror::Error;

/// Field holding the log message.
pub const MESSAGE_FIELD: &str = "_msg";
/// Field holding the event time.
pub const TIME_FIELD: &str = "_time";
/// Field holding the stream selector.
pub const STREAM_FIELD: &str = "_stream";

/// A single decoded log record.
pub type LogRecord = BTreeMap<String, String>;

/// Errors that abort decoding of a whole stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A record is not a JSON object of string values.
    #[error("cannot decode log record: {0}")]
    Json(#[from] serde_json::Error),

    /// A record's time field is not a valid timestamp.
    #[error("cannot parse _time value: {0}")]
    Timestamp(#[from] TimestampError),

    /// A record's stream selector is malformed.
    #[error("cannot parse _stream value: {0}")]
    Selector(#[from] SelectorError),

    /// Reading the underlying stream failed.
    #[error("cannot read log stream: {0}")]
    Read(String),

    /// The stream ended in the middle of a record.
    #[error("log stream ended with an incomplete record")]
    Truncated,

    /// The label columns cannot be allocated at the requested length.
    #[error("cannot allocate {rows} label rows")]
    LabelRows {
        /// Requested rows per label column.
        rows: usize,
    },
}

/// The role a record field plays, decided by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole<'a> {
    /// The log message.
    Message,
    /// The event time.
    Time,
    /// A stream selector carrying labels.
    Stream,
    /// Any other field, kept as a label of the same name.
    Label(&'a str),
}

impl<'a> FieldRole<'a> {
    /// Classifies a field by name.
    #[must_use]
    pub fn classify(name: &'a str) -> Self {
        match name {
            MESSAGE_FIELD => Self::Message,
            TIME_FIELD => Self::Time,
            STREAM_FIELD => Self::Stream,
            other => Self::Label(other),
        }
    }
}

/// Accumulates log records into a [`Frame`].
///
/// Records missing a message get an empty one; records missing a time get
/// the unix epoch, so the time and message columns stay aligned.
pub struct StreamDecoder<'p> {
    parser: &'p dyn SelectorParser,
    label_rows: usize,
    time: Vec<DateTime<Utc>>,
    message: Vec<String>,
    labels: BTreeMap<String, String>,
}

impl<'p> StreamDecoder<'p> {
    /// Creates a decoder.
    ///
    /// `label_rows` is the length every label column is filled to.
    #[must_use]
    pub fn new(parser: &'p dyn SelectorParser, label_rows: usize) -> Self {
        Self {
            parser,
            label_rows,
            time: Vec::new(),
            message: Vec::new(),
            labels: BTreeMap::new(),
        }
    }

    /// Adds one record.
    ///
    /// # Errors
    ///
    /// Returns a `DecodeError` if the time field or the stream selector
    /// cannot be parsed.
    pub fn push_record(&mut self, record: LogRecord) -> Result<(), DecodeError> {
        let mut time = None;
        let mut message = None;

        for (name, value) in record {
            match FieldRole::classify(&name) {
                FieldRole::Message => message = Some(value),
                FieldRole::Time => time = Some(instant_from_seconds(&value)?),
                FieldRole::Stream => {
                    let selector = self.parser.parse(&value)?;
                    for (label, label_value) in selector.label_pairs() {
                        self.labels
                            .insert(label.to_string(), label_value.to_string());
                    }
                }
                FieldRole::Label(label) => {
                    self.labels.insert(label.to_string(), value);
                }
            }
        }

        self.time.push(time.unwrap_or(DateTime::UNIX_EPOCH));
        self.message.push(message.unwrap_or_default());
        Ok(())
    }

    /// Returns the number of records added so far.
    #[must_use]
    pub fn records(&self) -> usize {
        self.time.len()
    }

    /// Builds the frame from everything added so far.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::LabelRows` if the label columns cannot be
    /// allocated.
    pub fn finish(self) -> Result<Frame, DecodeError> {
        let rows = self.label_rows;
        Frame::from_columns(self.time, self.message, self.labels, rows)
            .map_err(|_| DecodeError::LabelRows { rows })
    }

    /// Decodes a complete in-memory response body.
    ///
    /// # Errors
    ///
    /// Returns a `DecodeError` if any record is malformed. No partial frame
    /// is returned.
    pub fn decode_slice(self, body: &[u8]) -> Result<Frame, DecodeError> {
        self.decode_reader(body)
    }

    /// Decodes records from a blocking reader until it is exhausted.
    ///
    /// # Errors
    ///
    /// Returns a `DecodeError` if reading fails or any record is malformed.
    pub fn decode_reader<R: Read>(mut self, reader: R) -> Result<Frame, DecodeError> {
        let records = serde_json::Deserializer::from_reader(reader).into_iter::<LogRecord>();
        for record in records {
            self.push_record(record?)?;
        }
        self.finish()
    }

    /// Decodes records from an async byte stream until it ends.
    ///
    /// Records may be split across chunks in any way. Dropping the returned
    /// future stops reading.
    ///
    /// # Errors
    ///
    /// Returns a `DecodeError` if reading fails, any record is malformed, or
    /// the stream ends inside a record.
    pub async fn decode_stream<S, E>(mut self, mut stream: S) -> Result<Frame, DecodeError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mut splitter = RecordSplitter::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DecodeError::Read(e.to_string()))?;
            splitter.buf.extend_from_slice(&chunk);
            for span in splitter.scan()? {
                let record: LogRecord = serde_json::from_slice(&splitter.buf[span])?;
                self.push_record(record)?;
            }
            splitter.compact();
        }

        if splitter.in_record() {
            return Err(DecodeError::Truncated);
        }

        tracing::debug!(records = self.records(), "Decoded log stream");
        self.finish()
    }
}

/// Splits a byte stream into top-level JSON objects.
///
/// Scanning state survives between chunks so every byte is looked at once,
/// however a record is split.
#[derive(Debug, Default)]
struct RecordSplitter {
    buf: Vec<u8>,
    scanned: usize,
    start: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl RecordSplitter {
    /// Scans the bytes added since the last call and returns the spans of
    /// the objects completed by them.
    fn scan(&mut self) -> Result<Vec<Range<usize>>, DecodeError> {
        let mut complete = Vec::new();

        while let Some(&byte) = self.buf.get(self.scanned) {
            let at = self.scanned;
            self.scanned += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'"' if self.depth > 0 => self.in_string = true,
                b'{' | b'[' if self.depth > 0 => self.depth += 1,
                b'}' | b']' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        complete.push(self.start..self.scanned);
                    }
                }
                _ if self.depth > 0 => {}
                b'{' => {
                    self.start = at;
                    self.depth = 1;
                }
                b if b.is_ascii_whitespace() => {}
                other => {
                    return Err(DecodeError::Json(serde::de::Error::custom(format!(
                        "expected a JSON object, found {:?}",
                        char::from(other)
                    ))))
                }
            }
        }

        Ok(complete)
    }

    /// Returns `true` while an object is open.
    fn in_record(&self) -> bool {
        self.depth > 0
    }

    /// Drops every byte before the open object, or all scanned bytes when
    /// none is open.
    fn compact(&mut self) {
        let consumed = if self.in_record() {
            self.start
        } else {
            self.scanned
        };
        self.buf.drain(..consumed);
        self.scanned -= consumed;
        self.start = self.start.saturating_sub(consumed);
    }
}
