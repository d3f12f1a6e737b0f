//! Panel query model.
//!
//! Defines the queries a dashboard sends and the time range they cover.

use crate::step::DEFAULT_MAX_DATA_POINTS;
use crate::time::{parse_instant, TimestampError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Number of log lines requested when a query does not say.
pub const DEFAULT_MAX_LINES: u64 = 1000;

/// Largest `maxLines` a query may ask for. Every label column of a frame is
/// this long, so the bound also caps the frame's size.
pub const MAX_LINES_LIMIT: u64 = 100_000;

fn default_max_lines() -> u64 {
    DEFAULT_MAX_LINES
}

fn default_max_data_points() -> u64 {
    DEFAULT_MAX_DATA_POINTS
}

/// A single panel query.
///
/// # Example
///
/// ```
/// use shared::query::DataQuery;
///
/// let query: DataQuery = serde_json::from_str(r#"{"refId": "A", "expr": "error"}"#).unwrap();
/// assert_eq!(query.ref_id, "A");
/// assert_eq!(query.max_lines, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    /// Identifier of the query within its batch.
    #[validate(length(min = 1, message = "refId cannot be empty"))]
    pub ref_id: String,

    /// The query expression.
    #[serde(default)]
    pub expr: String,

    /// Maximum number of log lines to return.
    #[serde(default = "default_max_lines")]
    #[validate(range(
        min = 1,
        max = MAX_LINES_LIMIT,
        message = "maxLines must be between 1 and 100000"
    ))]
    pub max_lines: u64,

    /// Query-level interval hint, e.g. `"30s"`.
    #[serde(default)]
    pub interval: String,

    /// Dashboard-computed interval in milliseconds.
    #[serde(default)]
    pub interval_ms: u64,

    /// Points budget of the rendering panel.
    #[serde(default = "default_max_data_points")]
    pub max_data_points: u64,

    /// Optional time range overriding the batch range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<RawTimeRange>,
}

impl DataQuery {
    /// Creates a query with default limits.
    #[must_use]
    pub fn new(ref_id: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            expr: expr.into(),
            max_lines: DEFAULT_MAX_LINES,
            interval: String::new(),
            interval_ms: 0,
            max_data_points: DEFAULT_MAX_DATA_POINTS,
            time_range: None,
        }
    }

    /// Sets the maximum number of log lines.
    #[must_use]
    pub fn with_max_lines(mut self, max_lines: u64) -> Self {
        self.max_lines = max_lines;
        self
    }

    /// Sets the query-level interval hint.
    #[must_use]
    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    /// Sets the dashboard-computed interval.
    #[must_use]
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Sets the points budget.
    #[must_use]
    pub fn with_max_data_points(mut self, max_data_points: u64) -> Self {
        self.max_data_points = max_data_points;
        self
    }

    /// Sets a time range for this query only.
    #[must_use]
    pub fn with_time_range(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.time_range = Some(RawTimeRange::new(from, to));
        self
    }
}

/// A time range as sent by the dashboard, before parsing.
///
/// Both bounds accept any format understood by [`parse_instant`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTimeRange {
    /// Start of the range.
    pub from: String,
    /// End of the range.
    pub to: String,
}

impl RawTimeRange {
    /// Creates a new raw time range.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Parses both bounds against the same reference time.
    ///
    /// # Errors
    ///
    /// See [`TimeRange::parse`].
    pub fn parse(&self, now: DateTime<Utc>) -> Result<TimeRange, TimeRangeError> {
        TimeRange::parse(&self.from, &self.to, now)
    }
}

impl Default for RawTimeRange {
    fn default() -> Self {
        Self::new("now-1h", "now")
    }
}

/// Errors that can occur when building a time range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeRangeError {
    /// One of the bounds could not be parsed.
    #[error("invalid time range bound: {0}")]
    Timestamp(#[from] TimestampError),

    /// The start lies after the end.
    #[error("time range start {from} is after end {to}")]
    Inverted {
        /// Start of the range.
        from: DateTime<Utc>,
        /// End of the range.
        to: DateTime<Utc>,
    },
}

/// A parsed, ordered time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the range.
    pub from: DateTime<Utc>,
    /// End of the range.
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a time range from two instants.
    ///
    /// # Errors
    ///
    /// Returns `TimeRangeError::Inverted` if `from` is after `to`.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, TimeRangeError> {
        if from > to {
            return Err(TimeRangeError::Inverted { from, to });
        }
        Ok(Self { from, to })
    }

    /// Parses a time range relative to `now`.
    ///
    /// # Errors
    ///
    /// Returns a `TimeRangeError` if a bound is malformed or the range is
    /// inverted.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use shared::query::TimeRange;
    ///
    /// let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    /// let range = TimeRange::parse("now-1h", "now", now).unwrap();
    /// assert_eq!(range.to, now);
    /// assert_eq!((range.to - range.from).num_minutes(), 60);
    /// ```
    pub fn parse(from: &str, to: &str, now: DateTime<Utc>) -> Result<Self, TimeRangeError> {
        Self::new(parse_instant(from, now)?, parse_instant(to, now)?)
    }
}

/// One entry of a batch's `queries` array.
///
/// Entries that do not deserialize as a [`DataQuery`] are kept as raw JSON,
/// so a malformed query fails on its own instead of failing the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryEntry {
    /// A well-formed query.
    Query(DataQuery),
    /// Anything else found in the array.
    Malformed(serde_json::Value),
}

impl QueryEntry {
    /// Returns the entry's `refId`, if it has a string one.
    #[must_use]
    pub fn ref_id(&self) -> Option<&str> {
        match self {
            Self::Query(query) => Some(&query.ref_id),
            Self::Malformed(value) => value.get("refId").and_then(serde_json::Value::as_str),
        }
    }

    /// Returns the key the entry's result is reported under.
    ///
    /// This is the `refId`, or `queries[<index>]` for entries without one.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared::query::QueryEntry;
    ///
    /// let entry: QueryEntry = serde_json::from_str(r#"{"expr": 5}"#).unwrap();
    /// assert_eq!(entry.response_key(2), "queries[2]");
    /// ```
    #[must_use]
    pub fn response_key(&self, index: usize) -> String {
        self.ref_id()
            .map_or_else(|| format!("queries[{index}]"), str::to_string)
    }

    /// Turns the entry into a query.
    ///
    /// # Errors
    ///
    /// Returns the JSON error that kept a malformed entry from parsing.
    pub fn into_query(self) -> Result<DataQuery, serde_json::Error> {
        match self {
            Self::Query(query) => Ok(query),
            Self::Malformed(value) => serde_json::from_value(value),
        }
    }
}

impl From<DataQuery> for QueryEntry {
    fn from(query: DataQuery) -> Self {
        Self::Query(query)
    }
}

/// A batch of panel queries sharing one default time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBatch {
    /// Default time range for queries without their own.
    #[serde(flatten)]
    pub range: RawTimeRange,
    /// The queries to run.
    pub queries: Vec<QueryEntry>,
}

impl QueryBatch {
    /// Creates a batch over the given range.
    #[must_use]
    pub fn new(range: RawTimeRange, queries: Vec<DataQuery>) -> Self {
        Self {
            range,
            queries: queries.into_iter().map(QueryEntry::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_query_defaults_from_json() {
        let query: DataQuery = serde_json::from_str(r#"{"refId": "A"}"#).unwrap();
        assert_eq!(query.expr, "");
        assert_eq!(query.max_lines, DEFAULT_MAX_LINES);
        assert_eq!(query.max_data_points, DEFAULT_MAX_DATA_POINTS);
        assert_eq!(query.interval_ms, 0);
        assert!(query.time_range.is_none());
    }

    #[test]
    fn test_query_camel_case_fields() {
        let query: DataQuery = serde_json::from_str(
            r#"{
                "refId": "B",
                "expr": "_stream:{app=\"api\"}",
                "maxLines": 20,
                "interval": "30s",
                "intervalMs": 15000,
                "maxDataPoints": 300,
                "timeRange": {"from": "now-5m", "to": "now"}
            }"#,
        )
        .unwrap();

        assert_eq!(query.ref_id, "B");
        assert_eq!(query.max_lines, 20);
        assert_eq!(query.interval, "30s");
        assert_eq!(query.interval_ms, 15_000);
        assert_eq!(query.max_data_points, 300);
        assert_eq!(query.time_range, Some(RawTimeRange::new("now-5m", "now")));
    }

    #[test]
    fn test_query_validation() {
        assert!(DataQuery::new("A", "error").validate().is_ok());
        assert!(DataQuery::new("", "error").validate().is_err());
        assert!(DataQuery::new("A", "error")
            .with_max_lines(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_query_validation_bounds_max_lines() {
        assert!(DataQuery::new("A", "error")
            .with_max_lines(MAX_LINES_LIMIT)
            .validate()
            .is_ok());
        assert!(DataQuery::new("A", "error")
            .with_max_lines(MAX_LINES_LIMIT + 1)
            .validate()
            .is_err());
        assert!(DataQuery::new("A", "error")
            .with_max_lines(1 << 50)
            .validate()
            .is_err());
    }

    #[test]
    fn test_time_range_parse() {
        let range = TimeRange::parse("now-1h", "now", now()).unwrap();
        assert_eq!(range.to, now());
        assert_eq!(range.from, Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap());
    }

    #[test]
    fn test_time_range_absolute_bounds() {
        let range = TimeRange::parse("2024-01-01", "2024-01-02T00:00:00Z", now()).unwrap();
        assert_eq!((range.to - range.from).num_hours(), 24);
    }

    #[test]
    fn test_time_range_inverted() {
        assert!(matches!(
            TimeRange::parse("now", "now-1h", now()),
            Err(TimeRangeError::Inverted { .. })
        ));
    }

    #[test]
    fn test_time_range_invalid_bound() {
        assert!(matches!(
            TimeRange::parse("yesterday", "now", now()),
            Err(TimeRangeError::Timestamp(_))
        ));
    }

    #[test]
    fn test_batch_flattens_range() {
        let batch: QueryBatch = serde_json::from_str(
            r#"{"from": "now-6h", "to": "now", "queries": [{"refId": "A"}]}"#,
        )
        .unwrap();
        assert_eq!(batch.range, RawTimeRange::new("now-6h", "now"));
        assert_eq!(batch.queries.len(), 1);
        assert!(matches!(batch.queries[0], QueryEntry::Query(_)));
    }

    #[test]
    fn test_batch_keeps_malformed_entries() {
        let batch: QueryBatch = serde_json::from_str(
            r#"{
                "from": "now-1h",
                "to": "now",
                "queries": [
                    {"refId": "A", "expr": "*"},
                    {"refId": "B", "maxLines": "ten"},
                    {"expr": "no ref"},
                    7
                ]
            }"#,
        )
        .unwrap();

        let keys: Vec<String> = batch
            .queries
            .iter()
            .enumerate()
            .map(|(index, entry)| entry.response_key(index))
            .collect();
        assert_eq!(keys, vec!["A", "B", "queries[2]", "queries[3]"]);

        let mut entries = batch.queries.into_iter();
        assert_eq!(
            entries.next().unwrap().into_query().unwrap(),
            DataQuery::new("A", "*")
        );
        let err = entries.next().unwrap().into_query().unwrap_err();
        assert!(err.to_string().contains("invalid type"));
        assert!(entries.next().unwrap().into_query().is_err());
        assert!(entries.next().unwrap().into_query().is_err());
    }

    #[test]
    fn test_batch_serializes_queries_plainly() {
        let batch = QueryBatch::new(
            RawTimeRange::default(),
            vec![DataQuery::new("A", "error").with_max_lines(5)],
        );
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["from"], "now-1h");
        assert_eq!(json["queries"][0]["refId"], "A");
        assert_eq!(json["queries"][0]["maxLines"], 5);
    }
}
