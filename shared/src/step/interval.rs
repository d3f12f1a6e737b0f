//! Interval resolution.
//!
//! A query can carry several interval hints at once. They are checked in a
//! fixed order and the first one that is set wins:
//!
//! 1. the query-level interval string
//! 2. the query-level interval in milliseconds
//! 3. the datasource-level interval string
//! 4. the fallback interval

use crate::time::{parse_duration, DurationError};
use std::time::Duration;

/// Interval hints gathered for a single query.
///
/// Empty strings count as unset. `"0s"` is a set value like any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntervalHints<'a> {
    /// Minimum interval configured on the datasource.
    pub datasource_interval: Option<&'a str>,
    /// Interval configured on the query.
    pub query_interval: Option<&'a str>,
    /// Interval computed by the dashboard, in milliseconds. Zero means unset.
    pub query_interval_ms: u64,
    /// Value returned when nothing else is set. Never parsed.
    pub fallback: Duration,
}

impl<'a> IntervalHints<'a> {
    /// Creates hints that resolve to `fallback` until other fields are set.
    #[must_use]
    pub fn new(fallback: Duration) -> Self {
        Self {
            fallback,
            ..Self::default()
        }
    }

    /// Sets the datasource-level interval.
    #[must_use]
    pub fn with_datasource_interval(mut self, interval: &'a str) -> Self {
        self.datasource_interval = Some(interval);
        self
    }

    /// Sets the query-level interval.
    #[must_use]
    pub fn with_query_interval(mut self, interval: &'a str) -> Self {
        self.query_interval = Some(interval);
        self
    }

    /// Sets the query-level interval in milliseconds.
    #[must_use]
    pub fn with_query_interval_ms(mut self, interval_ms: u64) -> Self {
        self.query_interval_ms = interval_ms;
        self
    }

    /// Resolves the hints into a single interval.
    ///
    /// # Errors
    ///
    /// Returns a `DurationError` if the winning hint is a string that cannot
    /// be parsed. A malformed query interval always errors, even when lower
    /// precedence hints are valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared::step::IntervalHints;
    /// use std::time::Duration;
    ///
    /// let hints = IntervalHints::new(Duration::ZERO)
    ///     .with_datasource_interval("20s")
    ///     .with_query_interval_ms(5000);
    /// assert_eq!(hints.resolve().unwrap(), Duration::from_secs(5));
    /// ```
    pub fn resolve(&self) -> Result<Duration, DurationError> {
        if let Some(interval) = non_empty(self.query_interval) {
            return parse_duration(interval);
        }
        if self.query_interval_ms != 0 {
            return Ok(Duration::from_millis(self.query_interval_ms));
        }
        if let Some(interval) = non_empty(self.datasource_interval) {
            return parse_duration(interval);
        }
        Ok(self.fallback)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Resolves the effective interval from the individual hints.
///
/// Shorthand for building [`IntervalHints`] and calling
/// [`IntervalHints::resolve`].
///
/// # Errors
///
/// See [`IntervalHints::resolve`].
pub fn resolve_interval(
    datasource_interval: &str,
    query_interval: &str,
    query_interval_ms: u64,
    fallback: Duration,
) -> Result<Duration, DurationError> {
    IntervalHints::new(fallback)
        .with_datasource_interval(datasource_interval)
        .with_query_interval(query_interval)
        .with_query_interval_ms(query_interval_ms)
        .resolve()
}
