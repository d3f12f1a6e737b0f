//! Timestamp grammar.
//!
//! Accepts the timestamp formats log backends commonly take as query bounds:
//!
//! - `now`
//! - relative offsets such as `now-1h`, `-5m` or `1d` (read as "ago")
//! - partial calendar strings `YYYY`, `YYYY-MM`, `YYYY-MM-DD`,
//!   `YYYY-MM-DDTHH`, `YYYY-MM-DDTHH:MM`, `YYYY-MM-DDTHH:MM:SS`, optionally
//!   followed by `Z` or a `+HH:MM`/`-HH:MM` offset
//! - unix timestamps in seconds, or in milliseconds once the value reaches 2^32
//! - full RFC 3339 timestamps
//!
//! The branches are tried in a fixed order and the order matters: `1234` is a
//! year while `123` is a unix timestamp.

use super::duration::{parse_signed_millis, DurationError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// Years outside this range cannot be stored as nanoseconds since the epoch.
const MIN_VALID_YEAR: i32 = 1970;
const MAX_VALID_YEAR: i32 = 2262;

const MIN_TIME_MSECS: i64 = 0;
const MAX_TIME_MSECS: i64 = i64::MAX / 1_000_000;

/// Unix timestamps at or above this value are read as milliseconds.
const MILLIS_THRESHOLD: f64 = 4_294_967_296.0;

/// Errors that can occur while parsing a timestamp.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    /// The trailing `+HH:MM` / `-HH:MM` offset is malformed.
    #[error("cannot parse timezone offset '{0}'")]
    InvalidOffset(String),

    /// A relative timestamp carries an unparseable duration.
    #[error("cannot parse relative timestamp '{input}': {source}")]
    InvalidRelative {
        /// The duration part of the input.
        input: String,
        /// The underlying duration error.
        source: DurationError,
    },

    /// A four-digit year lies outside the supported range.
    #[error("cannot parse year from '{0}': year must be in range [1970, 2262]")]
    YearOutOfRange(String),

    /// A calendar-style timestamp does not match its expected layout.
    #[error("cannot parse calendar timestamp '{0}'")]
    InvalidCalendar(String),

    /// A digits-only timestamp is not a number.
    #[error("cannot parse unix timestamp '{0}'")]
    InvalidNumeric(String),

    /// The input is not a valid RFC 3339 timestamp.
    #[error("cannot parse RFC 3339 timestamp '{0}'")]
    InvalidRfc3339(String),

    /// The parsed value does not map onto a representable instant.
    #[error("timestamp '{0}' is out of range")]
    OutOfRange(String),
}

/// Parses a timestamp relative to `current_timestamp`.
///
/// Both the reference time and the result are unix timestamps in seconds.
///
/// # Errors
///
/// Returns a `TimestampError` naming the part of the input that failed.
///
/// # Examples
///
/// ```
/// use shared::time::parse_time_at;
///
/// assert_eq!(parse_time_at("now", 1000.0).unwrap(), 1000.0);
/// assert_eq!(parse_time_at("now-10s", 1000.0).unwrap(), 990.0);
/// assert_eq!(parse_time_at("1970-01-01T00:01:00Z", 0.0).unwrap(), 60.0);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn parse_time_at(input: &str, current_timestamp: f64) -> Result<f64, TimestampError> {
    if input == "now" {
        return Ok(current_timestamp);
    }

    let (s, tz_offset) = split_timezone_offset(input)?;
    let s = s.strip_suffix('Z').unwrap_or(s);

    if is_relative(s) {
        let d = s.strip_prefix("now").unwrap_or(s);
        let millis = parse_signed_millis(d).map_err(|source| TimestampError::InvalidRelative {
            input: d.to_string(),
            source,
        })?;
        let millis = if millis > 0 { -millis } else { millis };
        return Ok(current_timestamp + millis as f64 / 1e3);
    }

    if s.len() == 4 {
        return parse_year(s).map(|ts| tz_offset + ts);
    }

    if !input.contains('-') {
        let ts: f64 = input
            .parse()
            .map_err(|_| TimestampError::InvalidNumeric(input.to_string()))?;
        return Ok(if ts >= MILLIS_THRESHOLD { ts / 1000.0 } else { ts });
    }

    let parsed = match s.len() {
        7 => NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        10 => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        13 => NaiveDateTime::parse_from_str(&format!("{s}:00"), "%Y-%m-%dT%H:%M").ok(),
        16 => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").ok(),
        19 => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok(),
        _ => {
            let t = DateTime::parse_from_rfc3339(input)
                .map_err(|_| TimestampError::InvalidRfc3339(input.to_string()))?;
            return Ok(unix_seconds(&t.with_timezone(&Utc)));
        }
    };

    let naive = parsed.ok_or_else(|| TimestampError::InvalidCalendar(s.to_string()))?;
    Ok(tz_offset + unix_seconds(&naive.and_utc()))
}

/// Parses a timestamp relative to the current wall-clock time.
///
/// # Errors
///
/// See [`parse_time_at`].
pub fn parse_time(input: &str) -> Result<f64, TimestampError> {
    parse_time_at(input, unix_seconds(&Utc::now()))
}

/// Parses a timestamp into an instant, relative to `now`.
///
/// The result has millisecond precision and is clamped to the range a
/// nanosecond-precision clock can represent, starting at the unix epoch.
///
/// # Errors
///
/// See [`parse_time_at`].
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use shared::time::parse_instant;
///
/// let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
/// assert_eq!(parse_instant("now", now).unwrap(), now);
/// assert_eq!(
///     parse_instant("now-1h", now).unwrap(),
///     Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap()
/// );
/// ```
pub fn parse_instant(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimestampError> {
    let secs = parse_time_at(input, unix_seconds(&now))?;
    instant_from_unix_seconds(secs).ok_or_else(|| TimestampError::OutOfRange(input.to_string()))
}

/// Parses a timestamp into an instant using the current wall-clock time as
/// the reference for relative expressions.
///
/// # Errors
///
/// See [`parse_time_at`].
pub fn instant_from_seconds(input: &str) -> Result<DateTime<Utc>, TimestampError> {
    parse_instant(input, Utc::now())
}

#[allow(clippy::cast_possible_truncation)]
fn instant_from_unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    let msecs = ((secs * 1e3) as i64).clamp(MIN_TIME_MSECS, MAX_TIME_MSECS);
    DateTime::from_timestamp_millis(msecs)
}

#[allow(clippy::cast_precision_loss)]
fn unix_seconds(t: &DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / 1e9
}

/// Strips a trailing `[+-]HH:MM` offset and returns the seconds to add back
/// once the rest is parsed as UTC. A `+` offset yields a negative value.
fn split_timezone_offset(input: &str) -> Result<(&str, f64), TimestampError> {
    if input.len() <= 6 {
        return Ok((input, 0.0));
    }
    let Some((rest, tz)) = input
        .get(input.len() - 6..)
        .map(|tz| (&input[..input.len() - 6], tz))
    else {
        return Ok((input, 0.0));
    };

    let bytes = tz.as_bytes();
    if !matches!(bytes[0], b'+' | b'-') || bytes[3] != b':' {
        return Ok((input, 0.0));
    }

    let invalid = || TimestampError::InvalidOffset(tz.to_string());
    let hour: u32 = digits(&tz[1..3]).ok_or_else(invalid)?;
    let minute: u32 = digits(&tz[4..]).ok_or_else(invalid)?;

    let offset = f64::from(hour * 3600 + minute * 60);
    Ok((rest, if bytes[0] == b'+' { -offset } else { offset }))
}

fn digits(s: &str) -> Option<u32> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

fn is_relative(s: &str) -> bool {
    let bytes = s.as_bytes();
    let looks_like_duration = match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => *last > b'9' || *first == b'-',
        _ => false,
    };
    looks_like_duration || s.starts_with("now")
}

fn parse_year(s: &str) -> Result<f64, TimestampError> {
    let year: i32 = digits(s)
        .and_then(|y| i32::try_from(y).ok())
        .ok_or_else(|| TimestampError::InvalidCalendar(s.to_string()))?;
    if !(MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&year) {
        return Err(TimestampError::YearOutOfRange(s.to_string()));
    }
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| unix_seconds(&naive.and_utc()))
        .ok_or_else(|| TimestampError::InvalidCalendar(s.to_string()))
}
