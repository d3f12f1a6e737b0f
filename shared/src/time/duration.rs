//! Duration grammar.
//!
//! Parses Prometheus-style durations such as `20s`, `1h30m` or `1.5d`, plus
//! bare numbers which are read as seconds (`123` is two minutes and three
//! seconds). Formatting goes the other way but only keeps the largest unit,
//! so `1h59m` renders as `1h`.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt, recognize, value},
    multi::many1,
    IResult, Parser,
};
use std::time::Duration;
use thiserror::Error;

const MILLISECOND: i64 = 1;
const SECOND: i64 = 1_000 * MILLISECOND;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const YEAR: i64 = 365 * DAY;

/// Errors that can occur while parsing a duration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    /// The duration string is empty.
    #[error("duration cannot be empty")]
    Empty,

    /// The duration string does not follow the grammar.
    #[error("cannot parse duration '{0}'")]
    Invalid(String),

    /// A negative duration was given where only positive values make sense.
    #[error("duration '{0}' cannot be negative")]
    Negative(String),
}

/// Parses a duration that may carry a leading minus sign.
///
/// Returns the signed value in milliseconds. Fractional parts below one
/// millisecond are truncated.
///
/// # Errors
///
/// Returns a `DurationError` if the input is empty or does not follow the
/// `<number><unit>...` grammar.
///
/// # Examples
///
/// ```
/// use shared::time::parse_signed_millis;
///
/// assert_eq!(parse_signed_millis("1m30s").unwrap(), 90_000);
/// assert_eq!(parse_signed_millis("-5m").unwrap(), -300_000);
/// assert_eq!(parse_signed_millis("2").unwrap(), 2_000);
/// ```
pub fn parse_signed_millis(input: &str) -> Result<i64, DurationError> {
    if input.is_empty() {
        return Err(DurationError::Empty);
    }

    let (negative, body) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let millis = if body.ends_with(|c: char| c.is_ascii_digit() || c == '.') {
        bare_seconds(body).ok_or_else(|| DurationError::Invalid(input.to_string()))?
    } else {
        let (_, parts) = all_consuming(many1(duration_part))
            .parse(body)
            .map_err(|_| DurationError::Invalid(input.to_string()))?;
        parts.into_iter().fold(0_i64, i64::saturating_add)
    };

    Ok(if negative { -millis } else { millis })
}

/// Parses a non-negative duration.
///
/// # Errors
///
/// Returns a `DurationError` if the input cannot be parsed or is negative.
///
/// # Examples
///
/// ```
/// use shared::time::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("20s").unwrap(), Duration::from_secs(20));
/// assert_eq!(parse_duration("123").unwrap(), Duration::from_secs(123));
/// assert!(parse_duration("a3").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let millis = parse_signed_millis(input)?;
    let millis = u64::try_from(millis).map_err(|_| DurationError::Negative(input.to_string()))?;
    Ok(Duration::from_millis(millis))
}

/// Renders a duration using the largest unit that fits.
///
/// Units are checked from years down to milliseconds. Anything shorter than
/// one millisecond renders as `1ms`.
///
/// # Examples
///
/// ```
/// use shared::time::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1s");
/// assert_eq!(format_duration(Duration::from_micros(10)), "1ms");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
    match millis {
        m if m >= YEAR => format!("{}y", m / YEAR),
        m if m >= DAY => format!("{}d", m / DAY),
        m if m >= HOUR => format!("{}h", m / HOUR),
        m if m >= MINUTE => format!("{}m", m / MINUTE),
        m if m >= SECOND => format!("{}s", m / SECOND),
        m if m >= MILLISECOND => format!("{m}ms"),
        _ => "1ms".to_string(),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn bare_seconds(input: &str) -> Option<i64> {
    let (_, number) = all_consuming(decimal).parse(input).ok()?;
    Some((number * SECOND as f64) as i64)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn duration_part(input: &str) -> IResult<&str, i64> {
    let (input, (number, unit)) = (decimal, unit).parse(input)?;
    Ok((input, (number * unit as f64) as i64))
}

fn decimal(input: &str) -> IResult<&str, f64> {
    map_res(recognize((digit1, opt((char('.'), digit1)))), |s: &str| {
        s.parse::<f64>()
    })
    .parse(input)
}

fn unit(input: &str) -> IResult<&str, i64> {
    alt((
        value(MILLISECOND, tag("ms")),
        value(SECOND, tag("s")),
        value(MINUTE, tag("m")),
        value(HOUR, tag("h")),
        value(DAY, tag("d")),
        value(WEEK, tag("w")),
        value(YEAR, tag("y")),
    ))
    .parse(input)
}
