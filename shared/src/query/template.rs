//! Template variable substitution.

use crate::time::format_duration;
use std::time::Duration;

/// Placeholder replaced with the resolved step.
pub const INTERVAL_VARIABLE: &str = "$__interval";

/// Replaces every `$__interval` in `expr` with the formatted interval.
///
/// This is plain text substitution; other placeholders are left untouched.
///
/// # Examples
///
/// ```
/// use shared::query::substitute_interval;
///
/// assert_eq!(
///     substitute_interval("error | stats by (_time:$__interval) count()", 60_000),
///     "error | stats by (_time:1m) count()"
/// );
/// ```
#[must_use]
pub fn substitute_interval(expr: &str, interval_ms: u64) -> String {
    if !expr.contains(INTERVAL_VARIABLE) {
        return expr.to_string();
    }
    expr.replace(
        INTERVAL_VARIABLE,
        &format_duration(Duration::from_millis(interval_ms)),
    )
}
