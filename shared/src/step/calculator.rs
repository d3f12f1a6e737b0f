//! Step calculation.
//!
//! The step is the time range divided by the points budget, floored at the
//! resolved interval. When the budget decides the step it is snapped to the
//! nearest entry of a table of round durations so dashboards show `1m`
//! rather than `77.76s`.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Points budget used when the caller does not supply one.
pub const DEFAULT_MAX_DATA_POINTS: u64 = 1500;

const MS: u64 = 1;
const SEC: u64 = 1_000 * MS;
const MIN: u64 = 60 * SEC;
const HOUR: u64 = 60 * MIN;
const DAY: u64 = 24 * HOUR;

/// Round step values in milliseconds, ascending.
const NICE_STEPS_MS: [u64; 29] = [
    10 * MS,
    20 * MS,
    50 * MS,
    100 * MS,
    200 * MS,
    500 * MS,
    SEC,
    2 * SEC,
    5 * SEC,
    10 * SEC,
    15 * SEC,
    20 * SEC,
    30 * SEC,
    MIN,
    2 * MIN,
    5 * MIN,
    10 * MIN,
    15 * MIN,
    20 * MIN,
    30 * MIN,
    HOUR,
    2 * HOUR,
    3 * HOUR,
    6 * HOUR,
    12 * HOUR,
    DAY,
    7 * DAY,
    30 * DAY,
    365 * DAY,
];

/// Calculates the query step for a time range.
///
/// `floor` is the resolved minimum interval. If the budget-driven step is
/// below it, `floor` is returned as is, even when it is not a round value.
/// A zero budget falls back to [`DEFAULT_MAX_DATA_POINTS`].
///
/// # Examples
///
/// ```
/// use chrono::{Duration as TimeDelta, Utc};
/// use shared::step::calculate_step;
/// use std::time::Duration;
///
/// let to = Utc::now();
/// let from = to - TimeDelta::days(30);
/// let step = calculate_step(Duration::from_secs(20), from, to, 43_200);
/// assert_eq!(step, Duration::from_secs(60));
/// ```
#[must_use]
pub fn calculate_step(
    floor: Duration,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    max_data_points: u64,
) -> Duration {
    let points = if max_data_points == 0 {
        DEFAULT_MAX_DATA_POINTS
    } else {
        max_data_points
    };

    let range_nanos = (to - from).num_nanoseconds().unwrap_or(i64::MAX);
    let Ok(range_nanos) = u64::try_from(range_nanos) else {
        return floor;
    };

    let raw = Duration::from_nanos(range_nanos / points);
    if raw < floor {
        return floor;
    }
    round_step(raw)
}

/// Snaps a duration to the nearest round step.
///
/// Ties go to the smaller step.
#[must_use]
pub fn round_step(step: Duration) -> Duration {
    let ms = u64::try_from(step.as_millis()).unwrap_or(u64::MAX);
    let idx = NICE_STEPS_MS.partition_point(|&nice| nice < ms);

    let nearest = match (idx.checked_sub(1).map(|i| NICE_STEPS_MS[i]), NICE_STEPS_MS.get(idx)) {
        (Some(lower), Some(&upper)) => {
            if ms - lower <= upper - ms {
                lower
            } else {
                upper
            }
        }
        (Some(lower), None) => lower,
        (None, Some(&upper)) => upper,
        (None, None) => ms,
    };
    Duration::from_millis(nearest)
}
