//! Rate window sizing.
//!
//! Rate-style aggregations need a window spanning at least four scrape
//! points, and never a window shorter than the interval the caller asked for.

use crate::time::parse_duration;
use std::time::Duration;

/// Scrape interval assumed when none is configured.
pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(15);

const MIN_SCRAPE_POINTS: u32 = 4;

/// Calculates the window for rate-style aggregations.
///
/// An empty `scrape_interval` means [`DEFAULT_SCRAPE_INTERVAL`]. An
/// unparseable one yields a zero window instead of an error.
///
/// # Examples
///
/// ```
/// use shared::step::calculate_rate_interval;
/// use std::time::Duration;
///
/// assert_eq!(calculate_rate_interval(Duration::ZERO, ""), Duration::from_secs(60));
/// assert_eq!(calculate_rate_interval(Duration::from_secs(20), "10s"), Duration::from_secs(40));
/// assert_eq!(calculate_rate_interval(Duration::from_secs(20), "a3"), Duration::ZERO);
/// ```
#[must_use]
pub fn calculate_rate_interval(interval: Duration, scrape_interval: &str) -> Duration {
    let scrape = if scrape_interval.is_empty() {
        DEFAULT_SCRAPE_INTERVAL
    } else {
        match parse_duration(scrape_interval) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!(scrape_interval, error = %e, "Ignoring invalid scrape interval");
                return Duration::ZERO;
            }
        }
    };

    scrape
        .checked_mul(MIN_SCRAPE_POINTS)
        .unwrap_or(Duration::MAX)
        .max(interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_intervals() {
        assert_eq!(calculate_rate_interval(Duration::ZERO, ""), Duration::from_secs(60));
    }

    #[test]
    fn test_empty_scrape_interval() {
        assert_eq!(
            calculate_rate_interval(Duration::from_secs(5), ""),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_empty_interval() {
        assert_eq!(
            calculate_rate_interval(Duration::ZERO, "10s"),
            Duration::from_secs(40)
        );
    }

    #[test]
    fn test_interval_lower_than_scrape_window() {
        assert_eq!(
            calculate_rate_interval(Duration::from_secs(5), "10s"),
            Duration::from_secs(40)
        );
        assert_eq!(
            calculate_rate_interval(Duration::from_secs(20), "10s"),
            Duration::from_secs(40)
        );
    }

    #[test]
    fn test_interval_higher_than_scrape_window() {
        assert_eq!(
            calculate_rate_interval(Duration::from_secs(90), "10s"),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn test_invalid_scrape_interval_is_zero() {
        assert_eq!(
            calculate_rate_interval(Duration::from_secs(20), "a3"),
            Duration::ZERO
        );
    }
}
