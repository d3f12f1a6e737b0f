//! Step and interval calculation.
//!
//! Turns the interval hints of a panel query and its time range into the
//! step sent to the backend.
//!
//! # Example
//!
//! ```
//! use chrono::{Duration as TimeDelta, Utc};
//! use shared::step::{calculate_step, IntervalHints};
//! use std::time::Duration;
//!
//! let floor = IntervalHints::new(Duration::from_secs(15))
//!     .with_query_interval("20s")
//!     .resolve()
//!     .unwrap();
//!
//! let to = Utc::now();
//! let step = calculate_step(floor, to - TimeDelta::days(2), to, 100);
//! assert_eq!(step, Duration::from_secs(30 * 60));
//! ```

mod calculator;
mod interval;
mod rate;

pub use calculator::{calculate_step, round_step, DEFAULT_MAX_DATA_POINTS};
pub use interval::{resolve_interval, IntervalHints};
pub use rate::{calculate_rate_interval, DEFAULT_SCRAPE_INTERVAL};
