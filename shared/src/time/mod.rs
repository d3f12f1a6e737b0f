//! Duration and timestamp grammars.
//!
//! Both grammars are shared by interval resolution, query time bounds and the
//! per-record event times decoded from a log stream.

mod duration;
mod timestamp;

pub use duration::{format_duration, parse_duration, parse_signed_millis, DurationError};
pub use timestamp::{
    instant_from_seconds, parse_instant, parse_time, parse_time_at, TimestampError,
};
