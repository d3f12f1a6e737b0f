//! Logbridge Shared Library
//!
//! This crate contains the query-side logic of the Logbridge log datasource:
//! time grammars, interval and step resolution, request building and log
//! stream decoding. Nothing in here performs network I/O.
//!
//! # Modules
//!
//! - [`time`] - Duration and timestamp grammars
//! - [`step`] - Interval resolution, step and rate interval calculation
//! - [`query`] - Panel query model, selector parsing and request building
//! - [`frame`] - Log stream decoding into columnar frames
//! - [`config`] - Datasource settings
//!
//! # Example
//!
//! ```
//! use shared::step::calculate_rate_interval;
//! use shared::time::parse_duration;
//! use std::time::Duration;
//!
//! let interval = parse_duration("1m").unwrap();
//! assert_eq!(calculate_rate_interval(interval, "30s"), Duration::from_secs(120));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod frame;
pub mod query;
pub mod step;
pub mod time;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
