//! API route definitions.
//!
//! This module organizes all HTTP routes for the Logbridge API server.

mod health;
mod query;

pub use health::health_routes;
pub use query::{query_routes, ErrorResponse};
