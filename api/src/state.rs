//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::datasource::Datasource;
use std::sync::Arc;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The datasource instance serving queries.
    datasource: Arc<Datasource>,
}

impl AppState {
    /// Creates a new application state around a datasource.
    #[must_use]
    pub fn new(datasource: Arc<Datasource>) -> Self {
        Self { datasource }
    }

    /// Returns the datasource.
    #[must_use]
    pub fn datasource(&self) -> &Arc<Datasource> {
        &self.datasource
    }
}
