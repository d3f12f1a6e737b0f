//! Datasource settings.
//!
//! The hosting environment hands each datasource instance a URL plus a JSON
//! blob of options. This module decodes and validates them.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// HTTP method used when the settings leave it empty.
pub const DEFAULT_HTTP_METHOD: &str = "POST";

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings JSON could not be decoded.
    #[error("failed to parse datasource settings: {0}")]
    Json(#[from] serde_json::Error),

    /// The settings failed validation.
    #[error("invalid datasource settings: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Settings of one datasource instance.
///
/// # Example
///
/// ```
/// use shared::config::DatasourceSettings;
///
/// let settings = DatasourceSettings::from_json(
///     br#"{"url": "http://localhost:9428", "timeInterval": "30s"}"#,
/// )
/// .unwrap();
/// assert_eq!(settings.http_method(), "POST");
/// assert_eq!(settings.time_interval, "30s");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceSettings {
    /// Base URL of the log backend.
    #[validate(url(message = "Datasource URL must be a valid URL"))]
    pub url: String,

    /// HTTP method for query requests. Empty means [`DEFAULT_HTTP_METHOD`].
    #[serde(default)]
    pub http_method: String,

    /// Extra query parameters appended to every query request, in
    /// `key=value&key2=value2` form.
    #[serde(default, rename = "customQueryParameters")]
    pub custom_query_params: String,

    /// Minimum interval configured on the datasource.
    #[serde(default)]
    pub time_interval: String,
}

impl DatasourceSettings {
    /// Creates settings for the given backend URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http_method: String::new(),
            custom_query_params: String::new(),
            time_interval: String::new(),
        }
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn with_http_method(mut self, method: impl Into<String>) -> Self {
        self.http_method = method.into();
        self
    }

    /// Sets the custom query parameters.
    #[must_use]
    pub fn with_custom_query_params(mut self, params: impl Into<String>) -> Self {
        self.custom_query_params = params.into();
        self
    }

    /// Sets the datasource-level interval.
    #[must_use]
    pub fn with_time_interval(mut self, interval: impl Into<String>) -> Self {
        self.time_interval = interval.into();
        self
    }

    /// Decodes and validates settings from JSON.
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` if the JSON is malformed or the settings
    /// are invalid.
    pub fn from_json(json: &[u8]) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_slice(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Returns the HTTP method, falling back to [`DEFAULT_HTTP_METHOD`].
    #[must_use]
    pub fn http_method(&self) -> &str {
        if self.http_method.is_empty() {
            DEFAULT_HTTP_METHOD
        } else {
            &self.http_method
        }
    }
}
