//! Datasource configuration.

mod settings;

pub use settings::{DatasourceSettings, SettingsError, DEFAULT_HTTP_METHOD};
