//! Backend request building.
//!
//! Resolves the step of a panel query, rewrites its expression and builds
//! the URL of the backend query endpoint.

use super::model::{DataQuery, TimeRange};
use super::template::substitute_interval;
use crate::config::DatasourceSettings;
use crate::step::{calculate_step, IntervalHints};
use crate::time::{format_duration, DurationError};
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Path of the log query endpoint, relative to the datasource URL.
pub const QUERY_PATH: [&str; 3] = ["select", "logsql", "query"];

/// Interval used when neither the query nor the datasource sets one.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(15);

/// Errors that can occur while building a backend request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryBuildError {
    /// An interval hint could not be parsed.
    #[error("failed to resolve query interval: {0}")]
    Interval(#[from] DurationError),

    /// The datasource URL could not be parsed.
    #[error("invalid datasource URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// A panel query ready to be sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    /// Identifier of the query within its batch.
    pub ref_id: String,
    /// The expression after template substitution.
    pub expr: String,
    /// The queried time range.
    pub range: TimeRange,
    /// The resolved step.
    pub step: Duration,
    /// Maximum number of log lines.
    pub max_lines: u64,
    /// The full request URL.
    pub url: Url,
}

/// Resolves the step of `query` and builds its backend request.
///
/// # Errors
///
/// Returns a `QueryBuildError` if an interval hint is malformed or the
/// datasource URL is invalid.
///
/// # Example
///
/// ```
/// use chrono::{Duration as TimeDelta, Utc};
/// use shared::config::DatasourceSettings;
/// use shared::query::{prepare_query, DataQuery, TimeRange};
/// use std::time::Duration;
///
/// let to = Utc::now();
/// let range = TimeRange::new(to - TimeDelta::days(2), to).unwrap();
/// let query = DataQuery::new("A", "error | stats by (_time:$__interval) count()")
///     .with_max_data_points(100);
/// let settings = DatasourceSettings::new("http://localhost:9428");
///
/// let prepared = prepare_query(&query, range, &settings).unwrap();
/// assert_eq!(prepared.step, Duration::from_secs(30 * 60));
/// assert_eq!(prepared.expr, "error | stats by (_time:30m) count()");
/// assert_eq!(prepared.url.path(), "/select/logsql/query");
/// ```
pub fn prepare_query(
    query: &DataQuery,
    range: TimeRange,
    settings: &DatasourceSettings,
) -> Result<PreparedQuery, QueryBuildError> {
    let min_interval = IntervalHints::new(DEFAULT_MIN_INTERVAL)
        .with_datasource_interval(&settings.time_interval)
        .with_query_interval(&query.interval)
        .with_query_interval_ms(query.interval_ms)
        .resolve()?;

    let step = calculate_step(min_interval, range.from, range.to, query.max_data_points);
    let step_ms = u64::try_from(step.as_millis()).unwrap_or(u64::MAX);
    let expr = substitute_interval(&query.expr, step_ms);

    let mut url = endpoint_url(&settings.url, &QUERY_PATH)?;
    url.query_pairs_mut()
        .append_pair("query", &expr)
        .append_pair("limit", &query.max_lines.to_string())
        .append_pair("start", &format_instant(range.from))
        .append_pair("end", &format_instant(range.to))
        .append_pair("step", &format_duration(step));
    append_custom_params(&mut url, &settings.custom_query_params);

    tracing::debug!(
        ref_id = %query.ref_id,
        step = %format_duration(step),
        %url,
        "Prepared backend query"
    );

    Ok(PreparedQuery {
        ref_id: query.ref_id.clone(),
        expr,
        range,
        step,
        max_lines: query.max_lines,
        url,
    })
}

/// Joins `path` onto the datasource base URL.
///
/// # Errors
///
/// Returns `QueryBuildError::InvalidUrl` if `base` is not an absolute
/// hierarchical URL.
///
/// # Example
///
/// ```
/// use shared::query::endpoint_url;
///
/// let url = endpoint_url("http://logs:9428/prefix/", &["health"]).unwrap();
/// assert_eq!(url.as_str(), "http://logs:9428/prefix/health");
/// ```
pub fn endpoint_url(base: &str, path: &[&str]) -> Result<Url, QueryBuildError> {
    let invalid = |reason: String| QueryBuildError::InvalidUrl {
        url: base.to_string(),
        reason,
    };

    let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("URL cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(path);
    Ok(url)
}

/// Appends `key=value&...` pairs to the URL query, keeping duplicates.
fn append_custom_params(url: &mut Url, params: &str) {
    let params = params.trim_start_matches(['?', '&']);
    if params.is_empty() {
        return;
    }
    url.query_pairs_mut()
        .extend_pairs(url::form_urlencoded::parse(params.as_bytes()));
}

fn format_instant(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as TimeDelta, TimeZone};

    fn range_of(hours: i64) -> TimeRange {
        let to = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        TimeRange::new(to - TimeDelta::hours(hours), to).unwrap()
    }

    fn params(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_prepare_query_url_parameters() {
        let query = DataQuery::new("A", "error").with_max_lines(50);
        let settings = DatasourceSettings::new("http://logs:9428");

        let prepared = prepare_query(&query, range_of(1), &settings).unwrap();

        assert_eq!(prepared.url.path(), "/select/logsql/query");
        assert_eq!(
            params(&prepared.url),
            vec![
                ("query".to_string(), "error".to_string()),
                ("limit".to_string(), "50".to_string()),
                ("start".to_string(), "2024-05-01T11:00:00.000Z".to_string()),
                ("end".to_string(), "2024-05-01T12:00:00.000Z".to_string()),
                ("step".to_string(), "15s".to_string()),
            ]
        );
    }

    #[test]
    fn test_prepare_query_uses_interval_precedence() {
        let settings = DatasourceSettings::new("http://logs:9428").with_time_interval("20s");

        let prepared = prepare_query(&DataQuery::new("A", ""), range_of(1), &settings).unwrap();
        assert_eq!(prepared.step, Duration::from_secs(20));

        let query = DataQuery::new("A", "").with_interval_ms(5000);
        let prepared = prepare_query(&query, range_of(1), &settings).unwrap();
        assert_eq!(prepared.step, Duration::from_secs(5));

        let query = DataQuery::new("A", "").with_interval("2m").with_interval_ms(5000);
        let prepared = prepare_query(&query, range_of(1), &settings).unwrap();
        assert_eq!(prepared.step, Duration::from_secs(120));
    }

    #[test]
    fn test_prepare_query_substitutes_interval() {
        let query = DataQuery::new("A", "* | stats by (_time:$__interval) count()")
            .with_max_data_points(100);
        let settings = DatasourceSettings::new("http://logs:9428");

        let prepared = prepare_query(&query, range_of(48), &settings).unwrap();
        assert_eq!(prepared.expr, "* | stats by (_time:30m) count()");
        assert!(params(&prepared.url).contains(&(
            "query".to_string(),
            "* | stats by (_time:30m) count()".to_string()
        )));
    }

    #[test]
    fn test_prepare_query_invalid_interval() {
        let query = DataQuery::new("A", "").with_interval("a3");
        let settings = DatasourceSettings::new("http://logs:9428");
        assert!(matches!(
            prepare_query(&query, range_of(1), &settings),
            Err(QueryBuildError::Interval(_))
        ));
    }

    #[test]
    fn test_custom_params_appended_without_dedup() {
        let settings = DatasourceSettings::new("http://logs:9428")
            .with_custom_query_params("?limit=5&extra_filters=app%3Aapi");

        let prepared = prepare_query(&DataQuery::new("A", "x"), range_of(1), &settings).unwrap();
        let pairs = params(&prepared.url);

        let limits: Vec<_> = pairs.iter().filter(|(k, _)| k == "limit").collect();
        assert_eq!(limits.len(), 2);
        assert_eq!(
            pairs.last(),
            Some(&("extra_filters".to_string(), "app:api".to_string()))
        );
    }

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let url = endpoint_url("http://logs:9428/vl", &QUERY_PATH).unwrap();
        assert_eq!(url.as_str(), "http://logs:9428/vl/select/logsql/query");
    }

    #[test]
    fn test_endpoint_url_invalid() {
        assert!(matches!(
            endpoint_url("logs:9428", &QUERY_PATH),
            Err(QueryBuildError::InvalidUrl { .. })
        ));
        assert!(matches!(
            endpoint_url("not a url", &QUERY_PATH),
            Err(QueryBuildError::InvalidUrl { .. })
        ));
    }
}
