//! Panel queries and backend requests.
//!
//! This module covers everything between a dashboard query and the URL sent
//! to the log backend: the query model, `$__interval` substitution, stream
//! selector parsing and request building.
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use shared::config::DatasourceSettings;
//! use shared::query::{prepare_query, DataQuery, TimeRange};
//!
//! let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
//! let range = TimeRange::parse("now-1h", "now", now).unwrap();
//! let query = DataQuery::new("A", "error").with_max_lines(100);
//! let settings = DatasourceSettings::new("http://localhost:9428");
//!
//! let prepared = prepare_query(&query, range, &settings).unwrap();
//! assert_eq!(prepared.url.path(), "/select/logsql/query");
//! assert_eq!(prepared.max_lines, 100);
//! ```

mod ast;
mod model;
mod parser;
mod request;
mod template;

pub use ast::{LabelFilter, MatchOp, StreamSelector};
pub use model::{
    DataQuery, QueryBatch, QueryEntry, RawTimeRange, TimeRange, TimeRangeError, DEFAULT_MAX_LINES,
    MAX_LINES_LIMIT,
};
pub use parser::{parse_selector, LogsqlSelectorParser, SelectorError, SelectorParser, NAME_LABEL};
pub use request::{
    endpoint_url, prepare_query, PreparedQuery, QueryBuildError, DEFAULT_MIN_INTERVAL, QUERY_PATH,
};
pub use template::{substitute_interval, INTERVAL_VARIABLE};
