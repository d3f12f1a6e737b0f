//! The log datasource instance.
//!
//! A [`Datasource`] is created once per settings revision and disposed when
//! the settings change or the server stops. Disposing it cancels every query
//! still in flight.

use crate::dispatcher::dispatch;
use crate::error::QueryError;
use crate::response::{CheckHealthResult, QueryDataResponse};
use crate::transport::{HttpTransport, Transport, TransportError};
use chrono::{DateTime, Utc};
use shared::config::DatasourceSettings;
use shared::frame::{Frame, StreamDecoder};
use shared::query::{
    endpoint_url, prepare_query, DataQuery, LogsqlSelectorParser, QueryBatch, QueryEntry,
    RawTimeRange, SelectorParser,
};
use shared::validator::{Validate, ValidationErrors};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Path of the backend health endpoint.
pub const HEALTH_PATH: &str = "health";

/// Errors that can occur while creating a datasource.
#[derive(Debug, Error)]
pub enum DatasourceError {
    /// The settings are invalid.
    #[error("invalid datasource settings: {0}")]
    Settings(#[from] ValidationErrors),

    /// The transport could not be created.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A configured log datasource.
pub struct Datasource {
    settings: DatasourceSettings,
    transport: Arc<dyn Transport>,
    parser: Arc<dyn SelectorParser>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Datasource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datasource")
            .field("settings", &self.settings)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl Datasource {
    /// Creates a datasource that talks HTTP to the configured backend.
    ///
    /// # Errors
    ///
    /// Returns a `DatasourceError` if the settings fail validation or the
    /// HTTP client cannot be built.
    pub fn new(settings: DatasourceSettings) -> Result<Self, DatasourceError> {
        settings.validate()?;
        let transport = HttpTransport::new()?;
        Ok(Self::with_transport(settings, Arc::new(transport)))
    }

    /// Creates a datasource on top of an existing transport.
    #[must_use]
    pub fn with_transport(settings: DatasourceSettings, transport: Arc<dyn Transport>) -> Self {
        tracing::info!(url = %settings.url, method = settings.http_method(), "Datasource created");
        Self {
            settings,
            transport,
            parser: Arc::new(LogsqlSelectorParser),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replaces the stream selector parser.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn SelectorParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Returns the datasource settings.
    #[must_use]
    pub fn settings(&self) -> &DatasourceSettings {
        &self.settings
    }

    /// Returns a token for one query batch.
    ///
    /// The token is cancelled when the datasource is disposed, and may also
    /// be cancelled on its own to stop just that batch.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Cancels all in-flight queries. Later batches fail immediately.
    pub fn dispose(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!(url = %self.settings.url, "Disposing datasource");
            self.shutdown.cancel();
        }
    }

    /// Returns `true` once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Runs a query batch and returns one result per `refId`.
    ///
    /// All relative time ranges in the batch are resolved against the same
    /// instant. Each entry is parsed inside its own task, so a malformed
    /// entry only fails its own result. Entries without a `refId` are
    /// reported under `queries[<index>]`.
    pub async fn query_data(
        self: &Arc<Self>,
        batch: QueryBatch,
        token: &CancellationToken,
    ) -> QueryDataResponse {
        let now = Utc::now();
        let default_range = Arc::new(batch.range);
        let this = Arc::clone(self);

        let queries = batch
            .queries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| (entry.response_key(index), entry));

        dispatch(queries, token, move |entry: QueryEntry| {
            let this = Arc::clone(&this);
            let default_range = Arc::clone(&default_range);
            async move {
                let query = entry.into_query()?;
                this.query(query, &default_range, now).await
            }
        })
        .await
    }

    /// Runs a single query.
    ///
    /// The query's own time range wins over `default_range`.
    ///
    /// # Errors
    ///
    /// Returns a `QueryError` if the query is invalid, the backend cannot be
    /// reached or answers with a non-200 status, or the response cannot be
    /// decoded.
    pub async fn query(
        &self,
        query: DataQuery,
        default_range: &RawTimeRange,
        now: DateTime<Utc>,
    ) -> Result<Frame, QueryError> {
        query.validate()?;
        let range = query.time_range.as_ref().unwrap_or(default_range).parse(now)?;
        let prepared = prepare_query(&query, range, &self.settings)?;

        let response = self
            .transport
            .send(self.settings.http_method(), prepared.url)
            .await?;
        if response.status != 200 {
            return Err(QueryError::UpstreamStatus(response.status));
        }

        let label_rows = usize::try_from(prepared.max_lines).unwrap_or(usize::MAX);
        let frame = StreamDecoder::new(self.parser.as_ref(), label_rows)
            .decode_stream(response.body)
            .await?;

        tracing::debug!(ref_id = %prepared.ref_id, records = frame.len(), "Query finished");
        Ok(frame)
    }

    /// Checks the backend health endpoint.
    pub async fn check_health(&self) -> CheckHealthResult {
        let Ok(url) = endpoint_url(&self.settings.url, &[HEALTH_PATH]) else {
            return CheckHealthResult::error("could not create request");
        };

        match self.transport.send("GET", url).await {
            Ok(response) if response.status == 200 => {
                CheckHealthResult::ok("Data source is working")
            }
            Ok(response) => {
                CheckHealthResult::error(format!("got response code {}", response.status))
            }
            Err(e) => {
                tracing::error!(error = %e, "Health check request failed");
                CheckHealthResult::error("request error")
            }
        }
    }
}

impl Drop for Datasource {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
