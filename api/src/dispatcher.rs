//! Concurrent fan-out of a query batch.
//!
//! Each query runs in its own task. A query that fails, panics or is
//! cancelled only affects its own entry in the result map.

use crate::error::QueryError;
use crate::response::{DataResponse, QueryDataResponse};
use shared::frame::Frame;
use std::collections::HashMap;
use std::future::Future;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Runs every query concurrently and collects the results by key.
///
/// `queries` pairs each query with the key its result is reported under,
/// normally its `refId`. `run` is called once per query. When `token` is
/// cancelled, queries still in flight are dropped and reported as
/// [`QueryError::Cancelled`].
///
/// # Example
///
/// ```
/// use api::dispatch;
/// use shared::frame::Frame;
/// use shared::query::DataQuery;
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let queries = vec![DataQuery::new("A", "x"), DataQuery::new("B", "y")]
///     .into_iter()
///     .map(|query| (query.ref_id.clone(), query));
/// let response = dispatch(queries, &CancellationToken::new(), |_query| async {
///     Ok(Frame::default())
/// })
/// .await;
///
/// assert_eq!(response.results.len(), 2);
/// assert!(response.results["B"].is_ok());
/// # });
/// ```
pub async fn dispatch<Q, I, F, Fut>(
    queries: I,
    token: &CancellationToken,
    run: F,
) -> QueryDataResponse
where
    I: IntoIterator<Item = (String, Q)>,
    F: Fn(Q) -> Fut,
    Fut: Future<Output = Result<Frame, QueryError>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    let mut ref_ids = HashMap::new();

    for (ref_id, query) in queries {
        let token = token.clone();
        let execution = run(query);
        let handle = tasks.spawn(async move {
            tokio::select! {
                () = token.cancelled() => Err(QueryError::Cancelled),
                result = execution => result,
            }
        });
        ref_ids.insert(handle.id(), ref_id);
    }
    tracing::debug!(queries = ref_ids.len(), "Dispatched query batch");

    let mut response = QueryDataResponse::default();
    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(e) => (e.id(), Err(QueryError::Internal(e.to_string()))),
        };
        let Some(ref_id) = ref_ids.remove(&id) else {
            continue;
        };
        if let Err(e) = &result {
            tracing::error!(ref_id = %ref_id, error = %e, "Query failed");
        }
        response.results.insert(ref_id, DataResponse::from(result));
    }

    tracing::debug!(results = response.results.len(), "Query batch finished");
    response
}
