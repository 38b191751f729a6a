//! Query facade: validate, partition, dispatch every batch concurrently and
//! hand back per-batch outcomes in partition order.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::client::ResilientClient;
use crate::error::{ClientFailure, CurveStoreError};
use crate::http_client::HttpMethod;
use crate::partition::{partition_with, MAX_IDS_PER_QUERY};
use crate::query::{ActualQuery, DerivedQuery, ExtractionQuery, TimeSeriesRow, VersionedQuery};

/// Result of one partitioned call.
#[derive(Debug)]
pub struct PartitionOutcome<R> {
    /// Ids targeted by this batch; `None` for filter-only queries.
    pub ids: Option<Vec<i32>>,
    pub result: Result<Vec<R>, CurveStoreError>,
}

/// Concatenates batch rows in partition order, failing on the first failed
/// batch. No reordering or deduplication is applied.
pub fn merge<R>(outcomes: Vec<PartitionOutcome<R>>) -> Result<Vec<R>, CurveStoreError> {
    let mut rows = Vec::new();
    for outcome in outcomes {
        rows.extend(outcome.result?);
    }
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct QueryService {
    client: Arc<ResilientClient>,
    batch_size: usize,
}

impl QueryService {
    pub fn new(client: Arc<ResilientClient>) -> Self {
        Self {
            client,
            batch_size: MAX_IDS_PER_QUERY,
        }
    }

    /// Overrides the ids-per-call bound for services with a different limit.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// Dispatches every batch of `query` and returns their outcomes in order.
    ///
    /// Local validation failures are returned before anything is sent. Every
    /// batch is its own task, so one slow or failing batch neither blocks nor
    /// fails the others. At most the bulkhead's parallelism of batches is
    /// handed to the client at once; the rest wait here for a free slot
    /// instead of overflowing the bulkhead queue.
    pub async fn extract<Q, R>(
        &self,
        query: &Q,
        cancel: &CancellationToken,
    ) -> Result<Vec<PartitionOutcome<R>>, CurveStoreError>
    where
        Q: ExtractionQuery,
        R: DeserializeOwned + Send + 'static,
    {
        query.validate()?;
        let batches = partition_with(query, self.batch_size)?;

        // Batches still running when the caller goes away are cancelled.
        let scope = cancel.child_token();
        let _guard = scope.clone().drop_guard();

        let in_flight = self.client.config().resilience().bulkhead.max_parallelism.max(1);
        let dispatch = Arc::new(Semaphore::new(in_flight));

        let handles: Vec<_> = batches
            .into_iter()
            .map(|batch| {
                let client = Arc::clone(&self.client);
                let dispatch = Arc::clone(&dispatch);
                let cancel = scope.clone();
                let ids = batch.base().ids.clone();
                let path = batch.relative_url();
                let url = path.clone();
                let handle = tokio::spawn(async move {
                    // The semaphore is never closed; waiters are served FIFO.
                    let _slot = dispatch.acquire_owned().await;
                    client.get::<Vec<R>>(&url, &cancel).await
                });
                (ids, path, handle)
            })
            .collect();

        tracing::debug!(
            batches = handles.len(),
            in_flight,
            "dispatched extraction batches"
        );

        let mut outcomes = Vec::with_capacity(handles.len());
        for (ids, path, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(CurveStoreError::client(
                    HttpMethod::Get,
                    self.client.config().url_for(&path),
                    ClientFailure::Aborted(join_error.to_string()),
                )),
            };
            outcomes.push(PartitionOutcome { ids, result });
        }

        Ok(outcomes)
    }

    /// [`Self::extract`] followed by [`merge`].
    pub async fn extract_all<Q, R>(
        &self,
        query: &Q,
        cancel: &CancellationToken,
    ) -> Result<Vec<R>, CurveStoreError>
    where
        Q: ExtractionQuery,
        R: DeserializeOwned + Send + 'static,
    {
        merge(self.extract(query, cancel).await?)
    }

    pub async fn actual(
        &self,
        query: &ActualQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<TimeSeriesRow>, CurveStoreError> {
        self.extract_all(query, cancel).await
    }

    pub async fn versioned(
        &self,
        query: &VersionedQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<TimeSeriesRow>, CurveStoreError> {
        self.extract_all(query, cancel).await
    }

    pub async fn derived(
        &self,
        query: &DerivedQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<TimeSeriesRow>, CurveStoreError> {
        self.extract_all(query, cancel).await
    }
}
