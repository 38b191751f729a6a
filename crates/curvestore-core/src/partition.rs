//! Splits a query over many curve ids into server-sized batches.
//!
//! Children are clones of the parent with only `ids` replaced, produced in the
//! order of the parent's ids, so per-batch results can be concatenated back in
//! request order without extra bookkeeping.

use crate::query::ExtractionQuery;
use crate::ValidationError;

/// Largest id list the curve-store service accepts per extraction call.
pub const MAX_IDS_PER_QUERY: usize = 25;

/// Partitions `query` into batches of at most [`MAX_IDS_PER_QUERY`] ids.
pub fn partition<Q: ExtractionQuery>(query: &Q) -> Result<Vec<Q>, ValidationError> {
    partition_with(query, MAX_IDS_PER_QUERY)
}

/// Partitions `query` into batches of at most `batch_size` ids.
///
/// Filter-only queries (no `ids`) come back as a single unchanged query. A
/// present but empty id list is rejected rather than silently dropped.
pub fn partition_with<Q: ExtractionQuery>(
    query: &Q,
    batch_size: usize,
) -> Result<Vec<Q>, ValidationError> {
    if batch_size == 0 {
        return Err(ValidationError::ZeroBatchSize);
    }

    let Some(ids) = query.base().ids.as_deref() else {
        return Ok(vec![query.clone()]);
    };
    if ids.is_empty() {
        return Err(ValidationError::EmptyIds);
    }

    let children: Vec<Q> = ids
        .chunks(batch_size)
        .map(|bucket| query.with_ids(bucket.to_vec()))
        .collect();

    tracing::debug!(
        ids = ids.len(),
        batches = children.len(),
        batch_size,
        "partitioned extraction query"
    );

    Ok(children)
}
