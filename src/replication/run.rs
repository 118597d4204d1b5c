//! One full replication run.
//!
//! List both sides, index the destination by provenance, filter the source,
//! create/update in chunks across the worker pool, then run the opted-in
//! cleanup sweeps.

use super::apply::apply;
use super::distribute::distribute;
use super::gc::{list_all, remove_not_replicated_in_dst, remove_replicated_if_not_in_src};
use super::identity::{existing_mapping, IdentityMap, RelationMap};
use super::reconcile::reconcile;
use super::retry::RetryPolicy;
use crate::error::{ReplicationError, Result};
use crate::model::time_series::filter_skipped;
use crate::model::{Asset, RecordKind, Replicable, TimeSeries, TimeSeriesKind, TransformContext};
use crate::store::{RecordSink, RecordSource};
use serde::Serialize;
use std::time::Instant;

/// Knobs for a run.
#[derive(Debug, Clone)]
pub struct ReplicateOptions {
    /// Largest number of records sent in one create or update call.
    pub batch_size: usize,
    pub num_workers: usize,
    /// Delete replicas whose source record is gone.
    pub delete_replicated_if_not_in_src: bool,
    /// Delete destination records that were not replicated.
    pub delete_not_replicated_in_dst: bool,
    pub retry: RetryPolicy,
    /// Source records whose name contains one of these are not replicated.
    pub skip_name_patterns: Vec<String>,
    /// Fixed run timestamp (ms since epoch). Taken from the clock when unset.
    pub run_timestamp: Option<i64>,
}

impl Default for ReplicateOptions {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            num_workers: 1,
            delete_replicated_if_not_in_src: false,
            delete_not_replicated_in_dst: false,
            retry: RetryPolicy::default(),
            skip_name_patterns: vec!["service_account_metrics".to_string()],
            run_timestamp: None,
        }
    }
}

/// A chunk whose writes could not be applied.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    pub chunk: usize,
    /// Source ids in the chunk, for manual follow-up.
    pub source_ids: Vec<i64>,
    pub error: String,
}

/// What a run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplicationReport {
    pub project_source: String,
    pub project_destination: String,
    pub run_timestamp: i64,
    pub source_count: usize,
    pub destination_count: usize,
    /// Source records left out by the name filter.
    pub filtered: usize,
    pub chunks: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed_chunks: Vec<ChunkFailure>,
    pub deleted_stale: Vec<i64>,
    pub deleted_unreplicated: Vec<i64>,
    /// Cleanup sweeps that failed.
    pub cleanup_errors: Vec<String>,
    pub duration_ms: u64,
}

impl ReplicationReport {
    /// True when some intended change was not applied.
    pub fn is_partial(&self) -> bool {
        !self.failed_chunks.is_empty() || !self.cleanup_errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ChunkSummary {
    created: usize,
    updated: usize,
    unchanged: usize,
}

/// Capture the run timestamp once: whole seconds, in milliseconds.
pub fn run_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp() * 1000
}

/// Replicate every record from `source` into `destination` for one record
/// kind.
///
/// Listing failures abort the run before anything is written. Write
/// failures are confined to their chunk and show up in
/// [`ReplicationReport::failed_chunks`].
pub async fn replicate_records<K, S, D, F>(
    source: &S,
    destination: &D,
    relations: &RelationMap,
    include: F,
    options: &ReplicateOptions,
) -> Result<ReplicationReport>
where
    K: RecordKind,
    S: RecordSource<K::Record> + ?Sized,
    D: RecordSink<K> + ?Sized,
    F: Fn(Vec<K::Record>) -> Vec<K::Record>,
{
    if options.batch_size == 0 {
        return Err(ReplicationError::Config("batch_size must be at least 1".into()));
    }
    if options.num_workers == 0 {
        return Err(ReplicationError::Config("num_workers must be at least 1".into()));
    }

    let started = Instant::now();
    let project_source = source.project().to_string();
    let project_destination = destination.project().to_string();

    let source_records = list_all::<K::Record, S>(source, "list source").await?;
    let destination_records: Vec<K::Record> =
        list_all(destination, "list destination").await?;
    tracing::info!(
        "There are {} existing {} in source ({}).",
        source_records.len(),
        K::LABEL,
        project_source
    );
    tracing::info!(
        "There are {} existing {} in destination ({}).",
        destination_records.len(),
        K::LABEL,
        project_destination
    );

    let identity = IdentityMap::build(&destination_records);

    let source_count = source_records.len();
    let selected = include(source_records);
    let filtered = source_count - selected.len();
    if filtered > 0 {
        tracing::info!("There are {} {} that will not be copied.", filtered, K::LABEL);
    }

    let run_timestamp = options.run_timestamp.unwrap_or_else(run_timestamp_now);
    tracing::info!(
        "These copied/updated {} will have a replicated run time of: {}.",
        K::LABEL,
        run_timestamp
    );
    tracing::info!(
        "Starting to copy and update {} {} from source ({}) to destination ({}).",
        selected.len(),
        K::LABEL,
        project_source,
        project_destination
    );

    let ctx = TransformContext {
        relations,
        project_source: &project_source,
        run_timestamp,
    };
    let identity = &identity;
    let retry = &options.retry;

    let outcomes = distribute(
        options.num_workers,
        &selected,
        options.batch_size,
        |chunk, records| async move {
            tracing::info!(chunk, "Starting to replicate {} {}.", records.len(), K::LABEL);
            let batch = reconcile::<K>(records, identity, &ctx);
            tracing::info!(
                chunk,
                "Creating {} new {} and updating {} existing {}.",
                batch.to_create.len(),
                K::LABEL,
                batch.to_update.len(),
                K::LABEL
            );
            let unchanged = batch.unchanged;
            let counts = apply(destination, batch, retry).await?;
            Ok(ChunkSummary {
                created: counts.created,
                updated: counts.updated,
                unchanged,
            })
        },
    )
    .await;

    let mut report = ReplicationReport {
        project_source: project_source.clone(),
        project_destination: project_destination.clone(),
        run_timestamp,
        source_count,
        destination_count: destination_records.len(),
        filtered,
        chunks: outcomes.len(),
        ..Default::default()
    };

    for outcome in outcomes {
        match outcome.result {
            Ok(summary) => {
                report.created += summary.created;
                report.updated += summary.updated;
                report.unchanged += summary.unchanged;
            }
            Err(err) => {
                let source_ids: Vec<i64> = selected[outcome.range]
                    .iter()
                    .filter_map(Replicable::id)
                    .collect();
                tracing::error!(
                    chunk = outcome.index,
                    source_ids = ?source_ids,
                    error = %err,
                    "Failed to replicate chunk"
                );
                report.failed_chunks.push(ChunkFailure {
                    chunk: outcome.index,
                    source_ids,
                    error: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "Finished copying and updating {} {} from source ({}) to destination ({}).",
        selected.len(),
        K::LABEL,
        project_source,
        project_destination
    );

    if options.delete_replicated_if_not_in_src {
        match remove_replicated_if_not_in_src::<K, S, D>(source, destination, retry).await {
            Ok(deleted) => {
                tracing::info!(
                    "Deleted {} {} in destination ({}) because they were no longer in source ({}).",
                    deleted.len(),
                    K::LABEL,
                    project_destination,
                    project_source
                );
                report.deleted_stale = deleted;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to delete stale replicas");
                report.cleanup_errors.push(format!("stale replicas: {}", err));
            }
        }
    }

    if options.delete_not_replicated_in_dst {
        match remove_not_replicated_in_dst::<K, D>(destination, retry).await {
            Ok(deleted) => {
                tracing::info!(
                    "Deleted {} {} in destination ({}) because they were not replicated from source ({}).",
                    deleted.len(),
                    K::LABEL,
                    project_destination,
                    project_source
                );
                report.deleted_unreplicated = deleted;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to delete unreplicated records");
                report
                    .cleanup_errors
                    .push(format!("unreplicated records: {}", err));
            }
        }
    }

    report.duration_ms = started.elapsed().as_millis() as u64;
    Ok(report)
}

/// Replicate time series, linking each to its replicated asset.
///
/// The relation map comes from the destination's asset listing, so assets
/// must be replicated before time series for links to resolve.
pub async fn replicate_time_series<S, D, A>(
    source: &S,
    destination: &D,
    destination_assets: &A,
    options: &ReplicateOptions,
) -> Result<ReplicationReport>
where
    S: RecordSource<TimeSeries> + ?Sized,
    D: RecordSink<TimeSeriesKind> + ?Sized,
    A: RecordSource<Asset> + ?Sized,
{
    let assets = list_all::<Asset, A>(destination_assets, "list destination assets").await?;
    let relations = existing_mapping(&assets);
    tracing::info!(
        "If a time series asset id is one of the {} assets that have been replicated then it will be linked.",
        relations.len()
    );

    let patterns = options.skip_name_patterns.clone();
    replicate_records::<TimeSeriesKind, S, D, _>(
        source,
        destination,
        &relations,
        move |records| filter_skipped(records, &patterns),
        options,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Operation};

    fn numbered(count: i64) -> Vec<TimeSeries> {
        (1..=count)
            .map(|id| TimeSeries {
                id: Some(id),
                name: Some(format!("ts-{}", id)),
                ..Default::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_rejects_zero_batch_size() {
        let source = MemoryStore::with_records("src", numbered(1), |_, _| {});
        let destination: MemoryStore<TimeSeries> = MemoryStore::new("dst");
        let assets: MemoryStore<Asset> = MemoryStore::new("dst");
        let options = ReplicateOptions {
            batch_size: 0,
            ..Default::default()
        };

        let result = replicate_time_series(&source, &destination, &assets, &options).await;
        assert!(matches!(result, Err(ReplicationError::Config(_))));
    }

    #[tokio::test]
    async fn test_chunked_run_uses_batch_size() {
        let source = MemoryStore::with_records("src", numbered(250), |_, _| {});
        let destination: MemoryStore<TimeSeries> = MemoryStore::new("dst");
        let assets: MemoryStore<Asset> = MemoryStore::new("dst");
        let options = ReplicateOptions {
            batch_size: 100,
            num_workers: 3,
            retry: RetryPolicy::immediate(3),
            ..Default::default()
        };

        let report = replicate_time_series(&source, &destination, &assets, &options)
            .await
            .unwrap();

        assert_eq!(report.chunks, 3);
        assert_eq!(report.created, 250);
        let mut sizes = destination.call_sizes(Operation::Create);
        sizes.sort_unstable();
        assert_eq!(sizes, vec![50, 100, 100]);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts() {
        let source = MemoryStore::with_records("src", numbered(3), |_, _| {});
        source.inject_failures(
            Operation::List,
            [crate::error::StoreError::transient(503, "down")],
        );
        let destination: MemoryStore<TimeSeries> = MemoryStore::new("dst");
        let assets: MemoryStore<Asset> = MemoryStore::new("dst");

        let result =
            replicate_time_series(&source, &destination, &assets, &ReplicateOptions::default())
                .await;

        assert!(matches!(
            result,
            Err(ReplicationError::Store {
                operation: "list source",
                ..
            })
        ));
        assert!(destination.is_empty());
    }
}
