//! Destination cleanup sweeps.
//!
//! Both sweeps work from fresh full listings and end in one bulk delete.
//! Neither runs unless the caller opts in: they delete data.

use super::provenance::{is_replicated, replicated_internal_id, ProvenanceId};
use super::retry::RetryPolicy;
use crate::error::{ReplicationError, Result};
use crate::model::{RecordKind, Replicable};
use crate::store::{RecordSink, RecordSource};
use std::collections::HashSet;

/// Destination ids of records that carry no `_replicatedSource` key.
pub fn unreplicated_ids<R: Replicable>(destination: &[R]) -> Vec<i64> {
    destination
        .iter()
        .filter(|record| !is_replicated(record.metadata()))
        .filter_map(Replicable::id)
        .collect()
}

/// Destination ids of replicas whose source record is gone.
///
/// Records with a malformed provenance id are skipped, never deleted.
pub fn stale_ids<R: Replicable>(source_ids: &HashSet<i64>, destination: &[R]) -> Vec<i64> {
    destination
        .iter()
        .filter_map(|record| {
            let destination_id = record.id()?;
            match replicated_internal_id(record.metadata()) {
                ProvenanceId::Id(source_id) if !source_ids.contains(&source_id) => {
                    Some(destination_id)
                }
                ProvenanceId::Malformed(raw) => {
                    tracing::warn!(
                        destination_id,
                        value = %raw,
                        "Not deleting record with malformed provenance id"
                    );
                    None
                }
                _ => None,
            }
        })
        .collect()
}

/// Delete every destination record that was not written by replication.
pub async fn remove_not_replicated_in_dst<K, D>(
    destination: &D,
    retry: &RetryPolicy,
) -> Result<Vec<i64>>
where
    K: RecordKind,
    D: RecordSink<K> + ?Sized,
{
    let listing: Vec<K::Record> = list_all(destination, "list destination").await?;
    let doomed = unreplicated_ids(&listing);
    delete_all::<K, D>(destination, &doomed, retry).await?;
    Ok(doomed)
}

/// Delete every replica whose source record no longer exists.
pub async fn remove_replicated_if_not_in_src<K, S, D>(
    source: &S,
    destination: &D,
    retry: &RetryPolicy,
) -> Result<Vec<i64>>
where
    K: RecordKind,
    S: RecordSource<K::Record> + ?Sized,
    D: RecordSink<K> + ?Sized,
{
    let source_ids: HashSet<i64> = list_all::<K::Record, S>(source, "list source")
        .await?
        .iter()
        .filter_map(Replicable::id)
        .collect();
    let listing: Vec<K::Record> = list_all(destination, "list destination").await?;

    let doomed = stale_ids(&source_ids, &listing);
    delete_all::<K, D>(destination, &doomed, retry).await?;
    Ok(doomed)
}

/// Full listing, with a failure tagged by `operation`.
pub(super) async fn list_all<R, S>(store: &S, operation: &'static str) -> Result<Vec<R>>
where
    R: Replicable,
    S: RecordSource<R> + ?Sized,
{
    store
        .list()
        .await
        .map_err(|source| ReplicationError::Store { operation, source })
}

async fn delete_all<K, D>(destination: &D, ids: &[i64], retry: &RetryPolicy) -> Result<()>
where
    K: RecordKind,
    D: RecordSink<K> + ?Sized,
{
    if ids.is_empty() {
        return Ok(());
    }
    retry
        .run("delete", || destination.delete(ids.to_vec()))
        .await
}
