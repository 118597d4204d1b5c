//! Push a reconciled batch to the destination store.

use super::reconcile::Reconciliation;
use super::retry::RetryPolicy;
use crate::error::Result;
use crate::model::RecordKind;
use crate::store::RecordSink;

/// Records written by one apply call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyCounts {
    pub created: usize,
    pub updated: usize,
}

/// Issue one bulk create and one bulk update for `batch`, each wrapped in
/// `retry`. Empty lists are skipped. A failed create aborts before the
/// update is attempted.
pub async fn apply<K, D>(
    destination: &D,
    batch: Reconciliation<K>,
    retry: &RetryPolicy,
) -> Result<ApplyCounts>
where
    K: RecordKind,
    D: RecordSink<K> + ?Sized,
{
    let mut counts = ApplyCounts::default();
    let Reconciliation {
        to_create,
        to_update,
        ..
    } = batch;

    if !to_create.is_empty() {
        tracing::info!("Creating {} {}.", to_create.len(), K::LABEL);
        let created = retry
            .run("create", || destination.create(to_create.clone()))
            .await?;
        tracing::info!("Successfully created {} {}.", created.len(), K::LABEL);
        counts.created = created.len();
    }

    if !to_update.is_empty() {
        tracing::info!("Updating {} {}.", to_update.len(), K::LABEL);
        let updated = retry
            .run("update", || destination.update(to_update.clone()))
            .await?;
        tracing::info!("Successfully updated {} {}.", updated.len(), K::LABEL);
        counts.updated = updated.len();
    }

    Ok(counts)
}
