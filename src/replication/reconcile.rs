//! Partition a batch of source records into creates and updates.

use super::classify::{classify, Classification};
use super::identity::IdentityMap;
use crate::model::{RecordKind, Replicable, TransformContext};

/// Output of one reconciliation pass. Order within each list follows the
/// input order.
#[derive(Debug, Clone)]
pub struct Reconciliation<K: RecordKind> {
    pub to_create: Vec<K::Material>,
    pub to_update: Vec<K::Patch>,
    pub unchanged: usize,
}

impl<K: RecordKind> Default for Reconciliation<K> {
    fn default() -> Self {
        Self {
            to_create: Vec::new(),
            to_update: Vec::new(),
            unchanged: 0,
        }
    }
}

impl<K: RecordKind> Reconciliation<K> {
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.unchanged
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Classify every record in `source` against `identity`. No I/O, inputs are
/// not modified.
pub fn reconcile<K: RecordKind>(
    source: &[K::Record],
    identity: &IdentityMap<K::Record>,
    ctx: &TransformContext<'_>,
) -> Reconciliation<K> {
    let mut out = Reconciliation::default();

    for record in source {
        match classify::<K>(record, identity.matched(record), ctx) {
            Classification::ToCreate(material) => out.to_create.push(material),
            Classification::ToUpdate { patch, .. } => out.to_update.push(patch),
            Classification::Unchanged => out.unchanged += 1,
        }
    }

    out
}
