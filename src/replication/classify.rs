//! Per-record create/update decision.

use crate::model::{RecordKind, Replicable, TransformContext};

/// What to do with one source record.
#[derive(Debug, Clone)]
pub enum Classification<K: RecordKind> {
    ToCreate(K::Material),
    ToUpdate {
        destination_id: i64,
        patch: K::Patch,
    },
    Unchanged,
}

/// Decide create vs update for `source`.
///
/// Matched records are always updated, never diffed: rewriting identical
/// values is harmless and keeps `_replicatedTime` advancing on every run.
/// A match without a destination id cannot be addressed by an update and
/// is left alone.
pub fn classify<K: RecordKind>(
    source: &K::Record,
    matched: Option<&K::Record>,
    ctx: &TransformContext<'_>,
) -> Classification<K> {
    match matched {
        None => Classification::ToCreate(K::create(source, ctx)),
        Some(destination) => match destination.id() {
            Some(destination_id) => Classification::ToUpdate {
                destination_id,
                patch: K::update(source, destination, ctx),
            },
            None => Classification::Unchanged,
        },
    }
}
