//! Lookup structures built from full listings.
//!
//! Both maps are built once per run and only read afterwards, so workers
//! share them without locking.

use super::provenance::{replicated_internal_id, ProvenanceId};
use crate::model::Replicable;
use std::collections::HashMap;

/// Source asset id -> destination asset id.
pub type RelationMap = HashMap<i64, i64>;

/// Source internal id -> the destination record replicated from it.
#[derive(Debug, Clone)]
pub struct IdentityMap<R> {
    by_source: HashMap<i64, R>,
}

impl<R> Default for IdentityMap<R> {
    fn default() -> Self {
        Self {
            by_source: HashMap::new(),
        }
    }
}

impl<R: Replicable> IdentityMap<R> {
    /// Index a destination listing by provenance id.
    ///
    /// Records without an id or without a parsable `_replicatedInternalId`
    /// are treated as destination-original and left out. If two records claim
    /// the same source id, the later one in listing order wins.
    pub fn build(destination: &[R]) -> Self {
        let mut by_source = HashMap::with_capacity(destination.len());

        for record in destination {
            if record.id().is_none() {
                continue;
            }
            match replicated_internal_id(record.metadata()) {
                ProvenanceId::Id(source_id) => {
                    if let Some(previous) = by_source.insert(source_id, record.clone()) {
                        tracing::warn!(
                            source_id,
                            previous = ?previous.id(),
                            current = ?record.id(),
                            "Two destination records claim the same source record; keeping the later one"
                        );
                    }
                }
                ProvenanceId::Malformed(raw) => {
                    tracing::warn!(
                        destination_id = ?record.id(),
                        value = %raw,
                        "Skipping record with malformed provenance id"
                    );
                }
                ProvenanceId::Absent => {}
            }
        }

        Self { by_source }
    }

    pub fn get(&self, source_id: i64) -> Option<&R> {
        self.by_source.get(&source_id)
    }

    /// Match for a source record, looked up by its internal id.
    pub fn matched(&self, source: &R) -> Option<&R> {
        source.id().and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }
}

/// Map source-side ids to destination-side ids for every destination record
/// with valid provenance.
pub fn existing_mapping<'a, R, I>(destination: I) -> RelationMap
where
    R: Replicable,
    I: IntoIterator<Item = &'a R>,
{
    destination
        .into_iter()
        .filter_map(|record| {
            let destination_id = record.id()?;
            let source_id = replicated_internal_id(record.metadata()).id()?;
            Some((source_id, destination_id))
        })
        .collect()
}

/// Translate source ids through `map`. Missing or unmapped ids come back as
/// `None`; an unresolved parent is not an error.
pub fn translate_ids(source_ids: &[Option<i64>], map: &RelationMap) -> Vec<Option<i64>> {
    source_ids
        .iter()
        .map(|id| id.and_then(|id| map.get(&id).copied()))
        .collect()
}
