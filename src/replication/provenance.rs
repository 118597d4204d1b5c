//! Provenance metadata written onto every replicated record.
//!
//! A destination record carries all three reserved keys exactly when this
//! engine created or last updated it. Presence is checked by key, never by
//! value: an empty `_replicatedSource` still marks a replica, and an id of
//! `"0"` is a valid id.

use crate::model::{Metadata, Replicable};

/// Project the record was replicated from.
pub const REPLICATED_SOURCE: &str = "_replicatedSource";
/// Run timestamp in milliseconds since epoch.
pub const REPLICATED_TIME: &str = "_replicatedTime";
/// Internal id of the source record.
pub const REPLICATED_INTERNAL_ID: &str = "_replicatedInternalId";

/// Result of reading `_replicatedInternalId` off a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvenanceId {
    Absent,
    /// Key present but the value is not an integer.
    Malformed(String),
    Id(i64),
}

impl ProvenanceId {
    pub fn id(&self) -> Option<i64> {
        match self {
            ProvenanceId::Id(id) => Some(*id),
            _ => None,
        }
    }
}

/// Copy of `base` with source and time keys overwritten.
///
/// The internal id key is left to the caller since it needs the source
/// record; see [`new_metadata`].
pub fn stamp(base: Option<&Metadata>, project_source: &str, run_timestamp: i64) -> Metadata {
    let mut metadata = base.cloned().unwrap_or_default();
    metadata.insert(REPLICATED_SOURCE.to_string(), project_source.to_string());
    metadata.insert(REPLICATED_TIME.to_string(), run_timestamp.to_string());
    metadata
}

/// Metadata for the replica of `source`: its own metadata plus all three
/// provenance keys.
pub fn new_metadata<R: Replicable>(source: &R, project_source: &str, run_timestamp: i64) -> Metadata {
    let mut metadata = stamp(source.metadata(), project_source, run_timestamp);
    match source.id() {
        Some(id) => {
            metadata.insert(REPLICATED_INTERNAL_ID.to_string(), id.to_string());
        }
        // Listed records always carry an id; a stale key copied from the
        // source's own metadata must not survive either way.
        None => {
            metadata.remove(REPLICATED_INTERNAL_ID);
        }
    }
    metadata
}

pub fn replicated_internal_id(metadata: Option<&Metadata>) -> ProvenanceId {
    match metadata.and_then(|m| m.get(REPLICATED_INTERNAL_ID)) {
        None => ProvenanceId::Absent,
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(id) => ProvenanceId::Id(id),
            Err(_) => ProvenanceId::Malformed(raw.clone()),
        },
    }
}

/// Whether the record was written by a replication run.
pub fn is_replicated(metadata: Option<&Metadata>) -> bool {
    metadata.is_some_and(|m| m.contains_key(REPLICATED_SOURCE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeSeries;

    #[test]
    fn test_stamp_overwrites_reserved_keys() {
        let mut base = Metadata::new();
        base.insert("unit_system".into(), "SI".into());
        base.insert(REPLICATED_SOURCE.into(), "old-project".into());
        base.insert(REPLICATED_TIME.into(), "1".into());

        let stamped = stamp(Some(&base), "new-project", 1_700_000_000_000);

        assert_eq!(stamped["unit_system"], "SI");
        assert_eq!(stamped[REPLICATED_SOURCE], "new-project");
        assert_eq!(stamped[REPLICATED_TIME], "1700000000000");
        // Base left untouched
        assert_eq!(base[REPLICATED_SOURCE], "old-project");
    }

    #[test]
    fn test_stamp_without_base() {
        let stamped = stamp(None, "src", 5);
        assert_eq!(stamped.len(), 2);
    }

    #[test]
    fn test_new_metadata_round_trips_internal_id() {
        let source = TimeSeries {
            id: Some(42),
            name: Some("pressure".into()),
            ..Default::default()
        };
        let metadata = new_metadata(&source, "src", 1000);
        assert_eq!(
            replicated_internal_id(Some(&metadata)),
            ProvenanceId::Id(42)
        );
        assert!(is_replicated(Some(&metadata)));
    }

    #[test]
    fn test_new_metadata_replaces_copied_internal_id() {
        let mut own = Metadata::new();
        own.insert(REPLICATED_INTERNAL_ID.into(), "7".into());
        let source = TimeSeries {
            id: Some(8),
            metadata: Some(own),
            ..Default::default()
        };
        let metadata = new_metadata(&source, "src", 1000);
        assert_eq!(metadata[REPLICATED_INTERNAL_ID], "8");
    }

    #[test]
    fn test_replicated_internal_id_presence() {
        assert_eq!(replicated_internal_id(None), ProvenanceId::Absent);
        assert_eq!(
            replicated_internal_id(Some(&Metadata::new())),
            ProvenanceId::Absent
        );

        let mut metadata = Metadata::new();
        metadata.insert(REPLICATED_INTERNAL_ID.into(), "0".into());
        assert_eq!(replicated_internal_id(Some(&metadata)), ProvenanceId::Id(0));

        metadata.insert(REPLICATED_INTERNAL_ID.into(), "".into());
        assert_eq!(
            replicated_internal_id(Some(&metadata)),
            ProvenanceId::Malformed(String::new())
        );

        metadata.insert(REPLICATED_INTERNAL_ID.into(), "abc".into());
        assert_eq!(
            replicated_internal_id(Some(&metadata)).id(),
            None
        );
    }

    #[test]
    fn test_is_replicated_checks_key_not_value() {
        let mut metadata = Metadata::new();
        assert!(!is_replicated(Some(&metadata)));
        metadata.insert(REPLICATED_SOURCE.into(), String::new());
        assert!(is_replicated(Some(&metadata)));
        assert!(!is_replicated(None));
    }
}
