//! Record types that can be replicated, and the seams the engine needs from them.

pub mod asset;
pub mod time_series;

pub use asset::Asset;
pub use time_series::{TimeSeries, TimeSeriesKind, TimeSeriesMaterial, TimeSeriesPatch};

use crate::replication::identity::RelationMap;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Free-form string metadata carried by every record.
pub type Metadata = BTreeMap<String, String>;

/// A record as listed from a store.
pub trait Replicable: Clone + Debug + Send + Sync + 'static {
    /// Internal id, assigned by the owning store.
    fn id(&self) -> Option<i64>;

    fn name(&self) -> Option<&str>;

    fn metadata(&self) -> Option<&Metadata>;
}

/// Inputs shared by every transform call in one run.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub relations: &'a RelationMap,
    pub project_source: &'a str,
    pub run_timestamp: i64,
}

/// Record-type-specific field mapping.
///
/// This is the only place that knows which fields a record type has. The
/// engine calls [`RecordKind::create`] for unmatched source records and
/// [`RecordKind::update`] for matched ones, and hands the results to the
/// destination store untouched.
pub trait RecordKind: Send + Sync + 'static {
    type Record: Replicable;
    /// Body of a create request.
    type Material: Clone + Debug + Send + Sync + 'static;
    /// Body of an update request, keyed by destination id.
    type Patch: Clone + Debug + Send + Sync + 'static;

    /// Plural, human-readable name used in log lines.
    const LABEL: &'static str;

    fn create(source: &Self::Record, ctx: &TransformContext<'_>) -> Self::Material;

    /// Must overwrite every replicated field and rewrite provenance.
    fn update(
        source: &Self::Record,
        matched: &Self::Record,
        ctx: &TransformContext<'_>,
    ) -> Self::Patch;
}

/// Store-side counterpart of [`RecordKind`]: how materials and patches turn
/// into stored records. Needed by stores that keep records themselves.
pub trait Materialize: RecordKind {
    fn materialize(material: Self::Material, id: i64) -> Self::Record;

    fn patch_target(patch: &Self::Patch) -> i64;

    fn apply_patch(record: &mut Self::Record, patch: Self::Patch);
}
