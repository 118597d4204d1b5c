//! Time series records and their field mapping between projects.

use super::{Materialize, Metadata, RecordKind, Replicable, TransformContext};
use crate::replication::identity::translate_ids;
use crate::replication::provenance::new_metadata;
use serde::{Deserialize, Serialize};

/// A time series as listed from a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_string: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<i64>,
    #[serde(default)]
    pub is_step: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_categories: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_name: Option<String>,
}

impl Replicable for TimeSeries {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}

/// Create request body for one time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesMaterial {
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub is_string: bool,
    pub metadata: Metadata,
    pub unit: Option<String>,
    pub asset_id: Option<i64>,
    pub is_step: bool,
    pub description: Option<String>,
    pub security_categories: Option<Vec<i64>>,
    pub legacy_name: Option<String>,
}

/// Update request body. Every field is written; `None` clears the field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPatch {
    pub id: i64,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub is_string: bool,
    pub metadata: Metadata,
    pub unit: Option<String>,
    pub asset_id: Option<i64>,
    pub is_step: bool,
    pub description: Option<String>,
    pub security_categories: Option<Vec<i64>>,
}

/// Field mapping for time series.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSeriesKind;

/// Destination asset for a source time series' asset, if that asset was
/// replicated already.
fn linked_asset(source: &TimeSeries, ctx: &TransformContext<'_>) -> Option<i64> {
    source.asset_id?;
    translate_ids(&[source.asset_id], ctx.relations)
        .into_iter()
        .next()
        .flatten()
}

impl RecordKind for TimeSeriesKind {
    type Record = TimeSeries;
    type Material = TimeSeriesMaterial;
    type Patch = TimeSeriesPatch;

    const LABEL: &'static str = "time series";

    fn create(source: &TimeSeries, ctx: &TransformContext<'_>) -> TimeSeriesMaterial {
        tracing::debug!(
            source_id = ?source.id,
            "Creating a new time series based on source time series"
        );

        TimeSeriesMaterial {
            external_id: source.external_id.clone(),
            name: source.name.clone(),
            is_string: source.is_string,
            metadata: new_metadata(source, ctx.project_source, ctx.run_timestamp),
            unit: source.unit.clone(),
            asset_id: linked_asset(source, ctx),
            is_step: source.is_step,
            description: source.description.clone(),
            security_categories: source.security_categories.clone(),
            legacy_name: source.external_id.clone(),
        }
    }

    fn update(
        source: &TimeSeries,
        matched: &TimeSeries,
        ctx: &TransformContext<'_>,
    ) -> TimeSeriesPatch {
        let id = matched.id.unwrap_or_default();
        tracing::debug!(
            destination_id = id,
            source_id = ?source.id,
            "Updating existing time series based on source time series"
        );

        TimeSeriesPatch {
            id,
            external_id: source.external_id.clone(),
            name: source.name.clone(),
            is_string: source.is_string,
            metadata: new_metadata(source, ctx.project_source, ctx.run_timestamp),
            unit: source.unit.clone(),
            asset_id: linked_asset(source, ctx),
            is_step: source.is_step,
            description: source.description.clone(),
            security_categories: source.security_categories.clone(),
        }
    }
}

impl Materialize for TimeSeriesKind {
    fn materialize(material: TimeSeriesMaterial, id: i64) -> TimeSeries {
        TimeSeries {
            id: Some(id),
            external_id: material.external_id,
            name: material.name,
            is_string: material.is_string,
            metadata: Some(material.metadata),
            unit: material.unit,
            asset_id: material.asset_id,
            is_step: material.is_step,
            description: material.description,
            security_categories: material.security_categories,
            legacy_name: material.legacy_name,
        }
    }

    fn patch_target(patch: &TimeSeriesPatch) -> i64 {
        patch.id
    }

    fn apply_patch(record: &mut TimeSeries, patch: TimeSeriesPatch) {
        record.external_id = patch.external_id;
        record.name = patch.name;
        record.is_string = patch.is_string;
        record.metadata = Some(patch.metadata);
        record.unit = patch.unit;
        record.asset_id = patch.asset_id;
        record.is_step = patch.is_step;
        record.description = patch.description;
        record.security_categories = patch.security_categories;
    }
}

/// Drop source time series whose name contains any of `patterns`
/// (service account metrics, by default). Unnamed series are kept.
pub fn filter_skipped<R: Replicable>(source: Vec<R>, patterns: &[String]) -> Vec<R> {
    source
        .into_iter()
        .filter(|record| match record.name() {
            Some(name) => !patterns.iter().any(|p| name.contains(p.as_str())),
            None => true,
        })
        .collect()
}
