//! End-to-end runs against in-memory projects.

use std::collections::BTreeMap;
use ts_replicator::error::StoreError;
use ts_replicator::model::{Asset, Metadata, TimeSeries};
use ts_replicator::replication::{
    replicate_time_series, replicated_internal_id, ProvenanceId, ReplicateOptions, RetryPolicy,
    REPLICATED_INTERNAL_ID, REPLICATED_SOURCE, REPLICATED_TIME,
};
use ts_replicator::store::{MemoryStore, Operation};

fn series(id: i64, name: &str, asset_id: Option<i64>) -> TimeSeries {
    TimeSeries {
        id: Some(id),
        external_id: Some(format!("ext-{}", id)),
        name: Some(name.to_string()),
        unit: Some("m3/h".to_string()),
        asset_id,
        ..Default::default()
    }
}

fn source_project(records: Vec<TimeSeries>) -> MemoryStore<TimeSeries> {
    MemoryStore::with_records("plant-src", records, |ts, id| ts.id = Some(id))
}

fn empty_destination() -> (MemoryStore<TimeSeries>, MemoryStore<Asset>) {
    (MemoryStore::new("plant-dst"), MemoryStore::new("plant-dst"))
}

fn options(run_timestamp: i64) -> ReplicateOptions {
    ReplicateOptions {
        batch_size: 2,
        num_workers: 2,
        retry: RetryPolicy::immediate(3),
        run_timestamp: Some(run_timestamp),
        ..Default::default()
    }
}

/// Destination contents keyed by provenance id, with the run time removed.
fn stable_view(store: &MemoryStore<TimeSeries>) -> BTreeMap<i64, TimeSeries> {
    store
        .records()
        .into_iter()
        .map(|mut ts| {
            let source_id = replicated_internal_id(ts.metadata.as_ref()).id().unwrap();
            if let Some(metadata) = ts.metadata.as_mut() {
                metadata.remove(REPLICATED_TIME);
            }
            (source_id, ts)
        })
        .collect()
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let source = source_project(vec![
        series(1, "flow", None),
        series(2, "level", None),
        series(3, "temperature", None),
    ]);
    let (destination, assets) = empty_destination();

    let first = replicate_time_series(&source, &destination, &assets, &options(1_000))
        .await
        .unwrap();
    assert_eq!((first.created, first.updated), (3, 0));
    let after_first = stable_view(&destination);

    let second = replicate_time_series(&source, &destination, &assets, &options(2_000))
        .await
        .unwrap();
    assert_eq!((second.created, second.updated), (0, 3));

    assert_eq!(destination.len(), 3);
    assert_eq!(stable_view(&destination), after_first);
    for ts in destination.records() {
        assert_eq!(ts.metadata.unwrap()[REPLICATED_TIME], "2000");
    }
}

#[tokio::test]
async fn test_created_records_carry_provenance() {
    let source = source_project(vec![series(42, "pressure", None)]);
    let (destination, assets) = empty_destination();

    replicate_time_series(&source, &destination, &assets, &options(1_000))
        .await
        .unwrap();

    let replica = destination.records().pop().unwrap();
    let metadata = replica.metadata.as_ref().unwrap();
    assert_eq!(
        replicated_internal_id(Some(metadata)),
        ProvenanceId::Id(42)
    );
    assert_eq!(metadata[REPLICATED_SOURCE], "plant-src");
    assert_eq!(metadata[REPLICATED_TIME], "1000");
    assert_eq!(replica.legacy_name.as_deref(), Some("ext-42"));
    assert_ne!(replica.id, Some(42));
}

#[tokio::test]
async fn test_asset_links_are_translated() {
    let mut tagged = Metadata::new();
    tagged.insert(REPLICATED_INTERNAL_ID.to_string(), "7".to_string());
    tagged.insert(REPLICATED_SOURCE.to_string(), "plant-src".to_string());
    let assets = MemoryStore::with_records(
        "plant-dst",
        vec![Asset {
            id: Some(700),
            name: "pump".to_string(),
            metadata: Some(tagged),
            ..Default::default()
        }],
        |a, id| a.id = Some(id),
    );
    let source = source_project(vec![
        series(1, "linked", Some(7)),
        series(2, "unresolved", Some(99)),
        series(3, "orphan", None),
    ]);
    let destination: MemoryStore<TimeSeries> = MemoryStore::new("plant-dst");

    let report = replicate_time_series(&source, &destination, &assets, &options(1_000))
        .await
        .unwrap();
    assert!(!report.is_partial());

    let by_name: BTreeMap<String, Option<i64>> = destination
        .records()
        .into_iter()
        .map(|ts| (ts.name.unwrap(), ts.asset_id))
        .collect();
    assert_eq!(by_name["linked"], Some(700));
    assert_eq!(by_name["unresolved"], None);
    assert_eq!(by_name["orphan"], None);
}

#[tokio::test]
async fn test_service_account_metrics_are_skipped() {
    let source = source_project(vec![
        series(1, "flow", None),
        series(2, "service_account_metrics/requests", None),
    ]);
    let (destination, assets) = empty_destination();

    let report = replicate_time_series(&source, &destination, &assets, &options(1_000))
        .await
        .unwrap();

    assert_eq!(report.filtered, 1);
    assert_eq!(destination.len(), 1);
}

#[tokio::test]
async fn test_failed_chunk_leaves_siblings_applied() {
    let source = source_project((1..=6).map(|id| series(id, "s", None)).collect());
    let (destination, assets) = empty_destination();
    // First create call rejected outright; the other two chunks go through.
    destination.inject_failures(Operation::Create, [StoreError::rejected(400, "bad item")]);

    let opts = ReplicateOptions {
        num_workers: 1,
        ..options(1_000)
    };
    let report = replicate_time_series(&source, &destination, &assets, &opts)
        .await
        .unwrap();

    assert!(report.is_partial());
    assert_eq!(report.chunks, 3);
    assert_eq!(report.created, 4);
    assert_eq!(report.failed_chunks.len(), 1);
    assert_eq!(report.failed_chunks[0].source_ids.len(), 2);
    assert_eq!(destination.len(), 4);

    // A rerun fills in the gap without duplicating anything.
    let rerun = replicate_time_series(&source, &destination, &assets, &options(2_000))
        .await
        .unwrap();
    assert!(!rerun.is_partial());
    assert_eq!((rerun.created, rerun.updated), (2, 4));
    assert_eq!(destination.len(), 6);
}

#[tokio::test]
async fn test_transient_errors_are_retried_within_budget() {
    let source = source_project(vec![series(1, "flow", None)]);
    let (destination, assets) = empty_destination();
    destination.inject_failures(
        Operation::Create,
        [
            StoreError::transient(429, "rate limited"),
            StoreError::transient(503, "unavailable"),
        ],
    );

    let report = replicate_time_series(&source, &destination, &assets, &options(1_000))
        .await
        .unwrap();

    assert!(!report.is_partial());
    assert_eq!(destination.call_sizes(Operation::Create), vec![1, 1, 1]);
    assert_eq!(destination.len(), 1);
}

#[tokio::test]
async fn test_retry_exhaustion_is_reported() {
    let source = source_project(vec![series(1, "flow", None)]);
    let (destination, assets) = empty_destination();
    destination.inject_failures(
        Operation::Create,
        std::iter::repeat(StoreError::transient(503, "unavailable")).take(3),
    );

    let report = replicate_time_series(&source, &destination, &assets, &options(1_000))
        .await
        .unwrap();

    assert_eq!(report.failed_chunks.len(), 1);
    assert!(report.failed_chunks[0].error.contains("3 attempt"));
    assert!(destination.is_empty());
}

#[tokio::test]
async fn test_cleanup_sweeps() {
    let source = source_project(vec![series(1, "flow", None), series(2, "level", None)]);
    let (destination, assets) = empty_destination();
    replicate_time_series(&source, &destination, &assets, &options(1_000))
        .await
        .unwrap();

    // Hand-made record in the destination, and a source record that goes away.
    let handmade = MemoryStore::with_records(
        "plant-dst",
        {
            let mut records = destination.records();
            records.push(TimeSeries {
                name: Some("hand made".to_string()),
                ..Default::default()
            });
            records
        },
        |ts, id| ts.id = Some(id),
    );
    let handmade_id = handmade
        .records()
        .into_iter()
        .find(|ts| ts.metadata.is_none())
        .and_then(|ts| ts.id)
        .unwrap();
    let shrunk = source_project(vec![series(1, "flow", None)]);

    let opts = ReplicateOptions {
        delete_replicated_if_not_in_src: true,
        delete_not_replicated_in_dst: true,
        ..options(2_000)
    };
    let report = replicate_time_series(&shrunk, &handmade, &assets, &opts)
        .await
        .unwrap();

    assert_eq!(report.deleted_stale.len(), 1);
    assert_eq!(report.deleted_unreplicated, vec![handmade_id]);
    let remaining = handmade.records();
    assert_eq!(remaining.len(), 1);
    assert_eq!(
        replicated_internal_id(remaining[0].metadata.as_ref()),
        ProvenanceId::Id(1)
    );
}
