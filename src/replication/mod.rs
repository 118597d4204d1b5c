//! Reconciliation and sync-apply engine.
//!
//! # Architecture
//!
//! ```text
//! list source ----+
//!                 +--> IdentityMap --> reconcile (per chunk) --> apply --+
//! list dest ------+                      ^                               |
//!                                        | distribute (worker pool)      |
//!                                        +-------------------------------+
//!                                                        |
//!                                          gc sweeps (opt-in) <--+
//! ```
//!
//! Every created or updated record is tagged with provenance metadata
//! (`_replicatedSource`, `_replicatedTime`, `_replicatedInternalId`) so
//! later runs can match it and the sweeps can tell replicas from
//! destination-original records.

pub mod apply;
pub mod classify;
pub mod distribute;
pub mod gc;
pub mod identity;
pub mod provenance;
pub mod reconcile;
pub mod retry;
pub mod run;

pub use apply::{apply, ApplyCounts};
pub use classify::{classify, Classification};
pub use distribute::{chunk_ranges, distribute, ChunkOutcome};
pub use gc::{remove_not_replicated_in_dst, remove_replicated_if_not_in_src, stale_ids, unreplicated_ids};
pub use identity::{existing_mapping, translate_ids, IdentityMap, RelationMap};
pub use provenance::{
    new_metadata, replicated_internal_id, stamp, ProvenanceId, REPLICATED_INTERNAL_ID,
    REPLICATED_SOURCE, REPLICATED_TIME,
};
pub use reconcile::{reconcile, Reconciliation};
pub use retry::RetryPolicy;
pub use run::{
    replicate_records, replicate_time_series, run_timestamp_now, ChunkFailure, ReplicateOptions,
    ReplicationReport,
};
