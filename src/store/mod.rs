//! Record store abstraction.
//!
//! The engine only needs full listings and bulk create/update/delete. How a
//! store talks to its backend (transport, auth, paging) stays behind these
//! traits.

pub mod memory;
pub mod snapshot;

pub use memory::{MemoryStore, Operation};
pub use snapshot::{Snapshot, SnapshotProject};

use crate::error::StoreError;
use crate::model::{RecordKind, Replicable};
use async_trait::async_trait;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Readable side of a store.
#[async_trait]
pub trait RecordSource<R: Replicable>: Send + Sync {
    /// Name of the project this store belongs to.
    fn project(&self) -> &str;

    /// Every record the store holds, unpaged.
    async fn list(&self) -> StoreResult<Vec<R>>;
}

/// Writable side of a store. Each call is one bulk request; any reported
/// failure counts as failure of the whole batch.
#[async_trait]
pub trait RecordSink<K: RecordKind>: RecordSource<K::Record> {
    async fn create(&self, items: Vec<K::Material>) -> StoreResult<Vec<K::Record>>;

    async fn update(&self, items: Vec<K::Patch>) -> StoreResult<Vec<K::Record>>;

    async fn delete(&self, ids: Vec<i64>) -> StoreResult<()>;
}
