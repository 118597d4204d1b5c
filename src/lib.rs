//! Replicate time series from one project into another.
//!
//! Every replicated record is stamped with provenance metadata, so later
//! runs update their own earlier copies instead of duplicating them, and the
//! optional cleanup sweeps can tell replicas from destination-original data.

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod replication;
pub mod store;

pub use config::ReplicatorConfig;
pub use error::{ReplicationError, Result, StoreError};
pub use replication::{replicate_time_series, ReplicateOptions, ReplicationReport};
