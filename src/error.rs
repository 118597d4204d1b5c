//! Error types for replication runs.
//!
//! Two layers: [`StoreError`] is what a store reports at its boundary,
//! [`ReplicationError`] is what the engine surfaces to its caller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a record store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Rate limiting or a temporary server error; worth retrying.
    #[error("transient store error ({status}): {message}")]
    Transient { status: u16, message: String },

    /// Any other failure class. Never retried.
    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Update or delete referenced ids the store does not hold.
    #[error("ids not found: {ids:?}")]
    NotFound { ids: Vec<i64> },
}

impl StoreError {
    pub fn transient(status: u16, message: impl Into<String>) -> Self {
        StoreError::Transient {
            status,
            message: message.into(),
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        StoreError::Rejected {
            status,
            message: message.into(),
        }
    }

    /// True for the 429 / 5xx class of failures.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }
}

/// Errors surfaced by the replication engine.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// A store call outside the retry wrapper failed (listing, typically).
    #[error("{operation} failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// Retry budget exhausted, or the store returned a non-retryable error.
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    PersistentFailure {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Two records of one kind in a snapshot share an id.
    #[error("{}: duplicate {kind} id {id}", .path.display())]
    DuplicateId {
        path: PathBuf,
        kind: &'static str,
        id: i64,
    },

    /// Another run holds the destination.
    #[error("{} is locked by another replication run", .0.display())]
    Locked(PathBuf),
}

pub type Result<T> = std::result::Result<T, ReplicationError>;
