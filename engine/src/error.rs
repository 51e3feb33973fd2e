//! Error types for the Cactus engine.

use crate::{EntityType, RecordId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All possible errors from the Cactus engine.
///
/// Remote failures are not variants here: they never abort a mutation and
/// are reported through [`crate::MutationOutcome::remote`] instead.
#[derive(Debug, Error)]
pub enum Error {
    // Binding errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Operation errors
    #[error("{entity} record not found: {id}")]
    NotFound { entity: EntityType, id: RecordId },

    #[error("{entity} record already exists: {id}")]
    Duplicate { entity: EntityType, id: RecordId },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("no pending remote operation for {entity} record {id}")]
    NothingPending { entity: EntityType, id: RecordId },

    #[error("version counter exhausted for record {id}")]
    VersionOverflow { id: RecordId },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // State errors
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("session is closed")]
    Closed,
}

/// Local persistence failures.
///
/// Fatal to the call that triggered them; no remote dispatch follows.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt store: {0}")]
    Corrupt(String),

    #[error("store is closed")]
    Closed,
}

/// Remote dispatch failures.
///
/// Local optimistic state is retained whenever one of these is reported.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    #[error("remote rejected {operation}: {reason}")]
    Rejected { operation: String, reason: String },

    #[error("remote dispatch timed out after {0} ms")]
    Timeout(u64),

    #[error("malformed response to {operation}: {reason}")]
    MalformedResponse { operation: String, reason: String },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
