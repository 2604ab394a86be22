//! Error types for venture-state

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in the SurrealDB persistence layer
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

/// Typed faults surfaced through the storage traits.
///
/// These are the errors engine code branches on; backend faults that have
/// no domain meaning are wrapped in [`StorageError::Backend`].
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("venture not found: {venture_id}")]
    VentureNotFound { venture_id: Uuid },

    #[error("handoff not found: {handoff_id}")]
    HandoffNotFound { handoff_id: Uuid },

    #[error("handoff {handoff_id} already resolved as {status}")]
    HandoffAlreadyResolved { handoff_id: Uuid, status: String },

    #[error(
        "stage transition conflict for venture {venture_id}: expected stage {expected_stage}, store has {actual_stage}"
    )]
    TransitionConflict {
        venture_id: Uuid,
        expected_stage: u8,
        actual_stage: u8,
    },

    #[error("invalid idempotency key: {key}")]
    InvalidKey { key: String },

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}
