//! Storage trait definitions for StageGate
//!
//! These traits define the engine's interface boundary with the
//! persistent store:
//! - `SystemOfRecord`: authoritative venture state + the atomic
//!   advance-stage operation
//! - `HandoffStore`: handoff proposal persistence and resolution
//! - `ArtifactStore`: current-artifact lookups for contract checks
//! - `AuditSink`: append-only event log
//! - `PreferenceStore`: operator-configured gate thresholds
//! - `PrincipalDirectory`: role lookups for approver authorization
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageError;
use crate::records::{
    AuditEventRecord, HandoffRecord, IdempotencyKey, PrincipalRecord, StageWorkRecord,
    StoredArtifact, VentureRecord,
};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// SystemOfRecord — authoritative venture state
// ---------------------------------------------------------------------------

/// Input to the atomic advance-stage operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceStageRequest {
    pub venture_id: Uuid,
    pub from_stage: u8,
    pub to_stage: u8,
    pub handoff_id: Uuid,
    pub idempotency_key: IdempotencyKey,
}

/// Output of the atomic advance-stage operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceOutcome {
    /// True when the same idempotency key was already applied; the call
    /// is a no-op that still reports success.
    pub was_duplicate: bool,
}

/// The authoritative venture store.
///
/// Guarantees:
/// - `advance_stage` is atomic: the stage update and the transition
///   receipt land together or not at all.
/// - `advance_stage` is idempotent under a repeated identical
///   `idempotency_key` — the duplicate reports `was_duplicate = true`
///   without reapplying.
/// - An advance whose `from_stage` no longer matches the stored stage
///   fails with `StorageError::TransitionConflict`.
#[async_trait]
pub trait SystemOfRecord: Send + Sync {
    /// Load a venture row, or `None` if it does not exist.
    async fn load_venture(&self, venture_id: Uuid) -> StorageResult<Option<VentureRecord>>;

    /// Read the authoritative current stage. `None` means the venture
    /// exists but has never advanced (callers default to 1). Fails with
    /// `VentureNotFound` when the venture is absent.
    async fn current_stage(&self, venture_id: Uuid) -> StorageResult<Option<u8>>;

    /// All per-stage work records for a venture.
    async fn stage_states(&self, venture_id: Uuid) -> StorageResult<Vec<StageWorkRecord>>;

    /// Atomically advance the venture one stage. See trait-level guarantees.
    async fn advance_stage(&self, request: AdvanceStageRequest) -> StorageResult<AdvanceOutcome>;

    /// Upsert the write-through summary row for a (venture, stage).
    async fn upsert_stage_summary(&self, record: StageWorkRecord) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// HandoffStore — proposal persistence and resolution
// ---------------------------------------------------------------------------

/// Handoff persistence.
///
/// Semantics:
/// - A handoff is created as "pending" and resolved at most once.
/// - `resolve` on an already-resolved handoff fails with
///   `HandoffAlreadyResolved`; resolved rows are immutable.
#[async_trait]
pub trait HandoffStore: Send + Sync {
    /// Persist a new pending handoff.
    async fn insert_pending(&self, record: HandoffRecord) -> StorageResult<()>;

    /// Fetch a handoff by id.
    async fn get(&self, handoff_id: Uuid) -> StorageResult<Option<HandoffRecord>>;

    /// All pending handoffs for a venture, oldest first.
    async fn pending_for_venture(&self, venture_id: Uuid) -> StorageResult<Vec<HandoffRecord>>;

    /// Resolve a pending handoff with a terminal status
    /// ("approved" | "rejected" | "changes_requested").
    async fn resolve(
        &self,
        handoff_id: Uuid,
        status: &str,
        reviewed_by: &str,
        notes: Option<String>,
    ) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// ArtifactStore — current-artifact lookups
// ---------------------------------------------------------------------------

/// Stage artifact lookups.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist an artifact, superseding any current row of the same
    /// (venture, stage, kind).
    async fn put_artifact(&self, artifact: StoredArtifact) -> StorageResult<()>;

    /// The current artifact of a kind for a (venture, stage), if any.
    async fn current_artifact(
        &self,
        venture_id: Uuid,
        stage: u8,
        kind: &str,
    ) -> StorageResult<Option<StoredArtifact>>;

    /// Whether any current artifact exists for a (venture, stage).
    async fn has_current_artifact(&self, venture_id: Uuid, stage: u8) -> StorageResult<bool>;
}

// ---------------------------------------------------------------------------
// AuditSink — append-only event log
// ---------------------------------------------------------------------------

/// Append-only audit event log.
///
/// Guarantees:
/// - Events are never mutated after append.
/// - `events_for` returns events in append order.
///
/// The engine treats append failures as fire-and-forget: they are
/// collected into diagnostics, never propagated as operation failures.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append an event, returning its id.
    async fn append(&self, event: AuditEventRecord) -> StorageResult<Uuid>;

    /// All events sharing a correlation id, in append order.
    async fn events_for(&self, correlation_id: Uuid) -> StorageResult<Vec<AuditEventRecord>>;
}

// ---------------------------------------------------------------------------
// PreferenceStore — operator thresholds
// ---------------------------------------------------------------------------

/// Keyed preference lookups, scoped to a principal and optionally a venture.
///
/// Absent keys are simply missing from the returned map; the engine
/// resolves documented defaults.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Fetch the requested keys for a principal. Venture-scoped values
    /// override principal-wide ones.
    async fn get_preferences(
        &self,
        principal_id: &str,
        venture_id: Option<Uuid>,
        keys: &[String],
    ) -> StorageResult<HashMap<String, serde_json::Value>>;
}

// ---------------------------------------------------------------------------
// PrincipalDirectory — role lookups
// ---------------------------------------------------------------------------

/// Principal lookups for approver authorization.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Fetch a principal by id, or `None` if unknown.
    async fn get_principal(&self, principal_id: &str) -> StorageResult<Option<PrincipalRecord>>;
}
