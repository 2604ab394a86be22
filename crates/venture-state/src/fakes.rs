//! In-memory fakes for storage traits (testing only)
//!
//! Provides `Mutex<HashMap>`-backed implementations that satisfy the trait
//! contracts without any external dependencies, plus failure-injecting
//! variants used to exercise fail-closed and fire-and-forget paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::StorageError;
use crate::records::{
    AuditEventRecord, HandoffRecord, PrincipalRecord, StageWorkRecord, StoredArtifact,
    TransitionReceipt, VentureRecord,
};
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemorySystemOfRecord
// ---------------------------------------------------------------------------

/// In-memory system of record with compare-and-set advance semantics and
/// idempotency receipts.
#[derive(Debug, Default)]
pub struct MemorySystemOfRecord {
    ventures: Mutex<HashMap<Uuid, VentureRecord>>,
    stage_work: Mutex<HashMap<(Uuid, u8), StageWorkRecord>>,
    receipts: Mutex<HashMap<String, TransitionReceipt>>,
}

impl MemorySystemOfRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a venture row (test setup).
    pub fn insert_venture(&self, record: VentureRecord) {
        let mut ventures = self.ventures.lock().unwrap();
        ventures.insert(record.venture_id, record);
    }

    /// Mutate the stored stage directly, bypassing the advance operation.
    /// Models an out-of-band write by another actor — the staleness tests
    /// depend on this.
    pub fn set_stage_out_of_band(&self, venture_id: Uuid, stage: u8) {
        let mut ventures = self.ventures.lock().unwrap();
        if let Some(v) = ventures.get_mut(&venture_id) {
            v.current_stage = Some(stage);
            v.updated_at = Utc::now();
        }
    }

    /// Number of applied (non-duplicate) transitions recorded.
    pub fn receipt_count(&self) -> usize {
        self.receipts.lock().unwrap().len()
    }
}

#[async_trait]
impl SystemOfRecord for MemorySystemOfRecord {
    async fn load_venture(&self, venture_id: Uuid) -> StorageResult<Option<VentureRecord>> {
        let ventures = self.ventures.lock().unwrap();
        Ok(ventures.get(&venture_id).cloned())
    }

    async fn current_stage(&self, venture_id: Uuid) -> StorageResult<Option<u8>> {
        let ventures = self.ventures.lock().unwrap();
        ventures
            .get(&venture_id)
            .map(|v| v.current_stage)
            .ok_or(StorageError::VentureNotFound { venture_id })
    }

    async fn stage_states(&self, venture_id: Uuid) -> StorageResult<Vec<StageWorkRecord>> {
        let stage_work = self.stage_work.lock().unwrap();
        let mut records: Vec<StageWorkRecord> = stage_work
            .values()
            .filter(|r| r.venture_id == venture_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.stage);
        Ok(records)
    }

    async fn advance_stage(&self, request: AdvanceStageRequest) -> StorageResult<AdvanceOutcome> {
        // Duplicate key → no-op success.
        {
            let receipts = self.receipts.lock().unwrap();
            if receipts.contains_key(request.idempotency_key.as_str()) {
                return Ok(AdvanceOutcome {
                    was_duplicate: true,
                });
            }
        }

        // Compare-and-set on the stored stage.
        let mut ventures = self.ventures.lock().unwrap();
        let venture =
            ventures
                .get_mut(&request.venture_id)
                .ok_or(StorageError::VentureNotFound {
                    venture_id: request.venture_id,
                })?;
        let actual = venture.current_stage.unwrap_or(1);
        if actual != request.from_stage {
            return Err(StorageError::TransitionConflict {
                venture_id: request.venture_id,
                expected_stage: request.from_stage,
                actual_stage: actual,
            });
        }
        venture.current_stage = Some(request.to_stage);
        venture.updated_at = Utc::now();

        let mut receipts = self.receipts.lock().unwrap();
        receipts.insert(
            request.idempotency_key.as_str().to_string(),
            TransitionReceipt {
                idempotency_key: request.idempotency_key.as_str().to_string(),
                venture_id: request.venture_id,
                from_stage: request.from_stage,
                to_stage: request.to_stage,
                handoff_id: request.handoff_id,
                applied_at: Utc::now(),
            },
        );
        Ok(AdvanceOutcome {
            was_duplicate: false,
        })
    }

    async fn upsert_stage_summary(&self, record: StageWorkRecord) -> StorageResult<()> {
        let mut stage_work = self.stage_work.lock().unwrap();
        stage_work.insert((record.venture_id, record.stage), record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryHandoffStore
// ---------------------------------------------------------------------------

/// In-memory handoff store enforcing resolve-once semantics.
#[derive(Debug, Default)]
pub struct MemoryHandoffStore {
    handoffs: Mutex<HashMap<Uuid, HandoffRecord>>,
    fail_resolve: AtomicBool,
}

impl MemoryHandoffStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `resolve` calls fail (exercises the best-effort path).
    pub fn set_fail_resolve(&self, fail: bool) {
        self.fail_resolve.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl HandoffStore for MemoryHandoffStore {
    async fn insert_pending(&self, record: HandoffRecord) -> StorageResult<()> {
        let mut handoffs = self.handoffs.lock().unwrap();
        handoffs.insert(record.handoff_id, record);
        Ok(())
    }

    async fn get(&self, handoff_id: Uuid) -> StorageResult<Option<HandoffRecord>> {
        let handoffs = self.handoffs.lock().unwrap();
        Ok(handoffs.get(&handoff_id).cloned())
    }

    async fn pending_for_venture(&self, venture_id: Uuid) -> StorageResult<Vec<HandoffRecord>> {
        let handoffs = self.handoffs.lock().unwrap();
        let mut pending: Vec<HandoffRecord> = handoffs
            .values()
            .filter(|h| h.venture_id == venture_id && !h.is_resolved())
            .cloned()
            .collect();
        pending.sort_by_key(|h| h.proposed_at);
        Ok(pending)
    }

    async fn resolve(
        &self,
        handoff_id: Uuid,
        status: &str,
        reviewed_by: &str,
        notes: Option<String>,
    ) -> StorageResult<()> {
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(
                "injected resolve failure".to_string(),
            ));
        }
        let mut handoffs = self.handoffs.lock().unwrap();
        let handoff = handoffs
            .get_mut(&handoff_id)
            .ok_or(StorageError::HandoffNotFound { handoff_id })?;
        if handoff.is_resolved() {
            return Err(StorageError::HandoffAlreadyResolved {
                handoff_id,
                status: handoff.status.clone(),
            });
        }
        handoff.status = status.to_string();
        handoff.reviewed_by = Some(reviewed_by.to_string());
        handoff.review_notes = notes;
        handoff.resolved_at = Some(Utc::now());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryArtifactStore
// ---------------------------------------------------------------------------

/// In-memory artifact store keyed by (venture, stage, kind).
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<(Uuid, u8, String), StoredArtifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put_artifact(&self, artifact: StoredArtifact) -> StorageResult<()> {
        let mut artifacts = self.artifacts.lock().unwrap();
        artifacts.insert(
            (artifact.venture_id, artifact.stage, artifact.kind.clone()),
            artifact,
        );
        Ok(())
    }

    async fn current_artifact(
        &self,
        venture_id: Uuid,
        stage: u8,
        kind: &str,
    ) -> StorageResult<Option<StoredArtifact>> {
        let artifacts = self.artifacts.lock().unwrap();
        Ok(artifacts
            .get(&(venture_id, stage, kind.to_string()))
            .filter(|a| a.is_current)
            .cloned())
    }

    async fn has_current_artifact(&self, venture_id: Uuid, stage: u8) -> StorageResult<bool> {
        let artifacts = self.artifacts.lock().unwrap();
        Ok(artifacts
            .values()
            .any(|a| a.venture_id == venture_id && a.stage == stage && a.is_current))
    }
}

// ---------------------------------------------------------------------------
// MemoryAuditSink
// ---------------------------------------------------------------------------

/// In-memory append-only audit sink with optional failure injection.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEventRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent appends fail (exercises fire-and-forget semantics).
    pub fn set_failing(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// All appended events, in order (test inspection).
    pub fn all_events(&self) -> Vec<AuditEventRecord> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, event: AuditEventRecord) -> StorageResult<Uuid> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected audit failure".to_string()));
        }
        let event_id = event.event_id;
        let mut events = self.events.lock().unwrap();
        events.push(event);
        Ok(event_id)
    }

    async fn events_for(&self, correlation_id: Uuid) -> StorageResult<Vec<AuditEventRecord>> {
        let events = self.events.lock().unwrap();
        Ok(events
            .iter()
            .filter(|e| e.correlation_id == correlation_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryPreferenceStore / FailingPreferenceStore
// ---------------------------------------------------------------------------

/// In-memory preference store. Venture-scoped values override
/// principal-wide ones.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<(String, Option<Uuid>, String), serde_json::Value>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a preference value (test setup).
    pub fn set_preference(
        &self,
        principal_id: &str,
        venture_id: Option<Uuid>,
        key: &str,
        value: serde_json::Value,
    ) {
        let mut values = self.values.lock().unwrap();
        values.insert(
            (principal_id.to_string(), venture_id, key.to_string()),
            value,
        );
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get_preferences(
        &self,
        principal_id: &str,
        venture_id: Option<Uuid>,
        keys: &[String],
    ) -> StorageResult<HashMap<String, serde_json::Value>> {
        let values = self.values.lock().unwrap();
        let mut resolved = HashMap::new();
        for key in keys {
            // Venture-scoped first, then principal-wide.
            let scoped = venture_id.and_then(|vid| {
                values
                    .get(&(principal_id.to_string(), Some(vid), key.clone()))
                    .cloned()
            });
            let value = scoped.or_else(|| {
                values
                    .get(&(principal_id.to_string(), None, key.clone()))
                    .cloned()
            });
            if let Some(v) = value {
                resolved.insert(key.clone(), v);
            }
        }
        Ok(resolved)
    }
}

/// Preference store whose every lookup fails — used to verify gates fail
/// closed on threshold-resolution errors.
#[derive(Debug, Default)]
pub struct FailingPreferenceStore;

impl FailingPreferenceStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PreferenceStore for FailingPreferenceStore {
    async fn get_preferences(
        &self,
        _principal_id: &str,
        _venture_id: Option<Uuid>,
        _keys: &[String],
    ) -> StorageResult<HashMap<String, serde_json::Value>> {
        Err(StorageError::Backend(
            "injected preference lookup failure".to_string(),
        ))
    }
}

// ---------------------------------------------------------------------------
// MemoryPrincipalDirectory
// ---------------------------------------------------------------------------

/// In-memory principal directory.
#[derive(Debug, Default)]
pub struct MemoryPrincipalDirectory {
    principals: Mutex<HashMap<String, PrincipalRecord>>,
}

impl MemoryPrincipalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a principal (test setup).
    pub fn insert_principal(&self, record: PrincipalRecord) {
        let mut principals = self.principals.lock().unwrap();
        principals.insert(record.principal_id.clone(), record);
    }
}

#[async_trait]
impl PrincipalDirectory for MemoryPrincipalDirectory {
    async fn get_principal(&self, principal_id: &str) -> StorageResult<Option<PrincipalRecord>> {
        let principals = self.principals.lock().unwrap();
        Ok(principals.get(principal_id).cloned())
    }
}
