//! SurrealDB-backed implementations of the storage traits
//!
//! Uses Db-prefixed row structs for persistence, converting to/from the
//! `records` types at the boundary. Uuids are stored as strings and
//! timestamps as SurrealDB datetimes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Datetime as SurrealDatetime;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::StorageError;
use crate::handle::SurrealHandle;
use crate::records::{
    AuditEventRecord, HandoffRecord, PrincipalRecord, StageWorkRecord, StoredArtifact,
    TransitionReceipt, VentureRecord,
};
use crate::storage_traits::{
    AdvanceOutcome, AdvanceStageRequest, ArtifactStore, AuditSink, HandoffStore,
    PreferenceStore, PrincipalDirectory, StorageResult, SystemOfRecord,
};

fn backend(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn parse_uuid(s: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| StorageError::Backend(format!("invalid uuid '{s}': {e}")))
}

fn parse_opt_uuid(s: Option<String>) -> StorageResult<Option<Uuid>> {
    s.as_deref().map(parse_uuid).transpose()
}

// ---------------------------------------------------------------------------
// Db row structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbVenture {
    venture_id: String,
    name: String,
    status: String,
    current_stage: Option<u8>,
    created_at: SurrealDatetime,
    updated_at: SurrealDatetime,
}

impl DbVenture {
    fn from_record(record: &VentureRecord) -> Self {
        Self {
            venture_id: record.venture_id.to_string(),
            name: record.name.clone(),
            status: record.status.clone(),
            current_stage: record.current_stage,
            created_at: SurrealDatetime::from(record.created_at),
            updated_at: SurrealDatetime::from(record.updated_at),
        }
    }

    fn into_record(self) -> StorageResult<VentureRecord> {
        Ok(VentureRecord {
            venture_id: parse_uuid(&self.venture_id)?,
            name: self.name,
            status: self.status,
            current_stage: self.current_stage,
            created_at: DateTime::<Utc>::from(self.created_at),
            updated_at: DateTime::<Utc>::from(self.updated_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbStageWork {
    venture_id: String,
    stage: u8,
    status: String,
    health: String,
    summary: serde_json::Value,
    updated_at: SurrealDatetime,
}

impl DbStageWork {
    fn from_record(record: &StageWorkRecord) -> Self {
        Self {
            venture_id: record.venture_id.to_string(),
            stage: record.stage,
            status: record.status.clone(),
            health: record.health.clone(),
            summary: record.summary.clone(),
            updated_at: SurrealDatetime::from(record.updated_at),
        }
    }

    fn into_record(self) -> StorageResult<StageWorkRecord> {
        Ok(StageWorkRecord {
            venture_id: parse_uuid(&self.venture_id)?,
            stage: self.stage,
            status: self.status,
            health: self.health,
            summary: self.summary,
            updated_at: DateTime::<Utc>::from(self.updated_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbHandoff {
    handoff_id: String,
    venture_id: String,
    proposed_by: String,
    from_stage: u8,
    to_stage: u8,
    package: serde_json::Value,
    status: String,
    reviewed_by: Option<String>,
    review_notes: Option<String>,
    proposed_at: SurrealDatetime,
    resolved_at: Option<SurrealDatetime>,
}

impl DbHandoff {
    fn from_record(record: &HandoffRecord) -> Self {
        Self {
            handoff_id: record.handoff_id.to_string(),
            venture_id: record.venture_id.to_string(),
            proposed_by: record.proposed_by.clone(),
            from_stage: record.from_stage,
            to_stage: record.to_stage,
            package: record.package.clone(),
            status: record.status.clone(),
            reviewed_by: record.reviewed_by.clone(),
            review_notes: record.review_notes.clone(),
            proposed_at: SurrealDatetime::from(record.proposed_at),
            resolved_at: record.resolved_at.map(SurrealDatetime::from),
        }
    }

    fn into_record(self) -> StorageResult<HandoffRecord> {
        Ok(HandoffRecord {
            handoff_id: parse_uuid(&self.handoff_id)?,
            venture_id: parse_uuid(&self.venture_id)?,
            proposed_by: self.proposed_by,
            from_stage: self.from_stage,
            to_stage: self.to_stage,
            package: self.package,
            status: self.status,
            reviewed_by: self.reviewed_by,
            review_notes: self.review_notes,
            proposed_at: DateTime::<Utc>::from(self.proposed_at),
            resolved_at: self.resolved_at.map(DateTime::<Utc>::from),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbArtifact {
    venture_id: String,
    stage: u8,
    kind: String,
    payload: serde_json::Value,
    is_current: bool,
    created_at: SurrealDatetime,
}

impl DbArtifact {
    fn from_record(record: &StoredArtifact) -> Self {
        Self {
            venture_id: record.venture_id.to_string(),
            stage: record.stage,
            kind: record.kind.clone(),
            payload: record.payload.clone(),
            is_current: record.is_current,
            created_at: SurrealDatetime::from(record.created_at),
        }
    }

    fn into_record(self) -> StorageResult<StoredArtifact> {
        Ok(StoredArtifact {
            venture_id: parse_uuid(&self.venture_id)?,
            stage: self.stage,
            kind: self.kind,
            payload: self.payload,
            is_current: self.is_current,
            created_at: DateTime::<Utc>::from(self.created_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbAuditEvent {
    event_id: String,
    event_type: String,
    correlation_id: String,
    venture_id: Option<String>,
    parent_event_id: Option<String>,
    event_data: serde_json::Value,
    created_at: SurrealDatetime,
}

impl DbAuditEvent {
    fn from_record(record: &AuditEventRecord) -> Self {
        Self {
            event_id: record.event_id.to_string(),
            event_type: record.event_type.clone(),
            correlation_id: record.correlation_id.to_string(),
            venture_id: record.venture_id.map(|v| v.to_string()),
            parent_event_id: record.parent_event_id.map(|v| v.to_string()),
            event_data: record.event_data.clone(),
            created_at: SurrealDatetime::from(record.created_at),
        }
    }

    fn into_record(self) -> StorageResult<AuditEventRecord> {
        Ok(AuditEventRecord {
            event_id: parse_uuid(&self.event_id)?,
            event_type: self.event_type,
            correlation_id: parse_uuid(&self.correlation_id)?,
            venture_id: parse_opt_uuid(self.venture_id)?,
            parent_event_id: parse_opt_uuid(self.parent_event_id)?,
            event_data: self.event_data,
            created_at: DateTime::<Utc>::from(self.created_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbPreference {
    principal_id: String,
    venture_id: Option<String>,
    key: String,
    value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbReceipt {
    idempotency_key: String,
    venture_id: String,
    from_stage: u8,
    to_stage: u8,
    handoff_id: String,
    applied_at: SurrealDatetime,
}

impl SurrealHandle {
    /// Seed a venture row (setup paths and tests).
    #[instrument(skip(self, record), fields(venture_id = %record.venture_id))]
    pub async fn insert_venture(&self, record: &VentureRecord) -> StorageResult<()> {
        debug!("Inserting venture");
        let row = DbVenture::from_record(record);
        let _created: Option<DbVenture> = self
            .db
            .create("ventures")
            .content(row)
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// Register a principal row.
    #[instrument(skip(self, record), fields(principal_id = %record.principal_id))]
    pub async fn insert_principal(&self, record: &PrincipalRecord) -> StorageResult<()> {
        let row = record.clone();
        let _created: Option<PrincipalRecord> = self
            .db
            .create("principals")
            .content(row)
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// Store a preference value.
    #[instrument(skip(self, value), fields(principal_id = %principal_id, key = %key))]
    pub async fn set_preference(
        &self,
        principal_id: &str,
        venture_id: Option<Uuid>,
        key: &str,
        value: serde_json::Value,
    ) -> StorageResult<()> {
        let row = DbPreference {
            principal_id: principal_id.to_string(),
            venture_id: venture_id.map(|v| v.to_string()),
            key: key.to_string(),
            value,
        };
        let _created: Option<DbPreference> = self
            .db
            .create("preferences")
            .content(row)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn find_venture(&self, venture_id: Uuid) -> StorageResult<Option<DbVenture>> {
        let id_owned = venture_id.to_string();
        let mut result = self
            .db
            .query("SELECT * FROM ventures WHERE venture_id = $id")
            .bind(("id", id_owned))
            .await
            .map_err(backend)?;
        let rows: Vec<DbVenture> = result.take(0).map_err(backend)?;
        Ok(rows.into_iter().next())
    }
}

// ---------------------------------------------------------------------------
// SystemOfRecord
// ---------------------------------------------------------------------------

#[async_trait]
impl SystemOfRecord for SurrealHandle {
    async fn load_venture(&self, venture_id: Uuid) -> StorageResult<Option<VentureRecord>> {
        self.find_venture(venture_id)
            .await?
            .map(DbVenture::into_record)
            .transpose()
    }

    async fn current_stage(&self, venture_id: Uuid) -> StorageResult<Option<u8>> {
        let venture = self
            .find_venture(venture_id)
            .await?
            .ok_or(StorageError::VentureNotFound { venture_id })?;
        Ok(venture.current_stage)
    }

    async fn stage_states(&self, venture_id: Uuid) -> StorageResult<Vec<StageWorkRecord>> {
        let id_owned = venture_id.to_string();
        let mut result = self
            .db
            .query("SELECT * FROM stage_work WHERE venture_id = $id ORDER BY stage")
            .bind(("id", id_owned))
            .await
            .map_err(backend)?;
        let rows: Vec<DbStageWork> = result.take(0).map_err(backend)?;
        rows.into_iter().map(DbStageWork::into_record).collect()
    }

    #[instrument(skip(self, request), fields(venture_id = %request.venture_id, key = %request.idempotency_key.short()))]
    async fn advance_stage(&self, request: AdvanceStageRequest) -> StorageResult<AdvanceOutcome> {
        // Duplicate key → no-op success.
        let key_owned = request.idempotency_key.as_str().to_string();
        let mut result = self
            .db
            .query("SELECT * FROM transition_receipts WHERE idempotency_key = $key")
            .bind(("key", key_owned))
            .await
            .map_err(backend)?;
        let receipts: Vec<DbReceipt> = result.take(0).map_err(backend)?;
        if !receipts.is_empty() {
            debug!("Duplicate idempotency key, reporting no-op success");
            return Ok(AdvanceOutcome {
                was_duplicate: true,
            });
        }

        // Compare-and-set on the stored stage; this conditional update is
        // the linearization point of the whole operation. An unset stage
        // counts as stage 1.
        let id_owned = request.venture_id.to_string();
        let now = SurrealDatetime::from(Utc::now());
        let mut result = self
            .db
            .query(
                "UPDATE ventures SET current_stage = $to, updated_at = $now \
                 WHERE venture_id = $id \
                 AND (current_stage = $from OR ($from = 1 AND current_stage = NONE)) \
                 RETURN AFTER",
            )
            .bind(("to", request.to_stage))
            .bind(("now", now))
            .bind(("id", id_owned))
            .bind(("from", request.from_stage))
            .await
            .map_err(backend)?;
        let updated: Vec<DbVenture> = result.take(0).map_err(backend)?;

        if updated.is_empty() {
            let venture = self
                .find_venture(request.venture_id)
                .await?
                .ok_or(StorageError::VentureNotFound {
                    venture_id: request.venture_id,
                })?;
            return Err(StorageError::TransitionConflict {
                venture_id: request.venture_id,
                expected_stage: request.from_stage,
                actual_stage: venture.current_stage.unwrap_or(1),
            });
        }

        let receipt = TransitionReceipt {
            idempotency_key: request.idempotency_key.as_str().to_string(),
            venture_id: request.venture_id,
            from_stage: request.from_stage,
            to_stage: request.to_stage,
            handoff_id: request.handoff_id,
            applied_at: Utc::now(),
        };
        let row = DbReceipt {
            idempotency_key: receipt.idempotency_key.clone(),
            venture_id: receipt.venture_id.to_string(),
            from_stage: receipt.from_stage,
            to_stage: receipt.to_stage,
            handoff_id: receipt.handoff_id.to_string(),
            applied_at: SurrealDatetime::from(receipt.applied_at),
        };
        let _created: Option<DbReceipt> = self
            .db
            .create("transition_receipts")
            .content(row)
            .await
            .map_err(backend)?;

        Ok(AdvanceOutcome {
            was_duplicate: false,
        })
    }

    async fn upsert_stage_summary(&self, record: StageWorkRecord) -> StorageResult<()> {
        let row = DbStageWork::from_record(&record);

        // Update if a row exists for this (venture, stage), create otherwise.
        let id_owned = row.venture_id.clone();
        let mut result = self
            .db
            .query(
                "UPDATE stage_work SET status = $status, health = $health, \
                 summary = $summary, updated_at = $now \
                 WHERE venture_id = $id AND stage = $stage RETURN AFTER",
            )
            .bind(("status", row.status.clone()))
            .bind(("health", row.health.clone()))
            .bind(("summary", row.summary.clone()))
            .bind(("now", row.updated_at.clone()))
            .bind(("id", id_owned))
            .bind(("stage", row.stage))
            .await
            .map_err(backend)?;
        let updated: Vec<DbStageWork> = result.take(0).map_err(backend)?;

        if updated.is_empty() {
            let _created: Option<DbStageWork> = self
                .db
                .create("stage_work")
                .content(row)
                .await
                .map_err(backend)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HandoffStore
// ---------------------------------------------------------------------------

#[async_trait]
impl HandoffStore for SurrealHandle {
    async fn insert_pending(&self, record: HandoffRecord) -> StorageResult<()> {
        let row = DbHandoff::from_record(&record);
        let _created: Option<DbHandoff> = self
            .db
            .create("handoffs")
            .content(row)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get(&self, handoff_id: Uuid) -> StorageResult<Option<HandoffRecord>> {
        let id_owned = handoff_id.to_string();
        let mut result = self
            .db
            .query("SELECT * FROM handoffs WHERE handoff_id = $id")
            .bind(("id", id_owned))
            .await
            .map_err(backend)?;
        let rows: Vec<DbHandoff> = result.take(0).map_err(backend)?;
        rows.into_iter().next().map(DbHandoff::into_record).transpose()
    }

    async fn pending_for_venture(&self, venture_id: Uuid) -> StorageResult<Vec<HandoffRecord>> {
        let id_owned = venture_id.to_string();
        let mut result = self
            .db
            .query(
                "SELECT * FROM handoffs WHERE venture_id = $id AND status = 'pending' \
                 ORDER BY proposed_at",
            )
            .bind(("id", id_owned))
            .await
            .map_err(backend)?;
        let rows: Vec<DbHandoff> = result.take(0).map_err(backend)?;
        rows.into_iter().map(DbHandoff::into_record).collect()
    }

    async fn resolve(
        &self,
        handoff_id: Uuid,
        status: &str,
        reviewed_by: &str,
        notes: Option<String>,
    ) -> StorageResult<()> {
        let existing = self
            .get(handoff_id)
            .await?
            .ok_or(StorageError::HandoffNotFound { handoff_id })?;
        if existing.is_resolved() {
            return Err(StorageError::HandoffAlreadyResolved {
                handoff_id,
                status: existing.status,
            });
        }

        let id_owned = handoff_id.to_string();
        let now = SurrealDatetime::from(Utc::now());
        self.db
            .query(
                "UPDATE handoffs SET status = $status, reviewed_by = $reviewer, \
                 review_notes = $notes, resolved_at = $now WHERE handoff_id = $id",
            )
            .bind(("status", status.to_string()))
            .bind(("reviewer", reviewed_by.to_string()))
            .bind(("notes", notes))
            .bind(("now", now))
            .bind(("id", id_owned))
            .await
            .map_err(backend)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ArtifactStore
// ---------------------------------------------------------------------------

#[async_trait]
impl ArtifactStore for SurrealHandle {
    async fn put_artifact(&self, artifact: StoredArtifact) -> StorageResult<()> {
        // Supersede any current row of the same (venture, stage, kind).
        let id_owned = artifact.venture_id.to_string();
        self.db
            .query(
                "UPDATE artifacts SET is_current = false \
                 WHERE venture_id = $id AND stage = $stage AND kind = $kind",
            )
            .bind(("id", id_owned))
            .bind(("stage", artifact.stage))
            .bind(("kind", artifact.kind.clone()))
            .await
            .map_err(backend)?;

        let row = DbArtifact::from_record(&artifact);
        let _created: Option<DbArtifact> = self
            .db
            .create("artifacts")
            .content(row)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn current_artifact(
        &self,
        venture_id: Uuid,
        stage: u8,
        kind: &str,
    ) -> StorageResult<Option<StoredArtifact>> {
        let id_owned = venture_id.to_string();
        let mut result = self
            .db
            .query(
                "SELECT * FROM artifacts WHERE venture_id = $id AND stage = $stage \
                 AND kind = $kind AND is_current = true",
            )
            .bind(("id", id_owned))
            .bind(("stage", stage))
            .bind(("kind", kind.to_string()))
            .await
            .map_err(backend)?;
        let rows: Vec<DbArtifact> = result.take(0).map_err(backend)?;
        rows.into_iter().next().map(DbArtifact::into_record).transpose()
    }

    async fn has_current_artifact(&self, venture_id: Uuid, stage: u8) -> StorageResult<bool> {
        let id_owned = venture_id.to_string();
        let mut result = self
            .db
            .query(
                "SELECT * FROM artifacts WHERE venture_id = $id AND stage = $stage \
                 AND is_current = true LIMIT 1",
            )
            .bind(("id", id_owned))
            .bind(("stage", stage))
            .await
            .map_err(backend)?;
        let rows: Vec<DbArtifact> = result.take(0).map_err(backend)?;
        Ok(!rows.is_empty())
    }
}

// ---------------------------------------------------------------------------
// AuditSink
// ---------------------------------------------------------------------------

#[async_trait]
impl AuditSink for SurrealHandle {
    async fn append(&self, event: AuditEventRecord) -> StorageResult<Uuid> {
        let event_id = event.event_id;
        let row = DbAuditEvent::from_record(&event);
        let _created: Option<DbAuditEvent> = self
            .db
            .create("audit_events")
            .content(row)
            .await
            .map_err(backend)?;
        Ok(event_id)
    }

    async fn events_for(&self, correlation_id: Uuid) -> StorageResult<Vec<AuditEventRecord>> {
        let id_owned = correlation_id.to_string();
        let mut result = self
            .db
            .query(
                "SELECT * FROM audit_events WHERE correlation_id = $id ORDER BY created_at",
            )
            .bind(("id", id_owned))
            .await
            .map_err(backend)?;
        let rows: Vec<DbAuditEvent> = result.take(0).map_err(backend)?;
        rows.into_iter().map(DbAuditEvent::into_record).collect()
    }
}

// ---------------------------------------------------------------------------
// PreferenceStore
// ---------------------------------------------------------------------------

#[async_trait]
impl PreferenceStore for SurrealHandle {
    async fn get_preferences(
        &self,
        principal_id: &str,
        venture_id: Option<Uuid>,
        keys: &[String],
    ) -> StorageResult<HashMap<String, serde_json::Value>> {
        let principal_owned = principal_id.to_string();
        let keys_owned: Vec<String> = keys.to_vec();
        let mut result = self
            .db
            .query("SELECT * FROM preferences WHERE principal_id = $pid AND key IN $keys")
            .bind(("pid", principal_owned))
            .bind(("keys", keys_owned))
            .await
            .map_err(backend)?;
        let rows: Vec<DbPreference> = result.take(0).map_err(backend)?;

        let venture_str = venture_id.map(|v| v.to_string());
        let mut resolved = HashMap::new();
        // Principal-wide values first, then venture-scoped overrides.
        for row in rows.iter().filter(|r| r.venture_id.is_none()) {
            resolved.insert(row.key.clone(), row.value.clone());
        }
        if venture_str.is_some() {
            for row in rows.iter().filter(|r| r.venture_id == venture_str) {
                resolved.insert(row.key.clone(), row.value.clone());
            }
        }
        Ok(resolved)
    }
}

// ---------------------------------------------------------------------------
// PrincipalDirectory
// ---------------------------------------------------------------------------

#[async_trait]
impl PrincipalDirectory for SurrealHandle {
    async fn get_principal(&self, principal_id: &str) -> StorageResult<Option<PrincipalRecord>> {
        let id_owned = principal_id.to_string();
        let mut result = self
            .db
            .query("SELECT * FROM principals WHERE principal_id = $id")
            .bind(("id", id_owned))
            .await
            .map_err(backend)?;
        let rows: Vec<PrincipalRecord> = result.take(0).map_err(backend)?;
        Ok(rows.into_iter().next())
    }
}
