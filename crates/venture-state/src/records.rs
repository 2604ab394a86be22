//! Storage-facing record types.
//!
//! These are the rows the persistence layer reads and writes. Stage numbers
//! are plain `u8` and statuses/kinds are strings at this layer; the engine
//! crate owns the typed domain model and converts at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::StorageError;

// ---------------------------------------------------------------------------
// IdempotencyKey
// ---------------------------------------------------------------------------

/// Idempotency key for the atomic advance-stage operation (SHA-256 hex).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_parts` or validated via
/// `TryFrom<String>`. Deriving the key from the handoff makes a retried
/// commit resend the same key, so the store can dedupe it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Derive the key for a specific transition attempt.
    pub fn from_parts(venture_id: Uuid, from_stage: u8, to_stage: u8, handoff_id: Uuid) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(format!("{venture_id}:{from_stage}:{to_stage}:{handoff_id}").as_bytes());
        IdempotencyKey(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidKey { key: s });
        }
        Ok(IdempotencyKey(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Ventures & stage work
// ---------------------------------------------------------------------------

/// A venture row in the system of record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VentureRecord {
    pub venture_id: Uuid,
    pub name: String,
    /// Lifecycle status: "active" | "paused" | "killed" | "launched".
    pub status: String,
    /// Current lifecycle stage (1..=25). `None` means never advanced;
    /// readers default it to 1.
    pub current_stage: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VentureRecord {
    /// Create a new active venture at an unset stage.
    pub fn new(venture_id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            venture_id,
            name: name.into(),
            status: "active".to_string(),
            current_stage: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-(venture, stage) work record — the write-through summary row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageWorkRecord {
    pub venture_id: Uuid,
    pub stage: u8,
    /// "pending" | "completed".
    pub status: String,
    /// Coarse health indicator: "green" | "yellow" | "red".
    pub health: String,
    /// Free-form summary payload written through on completion.
    pub summary: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Handoffs
// ---------------------------------------------------------------------------

/// A handoff row: the proposal package plus its review lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandoffRecord {
    pub handoff_id: Uuid,
    pub venture_id: Uuid,
    /// Agent that proposed the handoff.
    pub proposed_by: String,
    pub from_stage: u8,
    pub to_stage: u8,
    /// Serialized handoff package (artifacts, key decisions, open
    /// questions, risks). The engine owns the typed shape.
    pub package: serde_json::Value,
    /// "pending" | "approved" | "rejected" | "changes_requested".
    pub status: String,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub proposed_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl HandoffRecord {
    /// Whether this handoff has reached a terminal review state.
    pub fn is_resolved(&self) -> bool {
        self.status != "pending"
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// A stored stage artifact. Only the `is_current` row per
/// (venture, stage, kind) participates in contract checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredArtifact {
    pub venture_id: Uuid,
    pub stage: u8,
    /// Artifact kind, e.g. "pricing_model", "test_coverage_report".
    pub kind: String,
    pub payload: serde_json::Value,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Audit events
// ---------------------------------------------------------------------------

/// An append-only audit event row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEventRecord {
    pub event_id: Uuid,
    /// Event type, e.g. "agent_prediction", "agent_outcome", "gate_blocked".
    pub event_type: String,
    pub correlation_id: Uuid,
    pub venture_id: Option<Uuid>,
    /// Link to the prediction event for outcome events.
    pub parent_event_id: Option<Uuid>,
    pub event_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEventRecord {
    /// Create a new event with a fresh id.
    pub fn new(
        event_type: impl Into<String>,
        correlation_id: Uuid,
        venture_id: Option<Uuid>,
        event_data: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            correlation_id,
            venture_id,
            parent_event_id: None,
            event_data,
            created_at: Utc::now(),
        }
    }

    /// Link this event to a parent (builder pattern).
    pub fn with_parent(mut self, parent_event_id: Uuid) -> Self {
        self.parent_event_id = Some(parent_event_id);
        self
    }
}

// ---------------------------------------------------------------------------
// Preferences & principals
// ---------------------------------------------------------------------------

/// An operator-configured preference row, scoped to a principal and
/// optionally to a single venture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreferenceRecord {
    pub principal_id: String,
    pub venture_id: Option<Uuid>,
    /// Preference key, e.g. "filter.cost_max_usd".
    pub key: String,
    pub value: serde_json::Value,
}

/// A principal (human or agent) known to the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrincipalRecord {
    pub principal_id: String,
    pub display_name: String,
    /// Role label, e.g. "chairman", "venture_agent".
    pub role: String,
    /// "active" | "suspended".
    pub status: String,
}

// ---------------------------------------------------------------------------
// Transition receipts
// ---------------------------------------------------------------------------

/// Receipt proving an advance-stage call was applied under a key.
///
/// A second advance with the same key finds the receipt and reports
/// `was_duplicate` instead of reapplying.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitionReceipt {
    pub idempotency_key: String,
    pub venture_id: Uuid,
    pub from_stage: u8,
    pub to_stage: u8,
    pub handoff_id: Uuid,
    pub applied_at: DateTime<Utc>,
}
