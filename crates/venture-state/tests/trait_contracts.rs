//! Trait contract tests for the StageGate storage traits.
//!
//! These tests verify the behavioral contracts of the storage traits
//! using in-memory fakes. Any conforming implementation must pass these.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use venture_state::fakes::{
    FailingPreferenceStore, MemoryArtifactStore, MemoryAuditSink, MemoryHandoffStore,
    MemoryPreferenceStore, MemoryPrincipalDirectory, MemorySystemOfRecord,
};
use venture_state::storage_traits::*;
use venture_state::{
    AuditEventRecord, HandoffRecord, IdempotencyKey, PrincipalRecord, StageWorkRecord,
    StorageError, StoredArtifact, VentureRecord,
};

fn venture_at(stage: u8) -> (MemorySystemOfRecord, Uuid) {
    let store = MemorySystemOfRecord::new();
    let venture_id = Uuid::new_v4();
    let mut record = VentureRecord::new(venture_id, "Contract Test Venture");
    record.current_stage = Some(stage);
    store.insert_venture(record);
    (store, venture_id)
}

fn pending_handoff(venture_id: Uuid, from_stage: u8) -> HandoffRecord {
    HandoffRecord {
        handoff_id: Uuid::new_v4(),
        venture_id,
        proposed_by: "agent-strategy".to_string(),
        from_stage,
        to_stage: from_stage + 1,
        package: json!({"artifacts": [], "key_decisions": ["proceed"]}),
        status: "pending".to_string(),
        reviewed_by: None,
        review_notes: None,
        proposed_at: Utc::now(),
        resolved_at: None,
    }
}

// ===========================================================================
// SystemOfRecord contract tests
// ===========================================================================

#[tokio::test]
async fn current_stage_unset_is_none() {
    let store = MemorySystemOfRecord::new();
    let venture_id = Uuid::new_v4();
    store.insert_venture(VentureRecord::new(venture_id, "Fresh Venture"));

    assert_eq!(store.current_stage(venture_id).await.unwrap(), None);
}

#[tokio::test]
async fn current_stage_missing_venture_fails() {
    let store = MemorySystemOfRecord::new();
    let err = store.current_stage(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StorageError::VentureNotFound { .. }));
}

#[tokio::test]
async fn advance_stage_applies_once() {
    let (store, venture_id) = venture_at(5);
    let handoff_id = Uuid::new_v4();
    let request = AdvanceStageRequest {
        venture_id,
        from_stage: 5,
        to_stage: 6,
        handoff_id,
        idempotency_key: IdempotencyKey::from_parts(venture_id, 5, 6, handoff_id),
    };

    let outcome = store.advance_stage(request).await.unwrap();
    assert!(!outcome.was_duplicate);
    assert_eq!(store.current_stage(venture_id).await.unwrap(), Some(6));
}

#[tokio::test]
async fn advance_stage_duplicate_key_is_noop_success() {
    let (store, venture_id) = venture_at(5);
    let handoff_id = Uuid::new_v4();
    let request = AdvanceStageRequest {
        venture_id,
        from_stage: 5,
        to_stage: 6,
        handoff_id,
        idempotency_key: IdempotencyKey::from_parts(venture_id, 5, 6, handoff_id),
    };

    let first = store.advance_stage(request.clone()).await.unwrap();
    assert!(!first.was_duplicate);

    let second = store.advance_stage(request).await.unwrap();
    assert!(second.was_duplicate);

    // The stage advanced exactly once.
    assert_eq!(store.current_stage(venture_id).await.unwrap(), Some(6));
    assert_eq!(store.receipt_count(), 1);
}

#[tokio::test]
async fn advance_stage_conflict_on_stale_from_stage() {
    let (store, venture_id) = venture_at(7);
    let handoff_id = Uuid::new_v4();
    let request = AdvanceStageRequest {
        venture_id,
        from_stage: 5,
        to_stage: 6,
        handoff_id,
        idempotency_key: IdempotencyKey::from_parts(venture_id, 5, 6, handoff_id),
    };

    let err = store.advance_stage(request).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::TransitionConflict {
            expected_stage: 5,
            actual_stage: 7,
            ..
        }
    ));
}

#[tokio::test]
async fn advance_stage_from_unset_stage_counts_as_one() {
    let store = MemorySystemOfRecord::new();
    let venture_id = Uuid::new_v4();
    store.insert_venture(VentureRecord::new(venture_id, "Unset Stage Venture"));

    let handoff_id = Uuid::new_v4();
    let request = AdvanceStageRequest {
        venture_id,
        from_stage: 1,
        to_stage: 2,
        handoff_id,
        idempotency_key: IdempotencyKey::from_parts(venture_id, 1, 2, handoff_id),
    };
    let outcome = store.advance_stage(request).await.unwrap();
    assert!(!outcome.was_duplicate);
    assert_eq!(store.current_stage(venture_id).await.unwrap(), Some(2));
}

#[tokio::test]
async fn stage_summary_upsert_overwrites() {
    let (store, venture_id) = venture_at(5);
    let record = StageWorkRecord {
        venture_id,
        stage: 5,
        status: "pending".to_string(),
        health: "yellow".to_string(),
        summary: json!({}),
        updated_at: Utc::now(),
    };
    store.upsert_stage_summary(record.clone()).await.unwrap();

    let completed = StageWorkRecord {
        status: "completed".to_string(),
        health: "green".to_string(),
        ..record
    };
    store.upsert_stage_summary(completed).await.unwrap();

    let states = store.stage_states(venture_id).await.unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].status, "completed");
    assert_eq!(states[0].health, "green");
}

// ===========================================================================
// HandoffStore contract tests
// ===========================================================================

#[tokio::test]
async fn handoff_insert_and_get() {
    let store = MemoryHandoffStore::new();
    let handoff = pending_handoff(Uuid::new_v4(), 5);
    store.insert_pending(handoff.clone()).await.unwrap();

    let loaded = store.get(handoff.handoff_id).await.unwrap().unwrap();
    assert_eq!(loaded, handoff);
}

#[tokio::test]
async fn handoff_resolve_is_terminal() {
    let store = MemoryHandoffStore::new();
    let handoff = pending_handoff(Uuid::new_v4(), 5);
    store.insert_pending(handoff.clone()).await.unwrap();

    store
        .resolve(handoff.handoff_id, "approved", "chairman-1", None)
        .await
        .unwrap();

    let err = store
        .resolve(handoff.handoff_id, "rejected", "chairman-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::HandoffAlreadyResolved { .. }));
}

#[tokio::test]
async fn handoff_pending_excludes_resolved() {
    let store = MemoryHandoffStore::new();
    let venture_id = Uuid::new_v4();
    let first = pending_handoff(venture_id, 5);
    let second = pending_handoff(venture_id, 6);
    store.insert_pending(first.clone()).await.unwrap();
    store.insert_pending(second.clone()).await.unwrap();

    store
        .resolve(first.handoff_id, "rejected", "chairman-1", None)
        .await
        .unwrap();

    let pending = store.pending_for_venture(venture_id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].handoff_id, second.handoff_id);
}

// ===========================================================================
// ArtifactStore contract tests
// ===========================================================================

#[tokio::test]
async fn artifact_put_supersedes_current() {
    let store = MemoryArtifactStore::new();
    let venture_id = Uuid::new_v4();

    let old = StoredArtifact {
        venture_id,
        stage: 4,
        kind: "pricing_model".to_string(),
        payload: json!({"revenue_streams": []}),
        is_current: true,
        created_at: Utc::now(),
    };
    store.put_artifact(old).await.unwrap();

    let new = StoredArtifact {
        venture_id,
        stage: 4,
        kind: "pricing_model".to_string(),
        payload: json!({"revenue_streams": ["subscriptions"]}),
        is_current: true,
        created_at: Utc::now(),
    };
    store.put_artifact(new.clone()).await.unwrap();

    let current = store
        .current_artifact(venture_id, 4, "pricing_model")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.payload, new.payload);
    assert!(store.has_current_artifact(venture_id, 4).await.unwrap());
    assert!(!store.has_current_artifact(venture_id, 5).await.unwrap());
}

// ===========================================================================
// AuditSink contract tests
// ===========================================================================

#[tokio::test]
async fn audit_append_preserves_order() {
    let sink = MemoryAuditSink::new();
    let correlation_id = Uuid::new_v4();

    let prediction = AuditEventRecord::new(
        "agent_prediction",
        correlation_id,
        None,
        json!({"expected": "success"}),
    );
    let prediction_id = sink.append(prediction).await.unwrap();

    let outcome = AuditEventRecord::new(
        "agent_outcome",
        correlation_id,
        None,
        json!({"success": true}),
    )
    .with_parent(prediction_id);
    sink.append(outcome).await.unwrap();

    let events = sink.events_for(correlation_id).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, "agent_prediction");
    assert_eq!(events[1].event_type, "agent_outcome");
    assert_eq!(events[1].parent_event_id, Some(prediction_id));
}

#[tokio::test]
async fn audit_failure_injection_errors() {
    let sink = MemoryAuditSink::new();
    sink.set_failing(true);
    let err = sink
        .append(AuditEventRecord::new(
            "agent_prediction",
            Uuid::new_v4(),
            None,
            json!({}),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));
}

// ===========================================================================
// PreferenceStore contract tests
// ===========================================================================

#[tokio::test]
async fn preferences_venture_scope_overrides_principal_scope() {
    let store = MemoryPreferenceStore::new();
    let venture_id = Uuid::new_v4();
    store.set_preference("chairman-1", None, "filter.cost_max_usd", json!(5000.0));
    store.set_preference(
        "chairman-1",
        Some(venture_id),
        "filter.cost_max_usd",
        json!(10000.0),
    );

    let keys = vec!["filter.cost_max_usd".to_string()];
    let principal_wide = store
        .get_preferences("chairman-1", None, &keys)
        .await
        .unwrap();
    assert_eq!(principal_wide["filter.cost_max_usd"], json!(5000.0));

    let scoped = store
        .get_preferences("chairman-1", Some(venture_id), &keys)
        .await
        .unwrap();
    assert_eq!(scoped["filter.cost_max_usd"], json!(10000.0));
}

#[tokio::test]
async fn preferences_absent_keys_are_missing_not_errors() {
    let store = MemoryPreferenceStore::new();
    let resolved = store
        .get_preferences("chairman-1", None, &["filter.min_score".to_string()])
        .await
        .unwrap();
    assert!(resolved.is_empty());
}

#[tokio::test]
async fn failing_preference_store_always_errors() {
    let store = FailingPreferenceStore::new();
    let err = store
        .get_preferences("chairman-1", None, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));
}

// ===========================================================================
// PrincipalDirectory contract tests
// ===========================================================================

#[tokio::test]
async fn principal_lookup_round_trip() {
    let directory = MemoryPrincipalDirectory::new();
    directory.insert_principal(PrincipalRecord {
        principal_id: "chairman-1".to_string(),
        display_name: "The Chairman".to_string(),
        role: "chairman".to_string(),
        status: "active".to_string(),
    });

    let principal = directory.get_principal("chairman-1").await.unwrap().unwrap();
    assert_eq!(principal.role, "chairman");
    assert!(directory.get_principal("nobody").await.unwrap().is_none());
}
