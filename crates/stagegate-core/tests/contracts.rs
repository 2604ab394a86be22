//! Artifact contract checks: upstream dependency resolution, the hard
//! precondition on the approve path, and schema shape validation.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use stagegate_core::{
    validate_contracts, validate_schema_shape, ArtifactDraft, ArtifactKind, ArtifactMetadata,
    CommitRequest, EngineConfig, EngineContext, EngineError, FieldSpec, FieldType,
    HandoffDecision, HandoffPackage, HandoffProposal, OutputSchema, SchemaMismatch, Stage,
    VentureStateMachine,
};
use venture_state::fakes::{
    MemoryArtifactStore, MemoryAuditSink, MemoryHandoffStore, MemoryPreferenceStore,
    MemoryPrincipalDirectory, MemorySystemOfRecord,
};
use venture_state::{ArtifactStore, PrincipalRecord, StoredArtifact, VentureRecord};

fn stage(n: u8) -> Stage {
    Stage::new(n).unwrap()
}

fn long_text(prefix: &str) -> String {
    format!(
        "{prefix} The synthesis pulls together validated learnings from the \
         preceding stages, reconciles the revenue assumptions with observed \
         customer behavior, and sets the execution plan for the next phase."
    )
}

async fn seed(store: &MemoryArtifactStore, venture_id: Uuid, stage: u8, kind: &str) {
    store
        .put_artifact(StoredArtifact {
            venture_id,
            stage,
            kind: kind.to_string(),
            payload: json!({"ok": true}),
            is_current: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

// ── Dependency resolution ──

#[tokio::test]
async fn synthesis_stage_requires_all_upstream_artifacts() {
    let store = MemoryArtifactStore::new();
    let venture_id = Uuid::new_v4();
    seed(&store, venture_id, 5, "idea_brief").await;
    seed(&store, venture_id, 7, "pricing_model").await;

    let report = validate_contracts(&store, venture_id, stage(8), None)
        .await
        .unwrap();
    assert!(!report.is_satisfied());
    assert_eq!(report.satisfied, vec![stage(5), stage(7)]);
    assert_eq!(report.missing, vec![stage(6)]);

    seed(&store, venture_id, 6, "validation_report").await;
    let report = validate_contracts(&store, venture_id, stage(8), None)
        .await
        .unwrap();
    assert!(report.is_satisfied());
}

#[tokio::test]
async fn explicit_required_stages_override_the_table() {
    let store = MemoryArtifactStore::new();
    let venture_id = Uuid::new_v4();
    seed(&store, venture_id, 2, "idea_brief").await;

    let report = validate_contracts(&store, venture_id, stage(8), Some(vec![stage(2)]))
        .await
        .unwrap();
    assert!(report.is_satisfied());
}

// ── Hard precondition on approve ──

#[tokio::test]
async fn approve_blocks_when_upstream_contract_is_missing() {
    let system = Arc::new(MemorySystemOfRecord::new());
    let venture_id = Uuid::new_v4();
    let mut record = VentureRecord::new(venture_id, "Contract Venture");
    record.current_stage = Some(9);
    system.insert_venture(record);

    let artifacts = Arc::new(MemoryArtifactStore::new());
    let principals = Arc::new(MemoryPrincipalDirectory::new());
    principals.insert_principal(PrincipalRecord {
        principal_id: "chairman-1".to_string(),
        display_name: "The Chairman".to_string(),
        role: "chairman".to_string(),
        status: "active".to_string(),
    });

    let ctx = Arc::new(EngineContext::new(
        system,
        Arc::new(MemoryHandoffStore::new()),
        artifacts.clone(),
        Arc::new(MemoryAuditSink::new()),
        Arc::new(MemoryPreferenceStore::new()),
        principals,
        EngineConfig::default(),
    ));
    let mut machine = VentureStateMachine::new(ctx, venture_id);
    machine.initialize().await.unwrap();

    // No stage-9 artifact exists, so the 9->10 contract is unsatisfied.
    let handoff_id = machine
        .propose_handoff(HandoffProposal {
            proposed_by: "agent-7".to_string(),
            from_stage: stage(9),
            requested_to_stage: None,
            package: HandoffPackage {
                artifacts: vec![ArtifactDraft::new(
                    ArtifactKind::GtmStrategy,
                    long_text("Strategy."),
                )
                .with_metadata(ArtifactMetadata {
                    score: Some(8.0),
                    ..Default::default()
                })],
                key_decisions: vec!["proceed".to_string()],
                open_questions: vec![],
                risks_identified: vec![],
            },
        })
        .await
        .unwrap()
        .handoff_id
        .unwrap();

    let err = machine
        .commit_stage_transition(CommitRequest {
            handoff_id,
            approver_id: "chairman-1".to_string(),
            decision: HandoffDecision::Approve,
            notes: None,
        })
        .await
        .unwrap_err();
    match err {
        EngineError::ArtifactQuality { violations } => {
            assert!(violations[0].contains("upstream stage 9"));
        }
        other => panic!("expected artifact quality failure, got {other:?}"),
    }
}

// ── Schema shape ──

#[test]
fn schema_shape_reports_missing_and_mismatched_fields() {
    let schema = OutputSchema {
        required: vec![
            FieldSpec {
                name: "uat_scenarios".to_string(),
                field_type: FieldType::Array,
            },
            FieldSpec {
                name: "pass_rate".to_string(),
                field_type: FieldType::Number,
            },
        ],
    };
    let data = json!({"uat_scenarios": {"oops": "object"}});
    let mismatches = validate_schema_shape(&data, &schema);
    assert_eq!(mismatches.len(), 2);
    assert!(matches!(
        &mismatches[0],
        SchemaMismatch::TypeMismatch { field, .. } if field == "uat_scenarios"
    ));
    assert!(matches!(
        &mismatches[1],
        SchemaMismatch::MissingField { field } if field == "pass_rate"
    ));
}

#[test]
fn schema_shape_never_errors_on_non_object_data() {
    let schema = OutputSchema {
        required: vec![FieldSpec {
            name: "anything".to_string(),
            field_type: FieldType::String,
        }],
    };
    // Scalar artifact data simply reports the field as missing.
    let mismatches = validate_schema_shape(&json!("just a string"), &schema);
    assert_eq!(
        mismatches,
        vec![SchemaMismatch::MissingField {
            field: "anything".to_string()
        }]
    );
}
