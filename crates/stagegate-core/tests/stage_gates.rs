//! Stage gate behavior across the three gate families, including the
//! fail-closed contract and the kill/promotion set invariant.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use stagegate_core::{
    evaluate_stage_gate, gate_kind_for, GateKind, GateStatus, GateThresholdStore, Stage,
    StageOutput, KILL_GATE_STAGES, PROMOTION_GATE_STAGES,
};
use venture_state::fakes::{
    FailingPreferenceStore, MemoryArtifactStore, MemoryPreferenceStore,
};
use venture_state::{ArtifactStore, StoredArtifact};

fn stage(n: u8) -> Stage {
    Stage::new(n).unwrap()
}

fn thresholds_with(store: MemoryPreferenceStore) -> GateThresholdStore {
    GateThresholdStore::new(Arc::new(store))
}

// ── Set invariant ──

#[test]
fn kill_and_promotion_stage_sets_are_disjoint() {
    for s in KILL_GATE_STAGES {
        assert!(
            !PROMOTION_GATE_STAGES.contains(&s),
            "stage {s} is in both gate sets; renumbering must keep them disjoint"
        );
    }
}

#[test]
fn every_gated_stage_is_reachable_by_a_sequential_transition() {
    for s in KILL_GATE_STAGES.iter().chain(PROMOTION_GATE_STAGES.iter()) {
        assert!((2..=25).contains(s), "stage {s} cannot be entered via +1");
    }
}

// ── Kill gate ──

#[tokio::test]
async fn kill_gate_all_thresholds_passing_yields_pass() {
    let artifacts = MemoryArtifactStore::new();
    let thresholds = thresholds_with(MemoryPreferenceStore::new());
    let output = StageOutput {
        cost: Some(400.0),
        score: Some(9.0),
        ..Default::default()
    };
    let result = evaluate_stage_gate(
        &artifacts,
        &thresholds,
        "chairman-1",
        Uuid::new_v4(),
        stage(12),
        stage(13),
        &output,
    )
    .await;
    assert_eq!(result.status, GateStatus::Pass);
    assert!(result.passed);
}

// Stage-13 kill gate with cost 20000 against a configured ceiling of
// 5000: escalation, never a hard block.
#[tokio::test]
async fn kill_gate_cost_overrun_escalates_with_named_threshold() {
    let artifacts = MemoryArtifactStore::new();
    let prefs = MemoryPreferenceStore::new();
    prefs.set_preference("chairman-1", None, "filter.cost_max_usd", json!(5000.0));
    let thresholds = thresholds_with(prefs);

    let output = StageOutput {
        cost: Some(20000.0),
        ..Default::default()
    };
    let result = evaluate_stage_gate(
        &artifacts,
        &thresholds,
        "chairman-1",
        Uuid::new_v4(),
        stage(12),
        stage(13),
        &output,
    )
    .await;

    assert_eq!(result.status, GateStatus::RequiresChairmanDecision);
    assert!(!result.passed);
    assert!(!result.is_blocking());
    assert_eq!(result.evaluated_thresholds.len(), 1);
    assert_eq!(result.evaluated_thresholds[0].threshold_id, "cost_threshold");
    assert_eq!(result.evaluated_thresholds[0].expected, json!(5000.0));
    assert_eq!(result.evaluated_thresholds[0].actual, json!(20000.0));
    assert!(result.summary.len() <= 240);
}

// ── Promotion gate ──

#[tokio::test]
async fn promotion_gate_never_passes_unconditionally() {
    let artifacts = MemoryArtifactStore::new();
    let thresholds = thresholds_with(MemoryPreferenceStore::new());
    let output = StageOutput {
        cost: Some(100.0),
        score: Some(10.0),
        ..Default::default()
    };
    let result = evaluate_stage_gate(
        &artifacts,
        &thresholds,
        "chairman-1",
        Uuid::new_v4(),
        stage(15),
        stage(16),
        &output,
    )
    .await;
    assert_eq!(result.status, GateStatus::RequiresChairmanApproval);
    assert!(!result.passed);
}

#[tokio::test]
async fn promotion_gate_high_severity_failure_blocks() {
    let artifacts = MemoryArtifactStore::new();
    let thresholds = thresholds_with(MemoryPreferenceStore::new());
    let output = StageOutput {
        score: Some(2.0),
        ..Default::default()
    };
    let result = evaluate_stage_gate(
        &artifacts,
        &thresholds,
        "chairman-1",
        Uuid::new_v4(),
        stage(16),
        stage(17),
        &output,
    )
    .await;
    assert_eq!(result.status, GateStatus::Fail);
    assert!(result.is_blocking());
}

// ── Fail-closed contract ──

#[tokio::test]
async fn failing_preference_lookup_fails_closed() {
    let artifacts = MemoryArtifactStore::new();
    let thresholds = GateThresholdStore::new(Arc::new(FailingPreferenceStore::new()));

    for (from, to) in [(12u8, 13u8), (15, 16)] {
        let result = evaluate_stage_gate(
            &artifacts,
            &thresholds,
            "chairman-1",
            Uuid::new_v4(),
            stage(from),
            stage(to),
            &StageOutput::default(),
        )
        .await;
        assert_eq!(result.status, GateStatus::Error, "transition {from}->{to}");
        assert!(!result.passed, "transition {from}->{to} must fail closed");
    }
}

// ── Existing gates through the dispatcher ──

#[tokio::test]
async fn financial_viability_gate_runs_for_five_to_six() {
    let artifacts = MemoryArtifactStore::new();
    let venture_id = Uuid::new_v4();
    artifacts
        .put_artifact(StoredArtifact {
            venture_id,
            stage: 4,
            kind: "pricing_model".to_string(),
            payload: json!({"tiers": [{"name": "starter", "price": 49}]}),
            is_current: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    artifacts
        .put_artifact(StoredArtifact {
            venture_id,
            stage: 5,
            kind: "business_model_canvas".to_string(),
            payload: json!({"segments": ["smb"]}),
            is_current: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let thresholds = thresholds_with(MemoryPreferenceStore::new());
    let result = evaluate_stage_gate(
        &artifacts,
        &thresholds,
        "chairman-1",
        venture_id,
        stage(5),
        stage(6),
        &StageOutput::default(),
    )
    .await;
    assert_eq!(result.kind, Some(GateKind::Existing));
    assert_eq!(result.gate_name.as_deref(), Some("FINANCIAL_VIABILITY"));
    assert!(result.passed, "checks: {:?}", result.checks);
}

#[tokio::test]
async fn missing_artifacts_fail_the_existing_gate_with_reasons() {
    let artifacts = MemoryArtifactStore::new();
    let thresholds = thresholds_with(MemoryPreferenceStore::new());
    let result = evaluate_stage_gate(
        &artifacts,
        &thresholds,
        "chairman-1",
        Uuid::new_v4(),
        stage(5),
        stage(6),
        &StageOutput::default(),
    )
    .await;
    assert_eq!(result.status, GateStatus::Fail);
    let failed = &result.checks[0];
    assert_eq!(failed.name, "pricing_model_exists");
    assert_eq!(failed.reason.as_deref(), Some("No pricing model artifact found"));
}

// ── Dispatch precedence ──

#[test]
fn existing_gates_take_precedence_over_stage_sets() {
    // 21->22 is an existing gate even though stage 22 sits in the
    // promotion set; 22->23 is an existing gate even though stage 23
    // sits in the kill set.
    assert_eq!(gate_kind_for(stage(21), stage(22)), Some(GateKind::Existing));
    assert_eq!(gate_kind_for(stage(22), stage(23)), Some(GateKind::Existing));
}

#[test]
fn ungated_transitions_have_no_kind() {
    assert_eq!(gate_kind_for(stage(6), stage(7)), None);
    assert_eq!(gate_kind_for(stage(17), stage(18)), None);
}
