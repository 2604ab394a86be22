//! Kill gates — venture termination checkpoints.
//!
//! Threshold failures never block unilaterally: the engine escalates to
//! a chairman go/no-go decision with the failed thresholds listed.

use uuid::Uuid;
use venture_state::StorageResult;

use crate::domain::preference::{GateThresholdStore, GateThresholds};
use crate::domain::stage::Stage;

use super::result::{build_summary, GateKind, GateResult, GateStatus};
use super::thresholds::{evaluate_thresholds, StageOutput};

/// Evaluate a kill gate for entry into `to_stage`.
///
/// - All thresholds pass → `Pass` (venture continues)
/// - Any threshold fails → `RequiresChairmanDecision`
/// - Threshold resolution fails → `Error` (fail-closed)
pub async fn evaluate(
    threshold_store: &GateThresholdStore,
    approver_id: &str,
    venture_id: Uuid,
    to_stage: Stage,
    output: &StageOutput,
    correlation_id: Uuid,
) -> GateResult {
    let resolved: StorageResult<GateThresholds> =
        threshold_store.resolve(approver_id, Some(venture_id)).await;

    let thresholds = match resolved {
        Ok(thresholds) => thresholds,
        Err(err) => {
            tracing::error!(
                event = "gate.kill_error",
                stage = to_stage.get(),
                error = %err,
            );
            return GateResult {
                kind: Some(GateKind::Kill),
                gate_name: Some(format!("KILL_GATE_STAGE_{to_stage}")),
                passed: false,
                status: GateStatus::Error,
                checks: Vec::new(),
                evaluated_thresholds: Vec::new(),
                correlation_id,
                summary: build_summary(GateKind::Kill, to_stage, GateStatus::Error, 0),
            };
        }
    };

    let failures = evaluate_thresholds(output, &thresholds);
    let status = if failures.is_empty() {
        GateStatus::Pass
    } else {
        GateStatus::RequiresChairmanDecision
    };
    GateResult {
        kind: Some(GateKind::Kill),
        gate_name: Some(format!("KILL_GATE_STAGE_{to_stage}")),
        passed: failures.is_empty(),
        status,
        checks: Vec::new(),
        summary: build_summary(GateKind::Kill, to_stage, status, failures.len()),
        evaluated_thresholds: failures,
        correlation_id,
    }
}
