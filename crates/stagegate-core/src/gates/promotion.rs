//! Promotion gates — advancement checkpoints that always require
//! chairman approval.
//!
//! Even a clean threshold run never auto-passes: promotion is a human
//! decision. Only a HIGH-severity failure hard-blocks.

use uuid::Uuid;
use venture_state::StorageResult;

use crate::domain::preference::{GateThresholdStore, GateThresholds};
use crate::domain::stage::Stage;

use super::result::{build_summary, GateKind, GateResult, GateStatus, ThresholdSeverity};
use super::thresholds::{evaluate_thresholds, StageOutput};

/// Evaluate a promotion gate for entry into `to_stage`.
///
/// - Any HIGH-severity failure → `Fail` (blocked)
/// - Anything else, including all-pass → `RequiresChairmanApproval`
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
                event = "gate.promotion_error",
                stage = to_stage.get(),
                error = %err,
            );
            return GateResult {
                kind: Some(GateKind::Promotion),
                gate_name: Some(format!("PROMOTION_GATE_STAGE_{to_stage}")),
                passed: false,
                status: GateStatus::Error,
                checks: Vec::new(),
                evaluated_thresholds: Vec::new(),
                correlation_id,
                summary: build_summary(GateKind::Promotion, to_stage, GateStatus::Error, 0),
            };
        }
    };

    let failures = evaluate_thresholds(output, &thresholds);
    let has_high_severity = failures
        .iter()
        .any(|f| f.severity == ThresholdSeverity::High);
    let status = if has_high_severity {
        GateStatus::Fail
    } else {
        GateStatus::RequiresChairmanApproval
    };
    GateResult {
        kind: Some(GateKind::Promotion),
        gate_name: Some(format!("PROMOTION_GATE_STAGE_{to_stage}")),
        // Never auto-passed; the chairman must approve.
        passed: false,
        status,
        checks: Vec::new(),
        summary: build_summary(GateKind::Promotion, to_stage, status, failures.len()),
        evaluated_thresholds: failures,
        correlation_id,
    }
}
