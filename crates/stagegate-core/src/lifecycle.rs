//! Handoff lifecycle — package validation and the approve / reject /
//! request-changes paths.
//!
//! Approval is the gated path: gate evaluation first, then artifact
//! contract and quality checks, then the prediction-logged atomic
//! advance. Rejection and change requests only persist the new handoff
//! status and never touch the venture stage.

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use venture_state::{
    AdvanceStageRequest, AuditEventRecord, IdempotencyKey, StageWorkRecord, StorageError,
};

use crate::contracts;
use crate::context::EngineContext;
use crate::domain::error::{Diagnostics, EngineError};
use crate::domain::handoff::{Handoff, HandoffPackage, HandoffStatus};
use crate::domain::stage::Stage;
use crate::gates::{self, GateResult, StageOutput};
use crate::obs;
use crate::quality;
use crate::truth::{ActualOutcome, CalibrationDelta, PredictedOutcome, TransitionArtifact};

/// Structural validation result for a handoff package.
///
/// Non-fatal: returned to the proposer as feedback, never thrown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validate the required fields and per-artifact shape of a package.
pub fn validate_package(package: &HandoffPackage) -> PackageValidation {
    let mut errors = Vec::new();

    if package.artifacts.is_empty() {
        errors.push("Missing required field: artifacts".to_string());
    }
    if package.key_decisions.is_empty() {
        errors.push("Missing required field: key_decisions".to_string());
    }
    for (index, artifact) in package.artifacts.iter().enumerate() {
        if artifact.content.trim().is_empty() {
            errors.push(format!(
                "Artifact {index} ({}) has empty content",
                artifact.kind
            ));
        }
    }

    PackageValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Result of a successful approval.
#[derive(Debug, Clone)]
pub struct ApproveOutcome {
    pub new_stage: Stage,
    /// True when the advance had already been applied under the same
    /// idempotency key.
    pub was_duplicate: bool,
    pub gate: GateResult,
    pub prediction_event_id: Option<Uuid>,
    pub calibration: Option<CalibrationDelta>,
    pub diagnostics: Diagnostics,
}

async fn append_best_effort(
    ctx: &EngineContext,
    event: AuditEventRecord,
    context: &str,
    diagnostics: &mut Diagnostics,
) {
    if let Err(err) = ctx.audit.append(event).await {
        obs::emit_side_effect_failed(context, &err);
        diagnostics.record(context, err);
    }
}

/// Approve a pending handoff, committing the stage transition.
///
/// Order: gate → contracts → quality → prediction → atomic advance →
/// outcome → resolution and write-through (best-effort).
pub async fn approve(
    ctx: &EngineContext,
    handoff: &Handoff,
    approver_id: &str,
    notes: Option<String>,
) -> Result<ApproveOutcome, EngineError> {
    let venture_id = handoff.venture_id;
    let mut diagnostics = Diagnostics::new();

    // Gate first. Blocked means blocked: the caller must change inputs.
    let output = StageOutput::from_package(&handoff.package);
    let gate = gates::evaluate_stage_gate(
        ctx.artifacts.as_ref(),
        &ctx.thresholds,
        approver_id,
        venture_id,
        handoff.from_stage,
        handoff.to_stage,
        &output,
    )
    .await;
    let correlation_id = gate.correlation_id;
    obs::emit_gate_evaluated(venture_id, gate.gate_name.as_deref(), gate.status.as_str(), gate.passed);

    if gate.is_blocking() {
        append_best_effort(
            ctx,
            AuditEventRecord::new(
                "gate_blocked",
                correlation_id,
                Some(venture_id),
                json!({"gate_result": &gate, "handoff_id": handoff.handoff_id}),
            ),
            "gate_blocked audit append",
            &mut diagnostics,
        )
        .await;
        return Err(EngineError::GateValidation {
            result: Box::new(gate),
        });
    }
    if gate.requires_chairman() {
        // The approver holds the chairman role (authorized upstream);
        // this commit is the human decision the gate escalated to.
        append_best_effort(
            ctx,
            AuditEventRecord::new(
                "gate_escalation_resolved",
                correlation_id,
                Some(venture_id),
                json!({
                    "gate_result": &gate,
                    "handoff_id": handoff.handoff_id,
                    "resolved_by": approver_id,
                }),
            ),
            "gate_escalation audit append",
            &mut diagnostics,
        )
        .await;
    }

    // Upstream contracts are a hard precondition on the approve path.
    let contract = contracts::validate_contracts(
        ctx.artifacts.as_ref(),
        venture_id,
        handoff.to_stage,
        None,
    )
    .await?;
    if !contract.is_satisfied() {
        let violations: Vec<String> = contract
            .missing
            .iter()
            .map(|s| format!("no current artifact for upstream stage {s}"))
            .collect();
        append_best_effort(
            ctx,
            AuditEventRecord::new(
                "artifact_contract_blocked",
                correlation_id,
                Some(venture_id),
                json!({"report": &contract, "handoff_id": handoff.handoff_id}),
            ),
            "contract_blocked audit append",
            &mut diagnostics,
        )
        .await;
        return Err(EngineError::ArtifactQuality { violations });
    }

    // Quality bar on the handoff's own artifacts.
    let verdict = quality::evaluate_quality(&ctx.config.quality, handoff.from_stage, &handoff.package);
    if !verdict.passed {
        append_best_effort(
            ctx,
            AuditEventRecord::new(
                "artifact_quality_blocked",
                correlation_id,
                Some(venture_id),
                json!({"verdict": &verdict, "handoff_id": handoff.handoff_id}),
            ),
            "quality_blocked audit append",
            &mut diagnostics,
        )
        .await;
        return Err(EngineError::ArtifactQuality {
            violations: verdict.reasons(),
        });
    }

    // Prediction before the mutation; never blocks it.
    let predicted = PredictedOutcome {
        success: true,
        resulting_stage: Some(handoff.to_stage),
        action: Some("advance_stage".to_string()),
        confidence: None,
    };
    let prediction_event_id = ctx
        .truth
        .log_prediction(approver_id, venture_id, &predicted, correlation_id)
        .await;

    // The atomic advance. The key is derived from the handoff so a
    // retried commit resends the same key and dedupes.
    let idempotency_key = IdempotencyKey::from_parts(
        venture_id,
        handoff.from_stage.get(),
        handoff.to_stage.get(),
        handoff.handoff_id,
    );
    let advance = ctx
        .system
        .advance_stage(AdvanceStageRequest {
            venture_id,
            from_stage: handoff.from_stage.get(),
            to_stage: handoff.to_stage.get(),
            handoff_id: handoff.handoff_id,
            idempotency_key: idempotency_key.clone(),
        })
        .await;

    let advance = match advance {
        Ok(outcome) => outcome,
        Err(source) => {
            let actual = ActualOutcome {
                success: false,
                resulting_stage: Some(handoff.from_stage),
                action: Some("advance_stage".to_string()),
            };
            ctx.truth
                .log_outcome(
                    approver_id,
                    venture_id,
                    prediction_event_id,
                    &actual,
                    &predicted,
                    correlation_id,
                )
                .await;
            return Err(EngineError::TransitionPersistence {
                venture_id,
                from_stage: handoff.from_stage,
                to_stage: handoff.to_stage,
                idempotency_key: idempotency_key.to_string(),
                source,
            });
        }
    };
    obs::emit_transition_committed(
        venture_id,
        handoff.from_stage.get(),
        handoff.to_stage.get(),
        advance.was_duplicate,
    );

    let actual = ActualOutcome {
        success: true,
        resulting_stage: Some(handoff.to_stage),
        action: Some("advance_stage".to_string()),
    };
    let outcome_log = ctx
        .truth
        .log_outcome(
            approver_id,
            venture_id,
            prediction_event_id,
            &actual,
            &predicted,
            correlation_id,
        )
        .await;

    // Resolve the handoff. Best-effort: an already-resolved row on the
    // duplicate path is expected, any other failure is diagnosed.
    match ctx
        .handoffs
        .resolve(
            handoff.handoff_id,
            HandoffStatus::Approved.as_str(),
            approver_id,
            notes,
        )
        .await
    {
        Ok(()) | Err(StorageError::HandoffAlreadyResolved { .. }) => {}
        Err(err) => {
            obs::emit_side_effect_failed("handoff resolution", &err);
            diagnostics.record("handoff resolution", err);
        }
    }

    // Write-through summary and tamper-evident audit artifact for the
    // completed stage. Skipped on the duplicate path: the first
    // application already wrote them.
    if !advance.was_duplicate {
        let artifact = TransitionArtifact::finalize(
            venture_id,
            handoff.handoff_id,
            handoff.from_stage,
            handoff.to_stage,
            gate.status.as_str(),
            predicted.clone(),
            actual.clone(),
            chrono::Utc::now(),
        );
        append_best_effort(
            ctx,
            AuditEventRecord::new(
                "transition_recorded",
                correlation_id,
                Some(venture_id),
                json!({"artifact": &artifact}),
            ),
            "transition_recorded audit append",
            &mut diagnostics,
        )
        .await;

        let summary = StageWorkRecord {
            venture_id,
            stage: handoff.from_stage.get(),
            status: "completed".to_string(),
            health: "green".to_string(),
            summary: json!({
                "handoff_id": handoff.handoff_id,
                "advanced_to": handoff.to_stage.get(),
                "correlation_id": correlation_id,
            }),
            updated_at: chrono::Utc::now(),
        };
        if let Err(err) = ctx.system.upsert_stage_summary(summary).await {
            obs::emit_side_effect_failed("stage summary write-through", &err);
            diagnostics.record("stage summary write-through", err);
        }
    }

    Ok(ApproveOutcome {
        new_stage: handoff.to_stage,
        was_duplicate: advance.was_duplicate,
        gate,
        prediction_event_id,
        calibration: outcome_log.map(|o| o.delta),
        diagnostics,
    })
}

/// Reject a pending handoff. Never mutates the venture stage; a
/// persistence failure is diagnosed, not fatal.
pub async fn reject(
    ctx: &EngineContext,
    handoff: &Handoff,
    approver_id: &str,
    notes: Option<String>,
) -> Diagnostics {
    resolve_without_transition(ctx, handoff, HandoffStatus::Rejected, approver_id, notes).await
}

/// Send a pending handoff back for changes. Never mutates the venture
/// stage; a persistence failure is diagnosed, not fatal.
pub async fn request_changes(
    ctx: &EngineContext,
    handoff: &Handoff,
    approver_id: &str,
    notes: Option<String>,
) -> Diagnostics {
    resolve_without_transition(
        ctx,
        handoff,
        HandoffStatus::ChangesRequested,
        approver_id,
        notes,
    )
    .await
}

async fn resolve_without_transition(
    ctx: &EngineContext,
    handoff: &Handoff,
    status: HandoffStatus,
    approver_id: &str,
    notes: Option<String>,
) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();

    if let Err(err) = ctx
        .handoffs
        .resolve(handoff.handoff_id, status.as_str(), approver_id, notes)
        .await
    {
        obs::emit_side_effect_failed("handoff resolution", &err);
        diagnostics.record("handoff resolution", err);
    }

    append_best_effort(
        ctx,
        AuditEventRecord::new(
            "handoff_resolved",
            Uuid::new_v4(),
            Some(handoff.venture_id),
            json!({
                "handoff_id": handoff.handoff_id,
                "status": status.as_str(),
                "reviewed_by": approver_id,
            }),
        ),
        "handoff_resolved audit append",
        &mut diagnostics,
    )
    .await;

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::handoff::{ArtifactDraft, ArtifactKind};

    fn package(artifacts: Vec<ArtifactDraft>, decisions: Vec<&str>) -> HandoffPackage {
        HandoffPackage {
            artifacts,
            key_decisions: decisions.into_iter().map(String::from).collect(),
            open_questions: vec![],
            risks_identified: vec![],
        }
    }

    #[test]
    fn test_validate_package_missing_key_decisions() {
        let pkg = package(
            vec![ArtifactDraft::new(ArtifactKind::IdeaBrief, "content")],
            vec![],
        );
        let validation = validate_package(&pkg);
        assert!(!validation.valid);
        assert!(validation
            .errors
            .contains(&"Missing required field: key_decisions".to_string()));
    }

    #[test]
    fn test_validate_package_missing_artifacts() {
        let pkg = package(vec![], vec!["proceed"]);
        let validation = validate_package(&pkg);
        assert!(!validation.valid);
        assert!(validation
            .errors
            .contains(&"Missing required field: artifacts".to_string()));
    }

    #[test]
    fn test_validate_package_empty_artifact_content() {
        let pkg = package(
            vec![ArtifactDraft::new(ArtifactKind::IdeaBrief, "   ")],
            vec!["proceed"],
        );
        let validation = validate_package(&pkg);
        assert!(!validation.valid);
        assert!(validation.errors[0].contains("idea_brief"));
    }

    #[test]
    fn test_validate_package_ok() {
        let pkg = package(
            vec![ArtifactDraft::new(ArtifactKind::IdeaBrief, "content")],
            vec!["proceed"],
        );
        let validation = validate_package(&pkg);
        assert!(validation.valid);
        assert!(validation.errors.is_empty());
    }
}
