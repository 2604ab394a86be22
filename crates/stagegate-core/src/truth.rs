//! Truth layer — prediction/outcome logging and calibration.
//!
//! Before a mutating operation the engine records what it expects to
//! happen; afterwards it records what actually happened and how far the
//! prediction was off. Both land as linked audit events. Logging is
//! best-effort and never blocks the underlying operation.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use venture_state::{AuditEventRecord, AuditSink};

use crate::domain::stage::Stage;

/// What the engine expects a mutating operation to do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictedOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// What the operation actually did.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActualOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Per-field comparison of a prediction against its outcome.
///
/// `accuracy_score` starts at 1.0 and is multiplied by a fixed penalty
/// for each mismatched dimension: 0.1 for success/failure, 0.3 for the
/// resulting stage, 0.5 for the action label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationDelta {
    pub success_match: bool,
    pub stage_match: Option<bool>,
    pub action_match: Option<bool>,
    pub accuracy_score: f64,
}

impl CalibrationDelta {
    /// Compare a prediction with the actual outcome.
    pub fn compute(predicted: &PredictedOutcome, actual: &ActualOutcome) -> CalibrationDelta {
        let mut accuracy_score = 1.0;

        let success_match = predicted.success == actual.success;
        if !success_match {
            accuracy_score *= 0.1;
        }

        let stage_match = match (predicted.resulting_stage, actual.resulting_stage) {
            (Some(p), Some(a)) => Some(p == a),
            _ => None,
        };
        if stage_match == Some(false) {
            accuracy_score *= 0.3;
        }

        let action_match = match (&predicted.action, &actual.action) {
            (Some(p), Some(a)) => Some(p == a),
            _ => None,
        };
        if action_match == Some(false) {
            accuracy_score *= 0.5;
        }

        CalibrationDelta {
            success_match,
            stage_match,
            action_match,
            accuracy_score,
        }
    }
}

/// The outcome-side record returned by [`TruthLayer::log_outcome`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeLog {
    /// Audit event id, `None` when the append failed (non-fatal).
    pub event_id: Option<Uuid>,
    pub delta: CalibrationDelta,
}

/// Immutable audit artifact for a committed transition decision.
///
/// Carries a SHA-256 content digest for tamper evidence; mutating any
/// field after finalization breaks [`TransitionArtifact::verify_integrity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionArtifact {
    pub venture_id: Uuid,
    pub handoff_id: Uuid,
    pub from_stage: Stage,
    pub to_stage: Stage,
    pub gate_status: String,
    pub predicted: PredictedOutcome,
    pub actual: ActualOutcome,
    pub delta: CalibrationDelta,
    pub finalized_at: DateTime<Utc>,
    pub content_digest: String,
}

impl TransitionArtifact {
    /// Create a finalized artifact for a committed transition.
    #[allow(clippy::too_many_arguments)]
    pub fn finalize(
        venture_id: Uuid,
        handoff_id: Uuid,
        from_stage: Stage,
        to_stage: Stage,
        gate_status: impl Into<String>,
        predicted: PredictedOutcome,
        actual: ActualOutcome,
        now: DateTime<Utc>,
    ) -> Self {
        let delta = CalibrationDelta::compute(&predicted, &actual);
        let mut artifact = Self {
            venture_id,
            handoff_id,
            from_stage,
            to_stage,
            gate_status: gate_status.into(),
            predicted,
            actual,
            delta,
            finalized_at: now,
            content_digest: String::new(),
        };
        artifact.content_digest = artifact.compute_digest();
        artifact
    }

    /// SHA-256 over a stable serialization of the artifact content,
    /// excluding the digest field itself.
    fn compute_digest(&self) -> String {
        use sha2::{Digest, Sha256};
        let payload = json!({
            "venture_id": self.venture_id,
            "handoff_id": self.handoff_id,
            "from_stage": self.from_stage,
            "to_stage": self.to_stage,
            "gate_status": self.gate_status,
            "accuracy_score": self.delta.accuracy_score,
            "finalized_at": self.finalized_at.to_rfc3339(),
        });
        let bytes = serde_json::to_vec(&payload).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }

    /// Verify the artifact's integrity.
    pub fn verify_integrity(&self) -> bool {
        self.content_digest == self.compute_digest()
    }
}

/// Write a transition artifact to disk as JSON.
pub fn write_transition_artifact(
    artifact: &TransitionArtifact,
    path: &Path,
) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(artifact)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

/// Read a transition artifact from disk.
pub fn read_transition_artifact(path: &Path) -> std::io::Result<TransitionArtifact> {
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Prediction/outcome audit logging.
#[derive(Clone)]
pub struct TruthLayer {
    sink: Arc<dyn AuditSink>,
}

impl TruthLayer {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Append a prediction event. Returns the event id, or `None` if the
    /// append failed — prediction logging must never block the
    /// underlying operation.
    pub async fn log_prediction(
        &self,
        principal_id: &str,
        venture_id: Uuid,
        predicted: &PredictedOutcome,
        correlation_id: Uuid,
    ) -> Option<Uuid> {
        let event = AuditEventRecord::new(
            "agent_prediction",
            correlation_id,
            Some(venture_id),
            json!({
                "principal_id": principal_id,
                "predicted_outcome": predicted,
            }),
        );
        match self.sink.append(event).await {
            Ok(event_id) => Some(event_id),
            Err(err) => {
                tracing::warn!(
                    event = "truth.prediction_append_failed",
                    venture_id = %venture_id,
                    error = %err,
                );
                None
            }
        }
    }

    /// Append an outcome event linked to its prediction and compute the
    /// calibration delta.
    ///
    /// A missing `prediction_event_id` short-circuits with a warning and
    /// no append.
    pub async fn log_outcome(
        &self,
        principal_id: &str,
        venture_id: Uuid,
        prediction_event_id: Option<Uuid>,
        actual: &ActualOutcome,
        predicted: &PredictedOutcome,
        correlation_id: Uuid,
    ) -> Option<OutcomeLog> {
        let prediction_event_id = match prediction_event_id {
            Some(id) => id,
            None => {
                tracing::warn!(
                    event = "truth.outcome_skipped",
                    venture_id = %venture_id,
                    reason = "no prediction event id",
                );
                return None;
            }
        };

        let delta = CalibrationDelta::compute(predicted, actual);
        let event = AuditEventRecord::new(
            "agent_outcome",
            correlation_id,
            Some(venture_id),
            json!({
                "principal_id": principal_id,
                "actual_outcome": actual,
                "calibration_delta": delta,
            }),
        )
        .with_parent(prediction_event_id);

        let event_id = match self.sink.append(event).await {
            Ok(event_id) => Some(event_id),
            Err(err) => {
                tracing::warn!(
                    event = "truth.outcome_append_failed",
                    venture_id = %venture_id,
                    error = %err,
                );
                None
            }
        };
        Some(OutcomeLog { event_id, delta })
    }
}
