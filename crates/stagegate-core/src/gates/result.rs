//! Gate result types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::stage::Stage;

/// Which family of gate produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateKind {
    /// Deterministic artifact-based gates on a fixed set of transitions.
    Existing,
    /// Venture termination checkpoints; failures escalate, never block.
    Kill,
    /// Advancement gates that always require chairman approval.
    Promotion,
}

/// Outcome status of a gate evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    Pass,
    Fail,
    RequiresChairmanDecision,
    RequiresChairmanApproval,
    Error,
}

impl GateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::RequiresChairmanDecision => "REQUIRES_CHAIRMAN_DECISION",
            Self::RequiresChairmanApproval => "REQUIRES_CHAIRMAN_APPROVAL",
            Self::Error => "ERROR",
        }
    }
}

/// A single named check inside a gate result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateCheck {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GateCheck {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            reason: None,
        }
    }

    pub fn fail(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Severity of a threshold failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThresholdSeverity {
    Low,
    Medium,
    High,
}

/// One evaluated threshold that failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdCheck {
    /// Threshold identifier, e.g. "cost_threshold".
    pub threshold_id: String,
    pub expected: serde_json::Value,
    pub actual: serde_json::Value,
    pub passed: bool,
    pub severity: ThresholdSeverity,
    pub message: String,
}

/// Structured result of a stage gate evaluation.
///
/// Ephemeral: produced per evaluation, persisted only as an audit event,
/// never cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateResult {
    /// `None` for ungated transitions.
    pub kind: Option<GateKind>,
    pub gate_name: Option<String>,
    pub passed: bool,
    pub status: GateStatus,
    /// Ordered named checks (existing gates).
    pub checks: Vec<GateCheck>,
    /// Failed thresholds (kill/promotion gates).
    pub evaluated_thresholds: Vec<ThresholdCheck>,
    pub correlation_id: Uuid,
    /// Human summary, at most 240 characters.
    pub summary: String,
}

impl GateResult {
    /// Result for a transition with no stage-specific gate.
    pub fn ungated(correlation_id: Uuid) -> Self {
        Self {
            kind: None,
            gate_name: None,
            passed: true,
            status: GateStatus::Pass,
            checks: Vec::new(),
            evaluated_thresholds: Vec::new(),
            correlation_id,
            summary: "No stage-specific gate required".to_string(),
        }
    }

    /// Whether the transition is hard-blocked (fail or internal error).
    pub fn is_blocking(&self) -> bool {
        matches!(self.status, GateStatus::Fail | GateStatus::Error)
    }

    /// Whether the result escalates to a human rather than passing or
    /// blocking outright.
    pub fn requires_chairman(&self) -> bool {
        matches!(
            self.status,
            GateStatus::RequiresChairmanDecision | GateStatus::RequiresChairmanApproval
        )
    }
}

/// Build the chairman-facing summary line, capped at 240 characters.
pub(crate) fn build_summary(
    kind: GateKind,
    stage: Stage,
    status: GateStatus,
    failed_count: usize,
) -> String {
    let label = match kind {
        GateKind::Existing => "Stage",
        GateKind::Kill => "Kill",
        GateKind::Promotion => "Promotion",
    };

    let mut summary = match status {
        GateStatus::Pass => {
            format!("{label} gate at stage {stage}: PASSED. All thresholds met. Venture may proceed.")
        }
        GateStatus::Fail => format!(
            "{label} gate at stage {stage}: BLOCKED. {failed_count} threshold(s) failed. \
             Venture cannot advance until issues resolved."
        ),
        GateStatus::RequiresChairmanDecision => format!(
            "{label} gate at stage {stage}: {failed_count} threshold(s) failed. \
             Chairman decision required: continue or terminate venture."
        ),
        GateStatus::RequiresChairmanApproval => {
            if failed_count > 0 {
                format!(
                    "{label} gate at stage {stage}: {failed_count} minor issue(s) noted. \
                     Chairman approval required to advance."
                )
            } else {
                format!(
                    "{label} gate at stage {stage}: All thresholds met. \
                     Chairman approval required to advance."
                )
            }
        }
        GateStatus::Error => format!(
            "{label} gate at stage {stage}: System error. Investigation required before proceeding."
        ),
    };

    if summary.len() > 240 {
        summary.truncate(237);
        summary.push_str("...");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ungated_passes_with_no_name() {
        let result = GateResult::ungated(Uuid::new_v4());
        assert!(result.passed);
        assert!(result.gate_name.is_none());
        assert!(result.kind.is_none());
        assert!(!result.is_blocking());
    }

    #[test]
    fn test_summary_cap() {
        let summary = build_summary(
            GateKind::Kill,
            Stage::new(13).unwrap(),
            GateStatus::RequiresChairmanDecision,
            3,
        );
        assert!(summary.len() <= 240);
        assert!(summary.contains("stage 13"));
        assert!(summary.contains("3 threshold(s)"));
    }

    #[test]
    fn test_status_serde_screaming_snake() {
        let json = serde_json::to_string(&GateStatus::RequiresChairmanDecision).unwrap();
        assert_eq!(json, "\"REQUIRES_CHAIRMAN_DECISION\"");
        let json = serde_json::to_string(&GateStatus::RequiresChairmanApproval).unwrap();
        assert_eq!(json, "\"REQUIRES_CHAIRMAN_APPROVAL\"");
    }

    #[test]
    fn test_requires_chairman() {
        let mut result = GateResult::ungated(Uuid::new_v4());
        result.status = GateStatus::RequiresChairmanApproval;
        assert!(result.requires_chairman());
        result.status = GateStatus::Fail;
        assert!(!result.requires_chairman());
        assert!(result.is_blocking());
    }
}
