//! Handoff packages and their review lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use venture_state::HandoffRecord;

use super::error::EngineError;
use super::stage::Stage;

/// The closed set of artifact kinds a handoff package may carry.
///
/// Unknown kinds are rejected at the boundary rather than silently
/// defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    IdeaBrief,
    ValidationReport,
    FinancialModel,
    PricingModel,
    BusinessModelCanvas,
    RiskMatrix,
    PrdDocument,
    GtmStrategy,
    TestCoverageReport,
    DeploymentRunbook,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdeaBrief => "idea_brief",
            Self::ValidationReport => "validation_report",
            Self::FinancialModel => "financial_model",
            Self::PricingModel => "pricing_model",
            Self::BusinessModelCanvas => "business_model_canvas",
            Self::RiskMatrix => "risk_matrix",
            Self::PrdDocument => "prd_document",
            Self::GtmStrategy => "gtm_strategy",
            Self::TestCoverageReport => "test_coverage_report",
            Self::DeploymentRunbook => "deployment_runbook",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata attached to a drafted artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArtifactMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Quality score (0..=10) assigned by the producing agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Projected cost in USD, where the artifact carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vendors: Vec<String>,
}

/// A single artifact inside a handoff package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactDraft {
    pub kind: ArtifactKind,
    pub content: String,
    #[serde(default)]
    pub metadata: ArtifactMetadata,
}

impl ArtifactDraft {
    pub fn new(kind: ArtifactKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            metadata: ArtifactMetadata::default(),
        }
    }

    /// Attach metadata (builder pattern).
    pub fn with_metadata(mut self, metadata: ArtifactMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The package a proposing agent hands over to advance one stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HandoffPackage {
    pub artifacts: Vec<ArtifactDraft>,
    pub key_decisions: Vec<String>,
    #[serde(default)]
    pub open_questions: Vec<String>,
    #[serde(default)]
    pub risks_identified: Vec<String>,
}

/// Review lifecycle status of a handoff.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    Pending,
    Approved,
    Rejected,
    ChangesRequested,
}

impl HandoffStatus {
    /// Whether the handoff has been resolved; resolved handoffs are
    /// immutable.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::ChangesRequested => "changes_requested",
        }
    }

    pub fn parse(s: &str) -> Option<HandoffStatus> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "changes_requested" => Some(Self::ChangesRequested),
            _ => None,
        }
    }
}

/// The approver's decision on a pending handoff.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandoffDecision {
    Approve,
    Reject,
    RequestChanges,
}

/// A handoff: one agent's proposal to advance a venture one stage,
/// resolved exactly once by an approver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Handoff {
    pub handoff_id: Uuid,
    pub venture_id: Uuid,
    pub proposed_by: String,
    pub from_stage: Stage,
    /// Always `from_stage + 1`; derived by the engine, never trusted
    /// from caller input.
    pub to_stage: Stage,
    pub package: HandoffPackage,
    pub status: HandoffStatus,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub proposed_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Handoff {
    /// Parse a storage row into the typed handoff, validating stages,
    /// status, and the package shape at the boundary.
    pub fn from_record(record: &HandoffRecord) -> Result<Handoff, EngineError> {
        let from_stage = Stage::new(record.from_stage).ok_or_else(|| {
            EngineError::NotFound(format!(
                "handoff {} carries invalid from_stage {}",
                record.handoff_id, record.from_stage
            ))
        })?;
        let to_stage = Stage::new(record.to_stage).ok_or_else(|| {
            EngineError::NotFound(format!(
                "handoff {} carries invalid to_stage {}",
                record.handoff_id, record.to_stage
            ))
        })?;
        let status = HandoffStatus::parse(&record.status).ok_or_else(|| {
            EngineError::NotFound(format!(
                "handoff {} carries unknown status '{}'",
                record.handoff_id, record.status
            ))
        })?;
        let package: HandoffPackage =
            serde_json::from_value(record.package.clone()).map_err(|e| {
                EngineError::NotFound(format!(
                    "handoff {} package failed validation: {e}",
                    record.handoff_id
                ))
            })?;
        Ok(Handoff {
            handoff_id: record.handoff_id,
            venture_id: record.venture_id,
            proposed_by: record.proposed_by.clone(),
            from_stage,
            to_stage,
            package,
            status,
            reviewed_by: record.reviewed_by.clone(),
            review_notes: record.review_notes.clone(),
            proposed_at: record.proposed_at,
            resolved_at: record.resolved_at,
        })
    }

    /// Serialize to a storage row.
    pub fn to_record(&self) -> HandoffRecord {
        HandoffRecord {
            handoff_id: self.handoff_id,
            venture_id: self.venture_id,
            proposed_by: self.proposed_by.clone(),
            from_stage: self.from_stage.get(),
            to_stage: self.to_stage.get(),
            package: serde_json::to_value(&self.package).unwrap_or(serde_json::json!({})),
            status: self.status.as_str().to_string(),
            reviewed_by: self.reviewed_by.clone(),
            review_notes: self.review_notes.clone(),
            proposed_at: self.proposed_at,
            resolved_at: self.resolved_at,
        }
    }
}
