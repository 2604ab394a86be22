//! Artifact quality rules.
//!
//! Existence is not enough: a handoff's artifacts must clear per-kind
//! minimum quality bars before a transition commits. Checks cover
//! stage-required kinds, minimum content length, placeholder and
//! boilerplate rejection, minimum quality score, and epistemic
//! classification for risk matrices.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::handoff::{ArtifactDraft, ArtifactKind, HandoffPackage};
use crate::domain::stage::Stage;

/// Placeholder and boilerplate markers that disqualify artifact content.
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)lorem ipsum|TODO:|FIXME:|TBD:|\[insert[^\]]*\]|\{placeholder\}")
            .expect("placeholder pattern compiles")
    })
}

/// Epistemic buckets a risk matrix must classify its claims into.
const EPISTEMIC_BUCKETS: [&str; 4] = ["fact", "assumption", "simulation", "unknown"];

/// Quality thresholds applied to handoff artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityPolicy {
    /// Minimum metadata score where a score is present.
    pub min_score: f64,
    /// Minimum content length for kinds without a specific entry.
    pub default_min_length: usize,
    /// Per-kind minimum content lengths.
    pub min_lengths: HashMap<ArtifactKind, usize>,
}

impl QualityPolicy {
    /// Production defaults: score >= 6, 100 chars minimum, financial
    /// models 300, risk matrices 200.
    pub fn standard() -> Self {
        let mut min_lengths = HashMap::new();
        min_lengths.insert(ArtifactKind::FinancialModel, 300);
        min_lengths.insert(ArtifactKind::RiskMatrix, 200);
        Self {
            min_score: 6.0,
            default_min_length: 100,
            min_lengths,
        }
    }

    fn min_length(&self, kind: ArtifactKind) -> usize {
        self.min_lengths
            .get(&kind)
            .copied()
            .unwrap_or(self.default_min_length)
    }
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Artifact kinds a handoff from `from_stage` must include.
///
/// Only stage 5 carries a fixed requirement; other stages rely on the
/// structural at-least-one-artifact rule.
pub fn required_kinds(from_stage: Stage) -> Vec<ArtifactKind> {
    match from_stage.get() {
        5 => vec![ArtifactKind::IdeaBrief, ArtifactKind::ValidationReport],
        _ => Vec::new(),
    }
}

/// A single quality violation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityViolation {
    /// The offending artifact kind, or `None` for package-level issues.
    pub artifact: Option<ArtifactKind>,
    pub reason: String,
}

/// The outcome of a quality evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityVerdict {
    pub passed: bool,
    pub violations: Vec<QualityViolation>,
}

impl QualityVerdict {
    /// Flatten violations into human-readable reasons.
    pub fn reasons(&self) -> Vec<String> {
        self.violations
            .iter()
            .map(|v| match v.artifact {
                Some(kind) => format!("{kind}: {}", v.reason),
                None => v.reason.clone(),
            })
            .collect()
    }
}

fn check_artifact(
    policy: &QualityPolicy,
    artifact: &ArtifactDraft,
    violations: &mut Vec<QualityViolation>,
) {
    let content = artifact.content.trim();
    let min_length = policy.min_length(artifact.kind);
    if content.len() < min_length {
        violations.push(QualityViolation {
            artifact: Some(artifact.kind),
            reason: format!(
                "content length {} below minimum {min_length}",
                content.len()
            ),
        });
        return;
    }

    if placeholder_pattern().is_match(content) {
        violations.push(QualityViolation {
            artifact: Some(artifact.kind),
            reason: "placeholder or boilerplate content detected".to_string(),
        });
    }

    if let Some(score) = artifact.metadata.score {
        if score < policy.min_score {
            violations.push(QualityViolation {
                artifact: Some(artifact.kind),
                reason: format!("quality score {score:.1} below minimum {:.1}", policy.min_score),
            });
        }
    }

    if artifact.kind == ArtifactKind::RiskMatrix {
        let lower = content.to_lowercase();
        let buckets = EPISTEMIC_BUCKETS
            .iter()
            .filter(|b| lower.contains(**b))
            .count();
        if buckets < 2 {
            violations.push(QualityViolation {
                artifact: Some(artifact.kind),
                reason: "risk matrix lacks epistemic classification \
                         (facts/assumptions/simulations/unknowns)"
                    .to_string(),
            });
        }
    }
}

/// Evaluate a handoff package against the quality policy.
pub fn evaluate_quality(
    policy: &QualityPolicy,
    from_stage: Stage,
    package: &HandoffPackage,
) -> QualityVerdict {
    let mut violations = Vec::new();

    for kind in required_kinds(from_stage) {
        if !package.artifacts.iter().any(|a| a.kind == kind) {
            violations.push(QualityViolation {
                artifact: Some(kind),
                reason: format!("required artifact '{kind}' missing from handoff"),
            });
        }
    }

    for artifact in &package.artifacts {
        check_artifact(policy, artifact, &mut violations);
    }

    QualityVerdict {
        passed: violations.is_empty(),
        violations,
    }
}
