//! Threshold evaluation shared by kill and promotion gates.
//!
//! Evaluates a stage's numeric/text output against the approver's
//! configured thresholds and returns the failing checks. An empty return
//! means every threshold passed.

use serde_json::json;

use crate::domain::handoff::HandoffPackage;
use crate::domain::preference::GateThresholds;

use super::result::{ThresholdCheck, ThresholdSeverity};

/// The numeric/text output a stage exposes to threshold checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutput {
    pub cost: Option<f64>,
    pub score: Option<f64>,
    pub technologies: Vec<String>,
    pub vendors: Vec<String>,
    pub description: String,
}

impl StageOutput {
    /// Merge a handoff package's artifacts into a stage output.
    ///
    /// Later artifacts win for scalar fields; list fields accumulate.
    /// The description gathers key decisions and identified risks, which
    /// is the text pivot-keyword checks scan.
    pub fn from_package(package: &HandoffPackage) -> StageOutput {
        let mut output = StageOutput::default();
        for artifact in &package.artifacts {
            if let Some(cost) = artifact.metadata.cost_usd {
                output.cost = Some(cost);
            }
            if let Some(score) = artifact.metadata.score {
                output.score = Some(score);
            }
            output
                .technologies
                .extend(artifact.metadata.technologies.iter().cloned());
            output
                .vendors
                .extend(artifact.metadata.vendors.iter().cloned());
        }
        let mut text: Vec<&str> = package.key_decisions.iter().map(String::as_str).collect();
        text.extend(package.risks_identified.iter().map(String::as_str));
        output.description = text.join("; ");
        output
    }
}

/// Evaluate every threshold; returns only the failures.
pub fn evaluate_thresholds(output: &StageOutput, thresholds: &GateThresholds) -> Vec<ThresholdCheck> {
    let mut failures = Vec::new();

    if let Some(cost) = output.cost {
        if cost > thresholds.cost_max_usd {
            failures.push(ThresholdCheck {
                threshold_id: "cost_threshold".to_string(),
                expected: json!(thresholds.cost_max_usd),
                actual: json!(cost),
                passed: false,
                severity: ThresholdSeverity::High,
                message: format!(
                    "cost ${cost:.2} exceeds ceiling ${:.2}",
                    thresholds.cost_max_usd
                ),
            });
        }
    }

    if let Some(score) = output.score {
        if score < thresholds.min_score {
            failures.push(ThresholdCheck {
                threshold_id: "score_threshold".to_string(),
                expected: json!(thresholds.min_score),
                actual: json!(score),
                passed: false,
                severity: ThresholdSeverity::High,
                message: format!(
                    "score {score:.1} below minimum {:.1}",
                    thresholds.min_score
                ),
            });
        }
    }

    if !thresholds.approved_tech_list.is_empty() {
        let offenders: Vec<&String> = output
            .technologies
            .iter()
            .filter(|t| !thresholds.approved_tech_list.contains(t))
            .collect();
        if !offenders.is_empty() {
            failures.push(ThresholdCheck {
                threshold_id: "unapproved_technology".to_string(),
                expected: json!(thresholds.approved_tech_list),
                actual: json!(offenders),
                passed: false,
                severity: ThresholdSeverity::Medium,
                message: format!(
                    "{} technology(ies) not on the approved list: {}",
                    offenders.len(),
                    offenders
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
            });
        }
    }

    if !thresholds.approved_vendor_list.is_empty() {
        let offenders: Vec<&String> = output
            .vendors
            .iter()
            .filter(|v| !thresholds.approved_vendor_list.contains(v))
            .collect();
        if !offenders.is_empty() {
            failures.push(ThresholdCheck {
                threshold_id: "unapproved_vendor".to_string(),
                expected: json!(thresholds.approved_vendor_list),
                actual: json!(offenders),
                passed: false,
                severity: ThresholdSeverity::Medium,
                message: format!(
                    "{} vendor(s) not on the approved list: {}",
                    offenders.len(),
                    offenders
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
            });
        }
    }

    let description = output.description.to_lowercase();
    let hits: Vec<&String> = thresholds
        .pivot_keywords
        .iter()
        .filter(|kw| !kw.is_empty() && description.contains(&kw.to_lowercase()))
        .collect();
    if !hits.is_empty() {
        failures.push(ThresholdCheck {
            threshold_id: "pivot_keyword".to_string(),
            expected: json!([]),
            actual: json!(hits),
            passed: false,
            severity: ThresholdSeverity::Low,
            message: format!(
                "pivot keyword(s) present in stage output: {}",
                hits.iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        });
    }

    failures
}
