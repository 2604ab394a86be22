//! Artifact contract checking between stages.
//!
//! Before a stage executes, the artifacts it depends on must exist.
//! Dependencies are either supplied explicitly or derived from the
//! immediately preceding stage plus a fixed table of multi-stage
//! dependencies. Missing contracts are advisory by default; the
//! approve path treats them as a hard precondition.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use venture_state::{ArtifactStore, StorageResult};

use crate::domain::stage::Stage;

/// Known multi-stage dependencies. Stages absent from this table depend
/// on their immediate predecessor only.
const MULTI_STAGE_DEPENDENCIES: [(u8, &[u8]); 3] = [
    // Business-model synthesis draws on the validation stages before it.
    (8, &[5, 6, 7]),
    // Go/no-go analysis needs the synthesis output and the latest build.
    (13, &[8, 12]),
    // Deployment needs the release candidate and the UAT report.
    (22, &[20, 21]),
];

/// The upstream stages a target stage depends on.
pub fn required_stages_for(target_stage: Stage) -> Vec<Stage> {
    for (stage, deps) in MULTI_STAGE_DEPENDENCIES {
        if stage == target_stage.get() {
            return deps.iter().filter_map(|s| Stage::new(*s)).collect();
        }
    }
    match target_stage.get() {
        1 => Vec::new(),
        n => Stage::new(n - 1).into_iter().collect(),
    }
}

/// Result of an upstream-contract check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractReport {
    pub target_stage: Stage,
    pub satisfied: Vec<Stage>,
    pub missing: Vec<Stage>,
    pub elapsed_ms: u64,
}

impl ContractReport {
    /// Whether every required upstream contract is satisfied.
    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Check that a current artifact exists for each upstream stage the
/// target depends on.
pub async fn validate_contracts(
    artifacts: &dyn ArtifactStore,
    venture_id: Uuid,
    target_stage: Stage,
    required_stages: Option<Vec<Stage>>,
) -> StorageResult<ContractReport> {
    let started = Instant::now();
    let required = required_stages.unwrap_or_else(|| required_stages_for(target_stage));

    let mut satisfied = Vec::new();
    let mut missing = Vec::new();
    for stage in required {
        if artifacts
            .has_current_artifact(venture_id, stage.get())
            .await?
        {
            satisfied.push(stage);
        } else {
            missing.push(stage);
        }
    }

    Ok(ContractReport {
        target_stage,
        satisfied,
        missing,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

// ---------------------------------------------------------------------------
// Schema shape validation
// ---------------------------------------------------------------------------

/// Primitive type expected for a schema field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    fn matches(self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn name_of(value: &serde_json::Value) -> &'static str {
        match value {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        }
    }
}

/// One required field in a stage's declared output schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
}

/// A stage's declared output schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputSchema {
    pub required: Vec<FieldSpec>,
}

/// A mismatch between stored artifact data and the declared schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaMismatch {
    MissingField {
        field: String,
    },
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: String,
    },
}

/// Structural check of artifact data against a declared output schema.
/// Returns the mismatch list; never errors.
pub fn validate_schema_shape(
    artifact_data: &serde_json::Value,
    output_schema: &OutputSchema,
) -> Vec<SchemaMismatch> {
    let mut mismatches = Vec::new();
    for spec in &output_schema.required {
        match artifact_data.get(&spec.name) {
            None | Some(serde_json::Value::Null) => {
                mismatches.push(SchemaMismatch::MissingField {
                    field: spec.name.clone(),
                });
            }
            Some(value) if !spec.field_type.matches(value) => {
                mismatches.push(SchemaMismatch::TypeMismatch {
                    field: spec.name.clone(),
                    expected: spec.field_type,
                    actual: FieldType::name_of(value).to_string(),
                });
            }
            Some(_) => {}
        }
    }
    mismatches
}
