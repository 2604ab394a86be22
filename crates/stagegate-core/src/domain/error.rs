//! Engine-level error taxonomy.
//!
//! Callers branch on [`ErrorKind`] and [`EngineError::is_retryable`]
//! rather than matching variants structurally; the only retryable kind
//! is staleness, where the cache has already been re-hydrated.

use uuid::Uuid;
use venture_state::StorageError;

use crate::gates::result::GateResult;

use super::stage::Stage;

/// Discriminant for the engine error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    StateStaleness,
    GateValidationFailure,
    ArtifactQualityFailure,
    AuthorizationFailure,
    NotFound,
    GateEvaluationError,
    Storage,
}

/// Errors surfaced by the stage gate & transition engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The cached stage diverged from the system of record. The cache has
    /// been re-hydrated; retry the whole operation.
    #[error("cached stage {cached_stage} is stale, store has stage {db_stage}")]
    StateStaleness { cached_stage: Stage, db_stage: Stage },

    /// A gate blocked the transition. Carries the structured result for
    /// caller feedback; do not retry without changing inputs.
    #[error("gate blocked transition: {}", .result.summary)]
    GateValidation { result: Box<GateResult> },

    /// Upstream artifacts are missing or below the quality bar; do not
    /// retry without changing inputs.
    #[error("artifact quality check failed: {}", .violations.join("; "))]
    ArtifactQuality { violations: Vec<String> },

    /// The approver lacks the required role.
    #[error("principal {principal_id} lacks required role '{required_role}'")]
    Authorization {
        principal_id: String,
        required_role: String,
    },

    /// A referenced entity does not exist or is already resolved.
    #[error("{0}")]
    NotFound(String),

    /// Gate evaluation failed internally; the transition is blocked
    /// (fail-closed) until the underlying fault is fixed.
    #[error("gate evaluation error: {0}")]
    GateEvaluation(String),

    /// The core atomic transition may or may not have applied; the
    /// failure propagates with full context.
    #[error(
        "stage transition persistence failed for venture {venture_id} \
         ({from_stage}->{to_stage}, idempotency key {idempotency_key}): {source}"
    )]
    TransitionPersistence {
        venture_id: Uuid,
        from_stage: Stage,
        to_stage: Stage,
        idempotency_key: String,
        #[source]
        source: StorageError,
    },

    /// Any other persistence failure on a critical path.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StateStaleness { .. } => ErrorKind::StateStaleness,
            Self::GateValidation { .. } => ErrorKind::GateValidationFailure,
            Self::ArtifactQuality { .. } => ErrorKind::ArtifactQualityFailure,
            Self::Authorization { .. } => ErrorKind::AuthorizationFailure,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::GateEvaluation(_) => ErrorKind::GateEvaluationError,
            Self::TransitionPersistence { .. } | Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether the caller may retry the whole operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StateStaleness { .. })
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Non-fatal side-effect failures collected alongside a primary result.
///
/// Best-effort writes (audit appends, handoff resolution, write-through
/// summaries) report here instead of aborting an otherwise-successful
/// mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed side effect.
    pub fn record(&mut self, context: &str, error: impl std::fmt::Display) {
        self.warnings.push(format!("{context}: {error}"));
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_staleness_is_retryable() {
        let stale = EngineError::StateStaleness {
            cached_stage: Stage::new(3).unwrap(),
            db_stage: Stage::new(4).unwrap(),
        };
        assert!(stale.is_retryable());
        assert_eq!(stale.kind(), ErrorKind::StateStaleness);

        let not_found = EngineError::NotFound("handoff".to_string());
        assert!(!not_found.is_retryable());
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_staleness_message_carries_both_stages() {
        let err = EngineError::StateStaleness {
            cached_stage: Stage::new(3).unwrap(),
            db_stage: Stage::new(4).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains('4'));
    }

    #[test]
    fn test_diagnostics_record() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());
        diagnostics.record("audit append", "connection refused");
        assert_eq!(diagnostics.warnings.len(), 1);
        assert!(diagnostics.warnings[0].contains("audit append"));
    }
}
