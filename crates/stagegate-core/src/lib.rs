//! StageGate Core Library
//!
//! The Stage Gate & Transition Engine: coordinates a venture's lifecycle
//! through 25 numbered stages, where advancing requires a handoff package
//! to be proposed, validated against gates, and committed by a
//! chairman-role approver — exactly once, even under retries.

pub mod cache;
pub mod contracts;
pub mod context;
pub mod domain;
pub mod gates;
pub mod generator;
pub mod lifecycle;
pub mod obs;
pub mod quality;
pub mod state_machine;
pub mod telemetry;
pub mod truth;

pub use cache::HandoffCache;

pub use contracts::{
    required_stages_for, validate_contracts, validate_schema_shape, ContractReport, FieldSpec,
    FieldType, OutputSchema, SchemaMismatch,
};

pub use context::{EngineConfig, EngineContext};

pub use domain::{
    ArtifactDraft, ArtifactKind, ArtifactMetadata, Diagnostics, EngineError, ErrorKind,
    GateThresholdStore, GateThresholds, Handoff, HandoffDecision, HandoffPackage, HandoffStatus,
    PreferenceKey, PrincipalRole, Stage, StageHealth, StageState, StageStatus, Venture,
    VentureStatus, VentureSummary,
};

pub use gates::{
    evaluate_stage_gate, gate_kind_for, GateCheck, GateKind, GateResult, GateStatus, StageOutput,
    ThresholdCheck, ThresholdSeverity, KILL_GATE_STAGES, PROMOTION_GATE_STAGES,
};

pub use generator::{generate_with_timeout, ArtifactGenerator, GeneratorError, StageTemplate};

pub use lifecycle::{validate_package, ApproveOutcome, PackageValidation};

pub use quality::{evaluate_quality, required_kinds, QualityPolicy, QualityVerdict, QualityViolation};

pub use state_machine::{
    CommitOutcome, CommitRequest, HandoffProposal, ProposalOutcome, VentureStateMachine,
};

pub use truth::{
    read_transition_artifact, write_transition_artifact, ActualOutcome, CalibrationDelta,
    OutcomeLog, PredictedOutcome, TransitionArtifact, TruthLayer,
};

pub use obs::{
    emit_gate_evaluated, emit_handoff_proposed, emit_side_effect_failed, emit_staleness_detected,
    emit_transition_committed, TransitionSpan,
};
pub use telemetry::init_tracing;

/// StageGate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
