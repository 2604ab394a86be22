//! Engine context — explicit dependency wiring.
//!
//! One `EngineContext` is constructed at process start and shared by
//! every state machine; there are no module-level singletons. Each field
//! is a trait object so tests wire the in-memory fakes and deployments
//! wire the SurrealDB backend.

use std::sync::Arc;
use std::time::Duration;

use venture_state::{
    ArtifactStore, AuditSink, HandoffStore, PreferenceStore, PrincipalDirectory, SystemOfRecord,
};

use crate::domain::preference::GateThresholdStore;
use crate::domain::venture::PrincipalRole;
use crate::quality::QualityPolicy;
use crate::truth::TruthLayer;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Role an approver must hold to commit stage transitions.
    pub required_approver_role: PrincipalRole,
    /// Bound on artifact-generation calls before falling back.
    pub generation_timeout: Duration,
    /// Artifact quality thresholds.
    pub quality: QualityPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            required_approver_role: PrincipalRole::Chairman,
            generation_timeout: Duration::from_secs(30),
            quality: QualityPolicy::standard(),
        }
    }
}

/// Shared dependencies for the stage gate & transition engine.
#[derive(Clone)]
pub struct EngineContext {
    pub system: Arc<dyn SystemOfRecord>,
    pub handoffs: Arc<dyn HandoffStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub audit: Arc<dyn AuditSink>,
    pub principals: Arc<dyn PrincipalDirectory>,
    pub thresholds: GateThresholdStore,
    pub truth: TruthLayer,
    pub config: EngineConfig,
}

impl EngineContext {
    /// Wire a context from its stores with the given config.
    pub fn new(
        system: Arc<dyn SystemOfRecord>,
        handoffs: Arc<dyn HandoffStore>,
        artifacts: Arc<dyn ArtifactStore>,
        audit: Arc<dyn AuditSink>,
        preferences: Arc<dyn PreferenceStore>,
        principals: Arc<dyn PrincipalDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            system,
            handoffs,
            artifacts,
            audit: audit.clone(),
            principals,
            thresholds: GateThresholdStore::new(preferences),
            truth: TruthLayer::new(audit),
            config,
        }
    }
}
