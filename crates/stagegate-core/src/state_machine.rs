//! Venture state machine — the transition orchestrator.
//!
//! Owns an in-memory cached view of one venture (current stage, per-stage
//! states, pending handoffs) and mediates every transition operation.
//! The cache is never trusted for a mutation: `verify_state_freshness`
//! runs immediately before every mutating call and acts as the
//! optimistic-concurrency guard — a racing approver observes a changed
//! stage, gets a re-hydrated cache, and retries against fresh state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use venture_state::{AuditEventRecord, StorageError};

use crate::cache::HandoffCache;
use crate::context::EngineContext;
use crate::domain::error::{Diagnostics, EngineError};
use crate::domain::handoff::{
    Handoff, HandoffDecision, HandoffPackage, HandoffStatus,
};
use crate::domain::stage::Stage;
use crate::domain::venture::{
    PrincipalRole, StageHealth, StageState, StageStatus, Venture, VentureSummary,
};
use crate::lifecycle::{self, ApproveOutcome, PackageValidation};
use crate::obs;

/// A proposed handoff, as submitted by the proposing agent.
#[derive(Debug, Clone, PartialEq)]
pub struct HandoffProposal {
    pub proposed_by: String,
    pub from_stage: Stage,
    /// Ignored: the target stage is always derived as `from_stage + 1`.
    pub requested_to_stage: Option<Stage>,
    pub package: HandoffPackage,
}

/// Result of a proposal. Structural validation failures come back here
/// as a rejection, not as an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalOutcome {
    pub accepted: bool,
    pub handoff_id: Option<Uuid>,
    pub errors: Vec<String>,
    pub diagnostics: Diagnostics,
}

/// An approver's commit request for a pending handoff.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRequest {
    pub handoff_id: Uuid,
    pub approver_id: String,
    pub decision: HandoffDecision,
    pub notes: Option<String>,
}

/// Result of a commit, by decision.
#[derive(Debug, Clone)]
pub enum CommitOutcome {
    Approved(ApproveOutcome),
    Rejected { diagnostics: Diagnostics },
    ChangesRequested { diagnostics: Diagnostics },
}

/// The per-venture transition orchestrator.
pub struct VentureStateMachine {
    ctx: Arc<EngineContext>,
    venture_id: Uuid,
    venture: Option<Venture>,
    stage_states: BTreeMap<Stage, StageState>,
    cache: HandoffCache,
}

impl VentureStateMachine {
    pub fn new(ctx: Arc<EngineContext>, venture_id: Uuid) -> Self {
        Self {
            ctx,
            venture_id,
            venture: None,
            stage_states: BTreeMap::new(),
            cache: HandoffCache::new(),
        }
    }

    /// Load the venture, its per-stage states, and outstanding pending
    /// handoffs from the system of record. Fatal if the venture does not
    /// exist.
    pub async fn initialize(&mut self) -> Result<(), EngineError> {
        let record = self
            .ctx
            .system
            .load_venture(self.venture_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("venture {} not found", self.venture_id))
            })?;
        self.venture = Some(Venture::from_record(&record));

        self.stage_states.clear();
        for work in self.ctx.system.stage_states(self.venture_id).await? {
            if let Some(stage) = Stage::new(work.stage) {
                self.stage_states
                    .insert(stage, StageState::from_record(&work));
            }
        }

        self.cache.clear();
        for record in self
            .ctx
            .handoffs
            .pending_for_venture(self.venture_id)
            .await?
        {
            match Handoff::from_record(&record) {
                Ok(handoff) => self.cache.put(handoff),
                Err(err) => tracing::warn!(
                    event = "state.handoff_skipped",
                    handoff_id = %record.handoff_id,
                    error = %err,
                ),
            }
        }
        Ok(())
    }

    async fn ensure_initialized(&mut self) -> Result<(), EngineError> {
        if self.venture.is_none() {
            self.initialize().await?;
        }
        Ok(())
    }

    /// Re-read the authoritative stage. On divergence the cache is
    /// re-hydrated first, then a retryable staleness error is returned —
    /// a caller who retries after it is guaranteed to act on fresh
    /// state. Never silently proceeds.
    pub async fn verify_state_freshness(&mut self) -> Result<(), EngineError> {
        let cached_stage = self
            .venture
            .as_ref()
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "venture {} not initialized",
                    self.venture_id
                ))
            })?
            .current_stage;

        let db_stage = match self.ctx.system.current_stage(self.venture_id).await {
            Ok(stage) => stage.and_then(Stage::new).unwrap_or(Stage::FIRST),
            Err(StorageError::VentureNotFound { venture_id }) => {
                return Err(EngineError::NotFound(format!(
                    "venture {venture_id} not found"
                )));
            }
            Err(err) => return Err(EngineError::Storage(err)),
        };

        if db_stage != cached_stage {
            obs::emit_staleness_detected(self.venture_id, cached_stage.get(), db_stage.get());
            self.initialize().await?;
            return Err(EngineError::StateStaleness {
                cached_stage,
                db_stage,
            });
        }
        Ok(())
    }

    /// Propose a handoff to advance the venture one stage.
    ///
    /// Structural package failures return a rejection outcome;
    /// persistence failures are errors. The target stage is derived as
    /// `from_stage + 1` regardless of the proposal's `requested_to_stage`.
    pub async fn propose_handoff(
        &mut self,
        proposal: HandoffProposal,
    ) -> Result<ProposalOutcome, EngineError> {
        self.ensure_initialized().await?;
        self.verify_state_freshness().await?;

        let validation: PackageValidation = lifecycle::validate_package(&proposal.package);
        if !validation.valid {
            return Ok(ProposalOutcome {
                accepted: false,
                handoff_id: None,
                errors: validation.errors,
                diagnostics: Diagnostics::new(),
            });
        }

        let to_stage = match proposal.from_stage.next() {
            Some(stage) => stage,
            None => {
                return Ok(ProposalOutcome {
                    accepted: false,
                    handoff_id: None,
                    errors: vec![format!(
                        "Stage {} is the final stage; no further transition exists",
                        proposal.from_stage
                    )],
                    diagnostics: Diagnostics::new(),
                });
            }
        };

        let handoff = Handoff {
            handoff_id: Uuid::new_v4(),
            venture_id: self.venture_id,
            proposed_by: proposal.proposed_by,
            from_stage: proposal.from_stage,
            to_stage,
            package: proposal.package,
            status: HandoffStatus::Pending,
            reviewed_by: None,
            review_notes: None,
            proposed_at: Utc::now(),
            resolved_at: None,
        };
        self.ctx.handoffs.insert_pending(handoff.to_record()).await?;
        obs::emit_handoff_proposed(
            self.venture_id,
            handoff.handoff_id,
            handoff.from_stage.get(),
            handoff.to_stage.get(),
        );

        let mut diagnostics = Diagnostics::new();
        if let Err(err) = self
            .ctx
            .audit
            .append(AuditEventRecord::new(
                "handoff_proposed",
                Uuid::new_v4(),
                Some(self.venture_id),
                json!({
                    "handoff_id": handoff.handoff_id,
                    "proposed_by": handoff.proposed_by,
                    "from_stage": handoff.from_stage.get(),
                    "to_stage": handoff.to_stage.get(),
                }),
            ))
            .await
        {
            obs::emit_side_effect_failed("handoff_proposed audit append", &err);
            diagnostics.record("handoff_proposed audit append", err);
        }

        let handoff_id = handoff.handoff_id;
        self.cache.put(handoff);
        Ok(ProposalOutcome {
            accepted: true,
            handoff_id: Some(handoff_id),
            errors: Vec::new(),
            diagnostics,
        })
    }

    /// Commit an approver's decision on a pending handoff.
    pub async fn commit_stage_transition(
        &mut self,
        request: CommitRequest,
    ) -> Result<CommitOutcome, EngineError> {
        self.ensure_initialized().await?;
        self.verify_state_freshness().await?;
        self.authorize_approver(&request.approver_id).await?;

        let handoff = self.resolve_handoff(request.handoff_id).await?;

        match request.decision {
            HandoffDecision::Approve => {
                let outcome = lifecycle::approve(
                    &self.ctx,
                    &handoff,
                    &request.approver_id,
                    request.notes,
                )
                .await?;

                if let Some(venture) = self.venture.as_mut() {
                    venture.current_stage = outcome.new_stage;
                }
                self.stage_states.insert(
                    handoff.from_stage,
                    StageState {
                        status: StageStatus::Completed,
                        health: StageHealth::Green,
                    },
                );
                self.cache.invalidate(request.handoff_id);
                Ok(CommitOutcome::Approved(outcome))
            }
            HandoffDecision::Reject => {
                let diagnostics =
                    lifecycle::reject(&self.ctx, &handoff, &request.approver_id, request.notes)
                        .await;
                self.cache.invalidate(request.handoff_id);
                Ok(CommitOutcome::Rejected { diagnostics })
            }
            HandoffDecision::RequestChanges => {
                let diagnostics = lifecycle::request_changes(
                    &self.ctx,
                    &handoff,
                    &request.approver_id,
                    request.notes,
                )
                .await;
                self.cache.invalidate(request.handoff_id);
                Ok(CommitOutcome::ChangesRequested { diagnostics })
            }
        }
    }

    async fn authorize_approver(&self, approver_id: &str) -> Result<(), EngineError> {
        let required_role = self.ctx.config.required_approver_role;
        let principal = self.ctx.principals.get_principal(approver_id).await?;
        let authorized = principal
            .map(|p| {
                p.status == "active" && PrincipalRole::parse(&p.role) == Some(required_role)
            })
            .unwrap_or(false);
        if !authorized {
            return Err(EngineError::Authorization {
                principal_id: approver_id.to_string(),
                required_role: required_role.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Resolve a handoff from the cache, falling back to the store.
    async fn resolve_handoff(&self, handoff_id: Uuid) -> Result<Handoff, EngineError> {
        let handoff = match self.cache.get(handoff_id) {
            Some(cached) => cached.clone(),
            None => {
                let record = self
                    .ctx
                    .handoffs
                    .get(handoff_id)
                    .await?
                    .ok_or_else(|| not_found_or_processed(handoff_id))?;
                Handoff::from_record(&record)?
            }
        };
        if handoff.status.is_terminal() {
            return Err(not_found_or_processed(handoff_id));
        }
        if handoff.venture_id != self.venture_id {
            return Err(EngineError::NotFound(format!(
                "handoff {handoff_id} belongs to a different venture"
            )));
        }
        Ok(handoff)
    }

    /// The cached current stage, available after initialization.
    pub fn current_stage(&self) -> Option<Stage> {
        self.venture.as_ref().map(|v| v.current_stage)
    }

    /// Cached per-stage state.
    pub fn stage_state(&self, stage: Stage) -> Option<StageState> {
        self.stage_states.get(&stage).copied()
    }

    /// Snapshot summary of the cached view.
    pub fn summary(&self) -> Option<VentureSummary> {
        self.venture.as_ref().map(|venture| VentureSummary {
            venture_id: venture.venture_id,
            name: venture.name.clone(),
            status: venture.status,
            current_stage: venture.current_stage,
            completed_stages: self
                .stage_states
                .values()
                .filter(|s| s.status == StageStatus::Completed)
                .count(),
            pending_handoffs: self.cache.pending().len(),
        })
    }

    /// Cached pending handoffs, oldest first.
    pub fn pending_handoffs(&self) -> Vec<&Handoff> {
        self.cache.pending()
    }
}

fn not_found_or_processed(handoff_id: Uuid) -> EngineError {
    EngineError::NotFound(format!(
        "handoff {handoff_id} not found or already processed"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EngineConfig, EngineContext};
    use crate::domain::handoff::{ArtifactDraft, ArtifactKind};
    use venture_state::fakes::{
        MemoryArtifactStore, MemoryAuditSink, MemoryHandoffStore, MemoryPreferenceStore,
        MemoryPrincipalDirectory, MemorySystemOfRecord,
    };
    use venture_state::{PrincipalRecord, VentureRecord};

    struct Fixture {
        system: Arc<MemorySystemOfRecord>,
        machine: VentureStateMachine,
        venture_id: Uuid,
    }

    fn fixture(stage: Option<u8>) -> Fixture {
        let system = Arc::new(MemorySystemOfRecord::new());
        let venture_id = Uuid::new_v4();
        let mut record = VentureRecord::new(venture_id, "Test Venture");
        record.current_stage = stage;
        system.insert_venture(record);

        let principals = Arc::new(MemoryPrincipalDirectory::new());
        principals.insert_principal(PrincipalRecord {
            principal_id: "chairman-1".to_string(),
            display_name: "The Chairman".to_string(),
            role: "chairman".to_string(),
            status: "active".to_string(),
        });

        let ctx = Arc::new(EngineContext::new(
            system.clone(),
            Arc::new(MemoryHandoffStore::new()),
            Arc::new(MemoryArtifactStore::new()),
            Arc::new(MemoryAuditSink::new()),
            Arc::new(MemoryPreferenceStore::new()),
            principals,
            EngineConfig::default(),
        ));
        let machine = VentureStateMachine::new(ctx, venture_id);
        Fixture {
            system,
            machine,
            venture_id,
        }
    }

    fn valid_package() -> HandoffPackage {
        HandoffPackage {
            artifacts: vec![ArtifactDraft::new(ArtifactKind::IdeaBrief, "brief")],
            key_decisions: vec!["proceed".to_string()],
            open_questions: vec![],
            risks_identified: vec![],
        }
    }

    #[tokio::test]
    async fn test_initialize_unknown_venture_is_fatal() {
        let fx = fixture(Some(3));
        let mut machine =
            VentureStateMachine::new(Arc::clone(&fx.machine.ctx), Uuid::new_v4());
        let err = machine.initialize().await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_initialize_defaults_unset_stage_to_one() {
        let mut fx = fixture(None);
        fx.machine.initialize().await.unwrap();
        assert_eq!(fx.machine.current_stage(), Some(Stage::FIRST));
    }

    #[tokio::test]
    async fn test_freshness_no_op_when_in_sync() {
        let mut fx = fixture(Some(3));
        fx.machine.initialize().await.unwrap();
        fx.machine.verify_state_freshness().await.unwrap();
    }

    #[tokio::test]
    async fn test_freshness_detects_divergence_and_rehydrates() {
        let mut fx = fixture(Some(3));
        fx.machine.initialize().await.unwrap();

        fx.system.set_stage_out_of_band(fx.venture_id, 4);

        let err = fx.machine.verify_state_freshness().await.unwrap_err();
        match err {
            EngineError::StateStaleness {
                cached_stage,
                db_stage,
            } => {
                assert_eq!(cached_stage.get(), 3);
                assert_eq!(db_stage.get(), 4);
            }
            other => panic!("expected staleness, got {other:?}"),
        }
        // Cache re-hydrated as a side effect; a retry succeeds.
        assert_eq!(fx.machine.current_stage().map(Stage::get), Some(4));
        fx.machine.verify_state_freshness().await.unwrap();
    }

    #[tokio::test]
    async fn test_propose_derives_to_stage() {
        let mut fx = fixture(Some(9));
        let outcome = fx
            .machine
            .propose_handoff(HandoffProposal {
                proposed_by: "agent-7".to_string(),
                from_stage: Stage::new(9).unwrap(),
                requested_to_stage: Stage::new(14), // ignored
                package: valid_package(),
            })
            .await
            .unwrap();
        assert!(outcome.accepted);
        let pending = fx.machine.pending_handoffs();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].to_stage.get(), 10);
    }

    #[tokio::test]
    async fn test_propose_rejects_final_stage() {
        let mut fx = fixture(Some(25));
        let outcome = fx
            .machine
            .propose_handoff(HandoffProposal {
                proposed_by: "agent-7".to_string(),
                from_stage: Stage::LAST,
                requested_to_stage: None,
                package: valid_package(),
            })
            .await
            .unwrap();
        assert!(!outcome.accepted);
        assert!(outcome.errors[0].contains("final stage"));
    }

    #[tokio::test]
    async fn test_commit_unknown_approver_is_authorization_failure() {
        let mut fx = fixture(Some(9));
        let err = fx
            .machine
            .commit_stage_transition(CommitRequest {
                handoff_id: Uuid::new_v4(),
                approver_id: "intern-1".to_string(),
                decision: HandoffDecision::Approve,
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Authorization { .. }));
    }

    #[tokio::test]
    async fn test_commit_unknown_handoff_is_not_found() {
        let mut fx = fixture(Some(9));
        let err = fx
            .machine
            .commit_stage_transition(CommitRequest {
                handoff_id: Uuid::new_v4(),
                approver_id: "chairman-1".to_string(),
                decision: HandoffDecision::Approve,
                notes: None,
            })
            .await
            .unwrap_err();
        match err {
            EngineError::NotFound(msg) => {
                assert!(msg.contains("not found or already processed"))
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_summary_counts_pending_and_completed() {
        let mut fx = fixture(Some(9));
        fx.machine
            .propose_handoff(HandoffProposal {
                proposed_by: "agent-7".to_string(),
                from_stage: Stage::new(9).unwrap(),
                requested_to_stage: None,
                package: valid_package(),
            })
            .await
            .unwrap();
        let summary = fx.machine.summary().unwrap();
        assert_eq!(summary.current_stage.get(), 9);
        assert_eq!(summary.pending_handoffs, 1);
        assert_eq!(summary.completed_stages, 0);
    }
}
