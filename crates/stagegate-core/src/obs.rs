//! Structured observability hooks for transition lifecycle events.
//!
//! This module provides:
//! - Venture-scoped tracing spans via `TransitionSpan` RAII guard
//! - Emission functions for key lifecycle events: proposal, gate
//!   evaluation, staleness detection, commit
//!
//! Events are emitted at `info!` level; set `RUST_LOG` to filter.

use tracing::info;
use uuid::Uuid;

/// RAII guard that enters a venture-scoped tracing span for the duration
/// of a transition operation.
pub struct TransitionSpan {
    _span: tracing::span::EnteredSpan,
}

impl TransitionSpan {
    /// Create and enter a span tagged with the venture id.
    pub fn enter(venture_id: Uuid) -> Self {
        let span = tracing::info_span!("stagegate.transition", venture_id = %venture_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a handoff was proposed.
pub fn emit_handoff_proposed(venture_id: Uuid, handoff_id: Uuid, from_stage: u8, to_stage: u8) {
    info!(
        event = "handoff.proposed",
        venture_id = %venture_id,
        handoff_id = %handoff_id,
        from_stage = from_stage,
        to_stage = to_stage,
    );
}

/// Emit event: a stage gate was evaluated.
pub fn emit_gate_evaluated(venture_id: Uuid, gate_name: Option<&str>, status: &str, passed: bool) {
    info!(
        event = "gate.evaluated",
        venture_id = %venture_id,
        gate = gate_name.unwrap_or("none"),
        status = %status,
        passed = passed,
    );
}

/// Emit event: the cached stage diverged from the system of record.
pub fn emit_staleness_detected(venture_id: Uuid, cached_stage: u8, db_stage: u8) {
    tracing::warn!(
        event = "state.staleness_detected",
        venture_id = %venture_id,
        cached_stage = cached_stage,
        db_stage = db_stage,
    );
}

/// Emit event: a stage transition committed.
pub fn emit_transition_committed(
    venture_id: Uuid,
    from_stage: u8,
    to_stage: u8,
    was_duplicate: bool,
) {
    info!(
        event = "transition.committed",
        venture_id = %venture_id,
        from_stage = from_stage,
        to_stage = to_stage,
        was_duplicate = was_duplicate,
    );
}

/// Emit event: a best-effort side effect failed (warning level).
pub fn emit_side_effect_failed(context: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "side_effect.failed", context = %context, error = %error);
}
