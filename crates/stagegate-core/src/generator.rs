//! Bounded artifact generation.
//!
//! Stage artifacts may be produced by an external (LLM-backed)
//! generator. The engine bounds the wait and falls back to the stage
//! template's fallback draft on timeout or failure — it never blocks a
//! transition indefinitely on content generation.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::handoff::{ArtifactDraft, ArtifactKind};
use crate::domain::stage::Stage;

/// Failure from an external artifact generator.
#[derive(Debug, thiserror::Error)]
#[error("artifact generation failed: {0}")]
pub struct GeneratorError(pub String);

/// External collaborator producing stage artifacts.
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate(
        &self,
        venture_id: Uuid,
        stage: Stage,
        kind: ArtifactKind,
    ) -> Result<ArtifactDraft, GeneratorError>;
}

/// A stage template's fallback output for one artifact kind.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTemplate {
    pub kind: ArtifactKind,
    pub fallback_content: String,
}

impl StageTemplate {
    pub fn fallback_draft(&self) -> ArtifactDraft {
        ArtifactDraft::new(self.kind, self.fallback_content.clone())
    }
}

/// Generate an artifact with a bounded wait, falling back to the
/// template's draft on timeout or generator failure.
pub async fn generate_with_timeout(
    generator: &dyn ArtifactGenerator,
    template: &StageTemplate,
    venture_id: Uuid,
    stage: Stage,
    timeout: Duration,
) -> ArtifactDraft {
    match tokio::time::timeout(timeout, generator.generate(venture_id, stage, template.kind)).await
    {
        Ok(Ok(draft)) => draft,
        Ok(Err(err)) => {
            tracing::warn!(
                event = "generator.failed",
                venture_id = %venture_id,
                stage = stage.get(),
                kind = %template.kind,
                error = %err,
            );
            template.fallback_draft()
        }
        Err(_) => {
            tracing::warn!(
                event = "generator.timed_out",
                venture_id = %venture_id,
                stage = stage.get(),
                kind = %template.kind,
                timeout_ms = timeout.as_millis() as u64,
            );
            template.fallback_draft()
        }
    }
}
