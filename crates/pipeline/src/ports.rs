//! Port traits implemented by infrastructure crates.
//!
//! The domain defines *what* it needs here; `llm` and `cli` supply *how*.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    CompletionRequest, CompletionResponse, ErrorKind, GenerationError, GenerationParams,
    GenerationRunId, ModelInfo, Timestamp, UserId,
};

/// An external LLM provider.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Runs `request`, including its retry budget and validator, and returns
    /// the interpreted data of the first attempt that succeeds.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse<Value>, GenerationError>;

    /// Lists the models the provider offers.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, GenerationError>;
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

/// What happened to one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// A draft was produced.
    Generated,
    /// Generation failed after admission.
    GenerationFailed { kind: ErrorKind },
}

/// A telemetry record emitted after a generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationEvent {
    pub run_id: GenerationRunId,
    pub user_id: UserId,
    pub params: GenerationParams,
    #[serde(flatten)]
    pub outcome: GenerationOutcome,
    pub occurred_at: Timestamp,
}

/// The event sink could not record an event.
#[derive(Debug, Clone, Error)]
#[error("event sink failure: {0}")]
pub struct EventSinkError(pub String);

/// Receives telemetry events. Failures are the sink's own business: callers
/// log them and carry on.
#[async_trait]
pub trait GenerationEventSink: Send + Sync {
    async fn record(&self, event: GenerationEvent) -> Result<(), EventSinkError>;
}
