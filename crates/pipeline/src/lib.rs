//! Core domain for the activity-generation pipeline.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, and the error taxonomy used throughout the pipeline, together with the
//! two stateful services that need no I/O of their own: the Quota Gate and the
//! Policy Engine. Infrastructure crates implement the port traits defined here;
//! they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** No network or file I/O happens in
//! this crate. It defines *what* is needed; infrastructure crates define *how*
//! to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`UserId`, `QuotaKey`, `RuleId`, etc.) |
//! | [`types`] | Value types (`TokenUsage`, `GenerationParams`, `GeneratedDraft`, etc.) |
//! | [`chat`] | Completion request/response types and the validator hook |
//! | [`errors`] | `GenerationError` taxonomy and `RetryPolicy` |
//! | [`quota`] | Sliding-window Quota Gate |
//! | [`policy`] | Content Policy Engine and the `RuleSource` port |
//! | [`ports`] | `CompletionProvider` and telemetry ports |

pub mod chat;
pub mod errors;
pub mod identifiers;
pub mod policy;
pub mod ports;
pub mod quota;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use chat::{
    ChatMessage, CompletionRequest, CompletionResponse, ModelInfo, ModelParameters,
    ResponseFormat, ResponseMetadata, ResponseValidator, Role, StopSequences,
};
pub use errors::{ErrorKind, GenerationError, RetryPolicy};
pub use identifiers::{AgeGroupId, GenerationRunId, ModelId, PropId, QuotaKey, RuleId, UserId};
pub use policy::{
    ContentRule, ContentValidationResult, InMemoryRuleSource, PatternType, PolicyEngine,
    RuleSource, RuleSourceError, RuleType, Suggestion, Violation,
};
pub use ports::{
    CompletionProvider, EventSinkError, GenerationEvent, GenerationEventSink, GenerationOutcome,
};
pub use quota::{QuotaConfig, QuotaDecision, QuotaGate};
pub use types::{
    DraftContent, DraftSource, EnergyLevel, GeneratedDraft, GenerationParams, Location,
    Timestamp, TokenCount, TokenUsage,
};
