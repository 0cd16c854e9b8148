//! Activity generation orchestration.
//!
//! Composes the Completion Client and the Policy Engine into
//! [`ActivityGenerator`], and wraps it with quota admission and telemetry in
//! [`GenerationService`].
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** This crate sequences calls between business logic
//! in the [`pipeline`] crate and the [`pipeline::CompletionProvider`] port. It
//! adds no error kinds of its own; every failure reaching the caller is a
//! [`pipeline::GenerationError`] produced further down.

pub mod generator;
pub mod prompt;
pub mod service;

pub use generator::{generation_params, ActivityGenerator, DraftValidator, GENERATION_MAX_RETRIES};
pub use prompt::{user_prompt, SYSTEM_PROMPT};
pub use service::{GenerationService, HOUR_SCOPE, MINUTE_SCOPE};
