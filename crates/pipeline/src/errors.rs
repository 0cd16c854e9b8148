//! Error taxonomy and retry-policy types for the generation pipeline.
//!
//! [`GenerationError`] is the single closed error type every pipeline component
//! returns. It carries a stable [`ErrorKind`] tag, a human-readable message and
//! an optional machine-readable `details` payload.
//!
//! [`RetryPolicy`] is the cross-cutting classification the completion retry
//! loop matches on: any error that participates in retry decisions must be
//! able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// ## Rules
///
/// - `Retryable` errors: provider API failures other than 401, unusable
///   responses, timeouts, provider rate limiting.
/// - `NonRetryable` errors: invalid configuration, request or content
///   validation failures, local quota rejections, an unreachable rule source,
///   and a rejected API key (401).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally carries the provider-requested minimum delay (from a
    /// `Retry-After` header). The completion client still applies its own
    /// exponential schedule; the hint is preserved for callers.
    Retryable {
        /// Provider-supplied back-off hint. `None` means no hint was given.
        after: Option<Duration>,
    },
    /// The operation must not be retried; the error is surfaced immediately.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

/// Stable tag identifying a [`GenerationError`] variant.
///
/// Callers outside the pipeline map these to localised messages; the
/// snake_case serialisation is part of the caller-facing contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Validation,
    Api,
    Parsing,
    Timeout,
    RateLimit,
    QuotaExceeded,
    RuleSourceUnavailable,
}

impl ErrorKind {
    /// Returns the snake_case tag used on the wire and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::Api => "api",
            Self::Parsing => "parsing",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::QuotaExceeded => "quota_exceeded",
            Self::RuleSourceUnavailable => "rule_source_unavailable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Every failure the generation pipeline can return to its caller.
///
/// The pipeline never collapses these into a generic failure: once the retry
/// loop is exhausted, or for non-retryable kinds, the error reaches the caller
/// verbatim.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationError {
    /// The completion client was set up with invalid configuration.
    ///
    /// Produced at construction time; never retried.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
        /// Offending field and value, when known.
        details: Option<Value>,
    },

    /// A request, its model parameters, or a response failed validation.
    ///
    /// Includes custom-validator rejections (content-policy failures among
    /// them) and HTTP 400 responses. Never retried.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
        /// Offending field, or the rejected data for validator failures.
        details: Option<Value>,
    },

    /// The provider answered with a non-2xx status other than 400 and 429,
    /// or the request never reached it (`status == 0`).
    ///
    /// Retried unless `status == 401`.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code; `0` for network failures.
        status: u16,
        /// Description of the failure.
        message: String,
        /// Provider error body (parsed JSON or `{"message": <text>}`).
        details: Option<Value>,
    },

    /// The provider response was structurally unusable, or its content was
    /// not valid JSON when JSON was required. Retried.
    #[error("Parsing error: {message}")]
    Parsing {
        /// Description of the parse failure.
        message: String,
        /// Truncated raw content and parser message.
        details: Option<Value>,
    },

    /// The provider call did not complete within the configured timeout. Retried.
    #[error("Request timeout after {}ms", .after.as_millis())]
    Timeout {
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The provider returned HTTP 429. Retried.
    #[error("Rate limit exceeded")]
    RateLimit {
        /// Seconds the provider asked callers to wait, from `Retry-After`.
        retry_after: Option<u64>,
    },

    /// The local sliding-window quota rejected the request. Never touches the
    /// network and is never retried.
    #[error("Quota exceeded; retry after {retry_after_seconds}s")]
    QuotaExceeded {
        /// Seconds until the oldest counted request leaves the window.
        retry_after_seconds: u64,
    },

    /// The content-policy rules could not be (re)loaded, so content cannot be
    /// cleared. Treated like a validation failure; never retried.
    #[error("Content policy rules unavailable: {message}")]
    RuleSourceUnavailable {
        /// Description of the rule-source failure.
        message: String,
    },
}

impl GenerationError {
    /// Shorthand for a [`GenerationError::Configuration`] without details.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            details: None,
        }
    }

    /// Shorthand for a [`GenerationError::Validation`] without details.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Shorthand for a [`GenerationError::Parsing`] without details.
    pub fn parsing(message: impl Into<String>) -> Self {
        Self::Parsing {
            message: message.into(),
            details: None,
        }
    }

    /// Attaches a details payload to the variants that carry one.
    ///
    /// Variants without a details slot are returned unchanged.
    #[must_use]
    pub fn with_details(mut self, value: Value) -> Self {
        match &mut self {
            Self::Configuration { details, .. }
            | Self::Validation { details, .. }
            | Self::Api { details, .. }
            | Self::Parsing { details, .. } => *details = Some(value),
            Self::Timeout { .. }
            | Self::RateLimit { .. }
            | Self::QuotaExceeded { .. }
            | Self::RuleSourceUnavailable { .. } => {}
        }
        self
    }

    /// Returns the stable kind tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Api { .. } => ErrorKind::Api,
            Self::Parsing { .. } => ErrorKind::Parsing,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::RuleSourceUnavailable { .. } => ErrorKind::RuleSourceUnavailable,
        }
    }

    /// Returns the machine-readable details payload, if any.
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Configuration { details, .. }
            | Self::Validation { details, .. }
            | Self::Api { details, .. }
            | Self::Parsing { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Seconds the caller should wait before trying again, for the two
    /// rate-limiting kinds.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimit { retry_after } => *retry_after,
            Self::QuotaExceeded {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }

    /// Classifies this error for the completion retry loop.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Configuration { .. }
            | Self::Validation { .. }
            | Self::QuotaExceeded { .. }
            | Self::RuleSourceUnavailable { .. } => RetryPolicy::NonRetryable,
            Self::Api { status: 401, .. } => RetryPolicy::NonRetryable,
            Self::Api { .. } | Self::Parsing { .. } | Self::Timeout { .. } => {
                RetryPolicy::Retryable { after: None }
            }
            Self::RateLimit { retry_after } => RetryPolicy::Retryable {
                after: retry_after.map(Duration::from_secs),
            },
        }
    }
}
