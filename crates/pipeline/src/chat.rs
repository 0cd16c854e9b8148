//! Completion request and response types shared by the provider port and its
//! adapters.
//!
//! These are provider-neutral: the `llm` crate shapes them into the wire
//! format, the orchestrator builds them from generation parameters.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{GenerationError, ModelId, TokenUsage};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Author of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Model parameters
// ---------------------------------------------------------------------------

/// One stop sequence or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

/// Optional sampling knobs. Unset fields are omitted from the wire body.
///
/// Ranges (checked before any network call): `temperature` in `[0, 2]`,
/// `max_tokens >= 1`, `top_p` in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequences>,
}

impl ModelParameters {
    /// Returns `self` with every field that `overrides` sets replaced.
    #[must_use]
    pub fn merged_with(&self, overrides: &ModelParameters) -> ModelParameters {
        ModelParameters {
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            top_p: overrides.top_p.or(self.top_p),
            top_k: overrides.top_k.or(self.top_k),
            frequency_penalty: overrides.frequency_penalty.or(self.frequency_penalty),
            presence_penalty: overrides.presence_penalty.or(self.presence_penalty),
            stop: overrides.stop.clone().or_else(|| self.stop.clone()),
        }
    }

    /// Rejects out-of-range values.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(GenerationError::validation("Temperature must be between 0 and 2")
                    .with_details(json!({ "field": "temperature", "value": t })));
            }
        }

        if let Some(max) = self.max_tokens {
            if max < 1 {
                return Err(GenerationError::validation("max_tokens must be at least 1")
                    .with_details(json!({ "field": "max_tokens", "value": max })));
            }
        }

        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(GenerationError::validation("top_p must be between 0 and 1")
                    .with_details(json!({ "field": "top_p", "value": p })));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Response format
// ---------------------------------------------------------------------------

/// How the provider should shape its answer, and how strictly the client
/// interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Plain text; content is never parsed as JSON.
    Text,
    /// Any JSON object; content must parse.
    JsonObject,
    /// JSON matching `schema`; content must parse.
    JsonSchema {
        name: String,
        /// Defaults to `true` on the wire when unset.
        strict: Option<bool>,
        schema: Value,
    },
}

impl ResponseFormat {
    /// Returns `true` when the content must be valid JSON.
    pub fn requires_json(&self) -> bool {
        matches!(self, Self::JsonObject | Self::JsonSchema { .. })
    }
}

// ---------------------------------------------------------------------------
// Custom validation hook
// ---------------------------------------------------------------------------

/// Caller-supplied check run on the parsed response data of every attempt.
///
/// `Ok(false)` rejects the data, which the client reports as a
/// [`GenerationError::Validation`] carrying the rejected data. `Err(_)` is
/// surfaced as-is (e.g. the rule source was unavailable).
#[async_trait]
pub trait ResponseValidator: Send + Sync {
    async fn validate(&self, data: &Value) -> Result<bool, GenerationError>;
}

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

/// One completion call, possibly spanning several attempts.
#[derive(Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Overrides the client's default model.
    pub model: Option<ModelId>,
    /// Merged over the client's default parameters; request values win.
    pub params: Option<ModelParameters>,
    pub response_format: Option<ResponseFormat>,
    /// Additional attempts after the first; `0` means a single attempt.
    pub max_retries: u32,
    pub validator: Option<Arc<dyn ResponseValidator>>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: ModelParameters) -> Self {
        self.params = Some(params);
        self
    }

    #[must_use]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn ResponseValidator>) -> Self {
        self.validator = Some(validator);
        self
    }
}

impl std::fmt::Debug for CompletionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("messages", &self.messages.len())
            .field("model", &self.model)
            .field("params", &self.params)
            .field("response_format", &self.response_format)
            .field("max_retries", &self.max_retries)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Provider-reported facts about a completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

/// A successful completion: the interpreted data, the raw content it came
/// from, and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse<T = Value> {
    pub data: T,
    pub raw_content: String,
    pub metadata: ResponseMetadata,
}

impl CompletionResponse<Value> {
    /// Deserialises `data` into the caller's declared shape.
    ///
    /// A shape mismatch is a [`GenerationError::Parsing`].
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<CompletionResponse<T>, GenerationError> {
        let data = serde_json::from_value(self.data).map_err(|e| {
            GenerationError::parsing("Response data does not match the expected shape")
                .with_details(json!({ "error": e.to_string() }))
        })?;
        Ok(CompletionResponse {
            data,
            raw_content: self.raw_content,
            metadata: self.metadata,
        })
    }
}

/// A model offered by the provider.
///
/// Only `id` is guaranteed; the remaining descriptors vary between providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pricing: Option<Value>,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub supports_tools: Option<bool>,
    #[serde(default)]
    pub supports_vision: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_params_override_defaults_fieldwise() {
        let defaults = ModelParameters {
            temperature: Some(0.7),
            max_tokens: Some(2000),
            ..ModelParameters::default()
        };
        let overrides = ModelParameters {
            temperature: Some(0.2),
            top_p: Some(0.9),
            ..ModelParameters::default()
        };
        let merged = defaults.merged_with(&overrides);
        assert_eq!(merged.temperature, Some(0.2));
        assert_eq!(merged.max_tokens, Some(2000));
        assert_eq!(merged.top_p, Some(0.9));
    }

    #[test]
    fn parameter_ranges_are_enforced() {
        let bad = [
            ModelParameters {
                temperature: Some(2.5),
                ..Default::default()
            },
            ModelParameters {
                temperature: Some(f64::NAN),
                ..Default::default()
            },
            ModelParameters {
                max_tokens: Some(0),
                ..Default::default()
            },
            ModelParameters {
                top_p: Some(-0.1),
                ..Default::default()
            },
        ];
        for params in bad {
            assert!(params.validate().is_err(), "{params:?}");
        }

        let edge = ModelParameters {
            temperature: Some(2.0),
            max_tokens: Some(1),
            top_p: Some(0.0),
            ..Default::default()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn unset_parameters_are_omitted_on_the_wire() {
        let params = ModelParameters {
            max_tokens: Some(10),
            stop: Some(StopSequences::Many(vec!["END".into()])),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({ "max_tokens": 10, "stop": ["END"] })
        );
    }

    #[test]
    fn typed_conversion_reports_shape_mismatch_as_parsing() {
        #[derive(Debug, Deserialize)]
        struct Shape {
            #[allow(dead_code)]
            a: u32,
        }

        let response = CompletionResponse {
            data: json!({ "b": 1 }),
            raw_content: "{\"b\":1}".into(),
            metadata: ResponseMetadata {
                model: "m".into(),
                usage: TokenUsage::default(),
                finish_reason: None,
            },
        };
        let err = response.into_typed::<Shape>().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parsing);
    }
}
