//! The activity generator: prompt, completion call with content-policy
//! validation, parameter merge.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    ChatMessage, CompletionProvider, CompletionRequest, DraftContent, GeneratedDraft,
    GenerationError, GenerationParams, ModelId, ModelParameters, PolicyEngine, ResponseValidator,
};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::prompt::{user_prompt, SYSTEM_PROMPT};

/// Retries after the first attempt for one generation.
pub const GENERATION_MAX_RETRIES: u32 = 2;

/// Sampling parameters used for generation.
pub fn generation_params() -> ModelParameters {
    ModelParameters {
        temperature: Some(0.8),
        max_tokens: Some(2000),
        ..ModelParameters::default()
    }
}

// ---------------------------------------------------------------------------
// Draft validator
// ---------------------------------------------------------------------------

/// Accepts a completion only when every required draft field is a non-empty
/// string and the Policy Engine clears all eight content fields.
pub struct DraftValidator {
    policy: Arc<PolicyEngine>,
}

impl DraftValidator {
    pub fn new(policy: Arc<PolicyEngine>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl ResponseValidator for DraftValidator {
    async fn validate(&self, data: &Value) -> Result<bool, GenerationError> {
        let Some(fields) = draft_fields(data) else {
            debug!("draft is missing required fields");
            return Ok(false);
        };

        let result = self.policy.validate(&fields).await?;
        if !result.is_valid {
            info!(
                violations = result.violations.len(),
                "draft rejected by content policy"
            );
        }
        Ok(result.is_valid)
    }
}

/// The eight content fields as text; absent or `null` optional fields become
/// empty strings. `None` when a required field is missing or empty, or when
/// an optional field holds anything other than a string or `null`.
fn draft_fields(data: &Value) -> Option<BTreeMap<String, String>> {
    let object = data.as_object()?;
    let mut fields = BTreeMap::new();

    for name in DraftContent::REQUIRED_FIELDS {
        let value = object.get(name)?.as_str()?;
        if value.is_empty() {
            return None;
        }
        fields.insert(name.to_owned(), value.to_owned());
    }

    for name in DraftContent::OPTIONAL_FIELDS {
        let value = match object.get(name) {
            None | Some(Value::Null) => "",
            Some(Value::String(text)) => text.as_str(),
            Some(_) => return None,
        };
        fields.insert(name.to_owned(), value.to_owned());
    }

    Some(fields)
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Produces policy-cleared drafts from generation parameters.
pub struct ActivityGenerator {
    provider: Arc<dyn CompletionProvider>,
    policy: Arc<PolicyEngine>,
    model: Option<ModelId>,
}

impl ActivityGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, policy: Arc<PolicyEngine>) -> Self {
        Self {
            provider,
            policy,
            model: None,
        }
    }

    /// Overrides the provider's default model for generation requests.
    #[must_use]
    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model = Some(model);
        self
    }

    /// Generates one draft. Provider and policy failures are returned as-is.
    ///
    /// The caller's parameters overwrite anything the provider echoed back.
    #[instrument(
        skip(self, params),
        fields(
            age_group_id = params.age_group_id.as_u64(),
            duration_minutes = params.duration_minutes,
        )
    )]
    pub async fn generate(
        &self,
        params: &GenerationParams,
    ) -> Result<GeneratedDraft, GenerationError> {
        let mut request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_prompt(params)),
        ])
        .with_params(generation_params())
        .with_max_retries(GENERATION_MAX_RETRIES)
        .with_validator(Arc::new(DraftValidator::new(Arc::clone(&self.policy))));

        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let response = self.provider.complete(request).await?;
        let content = response.into_typed::<DraftContent>()?.data;

        Ok(GeneratedDraft::from_parts(content, params))
    }
}
