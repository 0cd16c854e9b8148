//! Client configuration and its construction-time validation.

use std::time::Duration;

use pipeline::{GenerationError, ModelId, ModelParameters};
use serde_json::json;

/// Provider endpoint used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Model used when neither the client nor the request names one.
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-maverick:free";

/// Per-attempt timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shortest timeout accepted at construction.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1000);

/// Settings for an [`crate::OpenRouterClient`].
///
/// `api_key`, `http_referer` and `app_title` are mandatory; everything else
/// falls back to the defaults above.
#[derive(Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub http_referer: String,
    pub app_title: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub default_model: Option<ModelId>,
    pub default_params: Option<ModelParameters>,
}

impl OpenRouterConfig {
    pub fn new(
        api_key: impl Into<String>,
        http_referer: impl Into<String>,
        app_title: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            http_referer: http_referer.into(),
            app_title: app_title.into(),
            base_url: None,
            timeout: None,
            default_model: None,
            default_params: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_default_model(mut self, model: ModelId) -> Self {
        self.default_model = Some(model);
        self
    }

    #[must_use]
    pub fn with_default_params(mut self, params: ModelParameters) -> Self {
        self.default_params = Some(params);
        self
    }

    /// Fails fast on missing identity or a too-short timeout.
    pub fn validate(&self) -> Result<(), GenerationError> {
        let required = [
            ("api_key", &self.api_key, "API key is required"),
            ("http_referer", &self.http_referer, "HTTP Referer is required"),
            ("app_title", &self.app_title, "App title is required"),
        ];
        for (field, value, message) in required {
            if value.trim().is_empty() {
                return Err(GenerationError::configuration(message)
                    .with_details(json!({ "field": field })));
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout < MIN_TIMEOUT {
                return Err(GenerationError::configuration("Timeout must be at least 1000ms")
                    .with_details(json!({
                        "field": "timeout",
                        "value": timeout.as_millis() as u64,
                    })));
            }
        }

        Ok(())
    }

    /// Validates and fills in defaults.
    pub(crate) fn resolve(self) -> Result<ResolvedConfig, GenerationError> {
        self.validate()?;

        let default_model = match self.default_model {
            Some(model) => model,
            None => ModelId::new(DEFAULT_MODEL)
                .ok_or_else(|| GenerationError::configuration("default model is empty"))?,
        };

        Ok(ResolvedConfig {
            api_key: self.api_key,
            http_referer: self.http_referer,
            app_title: self.app_title,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned())
                .trim_end_matches('/')
                .to_owned(),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            default_model,
            default_params: self.default_params.unwrap_or_else(|| ModelParameters {
                temperature: Some(0.7),
                max_tokens: Some(2000),
                ..ModelParameters::default()
            }),
        })
    }
}

impl std::fmt::Debug for OpenRouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterConfig")
            .field("api_key", &"[REDACTED]")
            .field("http_referer", &self.http_referer)
            .field("app_title", &self.app_title)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("default_model", &self.default_model)
            .field("default_params", &self.default_params)
            .finish()
    }
}

/// Configuration with every default applied.
#[derive(Clone)]
pub(crate) struct ResolvedConfig {
    pub api_key: String,
    pub http_referer: String,
    pub app_title: String,
    pub base_url: String,
    pub timeout: Duration,
    pub default_model: ModelId,
    pub default_params: ModelParameters,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}
