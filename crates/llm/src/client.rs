//! The OpenRouter-compatible completion client.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    CompletionProvider, CompletionRequest, CompletionResponse, GenerationError, ModelInfo,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

use crate::config::{OpenRouterConfig, ResolvedConfig};
use crate::redact::sanitize_for_logging;
use crate::request::{build_request_body, validate_request};
use crate::response::{map_http_error, parse_completion, parse_models};
use crate::retry::retry_with_backoff;
use crate::transport::{
    HttpMethod, HttpRequest, HttpTransport, ReqwestTransport, TransportError,
};

/// Chat-completions client for an OpenRouter-compatible endpoint.
///
/// Cheap to share behind an `Arc`; holds no per-request state.
pub struct OpenRouterClient {
    config: ResolvedConfig,
    transport: Arc<dyn HttpTransport>,
}

impl OpenRouterClient {
    /// Validates `config` and builds a client over a reqwest transport.
    pub fn new(config: OpenRouterConfig) -> Result<Self, GenerationError> {
        let config = config.resolve()?;
        let transport = ReqwestTransport::new(config.timeout).map_err(|e| {
            GenerationError::configuration("HTTP client could not be built")
                .with_details(json!({ "error": e.to_string() }))
        })?;
        Ok(Self {
            config,
            transport: Arc::new(transport),
        })
    }

    /// Validates `config` and builds a client over the given transport.
    pub fn with_transport(
        config: OpenRouterConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            config: config.resolve()?,
            transport,
        })
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            (
                "Authorization".to_owned(),
                format!("Bearer {}", self.config.api_key),
            ),
            ("Content-Type".to_owned(), "application/json".to_owned()),
            ("HTTP-Referer".to_owned(), self.config.http_referer.clone()),
            ("X-Title".to_owned(), self.config.app_title.clone()),
        ]
    }

    /// One HTTP exchange bounded by the configured timeout. Returns the body
    /// of a 2xx response; everything else becomes a typed error.
    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<String>,
    ) -> Result<String, GenerationError> {
        let request = HttpRequest {
            method,
            url: format!("{}{}", self.config.base_url, path),
            headers: self.headers(),
            body,
        };

        let timeout = self.config.timeout;
        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Err(_) | Ok(Err(TransportError::Timeout)) => {
                return Err(log_failure(path, GenerationError::Timeout { after: timeout }))
            }
            Ok(Err(TransportError::Network(message))) => {
                return Err(log_failure(
                    path,
                    GenerationError::Api {
                        status: 0,
                        message: "Network error occurred".to_owned(),
                        details: Some(json!({ "message": message })),
                    },
                ))
            }
            Ok(Ok(response)) => response,
        };

        if !response.is_success() {
            let err = map_http_error(
                response.status,
                response.retry_after.as_deref(),
                &response.body,
            );
            return Err(log_failure(path, err));
        }

        Ok(response.body)
    }

    async fn attempt(
        &self,
        request: &CompletionRequest,
        body: &str,
        attempt: u32,
    ) -> Result<CompletionResponse<Value>, GenerationError> {
        debug!(attempt = attempt + 1, "sending completion request");

        let text = self
            .execute(HttpMethod::Post, "/chat/completions", Some(body.to_owned()))
            .await?;
        let response = parse_completion(&text, request.response_format.as_ref())?;

        if let Some(validator) = &request.validator {
            if !validator.validate(&response.data).await? {
                return Err(GenerationError::validation("Response failed custom validation")
                    .with_details(json!({ "data": response.data })));
            }
        }

        Ok(response)
    }
}

/// Logs `err` with its details redacted and hands it back.
fn log_failure(path: &str, err: GenerationError) -> GenerationError {
    let details = err.details().map(sanitize_for_logging).unwrap_or(Value::Null);
    error!(
        path,
        kind = err.kind().as_str(),
        details = %details,
        error = %err,
        "provider request failed"
    );
    err
}

impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterClient {
    #[instrument(
        skip(self, request),
        fields(messages = request.messages.len(), max_retries = request.max_retries)
    )]
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse<Value>, GenerationError> {
        validate_request(&request)?;
        let body = build_request_body(&request, &self.config)?.to_string();

        let request = &request;
        let body = body.as_str();
        let response = retry_with_backoff(request.max_retries, |attempt| {
            self.attempt(request, body, attempt)
        })
        .await?;

        info!(
            model = %response.metadata.model,
            total_tokens = response.metadata.usage.total_tokens.as_u64(),
            finish_reason = response.metadata.finish_reason.as_deref().unwrap_or(""),
            "completion succeeded"
        );
        Ok(response)
    }

    #[instrument(skip(self))]
    async fn list_models(&self) -> Result<Vec<ModelInfo>, GenerationError> {
        let text = self.execute(HttpMethod::Get, "/models", None).await?;
        let models = parse_models(&text).map_err(|e| log_failure("/models", e))?;
        debug!(count = models.len(), "listed provider models");
        Ok(models)
    }
}
