//! Environment-supplied configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use llm::OpenRouterConfig;
use pipeline::{policy::DEFAULT_RULE_TTL, ModelId};

use crate::observability::LogFormat;

pub const DEFAULT_HTTP_REFERER: &str = "https://kidsquest.app";
pub const DEFAULT_APP_TITLE: &str = "KidsQuest";
pub const DEFAULT_RULES_PATH: &str = "content_rules.json";

/// Everything the composition root reads from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: OpenRouterConfig,
    pub disable_rate_limit: bool,
    pub rules_path: PathBuf,
    pub rule_cache_ttl: Duration,
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`; blank values count as unset.
    ///
    /// A missing API key is left for the client's own validation to report.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let timeout_ms = match var("OPENROUTER_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().with_context(|| {
                format!("OPENROUTER_TIMEOUT_MS must be a whole number of milliseconds, got {raw:?}")
            })?,
            None => llm::DEFAULT_TIMEOUT.as_millis() as u64,
        };

        let rule_cache_ttl = match var("RULE_CACHE_TTL_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().with_context(|| {
                format!("RULE_CACHE_TTL_SECS must be a whole number of seconds, got {raw:?}")
            })?),
            None => DEFAULT_RULE_TTL,
        };

        let mut provider = OpenRouterConfig::new(
            var("OPENROUTER_API_KEY").unwrap_or_default(),
            var("APP_HTTP_REFERER").unwrap_or_else(|| DEFAULT_HTTP_REFERER.to_owned()),
            var("APP_TITLE").unwrap_or_else(|| DEFAULT_APP_TITLE.to_owned()),
        )
        .with_timeout(Duration::from_millis(timeout_ms));
        if let Some(base_url) = var("OPENROUTER_BASE_URL") {
            provider = provider.with_base_url(base_url);
        }
        if let Some(model) = var("OPENROUTER_MODEL").and_then(ModelId::new) {
            provider = provider.with_default_model(model);
        }

        Ok(Self {
            provider,
            disable_rate_limit: var("DISABLE_RATE_LIMIT").is_some_and(|v| is_truthy(&v)),
            rules_path: PathBuf::from(
                var("CONTENT_RULES_PATH").unwrap_or_else(|| DEFAULT_RULES_PATH.to_owned()),
            ),
            rule_cache_ttl,
            log_format: match var("LOG_FORMAT") {
                Some(v) if v.trim().eq_ignore_ascii_case("text") => LogFormat::Text,
                _ => LogFormat::Json,
            },
            otlp_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[("OPENROUTER_API_KEY", "sk-1")]).unwrap();
        assert_eq!(config.provider.api_key, "sk-1");
        assert_eq!(config.provider.http_referer, DEFAULT_HTTP_REFERER);
        assert_eq!(config.provider.app_title, DEFAULT_APP_TITLE);
        assert_eq!(config.provider.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.provider.base_url, None);
        assert!(!config.disable_rate_limit);
        assert_eq!(config.rules_path, PathBuf::from(DEFAULT_RULES_PATH));
        assert_eq!(config.rule_cache_ttl, DEFAULT_RULE_TTL);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.otlp_endpoint, None);
    }

    #[test]
    fn overrides_are_read() {
        let config = config(&[
            ("OPENROUTER_API_KEY", "sk-1"),
            ("OPENROUTER_BASE_URL", "http://localhost:8080/v1"),
            ("OPENROUTER_MODEL", "openai/gpt-4o-mini"),
            ("OPENROUTER_TIMEOUT_MS", "5000"),
            ("DISABLE_RATE_LIMIT", "TRUE"),
            ("RULE_CACHE_TTL_SECS", "60"),
            ("LOG_FORMAT", "text"),
        ])
        .unwrap();
        assert_eq!(config.provider.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(
            config.provider.default_model.as_ref().map(ModelId::as_str),
            Some("openai/gpt-4o-mini")
        );
        assert_eq!(config.provider.timeout, Some(Duration::from_millis(5000)));
        assert!(config.disable_rate_limit);
        assert_eq!(config.rule_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let err = config(&[("OPENROUTER_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("OPENROUTER_TIMEOUT_MS"));
    }

    #[test]
    fn missing_key_surfaces_at_client_construction() {
        let config = config(&[]).unwrap();
        assert!(config.provider.validate().is_err());
    }
}
