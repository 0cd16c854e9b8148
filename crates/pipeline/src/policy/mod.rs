//! Policy Engine: content-policy validation against a cached rule set.
//!
//! Rules are fetched from a [`RuleSource`] and cached for a TTL. The cache is
//! replaced wholesale on refresh: it is either empty (never loaded) or holds
//! the complete active set as of its fetch instant. A failed refresh leaves
//! the previous state untouched and fails the validation, because content
//! that cannot be checked must not be treated as safe.

mod pattern;
mod rule;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::{GenerationError, RuleId};

pub use pattern::CompiledPattern;
pub use rule::{
    ContentRule, InMemoryRuleSource, PatternType, RuleSource, RuleSourceError, RuleType,
};

/// Reference lifetime of a fetched rule set.
pub const DEFAULT_RULE_TTL: Duration = Duration::from_secs(5 * 60);

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A `hard_ban` match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub rule_type: RuleType,
    pub pattern: String,
}

/// A `soft_ban` match together with the preferred wording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub field: String,
    pub original: String,
    pub replacement: String,
}

/// Outcome of [`PolicyEngine::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentValidationResult {
    /// `true` when no `hard_ban` rule matched.
    pub is_valid: bool,
    pub violations: Vec<Violation>,
    pub suggestions: Vec<Suggestion>,
    /// The fields with `replacement` rules applied. Present only when
    /// `is_valid`; content that failed validation must not be persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitized_content: Option<BTreeMap<String, String>>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CachedRule {
    rule: ContentRule,
    pattern: CompiledPattern,
}

#[derive(Debug)]
struct RuleCache {
    rules: Arc<BTreeMap<RuleId, CachedRule>>,
    fetched_at: Instant,
}

/// Validates text fields against the active content-policy rules.
///
/// Construct once per process and share by `Arc`; the rule cache is owned
/// exclusively by the engine.
pub struct PolicyEngine {
    source: Arc<dyn RuleSource>,
    ttl: Duration,
    cache: Mutex<Option<RuleCache>>,
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl PolicyEngine {
    /// An engine with the reference five-minute cache TTL.
    pub fn new(source: Arc<dyn RuleSource>) -> Self {
        Self::with_ttl(source, DEFAULT_RULE_TTL)
    }

    pub fn with_ttl(source: Arc<dyn RuleSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Forces the next load to re-fetch from the source.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    /// Number of rules in the current cache (0 if never loaded).
    pub async fn rule_count(&self) -> usize {
        self.cache
            .lock()
            .await
            .as_ref()
            .map_or(0, |cache| cache.rules.len())
    }

    /// Returns the cached rules, re-fetching when older than the TTL.
    ///
    /// The cache lock is held across the fetch so concurrent callers wait for
    /// one refresh instead of issuing their own.
    #[instrument(skip(self), level = "debug")]
    async fn load_rules(&self) -> Result<Arc<BTreeMap<RuleId, CachedRule>>, GenerationError> {
        let mut cache = self.cache.lock().await;
        let now = Instant::now();

        if let Some(current) = cache.as_ref() {
            if now.duration_since(current.fetched_at) < self.ttl {
                return Ok(Arc::clone(&current.rules));
            }
        }

        let fetched = self.source.fetch_active_rules().await.map_err(|e| {
            warn!(error = %e, "failed to load content policy rules");
            GenerationError::RuleSourceUnavailable {
                message: e.to_string(),
            }
        })?;

        let mut rules = BTreeMap::new();
        for rule in fetched {
            let pattern = CompiledPattern::compile(&rule).map_err(|e| {
                warn!(rule_id = %rule.id, error = %e, "content policy rule has an invalid pattern");
                GenerationError::RuleSourceUnavailable {
                    message: format!("rule {} has an invalid pattern: {e}", rule.id),
                }
            })?;
            rules.insert(rule.id, CachedRule { rule, pattern });
        }

        info!(rules = rules.len(), "content policy rules loaded");
        let rules = Arc::new(rules);
        *cache = Some(RuleCache {
            rules: Arc::clone(&rules),
            fetched_at: now,
        });
        Ok(rules)
    }

    /// Checks every non-empty field against every active rule.
    ///
    /// Fails only when the rule set cannot be loaded.
    pub async fn validate(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> Result<ContentValidationResult, GenerationError> {
        let rules = self.load_rules().await?;

        let mut violations = Vec::new();
        let mut suggestions = Vec::new();
        let mut sanitized = fields.clone();

        for (field, text) in fields {
            if text.is_empty() {
                continue;
            }

            for cached in rules.values() {
                if !cached.pattern.is_match(text) {
                    continue;
                }
                let rule = &cached.rule;
                match (rule.rule_type, rule.replacement.as_deref()) {
                    (RuleType::HardBan, _) => violations.push(Violation {
                        field: field.clone(),
                        rule_type: rule.rule_type,
                        pattern: rule.pattern.clone(),
                    }),
                    (RuleType::SoftBan, Some(replacement)) => suggestions.push(Suggestion {
                        field: field.clone(),
                        original: rule.pattern.clone(),
                        replacement: replacement.to_owned(),
                    }),
                    (RuleType::Replacement, Some(replacement)) => {
                        if let Some(working) = sanitized.get_mut(field) {
                            *working = cached.pattern.replace_all(working, replacement);
                        }
                    }
                    (RuleType::SoftBan | RuleType::Replacement, None) => {}
                }
            }
        }

        let is_valid = violations.is_empty();
        debug!(
            is_valid,
            violations = violations.len(),
            suggestions = suggestions.len(),
            "content validated"
        );

        Ok(ContentValidationResult {
            is_valid,
            violations,
            suggestions,
            sanitized_content: is_valid.then_some(sanitized),
        })
    }
}
