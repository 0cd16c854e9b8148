//! Content-policy rules and the port they are loaded through.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RuleId;

/// Severity of a rule match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Any match invalidates the content.
    HardBan,
    /// A match is reported as a suggestion; validity is unaffected.
    SoftBan,
    /// Matches are silently rewritten in the sanitised copy.
    Replacement,
}

/// How [`ContentRule::pattern`] is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Substring containment.
    Exact,
    /// `%` matches any run of characters; everything else is literal.
    Wildcard,
    /// A regular expression used verbatim.
    Regex,
}

/// One active rule, as supplied by the rule source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRule {
    pub id: RuleId,
    pub rule_type: RuleType,
    pub pattern: String,
    pub pattern_type: PatternType,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub replacement: Option<String>,
}

/// The rule source could not deliver the active rule set.
#[derive(Debug, Clone, Error)]
#[error("rule source failure: {0}")]
pub struct RuleSourceError(pub String);

/// Where active content-policy rules come from.
///
/// Implementations return every rule flagged active. The pipeline only reads
/// from the source.
#[async_trait]
pub trait RuleSource: Send + Sync {
    async fn fetch_active_rules(&self) -> Result<Vec<ContentRule>, RuleSourceError>;
}

/// A rule source backed by an in-process list that callers may swap out.
#[derive(Debug, Default)]
pub struct InMemoryRuleSource {
    rules: RwLock<Vec<ContentRule>>,
}

impl InMemoryRuleSource {
    pub fn new(rules: Vec<ContentRule>) -> Arc<Self> {
        Arc::new(Self {
            rules: RwLock::new(rules),
        })
    }

    /// Replaces the rule list; engines observe it after their cache expires.
    pub fn replace(&self, rules: Vec<ContentRule>) {
        match self.rules.write() {
            Ok(mut guard) => *guard = rules,
            Err(poisoned) => *poisoned.into_inner() = rules,
        }
    }
}

#[async_trait]
impl RuleSource for InMemoryRuleSource {
    async fn fetch_active_rules(&self) -> Result<Vec<ContentRule>, RuleSourceError> {
        self.rules
            .read()
            .map(|rules| rules.clone())
            .map_err(|_| RuleSourceError("rule list lock poisoned".into()))
    }
}
