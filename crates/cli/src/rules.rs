//! Rule source backed by a JSON file.

use std::path::PathBuf;

use async_trait::async_trait;
use pipeline::{ContentRule, RuleSource, RuleSourceError};
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct RuleRecord {
    #[serde(flatten)]
    rule: ContentRule,
    #[serde(default = "active_by_default")]
    is_active: bool,
}

fn active_by_default() -> bool {
    true
}

/// Reads a JSON array of rules from disk on every fetch and returns the
/// active ones. Records without `is_active` count as active.
#[derive(Debug, Clone)]
pub struct JsonFileRuleSource {
    path: PathBuf,
}

impl JsonFileRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RuleSource for JsonFileRuleSource {
    async fn fetch_active_rules(&self) -> Result<Vec<ContentRule>, RuleSourceError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| RuleSourceError(format!("{}: {e}", self.path.display())))?;
        let records: Vec<RuleRecord> = serde_json::from_str(&text)
            .map_err(|e| RuleSourceError(format!("{}: {e}", self.path.display())))?;

        let rules: Vec<ContentRule> = records
            .into_iter()
            .filter(|record| record.is_active)
            .map(|record| record.rule)
            .collect();
        debug!(path = %self.path.display(), rules = rules.len(), "read content rules");
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{PatternType, RuleId, RuleType};
    use std::io::Write;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn returns_only_active_rules() {
        let file = write(
            r#"[
                {"id": 1, "rule_type": "hard_ban", "pattern": "weapon", "pattern_type": "exact", "is_active": true},
                {"id": 2, "rule_type": "soft_ban", "pattern": "scary", "pattern_type": "exact", "replacement": "exciting", "is_active": false},
                {"id": 3, "rule_type": "replacement", "pattern": "dumb%", "pattern_type": "wildcard", "replacement": "silly"}
            ]"#,
        );

        let rules = JsonFileRuleSource::new(file.path())
            .fetch_active_rules()
            .await
            .unwrap();

        let ids: Vec<RuleId> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RuleId::new(1), RuleId::new(3)]);
        assert_eq!(rules[1].rule_type, RuleType::Replacement);
        assert_eq!(rules[1].pattern_type, PatternType::Wildcard);
        assert!(!rules[1].case_sensitive);
    }

    #[tokio::test]
    async fn missing_file_is_a_source_error() {
        let source = JsonFileRuleSource::new("/nonexistent/questgen/rules.json");
        let err = source.fetch_active_rules().await.unwrap_err();
        assert!(err.0.contains("rules.json"));
    }

    #[tokio::test]
    async fn malformed_file_is_a_source_error() {
        let file = write("{ not json");
        assert!(JsonFileRuleSource::new(file.path())
            .fetch_active_rules()
            .await
            .is_err());
    }
}
