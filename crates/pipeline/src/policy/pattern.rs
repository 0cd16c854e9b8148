//! Compilation of rule patterns into matchers.
//!
//! Every pattern type is lowered to a [`Regex`] so that matching and global
//! replacement share one code path.

use regex::{NoExpand, Regex, RegexBuilder};

use super::rule::{ContentRule, PatternType};

/// A rule pattern ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
}

impl CompiledPattern {
    /// Compiles `rule.pattern` according to its pattern type and case
    /// sensitivity.
    pub fn compile(rule: &ContentRule) -> Result<Self, regex::Error> {
        let source = match rule.pattern_type {
            PatternType::Exact => regex::escape(&rule.pattern),
            PatternType::Wildcard => wildcard_to_regex(&rule.pattern),
            PatternType::Regex => rule.pattern.clone(),
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!rule.case_sensitive)
            .build()?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Replaces every match with `replacement`, taken literally.
    pub fn replace_all(&self, text: &str, replacement: &str) -> String {
        self.regex.replace_all(text, NoExpand(replacement)).into_owned()
    }
}

/// Escapes everything except `%`, which becomes `.*`.
fn wildcard_to_regex(pattern: &str) -> String {
    pattern
        .split('%')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*")
}
