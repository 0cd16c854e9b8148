//! Shared value types for the activity-generation domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (durations within `1..=480` minutes,
//! non-negative token counts) and participate in domain computations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{AgeGroupId, GenerationError, PropId};

// ---------------------------------------------------------------------------
// Token accounting
// ---------------------------------------------------------------------------

/// Number of tokens consumed in a completion call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenCount(u64);

impl TokenCount {
    /// Creates a [`TokenCount`] from a raw integer.
    pub fn new(count: u64) -> Self {
        Self(count)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token usage reported by the provider for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: TokenCount,
    /// Tokens in the generated completion.
    pub completion_tokens: TokenCount,
    /// Provider-reported total.
    pub total_tokens: TokenCount,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Generation parameters
// ---------------------------------------------------------------------------

/// Where the activity takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Home,
    Outdoor,
}

/// How physically demanding the activity should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

/// Longest activity that may be requested, in minutes.
pub const MAX_DURATION_MINUTES: u32 = 480;

/// Longest accepted client version label.
pub const MAX_APP_VERSION_LEN: usize = 20;

/// Caller-chosen parameters for one generation.
///
/// These are echoed verbatim into the resulting [`GeneratedDraft`]; the
/// provider is never trusted to return them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub age_group_id: AgeGroupId,
    pub duration_minutes: u32,
    pub location: Location,
    pub energy_level: EnergyLevel,
    #[serde(default)]
    pub prop_ids: Vec<PropId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

impl GenerationParams {
    /// Checks the parameter ranges before any quota slot or provider call is
    /// spent on the request.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.age_group_id.as_u64() == 0 {
            return Err(GenerationError::validation("age_group_id must be positive")
                .with_details(json!({ "field": "age_group_id" })));
        }

        if !(1..=MAX_DURATION_MINUTES).contains(&self.duration_minutes) {
            return Err(GenerationError::validation(format!(
                "duration_minutes must be between 1 and {MAX_DURATION_MINUTES}"
            ))
            .with_details(json!({
                "field": "duration_minutes",
                "value": self.duration_minutes,
            })));
        }

        if let Some(index) = self.prop_ids.iter().position(|p| p.as_u64() == 0) {
            return Err(GenerationError::validation("prop ids must be positive")
                .with_details(json!({ "field": "prop_ids", "index": index })));
        }

        if let Some(version) = &self.app_version {
            if version.chars().count() > MAX_APP_VERSION_LEN {
                return Err(GenerationError::validation(format!(
                    "app_version must be at most {MAX_APP_VERSION_LEN} characters"
                ))
                .with_details(json!({ "field": "app_version" })));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// The textual part of a draft, as produced by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftContent {
    pub title: String,
    pub hook: String,
    pub step1: String,
    pub step2: String,
    pub step3: String,
    #[serde(default)]
    pub easier_version: Option<String>,
    #[serde(default)]
    pub harder_version: Option<String>,
    #[serde(default)]
    pub safety_notes: Option<String>,
}

impl DraftContent {
    /// Names of the fields that must be present and non-empty.
    pub const REQUIRED_FIELDS: [&'static str; 5] = ["title", "hook", "step1", "step2", "step3"];

    /// Names of the fields that may be absent or `null`.
    pub const OPTIONAL_FIELDS: [&'static str; 3] =
        ["easier_version", "harder_version", "safety_notes"];
}

/// Where a draft came from. Only provider-generated drafts exist in this
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftSource {
    Ai,
}

/// An unsaved, provider-generated activity, merged with the caller's
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedDraft {
    #[serde(flatten)]
    pub content: DraftContent,
    pub age_group_id: AgeGroupId,
    pub duration_minutes: u32,
    pub location: Location,
    pub energy_level: EnergyLevel,
    pub prop_ids: Vec<PropId>,
    pub source: DraftSource,
}

impl GeneratedDraft {
    /// Combines provider content with the caller's parameters. The caller's
    /// values always win.
    pub fn from_parts(content: DraftContent, params: &GenerationParams) -> Self {
        Self {
            content,
            age_group_id: params.age_group_id,
            duration_minutes: params.duration_minutes,
            location: params.location,
            energy_level: params.energy_level,
            prop_ids: params.prop_ids.clone(),
            source: DraftSource::Ai,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn params() -> GenerationParams {
        GenerationParams {
            age_group_id: AgeGroupId::new(1),
            duration_minutes: 45,
            location: Location::Outdoor,
            energy_level: EnergyLevel::High,
            prop_ids: vec![],
            app_version: None,
        }
    }

    #[test]
    fn accepts_reference_parameters() {
        assert!(params().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_duration() {
        for minutes in [0, MAX_DURATION_MINUTES + 1] {
            let p = GenerationParams {
                duration_minutes: minutes,
                ..params()
            };
            let err = p.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn rejects_zero_ids_and_long_versions() {
        let p = GenerationParams {
            age_group_id: AgeGroupId::new(0),
            ..params()
        };
        assert!(p.validate().is_err());

        let p = GenerationParams {
            prop_ids: vec![PropId::new(3), PropId::new(0)],
            ..params()
        };
        assert!(p.validate().is_err());

        let p = GenerationParams {
            app_version: Some("x".repeat(MAX_APP_VERSION_LEN + 1)),
            ..params()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn draft_serialises_flat_with_echoed_parameters() {
        let content = DraftContent {
            title: "Treasure map".into(),
            hook: "A pirate lost their map".into(),
            step1: "a".into(),
            step2: "b".into(),
            step3: "c".into(),
            easier_version: None,
            harder_version: None,
            safety_notes: Some("Stay in the garden".into()),
        };
        let draft = GeneratedDraft::from_parts(content, &params());
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["title"], "Treasure map");
        assert_eq!(value["location"], "outdoor");
        assert_eq!(value["energy_level"], "high");
        assert_eq!(value["source"], "ai");
        assert_eq!(value["prop_ids"], serde_json::json!([]));
    }
}
