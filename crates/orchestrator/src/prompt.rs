//! Prompt text for activity generation.

use pipeline::{AgeGroupId, EnergyLevel, GenerationParams, Location};

/// Fixed instruction: safety constraints and the required output shape.
pub const SYSTEM_PROMPT: &str = r#"You are an expert at creating creative, safe play scenarios for children.

SAFETY RULES:
- Always put the child's safety first
- Avoid dangerous activities (heights, sharp objects, fire)
- For the "outdoor" location suggest only safe places (park, garden, playground)
- Never use themes involving violence, weapons, alcohol or cigarettes

CONTENT GUIDELINES:
- Match the difficulty to the age group
- Write positive, supportive narratives
- Encourage cooperation, creativity and problem solving
- Avoid competition; focus on play and discovery

RESPONSE FORMAT:
Reply ONLY with JSON and no additional text. Structure:
{
  "title": "Short, catchy title (10-200 characters)",
  "hook": "Intriguing introduction (10-300 characters)",
  "step1": "First quest step (10-250 characters)",
  "step2": "Second quest step (10-250 characters)",
  "step3": "Third quest step (10-250 characters)",
  "easier_version": "Easier variant or null",
  "harder_version": "Harder variant or null",
  "safety_notes": "Safety notes or null"
}"#;

/// Parameter-specific instruction for one generation.
pub fn user_prompt(params: &GenerationParams) -> String {
    format!(
        "Generate a play scenario (quest) with the following parameters:\n\
         - Age group: {}\n\
         - Duration: {} minutes\n\
         - Location: {}\n\
         - Energy level: {}\n\
         \n\
         Return the answer ONLY as JSON following the structure given in the system instructions.",
        age_group_label(params.age_group_id),
        params.duration_minutes,
        location_label(params.location),
        energy_label(params.energy_level),
    )
}

fn age_group_label(id: AgeGroupId) -> &'static str {
    match id.as_u64() {
        1 => "3-4 years",
        2 => "5-6 years",
        3 => "7-8 years",
        4 => "9-10 years",
        _ => "unknown",
    }
}

fn location_label(location: Location) -> &'static str {
    match location {
        Location::Home => "at home",
        Location::Outdoor => "outdoors",
    }
}

fn energy_label(energy: EnergyLevel) -> &'static str {
    match energy {
        EnergyLevel::Low => "low",
        EnergyLevel::Medium => "medium",
        EnergyLevel::High => "high",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(age: u64) -> GenerationParams {
        GenerationParams {
            age_group_id: AgeGroupId::new(age),
            duration_minutes: 45,
            location: Location::Outdoor,
            energy_level: EnergyLevel::High,
            prop_ids: vec![],
            app_version: None,
        }
    }

    #[test]
    fn user_prompt_names_every_parameter() {
        let prompt = user_prompt(&params(1));
        assert!(prompt.contains("Age group: 3-4 years"));
        assert!(prompt.contains("Duration: 45 minutes"));
        assert!(prompt.contains("Location: outdoors"));
        assert!(prompt.contains("Energy level: high"));
    }

    #[test]
    fn unmapped_age_group_is_unknown() {
        assert!(user_prompt(&params(9)).contains("Age group: unknown"));
    }

    #[test]
    fn system_prompt_lists_every_draft_field() {
        for field in pipeline::DraftContent::REQUIRED_FIELDS
            .iter()
            .chain(pipeline::DraftContent::OPTIONAL_FIELDS.iter())
        {
            assert!(SYSTEM_PROMPT.contains(&format!("\"{field}\"")), "{field}");
        }
    }
}
