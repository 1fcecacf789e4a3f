// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM-based profile extraction.
//!
//! Extraction is comparatively expensive and noisy, so it is gated: it runs
//! only after a successful enrichment, on a high-confidence profile-update
//! decision, or on an explicit user request. Running it unconditionally
//! drifts the profile as speculative assistant suggestions get misread as
//! facts.

use crevio_core::error::CrevioError;
use crevio_core::traits::ProviderAdapter;
use crevio_core::types::{ProviderMessage, ProviderRequest, UserRecord};
use crevio_intent::coerce::{coerce_string, coerce_string_list};
use crevio_intent::ProfileUpdateDecision;
use serde_json::Value;
use tracing::{debug, warn};

use crate::merge::ProfileDelta;

/// System prompt for profile extraction.
const PROFILE_PROMPT: &str = r#"You maintain a content creator's business profile. From the conversation below (and the analysis results, if any), extract newly stated or newly discovered facts about the creator.

Output a single JSON object with any of these keys (omit keys with nothing new):
{
  "display_name": "name the user goes by",
  "content_niche": ["niche topics"],
  "primary_platforms": ["platforms they publish on"],
  "target_audience": ["audience descriptors"],
  "goals": ["business or growth goals"],
  "brand_voice": ["voice/tone descriptors"],
  "profile_data": {"any other structured facts": "..."}
}

Rules:
- Only concrete facts the user stated or the analysis discovered. Never suggestions, questions, or restatements of the current profile below.
- If nothing new, output an empty object: {}

Current profile:
{current_profile}

{analysis_section}Conversation:
{conversation}

Output the JSON object only, no explanation:"#;

/// Decides whether profile extraction runs this turn.
///
/// `profile_confidence` is the confidence-only gate (0.75 by default),
/// stricter than the general action gate.
pub fn should_extract(
    decision: &ProfileUpdateDecision,
    enrichment_succeeded: bool,
    profile_confidence: f64,
) -> bool {
    enrichment_succeeded
        || decision.explicit_request
        || decision.decision.actionable(profile_confidence)
}

/// Extracts profile field changes from a completed exchange.
pub struct ProfileExtractor {
    model: String,
}

impl ProfileExtractor {
    pub fn new(model: String) -> Self {
        Self { model }
    }

    /// One extraction call; malformed output degrades to an empty delta.
    pub async fn extract(
        &self,
        provider: &dyn ProviderAdapter,
        user: &UserRecord,
        conversation: &[ProviderMessage],
        analysis_context: Option<&str>,
    ) -> Result<ProfileDelta, CrevioError> {
        let prompt = build_profile_prompt(user, conversation, analysis_context);

        let request = ProviderRequest {
            model: self.model.clone(),
            system_prompt: None,
            messages: vec![ProviderMessage::user(prompt)],
            max_tokens: 1024,
            stream: false,
        };

        let response = provider.complete(request).await?;

        match parse_profile_delta(&response.content) {
            Some(delta) => Ok(delta),
            None => {
                warn!("profile extraction output unparseable, treating as no changes");
                debug!("raw extraction output: {}", response.content);
                Ok(ProfileDelta::default())
            }
        }
    }
}

fn build_profile_prompt(
    user: &UserRecord,
    conversation: &[ProviderMessage],
    analysis_context: Option<&str>,
) -> String {
    let mut conversation_text = String::new();
    for msg in conversation {
        let role = match msg.role.as_str() {
            "user" => "User",
            "assistant" => "Assistant",
            _ => &msg.role,
        };
        conversation_text.push_str(&format!("{role}: {}\n", msg.content));
    }

    let current_profile = serde_json::json!({
        "display_name": user.display_name,
        "content_niche": user.content_niche,
        "primary_platforms": user.primary_platforms,
        "profile_data": user.profile_data,
    });

    let analysis_section = match analysis_context {
        Some(context) => format!("Analysis results:\n{context}\n\n"),
        None => String::new(),
    };

    PROFILE_PROMPT
        .replace("{current_profile}", &current_profile.to_string())
        .replace("{analysis_section}", &analysis_section)
        .replace("{conversation}", &conversation_text)
}

/// Parse extraction output into a delta, coercing variable shapes.
///
/// Returns `None` when no JSON object is found at all.
pub fn parse_profile_delta(response: &str) -> Option<ProfileDelta> {
    let trimmed = response.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')? + 1;
    if end <= start {
        return None;
    }

    let root: Value = serde_json::from_str(&trimmed[start..end]).ok()?;
    let map = root.as_object()?;

    let list = |key: &str| {
        map.get(key)
            .map(coerce_string_list)
            .unwrap_or_default()
    };

    Some(ProfileDelta {
        display_name: map.get("display_name").and_then(coerce_string),
        content_niche: list("content_niche"),
        primary_platforms: list("primary_platforms"),
        target_audience: list("target_audience"),
        goals: list("goals"),
        brand_voice: list("brand_voice"),
        profile_data: map
            .get("profile_data")
            .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
            .cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crevio_intent::Decision;
    use serde_json::json;

    fn decision(should_act: bool, confidence: f64, explicit: bool) -> ProfileUpdateDecision {
        ProfileUpdateDecision {
            decision: Decision {
                should_act,
                confidence,
                reason: String::new(),
            },
            fields: vec![],
            explicit_request: explicit,
        }
    }

    #[test]
    fn gating_enrichment_success_always_extracts() {
        assert!(should_extract(&decision(false, 0.0, false), true, 0.75));
    }

    #[test]
    fn gating_explicit_request_always_extracts() {
        assert!(should_extract(&decision(false, 0.0, true), false, 0.75));
    }

    #[test]
    fn gating_confidence_threshold() {
        assert!(should_extract(&decision(true, 0.8, false), false, 0.75));
        assert!(!should_extract(&decision(true, 0.7, false), false, 0.75));
        assert!(!should_extract(&decision(false, 0.9, false), false, 0.75));
    }

    #[test]
    fn parse_full_delta() {
        let response = json!({
            "display_name": "Maya",
            "content_niche": ["vegan baking"],
            "primary_platforms": ["Instagram", "TikTok"],
            "target_audience": ["home bakers"],
            "goals": ["launch a course"],
            "brand_voice": ["warm"],
            "profile_data": {"business_location": "Austin"}
        })
        .to_string();

        let delta = parse_profile_delta(&response).unwrap();
        assert_eq!(delta.display_name.as_deref(), Some("Maya"));
        assert_eq!(delta.content_niche, vec!["vegan baking"]);
        assert_eq!(delta.primary_platforms.len(), 2);
        assert_eq!(delta.profile_data.unwrap()["business_location"], "Austin");
    }

    #[test]
    fn parse_empty_object_is_empty_delta() {
        let delta = parse_profile_delta("{}").unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn parse_coerces_single_string_to_list() {
        let response = json!({"content_niche": "fitness"}).to_string();
        let delta = parse_profile_delta(&response).unwrap();
        assert_eq!(delta.content_niche, vec!["fitness"]);
    }

    #[test]
    fn parse_empty_profile_data_dropped() {
        let response = json!({"profile_data": {}}).to_string();
        let delta = parse_profile_delta(&response).unwrap();
        assert!(delta.profile_data.is_none());
        assert!(delta.is_empty());
    }

    #[test]
    fn parse_garbage_is_none() {
        assert!(parse_profile_delta("nothing to extract").is_none());
    }

    #[test]
    fn parse_markdown_wrapped() {
        let response = "```json\n{\"goals\": [\"grow reach\"]}\n```";
        let delta = parse_profile_delta(response).unwrap();
        assert_eq!(delta.goals, vec!["grow reach"]);
    }

    #[test]
    fn prompt_includes_profile_and_analysis() {
        let user = UserRecord {
            id: "u1".into(),
            display_name: Some("Maya".into()),
            content_niche: vec!["Vegan Baking".into()],
            primary_platforms: vec![],
            profile_data: json!({}),
            profile_version: 1,
            usage_count: 0,
            usage_limit: 500,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let prompt = build_profile_prompt(
            &user,
            &[ProviderMessage::user("I also run a blog now")],
            Some("Blog covers gluten-free recipes"),
        );
        assert!(prompt.contains("Vegan Baking"));
        assert!(prompt.contains("Analysis results:\nBlog covers gluten-free recipes"));
        assert!(prompt.contains("User: I also run a blog now"));
    }

    #[test]
    fn prompt_omits_analysis_section_when_absent() {
        let user = UserRecord {
            id: "u1".into(),
            display_name: None,
            content_niche: vec![],
            primary_platforms: vec![],
            profile_data: json!({}),
            profile_version: 1,
            usage_count: 0,
            usage_limit: 500,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let prompt = build_profile_prompt(&user, &[], None);
        assert!(!prompt.contains("Analysis results:"));
    }
}
