// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unified intent classification.
//!
//! One non-streaming model call per turn produces all six sub-decisions
//! atomically, so they reflect a single consistent read of the conversation.
//! Classification is an optimization, not a correctness requirement: any
//! failure (timeout, malformed output) degrades to the all-negative decision
//! and the turn proceeds.

use crevio_core::traits::ProviderAdapter;
use crevio_core::types::{ProviderMessage, ProviderRequest};
use serde_json::Value;
use tracing::{debug, warn};

use crate::coerce::{coerce_bool, coerce_confidence, coerce_string, coerce_string_list};
use crate::decision::{
    BlogDecision, Decision, HashtagDecision, PhaseDecision, ProfileUpdateDecision,
    SocialProfileDecision, UnifiedIntentDecision, WebSearchDecision, WorkflowPhase,
};

/// System prompt for the classification call.
const CLASSIFICATION_PROMPT: &str = r#"You are an intent classifier for a content-creator assistant. Read the conversation, the user's profile, and their stored memories, then decide what the assistant should do for the latest user message.

Output a single JSON object with exactly these keys. Every sub-decision has "should_act" (boolean), "confidence" (number 0-1), and "reason" (short string).

{
  "web_search": {"should_act": ..., "confidence": ..., "reason": ..., "query": "search query or null"},
  "social_profile": {"should_act": ..., "confidence": ..., "reason": ..., "username": "handle without @ or null"},
  "hashtag": {"should_act": ..., "confidence": ..., "reason": ..., "hashtag": "tag without # or null"},
  "blog": {"should_act": ..., "confidence": ..., "reason": ..., "urls": ["..."]},
  "profile_update": {"should_act": ..., "confidence": ..., "reason": ..., "fields": ["..."], "explicit_request": boolean},
  "workflow_phase": {"should_act": true, "confidence": ..., "reason": ..., "phase": "discovery" | "enrichment" | "generation"}
}

Guidance:
- web_search: only for questions needing current external information (trends, news, platform changes).
- social_profile / hashtag / blog: only when the user names a concrete handle, tag, or URL to look at.
- profile_update: when the message states new facts about the user's business, audience, goals, or voice. Set explicit_request true only if the user directly asked to update their profile.
- workflow_phase: "discovery" while the user's niche and goals are still unknown, "enrichment" while gathering external context, "generation" once enough profile exists to create content.

User profile:
{profile}

Stored memories:
{memories}

Conversation:
{history}

Output the JSON object only, no explanation:"#;

/// Classifies the intent of each user turn with one model call.
pub struct IntentClassifier {
    model: String,
    history_window: usize,
}

impl IntentClassifier {
    pub fn new(model: String, history_window: usize) -> Self {
        Self {
            model,
            history_window,
        }
    }

    /// Classify the latest turn.
    ///
    /// Never fails: provider errors and unparseable output both degrade to
    /// [`UnifiedIntentDecision::all_negative`].
    pub async fn classify(
        &self,
        provider: &dyn ProviderAdapter,
        history: &[ProviderMessage],
        profile: &Value,
        memories: &[String],
    ) -> UnifiedIntentDecision {
        let prompt = self.build_prompt(history, profile, memories);

        let request = ProviderRequest {
            model: self.model.clone(),
            system_prompt: None,
            messages: vec![ProviderMessage::user(prompt)],
            max_tokens: 1024,
            stream: false,
        };

        let response = match provider.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!("intent classification call failed, using all-negative decision: {e}");
                return UnifiedIntentDecision::all_negative();
            }
        };

        match parse_decision_response(&response.content) {
            Some(decision) => decision,
            None => {
                warn!("intent classification output unparseable, using all-negative decision");
                debug!("raw classifier output: {}", response.content);
                UnifiedIntentDecision::all_negative()
            }
        }
    }

    fn build_prompt(
        &self,
        history: &[ProviderMessage],
        profile: &Value,
        memories: &[String],
    ) -> String {
        let window_start = history.len().saturating_sub(self.history_window);
        let mut history_text = String::new();
        for msg in &history[window_start..] {
            let role = match msg.role.as_str() {
                "user" => "User",
                "assistant" => "Assistant",
                _ => &msg.role,
            };
            history_text.push_str(&format!("{role}: {}\n", msg.content));
        }

        let memories_text = if memories.is_empty() {
            "(none)".to_string()
        } else {
            memories
                .iter()
                .map(|m| format!("- {m}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        CLASSIFICATION_PROMPT
            .replace("{profile}", &profile.to_string())
            .replace("{memories}", &memories_text)
            .replace("{history}", &history_text)
    }
}

/// Parse the classifier output into a typed decision.
///
/// Tolerates markdown wrapping and surrounding prose; every field passes
/// through the coercion layer. Returns `None` when no JSON object is found.
pub fn parse_decision_response(response: &str) -> Option<UnifiedIntentDecision> {
    let trimmed = response.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')? + 1;
    if end <= start {
        return None;
    }

    let root: Value = serde_json::from_str(&trimmed[start..end]).ok()?;
    let map = root.as_object()?;

    let web_search_params = sub_value(map, "web_search");
    let social_params = sub_value(map, "social_profile");
    let hashtag_params = sub_value(map, "hashtag");
    let blog_params = sub_value(map, "blog");
    let profile_params = sub_value(map, "profile_update");
    let phase_params = sub_value(map, "workflow_phase");

    Some(UnifiedIntentDecision {
        web_search: WebSearchDecision {
            decision: base_decision(&web_search_params),
            query: field(&web_search_params, "query").and_then(|v| coerce_string(&v)),
        },
        social_profile: SocialProfileDecision {
            decision: base_decision(&social_params),
            username: field(&social_params, "username")
                .and_then(|v| coerce_string(&v))
                .map(|u| u.trim_start_matches('@').to_string()),
        },
        hashtag: HashtagDecision {
            decision: base_decision(&hashtag_params),
            hashtag: field(&hashtag_params, "hashtag")
                .and_then(|v| coerce_string(&v))
                .map(|h| h.trim_start_matches('#').to_string()),
        },
        blog: BlogDecision {
            decision: base_decision(&blog_params),
            urls: field(&blog_params, "urls")
                .map(|v| coerce_string_list(&v))
                .unwrap_or_default(),
        },
        profile_update: ProfileUpdateDecision {
            decision: base_decision(&profile_params),
            fields: field(&profile_params, "fields")
                .map(|v| coerce_string_list(&v))
                .unwrap_or_default(),
            explicit_request: field(&profile_params, "explicit_request")
                .map(|v| coerce_bool(&v))
                .unwrap_or(false),
        },
        workflow_phase: PhaseDecision {
            decision: base_decision(&phase_params),
            phase: field(&phase_params, "phase")
                .and_then(|v| coerce_string(&v))
                .map(|p| WorkflowPhase::from_str_value(&p))
                .unwrap_or_default(),
        },
    })
}

/// A sub-decision's raw value; a missing or non-object key yields null,
/// which coerces to a negative decision.
fn sub_value(map: &serde_json::Map<String, Value>, key: &str) -> Value {
    map.get(key).cloned().unwrap_or(Value::Null)
}

fn field(params: &Value, key: &str) -> Option<Value> {
    params.get(key).cloned()
}

fn base_decision(params: &Value) -> Decision {
    Decision {
        should_act: field(params, "should_act")
            .map(|v| coerce_bool(&v))
            .unwrap_or(false),
        confidence: field(params, "confidence")
            .map(|v| coerce_confidence(&v))
            .unwrap_or(0.0),
        reason: field(params, "reason")
            .and_then(|v| coerce_string(&v))
            .unwrap_or_default(),
    }
}
