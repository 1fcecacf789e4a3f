// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn context: the immutable value threaded through the pipeline.
//!
//! Each stage reads the context by reference and returns a delta; the
//! orchestrator folds the delta into a new context. No stage mutates
//! shared state, so every stage's inputs are exactly what the previous
//! stages produced.

use crevio_core::types::{
    Conversation, EnrichmentOutcome, Message, UserRecord, WebSearchResult,
};
use crevio_intent::UnifiedIntentDecision;
use crevio_memory::ScoredMemory;

/// The validated inbound request for one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Conversation id, or `"new"` to create one.
    pub conversation_id: String,
    /// Caller identity.
    pub user_id: String,
    /// The user's message text.
    pub content: String,
    /// Client-generated key echoed back in the message-id frame.
    pub correlation_key: Option<String>,
}

/// Enrichment outcomes for the turn, in the order they ran.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentResults {
    pub social: Option<EnrichmentOutcome>,
    pub hashtag: Option<EnrichmentOutcome>,
    pub blog: Option<EnrichmentOutcome>,
}

impl EnrichmentResults {
    /// True when at least one enrichment ran and succeeded.
    pub fn any_success(&self) -> bool {
        [&self.social, &self.hashtag, &self.blog]
            .into_iter()
            .flatten()
            .any(EnrichmentOutcome::is_success)
    }

    /// Prompt context assembled from successful analyses; `None` when no
    /// enrichment produced anything (failures contribute nothing).
    pub fn context_text(&self) -> Option<String> {
        let mut sections = Vec::new();
        for (label, outcome) in [
            ("Social profile analysis", &self.social),
            ("Hashtag analysis", &self.hashtag),
            ("Blog analysis", &self.blog),
        ] {
            if let Some(EnrichmentOutcome::Success { analysis, .. }) = outcome {
                sections.push(format!("{label}:\n{analysis}"));
            }
        }
        if sections.is_empty() {
            None
        } else {
            Some(sections.join("\n\n"))
        }
    }
}

/// Everything a turn has established so far. Built up stage by stage via
/// the `with_*` constructors; never mutated in place.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub request: TurnRequest,
    pub conversation: Conversation,
    pub user: UserRecord,
    /// Conversation history including the just-persisted user message.
    pub history: Vec<Message>,
    /// Top-k memories for this turn's query.
    pub memories: Vec<ScoredMemory>,
    pub decision: UnifiedIntentDecision,
    pub enrichment: EnrichmentResults,
    pub search: Option<WebSearchResult>,
    /// Whether a web search was attempted (distinct from succeeded).
    pub search_attempted: bool,
}

impl TurnContext {
    /// Initial context, before the load join.
    pub fn new(request: TurnRequest, conversation: Conversation, user: UserRecord) -> Self {
        Self {
            request,
            conversation,
            user,
            history: Vec::new(),
            memories: Vec::new(),
            decision: UnifiedIntentDecision::all_negative(),
            enrichment: EnrichmentResults::default(),
            search: None,
            search_attempted: false,
        }
    }

    pub fn with_loaded(self, history: Vec<Message>, memories: Vec<ScoredMemory>) -> Self {
        Self {
            history,
            memories,
            ..self
        }
    }

    pub fn with_decision(self, decision: UnifiedIntentDecision) -> Self {
        Self { decision, ..self }
    }

    pub fn with_enrichment(self, enrichment: EnrichmentResults) -> Self {
        Self { enrichment, ..self }
    }

    pub fn with_search(self, search: Option<WebSearchResult>, attempted: bool) -> Self {
        Self {
            search,
            search_attempted: attempted,
            ..self
        }
    }

    /// History as provider messages, oldest first.
    pub fn provider_history(&self) -> Vec<crevio_core::types::ProviderMessage> {
        self.history
            .iter()
            .map(|m| crevio_core::types::ProviderMessage {
                role: m.role.clone(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// Memory contents in retrieval order, for prompt assembly.
    pub fn memory_contents(&self) -> Vec<String> {
        self.memories
            .iter()
            .map(|m| m.memory.content.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> TurnRequest {
        TurnRequest {
            conversation_id: "c1".into(),
            user_id: "u1".into(),
            content: "hello".into(),
            correlation_key: None,
        }
    }

    fn conversation() -> Conversation {
        Conversation {
            id: "c1".into(),
            user_id: "u1".into(),
            title: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn user() -> UserRecord {
        UserRecord {
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
        }
    }

    #[test]
    fn with_constructors_fold_deltas() {
        let ctx = TurnContext::new(request(), conversation(), user());
        assert!(ctx.history.is_empty());

        let history = vec![Message {
            id: "m1".into(),
            conversation_id: "c1".into(),
            role: "user".into(),
            content: "hello".into(),
            metadata: None,
            created_at: String::new(),
        }];
        let ctx = ctx.with_loaded(history, vec![]);
        assert_eq!(ctx.history.len(), 1);
        assert_eq!(ctx.provider_history()[0].role, "user");
    }

    #[test]
    fn enrichment_success_detection() {
        let mut results = EnrichmentResults::default();
        assert!(!results.any_success());
        assert!(results.context_text().is_none());

        results.social = Some(EnrichmentOutcome::Failure {
            error: "rate limited".into(),
        });
        assert!(!results.any_success());

        results.hashtag = Some(EnrichmentOutcome::Success {
            analysis: json!({"volume": 120}),
            cached: false,
        });
        assert!(results.any_success());
        let text = results.context_text().unwrap();
        assert!(text.contains("Hashtag analysis"));
        assert!(!text.contains("Social profile analysis"));
    }
}
