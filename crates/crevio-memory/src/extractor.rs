// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM-based memory extraction from conversation turns.
//!
//! One extraction call per turn against the cheaper classifier model, then
//! per-fact embedding and dedup against the user's existing memories.
//! Conversation facts and analysis-sourced facts deduplicate differently:
//! a conversation fact close to an existing memory is dropped, while an
//! analysis fact close to an existing memory replaces it in place, since
//! fresh analysis data supersedes what was derived before.

use std::sync::Arc;

use crevio_core::error::CrevioError;
use crevio_core::traits::{EmbeddingAdapter, ProviderAdapter};
use crevio_core::types::{EmbeddingInput, ProviderMessage, ProviderRequest};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::MemoryStore;
use crate::types::{
    cosine_similarity, ExtractedFact, ExtractionResult, Memory, MemorySource, Provenance,
};

/// At most this many candidate facts are processed per turn.
const MAX_FACTS_PER_TURN: usize = 6;

/// Facts the model is less than half sure about are not worth storing.
const MIN_FACT_CONFIDENCE: f64 = 0.5;

/// System prompt for memory extraction.
const EXTRACTION_PROMPT: &str = r#"Extract facts about this content creator from the conversation that would be useful to remember in future conversations. Output between 2 and 6 facts as a JSON array. If there are fewer than 2 memorable facts, output fewer, down to an empty array: []

For each fact:
- "content": The fact as a standalone statement (e.g., "The user runs a vegan bakery in Austin")
- "provenance": "user_stated" if the user said it directly, "inferred" if you deduced it from context
- "confidence": 0.0 to 1.0, how certain the fact is

Only include facts that are:
1. About the user, their business, audience, content, or goals
2. Specific and declarative (never questions, never tentative suggestions)
3. Not already covered by the known facts below

Known facts (do not repeat these):
{known_facts}

Conversation:
{conversation}

Output JSON array only, no explanation:"#;

/// Extracts and stores long-term memories for a user.
pub struct MemoryExtractor {
    store: Arc<MemoryStore>,
    embedder: Arc<dyn EmbeddingAdapter + Send + Sync>,
    extraction_model: String,
    /// Conversation facts at or above this similarity are dropped.
    insertion_threshold: f32,
    /// Analysis facts at or above this similarity replace the match in place.
    upsert_threshold: f32,
}

impl MemoryExtractor {
    pub fn new(
        store: Arc<MemoryStore>,
        embedder: Arc<dyn EmbeddingAdapter + Send + Sync>,
        extraction_model: String,
        insertion_threshold: f32,
        upsert_threshold: f32,
    ) -> Self {
        Self {
            store,
            embedder,
            extraction_model,
            insertion_threshold,
            upsert_threshold,
        }
    }

    /// Extract memories from the latest turn of a conversation.
    ///
    /// Calls the extraction model once, then embeds and deduplicates each
    /// candidate fact against the user's existing memories. A failed parse
    /// degrades to zero facts rather than an error.
    pub async fn extract_from_conversation(
        &self,
        provider: &dyn ProviderAdapter,
        user_id: &str,
        conversation: &[ProviderMessage],
    ) -> Result<ExtractionResult, CrevioError> {
        let known = self.store.recent_contents(user_id, 20).await?;
        let prompt = build_extraction_prompt(conversation, &known);

        let request = ProviderRequest {
            model: self.extraction_model.clone(),
            system_prompt: None,
            messages: vec![ProviderMessage::user(prompt)],
            max_tokens: 1024,
            stream: false,
        };

        let response = provider.complete(request).await?;

        let mut facts = parse_extraction_response(&response.content);
        facts.retain(|f| !is_question(&f.content) && f.confidence >= MIN_FACT_CONFIDENCE);
        facts.truncate(MAX_FACTS_PER_TURN);

        if facts.is_empty() {
            return Ok(ExtractionResult::default());
        }

        let mut result = ExtractionResult::default();
        // Grows as facts are inserted, so duplicates within the same turn
        // deduplicate against each other too.
        let mut existing = self.store.get_user_embeddings(user_id).await?;

        for fact in &facts {
            let embedding = self.embed_one(&fact.content).await?;

            if let Some((_, sim)) = find_most_similar(&embedding, &existing)
                && sim >= self.insertion_threshold
            {
                debug!(similarity = sim, "dropping near-duplicate fact: {}", fact.content);
                result.skipped += 1;
                continue;
            }

            let memory = self.build_memory(
                user_id,
                &fact.content,
                embedding,
                MemorySource::Conversation,
                fact.provenance,
            );
            self.store.save(&memory).await?;
            existing.push((memory.id.clone(), memory.embedding.clone()));
            result.inserted.push(memory);
        }

        Ok(result)
    }

    /// Store facts derived from an enrichment analysis.
    ///
    /// A fact within the upsert threshold of an existing memory replaces
    /// that memory's content and embedding in place, keeping its id.
    pub async fn store_analysis_facts(
        &self,
        user_id: &str,
        facts: &[String],
    ) -> Result<ExtractionResult, CrevioError> {
        let mut result = ExtractionResult::default();
        if facts.is_empty() {
            return Ok(result);
        }

        let mut existing = self.store.get_user_embeddings(user_id).await?;

        for content in facts {
            let content = content.trim();
            if content.is_empty() || is_question(content) {
                continue;
            }

            let embedding = self.embed_one(content).await?;

            if let Some((existing_id, sim)) = find_most_similar(&embedding, &existing)
                && sim >= self.upsert_threshold
            {
                debug!(
                    similarity = sim,
                    "analysis fact supersedes {existing_id} in place"
                );
                self.store
                    .replace_in_place(&existing_id, content, &embedding)
                    .await?;
                if let Some(entry) = existing.iter_mut().find(|(id, _)| *id == existing_id) {
                    entry.1 = embedding;
                }
                if let Some(updated) = self.store.get_by_id(&existing_id).await? {
                    result.upserted.push(updated);
                }
                continue;
            }

            let memory = self.build_memory(
                user_id,
                content,
                embedding,
                MemorySource::Analysis,
                Provenance::AnalysisDerived,
            );
            self.store.save(&memory).await?;
            existing.push((memory.id.clone(), memory.embedding.clone()));
            result.inserted.push(memory);
        }

        Ok(result)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, CrevioError> {
        let output = self
            .embedder
            .embed(EmbeddingInput {
                texts: vec![text.to_string()],
            })
            .await?;
        output
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| CrevioError::Internal("embedding returned no vectors".to_string()))
    }

    fn build_memory(
        &self,
        user_id: &str,
        content: &str,
        embedding: Vec<f32>,
        source: MemorySource,
        provenance: Provenance,
    ) -> Memory {
        let now = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        Memory {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            embedding,
            source,
            importance: compute_importance(content, provenance),
            provenance,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Build the extraction prompt from conversation messages and known facts.
fn build_extraction_prompt(conversation: &[ProviderMessage], known: &[String]) -> String {
    let mut conversation_text = String::new();
    for msg in conversation {
        let role = match msg.role.as_str() {
            "user" => "User",
            "assistant" => "Assistant",
            _ => &msg.role,
        };
        conversation_text.push_str(&format!("{role}: {}\n", msg.content));
    }

    let known_text = if known.is_empty() {
        "(none)".to_string()
    } else {
        known
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    EXTRACTION_PROMPT
        .replace("{known_facts}", &known_text)
        .replace("{conversation}", &conversation_text)
}

/// Parse the extraction response into structured facts.
///
/// Handles markdown code block wrapping and surrounding prose. Returns an
/// empty Vec on parse failure; extraction never fails the turn.
pub fn parse_extraction_response(response: &str) -> Vec<ExtractedFact> {
    let trimmed = response.trim();

    let start = trimmed.find('[').unwrap_or(0);
    let end = trimmed.rfind(']').map(|i| i + 1).unwrap_or(trimmed.len());
    let json_str = &trimmed[start..end.max(start)];

    match serde_json::from_str::<Vec<ExtractedFact>>(json_str) {
        Ok(facts) => facts
            .into_iter()
            .filter(|f| !f.content.trim().is_empty())
            .collect(),
        Err(e) => {
            warn!("failed to parse extraction response: {e}");
            debug!("raw response: {response}");
            Vec::new()
        }
    }
}

fn is_question(content: &str) -> bool {
    content.trim_end().ends_with('?')
}

/// Retrieval importance for a fact: 0.5 base, boosted for identity and
/// business statements, explicit preferences, and analysis provenance.
/// Capped at 1.0. Used as retrieval metadata only.
pub fn compute_importance(content: &str, provenance: Provenance) -> f64 {
    let lower = content.to_lowercase();
    let mut importance: f64 = 0.5;

    const IDENTITY_MARKERS: &[&str] = &[
        "the user is",
        "the user runs",
        "the user owns",
        "their business",
        "their brand",
        "their niche",
        "their audience",
    ];
    const PREFERENCE_MARKERS: &[&str] =
        &["prefers", "never wants", "always wants", "dislikes", "favorite"];

    if IDENTITY_MARKERS.iter().any(|m| lower.contains(m)) {
        importance += 0.2;
    }
    if PREFERENCE_MARKERS.iter().any(|m| lower.contains(m)) {
        importance += 0.15;
    }
    if provenance == Provenance::AnalysisDerived {
        importance += 0.2;
    }

    importance.min(1.0)
}

/// Find the most similar embedding among a user's existing memories.
///
/// Returns (id, similarity) for the closest match, or None if empty.
fn find_most_similar(
    query: &[f32],
    existing: &[(String, Vec<f32>)],
) -> Option<(String, f32)> {
    existing
        .iter()
        .filter(|(_, emb)| emb.len() == query.len())
        .map(|(id, emb)| (id.clone(), cosine_similarity(query, emb)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_json_array() {
        let response = r#"[
            {"content": "The user runs a vegan bakery", "provenance": "user_stated"},
            {"content": "The user posts mostly reels", "provenance": "inferred"}
        ]"#;
        let facts = parse_extraction_response(response);
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].content, "The user runs a vegan bakery");
        assert_eq!(facts[0].provenance, Provenance::UserStated);
        assert_eq!(facts[1].provenance, Provenance::Inferred);
    }

    #[test]
    fn parse_empty_array() {
        assert!(parse_extraction_response("[]").is_empty());
    }

    #[test]
    fn parse_malformed_returns_empty() {
        assert!(parse_extraction_response("no facts to report").is_empty());
    }

    #[test]
    fn parse_markdown_code_block() {
        let response = r#"```json
[{"content": "The user's audience is mostly 18-24", "provenance": "inferred"}]
```"#;
        let facts = parse_extraction_response(response);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "The user's audience is mostly 18-24");
    }

    #[test]
    fn parse_with_surrounding_text() {
        let response = r#"Here are the facts:
[{"content": "The user publishes on Wednesdays"}]
Done."#;
        let facts = parse_extraction_response(response);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].provenance, Provenance::Inferred);
    }

    #[test]
    fn parse_drops_empty_content() {
        let response = r#"[{"content": ""}, {"content": "The user vlogs"}]"#;
        let facts = parse_extraction_response(response);
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn questions_are_filtered() {
        assert!(is_question("Should the user post more often?"));
        assert!(!is_question("The user posts daily."));
    }

    #[test]
    fn confidence_defaults_to_certain() {
        let facts = parse_extraction_response(r#"[{"content": "The user vlogs"}]"#);
        assert!((facts[0].confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn importance_base_and_boosts() {
        let base = compute_importance("The weather was nice", Provenance::Inferred);
        assert!((base - 0.5).abs() < f64::EPSILON);

        let identity =
            compute_importance("The user runs a fitness studio", Provenance::UserStated);
        assert!((identity - 0.7).abs() < f64::EPSILON);

        let preference =
            compute_importance("The user prefers short captions", Provenance::UserStated);
        assert!((preference - 0.65).abs() < f64::EPSILON);

        let analysis = compute_importance(
            "Their audience engages most with carousel posts",
            Provenance::AnalysisDerived,
        );
        assert!((analysis - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn importance_is_capped() {
        let stacked = compute_importance(
            "The user runs a bakery and prefers morning posts for their audience",
            Provenance::AnalysisDerived,
        );
        assert!(stacked <= 1.0);
    }

    #[test]
    fn build_prompt_includes_conversation_and_known_facts() {
        let conversation = vec![
            ProviderMessage::user("My bakery is called Crumb & Co."),
            ProviderMessage::assistant("Great name! What do you post about?"),
        ];
        let known = vec!["The user lives in Portland".to_string()];

        let prompt = build_extraction_prompt(&conversation, &known);
        assert!(prompt.contains("User: My bakery is called Crumb & Co."));
        assert!(prompt.contains("Assistant: Great name!"));
        assert!(prompt.contains("- The user lives in Portland"));
        assert!(prompt.contains("Output JSON array only"));
    }

    #[test]
    fn build_prompt_handles_no_known_facts() {
        let conversation = vec![ProviderMessage::user("hello")];
        let prompt = build_extraction_prompt(&conversation, &[]);
        assert!(prompt.contains("(none)"));
    }

    #[test]
    fn find_most_similar_returns_best_match() {
        let query = vec![1.0, 0.0, 0.0];
        let existing = vec![
            ("a".to_string(), vec![0.5, 0.5, 0.0]),
            ("b".to_string(), vec![0.9, 0.1, 0.0]),
            ("c".to_string(), vec![0.0, 1.0, 0.0]),
        ];
        let (id, _sim) = find_most_similar(&query, &existing).unwrap();
        assert_eq!(id, "b");
    }

    #[test]
    fn find_most_similar_empty_returns_none() {
        assert!(find_most_similar(&[1.0, 0.0], &[]).is_none());
    }

    #[test]
    fn find_most_similar_skips_dimension_mismatch() {
        let existing = vec![("a".to_string(), vec![1.0, 0.0, 0.0])];
        assert!(find_most_similar(&[1.0, 0.0], &existing).is_none());
    }

    use async_trait::async_trait;
    use crevio_core::types::{
        AdapterType, EmbeddingOutput, HealthStatus, ProviderResponse, ProviderStreamChunk,
        TokenUsage,
    };
    use crevio_core::traits::PluginAdapter;
    use futures::Stream;
    use std::pin::Pin;
    use tokio_rusqlite::Connection;

    struct ScriptedProvider(String);

    #[async_trait]
    impl PluginAdapter for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Provider
        }
        async fn health_check(&self) -> Result<HealthStatus, CrevioError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), CrevioError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedProvider {
        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, CrevioError> {
            Ok(ProviderResponse {
                id: "resp-1".into(),
                content: self.0.clone(),
                model: request.model,
                stop_reason: Some("end_turn".into()),
                usage: TokenUsage::default(),
            })
        }

        async fn stream(
            &self,
            _request: ProviderRequest,
        ) -> Result<
            Pin<Box<dyn Stream<Item = Result<ProviderStreamChunk, CrevioError>> + Send>>,
            CrevioError,
        > {
            Err(CrevioError::Internal("not scripted".into()))
        }
    }

    /// Maps each text to a fixed vector by keyword so similarity is exact.
    struct KeyedEmbedder;

    #[async_trait]
    impl PluginAdapter for KeyedEmbedder {
        fn name(&self) -> &str {
            "keyed"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Embedding
        }
        async fn health_check(&self) -> Result<HealthStatus, CrevioError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), CrevioError> {
            Ok(())
        }
    }

    #[async_trait]
    impl EmbeddingAdapter for KeyedEmbedder {
        async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, CrevioError> {
            let embeddings = input
                .texts
                .iter()
                .map(|t| {
                    if t.contains("bakery") {
                        vec![1.0, 0.0, 0.0]
                    } else if t.contains("reels") {
                        vec![0.0, 1.0, 0.0]
                    } else {
                        vec![0.0, 0.0, 1.0]
                    }
                })
                .collect();
            Ok(EmbeddingOutput {
                embeddings,
                dimensions: 3,
            })
        }
    }

    async fn extractor_with_store() -> (MemoryExtractor, Arc<MemoryStore>) {
        let conn = Connection::open_in_memory().await.unwrap();
        let store = Arc::new(MemoryStore::new(conn).await.unwrap());
        let extractor = MemoryExtractor::new(
            store.clone(),
            Arc::new(KeyedEmbedder),
            "test-model".to_string(),
            0.92,
            0.85,
        );
        (extractor, store)
    }

    fn seeded_memory(id: &str, content: &str, embedding: Vec<f32>) -> Memory {
        Memory {
            id: id.to_string(),
            user_id: "u1".to_string(),
            content: content.to_string(),
            embedding,
            source: MemorySource::Conversation,
            importance: 0.5,
            provenance: Provenance::UserStated,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn same_turn_duplicate_facts_insert_once() {
        let (extractor, store) = extractor_with_store().await;
        let provider = ScriptedProvider(
            r#"[
                {"content": "The user runs a vegan bakery", "provenance": "user_stated"},
                {"content": "The user owns a bakery in Austin", "provenance": "inferred"},
                {"content": "The user posts mostly reels", "provenance": "inferred"},
                {"content": "The user may expand someday", "provenance": "inferred", "confidence": 0.3}
            ]"#
            .to_string(),
        );

        let conversation = vec![ProviderMessage::user("I run a vegan bakery in Austin")];
        let result = extractor
            .extract_from_conversation(&provider, "u1", &conversation)
            .await
            .unwrap();

        // Both bakery facts embed identically, so the second is skipped;
        // the low-confidence fact never reaches dedup.
        assert_eq!(result.inserted.len(), 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(store.get_user_embeddings("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn conversation_fact_near_existing_memory_is_skipped() {
        let (extractor, store) = extractor_with_store().await;
        store
            .save(&seeded_memory("m1", "The user runs a bakery", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let provider = ScriptedProvider(
            r#"[{"content": "The user runs a vegan bakery", "provenance": "user_stated"}]"#
                .to_string(),
        );
        let result = extractor
            .extract_from_conversation(&provider, "u1", &[ProviderMessage::user("hi")])
            .await
            .unwrap();

        assert!(result.inserted.is_empty());
        assert_eq!(result.skipped, 1);
    }

    #[tokio::test]
    async fn analysis_fact_replaces_near_duplicate_in_place() {
        let (extractor, store) = extractor_with_store().await;
        store
            .save(&seeded_memory("m1", "The user runs a bakery", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let facts = vec!["Their bakery content peaks on weekends".to_string()];
        let result = extractor.store_analysis_facts("u1", &facts).await.unwrap();

        assert!(result.inserted.is_empty());
        assert_eq!(result.upserted.len(), 1);
        assert_eq!(result.upserted[0].id, "m1");

        let updated = store.get_by_id("m1").await.unwrap().unwrap();
        assert_eq!(updated.content, "Their bakery content peaks on weekends");
        // Still one memory; the duplicate did not accumulate.
        assert_eq!(store.get_user_embeddings("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn distinct_analysis_fact_inserts_with_analysis_provenance() {
        let (extractor, store) = extractor_with_store().await;
        store
            .save(&seeded_memory("m1", "The user runs a bakery", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let facts = vec!["The user posts mostly reels".to_string()];
        let result = extractor.store_analysis_facts("u1", &facts).await.unwrap();

        assert_eq!(result.inserted.len(), 1);
        assert_eq!(result.inserted[0].source, MemorySource::Analysis);
        assert_eq!(result.inserted[0].provenance, Provenance::AnalysisDerived);
        assert_eq!(store.get_user_embeddings("u1").await.unwrap().len(), 2);
    }
}
