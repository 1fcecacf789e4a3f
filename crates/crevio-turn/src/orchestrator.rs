// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The turn orchestrator: one inbound message in, one framed stream out.
//!
//! A turn has two phases with different failure semantics. [`TurnOrchestrator::prepare`]
//! runs every check that can still reject the request outright (validation,
//! ownership, usage) and persists the user message; its errors map to HTTP
//! statuses because no stream bytes have been sent yet. [`TurnOrchestrator::run`]
//! then drives the pipeline stages; from here on failures degrade the turn
//! (fewer memories, no enrichment, an inline error frame) but never abort it
//! with a status code.

use std::sync::Arc;

use crevio_config::CrevioConfig;
use crevio_core::error::CrevioError;
use crevio_core::traits::{
    EmbeddingAdapter, EnrichmentAdapter, ProviderAdapter, StorageAdapter, WebSearchAdapter,
};
use crevio_core::types::{
    Conversation, EmbeddingInput, EnrichmentKind, EnrichmentOutcome, EnrichmentTarget, Message,
    ProviderMessage, ProviderRequest, UserRecord, WebSearchResult,
};
use crevio_enrich::blob_delta;
use crevio_intent::IntentClassifier;
use crevio_memory::{build_memory_query, MemoryExtractor, MemoryStore, ScoredMemory};
use crevio_profile::{should_extract, ProfileDelta, ProfileExtractor, ProfileMergeEngine};
use crevio_stream::{CappedNotice, Frame, TurnSink};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::{EnrichmentResults, TurnContext, TurnRequest};
use crate::generate::{build_system_prompt, stream_reply};
use crate::title::generate_title;

/// How much history a turn loads and sends to the reply model.
const HISTORY_LIMIT: i64 = 50;

/// A request that passed every pre-stream check, with its user message
/// already persisted.
#[derive(Debug)]
pub struct PreparedTurn {
    pub context: TurnContext,
}

/// What a completed (or degraded) turn produced.
#[derive(Debug)]
pub struct TurnOutcome {
    /// Id of the persisted assistant message, when any text was persisted.
    pub message_id: Option<String>,
    /// The assistant text, possibly truncated by a disconnect.
    pub text: String,
}

/// Drives the full pipeline for one conversational turn.
pub struct TurnOrchestrator {
    config: CrevioConfig,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    provider: Arc<dyn ProviderAdapter + Send + Sync>,
    embedder: Arc<dyn EmbeddingAdapter + Send + Sync>,
    web_search: Option<Arc<dyn WebSearchAdapter + Send + Sync>>,
    social: Option<Arc<dyn EnrichmentAdapter + Send + Sync>>,
    hashtag: Option<Arc<dyn EnrichmentAdapter + Send + Sync>>,
    blog: Option<Arc<dyn EnrichmentAdapter + Send + Sync>>,
    memory_store: Arc<MemoryStore>,
    memory_extractor: Arc<MemoryExtractor>,
    classifier: IntentClassifier,
    profile_extractor: ProfileExtractor,
    merge_engine: ProfileMergeEngine,
    system_preamble: String,
}

impl TurnOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: CrevioConfig,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        provider: Arc<dyn ProviderAdapter + Send + Sync>,
        embedder: Arc<dyn EmbeddingAdapter + Send + Sync>,
        memory_store: Arc<MemoryStore>,
        system_preamble: String,
    ) -> Self {
        let memory_extractor = Arc::new(MemoryExtractor::new(
            memory_store.clone(),
            embedder.clone(),
            config.anthropic.classifier_model.clone(),
            config.memory.insertion_dedup_threshold,
            config.memory.upsert_dedup_threshold,
        ));
        let classifier = IntentClassifier::new(
            config.anthropic.classifier_model.clone(),
            config.intent.history_window,
        );
        let profile_extractor = ProfileExtractor::new(config.anthropic.classifier_model.clone());
        let merge_engine = ProfileMergeEngine::new(storage.clone());

        Self {
            config,
            storage,
            provider,
            embedder,
            web_search: None,
            social: None,
            hashtag: None,
            blog: None,
            memory_store,
            memory_extractor,
            classifier,
            profile_extractor,
            merge_engine,
            system_preamble,
        }
    }

    pub fn with_web_search(mut self, adapter: Arc<dyn WebSearchAdapter + Send + Sync>) -> Self {
        self.web_search = Some(adapter);
        self
    }

    pub fn with_enrichers(
        mut self,
        social: Arc<dyn EnrichmentAdapter + Send + Sync>,
        hashtag: Arc<dyn EnrichmentAdapter + Send + Sync>,
        blog: Arc<dyn EnrichmentAdapter + Send + Sync>,
    ) -> Self {
        self.social = Some(social);
        self.hashtag = Some(hashtag);
        self.blog = Some(blog);
        self
    }

    /// Pre-stream phase: validate, resolve the conversation, check ownership
    /// and usage, persist the user message.
    ///
    /// Every error from here maps to a response status; nothing has been
    /// streamed yet.
    pub async fn prepare(&self, request: TurnRequest) -> Result<PreparedTurn, CrevioError> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(CrevioError::Validation("message content is empty".into()));
        }
        let max_chars = self.config.agent.max_message_chars;
        if content.chars().count() > max_chars {
            return Err(CrevioError::Validation(format!(
                "message exceeds {max_chars} characters"
            )));
        }

        let conversation = self.resolve_conversation(&request).await?;
        let user = self.get_or_create_user(&request.user_id).await?;

        if user.usage_count >= user.usage_limit {
            return Err(CrevioError::UsageLimit {
                used: user.usage_count,
                limit: user.usage_limit,
            });
        }

        let now = now_timestamp();
        let user_message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            role: "user".to_string(),
            content: content.to_string(),
            metadata: request
                .correlation_key
                .as_ref()
                .map(|key| json!({ "correlation_key": key })),
            created_at: now,
        };
        self.storage.insert_message(&user_message).await?;

        let request = TurnRequest {
            conversation_id: conversation.id.clone(),
            content: content.to_string(),
            ..request
        };
        Ok(PreparedTurn {
            context: TurnContext::new(request, conversation, user),
        })
    }

    /// Streaming phase: everything after the response headers. Failures in
    /// here degrade the turn instead of failing the request.
    pub async fn run(&self, prepared: PreparedTurn, sink: &TurnSink) -> TurnOutcome {
        let ctx = prepared.context;

        // Load history and retrieve memories. Either failing costs context,
        // not the turn.
        let history = match self
            .storage
            .get_messages(&ctx.conversation.id, Some(HISTORY_LIMIT))
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!(conversation_id = %ctx.conversation.id, "history load failed: {e}");
                Vec::new()
            }
        };
        let memories = self.retrieve_memories(&ctx.request, &history).await;
        let ctx = ctx.with_loaded(history, memories);

        sink.send(Frame::activity("thinking", None)).await;
        let decision = self
            .classifier
            .classify(
                self.provider.as_ref(),
                &ctx.provider_history(),
                &profile_summary(&ctx.user),
                &ctx.memory_contents(),
            )
            .await;
        let ctx = ctx.with_decision(decision);

        let (enrichment, fresh_blobs) = self.run_enrichment(&ctx, sink).await;
        let ctx = ctx.with_enrichment(enrichment);

        let (search, attempted) = self.run_search(&ctx, sink).await;
        let ctx = ctx.with_search(search, attempted);

        sink.send(Frame::activity_cleared()).await;
        sink.send(self.search_metadata_frame(&ctx)).await;

        let request = ProviderRequest {
            model: self.config.anthropic.default_model.clone(),
            system_prompt: Some(build_system_prompt(&self.system_preamble, &ctx)),
            messages: ctx.provider_history(),
            max_tokens: self.config.anthropic.max_tokens,
            stream: true,
        };
        let result = match stream_reply(self.provider.as_ref(), request, sink).await {
            Ok(result) => result,
            Err(e) => {
                warn!("reply stream could not start: {e}");
                sink.send(Frame::error(e.to_string())).await;
                return TurnOutcome {
                    message_id: None,
                    text: String::new(),
                };
            }
        };

        // A disconnect or mid-stream error still persists whatever text
        // already streamed, so reconnecting clients see a consistent
        // conversation.
        let message_id = if result.text.is_empty() {
            None
        } else {
            self.persist_assistant_message(&ctx, &result.text).await
        };
        if let Some(id) = &message_id
            && !result.disconnected
        {
            sink.send(Frame::MessageId {
                id: id.clone(),
                correlation_key: ctx.request.correlation_key.clone(),
            })
            .await;
        }

        if result.disconnected || result.error.is_some() {
            return TurnOutcome {
                message_id,
                text: result.text,
            };
        }

        self.update_profile(&ctx, fresh_blobs, sink).await;
        self.update_memories(&ctx, &result.text, sink).await;

        if ctx.conversation.title.is_none() {
            tokio::spawn(generate_title(
                self.provider.clone(),
                self.storage.clone(),
                self.config.anthropic.classifier_model.clone(),
                ctx.conversation.id.clone(),
                ctx.request.content.clone(),
                result.text.clone(),
            ));
        }

        TurnOutcome {
            message_id,
            text: result.text,
        }
    }

    async fn resolve_conversation(
        &self,
        request: &TurnRequest,
    ) -> Result<Conversation, CrevioError> {
        if request.conversation_id == "new" {
            let now = now_timestamp();
            let conversation = Conversation {
                id: Uuid::new_v4().to_string(),
                user_id: request.user_id.clone(),
                title: None,
                created_at: now.clone(),
                updated_at: now,
            };
            self.storage.create_conversation(&conversation).await?;
            debug!(conversation_id = %conversation.id, "conversation created");
            return Ok(conversation);
        }

        let conversation = self
            .storage
            .get_conversation(&request.conversation_id)
            .await?
            .ok_or_else(|| CrevioError::NotFound {
                resource: "conversation",
                id: request.conversation_id.clone(),
            })?;
        if conversation.user_id != request.user_id {
            return Err(CrevioError::Ownership(
                "conversation belongs to another user".into(),
            ));
        }
        Ok(conversation)
    }

    async fn get_or_create_user(&self, user_id: &str) -> Result<UserRecord, CrevioError> {
        if let Some(user) = self.storage.get_user(user_id).await? {
            return Ok(user);
        }
        let now = now_timestamp();
        let user = UserRecord {
            id: user_id.to_string(),
            display_name: None,
            content_niche: Vec::new(),
            primary_platforms: Vec::new(),
            profile_data: json!({}),
            profile_version: 1,
            usage_count: 0,
            usage_limit: self.config.usage.default_limit,
            created_at: now.clone(),
            updated_at: now,
        };
        self.storage.upsert_user(&user).await?;
        info!(user_id, "user created");
        Ok(user)
    }

    /// Builds the banded memory query, embeds it, and searches. Any failure
    /// degrades to an empty memory set.
    async fn retrieve_memories(
        &self,
        request: &TurnRequest,
        history: &[Message],
    ) -> Vec<ScoredMemory> {
        let prior_assistant = history
            .iter()
            .rev()
            .find(|m| m.role == "assistant")
            .map(|m| m.content.as_str());
        let query = build_memory_query(
            &request.content,
            prior_assistant,
            self.config.memory.query_min_chars,
            self.config.memory.query_max_chars,
        );

        let embedding = match self
            .embedder
            .embed(EmbeddingInput {
                texts: vec![query],
            })
            .await
        {
            Ok(output) => match output.embeddings.into_iter().next() {
                Some(v) => v,
                None => return Vec::new(),
            },
            Err(e) => {
                warn!(user_id = %request.user_id, "memory query embedding failed: {e}");
                return Vec::new();
            }
        };

        match self
            .memory_store
            .search(&request.user_id, &embedding, self.config.memory.top_k)
            .await
        {
            Ok(memories) => memories,
            Err(e) => {
                warn!(user_id = %request.user_id, "memory search failed: {e}");
                Vec::new()
            }
        }
    }

    /// Runs the gated enrichment analyzers in a fixed order. Returns the
    /// outcomes plus profile-data deltas for every fresh (non-cached)
    /// success, to be written back through the profile merge.
    async fn run_enrichment(
        &self,
        ctx: &TurnContext,
        sink: &TurnSink,
    ) -> (EnrichmentResults, Vec<Value>) {
        let mut results = EnrichmentResults::default();
        let mut fresh_blobs = Vec::new();
        let gate = self.config.intent.min_confidence;
        let decision = &ctx.decision;
        let user_id = &ctx.request.user_id;

        if let Some(adapter) = &self.social
            && decision.social_profile.decision.actionable(gate)
            && let Some(username) = &decision.social_profile.username
        {
            let target = EnrichmentTarget::Username(username.clone());
            sink.send(Frame::activity("analyzing_profile", Some(username.clone())))
                .await;
            let outcome = self
                .analyze(adapter.as_ref(), &target, user_id, sink)
                .await;
            collect_fresh_blob(EnrichmentKind::SocialProfile, &target, &outcome, &mut fresh_blobs);
            results.social = Some(outcome);
        }

        if let Some(adapter) = &self.hashtag
            && decision.hashtag.decision.actionable(gate)
            && let Some(hashtag) = &decision.hashtag.hashtag
        {
            let target = EnrichmentTarget::Hashtag(hashtag.clone());
            sink.send(Frame::activity("searching_hashtag", Some(hashtag.clone())))
                .await;
            let outcome = self
                .analyze(adapter.as_ref(), &target, user_id, sink)
                .await;
            collect_fresh_blob(EnrichmentKind::Hashtag, &target, &outcome, &mut fresh_blobs);
            results.hashtag = Some(outcome);
        }

        if let Some(adapter) = &self.blog
            && decision.blog.decision.actionable(gate)
            && !decision.blog.urls.is_empty()
        {
            let target = EnrichmentTarget::Urls(decision.blog.urls.clone());
            sink.send(Frame::activity(
                "analyzing_blog",
                Some(decision.blog.urls.join(", ")),
            ))
            .await;
            let outcome = self
                .analyze(adapter.as_ref(), &target, user_id, sink)
                .await;
            collect_fresh_blob(EnrichmentKind::Blog, &target, &outcome, &mut fresh_blobs);
            results.blog = Some(outcome);
        }

        (results, fresh_blobs)
    }

    /// One analyzer call. A failure outcome clears the activity indicator
    /// and the turn moves on; no error marker reaches the visible stream.
    async fn analyze(
        &self,
        adapter: &dyn EnrichmentAdapter,
        target: &EnrichmentTarget,
        user_id: &str,
        sink: &TurnSink,
    ) -> EnrichmentOutcome {
        let outcome = match adapter.analyze(target, user_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(kind = %adapter.kind(), "enrichment call failed: {e}");
                EnrichmentOutcome::Failure {
                    error: e.to_string(),
                }
            }
        };
        if !outcome.is_success() {
            sink.send(Frame::activity_cleared()).await;
        }
        outcome
    }

    async fn run_search(
        &self,
        ctx: &TurnContext,
        sink: &TurnSink,
    ) -> (Option<WebSearchResult>, bool) {
        let decision = &ctx.decision.web_search;
        let Some(adapter) = &self.web_search else {
            return (None, false);
        };
        if !decision.decision.actionable(self.config.intent.min_confidence) {
            return (None, false);
        }
        let Some(query) = decision.query.as_deref().filter(|q| !q.trim().is_empty()) else {
            return (None, false);
        };

        sink.send(Frame::activity("searching", Some(query.to_string())))
            .await;
        match adapter.search(query, None, &[]).await {
            Ok(result) => (Some(result), true),
            Err(e) => {
                warn!(query, "web search failed: {e}");
                sink.send(Frame::activity_cleared()).await;
                (None, true)
            }
        }
    }

    /// The search report sent exactly once as generation begins.
    /// `performed` reflects the attempt, not its success.
    fn search_metadata_frame(&self, ctx: &TurnContext) -> Frame {
        let (query, citations) = match &ctx.search {
            Some(result) => (Some(result.query.clone()), result.citations.clone()),
            None => (
                ctx.search_attempted
                    .then(|| ctx.decision.web_search.query.clone())
                    .flatten(),
                Vec::new(),
            ),
        };
        Frame::SearchMetadata {
            performed: ctx.search_attempted,
            query,
            citations,
        }
    }

    async fn persist_assistant_message(&self, ctx: &TurnContext, text: &str) -> Option<String> {
        let mut metadata = serde_json::Map::new();
        metadata.insert("streaming".into(), json!(true));
        if let Some(key) = &ctx.request.correlation_key {
            metadata.insert("correlation_key".into(), json!(key));
        }
        if let Some(search) = &ctx.search {
            metadata.insert("search_query".into(), json!(search.query));
            metadata.insert("citations".into(), json!(search.citations));
        }

        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: ctx.conversation.id.clone(),
            role: "assistant".to_string(),
            content: text.to_string(),
            metadata: Some(Value::Object(metadata)),
            created_at: now_timestamp(),
        };

        // Post-delivery persistence failures are logged, never surfaced: the
        // user already has the text.
        if let Err(e) = self.storage.insert_message(&message).await {
            warn!(conversation_id = %ctx.conversation.id, "assistant message write failed: {e}");
            return None;
        }
        if let Err(e) = self.storage.increment_usage(&ctx.request.user_id).await {
            warn!(user_id = %ctx.request.user_id, "usage increment failed: {e}");
        }
        Some(message.id)
    }

    /// Profile extraction and merge. Fresh analysis blobs are written back
    /// even when conversational extraction is gated off or fails.
    async fn update_profile(&self, ctx: &TurnContext, fresh_blobs: Vec<Value>, sink: &TurnSink) {
        let gated_in = should_extract(
            &ctx.decision.profile_update,
            ctx.enrichment.any_success(),
            self.config.intent.profile_confidence,
        );

        let mut delta = if gated_in {
            let exchange = ctx.provider_history();
            let analysis = ctx.enrichment.context_text();
            match self
                .profile_extractor
                .extract(
                    self.provider.as_ref(),
                    &ctx.user,
                    &exchange,
                    analysis.as_deref(),
                )
                .await
            {
                Ok(delta) => delta,
                Err(e) => {
                    warn!(user_id = %ctx.request.user_id, "profile extraction failed: {e}");
                    ProfileDelta::default()
                }
            }
        } else {
            ProfileDelta::default()
        };

        if !fresh_blobs.is_empty() {
            let mut data = delta
                .profile_data
                .take()
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default();
            for blob in fresh_blobs {
                if let Value::Object(map) = blob {
                    data.extend(map);
                }
            }
            delta.profile_data = Some(Value::Object(data));
        }

        if delta.is_empty() {
            return;
        }

        match self.merge_engine.apply(&ctx.request.user_id, &delta).await {
            Ok(Some(report)) => {
                sink.send(Frame::ProfileUpdated {
                    updated_fields: report.updated_fields,
                    completeness: report.completeness,
                    capped_fields: report
                        .capped_fields
                        .into_iter()
                        .map(|c| CappedNotice {
                            field: c.field,
                            limit: c.limit,
                            attempted: c.attempted,
                        })
                        .collect(),
                })
                .await;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(user_id = %ctx.request.user_id, "profile merge failed: {e}");
            }
        }
    }

    /// End-of-turn memory extraction from the completed exchange, plus
    /// analysis-derived facts from any successful enrichment.
    async fn update_memories(&self, ctx: &TurnContext, assistant_text: &str, sink: &TurnSink) {
        sink.send(Frame::activity("updating_memory", None)).await;

        let exchange = vec![
            ProviderMessage::user(ctx.request.content.clone()),
            ProviderMessage::assistant(assistant_text),
        ];
        match self
            .memory_extractor
            .extract_from_conversation(self.provider.as_ref(), &ctx.request.user_id, &exchange)
            .await
        {
            Ok(result) => {
                debug!(
                    user_id = %ctx.request.user_id,
                    inserted = result.inserted.len(),
                    skipped = result.skipped,
                    "conversation memories extracted"
                );
            }
            Err(e) => {
                warn!(user_id = %ctx.request.user_id, "memory extraction failed: {e}");
            }
        }

        let facts = analysis_facts(&ctx.enrichment);
        if !facts.is_empty() {
            match self
                .memory_extractor
                .store_analysis_facts(&ctx.request.user_id, &facts)
                .await
            {
                Ok(result) => {
                    debug!(
                        user_id = %ctx.request.user_id,
                        inserted = result.inserted.len(),
                        upserted = result.upserted.len(),
                        "analysis facts stored"
                    );
                }
                Err(e) => {
                    warn!(user_id = %ctx.request.user_id, "analysis fact storage failed: {e}");
                }
            }
        }

        sink.send(Frame::activity_cleared()).await;
    }
}

/// Compact profile view handed to the classifier and extractors.
fn profile_summary(user: &UserRecord) -> Value {
    json!({
        "display_name": user.display_name,
        "content_niche": user.content_niche,
        "primary_platforms": user.primary_platforms,
        "profile_data": user.profile_data,
    })
}

fn collect_fresh_blob(
    kind: EnrichmentKind,
    target: &EnrichmentTarget,
    outcome: &EnrichmentOutcome,
    fresh_blobs: &mut Vec<Value>,
) {
    if let EnrichmentOutcome::Success {
        analysis,
        cached: false,
    } = outcome
    {
        fresh_blobs.push(blob_delta(kind, target, analysis, chrono::Utc::now()));
    }
}

/// Fact strings analyzers report under `insights` or `key_facts`; these go
/// through the upsert path so refreshed analyses replace stale memories.
fn analysis_facts(enrichment: &EnrichmentResults) -> Vec<String> {
    let mut facts = Vec::new();
    for outcome in [&enrichment.social, &enrichment.hashtag, &enrichment.blog]
        .into_iter()
        .flatten()
    {
        let EnrichmentOutcome::Success { analysis, .. } = outcome else {
            continue;
        };
        for key in ["insights", "key_facts"] {
            if let Some(items) = analysis.get(key).and_then(Value::as_array) {
                facts.extend(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .filter(|s| !s.trim().is_empty())
                        .map(str::to_string),
                );
            }
        }
    }
    facts
}

fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crevio_core::types::{
        AdapterType, HealthStatus, ProviderResponse, ProviderStreamChunk, StreamEventType,
        TokenUsage,
    };
    use crevio_storage::{Database, SqliteStorage};
    use crevio_stream::{turn_channel, FrameDecoder};
    use futures::Stream;
    use std::pin::Pin;

    struct ScriptedProvider {
        complete_response: String,
        stream_chunks: Vec<String>,
    }

    impl ScriptedProvider {
        fn new(complete_response: &str, stream_chunks: &[&str]) -> Self {
            Self {
                complete_response: complete_response.to_string(),
                stream_chunks: stream_chunks.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl crevio_core::traits::PluginAdapter for ScriptedProvider {
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
                content: self.complete_response.clone(),
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
            let chunks: Vec<Result<ProviderStreamChunk, CrevioError>> = self
                .stream_chunks
                .iter()
                .map(|text| {
                    Ok(ProviderStreamChunk {
                        event_type: StreamEventType::ContentBlockDelta,
                        text: Some(text.clone()),
                        usage: None,
                        error: None,
                        stop_reason: None,
                    })
                })
                .chain(std::iter::once(Ok(ProviderStreamChunk {
                    event_type: StreamEventType::MessageStop,
                    text: None,
                    usage: None,
                    error: None,
                    stop_reason: Some("end_turn".into()),
                })))
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl crevio_core::traits::PluginAdapter for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed"
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
    impl EmbeddingAdapter for FixedEmbedder {
        async fn embed(
            &self,
            input: EmbeddingInput,
        ) -> Result<crevio_core::types::EmbeddingOutput, CrevioError> {
            Ok(crevio_core::types::EmbeddingOutput {
                embeddings: input.texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect(),
                dimensions: 3,
            })
        }
    }

    async fn orchestrator_with(provider: ScriptedProvider) -> TurnOrchestrator {
        let db = Database::open_in_memory().await.unwrap();
        let conn = db.connection().clone();
        let storage = Arc::new(SqliteStorage::from_database(db));
        let memory_store = Arc::new(MemoryStore::new(conn).await.unwrap());
        TurnOrchestrator::new(
            CrevioConfig::default(),
            storage,
            Arc::new(provider),
            Arc::new(FixedEmbedder),
            memory_store,
            "You are a content strategy assistant.".to_string(),
        )
    }

    fn request(conversation_id: &str, content: &str) -> TurnRequest {
        TurnRequest {
            conversation_id: conversation_id.to_string(),
            user_id: "user-1".to_string(),
            content: content.to_string(),
            correlation_key: Some("ck-1".to_string()),
        }
    }

    #[tokio::test]
    async fn prepare_rejects_empty_message() {
        let orch = orchestrator_with(ScriptedProvider::new("", &[])).await;
        let err = orch.prepare(request("new", "   ")).await.unwrap_err();
        assert!(matches!(err, CrevioError::Validation(_)));
    }

    #[tokio::test]
    async fn prepare_rejects_oversized_message() {
        let orch = orchestrator_with(ScriptedProvider::new("", &[])).await;
        let long = "x".repeat(4001);
        let err = orch.prepare(request("new", &long)).await.unwrap_err();
        assert!(matches!(err, CrevioError::Validation(_)));
    }

    #[tokio::test]
    async fn prepare_rejects_unknown_conversation() {
        let orch = orchestrator_with(ScriptedProvider::new("", &[])).await;
        let err = orch.prepare(request("missing", "hello")).await.unwrap_err();
        assert!(matches!(
            err,
            CrevioError::NotFound {
                resource: "conversation",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn prepare_rejects_foreign_conversation() {
        let orch = orchestrator_with(ScriptedProvider::new("", &[])).await;
        let prepared = orch.prepare(request("new", "hello")).await.unwrap();
        let conversation_id = prepared.context.conversation.id.clone();

        let mut foreign = request(&conversation_id, "hi");
        foreign.user_id = "user-2".to_string();
        let err = orch.prepare(foreign).await.unwrap_err();
        assert!(matches!(err, CrevioError::Ownership(_)));
    }

    #[tokio::test]
    async fn prepare_enforces_usage_limit() {
        let orch = orchestrator_with(ScriptedProvider::new("", &[])).await;
        let now = now_timestamp();
        let exhausted = UserRecord {
            id: "user-1".into(),
            display_name: None,
            content_niche: vec![],
            primary_platforms: vec![],
            profile_data: json!({}),
            profile_version: 1,
            usage_count: 500,
            usage_limit: 500,
            created_at: now.clone(),
            updated_at: now,
        };
        orch.storage.upsert_user(&exhausted).await.unwrap();

        let err = orch.prepare(request("new", "hello")).await.unwrap_err();
        assert!(matches!(
            err,
            CrevioError::UsageLimit {
                used: 500,
                limit: 500
            }
        ));
    }

    #[tokio::test]
    async fn happy_path_streams_and_persists_matching_text() {
        let orch = orchestrator_with(ScriptedProvider::new("", &["Hello ", "world"])).await;
        let prepared = orch.prepare(request("new", "hello there")).await.unwrap();
        let conversation_id = prepared.context.conversation.id.clone();

        let (sink, mut rx) = turn_channel();
        let outcome = orch.run(prepared, &sink).await;
        drop(sink);

        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        while let Some(line) = rx.recv().await {
            frames.extend(decoder.push(&line));
        }

        assert_eq!(outcome.text, "Hello world");
        let message_id = outcome.message_id.expect("assistant message persisted");

        // Exactly one search report, sent before any text; search never ran.
        let search_frames: Vec<_> = frames
            .iter()
            .filter(|f| matches!(f, Frame::SearchMetadata { .. }))
            .collect();
        assert_eq!(search_frames.len(), 1);
        assert!(matches!(
            search_frames[0],
            Frame::SearchMetadata {
                performed: false,
                ..
            }
        ));
        let first_text = frames.iter().position(Frame::is_text).unwrap();
        let search_pos = frames
            .iter()
            .position(|f| matches!(f, Frame::SearchMetadata { .. }))
            .unwrap();
        assert!(search_pos < first_text);

        // The message-id frame echoes the correlation key.
        assert!(frames.iter().any(|f| matches!(
            f,
            Frame::MessageId { id, correlation_key: Some(key) }
                if *id == message_id && key == "ck-1"
        )));

        // Stripping control frames reproduces the persisted text exactly.
        assert_eq!(crevio_stream::strip_frames(&frames), "Hello world");
        let stored = orch
            .storage
            .get_messages(&conversation_id, None)
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].role, "assistant");
        assert_eq!(stored[1].content, "Hello world");

        // Usage counted this turn.
        let user = orch.storage.get_user("user-1").await.unwrap().unwrap();
        assert_eq!(user.usage_count, 1);
    }

    #[tokio::test]
    async fn disconnect_persists_truncated_text() {
        let orch = orchestrator_with(ScriptedProvider::new("", &["Hello ", "world"])).await;
        let prepared = orch.prepare(request("new", "hello there")).await.unwrap();
        let conversation_id = prepared.context.conversation.id.clone();

        let (sink, rx) = turn_channel();
        drop(rx); // client gone before any frame is delivered
        let outcome = orch.run(prepared, &sink).await;

        // The first delta was accumulated before the failed send surfaced
        // the disconnect; it still gets persisted.
        assert_eq!(outcome.text, "Hello ");
        assert!(outcome.message_id.is_some());

        let stored = orch
            .storage
            .get_messages(&conversation_id, None)
            .await
            .unwrap();
        assert_eq!(stored[1].content, "Hello ");
    }

    struct FailingEnricher;

    #[async_trait]
    impl crevio_core::traits::PluginAdapter for FailingEnricher {
        fn name(&self) -> &str {
            "failing"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Enrichment
        }
        async fn health_check(&self) -> Result<HealthStatus, CrevioError> {
            Ok(HealthStatus::Unhealthy("always fails".into()))
        }
        async fn shutdown(&self) -> Result<(), CrevioError> {
            Ok(())
        }
    }

    #[async_trait]
    impl EnrichmentAdapter for FailingEnricher {
        fn kind(&self) -> EnrichmentKind {
            EnrichmentKind::SocialProfile
        }
        async fn analyze(
            &self,
            _target: &EnrichmentTarget,
            _user_id: &str,
        ) -> Result<EnrichmentOutcome, CrevioError> {
            Err(CrevioError::provider("analysis service unreachable"))
        }
    }

    #[tokio::test]
    async fn failed_enrichment_still_streams_a_reply() {
        let classify = r#"{
            "web_search": {"should_act": false, "confidence": 0.0, "reason": "", "query": null},
            "social_profile": {"should_act": true, "confidence": 0.9, "reason": "named a handle", "username": "creator"},
            "hashtag": {"should_act": false, "confidence": 0.0, "reason": "", "hashtag": null},
            "blog": {"should_act": false, "confidence": 0.0, "reason": "", "urls": []},
            "profile_update": {"should_act": false, "confidence": 0.0, "reason": "", "explicit_request": false},
            "workflow_phase": {"phase": "discovery", "confidence": 0.9, "reason": ""}
        }"#;
        let orch = orchestrator_with(ScriptedProvider::new(classify, &["Here is my take."]))
            .await
            .with_enrichers(
                Arc::new(FailingEnricher),
                Arc::new(FailingEnricher),
                Arc::new(FailingEnricher),
            );
        let prepared = orch.prepare(request("new", "look at @creator")).await.unwrap();
        let conversation_id = prepared.context.conversation.id.clone();

        let (sink, mut rx) = turn_channel();
        let outcome = orch.run(prepared, &sink).await;
        drop(sink);

        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        while let Some(line) = rx.recv().await {
            frames.extend(decoder.push(&line));
        }

        // The analyzer failed, the reply did not.
        assert_eq!(outcome.text, "Here is my take.");
        assert!(outcome.message_id.is_some());
        assert!(!frames.iter().any(|f| matches!(f, Frame::Error { .. })));

        let analyzing = frames
            .iter()
            .position(|f| {
                matches!(f, Frame::Activity { phase: Some(p), detail: Some(d) }
                    if p == "analyzing_profile" && d == "creator")
            })
            .expect("analysis activity announced");
        let first_text = frames.iter().position(Frame::is_text).unwrap();
        assert!(frames[analyzing..first_text]
            .iter()
            .any(|f| matches!(f, Frame::Activity { phase: None, .. })));

        let stored = orch
            .storage
            .get_messages(&conversation_id, None)
            .await
            .unwrap();
        assert_eq!(stored[1].content, "Here is my take.");
    }

    #[tokio::test]
    async fn second_turn_reuses_existing_user_and_conversation() {
        let orch = orchestrator_with(ScriptedProvider::new("", &["reply"])).await;
        let prepared = orch.prepare(request("new", "first")).await.unwrap();
        let conversation_id = prepared.context.conversation.id.clone();
        let (sink, mut rx) = turn_channel();
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
        orch.run(prepared, &sink).await;
        drop(sink);
        drain.await.unwrap();

        let prepared = orch.prepare(request(&conversation_id, "second")).await.unwrap();
        assert_eq!(prepared.context.conversation.id, conversation_id);
        // History already holds turn one plus the new user message.
        let (sink, mut rx) = turn_channel();
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let outcome = orch.run(prepared, &sink).await;
        drop(sink);
        drain.await.unwrap();
        assert_eq!(outcome.text, "reply");

        let stored = orch
            .storage
            .get_messages(&conversation_id, None)
            .await
            .unwrap();
        assert_eq!(stored.len(), 4);
    }
}
