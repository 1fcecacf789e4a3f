// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Crevio pipeline.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter in the registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Embedding,
    Storage,
    Enrichment,
    Search,
}

// --- Provider types ---

/// A single role-tagged message sent to a chat completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// One of "user", "assistant", "system".
    pub role: String,
    /// Plain text content.
    pub content: String,
}

impl ProviderMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A request to a chat completion provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Model identifier.
    pub model: String,
    /// Optional system prompt. When `None` the provider's default is used.
    pub system_prompt: Option<String>,
    /// Ordered conversation messages.
    pub messages: Vec<ProviderMessage>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Whether the response should be streamed.
    pub stream: bool,
}

/// A complete (non-streaming) response from a chat completion provider.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Provider-assigned response id.
    pub id: String,
    /// Concatenated text content.
    pub content: String,
    /// Model that produced the response.
    pub model: String,
    /// Why generation stopped, if reported.
    pub stop_reason: Option<String>,
    /// Token accounting.
    pub usage: TokenUsage,
}

/// Classifies a streaming chunk from a chat completion provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventType {
    MessageStart,
    ContentBlockDelta,
    MessageDelta,
    MessageStop,
    Error,
}

/// A single chunk from a streaming chat completion response.
#[derive(Debug, Clone)]
pub struct ProviderStreamChunk {
    pub event_type: StreamEventType,
    /// Text delta, present for `ContentBlockDelta`.
    pub text: Option<String>,
    /// Usage update, present on start/delta events when reported.
    pub usage: Option<TokenUsage>,
    /// Provider error description, present for `Error`.
    pub error: Option<String>,
    /// Stop reason, present once known.
    pub stop_reason: Option<String>,
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

// --- Embedding types ---

/// Input for an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    /// Texts to embed, one vector returned per text.
    pub texts: Vec<String>,
}

/// Output from an embedding adapter.
///
/// Vectors are L2-normalized so cosine similarity reduces to a dot product.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
}

// --- Web search types ---

/// A single citation from a web search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
}

/// Result of a web search performed for response context.
#[derive(Debug, Clone)]
pub struct WebSearchResult {
    /// The query that was effectively executed.
    pub query: String,
    /// Synthesized context text for prompt injection.
    pub context_text: String,
    /// Source citations (may be empty even for a successful search).
    pub citations: Vec<Citation>,
}

// --- Enrichment types ---

/// The kind of external enrichment analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum EnrichmentKind {
    SocialProfile,
    Hashtag,
    Blog,
}

/// Target identifier for an enrichment call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentTarget {
    /// Social profile username (without leading @).
    Username(String),
    /// Hashtag (without leading #).
    Hashtag(String),
    /// One or more blog/site URLs.
    Urls(Vec<String>),
}

/// Outcome of an enrichment call. Failures are data, not errors: a failed
/// enrichment must never abort the turn.
#[derive(Debug, Clone)]
pub enum EnrichmentOutcome {
    Success {
        /// Structured analysis result.
        analysis: serde_json::Value,
        /// True when served from a still-fresh cached analysis.
        cached: bool,
    },
    Failure {
        /// Human-readable failure description.
        error: String,
    },
}

impl EnrichmentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EnrichmentOutcome::Success { .. })
    }
}

// --- Stored entities ---

/// A conversation between one user and the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    /// Absent until asynchronous title generation fills it in.
    pub title: Option<String>,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-update timestamp.
    pub updated_at: String,
}

/// A persisted chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    /// One of "user", "assistant", "system".
    pub role: String,
    pub content: String,
    /// Open JSON metadata map: citations, search query, streaming flag,
    /// client correlation key.
    pub metadata: Option<serde_json::Value>,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
}

/// A user record including the profile fields the merge engine operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub display_name: Option<String>,
    /// Content niches, case-insensitive unique, capitalized, max 10.
    pub content_niche: Vec<String>,
    /// Ordered platforms; the first element is the user's primary platform.
    pub primary_platforms: Vec<String>,
    /// Open profile bag: capped sub-arrays and nested cached-analysis blobs.
    pub profile_data: serde_json::Value,
    /// Optimistic-concurrency token, incremented on every profile write.
    pub profile_version: i64,
    pub usage_count: i64,
    pub usage_limit: i64,
    pub created_at: String,
    pub updated_at: String,
}
