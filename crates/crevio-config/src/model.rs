// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Crevio assistant pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Crevio configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CrevioConfig {
    /// Assistant identity and behavior settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Anthropic API settings (chat completion provider).
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Memory system settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Intent classification settings.
    #[serde(default)]
    pub intent: IntentConfig,

    /// External enrichment analyzer settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Per-user usage allowance settings.
    #[serde(default)]
    pub usage: UsageConfig,
}

/// Assistant identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the assistant.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inline system prompt preamble. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a markdown file containing the system prompt preamble.
    #[serde(default)]
    pub system_prompt_file: Option<String>,

    /// Maximum accepted user message length in characters.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            system_prompt: None,
            system_prompt_file: None,
            max_message_chars: default_max_message_chars(),
        }
    }
}

fn default_agent_name() -> String {
    "crevio".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_message_chars() -> usize {
    4000
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` requires the `ANTHROPIC_API_KEY` env var.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for the visible streamed reply.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Cheaper model used for classification, extraction, and titles.
    #[serde(default = "default_classifier_model")]
    pub classifier_model: String,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            classifier_model: default_classifier_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_classifier_model() -> String {
    "claude-haiku-4-5-20250901".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Embedding provider configuration (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// API key. `None` requires the `OPENAI_API_KEY` env var.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the embeddings endpoint.
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Embedding model identifier.
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
        }
    }
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("crevio").join("crevio.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "crevio.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8090
}

/// Memory system configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Number of memories retrieved per turn.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Dedup threshold for inserting conversation-extracted facts.
    /// Only true near-duplicates are dropped.
    #[serde(default = "default_insertion_threshold")]
    pub insertion_dedup_threshold: f32,

    /// Dedup threshold for upserting analysis-sourced facts.
    /// Near-duplicates replace the prior memory in place.
    #[serde(default = "default_upsert_threshold")]
    pub upsert_dedup_threshold: f32,

    /// Lower bound of the memory query length band, in characters.
    #[serde(default = "default_query_min_chars")]
    pub query_min_chars: usize,

    /// Upper bound of the memory query length band, in characters.
    #[serde(default = "default_query_max_chars")]
    pub query_max_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            insertion_dedup_threshold: default_insertion_threshold(),
            upsert_dedup_threshold: default_upsert_threshold(),
            query_min_chars: default_query_min_chars(),
            query_max_chars: default_query_max_chars(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_insertion_threshold() -> f32 {
    0.92
}

fn default_upsert_threshold() -> f32 {
    0.85
}

fn default_query_min_chars() -> usize {
    60
}

fn default_query_max_chars() -> usize {
    200
}

/// Intent classification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntentConfig {
    /// Minimum confidence for acting on any sub-decision.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Minimum confidence for confidence-only profile extraction triggers.
    #[serde(default = "default_profile_confidence")]
    pub profile_confidence: f64,

    /// How many recent messages the classifier sees.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            profile_confidence: default_profile_confidence(),
            history_window: default_history_window(),
        }
    }
}

fn default_min_confidence() -> f64 {
    0.7
}

fn default_profile_confidence() -> f64 {
    0.75
}

fn default_history_window() -> usize {
    10
}

/// External enrichment analyzer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentConfig {
    /// Base URL of the analyzer service. `None` disables enrichment.
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key for the analyzer service.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Social profile analysis cache validity, in hours.
    #[serde(default = "default_profile_cache_hours")]
    pub profile_cache_hours: i64,

    /// Hashtag search cache validity, in hours.
    #[serde(default = "default_hashtag_cache_hours")]
    pub hashtag_cache_hours: i64,

    /// Blog analysis cache validity, in days.
    #[serde(default = "default_blog_cache_days")]
    pub blog_cache_days: i64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            profile_cache_hours: default_profile_cache_hours(),
            hashtag_cache_hours: default_hashtag_cache_hours(),
            blog_cache_days: default_blog_cache_days(),
        }
    }
}

fn default_profile_cache_hours() -> i64 {
    24
}

fn default_hashtag_cache_hours() -> i64 {
    6
}

fn default_blog_cache_days() -> i64 {
    7
}

/// Per-user usage allowance configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UsageConfig {
    /// Default per-user message allowance for newly created users.
    #[serde(default = "default_usage_limit")]
    pub default_limit: i64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            default_limit: default_usage_limit(),
        }
    }
}

fn default_usage_limit() -> i64 {
    500
}
