// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP embedding adapter for the Crevio assistant pipeline.
//!
//! Implements [`EmbeddingAdapter`] against an OpenAI-compatible
//! `/v1/embeddings` endpoint. Returned vectors are L2-normalized so the
//! memory store can use a plain dot product for cosine similarity.

use std::time::Duration;

use async_trait::async_trait;
use crevio_config::CrevioConfig;
use crevio_core::traits::{EmbeddingAdapter, PluginAdapter};
use crevio_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use crevio_core::CrevioError;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Request body for the embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response body from the embeddings endpoint.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding adapter backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpEmbedding {
    /// Creates a new embedding adapter from the given configuration.
    ///
    /// API key resolution: `config.embedding.api_key`, then the
    /// `OPENAI_API_KEY` environment variable.
    pub fn new(config: &CrevioConfig) -> Result<Self, CrevioError> {
        let api_key = resolve_api_key(&config.embedding.api_key)?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
            CrevioError::Config(format!("invalid embedding API key header value: {e}"))
        })?;
        auth.set_sensitive(true);
        headers.insert("authorization", auth);
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CrevioError::Provider {
                message: format!("failed to build embedding HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        info!(model = config.embedding.model, "embedding adapter initialized");

        Ok(Self {
            client,
            base_url: config.embedding.base_url.clone(),
            model: config.embedding.model.clone(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[async_trait]
impl PluginAdapter for HttpEmbedding {
    fn name(&self) -> &str {
        "http-embedding"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, CrevioError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CrevioError> {
        debug!("embedding adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for HttpEmbedding {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, CrevioError> {
        if input.texts.is_empty() {
            return Ok(EmbeddingOutput {
                embeddings: Vec::new(),
                dimensions: 0,
            });
        }

        let body = EmbeddingsRequest {
            model: &self.model,
            input: &input.texts,
        };

        let response = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CrevioError::Provider {
                message: format!("embedding HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrevioError::Provider {
                message: format!("embedding API returned {status}: {body}"),
                source: None,
            });
        }

        let parsed: EmbeddingsResponse =
            response.json().await.map_err(|e| CrevioError::Provider {
                message: format!("failed to parse embedding response: {e}"),
                source: Some(Box::new(e)),
            })?;

        if parsed.data.len() != input.texts.len() {
            return Err(CrevioError::Provider {
                message: format!(
                    "embedding API returned {} vectors for {} inputs",
                    parsed.data.len(),
                    input.texts.len()
                ),
                source: None,
            });
        }

        // The API is documented to preserve order, but index is authoritative.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        let dimensions = data.first().map(|d| d.embedding.len()).unwrap_or(0);
        let embeddings = data
            .into_iter()
            .map(|d| l2_normalize(d.embedding))
            .collect();

        Ok(EmbeddingOutput {
            embeddings,
            dimensions,
        })
    }
}

/// L2-normalizes a vector in place. Zero vectors are returned unchanged.
fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Resolves the API key from config or environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, CrevioError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("OPENAI_API_KEY").map_err(|_| {
        CrevioError::Config(
            "embedding API key not found. Set embedding.api_key in config or OPENAI_API_KEY environment variable.".into(),
        )
    })
}
