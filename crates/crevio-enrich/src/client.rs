// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the external analyzer service.

use std::time::Duration;

use crevio_config::EnrichmentConfig;
use crevio_core::error::CrevioError;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;

/// Thin client over the analyzer service's JSON endpoints.
///
/// Construction fails only on malformed config; a missing `base_url` means
/// enrichment is disabled and every call reports a failure outcome upstream.
pub struct EnrichClient {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl EnrichClient {
    pub fn new(config: &EnrichmentConfig) -> Result<Self, CrevioError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key
            && !key.is_empty()
        {
            let mut auth = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                CrevioError::Config(format!("invalid enrichment API key header value: {e}"))
            })?;
            auth.set_sensitive(true);
            headers.insert("authorization", auth);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CrevioError::Provider {
                message: format!("failed to build enrichment HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    pub fn enabled(&self) -> bool {
        self.base_url.is_some()
    }

    /// POST a JSON body to `path`, returning the analysis payload.
    ///
    /// Errors here are analyzer failures; callers convert them into
    /// failure outcomes rather than propagating.
    pub async fn post_analysis<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, CrevioError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| CrevioError::provider("enrichment is not configured"))?;

        let response = self
            .client
            .post(format!("{base}{path}"))
            .json(body)
            .send()
            .await
            .map_err(|e| CrevioError::Provider {
                message: format!("analyzer request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrevioError::Provider {
                message: format!("analyzer returned {status}: {body}"),
                source: None,
            });
        }

        response.json().await.map_err(|e| CrevioError::Provider {
            message: format!("failed to parse analyzer response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> EnrichmentConfig {
        EnrichmentConfig {
            base_url: Some("http://unused.invalid".into()),
            api_key: Some("enrich-key".into()),
            ..Default::default()
        }
    }

    #[test]
    fn disabled_without_base_url() {
        let config = EnrichmentConfig {
            base_url: None,
            ..Default::default()
        };
        let client = EnrichClient::new(&config).unwrap();
        assert!(!client.enabled());
    }

    #[tokio::test]
    async fn post_analysis_returns_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze/profile"))
            .and(body_partial_json(json!({"username": "fitcoach"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"followers": 12000})),
            )
            .mount(&server)
            .await;

        let client = EnrichClient::new(&test_config())
            .unwrap()
            .with_base_url(server.uri());
        let analysis = client
            .post_analysis("/analyze/profile", &json!({"username": "fitcoach", "user_id": "u1"}))
            .await
            .unwrap();
        assert_eq!(analysis["followers"], 12000);
    }

    #[tokio::test]
    async fn post_analysis_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = EnrichClient::new(&test_config())
            .unwrap()
            .with_base_url(server.uri());
        let result = client.post_analysis("/analyze/blog", &json!({})).await;
        assert!(matches!(result, Err(CrevioError::Provider { .. })));
    }

    #[tokio::test]
    async fn post_analysis_without_base_url_errors() {
        let config = EnrichmentConfig {
            base_url: None,
            ..Default::default()
        };
        let client = EnrichClient::new(&config).unwrap();
        let result = client.post_analysis("/analyze/profile", &json!({})).await;
        assert!(result.is_err());
    }
}
