// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The three enrichment adapters: social profile, hashtag, blog.
//!
//! All three follow the same shape: check the user's cached blob, call the
//! analyzer service on a miss, and report failures as
//! [`EnrichmentOutcome::Failure`] so a broken analyzer never aborts a turn.
//! `Err` is reserved for a target of the wrong kind, which is a caller bug.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use crevio_config::EnrichmentConfig;
use crevio_core::error::CrevioError;
use crevio_core::traits::{EnrichmentAdapter, PluginAdapter, StorageAdapter};
use crevio_core::types::{
    AdapterType, EnrichmentKind, EnrichmentOutcome, EnrichmentTarget, HealthStatus,
};
use serde_json::json;
use tracing::{debug, info};

use crate::cache;
use crate::client::EnrichClient;

/// Shared plumbing for the three adapters.
struct EnrichInner {
    client: Arc<EnrichClient>,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    config: EnrichmentConfig,
}

impl EnrichInner {
    async fn analyze(
        &self,
        kind: EnrichmentKind,
        target: &EnrichmentTarget,
        user_id: &str,
        path: &str,
        body: serde_json::Value,
    ) -> Result<EnrichmentOutcome, CrevioError> {
        // Cache check reads the profile's stored analysis blobs.
        if let Some(user) = self.storage.get_user(user_id).await? {
            if let Some(analysis) =
                cache::cached_analysis(kind, target, &user.profile_data, &self.config, Utc::now())
            {
                debug!(%kind, user_id, "serving enrichment from cached analysis");
                return Ok(EnrichmentOutcome::Success {
                    analysis,
                    cached: true,
                });
            }
        }

        match self.client.post_analysis(path, &body).await {
            Ok(analysis) => {
                info!(%kind, user_id, "enrichment analysis completed");
                Ok(EnrichmentOutcome::Success {
                    analysis,
                    cached: false,
                })
            }
            Err(e) => {
                info!(%kind, user_id, "enrichment analysis failed: {e}");
                Ok(EnrichmentOutcome::Failure {
                    error: e.to_string(),
                })
            }
        }
    }
}

fn wrong_target(kind: EnrichmentKind) -> CrevioError {
    CrevioError::Internal(format!("target kind does not match {kind} adapter"))
}

macro_rules! plugin_impl {
    ($ty:ty, $name:literal) => {
        #[async_trait]
        impl PluginAdapter for $ty {
            fn name(&self) -> &str {
                $name
            }
            fn version(&self) -> semver::Version {
                semver::Version::new(0, 1, 0)
            }
            fn adapter_type(&self) -> AdapterType {
                AdapterType::Enrichment
            }
            async fn health_check(&self) -> Result<HealthStatus, CrevioError> {
                Ok(if self.inner.client.enabled() {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded("enrichment not configured".into())
                })
            }
            async fn shutdown(&self) -> Result<(), CrevioError> {
                Ok(())
            }
        }
    };
}

/// Analyzes a social media profile by username. Cache: 24h.
pub struct SocialProfileAnalyzer {
    inner: EnrichInner,
}

impl SocialProfileAnalyzer {
    pub fn new(
        client: Arc<EnrichClient>,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            inner: EnrichInner {
                client,
                storage,
                config,
            },
        }
    }
}

plugin_impl!(SocialProfileAnalyzer, "social-profile-analyzer");

#[async_trait]
impl EnrichmentAdapter for SocialProfileAnalyzer {
    fn kind(&self) -> EnrichmentKind {
        EnrichmentKind::SocialProfile
    }

    async fn analyze(
        &self,
        target: &EnrichmentTarget,
        user_id: &str,
    ) -> Result<EnrichmentOutcome, CrevioError> {
        let EnrichmentTarget::Username(username) = target else {
            return Err(wrong_target(self.kind()));
        };
        self.inner
            .analyze(
                self.kind(),
                target,
                user_id,
                "/analyze/profile",
                json!({"username": username, "user_id": user_id}),
            )
            .await
    }
}

/// Searches and analyzes a hashtag. Cache: 6h.
pub struct HashtagAnalyzer {
    inner: EnrichInner,
}

impl HashtagAnalyzer {
    pub fn new(
        client: Arc<EnrichClient>,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            inner: EnrichInner {
                client,
                storage,
                config,
            },
        }
    }
}

plugin_impl!(HashtagAnalyzer, "hashtag-analyzer");

#[async_trait]
impl EnrichmentAdapter for HashtagAnalyzer {
    fn kind(&self) -> EnrichmentKind {
        EnrichmentKind::Hashtag
    }

    async fn analyze(
        &self,
        target: &EnrichmentTarget,
        user_id: &str,
    ) -> Result<EnrichmentOutcome, CrevioError> {
        let EnrichmentTarget::Hashtag(tag) = target else {
            return Err(wrong_target(self.kind()));
        };
        self.inner
            .analyze(
                self.kind(),
                target,
                user_id,
                "/analyze/hashtag",
                json!({"hashtag": tag, "user_id": user_id}),
            )
            .await
    }
}

/// Analyzes blog content from one or more URLs. Cache: 7 days.
pub struct BlogAnalyzer {
    inner: EnrichInner,
}

impl BlogAnalyzer {
    pub fn new(
        client: Arc<EnrichClient>,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            inner: EnrichInner {
                client,
                storage,
                config,
            },
        }
    }
}

plugin_impl!(BlogAnalyzer, "blog-analyzer");

#[async_trait]
impl EnrichmentAdapter for BlogAnalyzer {
    fn kind(&self) -> EnrichmentKind {
        EnrichmentKind::Blog
    }

    async fn analyze(
        &self,
        target: &EnrichmentTarget,
        user_id: &str,
    ) -> Result<EnrichmentOutcome, CrevioError> {
        let EnrichmentTarget::Urls(urls) = target else {
            return Err(wrong_target(self.kind()));
        };
        self.inner
            .analyze(
                self.kind(),
                target,
                user_id,
                "/analyze/blog",
                json!({"urls": urls, "user_id": user_id}),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crevio_core::types::{Conversation, Message, UserRecord};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Storage stub serving a single fixed user.
    struct OneUser {
        user: UserRecord,
    }

    #[async_trait]
    impl PluginAdapter for OneUser {
        fn name(&self) -> &str {
            "one-user"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Storage
        }
        async fn health_check(&self) -> Result<HealthStatus, CrevioError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), CrevioError> {
            Ok(())
        }
    }

    #[async_trait]
    impl StorageAdapter for OneUser {
        async fn initialize(&self) -> Result<(), CrevioError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), CrevioError> {
            Ok(())
        }
        async fn create_conversation(&self, _: &Conversation) -> Result<(), CrevioError> {
            unimplemented!()
        }
        async fn get_conversation(&self, _: &str) -> Result<Option<Conversation>, CrevioError> {
            unimplemented!()
        }
        async fn update_conversation_title(&self, _: &str, _: &str) -> Result<(), CrevioError> {
            unimplemented!()
        }
        async fn insert_message(&self, _: &Message) -> Result<(), CrevioError> {
            unimplemented!()
        }
        async fn get_message(&self, _: &str) -> Result<Option<Message>, CrevioError> {
            unimplemented!()
        }
        async fn get_messages(
            &self,
            _: &str,
            _: Option<i64>,
        ) -> Result<Vec<Message>, CrevioError> {
            unimplemented!()
        }
        async fn delete_message(&self, _: &str) -> Result<(), CrevioError> {
            unimplemented!()
        }
        async fn get_user(&self, _: &str) -> Result<Option<UserRecord>, CrevioError> {
            Ok(Some(self.user.clone()))
        }
        async fn upsert_user(&self, _: &UserRecord) -> Result<(), CrevioError> {
            unimplemented!()
        }
        async fn update_user_profile(
            &self,
            _: &UserRecord,
            _: i64,
        ) -> Result<bool, CrevioError> {
            unimplemented!()
        }
        async fn increment_usage(&self, _: &str) -> Result<(), CrevioError> {
            Ok(())
        }
    }

    fn user_with_profile_data(profile_data: serde_json::Value) -> UserRecord {
        UserRecord {
            id: "u1".into(),
            display_name: None,
            content_niche: vec![],
            primary_platforms: vec![],
            profile_data,
            profile_version: 1,
            usage_count: 0,
            usage_limit: 500,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn analyzer_config(base_url: String) -> EnrichmentConfig {
        EnrichmentConfig {
            base_url: Some(base_url),
            ..Default::default()
        }
    }

    fn social_adapter(base_url: String, profile_data: serde_json::Value) -> SocialProfileAnalyzer {
        let config = analyzer_config(base_url);
        let client = Arc::new(EnrichClient::new(&config).unwrap());
        let storage = Arc::new(OneUser {
            user: user_with_profile_data(profile_data),
        });
        SocialProfileAnalyzer::new(client, storage, config)
    }

    #[tokio::test]
    async fn miss_calls_analyzer_and_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze/profile"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"followers": 12000})),
            )
            .mount(&server)
            .await;

        let adapter = social_adapter(server.uri(), json!({}));
        let outcome = adapter
            .analyze(&EnrichmentTarget::Username("fitcoach".into()), "u1")
            .await
            .unwrap();

        match outcome {
            EnrichmentOutcome::Success { analysis, cached } => {
                assert!(!cached);
                assert_eq!(analysis["followers"], 12000);
            }
            EnrichmentOutcome::Failure { error } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn fresh_cache_skips_analyzer() {
        // No mock mounted: a network call would fail the test.
        let server = MockServer::start().await;
        let cached_at = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let profile_data = json!({
            "instagram_profile": {"username": "fitcoach", "followers": 900, "cached_at": cached_at}
        });

        let adapter = social_adapter(server.uri(), profile_data);
        let outcome = adapter
            .analyze(&EnrichmentTarget::Username("fitcoach".into()), "u1")
            .await
            .unwrap();

        match outcome {
            EnrichmentOutcome::Success { analysis, cached } => {
                assert!(cached);
                assert_eq!(analysis["followers"], 900);
            }
            EnrichmentOutcome::Failure { error } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn analyzer_error_is_failure_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let adapter = social_adapter(server.uri(), json!({}));
        let outcome = adapter
            .analyze(&EnrichmentTarget::Username("fitcoach".into()), "u1")
            .await
            .unwrap();
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn wrong_target_kind_is_an_error() {
        let server = MockServer::start().await;
        let adapter = social_adapter(server.uri(), json!({}));
        let result = adapter
            .analyze(&EnrichmentTarget::Hashtag("fitness".into()), "u1")
            .await;
        assert!(matches!(result, Err(CrevioError::Internal(_))));
    }
}
