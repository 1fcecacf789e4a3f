// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Crevio assistant pipeline.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Crevio workspace. All adapter plugins
//! implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CrevioError;
pub use types::{AdapterType, HealthStatus};

// Re-export all adapter traits at crate root.
pub use traits::{
    EmbeddingAdapter, EnrichmentAdapter, PluginAdapter, ProviderAdapter, StorageAdapter,
    WebSearchAdapter,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crevio_error_has_all_variants() {
        let _config = CrevioError::Config("test".into());
        let _validation = CrevioError::Validation("empty message".into());
        let _ownership = CrevioError::Ownership("conversation".into());
        let _not_found = CrevioError::NotFound {
            resource: "conversation",
            id: "test".into(),
        };
        let _usage = CrevioError::UsageLimit { used: 1, limit: 1 };
        let _storage = CrevioError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _provider = CrevioError::Provider {
            message: "test".into(),
            source: None,
        };
        let _timeout = CrevioError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = CrevioError::Internal("test".into());
    }

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        let variants = [
            AdapterType::Provider,
            AdapterType::Embedding,
            AdapterType::Storage,
            AdapterType::Enrichment,
            AdapterType::Search,
        ];

        for variant in &variants {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(*variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        let degraded = HealthStatus::Degraded("slow".into());
        let unhealthy = HealthStatus::Unhealthy("down".into());

        assert_eq!(healthy, HealthStatus::Healthy);
        assert_ne!(degraded, healthy);
        assert_ne!(unhealthy, healthy);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        // If any trait module is missing or fails to compile, this test
        // won't compile.
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_provider_adapter<T: ProviderAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_embedding_adapter<T: EmbeddingAdapter>() {}
        fn _assert_enrichment_adapter<T: EnrichmentAdapter>() {}
        fn _assert_search_adapter<T: WebSearchAdapter>() {}
    }
}
