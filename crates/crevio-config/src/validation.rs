// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind addresses, non-empty paths, and sane threshold ranges.

use thiserror::Error;

use crate::model::CrevioConfig;

/// A configuration error reported at load or validation time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config files failed to parse or merge.
    #[error("configuration parse error: {0}")]
    Parse(#[from] Box<figment::Error>),

    /// A semantic constraint on a config value was violated.
    #[error("{message}")]
    Validation { message: String },
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CrevioConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // Validate gateway.host is not empty and looks like an IP or hostname
    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    // Validate database_path is not empty
    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    // Validate dedup thresholds fall in (0, 1] and preserve their ordering.
    // The insertion threshold is intentionally stricter (higher) than the
    // upsert threshold: conversation facts are only dropped when nearly
    // identical, while analysis facts replace close matches.
    for (name, value) in [
        (
            "memory.insertion_dedup_threshold",
            config.memory.insertion_dedup_threshold,
        ),
        (
            "memory.upsert_dedup_threshold",
            config.memory.upsert_dedup_threshold,
        ),
    ] {
        if !(0.0..=1.0).contains(&value) || value == 0.0 {
            errors.push(ConfigError::Validation {
                message: format!("{name} must be in (0, 1], got {value}"),
            });
        }
    }
    if config.memory.insertion_dedup_threshold < config.memory.upsert_dedup_threshold {
        errors.push(ConfigError::Validation {
            message: format!(
                "memory.insertion_dedup_threshold ({}) must be >= memory.upsert_dedup_threshold ({})",
                config.memory.insertion_dedup_threshold, config.memory.upsert_dedup_threshold
            ),
        });
    }

    // Validate confidence gates fall in (0, 1]
    for (name, value) in [
        ("intent.min_confidence", config.intent.min_confidence),
        ("intent.profile_confidence", config.intent.profile_confidence),
    ] {
        if !(0.0..=1.0).contains(&value) || value == 0.0 {
            errors.push(ConfigError::Validation {
                message: format!("{name} must be in (0, 1], got {value}"),
            });
        }
    }

    // Validate the memory query length band is a proper band
    if config.memory.query_min_chars >= config.memory.query_max_chars {
        errors.push(ConfigError::Validation {
            message: format!(
                "memory.query_min_chars ({}) must be less than memory.query_max_chars ({})",
                config.memory.query_min_chars, config.memory.query_max_chars
            ),
        });
    }

    if config.memory.top_k == 0 {
        errors.push(ConfigError::Validation {
            message: "memory.top_k must be at least 1".to_string(),
        });
    }

    // Validate cache validity windows are positive
    for (name, value) in [
        (
            "enrichment.profile_cache_hours",
            config.enrichment.profile_cache_hours,
        ),
        (
            "enrichment.hashtag_cache_hours",
            config.enrichment.hashtag_cache_hours,
        ),
        ("enrichment.blog_cache_days", config.enrichment.blog_cache_days),
    ] {
        if value < 1 {
            errors.push(ConfigError::Validation {
                message: format!("{name} must be at least 1, got {value}"),
            });
        }
    }

    if config.usage.default_limit < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "usage.default_limit must be non-negative, got {}",
                config.usage.default_limit
            ),
        });
    }

    if config.agent.max_message_chars == 0 {
        errors.push(ConfigError::Validation {
            message: "agent.max_message_chars must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
