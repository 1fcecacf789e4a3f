// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./crevio.toml` > `~/.config/crevio/crevio.toml` > `/etc/crevio/crevio.toml`
//! with environment variable overrides via `CREVIO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CrevioConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/crevio/crevio.toml` (system-wide)
/// 3. `~/.config/crevio/crevio.toml` (user XDG config)
/// 4. `./crevio.toml` (local directory)
/// 5. `CREVIO_*` environment variables
pub fn load_config() -> Result<CrevioConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CrevioConfig::default()))
        .merge(Toml::file("/etc/crevio/crevio.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("crevio/crevio.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("crevio.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<CrevioConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CrevioConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CrevioConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CrevioConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// CRITICAL: Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `CREVIO_ANTHROPIC_API_KEY` must
/// map to `anthropic.api_key`, not `anthropic.api.key`.
fn env_provider() -> Env {
    Env::prefixed("CREVIO_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: CREVIO_ANTHROPIC_API_KEY -> "anthropic_api_key"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("anthropic_", "anthropic.", 1)
            .replacen("embedding_", "embedding.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("memory_", "memory.", 1)
            .replacen("intent_", "intent.", 1)
            .replacen("enrichment_", "enrichment.", 1)
            .replacen("usage_", "usage.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_files() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.agent.name, "crevio");
        assert_eq!(config.gateway.port, 8090);
    }

    #[test]
    fn toml_string_overrides_defaults() {
        let config = load_config_from_str(
            r#"
[gateway]
port = 9000

[anthropic]
default_model = "claude-test"
"#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.anthropic.default_model, "claude-test");
    }

    #[test]
    fn unknown_key_in_toml_fails() {
        let result = load_config_from_str(
            r#"
[gateway]
porte = 9000
"#,
        );
        assert!(result.is_err());
    }
}
