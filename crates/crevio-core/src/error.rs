// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Crevio assistant pipeline.

use thiserror::Error;

/// The primary error type used across all Crevio adapter traits and core operations.
///
/// The variants mirror the turn error taxonomy: everything that can be rejected
/// before streaming begins has its own variant so the gateway can map it to a
/// precise HTTP status; provider-class failures carry their upstream source.
#[derive(Debug, Error)]
pub enum CrevioError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Input validation errors (empty or oversized message). Rejected pre-stream.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The caller does not own the requested resource. Rejected pre-stream.
    #[error("not authorized: {0}")]
    Ownership(String),

    /// A referenced entity does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// The caller has exhausted their usage allowance. Counters are
    /// machine-readable so the gateway can include them in the response body.
    #[error("usage limit reached: {used}/{limit}")]
    UsageLimit { used: i64, limit: i64 },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// LLM or embedding provider errors (API failure, token limits, malformed output).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CrevioError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        CrevioError::Provider {
            message: message.into(),
            source: None,
        }
    }
}
