// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound frame types.
//!
//! A turn's response is one ordered byte stream of newline-delimited JSON
//! frames: visible text deltas interleaved with four control categories.
//! Stripping all non-text frames and concatenating the deltas yields
//! byte-for-byte the assistant text that gets persisted.

use crevio_core::types::Citation;
use serde::{Deserialize, Serialize};

/// Notice that a profile list field dropped proposed items at its cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CappedNotice {
    pub field: String,
    pub limit: usize,
    pub attempted: usize,
}

/// One frame of the outbound NDJSON stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Visible reply text delta.
    Text { delta: String },

    /// Transient activity indicator; `phase: null` clears the indicator.
    Activity {
        phase: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },

    /// Web search report, sent exactly once as generation begins.
    /// `performed: false` with empty citations means never attempted;
    /// `performed: true` with empty citations is a distinct state.
    SearchMetadata {
        performed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        citations: Vec<Citation>,
    },

    /// Server-assigned id for the persisted assistant message, sent exactly
    /// once per persisted message so callers can reconcile optimistic UIs.
    MessageId {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_key: Option<String>,
    },

    /// Profile merge report.
    ProfileUpdated {
        updated_fields: Vec<String>,
        completeness: f64,
        capped_fields: Vec<CappedNotice>,
    },

    /// Mid-stream failure notice; the stream closes after this frame.
    Error { message: String },
}

impl Frame {
    pub fn text(delta: impl Into<String>) -> Self {
        Frame::Text {
            delta: delta.into(),
        }
    }

    pub fn activity(phase: impl Into<String>, detail: Option<String>) -> Self {
        Frame::Activity {
            phase: Some(phase.into()),
            detail,
        }
    }

    /// Clears the activity indicator.
    pub fn activity_cleared() -> Self {
        Frame::Activity {
            phase: None,
            detail: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Frame::Error {
            message: message.into(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Frame::Text { .. })
    }
}
