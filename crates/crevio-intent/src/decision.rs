// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent decision types.
//!
//! One classification call per turn yields a [`UnifiedIntentDecision`] whose
//! six sub-decisions reflect a single consistent read of the conversation.
//! Decisions are ephemeral; they are consumed within the turn and never
//! persisted.

use serde::{Deserialize, Serialize};

/// Common fields every sub-decision carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the classifier recommends taking the action.
    pub should_act: bool,
    /// Classifier confidence in [0, 1].
    pub confidence: f64,
    /// Short human-readable justification.
    pub reason: String,
}

impl Decision {
    /// A decision that recommends no action.
    pub fn negative() -> Self {
        Self::default()
    }

    /// True when the action should run: recommended and at or above the gate.
    pub fn actionable(&self, min_confidence: f64) -> bool {
        self.should_act && self.confidence >= min_confidence
    }
}

/// Web search sub-decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSearchDecision {
    #[serde(flatten)]
    pub decision: Decision,
    /// Search query to issue, when acting.
    pub query: Option<String>,
}

/// Social profile analysis sub-decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialProfileDecision {
    #[serde(flatten)]
    pub decision: Decision,
    /// Username to analyze, without a leading `@`.
    pub username: Option<String>,
}

/// Hashtag search sub-decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HashtagDecision {
    #[serde(flatten)]
    pub decision: Decision,
    /// Hashtag to search, without a leading `#`.
    pub hashtag: Option<String>,
}

/// Blog analysis sub-decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlogDecision {
    #[serde(flatten)]
    pub decision: Decision,
    /// URLs to analyze.
    pub urls: Vec<String>,
}

/// Profile update sub-decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdateDecision {
    #[serde(flatten)]
    pub decision: Decision,
    /// Profile field names the classifier believes are extractable.
    pub fields: Vec<String>,
    /// True when the user explicitly asked for a profile change.
    pub explicit_request: bool,
}

/// Coarse conversation phase gating free-form content generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    /// Still learning who the user is; content generation is blocked.
    #[default]
    Discovery,
    /// Gathering external context about the user's presence.
    Enrichment,
    /// Enough profile exists to generate content freely.
    Generation,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Discovery => "discovery",
            WorkflowPhase::Enrichment => "enrichment",
            WorkflowPhase::Generation => "generation",
        }
    }

    pub fn from_str_value(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "enrichment" => WorkflowPhase::Enrichment,
            "generation" => WorkflowPhase::Generation,
            _ => WorkflowPhase::Discovery,
        }
    }
}

/// Workflow phase sub-decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseDecision {
    #[serde(flatten)]
    pub decision: Decision,
    /// The phase the user is judged to be in.
    pub phase: WorkflowPhase,
}

/// The atomic classification result for one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnifiedIntentDecision {
    pub web_search: WebSearchDecision,
    pub social_profile: SocialProfileDecision,
    pub hashtag: HashtagDecision,
    pub blog: BlogDecision,
    pub profile_update: ProfileUpdateDecision,
    pub workflow_phase: PhaseDecision,
}

impl UnifiedIntentDecision {
    /// The safe fallback when classification fails: no search, no analysis,
    /// no extraction, phase Discovery.
    pub fn all_negative() -> Self {
        Self::default()
    }
}
