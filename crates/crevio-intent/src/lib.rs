// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unified intent classification for the Crevio assistant pipeline.
//!
//! One model call per turn yields six sub-decisions (web search, social
//! profile, hashtag, blog, profile update, workflow phase) behind a
//! coercion layer that normalizes variable-shaped provider JSON.

pub mod classifier;
pub mod coerce;
pub mod decision;

pub use classifier::{parse_decision_response, IntentClassifier};
pub use decision::{
    BlogDecision, Decision, HashtagDecision, PhaseDecision, ProfileUpdateDecision,
    SocialProfileDecision, UnifiedIntentDecision, WebSearchDecision, WorkflowPhase,
};
