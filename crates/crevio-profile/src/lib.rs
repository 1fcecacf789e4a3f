// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile extraction and merging for the Crevio assistant pipeline.
//!
//! The extractor derives profile field changes from a completed exchange
//! (and enrichment results); the merge rules normalize, dedup, and cap list
//! fields; the engine writes through storage under optimistic concurrency.

pub mod engine;
pub mod extractor;
pub mod merge;

pub use engine::ProfileMergeEngine;
pub use extractor::{parse_profile_delta, should_extract, ProfileExtractor};
pub use merge::{
    completeness, merge_profile, CappedField, MergeReport, ProfileDelta, AUDIENCE_CAP, GOALS_CAP,
    NICHE_CAP, VOICE_CAP,
};
