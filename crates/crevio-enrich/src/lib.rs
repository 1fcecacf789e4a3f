// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External enrichment adapters for the Crevio assistant pipeline.
//!
//! Social profile, hashtag, and blog analyzers behind one HTTP client,
//! each with its own cache-freshness window over the profile's stored
//! analysis blobs. Failures are outcomes, never propagated errors.

pub mod adapters;
pub mod cache;
pub mod client;

pub use adapters::{BlogAnalyzer, HashtagAnalyzer, SocialProfileAnalyzer};
pub use cache::{blob_delta, cached_analysis};
pub use client::EnrichClient;
