// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term semantic memory for the Crevio assistant pipeline.
//!
//! Memories are per-user facts with embeddings, stored in SQLite and
//! retrieved by cosine similarity. Facts come from two sources with
//! different dedup behavior:
//!
//! - Conversation extraction at the end of a turn; near-duplicates of
//!   existing memories are dropped.
//! - Enrichment analysis results; near-duplicates replace the prior
//!   memory in place, since fresher analysis supersedes it.

pub mod extractor;
pub mod query;
pub mod store;
pub mod types;

pub use extractor::{parse_extraction_response, MemoryExtractor};
pub use query::build_memory_query;
pub use store::MemoryStore;
pub use types::{
    ExtractedFact, ExtractionResult, Memory, MemorySource, Provenance, ScoredMemory,
};
