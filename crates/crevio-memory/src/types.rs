// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory domain types for the long-term memory system.

use serde::{Deserialize, Serialize};

/// A single memory fact stored by the memory system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier for this memory.
    pub id: String,
    /// Owning user. Memories are never shared across users.
    pub user_id: String,
    /// The factual content of this memory.
    pub content: String,
    /// Embedding vector for semantic search (L2-normalized).
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// How this memory was created.
    pub source: MemorySource,
    /// Retrieval importance weight (0.5 base, capped at 1.0).
    pub importance: f64,
    /// Where the fact came from within its source.
    pub provenance: Provenance,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-update timestamp.
    pub updated_at: String,
}

/// How a memory was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemorySource {
    /// Extracted from conversation text at the end of a turn.
    Conversation,
    /// Derived from an external enrichment analysis result.
    Analysis,
}

impl MemorySource {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemorySource::Conversation => "conversation",
            MemorySource::Analysis => "analysis",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "analysis" => MemorySource::Analysis,
            _ => MemorySource::Conversation,
        }
    }
}

/// Provenance of an extracted fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// The user said this directly.
    UserStated,
    /// Inferred from context by the extraction model.
    Inferred,
    /// Surfaced by an enrichment analysis.
    AnalysisDerived,
}

impl Provenance {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::UserStated => "user_stated",
            Provenance::Inferred => "inferred",
            Provenance::AnalysisDerived => "analysis_derived",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "user_stated" => Provenance::UserStated,
            "analysis_derived" => Provenance::AnalysisDerived,
            _ => Provenance::Inferred,
        }
    }
}

/// A memory with a retrieval score from vector search.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    /// The memory fact.
    pub memory: Memory,
    /// Cosine similarity against the turn's memory query, in [0, 1].
    pub score: f32,
}

/// A fact extracted from conversation by the LLM.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedFact {
    /// The fact content as a standalone statement.
    pub content: String,
    /// Provenance reported by the extraction model.
    #[serde(default = "default_provenance")]
    pub provenance: Provenance,
    /// Model-reported certainty in [0, 1]. Absent means certain.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_provenance() -> Provenance {
    Provenance::Inferred
}

fn default_confidence() -> f64 {
    1.0
}

/// Result of a memory extraction operation.
#[derive(Debug, Default)]
pub struct ExtractionResult {
    /// Newly created memories.
    pub inserted: Vec<Memory>,
    /// Memories whose content was replaced in place by an analysis fact.
    pub upserted: Vec<Memory>,
    /// Candidate facts dropped as near-duplicates.
    pub skipped: usize,
}

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert SQLite BLOB back to f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

/// Compute cosine similarity between two vectors.
///
/// For L2-normalized vectors this is equivalent to the dot product.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vectors must have same length");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
