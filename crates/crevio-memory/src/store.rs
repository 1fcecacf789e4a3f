// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed memory store with vector BLOB storage.
//!
//! Shares the main database connection; the memories table is created here
//! on first use. Vector search loads per-user embeddings and scores them in
//! process, which is fine at per-user memory counts.

use crevio_core::error::CrevioError;
use tokio_rusqlite::Connection;

use crate::types::{blob_to_vec, cosine_similarity, vec_to_blob, Memory, MemorySource, Provenance, ScoredMemory};

/// Helper to convert tokio_rusqlite errors into CrevioError::Storage.
fn storage_err(e: tokio_rusqlite::Error) -> CrevioError {
    CrevioError::Storage {
        source: Box::new(e),
    }
}

const MEMORY_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS memories (
    id          TEXT PRIMARY KEY NOT NULL,
    user_id     TEXT NOT NULL,
    content     TEXT NOT NULL,
    embedding   BLOB NOT NULL,
    source      TEXT NOT NULL,
    importance  REAL NOT NULL DEFAULT 0.5,
    provenance  TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memories_user ON memories(user_id);
";

/// Persistent store for per-user memories in SQLite.
pub struct MemoryStore {
    conn: Connection,
}

impl MemoryStore {
    /// Creates a MemoryStore wrapping an existing connection and ensures the
    /// memories table exists.
    pub async fn new(conn: Connection) -> Result<Self, CrevioError> {
        conn.call(|conn| {
            conn.execute_batch(MEMORY_SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(storage_err)?;
        Ok(Self { conn })
    }

    /// Save a new memory.
    pub async fn save(&self, memory: &Memory) -> Result<(), CrevioError> {
        let memory = memory.clone();
        let embedding_blob = vec_to_blob(&memory.embedding);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO memories (id, user_id, content, embedding, source, importance, provenance, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        memory.id,
                        memory.user_id,
                        memory.content,
                        embedding_blob,
                        memory.source.as_str(),
                        memory.importance,
                        memory.provenance.as_str(),
                        memory.created_at,
                        memory.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Replace the content, embedding, and timestamp of an existing memory
    /// in place. Used when an analysis-sourced fact supersedes a near match.
    pub async fn replace_in_place(
        &self,
        id: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<(), CrevioError> {
        let id = id.to_string();
        let content = content.to_string();
        let embedding_blob = vec_to_blob(embedding);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE memories SET content = ?1, embedding = ?2,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?3",
                    rusqlite::params![content, embedding_blob, id],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Get a memory by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Memory>, CrevioError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, content, embedding, source, importance, provenance, created_at, updated_at
                     FROM memories WHERE id = ?1",
                )?;
                let result = stmt.query_row(rusqlite::params![id], |row| Ok(row_to_memory(row)));
                match result {
                    Ok(memory) => Ok(Some(memory)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(storage_err)
    }

    /// Get all of a user's memory embeddings (lightweight, no content).
    ///
    /// Returns (id, embedding) pairs for dedup comparison.
    pub async fn get_user_embeddings(
        &self,
        user_id: &str,
    ) -> Result<Vec<(String, Vec<f32>)>, CrevioError> {
        let user_id = user_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT id, embedding FROM memories WHERE user_id = ?1")?;
                let results = stmt
                    .query_map(rusqlite::params![user_id], |row| {
                        let id: String = row.get(0)?;
                        let blob: Vec<u8> = row.get(1)?;
                        Ok((id, blob_to_vec(&blob)))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(results)
            })
            .await
            .map_err(storage_err)
    }

    /// K-nearest memories for one user by cosine similarity.
    ///
    /// `query` must be L2-normalized, like stored embeddings, so the score is
    /// a plain dot product in [-1, 1]; negatives are clamped to 0.
    pub async fn search(
        &self,
        user_id: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredMemory>, CrevioError> {
        let user_id = user_id.to_string();
        let query = query.to_vec();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, content, embedding, source, importance, provenance, created_at, updated_at
                     FROM memories WHERE user_id = ?1",
                )?;
                let memories = stmt
                    .query_map(rusqlite::params![user_id], |row| Ok(row_to_memory(row)))?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut scored: Vec<ScoredMemory> = memories
                    .into_iter()
                    .filter(|m| m.embedding.len() == query.len())
                    .map(|m| {
                        let score = cosine_similarity(&query, &m.embedding).max(0.0);
                        ScoredMemory { memory: m, score }
                    })
                    .collect();
                scored.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                scored.truncate(top_k);
                Ok(scored)
            })
            .await
            .map_err(storage_err)
    }

    /// Number of memories stored for a user.
    pub async fn count_for_user(&self, user_id: &str) -> Result<i64, CrevioError> {
        let user_id = user_id.to_string();
        self.conn
            .call(move |conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM memories WHERE user_id = ?1",
                    rusqlite::params![user_id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
            .map_err(storage_err)
    }

    /// Most recent memory contents for a user, for the extraction sample.
    pub async fn recent_contents(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<String>, CrevioError> {
        let user_id = user_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT content FROM memories WHERE user_id = ?1
                     ORDER BY updated_at DESC LIMIT ?2",
                )?;
                let contents = stmt
                    .query_map(rusqlite::params![user_id, limit as i64], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(contents)
            })
            .await
            .map_err(storage_err)
    }
}

/// Convert a rusqlite Row to a Memory struct.
fn row_to_memory(row: &rusqlite::Row) -> Memory {
    let embedding_blob: Vec<u8> = row.get(3).unwrap_or_default();
    let source_str: String = row.get(4).unwrap_or_default();
    let provenance_str: String = row.get(6).unwrap_or_default();

    Memory {
        id: row.get(0).unwrap_or_default(),
        user_id: row.get(1).unwrap_or_default(),
        content: row.get(2).unwrap_or_default(),
        embedding: blob_to_vec(&embedding_blob),
        source: MemorySource::from_str_value(&source_str),
        importance: row.get(5).unwrap_or(0.5),
        provenance: Provenance::from_str_value(&provenance_str),
        created_at: row.get(7).unwrap_or_default(),
        updated_at: row.get(8).unwrap_or_default(),
    }
}
