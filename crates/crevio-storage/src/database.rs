// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use crevio_core::CrevioError;
use tokio_rusqlite::Connection;

/// Schema applied on open. `CREATE TABLE IF NOT EXISTS` keeps reopen cheap.
/// Memory and enrichment-cache tables live in their owning crates and are
/// created against the same connection.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    title       TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id);

CREATE TABLE IF NOT EXISTS messages (
    id               TEXT PRIMARY KEY,
    conversation_id  TEXT NOT NULL REFERENCES conversations(id),
    role             TEXT NOT NULL,
    content          TEXT NOT NULL,
    metadata         TEXT,
    created_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at);

CREATE TABLE IF NOT EXISTS users (
    id                 TEXT PRIMARY KEY,
    display_name       TEXT,
    content_niche      TEXT NOT NULL DEFAULT '[]',
    primary_platforms  TEXT NOT NULL DEFAULT '[]',
    profile_data       TEXT NOT NULL DEFAULT '{}',
    profile_version    INTEGER NOT NULL DEFAULT 0,
    usage_count        INTEGER NOT NULL DEFAULT 0,
    usage_limit        INTEGER NOT NULL DEFAULT 500,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);
"#;

/// A WAL-mode SQLite database behind tokio-rusqlite's single writer thread.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, applying PRAGMAs and schema.
    pub async fn open(path: &str) -> Result<Self, CrevioError> {
        let conn = Connection::open(path)
            .await
            .map_err(tokio_rusqlite::Error::from)
            .map_err(map_tr_err)?;
        Self::setup(&conn, true).await?;
        Ok(Self { conn })
    }

    /// Open an in-memory database. Used by tests.
    pub async fn open_in_memory() -> Result<Self, CrevioError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(tokio_rusqlite::Error::from)
            .map_err(map_tr_err)?;
        // WAL is meaningless for :memory:, skip it.
        Self::setup(&conn, false).await?;
        Ok(Self { conn })
    }

    async fn setup(conn: &Connection, wal: bool) -> Result<(), CrevioError> {
        conn.call(move |conn| {
            if wal {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
    }

    /// The shared connection. Query modules and the memory store call
    /// through `connection().call()`.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Close the database, flushing pending writes.
    pub async fn close(&self) -> Result<(), CrevioError> {
        self.conn.clone().close().await.map_err(map_tr_err)
    }
}

/// Map a tokio-rusqlite error into the storage error variant.
pub fn map_tr_err(err: tokio_rusqlite::Error) -> CrevioError {
    CrevioError::Storage {
        source: Box::new(err),
    }
}

/// Current UTC timestamp in the millisecond RFC 3339 format rows use.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_applies_schema() {
        let db = Database::open_in_memory().await.unwrap();
        let count: i64 = db
            .connection()
            .call(|conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('conversations', 'messages', 'users')",
                    [],
                    |row| row.get(0),
                )?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(count)
            })
            .await
            .unwrap();
        assert_eq!(count, 3);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let path_str = path.to_str().unwrap();

        let db = Database::open(path_str).await.unwrap();
        db.close().await.unwrap();
        let db = Database::open(path_str).await.unwrap();
        db.close().await.unwrap();
    }

    #[test]
    fn now_timestamp_has_expected_shape() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2026-01-01T00:00:00.000Z".len());
    }
}
