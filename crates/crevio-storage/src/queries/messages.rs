// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations.

use crevio_core::CrevioError;
use crevio_core::types::Message;
use rusqlite::params;

use crate::database::{map_tr_err, Database};

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let metadata: Option<String> = row.get(4)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        created_at: row.get(5)?,
    })
}

/// Insert a new message.
pub async fn insert_message(db: &Database, msg: &Message) -> Result<(), CrevioError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            let metadata = msg.metadata.as_ref().map(|m| m.to_string());
            conn.execute(
                "INSERT INTO messages (id, conversation_id, role, content, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.role,
                    msg.content,
                    metadata,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a single message by ID.
pub async fn get_message(db: &Database, id: &str) -> Result<Option<Message>, CrevioError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, metadata, created_at
                 FROM messages WHERE id = ?1",
            )?;
            let result = stmt.query_row(params![id], row_to_message);
            match result {
                Ok(msg) => Ok(Some(msg)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Get messages for a conversation in chronological order.
///
/// With a `limit`, the most recent `limit` messages are returned, still
/// oldest-first, so callers can hand the slice to the provider directly.
pub async fn get_messages_for_conversation(
    db: &Database,
    conversation_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Message>, CrevioError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut messages = Vec::new();
            match limit {
                Some(lim) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, conversation_id, role, content, metadata, created_at
                         FROM (SELECT *, rowid AS rid FROM messages
                               WHERE conversation_id = ?1
                               ORDER BY created_at DESC, rid DESC LIMIT ?2)
                         ORDER BY created_at ASC, rid ASC",
                    )?;
                    let rows = stmt.query_map(params![conversation_id, lim], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, conversation_id, role, content, metadata, created_at
                         FROM messages WHERE conversation_id = ?1
                         ORDER BY created_at ASC, rowid ASC",
                    )?;
                    let rows = stmt.query_map(params![conversation_id], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a message by ID. Used to unwind the user message when a turn fails
/// before any reply text was produced.
pub async fn delete_message(db: &Database, id: &str) -> Result<(), CrevioError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
