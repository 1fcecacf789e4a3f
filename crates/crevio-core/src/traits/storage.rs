// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends.

use async_trait::async_trait;

use crate::error::CrevioError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Conversation, Message, UserRecord};

/// Adapter for storage and persistence backends.
///
/// Storage adapters manage the lifecycle of database connections and expose
/// the conversation, message, and user operations the turn pipeline needs.
/// Memory rows share the same database but are managed by the memory store,
/// which operates on the same underlying connection.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (schema, connection).
    async fn initialize(&self) -> Result<(), CrevioError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), CrevioError>;

    // --- Conversation operations ---

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), CrevioError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, CrevioError>;

    /// Updates the title only. Used by asynchronous title generation.
    async fn update_conversation_title(&self, id: &str, title: &str) -> Result<(), CrevioError>;

    // --- Message operations ---

    async fn insert_message(&self, message: &Message) -> Result<(), CrevioError>;

    async fn get_message(&self, id: &str) -> Result<Option<Message>, CrevioError>;

    /// Returns messages for a conversation in creation order, optionally
    /// limited to the most recent `limit`.
    async fn get_messages(
        &self,
        conversation_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, CrevioError>;

    async fn delete_message(&self, id: &str) -> Result<(), CrevioError>;

    // --- User operations ---

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, CrevioError>;

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), CrevioError>;

    /// Writes the profile fields of `user` if and only if the stored
    /// `profile_version` still equals `expected_version`, incrementing the
    /// version on success. Returns `false` on a version conflict so the
    /// caller can re-read and re-merge.
    async fn update_user_profile(
        &self,
        user: &UserRecord,
        expected_version: i64,
    ) -> Result<bool, CrevioError>;

    /// Increments the user's usage counter by one.
    async fn increment_usage(&self, user_id: &str) -> Result<(), CrevioError>;
}
