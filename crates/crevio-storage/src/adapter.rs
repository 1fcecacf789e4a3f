// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crevio_config::model::StorageConfig;
use crevio_core::types::{Conversation, Message, UserRecord};
use crevio_core::{AdapterType, CrevioError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`]
    /// is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    pub fn db(&self) -> Result<&Database, CrevioError> {
        self.db.get().ok_or_else(|| CrevioError::Internal(
            "storage not initialized -- call initialize() first".into(),
        ))
    }

    /// Wrap an already-open database. Used by tests with in-memory databases.
    pub fn from_database(db: Database) -> Self {
        let cell = OnceCell::new();
        // A fresh cell cannot already be set.
        let _ = cell.set(db);
        Self {
            config: StorageConfig::default(),
            db: cell,
        }
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CrevioError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CrevioError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                    Ok(())
                })
                .await
                .map_err(crate::database::map_tr_err)?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), CrevioError> {
        let path = self.config.database_path.clone();
        let db = Database::open(&path).await?;
        self.db.set(db).map_err(|_| {
            CrevioError::Internal("storage already initialized".into())
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), CrevioError> {
        let db = self.db()?;
        // Checkpoint WAL before close.
        db.connection()
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Conversation operations ---

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), CrevioError> {
        queries::conversations::create_conversation(self.db()?, conversation).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, CrevioError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn update_conversation_title(&self, id: &str, title: &str) -> Result<(), CrevioError> {
        queries::conversations::update_conversation_title(self.db()?, id, title).await
    }

    // --- Message operations ---

    async fn insert_message(&self, message: &Message) -> Result<(), CrevioError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, CrevioError> {
        queries::messages::get_message(self.db()?, id).await
    }

    async fn get_messages(
        &self,
        conversation_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, CrevioError> {
        queries::messages::get_messages_for_conversation(self.db()?, conversation_id, limit).await
    }

    async fn delete_message(&self, id: &str) -> Result<(), CrevioError> {
        queries::messages::delete_message(self.db()?, id).await
    }

    // --- User operations ---

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, CrevioError> {
        queries::users::get_user(self.db()?, id).await
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), CrevioError> {
        queries::users::upsert_user(self.db()?, user).await
    }

    async fn update_user_profile(
        &self,
        user: &UserRecord,
        expected_version: i64,
    ) -> Result<bool, CrevioError> {
        queries::users::update_user_profile(self.db()?, user, expected_version).await
    }

    async fn increment_usage(&self, user_id: &str) -> Result<(), CrevioError> {
        queries::users::increment_usage(self.db()?, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::now_timestamp;

    async fn setup_adapter() -> SqliteStorage {
        let db = Database::open_in_memory().await.unwrap();
        SqliteStorage::from_database(db)
    }

    #[tokio::test]
    async fn adapter_identity() {
        let adapter = setup_adapter().await;
        assert_eq!(adapter.name(), "sqlite");
        assert_eq!(adapter.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn health_check_reports_healthy() {
        let adapter = setup_adapter().await;
        let status = adapter.health_check().await.unwrap();
        assert_eq!(status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn uninitialized_adapter_errors() {
        let adapter = SqliteStorage::new(StorageConfig::default());
        let err = adapter.get_user("u1").await.unwrap_err();
        assert!(matches!(err, CrevioError::Internal(_)));
    }

    #[tokio::test]
    async fn conversation_flow_through_adapter() {
        let adapter = setup_adapter().await;
        let conversation = Conversation {
            id: "c1".to_string(),
            user_id: "u1".to_string(),
            title: None,
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        };
        adapter.create_conversation(&conversation).await.unwrap();
        adapter
            .update_conversation_title("c1", "Posting cadence")
            .await
            .unwrap();
        let got = adapter.get_conversation("c1").await.unwrap().unwrap();
        assert_eq!(got.title.as_deref(), Some("Posting cadence"));
    }
}
