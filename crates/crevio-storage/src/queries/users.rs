// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User CRUD operations, including the optimistic profile write.

use crevio_core::CrevioError;
use crevio_core::types::UserRecord;
use rusqlite::params;

use crate::database::{map_tr_err, Database};

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let content_niche: String = row.get(2)?;
    let primary_platforms: String = row.get(3)?;
    let profile_data: String = row.get(4)?;
    Ok(UserRecord {
        id: row.get(0)?,
        display_name: row.get(1)?,
        content_niche: serde_json::from_str(&content_niche).unwrap_or_default(),
        primary_platforms: serde_json::from_str(&primary_platforms).unwrap_or_default(),
        profile_data: serde_json::from_str(&profile_data)
            .unwrap_or_else(|_| serde_json::json!({})),
        profile_version: row.get(5)?,
        usage_count: row.get(6)?,
        usage_limit: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const USER_COLUMNS: &str = "id, display_name, content_niche, primary_platforms, profile_data,
     profile_version, usage_count, usage_limit, created_at, updated_at";

/// Get a user by ID.
pub async fn get_user(db: &Database, id: &str) -> Result<Option<UserRecord>, CrevioError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
            let result = stmt.query_row(params![id], row_to_user);
            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a user, or update everything except the usage counters if the row
/// exists. First contact goes through here.
pub async fn upsert_user(db: &Database, user: &UserRecord) -> Result<(), CrevioError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, display_name, content_niche, primary_platforms,
                                    profile_data, profile_version, usage_count, usage_limit,
                                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                     display_name = excluded.display_name,
                     content_niche = excluded.content_niche,
                     primary_platforms = excluded.primary_platforms,
                     profile_data = excluded.profile_data,
                     updated_at = excluded.updated_at",
                params![
                    user.id,
                    user.display_name,
                    serde_json::to_string(&user.content_niche).unwrap_or_else(|_| "[]".into()),
                    serde_json::to_string(&user.primary_platforms)
                        .unwrap_or_else(|_| "[]".into()),
                    user.profile_data.to_string(),
                    user.profile_version,
                    user.usage_count,
                    user.usage_limit,
                    user.created_at,
                    user.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Write the profile fields of `user` if and only if the stored
/// `profile_version` still equals `expected_version`.
///
/// On success the version is incremented atomically with the write. Returns
/// `false` when another writer got there first; the caller re-reads and
/// re-merges.
pub async fn update_user_profile(
    db: &Database,
    user: &UserRecord,
    expected_version: i64,
) -> Result<bool, CrevioError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE users SET
                     display_name = ?1,
                     content_niche = ?2,
                     primary_platforms = ?3,
                     profile_data = ?4,
                     profile_version = profile_version + 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?5 AND profile_version = ?6",
                params![
                    user.display_name,
                    serde_json::to_string(&user.content_niche).unwrap_or_else(|_| "[]".into()),
                    serde_json::to_string(&user.primary_platforms)
                        .unwrap_or_else(|_| "[]".into()),
                    user.profile_data.to_string(),
                    user.id,
                    expected_version,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Increment the user's usage counter by one.
pub async fn increment_usage(db: &Database, user_id: &str) -> Result<(), CrevioError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET usage_count = usage_count + 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![user_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::now_timestamp;

    fn make_user(id: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            display_name: Some("Priya".to_string()),
            content_niche: vec!["fitness".to_string()],
            primary_platforms: vec!["instagram".to_string()],
            profile_data: serde_json::json!({}),
            profile_version: 0,
            usage_count: 0,
            usage_limit: 500,
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        }
    }

    #[tokio::test]
    async fn upsert_and_get_user_roundtrips() {
        let db = Database::open_in_memory().await.unwrap();
        let user = make_user("user-1");
        upsert_user(&db, &user).await.unwrap();

        let retrieved = get_user(&db, "user-1").await.unwrap().unwrap();
        assert_eq!(retrieved.display_name.as_deref(), Some("Priya"));
        assert_eq!(retrieved.content_niche, vec!["fitness"]);
        assert_eq!(retrieved.profile_version, 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn profile_update_with_current_version_succeeds() {
        let db = Database::open_in_memory().await.unwrap();
        let mut user = make_user("user-v");
        upsert_user(&db, &user).await.unwrap();

        user.content_niche.push("nutrition".to_string());
        let ok = update_user_profile(&db, &user, 0).await.unwrap();
        assert!(ok);

        let retrieved = get_user(&db, "user-v").await.unwrap().unwrap();
        assert_eq!(retrieved.profile_version, 1);
        assert_eq!(retrieved.content_niche.len(), 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn profile_update_with_stale_version_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let user = make_user("user-stale");
        upsert_user(&db, &user).await.unwrap();

        // First writer bumps the version to 1.
        assert!(update_user_profile(&db, &user, 0).await.unwrap());
        // Second writer still holds version 0 and must be refused.
        assert!(!update_user_profile(&db, &user, 0).await.unwrap());

        let retrieved = get_user(&db, "user-stale").await.unwrap().unwrap();
        assert_eq!(retrieved.profile_version, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn increment_usage_counts_up() {
        let db = Database::open_in_memory().await.unwrap();
        let user = make_user("user-u");
        upsert_user(&db, &user).await.unwrap();

        increment_usage(&db, "user-u").await.unwrap();
        increment_usage(&db, "user-u").await.unwrap();

        let retrieved = get_user(&db, "user-u").await.unwrap().unwrap();
        assert_eq!(retrieved.usage_count, 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_preserves_usage_counters_on_conflict() {
        let db = Database::open_in_memory().await.unwrap();
        let user = make_user("user-c");
        upsert_user(&db, &user).await.unwrap();
        increment_usage(&db, "user-c").await.unwrap();

        // Re-upsert with a zero counter; the stored counter must survive.
        upsert_user(&db, &user).await.unwrap();
        let retrieved = get_user(&db, "user-c").await.unwrap().unwrap();
        assert_eq!(retrieved.usage_count, 1);
        db.close().await.unwrap();
    }
}
