// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optimistic-concurrency merge application.
//!
//! Concurrent turns for the same user can race on the profile. Each write
//! carries the `profile_version` it read; a version mismatch fails the
//! write and the merge is re-read and re-applied, bounded to a few
//! attempts.

use std::sync::Arc;

use crevio_core::error::CrevioError;
use crevio_core::traits::StorageAdapter;
use tracing::{debug, warn};

use crate::merge::{merge_profile, MergeReport, ProfileDelta};

const MAX_ATTEMPTS: u32 = 3;

/// Applies profile deltas through the storage adapter with bounded
/// read-merge-write retries.
pub struct ProfileMergeEngine {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
}

impl ProfileMergeEngine {
    pub fn new(storage: Arc<dyn StorageAdapter + Send + Sync>) -> Self {
        Self { storage }
    }

    /// Merge `delta` into the user's stored profile.
    ///
    /// Returns `None` when the delta produced no change (nothing written).
    pub async fn apply(
        &self,
        user_id: &str,
        delta: &ProfileDelta,
    ) -> Result<Option<MergeReport>, CrevioError> {
        if delta.is_empty() {
            return Ok(None);
        }

        for attempt in 1..=MAX_ATTEMPTS {
            let user = self
                .storage
                .get_user(user_id)
                .await?
                .ok_or_else(|| CrevioError::NotFound {
                    resource: "user",
                    id: user_id.to_string(),
                })?;

            let (merged, report) = merge_profile(&user, delta);
            if !report.changed() {
                debug!(user_id, "profile delta produced no changes");
                return Ok(None);
            }

            if self
                .storage
                .update_user_profile(&merged, user.profile_version)
                .await?
            {
                return Ok(Some(report));
            }

            warn!(
                user_id,
                attempt, "profile version conflict, re-reading and re-merging"
            );
        }

        Err(CrevioError::Internal(format!(
            "profile merge for user {user_id} lost the version race {MAX_ATTEMPTS} times"
        )))
    }
}
