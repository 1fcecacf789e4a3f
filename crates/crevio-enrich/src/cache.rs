// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache freshness over the profile's stored analysis blobs.
//!
//! Analysis results are cached inside the user's `profile_data` (written
//! back through the profile merge, so an unrelated update never erases
//! them). Each kind has its own validity window and its own blob shape:
//!
//! - `instagram_profile`: one blob per user, `{username, cached_at, ...}`
//! - `hashtag_searches`: map of tag to `{cached_at, ...}`
//! - `blog_profile`: one blob per user, `{urls, cached_at, ...}`
//!
//! A cached blob is reused when its targets cover the requested ones and
//! `cached_at` is within the kind's window.

use chrono::{DateTime, Duration, Utc};
use crevio_config::EnrichmentConfig;
use crevio_core::types::{EnrichmentKind, EnrichmentTarget};
use serde_json::{json, Map, Value};

const INSTAGRAM_KEY: &str = "instagram_profile";
const HASHTAG_KEY: &str = "hashtag_searches";
const BLOG_KEY: &str = "blog_profile";

/// Validity window for one kind.
pub fn max_age(kind: EnrichmentKind, config: &EnrichmentConfig) -> Duration {
    match kind {
        EnrichmentKind::SocialProfile => Duration::hours(config.profile_cache_hours),
        EnrichmentKind::Hashtag => Duration::hours(config.hashtag_cache_hours),
        EnrichmentKind::Blog => Duration::days(config.blog_cache_days),
    }
}

/// Returns the cached analysis for `target` if it is still fresh.
pub fn cached_analysis(
    kind: EnrichmentKind,
    target: &EnrichmentTarget,
    profile_data: &Value,
    config: &EnrichmentConfig,
    now: DateTime<Utc>,
) -> Option<Value> {
    let window = max_age(kind, config);

    match (kind, target) {
        (EnrichmentKind::SocialProfile, EnrichmentTarget::Username(username)) => {
            let blob = profile_data.get(INSTAGRAM_KEY)?;
            let stored = blob.get("username")?.as_str()?;
            if stored.to_lowercase() != username.to_lowercase() {
                return None;
            }
            is_fresh(blob, window, now).then(|| blob.clone())
        }
        (EnrichmentKind::Hashtag, EnrichmentTarget::Hashtag(tag)) => {
            let searches = profile_data.get(HASHTAG_KEY)?.as_object()?;
            let blob = searches
                .iter()
                .find(|(k, _)| k.to_lowercase() == tag.to_lowercase())
                .map(|(_, v)| v)?;
            is_fresh(blob, window, now).then(|| blob.clone())
        }
        (EnrichmentKind::Blog, EnrichmentTarget::Urls(urls)) => {
            let blob = profile_data.get(BLOG_KEY)?;
            let analyzed: Vec<String> = blob
                .get("urls")?
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_lowercase)
                .collect();
            let covered = urls
                .iter()
                .all(|u| analyzed.contains(&u.to_lowercase()));
            if !covered {
                return None;
            }
            is_fresh(blob, window, now).then(|| blob.clone())
        }
        _ => None,
    }
}

/// Builds the `profile_data` delta that stores a fresh analysis.
///
/// Merged key-by-key into the profile, so writing one kind's blob never
/// touches the others.
pub fn blob_delta(
    kind: EnrichmentKind,
    target: &EnrichmentTarget,
    analysis: &Value,
    now: DateTime<Utc>,
) -> Value {
    let cached_at = now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    let mut blob = match analysis.as_object() {
        Some(map) => map.clone(),
        None => Map::from_iter([("result".to_string(), analysis.clone())]),
    };
    blob.insert("cached_at".to_string(), Value::String(cached_at));

    match (kind, target) {
        (EnrichmentKind::SocialProfile, EnrichmentTarget::Username(username)) => {
            blob.insert(
                "username".to_string(),
                Value::String(username.to_lowercase()),
            );
            json!({ (INSTAGRAM_KEY): Value::Object(blob) })
        }
        (EnrichmentKind::Hashtag, EnrichmentTarget::Hashtag(tag)) => {
            json!({ (HASHTAG_KEY): { (tag.to_lowercase()): Value::Object(blob) } })
        }
        (EnrichmentKind::Blog, EnrichmentTarget::Urls(urls)) => {
            blob.insert(
                "urls".to_string(),
                Value::from(
                    urls.iter()
                        .map(|u| u.to_lowercase())
                        .collect::<Vec<String>>(),
                ),
            );
            json!({ (BLOG_KEY): Value::Object(blob) })
        }
        _ => Value::Object(Map::new()),
    }
}

fn is_fresh(blob: &Value, window: Duration, now: DateTime<Utc>) -> bool {
    let Some(cached_at) = blob.get("cached_at").and_then(Value::as_str) else {
        return false;
    };
    let Ok(parsed) = DateTime::parse_from_rfc3339(cached_at) else {
        return false;
    };
    now.signed_duration_since(parsed.with_timezone(&Utc)) <= window
}
