// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile merge rules.
//!
//! Scalars overwrite only with non-empty values. List fields are
//! case-insensitive-deduplicated, capitalization-normalized, and capped;
//! items dropped by a cap are reported back as capped-field notices, and
//! existing items are never lost to capping. `profile_data` is merged
//! key-by-key so one enrichment's cached blob is never erased by an
//! unrelated update.

use crevio_core::types::UserRecord;
use serde::Serialize;
use serde_json::{Map, Value};

/// Maximum content niches per user.
pub const NICHE_CAP: usize = 10;
/// Maximum target audience descriptors.
pub const AUDIENCE_CAP: usize = 5;
/// Maximum goals.
pub const GOALS_CAP: usize = 5;
/// Maximum brand voice descriptors.
pub const VOICE_CAP: usize = 5;

/// Profile field changes proposed by extraction or enrichment.
#[derive(Debug, Clone, Default)]
pub struct ProfileDelta {
    pub display_name: Option<String>,
    pub content_niche: Vec<String>,
    pub primary_platforms: Vec<String>,
    pub target_audience: Vec<String>,
    pub goals: Vec<String>,
    pub brand_voice: Vec<String>,
    /// Nested profile data, merged key-by-key into the stored bag.
    pub profile_data: Option<Value>,
}

impl ProfileDelta {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.content_niche.is_empty()
            && self.primary_platforms.is_empty()
            && self.target_audience.is_empty()
            && self.goals.is_empty()
            && self.brand_voice.is_empty()
            && self.profile_data.is_none()
    }
}

/// Notice that a cap dropped proposed items from a list field.
#[derive(Debug, Clone, Serialize)]
pub struct CappedField {
    /// Human-readable field name, e.g. "Content Niche".
    pub field: String,
    /// The cap.
    pub limit: usize,
    /// Existing items plus deduplicated proposed items.
    pub attempted: usize,
}

/// What a merge changed, for the profile_updated stream frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    /// Snake-case names of fields that changed.
    pub updated_fields: Vec<String>,
    /// Caps that dropped proposed items.
    pub capped_fields: Vec<CappedField>,
    /// Fraction of key profile fields populated after the merge.
    pub completeness: f64,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        !self.updated_fields.is_empty()
    }
}

/// Applies a delta to a user record, returning the merged record and a
/// report of what changed. The input record is not modified.
pub fn merge_profile(user: &UserRecord, delta: &ProfileDelta) -> (UserRecord, MergeReport) {
    let mut merged = user.clone();
    let mut report = MergeReport::default();

    if let Some(name) = &delta.display_name {
        let trimmed = name.trim();
        if !trimmed.is_empty() && merged.display_name.as_deref() != Some(trimmed) {
            merged.display_name = Some(trimmed.to_string());
            report.updated_fields.push("display_name".into());
        }
    }

    merge_list_field(
        &mut merged.content_niche,
        &delta.content_niche,
        "content_niche",
        "Content Niche",
        Some(NICHE_CAP),
        &mut report,
    );
    merge_list_field(
        &mut merged.primary_platforms,
        &delta.primary_platforms,
        "primary_platforms",
        "Primary Platforms",
        None,
        &mut report,
    );

    // Capped descriptor lists live inside profile_data.
    merge_data_list(
        &mut merged.profile_data,
        &delta.target_audience,
        "target_audience",
        "Target Audience",
        AUDIENCE_CAP,
        &mut report,
    );
    merge_data_list(
        &mut merged.profile_data,
        &delta.goals,
        "goals",
        "Goals",
        GOALS_CAP,
        &mut report,
    );
    merge_data_list(
        &mut merged.profile_data,
        &delta.brand_voice,
        "brand_voice",
        "Brand Voice",
        VOICE_CAP,
        &mut report,
    );

    if let Some(incoming) = &delta.profile_data
        && deep_merge(&mut merged.profile_data, incoming)
    {
        report.updated_fields.push("profile_data".into());
    }

    report.completeness = completeness(&merged);
    (merged, report)
}

/// Fraction of key profile fields populated, in [0, 1].
pub fn completeness(user: &UserRecord) -> f64 {
    let data_list_populated = |key: &str| {
        user.profile_data
            .get(key)
            .and_then(Value::as_array)
            .is_some_and(|a| !a.is_empty())
    };

    let populated = [
        user.display_name.as_deref().is_some_and(|n| !n.is_empty()),
        !user.content_niche.is_empty(),
        !user.primary_platforms.is_empty(),
        data_list_populated("target_audience"),
        data_list_populated("goals"),
        data_list_populated("brand_voice"),
    ];

    let count = populated.iter().filter(|p| **p).count();
    count as f64 / populated.len() as f64
}

/// Normalize one list item: trimmed, single-spaced, each word capitalized.
fn normalize_item(item: &str) -> String {
    item.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Merge proposed items into a typed list field on the record.
fn merge_list_field(
    existing: &mut Vec<String>,
    proposed: &[String],
    field: &str,
    display: &str,
    cap: Option<usize>,
    report: &mut MergeReport,
) {
    let (added, capped) = admit_items(existing, proposed, cap, display);
    if added {
        report.updated_fields.push(field.to_string());
    }
    if let Some(notice) = capped {
        report.capped_fields.push(notice);
    }
}

/// Merge proposed items into a JSON array field inside `profile_data`.
fn merge_data_list(
    profile_data: &mut Value,
    proposed: &[String],
    key: &str,
    display: &str,
    cap: usize,
    report: &mut MergeReport,
) {
    if proposed.is_empty() {
        return;
    }

    if !profile_data.is_object() {
        *profile_data = Value::Object(Map::new());
    }

    let mut existing: Vec<String> = profile_data
        .get(key)
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let (added, capped) = admit_items(&mut existing, proposed, Some(cap), display);
    if added {
        report.updated_fields.push(key.to_string());
        profile_data
            .as_object_mut()
            .expect("profile_data coerced to object above")
            .insert(key.to_string(), Value::from(existing));
    }
    if let Some(notice) = capped {
        report.capped_fields.push(notice);
    }
}

/// Admit normalized, deduplicated items into `existing` up to `cap`.
///
/// Existing items always survive, even when already over the cap. Returns
/// whether anything was added and an optional capped-field notice.
fn admit_items(
    existing: &mut Vec<String>,
    proposed: &[String],
    cap: Option<usize>,
    display: &str,
) -> (bool, Option<CappedField>) {
    let mut seen: Vec<String> = existing.iter().map(|i| i.to_lowercase()).collect();
    let mut candidates: Vec<String> = Vec::new();

    for item in proposed {
        let normalized = normalize_item(item);
        if normalized.is_empty() {
            continue;
        }
        let lower = normalized.to_lowercase();
        if seen.contains(&lower) {
            continue;
        }
        seen.push(lower);
        candidates.push(normalized);
    }

    if candidates.is_empty() {
        return (false, None);
    }

    let notice = match cap {
        Some(limit) if existing.len() + candidates.len() > limit => {
            let attempted = existing.len() + candidates.len();
            candidates.truncate(limit.saturating_sub(existing.len()));
            Some(CappedField {
                field: display.to_string(),
                limit,
                attempted,
            })
        }
        _ => None,
    };

    let added = !candidates.is_empty();
    existing.extend(candidates);
    (added, notice)
}

/// Key-by-key merge of `incoming` into `target`.
///
/// Objects recurse so nested cached blobs are updated field-wise, never
/// wholesale-replaced. Nulls and empty strings are skipped. Returns whether
/// anything changed.
fn deep_merge(target: &mut Value, incoming: &Value) -> bool {
    let Some(incoming_map) = incoming.as_object() else {
        return false;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let target_map = target.as_object_mut().expect("coerced to object above");

    let mut changed = false;
    for (key, value) in incoming_map {
        match value {
            Value::Null => {}
            Value::String(s) if s.is_empty() => {}
            Value::Object(_) => {
                let entry = target_map.entry(key.clone()).or_insert(Value::Null);
                changed |= deep_merge(entry, value);
            }
            other => {
                if target_map.get(key) != Some(other) {
                    target_map.insert(key.clone(), other.clone());
                    changed = true;
                }
            }
        }
    }
    changed
}
