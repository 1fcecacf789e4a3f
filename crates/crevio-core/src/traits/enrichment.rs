// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enrichment adapter trait for external analysis collaborators.

use async_trait::async_trait;

use crate::error::CrevioError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EnrichmentKind, EnrichmentOutcome, EnrichmentTarget};

/// Adapter for external enrichment analyzers (social profile, hashtag, blog).
///
/// Enrichment adapters never let failures escape their boundary: `analyze`
/// returns [`EnrichmentOutcome::Failure`] rather than `Err` for analyzer
/// errors, because a failed enrichment must not abort the turn. `Err` is
/// reserved for programming errors (e.g. a target of the wrong kind).
#[async_trait]
pub trait EnrichmentAdapter: PluginAdapter {
    /// The kind of analysis this adapter performs.
    fn kind(&self) -> EnrichmentKind;

    /// Runs the analysis for the given target on behalf of `user_id`.
    async fn analyze(
        &self,
        target: &EnrichmentTarget,
        user_id: &str,
    ) -> Result<EnrichmentOutcome, CrevioError>;
}
