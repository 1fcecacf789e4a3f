// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web search adapter trait.

use async_trait::async_trait;

use crate::error::CrevioError;
use crate::traits::adapter::PluginAdapter;
use crate::types::WebSearchResult;

/// Adapter for web search used to ground responses in current information.
#[async_trait]
pub trait WebSearchAdapter: PluginAdapter {
    /// Runs a web search and returns synthesized context plus citations.
    ///
    /// `recency` is an optional freshness hint (e.g. "week"); `domains`
    /// optionally restricts results to the given sites.
    async fn search(
        &self,
        query: &str,
        recency: Option<&str>,
        domains: &[String],
    ) -> Result<WebSearchResult, CrevioError>;
}
