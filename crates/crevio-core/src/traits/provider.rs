// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for chat completion integrations.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::CrevioError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderResponse, ProviderStreamChunk};

/// Adapter for chat completion provider integrations.
///
/// Provider adapters handle communication with language model APIs,
/// supporting both single-shot completion (used for classification and
/// extraction calls that expect structured JSON) and streaming responses
/// (used for the visible reply).
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, CrevioError>;

    /// Sends a completion request and returns a stream of response chunks.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<
        Pin<Box<dyn Stream<Item = Result<ProviderStreamChunk, CrevioError>> + Send>>,
        CrevioError,
    >;
}
