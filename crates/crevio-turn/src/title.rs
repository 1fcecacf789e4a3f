// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous conversation title generation.
//!
//! Runs fire-and-forget after the first exchange so it never delays the
//! visible response, and only while the conversation is still untitled.
//! Every failure is logged and swallowed.

use std::sync::Arc;

use crevio_core::traits::{ProviderAdapter, StorageAdapter};
use crevio_core::types::{ProviderMessage, ProviderRequest};
use tracing::{debug, warn};

const TITLE_PROMPT: &str = "Write a title for this conversation in at most six words. \
Output the title only, no quotes, no punctuation at the end.";

/// Generates and stores a title for an untitled conversation.
pub async fn generate_title(
    provider: Arc<dyn ProviderAdapter + Send + Sync>,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    model: String,
    conversation_id: String,
    user_text: String,
    assistant_text: String,
) {
    // Re-check: a concurrent turn may have titled it already.
    match storage.get_conversation(&conversation_id).await {
        Ok(Some(conversation)) if conversation.title.is_none() => {}
        Ok(_) => return,
        Err(e) => {
            warn!(conversation_id, "title generation read failed: {e}");
            return;
        }
    }

    let prompt = format!(
        "{TITLE_PROMPT}\n\nUser: {user_text}\nAssistant: {assistant_text}"
    );
    let request = ProviderRequest {
        model,
        system_prompt: None,
        messages: vec![ProviderMessage::user(prompt)],
        max_tokens: 32,
        stream: false,
    };

    let title = match provider.complete(request).await {
        Ok(response) => clean_title(&response.content),
        Err(e) => {
            warn!(conversation_id, "title generation call failed: {e}");
            return;
        }
    };

    if title.is_empty() {
        return;
    }

    match storage
        .update_conversation_title(&conversation_id, &title)
        .await
    {
        Ok(()) => debug!(conversation_id, title, "conversation titled"),
        Err(e) => warn!(conversation_id, "title write failed: {e}"),
    }
}

/// First line, surrounding quotes stripped, trimmed.
fn clean_title(raw: &str) -> String {
    raw.lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}
