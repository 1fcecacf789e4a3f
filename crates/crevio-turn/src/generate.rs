// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response generation: system prompt assembly and token streaming.
//!
//! The system prompt is a function of workflow phase, profile, retrieved
//! memories, and whatever enrichment or search context this turn produced.
//! Tokens are forwarded to the sink as they arrive; nothing is batched.

use crevio_core::error::CrevioError;
use crevio_core::traits::ProviderAdapter;
use crevio_core::types::{ProviderRequest, StreamEventType};
use crevio_intent::WorkflowPhase;
use crevio_stream::{Frame, TurnSink};
use futures::StreamExt;
use tracing::warn;

use crate::context::TurnContext;

/// How the visible reply stream ended.
#[derive(Debug)]
pub struct StreamResult {
    /// Accumulated assistant text, possibly truncated.
    pub text: String,
    /// True when the client disconnected mid-stream.
    pub disconnected: bool,
    /// Provider error surfaced mid-stream, if any.
    pub error: Option<String>,
}

/// Builds the system prompt for this turn.
pub fn build_system_prompt(preamble: &str, ctx: &TurnContext) -> String {
    let mut prompt = String::from(preamble);
    prompt.push_str("\n\n");

    match ctx.decision.workflow_phase.phase {
        WorkflowPhase::Discovery => {
            prompt.push_str(
                "The creator's profile is still sparse. Stay in discovery: ask about \
                 their niche, audience, platforms, and goals. Do not produce finished \
                 content yet; gather the information that would make it good.\n",
            );
        }
        WorkflowPhase::Enrichment => {
            prompt.push_str(
                "You are gathering external context about the creator's presence. \
                 Weave any analysis results below into your guidance.\n",
            );
        }
        WorkflowPhase::Generation => {
            prompt.push_str(
                "The profile below is established. Generate concrete, ready-to-use \
                 content and recommendations tailored to it.\n",
            );
        }
    }

    prompt.push_str("\nCreator profile:\n");
    let profile = serde_json::json!({
        "display_name": ctx.user.display_name,
        "content_niche": ctx.user.content_niche,
        "primary_platforms": ctx.user.primary_platforms,
        "profile_data": ctx.user.profile_data,
    });
    prompt.push_str(&profile.to_string());
    prompt.push('\n');

    let memories = ctx.memory_contents();
    if !memories.is_empty() {
        prompt.push_str("\nWhat you remember about this creator:\n");
        for memory in &memories {
            prompt.push_str(&format!("- {memory}\n"));
        }
    }

    if let Some(enrichment) = ctx.enrichment.context_text() {
        prompt.push_str("\nFresh analysis results:\n");
        prompt.push_str(&enrichment);
        prompt.push('\n');
    }

    if let Some(search) = &ctx.search {
        prompt.push_str("\nWeb search context:\n");
        prompt.push_str(&search.context_text);
        prompt.push('\n');
    }

    prompt
}

/// Streams the reply, forwarding each text delta to the sink.
///
/// A provider error mid-stream becomes an inline error frame; a client
/// disconnect abandons the provider stream. Both leave the accumulated
/// (possibly truncated) text available for persistence.
pub async fn stream_reply(
    provider: &dyn ProviderAdapter,
    request: ProviderRequest,
    sink: &TurnSink,
) -> Result<StreamResult, CrevioError> {
    let mut stream = provider.stream(request).await?;

    let mut text = String::new();
    let mut disconnected = false;
    let mut error = None;

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => match chunk.event_type {
                StreamEventType::ContentBlockDelta => {
                    if let Some(delta) = chunk.text {
                        text.push_str(&delta);
                        if !sink.send(Frame::text(delta)).await {
                            disconnected = true;
                            break;
                        }
                    }
                }
                StreamEventType::Error => {
                    let message = chunk
                        .error
                        .unwrap_or_else(|| "provider stream error".to_string());
                    warn!("provider error mid-stream: {message}");
                    sink.send(Frame::error(message.clone())).await;
                    error = Some(message);
                    break;
                }
                _ => {}
            },
            Err(e) => {
                warn!("stream transport error: {e}");
                sink.send(Frame::error(e.to_string())).await;
                error = Some(e.to_string());
                break;
            }
        }
    }

    Ok(StreamResult {
        text,
        disconnected,
        error,
    })
}
