// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for Anthropic Messages API streaming responses.
//!
//! Converts a reqwest response byte stream into typed [`StreamEvent`] variants
//! using the `eventsource-stream` crate for SSE protocol compliance.

use std::pin::Pin;

use crevio_core::CrevioError;
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};

use crate::types::{SseContentBlockDelta, SseContentBlockStop, SseError, SseMessageDelta, SseMessageStart};

/// Typed SSE events from the Anthropic streaming protocol.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Initial message metadata (id, model, usage).
    MessageStart(SseMessageStart),
    /// Incremental text update to a content block.
    ContentBlockDelta(SseContentBlockDelta),
    /// A content block has finished.
    ContentBlockStop(SseContentBlockStop),
    /// Message-level delta (stop_reason, usage update).
    MessageDelta(SseMessageDelta),
    /// The message is complete.
    MessageStop,
    /// Keep-alive ping.
    Ping,
    /// API error during streaming.
    Error(SseError),
}

/// Parses a reqwest streaming response into a stream of typed [`StreamEvent`]s.
///
/// The response body is parsed as Server-Sent Events. Each SSE event is
/// deserialized into the appropriate [`StreamEvent`] variant based on the
/// event name. Unknown event types are silently skipped per Anthropic's
/// API versioning policy.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, CrevioError>> + Send>> {
    let byte_stream = response.bytes_stream();
    let event_stream = byte_stream.eventsource();

    let mapped = event_stream.filter_map(|result| async move {
        match result {
            Ok(event) => {
                let parsed = match event.event.as_str() {
                    "message_start" => serde_json::from_str::<SseMessageStart>(&event.data)
                        .map(StreamEvent::MessageStart)
                        .map_err(|e| CrevioError::Provider {
                            message: format!("failed to parse message_start: {e}"),
                            source: Some(Box::new(e)),
                        }),
                    // Text-only requests: nothing actionable in block starts.
                    "content_block_start" => return None,
                    "content_block_delta" => {
                        serde_json::from_str::<SseContentBlockDelta>(&event.data)
                            .map(StreamEvent::ContentBlockDelta)
                            .map_err(|e| CrevioError::Provider {
                                message: format!("failed to parse content_block_delta: {e}"),
                                source: Some(Box::new(e)),
                            })
                    }
                    "content_block_stop" => {
                        serde_json::from_str::<SseContentBlockStop>(&event.data)
                            .map(StreamEvent::ContentBlockStop)
                            .map_err(|e| CrevioError::Provider {
                                message: format!("failed to parse content_block_stop: {e}"),
                                source: Some(Box::new(e)),
                            })
                    }
                    "message_delta" => serde_json::from_str::<SseMessageDelta>(&event.data)
                        .map(StreamEvent::MessageDelta)
                        .map_err(|e| CrevioError::Provider {
                            message: format!("failed to parse message_delta: {e}"),
                            source: Some(Box::new(e)),
                        }),
                    "message_stop" => Ok(StreamEvent::MessageStop),
                    "ping" => Ok(StreamEvent::Ping),
                    "error" => serde_json::from_str::<SseError>(&event.data)
                        .map(StreamEvent::Error)
                        .map_err(|e| CrevioError::Provider {
                            message: format!("failed to parse error event: {e}"),
                            source: Some(Box::new(e)),
                        }),
                    // Unknown event types are silently ignored per Anthropic versioning policy.
                    _ => return None,
                };
                Some(parsed)
            }
            Err(e) => Some(Err(CrevioError::Provider {
                message: format!("SSE stream error: {e}"),
                source: None,
            })),
        }
    });

    Box::pin(mapped)
}
