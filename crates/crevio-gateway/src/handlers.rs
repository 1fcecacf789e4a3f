// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! POST message replies stream as newline-delimited JSON frames. Errors the
//! pipeline raises before the first byte map to precise statuses here; after
//! that, failures ride inside the stream as error frames and the response
//! status stays 200.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use crevio_core::error::CrevioError;
use crevio_core::types::Message;
use crevio_stream::turn_channel;
use crevio_turn::TurnRequest;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::server::GatewayState;

/// Request body for POST /v1/conversations/{id}/messages.
#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    /// Message content text.
    pub content: String,
    /// Client-generated key echoed back in the message-id frame, letting
    /// optimistic UIs reconcile their placeholder with the server id.
    #[serde(default)]
    pub correlation_key: Option<String>,
}

/// Response body for GET /v1/conversations/{id}/messages.
#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// POST /v1/conversations/{conversation_id}/messages
///
/// Runs one turn. The response body is an NDJSON frame stream; response
/// headers disable proxy buffering so frames reach the client as sent.
pub async fn post_message(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<PostMessageRequest>,
) -> Response {
    let user_id = match caller_identity(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let request = TurnRequest {
        conversation_id,
        user_id,
        content: body.content,
        correlation_key: body.correlation_key,
    };

    let prepared = match state.orchestrator.prepare(request).await {
        Ok(prepared) => prepared,
        Err(e) => return error_response(&e),
    };

    let (sink, rx) = turn_channel();
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        orchestrator.run(prepared, &sink).await;
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|line| (Ok::<_, std::convert::Infallible>(axum::body::Bytes::from(line)), rx))
    });

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// GET /v1/conversations/{conversation_id}/messages
pub async fn list_messages(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let user_id = match caller_identity(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let conversation = match state.storage.get_conversation(&conversation_id).await {
        Ok(Some(conversation)) => conversation,
        Ok(None) => {
            return error_response(&CrevioError::NotFound {
                resource: "conversation",
                id: conversation_id,
            })
        }
        Err(e) => return error_response(&e),
    };
    if conversation.user_id != user_id {
        return error_response(&CrevioError::Ownership(
            "conversation belongs to another user".into(),
        ));
    }

    match state.storage.get_messages(&conversation_id, None).await {
        Ok(messages) => (StatusCode::OK, Json(MessageListResponse { messages })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// DELETE /v1/conversations/{conversation_id}/messages/{message_id}
pub async fn delete_message(
    State(state): State<GatewayState>,
    Path((conversation_id, message_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let user_id = match caller_identity(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let message = match state.storage.get_message(&message_id).await {
        Ok(Some(message)) if message.conversation_id == conversation_id => message,
        Ok(_) => {
            return error_response(&CrevioError::NotFound {
                resource: "message",
                id: message_id,
            })
        }
        Err(e) => return error_response(&e),
    };

    // Ownership is on the conversation, not the message row.
    match state.storage.get_conversation(&message.conversation_id).await {
        Ok(Some(conversation)) if conversation.user_id == user_id => {}
        Ok(_) => {
            return error_response(&CrevioError::Ownership(
                "message belongs to another user".into(),
            ))
        }
        Err(e) => return error_response(&e),
    }

    match state.storage.delete_message(&message_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Caller identity comes from the X-User-Id header.
fn caller_identity(headers: &HeaderMap) -> Result<String, Response> {
    match headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        Some(id) => Ok(id.to_string()),
        None => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing X-User-Id header" })),
        )
            .into_response()),
    }
}

/// Maps a pre-stream pipeline error to a status and JSON body.
pub fn error_response(error: &CrevioError) -> Response {
    let (status, body) = match error {
        CrevioError::Validation(_) => (StatusCode::BAD_REQUEST, json!({ "error": error.to_string() })),
        CrevioError::Ownership(_) => (StatusCode::FORBIDDEN, json!({ "error": error.to_string() })),
        CrevioError::NotFound { .. } => (StatusCode::NOT_FOUND, json!({ "error": error.to_string() })),
        CrevioError::UsageLimit { used, limit } => (
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": error.to_string(), "used": used, "limit": limit }),
        ),
        CrevioError::Timeout { .. } => (
            StatusCode::GATEWAY_TIMEOUT,
            json!({ "error": error.to_string() }),
        ),
        CrevioError::Provider { .. } => (
            StatusCode::BAD_GATEWAY,
            json!({ "error": error.to_string() }),
        ),
        CrevioError::Config(_) | CrevioError::Storage { .. } | CrevioError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": error.to_string() }),
        ),
    };
    (status, Json(body)).into_response()
}
