// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state. The message-posting route
//! returns a framed NDJSON stream; everything else is plain JSON.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use crevio_config::GatewayConfig;
use crevio_core::error::CrevioError;
use crevio_core::traits::StorageAdapter;
use crevio_turn::TurnOrchestrator;
use tower_http::cors::CorsLayer;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The turn pipeline behind POST messages.
    pub orchestrator: Arc<TurnOrchestrator>,
    /// Direct storage access for reads and deletes.
    pub storage: Arc<dyn StorageAdapter + Send + Sync>,
    /// Process start time for uptime reporting.
    pub start_time: std::time::Instant,
}

/// Builds the gateway router over the given state.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route(
            "/v1/conversations/{conversation_id}/messages",
            post(handlers::post_message).get(handlers::list_messages),
        )
        .route(
            "/v1/conversations/{conversation_id}/messages/{message_id}",
            delete(handlers::delete_message),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds the configured address and serves until shutdown.
pub async fn start_server(config: &GatewayConfig, state: GatewayState) -> Result<(), CrevioError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CrevioError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| CrevioError::Internal(format!("gateway server error: {e}")))
}
