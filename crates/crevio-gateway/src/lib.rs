// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Crevio assistant pipeline.
//!
//! A small axum surface: post a message and read back an NDJSON frame
//! stream, list a conversation's messages, delete a message, health. Caller
//! identity rides in the `X-User-Id` header; every conversation-scoped route
//! checks ownership against it.

pub mod handlers;
pub mod server;

pub use handlers::error_response;
pub use server::{router, start_server, GatewayState};
