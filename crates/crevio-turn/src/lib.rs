// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn orchestration for the Crevio assistant pipeline.
//!
//! One inbound user message drives a fixed stage sequence: load history and
//! memories, classify intent, run gated enrichment and web search, stream
//! the reply as NDJSON frames, then persist and post-process (profile merge,
//! memory extraction, async titling). Pre-stream failures reject the request
//! with a typed error; everything after the first byte degrades instead.

pub mod context;
pub mod generate;
pub mod orchestrator;
pub mod title;

pub use context::{EnrichmentResults, TurnContext, TurnRequest};
pub use generate::{build_system_prompt, stream_reply, StreamResult};
pub use orchestrator::{PreparedTurn, TurnOrchestrator, TurnOutcome};
