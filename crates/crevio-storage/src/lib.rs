// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Crevio assistant pipeline.
//!
//! Provides WAL-mode SQLite storage with schema applied on open, a
//! single-writer concurrency model via `tokio-rusqlite`, and typed CRUD
//! operations for conversations, messages, and users. The memory store and
//! enrichment cache share this database through the same connection.

pub mod adapter;
pub mod database;
pub mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::{now_timestamp, Database};
pub use models::*;
