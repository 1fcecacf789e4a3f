// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed CRUD operations, one module per table.

pub mod conversations;
pub mod messages;
pub mod users;
