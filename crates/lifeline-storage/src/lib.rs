// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Lifeline action queue.
//!
//! WAL-mode SQLite with embedded migrations and a single serialized
//! connection via `tokio-rusqlite`.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteQueueStore;
pub use database::Database;
