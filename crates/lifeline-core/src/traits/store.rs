// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence trait for queued actions.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::LifelineError;
use crate::types::QueuedAction;

/// Durable storage for queued actions, scoped by user id.
///
/// Implementations only persist records. Ordering, in-flight tracking and
/// capacity policy live in the action queue that wraps the store.
#[async_trait]
pub trait QueueStore: Send + Sync + 'static {
    /// Human-readable backend name, used in logs.
    fn name(&self) -> &str;

    /// Prepares the backend (migrations, connection, crash recovery).
    async fn initialize(&self) -> Result<(), LifelineError>;

    /// Flushes pending writes and releases resources.
    async fn close(&self) -> Result<(), LifelineError>;

    /// Appends a new record.
    async fn insert(&self, action: &QueuedAction) -> Result<(), LifelineError>;

    /// Returns all records for `user_id`, oldest `created_at` first.
    async fn list(&self, user_id: &str) -> Result<Vec<QueuedAction>, LifelineError>;

    /// Looks up a single record.
    async fn get(&self, id: Uuid) -> Result<Option<QueuedAction>, LifelineError>;

    /// Overwrites the mutable attempt fields of an existing record.
    async fn update(&self, action: &QueuedAction) -> Result<(), LifelineError>;

    /// Deletes a record. Returns `false` when it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool, LifelineError>;

    /// Number of records for `user_id`.
    async fn count(&self, user_id: &str) -> Result<usize, LifelineError>;
}
