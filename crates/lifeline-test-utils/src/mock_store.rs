// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory queue store.
//!
//! Keeps records in insertion order and sorts by `created_at` on read, the
//! same ordering the SQLite store gives (ties keep insertion order).

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use lifeline_core::{LifelineError, QueueStore, QueuedAction};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    records: Mutex<Vec<QueuedAction>>,
    fail_writes: AtomicBool,
    closed: AtomicBool,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load records, as if left behind by an earlier session.
    pub fn with_records(records: Vec<QueuedAction>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Make subsequent inserts and updates fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Every record for every user.
    pub async fn snapshot(&self) -> Vec<QueuedAction> {
        self.records.lock().await.clone()
    }

    fn check_writable(&self) -> Result<(), LifelineError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LifelineError::storage("simulated write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn initialize(&self) -> Result<(), LifelineError> {
        self.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), LifelineError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn insert(&self, action: &QueuedAction) -> Result<(), LifelineError> {
        self.check_writable()?;
        self.records.lock().await.push(action.clone());
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<QueuedAction>, LifelineError> {
        let mut out: Vec<_> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.created_at);
        Ok(out)
    }

    async fn get(&self, id: Uuid) -> Result<Option<QueuedAction>, LifelineError> {
        Ok(self.records.lock().await.iter().find(|a| a.id == id).cloned())
    }

    async fn update(&self, action: &QueuedAction) -> Result<(), LifelineError> {
        self.check_writable()?;
        let mut records = self.records.lock().await;
        let slot = records
            .iter_mut()
            .find(|a| a.id == action.id)
            .ok_or(LifelineError::ActionNotFound { id: action.id })?;
        slot.attempt_count = action.attempt_count;
        slot.last_attempt_at = action.last_attempt_at;
        slot.last_error = action.last_error.clone();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, LifelineError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|a| a.id != id);
        Ok(records.len() != before)
    }

    async fn count(&self, user_id: &str) -> Result<usize, LifelineError> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|a| a.user_id == user_id)
            .count())
    }
}
