// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The durable per-user action queue.
//!
//! Wraps a [`QueueStore`] with ordering, in-flight tracking and the capacity
//! and expiry policies. Every operation runs under one async mutex, so
//! operations are serialized across tasks.
//!
//! An entry handed out for replay is held by a [`Claim`]. The in-flight mark
//! lives exactly as long as the claim, so a drain that is cancelled mid-attempt
//! releases the head of the queue instead of leaving it stuck.

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use lifeline_bus::ResilienceEvent;
use lifeline_core::{Clock, LifelineError, QueueStore, QueuedAction};
use lifeline_security::{sanitize_text, truncate};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::telemetry::Telemetry;

const MAX_ERROR_LEN: usize = 500;

/// Capacity and expiry policy.
#[derive(Debug, Clone)]
pub struct QueuePolicy {
    /// Soft cap on entries per user.
    pub max_entries: usize,
    /// Entries younger than this are never evicted by the soft cap.
    pub eviction_min_age: TimeDelta,
    /// Entries older than this are expired before replay. `None` disables expiry.
    pub ttl: Option<TimeDelta>,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            max_entries: 500,
            eviction_min_age: TimeDelta::days(1),
            ttl: None,
        }
    }
}

pub struct ActionQueue {
    store: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<Telemetry>,
    policy: QueuePolicy,
    ops: Mutex<()>,
    in_flight: StdMutex<HashSet<Uuid>>,
}

/// An action checked out for replay. Dropping the claim clears the
/// in-flight mark.
pub struct Claim<'a> {
    queue: &'a ActionQueue,
    action: QueuedAction,
}

impl Claim<'_> {
    pub fn action(&self) -> &QueuedAction {
        &self.action
    }
}

impl Deref for Claim<'_> {
    type Target = QueuedAction;

    fn deref(&self) -> &QueuedAction {
        &self.action
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.queue.release(self.action.id);
    }
}

impl ActionQueue {
    pub fn new(
        store: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<Telemetry>,
        policy: QueuePolicy,
    ) -> Self {
        Self {
            store,
            clock,
            telemetry,
            policy,
            ops: Mutex::new(()),
            in_flight: StdMutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    fn marks(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, id: Uuid) {
        self.marks().remove(&id);
    }

    /// Append an action at the tail of the user's queue.
    ///
    /// Never rejects for capacity: when the soft cap is exceeded, the oldest
    /// idle entries past the minimum age are evicted instead.
    pub async fn enqueue(
        &self,
        user_id: &str,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<QueuedAction, LifelineError> {
        self.enqueue_with_id(user_id, Uuid::new_v4(), kind, payload)
            .await
    }

    /// [`enqueue`](Self::enqueue) with a caller-chosen id, for actions whose
    /// idempotency key was already handed to the backend.
    pub async fn enqueue_with_id(
        &self,
        user_id: &str,
        id: Uuid,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<QueuedAction, LifelineError> {
        let _ops = self.ops.lock().await;
        let existing = self.store.list(user_id).await?;

        let created_at = next_created_at(self.clock.now(), existing.last().map(|a| a.created_at));
        let mut action = QueuedAction::new(user_id, kind, payload, created_at);
        action.id = id;
        self.store.insert(&action).await?;

        let mut count = existing.len() + 1;
        if count > self.policy.max_entries {
            for old in &existing {
                if count <= self.policy.max_entries {
                    break;
                }
                let age = created_at - old.created_at;
                if age < self.policy.eviction_min_age || self.is_in_flight(old.id) {
                    continue;
                }
                if self.store.delete(old.id).await? {
                    count -= 1;
                    self.telemetry.emit(ResilienceEvent::ActionEvicted {
                        id: old.id,
                        kind: old.kind.clone(),
                        age_secs: age.num_seconds(),
                    });
                }
            }
        }

        tracing::debug!(action_id = %action.id, kind, queue_count = count, "action queued");
        self.telemetry.emit(ResilienceEvent::ActionQueued {
            id: action.id,
            kind: action.kind.clone(),
            queue_count: count,
        });
        Ok(action)
    }

    /// Oldest entry for `user_id` that is not currently being replayed.
    pub async fn peek_next(&self, user_id: &str) -> Result<Option<QueuedAction>, LifelineError> {
        let _ops = self.ops.lock().await;
        let actions = self.store.list(user_id).await?;
        let marks = self.marks();
        Ok(actions.into_iter().find(|a| !marks.contains(&a.id)))
    }

    /// Peek and mark the result in flight in one step.
    pub async fn claim_next(&self, user_id: &str) -> Result<Option<Claim<'_>>, LifelineError> {
        let _ops = self.ops.lock().await;
        let actions = self.store.list(user_id).await?;
        let mut marks = self.marks();
        let Some(action) = actions.into_iter().find(|a| !marks.contains(&a.id)) else {
            return Ok(None);
        };
        marks.insert(action.id);
        Ok(Some(Claim {
            queue: self,
            action,
        }))
    }

    /// Record a failed attempt and release the in-flight mark.
    pub async fn mark_attempt(
        &self,
        id: Uuid,
        error: Option<&str>,
    ) -> Result<QueuedAction, LifelineError> {
        let _ops = self.ops.lock().await;
        self.release(id);

        let mut action = self
            .store
            .get(id)
            .await?
            .ok_or(LifelineError::ActionNotFound { id })?;
        action.attempt_count = action.attempt_count.saturating_add(1);
        action.last_attempt_at = Some(self.clock.now());
        action.last_error = error.map(|e| truncate(&sanitize_text(e), MAX_ERROR_LEN));
        self.store.update(&action).await?;
        Ok(action)
    }

    /// Remove an action after a confirmed successful replay.
    pub async fn remove(&self, id: Uuid) -> Result<bool, LifelineError> {
        let _ops = self.ops.lock().await;
        self.release(id);
        self.store.delete(id).await
    }

    /// User-driven discard. Refuses actions that are mid-replay, and treats
    /// another user's action as not found.
    pub async fn discard(&self, user_id: &str, id: Uuid) -> Result<QueuedAction, LifelineError> {
        let _ops = self.ops.lock().await;
        let action = self
            .store
            .get(id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or(LifelineError::ActionNotFound { id })?;
        if self.is_in_flight(id) {
            return Err(LifelineError::Validation(format!(
                "action {id} is being replayed and cannot be discarded"
            )));
        }
        self.store.delete(id).await?;
        self.telemetry.emit(ResilienceEvent::ActionDiscarded {
            id,
            kind: action.kind.clone(),
        });
        Ok(action)
    }

    /// Delete idle entries older than the configured TTL.
    pub async fn expire_stale(&self, user_id: &str) -> Result<Vec<QueuedAction>, LifelineError> {
        let Some(ttl) = self.policy.ttl else {
            return Ok(Vec::new());
        };
        let _ops = self.ops.lock().await;
        let now = self.clock.now();
        let mut expired = Vec::new();
        for action in self.store.list(user_id).await? {
            let age = now - action.created_at;
            if age < ttl || self.is_in_flight(action.id) {
                continue;
            }
            if self.store.delete(action.id).await? {
                self.telemetry.emit(ResilienceEvent::ActionExpired {
                    id: action.id,
                    kind: action.kind.clone(),
                    age_secs: age.num_seconds(),
                });
                expired.push(action);
            }
        }
        Ok(expired)
    }

    pub async fn count(&self, user_id: &str) -> Result<usize, LifelineError> {
        let _ops = self.ops.lock().await;
        self.store.count(user_id).await
    }

    /// All entries for `user_id`, oldest first.
    pub async fn list(&self, user_id: &str) -> Result<Vec<QueuedAction>, LifelineError> {
        let _ops = self.ops.lock().await;
        self.store.list(user_id).await
    }

    pub fn is_in_flight(&self, id: Uuid) -> bool {
        self.marks().contains(&id)
    }
}

/// Creation time for a new tail entry: now at microsecond precision, but
/// strictly after the current tail so FIFO order survives clock skew.
fn next_created_at(now: DateTime<Utc>, tail: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now
        .duration_trunc(TimeDelta::microseconds(1))
        .unwrap_or(now);
    match tail {
        Some(tail) if tail >= now => tail + TimeDelta::microseconds(1),
        _ => now,
    }
}
