// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replay engine: drains a user's queue against the backend in FIFO order.
//!
//! A drain replays one action at a time. On the first failure it records the
//! attempt, computes the backoff delay and stops; the caller reschedules.
//! Entering `offline` or `outage` halts the drain, interrupting an attempt
//! that is still in flight.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lifeline_bus::ResilienceEvent;
use lifeline_core::{ActionExecutor, LifelineError, QueuedAction, ResilienceState};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backoff::BackoffPolicy;
use crate::queue::ActionQueue;
use crate::telemetry::Telemetry;

/// Maps action kinds to the executors that replay them.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn ActionExecutor>>,
    fallback: Option<Arc<dyn ActionExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: impl Into<String>, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executors.insert(kind.into(), executor);
        self
    }

    /// Executor used for kinds without a dedicated registration.
    pub fn with_fallback(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.fallback = Some(executor);
        self
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn ActionExecutor>> {
        self.executors
            .get(kind)
            .cloned()
            .or_else(|| self.fallback.clone())
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.executors.keys().map(String::as_str)
    }
}

/// Result of one drain cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Nothing was queued.
    Empty,
    /// The queue was emptied.
    Drained { replayed: usize },
    /// Connectivity was lost before the queue was emptied.
    Halted {
        replayed: usize,
        state: ResilienceState,
    },
    /// An action failed; retry after `delay`.
    Backoff {
        replayed: usize,
        action_id: Uuid,
        error: String,
        delay: Duration,
    },
    /// Another drain for the same user is in progress.
    AlreadyRunning,
}

enum Attempt {
    Succeeded,
    Failed(LifelineError),
    Interrupted(ResilienceState),
}

pub struct ReplayEngine {
    queue: Arc<ActionQueue>,
    registry: ExecutorRegistry,
    backoff: BackoffPolicy,
    attempt_timeout: Duration,
    telemetry: Arc<Telemetry>,
    state_rx: watch::Receiver<ResilienceState>,
    active: Mutex<HashSet<String>>,
}

/// Releases the per-user drain slot on drop.
struct DrainGuard<'a> {
    active: &'a Mutex<HashSet<String>>,
    user_id: String,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user_id);
    }
}

impl ReplayEngine {
    pub fn new(
        queue: Arc<ActionQueue>,
        registry: ExecutorRegistry,
        backoff: BackoffPolicy,
        attempt_timeout: Duration,
        telemetry: Arc<Telemetry>,
        state_rx: watch::Receiver<ResilienceState>,
    ) -> Self {
        Self {
            queue,
            registry,
            backoff,
            attempt_timeout,
            telemetry,
            state_rx,
            active: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    pub fn is_draining(&self, user_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(user_id)
    }

    fn try_begin(&self, user_id: &str) -> Option<DrainGuard<'_>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(user_id.to_string()) {
            return None;
        }
        Some(DrainGuard {
            active: &self.active,
            user_id: user_id.to_string(),
        })
    }

    /// Run one drain cycle for `user_id`.
    pub async fn drain(&self, user_id: &str) -> Result<DrainOutcome, LifelineError> {
        let Some(_guard) = self.try_begin(user_id) else {
            debug!(user_id, "drain already running, coalescing");
            return Ok(DrainOutcome::AlreadyRunning);
        };

        self.queue.expire_stale(user_id).await?;

        let mut replayed = 0;
        loop {
            let state = *self.state_rx.borrow();
            if state.blocks_replay() {
                info!(user_id, state = %state, replayed, "drain halted");
                return Ok(DrainOutcome::Halted { replayed, state });
            }

            let Some(claim) = self.queue.claim_next(user_id).await? else {
                if replayed > 0 {
                    info!(user_id, replayed, "queue drained");
                    return Ok(DrainOutcome::Drained { replayed });
                }
                return Ok(DrainOutcome::Empty);
            };

            // The claim is held until the store reflects the attempt. If this
            // future is dropped first, dropping the claim releases the head.
            let action = claim.action().clone();
            match self.attempt(&action).await {
                Attempt::Succeeded => {
                    self.queue.remove(action.id).await?;
                    replayed += 1;
                    self.telemetry.emit(ResilienceEvent::ActionReplayed {
                        id: action.id,
                        kind: action.kind.clone(),
                        attempt_count: action.attempt_count + 1,
                    });
                }
                Attempt::Failed(err) => {
                    let message = err.to_string();
                    let updated = self.queue.mark_attempt(action.id, Some(&message)).await?;
                    let delay = self.backoff.delay(updated.attempt_count);
                    let error = updated.last_error.clone().unwrap_or_default();
                    self.telemetry.emit(ResilienceEvent::ActionFailed {
                        id: updated.id,
                        kind: updated.kind.clone(),
                        attempt_count: updated.attempt_count,
                        error: error.clone(),
                        retry_in_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    });
                    return Ok(DrainOutcome::Backoff {
                        replayed,
                        action_id: updated.id,
                        error,
                        delay,
                    });
                }
                Attempt::Interrupted(state) => {
                    self.queue
                        .mark_attempt(action.id, Some("interrupted: connectivity lost"))
                        .await?;
                    info!(
                        user_id,
                        action_id = %action.id,
                        state = %state,
                        "replay interrupted"
                    );
                    return Ok(DrainOutcome::Halted { replayed, state });
                }
            }
        }
    }

    async fn attempt(&self, action: &QueuedAction) -> Attempt {
        let Some(executor) = self.registry.get(&action.kind) else {
            return Attempt::Failed(LifelineError::NoExecutor {
                kind: action.kind.clone(),
            });
        };

        debug!(
            action_id = %action.id,
            kind = %action.kind,
            attempt = action.attempt_count + 1,
            "replaying action"
        );

        let mut state_rx = self.state_rx.clone();
        // Biased: a result that is already in wins over a simultaneous disconnect.
        tokio::select! {
            biased;
            result = tokio::time::timeout(self.attempt_timeout, executor.execute(action)) => {
                match result {
                    Ok(Ok(())) => Attempt::Succeeded,
                    Ok(Err(err)) => Attempt::Failed(err),
                    Err(_) => Attempt::Failed(LifelineError::Timeout {
                        duration: self.attempt_timeout,
                    }),
                }
            }
            state = wait_for_blocking(&mut state_rx) => Attempt::Interrupted(state),
        }
    }
}

/// Resolves once the watched state blocks replay. Pends forever if the
/// sender is gone.
async fn wait_for_blocking(rx: &mut watch::Receiver<ResilienceState>) -> ResilienceState {
    loop {
        let state = *rx.borrow_and_update();
        if state.blocks_replay() {
            return state;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
