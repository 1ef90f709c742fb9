// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replay executor trait, registered per action kind by feature callers.

use async_trait::async_trait;

use crate::error::LifelineError;
use crate::types::QueuedAction;

/// Performs one queued action against the backend.
///
/// Executors receive the whole action so they can forward `action.id` as an
/// idempotency key. Delivery is at-least-once: an executor may be invoked
/// again for an action whose previous attempt actually reached the backend.
#[async_trait]
pub trait ActionExecutor: Send + Sync + 'static {
    async fn execute(&self, action: &QueuedAction) -> Result<(), LifelineError>;
}
