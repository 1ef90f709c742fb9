// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Lifeline crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// The operational state presented to the UI layer.
///
/// Always derived from connectivity inputs, never stored as ground truth.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResilienceState {
    Healthy,
    Offline,
    Degraded,
    Outage,
    Recovering,
    Recovered,
}

impl ResilienceState {
    /// States in which replaying queued actions is pointless.
    pub fn blocks_replay(self) -> bool {
        matches!(self, ResilienceState::Offline | ResilienceState::Outage)
    }

    /// States that count as an incident episode.
    pub fn is_impaired(self) -> bool {
        matches!(
            self,
            ResilienceState::Offline | ResilienceState::Outage | ResilienceState::Degraded
        )
    }
}

/// Classification of the most recent backend health probe.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BackendHealth {
    /// No probe has completed yet, or probing is paused while offline.
    #[default]
    Unknown,
    Healthy,
    /// Reachable but slow, or failing below the outage threshold.
    Degraded,
    Down,
}

/// Progress of the replay engine as seen by the UI.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
}

/// A user-initiated mutation waiting to be replayed against the backend.
///
/// `id` doubles as the idempotency key handed to executors and is stable
/// across every retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    /// Caller-defined action type used to select a replay executor.
    pub kind: String,
    pub payload: serde_json::Value,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl QueuedAction {
    /// Creates a fresh, never-attempted action.
    pub fn new(
        user_id: impl Into<String>,
        kind: impl Into<String>,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            created_at,
            kind: kind.into(),
            payload,
            attempt_count: 0,
            last_attempt_at: None,
            last_error: None,
        }
    }
}
