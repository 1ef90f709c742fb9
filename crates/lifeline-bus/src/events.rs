// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event payloads published on the resilience bus.

use chrono::{DateTime, Utc};
use lifeline_core::{BackendHealth, ResilienceState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a support report was queued instead of submitted directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReason {
    /// The client was offline or the backend in outage.
    Unreachable,
    /// Submission was attempted and failed.
    SubmitFailed,
}

/// Something observable that happened inside the resilience subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ResilienceEvent {
    StateChanged {
        from: ResilienceState,
        to: ResilienceState,
        queue_count: usize,
        probe_failures: u32,
        backend_health: BackendHealth,
    },
    ActionQueued {
        id: Uuid,
        kind: String,
        queue_count: usize,
    },
    ActionReplayed {
        id: Uuid,
        kind: String,
        attempt_count: u32,
    },
    ActionFailed {
        id: Uuid,
        kind: String,
        attempt_count: u32,
        error: String,
        retry_in_ms: u64,
    },
    ActionDiscarded {
        id: Uuid,
        kind: String,
    },
    ActionEvicted {
        id: Uuid,
        kind: String,
        age_secs: i64,
    },
    ActionExpired {
        id: Uuid,
        kind: String,
        age_secs: i64,
    },
    QueueRecovered,
    BannerShown {
        state: ResilienceState,
        queue_count: usize,
        backend_health: BackendHealth,
    },
    SupportReportQueued {
        correlation_id: String,
        reason: QueueReason,
    },
    SupportReportSubmitted {
        correlation_id: String,
    },
}

impl ResilienceEvent {
    /// Stable event name used in structured logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::ActionQueued { .. } => "action_queued",
            Self::ActionReplayed { .. } => "action_replayed",
            Self::ActionFailed { .. } => "action_failed",
            Self::ActionDiscarded { .. } => "action_discarded",
            Self::ActionEvicted { .. } => "action_evicted",
            Self::ActionExpired { .. } => "action_expired",
            Self::QueueRecovered => "queue_recovered",
            Self::BannerShown { .. } => "status_banner_shown",
            Self::SupportReportQueued { .. } => "support_report_queued",
            Self::SupportReportSubmitted { .. } => "support_report_submitted",
        }
    }
}

/// An event with its identity and emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ResilienceEvent,
}

impl EventEnvelope {
    pub fn new(event: ResilienceEvent, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            at,
            event,
        }
    }
}
