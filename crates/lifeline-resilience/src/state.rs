// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure derivation of the user-facing resilience state.

use chrono::{DateTime, Utc};
use lifeline_core::{BackendHealth, ResilienceState};
use serde::Serialize;

/// Snapshot of every signal the state derivation looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityInputs {
    /// Device-level reachability as reported by the platform. `false` wins
    /// over everything except an open recovered window.
    pub is_online: bool,
    /// Last classification from the health probe.
    pub backend_health: BackendHealth,
    /// Consecutive failed health probes. Reset by the first success.
    pub probe_failures: u32,
    /// Failures needed before the backend is treated as down.
    pub outage_threshold: u32,
    /// An offline/outage/degraded episode was observed and not yet cleared.
    pub has_incident: bool,
    /// Entries waiting in the user's action queue.
    pub queue_count: usize,
    /// Foreground requests are failing at an elevated rate.
    pub degraded_by_errors: bool,
    /// The user closed the degraded banner. Cleared when the degradation ends,
    /// so the next episode shows it again.
    pub degraded_dismissed: bool,
    /// End of the "back online" window, if one is open.
    pub show_recovered_until: Option<DateTime<Utc>>,
}

impl Default for ConnectivityInputs {
    fn default() -> Self {
        Self {
            is_online: true,
            backend_health: BackendHealth::Unknown,
            probe_failures: 0,
            outage_threshold: 3,
            has_incident: false,
            queue_count: 0,
            degraded_by_errors: false,
            degraded_dismissed: false,
            show_recovered_until: None,
        }
    }
}

/// Map the inputs to exactly one state. The first matching rule wins:
///
/// 1. recovered window still open → `Recovered`
/// 2. device offline → `Offline`
/// 3. too many consecutive probe failures → `Outage`
/// 4. unresolved incident with queued work → `Recovering`
/// 5. degraded backend or error rate, not dismissed → `Degraded`
/// 6. otherwise → `Healthy`
pub fn derive_resilience_state(inputs: &ConnectivityInputs, now: DateTime<Utc>) -> ResilienceState {
    if inputs.show_recovered_until.is_some_and(|until| now < until) {
        return ResilienceState::Recovered;
    }
    if !inputs.is_online {
        return ResilienceState::Offline;
    }
    if inputs.probe_failures >= inputs.outage_threshold {
        return ResilienceState::Outage;
    }
    if inputs.has_incident && inputs.queue_count > 0 {
        return ResilienceState::Recovering;
    }
    let degraded = inputs.backend_health == BackendHealth::Degraded || inputs.degraded_by_errors;
    if degraded && !inputs.degraded_dismissed {
        return ResilienceState::Degraded;
    }
    ResilienceState::Healthy
}
