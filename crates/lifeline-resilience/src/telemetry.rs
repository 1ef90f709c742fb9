// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured telemetry for the resilience subsystem.
//!
//! Every event is logged on the `lifeline::telemetry` target and published on
//! the event bus. Nothing recorded here feeds back into the state machine.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use lifeline_bus::{EventBus, ResilienceEvent};
use lifeline_core::{Clock, ResilienceState};
use lifeline_security::{sanitize_text, truncate};
use tracing::{info, warn};

use crate::state::ConnectivityInputs;

/// Bounded, sanitized list of recent error fingerprints.
#[derive(Debug, Clone)]
pub struct FingerprintLog {
    entries: VecDeque<String>,
    capacity: usize,
    max_len: usize,
}

impl FingerprintLog {
    pub fn new(capacity: usize, max_len: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            max_len,
        }
    }

    /// Record `message | context-json`, sanitized then truncated.
    /// The oldest entry is dropped once the log is full.
    pub fn push(&mut self, message: &str, context: Option<&serde_json::Value>) -> String {
        let raw = match context {
            Some(ctx) => format!("{message} | {ctx}"),
            None => message.to_string(),
        };
        let fingerprint = truncate(&sanitize_text(&raw), self.max_len);
        if self.capacity == 0 {
            return fingerprint;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(fingerprint.clone());
        fingerprint
    }

    /// Recent fingerprints, oldest first.
    pub fn recent(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
struct TelemetryState {
    fingerprints: FingerprintLog,
    banners_shown: HashSet<ResilienceState>,
}

/// Telemetry and diagnostics reporter shared by the queue, the replay engine
/// and the core.
pub struct Telemetry {
    bus: EventBus,
    clock: Arc<dyn Clock>,
    state: Mutex<TelemetryState>,
}

impl Telemetry {
    pub fn new(bus: EventBus, clock: Arc<dyn Clock>, max_fingerprints: usize, max_len: usize) -> Self {
        Self {
            bus,
            clock,
            state: Mutex::new(TelemetryState {
                fingerprints: FingerprintLog::new(max_fingerprints, max_len),
                banners_shown: HashSet::new(),
            }),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Log and publish an event.
    pub fn emit(&self, event: ResilienceEvent) {
        match &event {
            ResilienceEvent::ActionEvicted { id, kind, age_secs } => warn!(
                target: "lifeline::telemetry",
                event = event.name(),
                action_id = %id,
                kind = %kind,
                age_secs,
                "queue over capacity, evicted oldest action"
            ),
            ResilienceEvent::ActionExpired { id, kind, age_secs } => warn!(
                target: "lifeline::telemetry",
                event = event.name(),
                action_id = %id,
                kind = %kind,
                age_secs,
                "queued action expired"
            ),
            ResilienceEvent::ActionFailed {
                id,
                kind,
                attempt_count,
                error,
                retry_in_ms,
            } => warn!(
                target: "lifeline::telemetry",
                event = event.name(),
                action_id = %id,
                kind = %kind,
                attempt = attempt_count,
                delay_ms = retry_in_ms,
                error = %error,
                "replay attempt failed"
            ),
            _ => info!(
                target: "lifeline::telemetry",
                event = event.name(),
                payload = %serde_json::to_string(&event).unwrap_or_default(),
                "resilience event"
            ),
        }
        self.bus.publish(event, self.clock.now());
    }

    /// Record a state transition and fire the deduplicated banner event.
    pub fn record_transition(
        &self,
        from: ResilienceState,
        to: ResilienceState,
        inputs: &ConnectivityInputs,
    ) {
        info!(
            target: "lifeline::telemetry",
            from = %from,
            state = %to,
            queue_count = inputs.queue_count,
            probe_failures = inputs.probe_failures,
            backend_health = %inputs.backend_health,
            "resilience state changed"
        );
        self.bus.publish(
            ResilienceEvent::StateChanged {
                from,
                to,
                queue_count: inputs.queue_count,
                probe_failures: inputs.probe_failures,
                backend_health: inputs.backend_health,
            },
            self.clock.now(),
        );

        let show_banner = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if to == ResilienceState::Healthy {
                state.banners_shown.clear();
                false
            } else {
                state.banners_shown.insert(to)
            }
        };
        if show_banner {
            self.emit(ResilienceEvent::BannerShown {
                state: to,
                queue_count: inputs.queue_count,
                backend_health: inputs.backend_health,
            });
        }
    }

    /// Add a sanitized fingerprint for a foreground failure.
    pub fn record_fingerprint(&self, message: &str, context: Option<&serde_json::Value>) -> String {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.fingerprints.push(message, context)
    }

    /// Recent fingerprints, oldest first.
    pub fn recent_fingerprints(&self) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.fingerprints.recent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeline_core::{BackendHealth, SystemClock};
    use serde_json::json;

    fn telemetry() -> Telemetry {
        Telemetry::new(EventBus::default(), Arc::new(SystemClock), 20, 220)
    }

    #[test]
    fn fingerprint_log_keeps_most_recent_oldest_first() {
        let mut log = FingerprintLog::new(20, 220);
        for i in 0..30 {
            log.push(&format!("error {i}"), None);
        }
        let recent = log.recent();
        assert_eq!(recent.len(), 20);
        assert_eq!(recent.first().map(String::as_str), Some("error 10"));
        assert_eq!(recent.last().map(String::as_str), Some("error 29"));
    }

    #[test]
    fn fingerprint_is_sanitized_and_truncated() {
        let mut log = FingerprintLog::new(5, 40);
        let fp = log.push("Authorization: Bearer topsecret", None);
        assert_eq!(fp, "Authorization: Bearer [redacted]");

        let long = "x".repeat(500);
        assert_eq!(log.push(&long, None).chars().count(), 40);
    }

    #[test]
    fn fingerprint_includes_context_json() {
        let mut log = FingerprintLog::new(5, 220);
        let fp = log.push("GET /quests failed", Some(&json!({"status": 503})));
        assert_eq!(fp, r#"GET /quests failed | {"status":503}"#);
    }

    #[test]
    fn banner_fires_once_per_state_until_healthy() {
        let t = telemetry();
        let mut rx = t.bus().subscribe();
        let inputs = ConnectivityInputs {
            backend_health: BackendHealth::Down,
            ..Default::default()
        };

        t.record_transition(ResilienceState::Healthy, ResilienceState::Offline, &inputs);
        t.record_transition(ResilienceState::Offline, ResilienceState::Outage, &inputs);
        t.record_transition(ResilienceState::Outage, ResilienceState::Offline, &inputs);
        t.record_transition(ResilienceState::Offline, ResilienceState::Healthy, &inputs);
        t.record_transition(ResilienceState::Healthy, ResilienceState::Offline, &inputs);

        let mut banners = Vec::new();
        while let Ok(env) = rx.try_recv() {
            if let ResilienceEvent::BannerShown { state, .. } = env.event {
                banners.push(state);
            }
        }
        assert_eq!(
            banners,
            [
                ResilienceState::Offline,
                ResilienceState::Outage,
                ResilienceState::Offline
            ]
        );
    }

    #[tracing_test::traced_test]
    #[test]
    fn transitions_are_logged_with_state_fields() {
        let t = telemetry();
        t.record_transition(
            ResilienceState::Healthy,
            ResilienceState::Degraded,
            &ConnectivityInputs::default(),
        );
        assert!(logs_contain("resilience state changed"));
        assert!(logs_contain("state=degraded"));
    }
}
