// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal typed event bus.
//!
//! Publishing never blocks and never fails: with no subscribers the event is
//! dropped, and slow subscribers observe `RecvError::Lagged` rather than
//! stalling the publisher.

pub mod events;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

pub use events::{EventEnvelope, QueueReason, ResilienceEvent};

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcast bus carrying [`EventEnvelope`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event stamped with `at`. Returns the envelope that was sent.
    pub fn publish(&self, event: ResilienceEvent, at: DateTime<Utc>) -> EventEnvelope {
        let envelope = EventEnvelope::new(event, at);
        if self.tx.send(envelope.clone()).is_err() {
            tracing::trace!(event = envelope.event.name(), "no bus subscribers");
        }
        envelope
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeline_core::{BackendHealth, ResilienceState};

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(ResilienceEvent::QueueRecovered, Utc::now());

        assert_eq!(a.recv().await.unwrap().event, ResilienceEvent::QueueRecovered);
        assert_eq!(b.recv().await.unwrap().event, ResilienceEvent::QueueRecovered);
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let bus = EventBus::new(4);
        let env = bus.publish(ResilienceEvent::QueueRecovered, Utc::now());
        assert_eq!(env.event.name(), "queue_recovered");
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish(ResilienceEvent::QueueRecovered, Utc::now());
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }

    #[test]
    fn envelope_serializes_flat_with_event_tag() {
        let env = EventEnvelope::new(
            ResilienceEvent::StateChanged {
                from: ResilienceState::Healthy,
                to: ResilienceState::Offline,
                queue_count: 2,
                probe_failures: 0,
                backend_health: BackendHealth::Unknown,
            },
            Utc::now(),
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["event"], "state_changed");
        assert_eq!(json["to"], "offline");
        assert_eq!(json["queue_count"], 2);
        assert!(json["id"].is_string());
    }

    #[test]
    fn banner_event_name_matches_telemetry_name() {
        let ev = ResilienceEvent::BannerShown {
            state: ResilienceState::Outage,
            queue_count: 0,
            backend_health: BackendHealth::Down,
        };
        assert_eq!(ev.name(), "status_banner_shown");
    }
}
