// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue policy tests against the in-memory store.

use std::sync::Arc;

use chrono::TimeDelta;
use lifeline_bus::{EventBus, ResilienceEvent};
use lifeline_core::{LifelineError, QueueStore};
use lifeline_resilience::{ActionQueue, QueuePolicy, Telemetry};
use lifeline_test_utils::{ManualClock, MemoryQueueStore};
use serde_json::json;
use tokio::sync::broadcast;

struct Fixture {
    queue: ActionQueue,
    store: Arc<MemoryQueueStore>,
    clock: Arc<ManualClock>,
    events: broadcast::Receiver<lifeline_bus::EventEnvelope>,
}

fn fixture(policy: QueuePolicy) -> Fixture {
    let store = Arc::new(MemoryQueueStore::new());
    let clock = Arc::new(ManualClock::default());
    let bus = EventBus::new(256);
    let events = bus.subscribe();
    let telemetry = Arc::new(Telemetry::new(bus, clock.clone(), 20, 220));
    let queue = ActionQueue::new(store.clone(), clock.clone(), telemetry, policy);
    Fixture {
        queue,
        store,
        clock,
        events,
    }
}

fn drain_events(rx: &mut broadcast::Receiver<lifeline_bus::EventEnvelope>) -> Vec<ResilienceEvent> {
    let mut out = Vec::new();
    while let Ok(env) = rx.try_recv() {
        out.push(env.event);
    }
    out
}

#[tokio::test]
async fn replay_order_follows_enqueue_order() {
    let f = fixture(QueuePolicy::default());
    // Same clock reading for every enqueue: order must still be kept.
    let a = f.queue.enqueue("u", "complete_habit", json!({"n": 1})).await.unwrap();
    let b = f.queue.enqueue("u", "complete_habit", json!({"n": 2})).await.unwrap();
    let c = f.queue.enqueue("u", "log_mood", json!({"n": 3})).await.unwrap();

    let ids: Vec<_> = f.queue.list("u").await.unwrap().iter().map(|x| x.id).collect();
    assert_eq!(ids, vec![a.id, b.id, c.id]);
    assert!(a.created_at < b.created_at && b.created_at < c.created_at);
}

#[tokio::test]
async fn enqueue_after_clock_moves_backwards_stays_fifo() {
    let f = fixture(QueuePolicy::default());
    let first = f.queue.enqueue("u", "k", json!(null)).await.unwrap();
    f.clock.advance(TimeDelta::minutes(-10));
    let second = f.queue.enqueue("u", "k", json!(null)).await.unwrap();

    assert!(second.created_at > first.created_at);
    assert_eq!(f.queue.peek_next("u").await.unwrap().unwrap().id, first.id);
}

#[tokio::test]
async fn claimed_actions_are_skipped_by_peek() {
    let f = fixture(QueuePolicy::default());
    let a = f.queue.enqueue("u", "k", json!(null)).await.unwrap();
    let b = f.queue.enqueue("u", "k", json!(null)).await.unwrap();

    let claimed = f.queue.claim_next("u").await.unwrap().unwrap();
    assert_eq!(claimed.id, a.id);
    assert!(f.queue.is_in_flight(a.id));
    assert_eq!(f.queue.peek_next("u").await.unwrap().unwrap().id, b.id);

    let updated = f.queue.mark_attempt(a.id, Some("HTTP 500")).await.unwrap();
    assert_eq!(updated.attempt_count, 1);
    assert_eq!(updated.last_error.as_deref(), Some("HTTP 500"));
    assert!(!f.queue.is_in_flight(a.id));
}

#[tokio::test]
async fn stored_errors_are_sanitized() {
    let f = fixture(QueuePolicy::default());
    let a = f.queue.enqueue("u", "k", json!(null)).await.unwrap();
    let _claim = f.queue.claim_next("u").await.unwrap();

    let updated = f
        .queue
        .mark_attempt(a.id, Some("401 for https://api.test/x?access_token=abc123def"))
        .await
        .unwrap();
    let err = updated.last_error.unwrap();
    assert!(!err.contains("abc123def"));
    assert!(err.contains("[redacted]"));
}

#[tokio::test]
async fn over_capacity_evicts_only_old_entries() {
    let mut f = fixture(QueuePolicy {
        max_entries: 2,
        eviction_min_age: TimeDelta::hours(1),
        ttl: None,
    });
    let old = f.queue.enqueue("u", "k", json!(1)).await.unwrap();
    f.clock.advance(TimeDelta::hours(2));
    let recent = f.queue.enqueue("u", "k", json!(2)).await.unwrap();
    drain_events(&mut f.events);

    let newest = f.queue.enqueue("u", "k", json!(3)).await.unwrap();

    let ids: Vec<_> = f.queue.list("u").await.unwrap().iter().map(|x| x.id).collect();
    assert_eq!(ids, vec![recent.id, newest.id]);

    let events = drain_events(&mut f.events);
    assert!(matches!(
        &events[0],
        ResilienceEvent::ActionEvicted { id, age_secs, .. } if *id == old.id && *age_secs >= 7200
    ));
    assert!(matches!(
        &events[1],
        ResilienceEvent::ActionQueued { queue_count: 2, .. }
    ));
}

#[tokio::test]
async fn young_entries_exceed_the_soft_cap_rather_than_drop() {
    let f = fixture(QueuePolicy {
        max_entries: 2,
        eviction_min_age: TimeDelta::days(1),
        ttl: None,
    });
    for n in 0..4 {
        f.queue.enqueue("u", "k", json!(n)).await.unwrap();
    }
    assert_eq!(f.queue.count("u").await.unwrap(), 4);
}

#[tokio::test]
async fn in_flight_entries_are_never_evicted() {
    let f = fixture(QueuePolicy {
        max_entries: 1,
        eviction_min_age: TimeDelta::zero(),
        ttl: None,
    });
    let a = f.queue.enqueue("u", "k", json!(1)).await.unwrap();
    let _claim = f.queue.claim_next("u").await.unwrap();
    let b = f.queue.enqueue("u", "k", json!(2)).await.unwrap();

    let ids: Vec<_> = f.queue.list("u").await.unwrap().iter().map(|x| x.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
}

#[tokio::test]
async fn expire_stale_removes_entries_past_ttl() {
    let mut f = fixture(QueuePolicy {
        ttl: Some(TimeDelta::days(7)),
        ..QueuePolicy::default()
    });
    let stale = f.queue.enqueue("u", "k", json!(1)).await.unwrap();
    f.clock.advance(TimeDelta::days(8));
    let fresh = f.queue.enqueue("u", "k", json!(2)).await.unwrap();
    drain_events(&mut f.events);

    let expired = f.queue.expire_stale("u").await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, stale.id);
    assert_eq!(f.queue.list("u").await.unwrap()[0].id, fresh.id);
    assert!(matches!(
        drain_events(&mut f.events).as_slice(),
        [ResilienceEvent::ActionExpired { .. }]
    ));
}

#[tokio::test]
async fn expire_stale_without_ttl_is_a_no_op() {
    let f = fixture(QueuePolicy::default());
    f.queue.enqueue("u", "k", json!(1)).await.unwrap();
    f.clock.advance(TimeDelta::days(365));
    assert!(f.queue.expire_stale("u").await.unwrap().is_empty());
    assert_eq!(f.queue.count("u").await.unwrap(), 1);
}

#[tokio::test]
async fn discard_refuses_in_flight_and_unknown_actions() {
    let mut f = fixture(QueuePolicy::default());
    let a = f.queue.enqueue("u", "k", json!(1)).await.unwrap();
    let b = f.queue.enqueue("u", "k", json!(2)).await.unwrap();
    let _claim = f.queue.claim_next("u").await.unwrap();
    drain_events(&mut f.events);

    assert!(matches!(
        f.queue.discard("u", a.id).await,
        Err(LifelineError::Validation(_))
    ));
    let removed = f.queue.discard("u", b.id).await.unwrap();
    assert_eq!(removed.id, b.id);
    assert!(matches!(
        f.queue.discard("u", b.id).await,
        Err(LifelineError::ActionNotFound { .. })
    ));
    assert!(matches!(
        drain_events(&mut f.events).as_slice(),
        [ResilienceEvent::ActionDiscarded { .. }]
    ));
}

#[tokio::test]
async fn dropping_a_claim_releases_the_head() {
    let f = fixture(QueuePolicy::default());
    let a = f.queue.enqueue("u", "k", json!(1)).await.unwrap();
    f.queue.enqueue("u", "k", json!(2)).await.unwrap();

    let claim = f.queue.claim_next("u").await.unwrap().unwrap();
    assert_eq!(claim.id, a.id);
    drop(claim);

    assert!(!f.queue.is_in_flight(a.id));
    assert_eq!(f.queue.peek_next("u").await.unwrap().unwrap().id, a.id);
    assert_eq!(f.queue.discard("u", a.id).await.unwrap().id, a.id);
}

#[tokio::test]
async fn discard_treats_other_users_actions_as_missing() {
    let f = fixture(QueuePolicy::default());
    let bobs = f.queue.enqueue("bob", "k", json!(1)).await.unwrap();

    assert!(matches!(
        f.queue.discard("alice", bobs.id).await,
        Err(LifelineError::ActionNotFound { .. })
    ));
    assert_eq!(f.queue.count("bob").await.unwrap(), 1);
}

#[tokio::test]
async fn enqueue_with_id_keeps_the_callers_id() {
    let f = fixture(QueuePolicy::default());
    let id = uuid::Uuid::new_v4();
    let action = f
        .queue
        .enqueue_with_id("u", id, "support_report", json!({}))
        .await
        .unwrap();
    assert_eq!(action.id, id);
    assert_eq!(f.queue.list("u").await.unwrap()[0].id, id);
}

#[tokio::test]
async fn queues_are_scoped_per_user() {
    let f = fixture(QueuePolicy::default());
    f.queue.enqueue("alice", "k", json!(1)).await.unwrap();
    f.queue.enqueue("bob", "k", json!(2)).await.unwrap();

    assert_eq!(f.queue.count("alice").await.unwrap(), 1);
    assert_eq!(f.store.count("bob").await.unwrap(), 1);
    assert!(f.queue.peek_next("carol").await.unwrap().is_none());
}

#[tokio::test]
async fn storage_failure_on_enqueue_propagates() {
    let f = fixture(QueuePolicy::default());
    f.store.fail_writes(true);
    assert!(matches!(
        f.queue.enqueue("u", "k", json!(1)).await,
        Err(LifelineError::Storage { .. })
    ));
}
