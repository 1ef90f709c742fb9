// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the resilience core through the test harness.

use std::time::Duration;

use chrono::TimeDelta;
use lifeline_bus::{QueueReason, ResilienceEvent};
use lifeline_core::{BackendHealth, LifelineError, QueuedAction, ResilienceState, SyncStatus};
use lifeline_resilience::{
    DrainOutcome, ReportCategory, ReportOutcome, SUPPORT_REPORT_KIND, SupportReportRequest,
};
use lifeline_test_utils::harness::TEST_USER;
use lifeline_test_utils::TestHarness;
use serde_json::json;

fn banner_count(events: &[ResilienceEvent], wanted: ResilienceState) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ResilienceEvent::BannerShown { state, .. } if *state == wanted))
        .count()
}

#[tokio::test]
async fn starts_healthy_with_an_empty_queue() {
    let h = TestHarness::builder().build().await.unwrap();
    let snap = h.core.snapshot();
    assert_eq!(snap.state, ResilienceState::Healthy);
    assert_eq!(snap.queue_count, 0);
    assert_eq!(snap.backend_health, BackendHealth::Unknown);
    assert!(!h.core.should_queue_writes());
}

#[tokio::test]
async fn offline_queue_replay_and_recovered_window() {
    let mut h = TestHarness::builder().offline().build().await.unwrap();
    assert_eq!(h.core.state(), ResilienceState::Offline);
    assert!(h.core.should_queue_writes());

    let action = h
        .core
        .queue_action("complete_habit", json!({"habit_id": 7}))
        .await
        .unwrap();
    assert_eq!(h.core.queue_count(), 1);

    // Back online: probe runs right away, queued work keeps us recovering.
    assert_eq!(h.core.set_online(true).await, ResilienceState::Recovering);
    assert_eq!(h.probe.calls(), 1);
    assert_eq!(h.core.snapshot().backend_health, BackendHealth::Healthy);

    let outcome = h.core.retry_now().await.unwrap();
    assert_eq!(outcome, DrainOutcome::Drained { replayed: 1 });
    assert_eq!(h.executor.executed_ids(), vec![action.id]);

    let snap = h.core.snapshot();
    assert_eq!(snap.state, ResilienceState::Recovered);
    assert_eq!(snap.queue_count, 0);
    assert_eq!(snap.sync_status, SyncStatus::Success);
    assert!(!snap.has_incident);
    assert!(snap.show_recovered_until.is_some());

    let names: Vec<_> = h.take_events().iter().map(ResilienceEvent::name).collect();
    assert!(names.contains(&"queue_recovered"), "{names:?}");

    h.clock.advance(TimeDelta::seconds(6));
    assert_eq!(h.core.refresh(), ResilienceState::Healthy);
    assert!(h.core.snapshot().last_healthy_at.is_some());
}

#[tokio::test]
async fn consecutive_probe_failures_escalate_to_outage() {
    let h = TestHarness::builder().build().await.unwrap();
    for _ in 0..3 {
        h.probe.push_err("connection refused").await;
    }

    assert_eq!(h.core.run_probe().await, BackendHealth::Degraded);
    assert_eq!(h.core.state(), ResilienceState::Degraded);
    h.core.run_probe().await;
    assert_eq!(h.core.state(), ResilienceState::Degraded);
    assert_eq!(h.core.run_probe().await, BackendHealth::Down);
    assert_eq!(h.core.state(), ResilienceState::Outage);
    assert!(h.core.should_queue_writes());

    // First good probe after the incident shows the recovered banner.
    assert_eq!(h.core.run_probe().await, BackendHealth::Healthy);
    assert_eq!(h.core.state(), ResilienceState::Recovered);
    assert_eq!(h.core.snapshot().probe_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn probe_timeout_counts_as_a_failure() {
    let h = TestHarness::builder().build().await.unwrap();
    h.probe.set_delay(Some(Duration::from_secs(60))).await;

    assert_eq!(h.core.run_probe().await, BackendHealth::Degraded);
    assert_eq!(h.core.snapshot().probe_failures, 1);
}

#[tokio::test]
async fn probes_are_skipped_while_offline() {
    let h = TestHarness::builder().offline().build().await.unwrap();
    assert_eq!(h.core.run_probe().await, BackendHealth::Unknown);
    assert_eq!(h.probe.calls(), 0);
}

#[tokio::test]
async fn dismissal_lasts_until_health_returns() {
    let h = TestHarness::builder().build().await.unwrap();
    h.probe.push_ok(200, Duration::from_millis(3500)).await;
    h.core.run_probe().await;
    assert_eq!(h.core.state(), ResilienceState::Degraded);

    assert_eq!(h.core.dismiss_degraded(), ResilienceState::Healthy);
    assert!(!h.core.should_queue_writes());

    // Still slow: stays dismissed.
    h.probe.push_ok(200, Duration::from_millis(3500)).await;
    h.core.run_probe().await;
    assert_eq!(h.core.state(), ResilienceState::Healthy);

    // Fast probe clears the dismissal, so the next slowdown shows again.
    h.core.run_probe().await;
    assert!(!h.core.snapshot().degraded_dismissed);
    assert_eq!(h.core.state(), ResilienceState::Recovered);
    h.clock.advance(TimeDelta::seconds(6));
    h.probe.push_ok(200, Duration::from_millis(3500)).await;
    h.core.run_probe().await;
    assert_eq!(h.core.state(), ResilienceState::Degraded);
}

#[tokio::test]
async fn elevated_foreground_errors_degrade_until_the_window_passes() {
    let h = TestHarness::builder().build().await.unwrap();
    for n in 0..3 {
        h.core.report_api_failure(
            &format!("GET /rest/v1/habits failed: 500 (attempt {n})"),
            Some(&json!({"authorization": "Bearer abc.def.ghi"})),
        );
    }
    assert_eq!(h.core.state(), ResilienceState::Degraded);

    let fingerprints = h.core.recent_fingerprints();
    assert_eq!(fingerprints.len(), 3);
    assert!(fingerprints.iter().all(|f| !f.contains("abc.def.ghi")));

    h.clock.advance(TimeDelta::seconds(121));
    assert_eq!(h.core.refresh(), ResilienceState::Healthy);
}

#[tokio::test]
async fn banners_are_shown_once_per_incident() {
    let mut h = TestHarness::builder().offline().build().await.unwrap();
    h.core.queue_action("k", json!(1)).await.unwrap();

    h.core.set_online(true).await;
    h.core.set_online(false).await;
    h.core.set_online(true).await;

    let events = h.take_events();
    assert_eq!(banner_count(&events, ResilienceState::Offline), 1);
    assert_eq!(banner_count(&events, ResilienceState::Recovering), 1);
}

#[tokio::test]
async fn actions_left_from_a_previous_session_start_recovering() {
    let leftover = QueuedAction::new(
        TEST_USER,
        "complete_habit",
        json!({"habit_id": 1}),
        chrono::Utc::now() - TimeDelta::hours(3),
    );
    let h = TestHarness::builder()
        .with_records(vec![leftover.clone()])
        .build()
        .await
        .unwrap();

    assert_eq!(h.core.state(), ResilienceState::Recovering);
    assert_eq!(h.core.queue_count(), 1);
    assert_eq!(h.core.list_actions().await.unwrap()[0].id, leftover.id);
}

#[tokio::test]
async fn failed_replay_records_sync_error() {
    let h = TestHarness::builder().build().await.unwrap();
    h.executor.push_err("HTTP 422: habit archived");
    h.core.queue_action("complete_habit", json!({})).await.unwrap();

    let outcome = h.core.retry_now().await.unwrap();
    assert!(matches!(outcome, DrainOutcome::Backoff { .. }));

    let snap = h.core.snapshot();
    assert_eq!(snap.sync_status, SyncStatus::Error);
    assert!(snap.last_sync_error.unwrap().contains("habit archived"));
    assert_eq!(snap.queue_count, 1);
    assert_eq!(h.core.list_actions().await.unwrap()[0].attempt_count, 1);
}

#[tokio::test]
async fn replay_is_skipped_while_offline() {
    let h = TestHarness::builder().offline().build().await.unwrap();
    h.core.queue_action("k", json!(1)).await.unwrap();

    let outcome = h.core.retry_now().await.unwrap();
    assert!(matches!(
        outcome,
        DrainOutcome::Halted {
            state: ResilienceState::Offline,
            ..
        }
    ));
    assert!(h.executor.executed().is_empty());
}

#[tokio::test]
async fn discarding_the_last_action_updates_the_count() {
    let h = TestHarness::builder().offline().build().await.unwrap();
    let action = h.core.queue_action("k", json!(1)).await.unwrap();

    h.core.discard_action(action.id).await.unwrap();
    assert_eq!(h.core.queue_count(), 0);
    assert!(matches!(
        h.core.discard_action(action.id).await,
        Err(LifelineError::ActionNotFound { .. })
    ));
}

#[tokio::test]
async fn another_users_action_cannot_be_discarded() {
    let foreign = QueuedAction::new("someone-else", "k", json!(1), chrono::Utc::now());
    let h = TestHarness::builder()
        .offline()
        .with_records(vec![foreign.clone()])
        .build()
        .await
        .unwrap();

    assert!(matches!(
        h.core.discard_action(foreign.id).await,
        Err(LifelineError::ActionNotFound { .. })
    ));
    assert_eq!(h.store.snapshot().await.len(), 1);
}

#[tokio::test]
async fn report_issue_is_queued_while_offline() {
    let mut h = TestHarness::builder().offline().build().await.unwrap();
    h.core.set_route("/habits?access_token=secret-value-123");
    let request = SupportReportRequest {
        consent_diagnostics: true,
        ..SupportReportRequest::new(ReportCategory::Sync, "habits never sync")
    };

    let outcome = h.core.report_issue(&request).await.unwrap();
    let ReportOutcome::Queued {
        correlation_id,
        action_id,
    } = outcome
    else {
        panic!("expected the report to be queued");
    };

    let queued = h.core.list_actions().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].id, action_id);
    assert_eq!(action_id, correlation_id);
    assert_eq!(queued[0].kind, SUPPORT_REPORT_KIND);
    assert_eq!(
        queued[0].payload["correlationId"],
        json!(correlation_id.to_string())
    );
    let route = queued[0].payload["diagnostics"]["route"].as_str().unwrap();
    assert!(!route.contains("secret-value-123"));

    assert!(h.take_events().iter().any(|e| matches!(
        e,
        ResilienceEvent::SupportReportQueued {
            reason: QueueReason::Unreachable,
            ..
        }
    )));
}

#[tokio::test]
async fn report_issue_submits_directly_when_reachable() {
    let h = TestHarness::builder().build().await.unwrap();
    let request = SupportReportRequest::new(ReportCategory::Bug, "button does nothing");

    let outcome = h.core.report_issue(&request).await.unwrap();
    assert!(matches!(outcome, ReportOutcome::Submitted { .. }));

    let executed = h.executor.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].id, outcome.correlation_id());
    assert_eq!(executed[0].kind, SUPPORT_REPORT_KIND);
    assert!(executed[0].payload["diagnostics"].is_null());
    assert_eq!(h.core.queue_count(), 0);
}

#[tokio::test]
async fn report_issue_falls_back_to_the_queue_on_failure() {
    let mut h = TestHarness::builder().build().await.unwrap();
    h.executor.push_err("HTTP 502");
    let request = SupportReportRequest::new(ReportCategory::Other, "crash on launch");

    let outcome = h.core.report_issue(&request).await.unwrap();
    let ReportOutcome::Queued {
        correlation_id,
        action_id,
    } = outcome
    else {
        panic!("expected the report to be queued");
    };
    // A retry must reuse the idempotency key of the first submission.
    assert_eq!(action_id, correlation_id);
    assert_eq!(h.executor.executed_ids(), vec![correlation_id]);
    assert_eq!(h.core.list_actions().await.unwrap()[0].id, correlation_id);
    assert_eq!(h.core.queue_count(), 1);
    assert!(
        h.core
            .recent_fingerprints()
            .iter()
            .any(|f| f.contains("support_report_submit"))
    );
    assert!(h.take_events().iter().any(|e| matches!(
        e,
        ResilienceEvent::SupportReportQueued {
            reason: QueueReason::SubmitFailed,
            ..
        }
    )));
}

#[tokio::test]
async fn report_issue_rejects_an_empty_summary() {
    let h = TestHarness::builder().build().await.unwrap();
    let request = SupportReportRequest::new(ReportCategory::Bug, "   ");
    assert!(matches!(
        h.core.report_issue(&request).await,
        Err(LifelineError::Validation(_))
    ));
}

#[tokio::test]
async fn builder_requires_store_and_probe() {
    let result = lifeline_resilience::ResilienceCore::builder(TEST_USER)
        .build()
        .await;
    assert!(matches!(result, Err(LifelineError::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn background_tasks_drain_leftovers_and_stop_on_shutdown() {
    let leftover = QueuedAction::new(TEST_USER, "k", json!(1), chrono::Utc::now());
    let h = TestHarness::builder()
        .with_records(vec![leftover])
        .without_executor()
        .build()
        .await
        .unwrap();
    h.core.start();

    // Without an executor the leftover fails and is rescheduled with backoff.
    tokio::time::timeout(Duration::from_secs(30), async {
        while h.core.snapshot().sync_status != SyncStatus::Error {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .unwrap();
    assert!(h.probe.calls() >= 1);
    assert_eq!(h.core.queue_count(), 1);

    h.core.shutdown().await.unwrap();
    assert!(h.store.is_closed());
}
