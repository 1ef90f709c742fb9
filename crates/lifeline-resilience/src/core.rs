// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The resilience core: owns the connectivity inputs, recomputes the derived
//! state whenever an input changes, and schedules probes and drains.
//!
//! Readers either poll [`ResilienceCore::snapshot`] or subscribe to the
//! state watch channel and the event bus.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use lifeline_bus::{EventBus, EventEnvelope, QueueReason, ResilienceEvent};
use lifeline_core::{
    BackendHealth, Clock, HealthProbe, LifelineError, QueueStore, QueuedAction, ResilienceState,
    SyncStatus, SystemClock,
};
use lifeline_security::sanitize_text;
use serde::Serialize;
use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::queue::ActionQueue;
use crate::replay::{DrainOutcome, ExecutorRegistry, ReplayEngine};
use crate::settings::ResilienceSettings;
use crate::signal::{ConnectivitySignals, ErrorWindow};
use crate::state::{ConnectivityInputs, derive_resilience_state};
use crate::support::{
    ConnectivityDiagnostics, Diagnostics, ReportOutcome, SUPPORT_REPORT_KIND,
    SupportReportPayload, SupportReportRequest, build_payload,
};
use crate::telemetry::Telemetry;

/// Everything the presentation layer needs in one read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResilienceSnapshot {
    pub state: ResilienceState,
    pub queue_count: usize,
    pub is_online: bool,
    pub backend_health: BackendHealth,
    pub probe_failures: u32,
    pub degraded_by_errors: bool,
    pub degraded_dismissed: bool,
    pub has_incident: bool,
    pub show_recovered_until: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
    pub last_sync_error: Option<String>,
    pub last_healthy_at: Option<DateTime<Utc>>,
}

struct CoreInner {
    signals: ConnectivitySignals,
    has_incident: bool,
    degraded_dismissed: bool,
    show_recovered_until: Option<DateTime<Utc>>,
    queue_count: usize,
    state: ResilienceState,
    sync_status: SyncStatus,
    last_sync_error: Option<String>,
    last_healthy_at: Option<DateTime<Utc>>,
    route: Option<String>,
    next_drain_at: Option<Instant>,
    drain_requested: bool,
}

impl CoreInner {
    fn inputs(&mut self, now: DateTime<Utc>) -> ConnectivityInputs {
        ConnectivityInputs {
            is_online: self.signals.is_online(),
            backend_health: self.signals.backend_health(),
            probe_failures: self.signals.probe_failures(),
            outage_threshold: self.signals.outage_threshold(),
            has_incident: self.has_incident,
            queue_count: self.queue_count,
            degraded_by_errors: self.signals.degraded_by_errors(now),
            degraded_dismissed: self.degraded_dismissed,
            show_recovered_until: self.show_recovered_until,
        }
    }

    /// Earliest wall-clock moment at which the derived state may change on
    /// its own (recovered window closing, error burst ageing out).
    fn refresh_at(&self) -> Option<DateTime<Utc>> {
        [self.show_recovered_until, self.signals.errors_elevated_until()]
            .into_iter()
            .flatten()
            .min()
    }
}

pub struct ResilienceCore {
    user_id: String,
    settings: ResilienceSettings,
    clock: Arc<dyn Clock>,
    probe: Arc<dyn HealthProbe>,
    queue: Arc<ActionQueue>,
    engine: ReplayEngine,
    telemetry: Arc<Telemetry>,
    inner: Mutex<CoreInner>,
    state_tx: watch::Sender<ResilienceState>,
    wake: Notify,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ResilienceCore {
    pub fn builder(user_id: impl Into<String>) -> ResilienceCoreBuilder {
        ResilienceCoreBuilder::new(user_id)
    }

    fn lock(&self) -> MutexGuard<'_, CoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn settings(&self) -> &ResilienceSettings {
        &self.settings
    }

    pub fn state(&self) -> ResilienceState {
        self.lock().state
    }

    pub fn queue_count(&self) -> usize {
        self.lock().queue_count
    }

    pub fn snapshot(&self) -> ResilienceSnapshot {
        let now = self.clock.now();
        let mut inner = self.lock();
        let inputs = inner.inputs(now);
        ResilienceSnapshot {
            state: inner.state,
            queue_count: inputs.queue_count,
            is_online: inputs.is_online,
            backend_health: inputs.backend_health,
            probe_failures: inputs.probe_failures,
            degraded_by_errors: inputs.degraded_by_errors,
            degraded_dismissed: inputs.degraded_dismissed,
            has_incident: inputs.has_incident,
            show_recovered_until: inputs.show_recovered_until,
            sync_status: inner.sync_status,
            last_sync_error: inner.last_sync_error.clone(),
            last_healthy_at: inner.last_healthy_at,
        }
    }

    /// Receiver that always holds the latest derived state.
    pub fn watch_state(&self) -> watch::Receiver<ResilienceState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.telemetry.bus().subscribe()
    }

    /// Whether callers should enqueue writes instead of attempting them.
    pub fn should_queue_writes(&self) -> bool {
        self.state().blocks_replay()
    }

    pub fn recent_fingerprints(&self) -> Vec<String> {
        self.telemetry.recent_fingerprints()
    }

    /// Recompute the derived state from the current inputs.
    pub fn refresh(&self) -> ResilienceState {
        let now = self.clock.now();
        let mut inner = self.lock();

        if inner.show_recovered_until.is_some_and(|until| now >= until) {
            inner.show_recovered_until = None;
        }

        let provisional = derive_resilience_state(&inner.inputs(now), now);
        if provisional.is_impaired() {
            inner.has_incident = true;
        }

        let conditions_clear = inner.signals.is_online()
            && inner.signals.backend_health() == BackendHealth::Healthy
            && !inner.signals.degraded_by_errors(now);
        let recovered = inner.has_incident && inner.queue_count == 0 && conditions_clear;
        if recovered {
            inner.has_incident = false;
            let window = TimeDelta::from_std(self.settings.recovered_window)
                .unwrap_or(TimeDelta::zero());
            inner.show_recovered_until = now.checked_add_signed(window);
            self.telemetry.emit(ResilienceEvent::QueueRecovered);
        }

        let inputs = inner.inputs(now);
        let next = derive_resilience_state(&inputs, now);
        let prev = inner.state;
        if next != prev {
            inner.state = next;
            if next == ResilienceState::Healthy {
                inner.last_healthy_at = Some(now);
            }
            let improved = matches!(next, ResilienceState::Recovering | ResilienceState::Healthy);
            if prev.is_impaired() && improved && inputs.queue_count > 0 {
                inner.drain_requested = true;
            }
            self.telemetry.record_transition(prev, next, &inputs);
            self.state_tx.send_replace(next);
        }
        drop(inner);

        if next != prev || recovered {
            self.wake.notify_one();
        }
        next
    }

    /// Apply an OS online/offline event. Coming online probes immediately.
    pub async fn set_online(&self, online: bool) -> ResilienceState {
        let changed = {
            let mut inner = self.lock();
            let changed = inner.signals.set_online(online);
            if changed && online {
                inner.degraded_dismissed = false;
            }
            changed
        };
        if changed {
            info!(online, "device connectivity changed");
        }

        let state = self.refresh();
        if changed && online {
            self.run_probe().await;
            return self.state();
        }
        state
    }

    /// Probe the backend once and fold the result into the inputs.
    ///
    /// Skipped while offline.
    pub async fn run_probe(&self) -> BackendHealth {
        let online = self.lock().signals.is_online();
        if !online {
            debug!("offline, skipping health probe");
            return BackendHealth::Unknown;
        }

        let timeout = self.settings.probe_timeout;
        let result = match tokio::time::timeout(timeout, self.probe.probe()).await {
            Ok(result) => result,
            Err(_) => Err(LifelineError::Timeout { duration: timeout }),
        };

        let (health, failures) = {
            let mut inner = self.lock();
            if !inner.signals.is_online() {
                return BackendHealth::Unknown;
            }
            let before = inner.signals.backend_health();
            let health = inner.signals.record_probe(&result);
            if health == BackendHealth::Healthy && before != BackendHealth::Healthy {
                inner.degraded_dismissed = false;
            }
            (health, inner.signals.probe_failures())
        };

        match &result {
            Ok(resp) => debug!(
                status = resp.status,
                latency_ms = u64::try_from(resp.latency.as_millis()).unwrap_or(u64::MAX),
                backend_health = %health,
                probe_failures = failures,
                "health probe completed"
            ),
            Err(e) if health == BackendHealth::Down => {
                warn!(error = %e, probe_failures = failures, "health probe failed, backend down")
            }
            Err(e) => debug!(error = %e, probe_failures = failures, "health probe failed"),
        }

        self.refresh();
        health
    }

    /// Record a failed foreground request for error-rate degradation and
    /// diagnostics. Returns the sanitized fingerprint.
    pub fn report_api_failure(&self, message: &str, context: Option<&serde_json::Value>) -> String {
        let fingerprint = self.telemetry.record_fingerprint(message, context);
        let now = self.clock.now();
        self.lock().signals.record_error(now);
        debug!(fingerprint = %fingerprint, "foreground request failed");
        self.refresh();
        self.wake.notify_one();
        fingerprint
    }

    pub fn dismiss_degraded(&self) -> ResilienceState {
        self.lock().degraded_dismissed = true;
        info!("degraded banner dismissed");
        self.refresh()
    }

    /// Remember the current route for diagnostics (sanitized on entry).
    pub fn set_route(&self, route: &str) {
        self.lock().route = Some(sanitize_text(route));
    }

    /// Queue a mutation for later replay.
    pub async fn queue_action(
        &self,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<QueuedAction, LifelineError> {
        self.queue_with_id(Uuid::new_v4(), kind, payload).await
    }

    async fn queue_with_id(
        &self,
        id: Uuid,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<QueuedAction, LifelineError> {
        let action = self
            .queue
            .enqueue_with_id(&self.user_id, id, kind, payload)
            .await?;
        self.sync_queue_count().await?;
        {
            let mut inner = self.lock();
            if inner.next_drain_at.is_none() {
                inner.next_drain_at = Some(Instant::now() + self.settings.poll_interval);
            }
        }
        self.refresh();
        self.wake.notify_one();
        Ok(action)
    }

    /// The user's queued actions, oldest first.
    pub async fn list_actions(&self) -> Result<Vec<QueuedAction>, LifelineError> {
        self.queue.list(&self.user_id).await
    }

    /// User-driven removal of a queued action.
    pub async fn discard_action(&self, id: Uuid) -> Result<QueuedAction, LifelineError> {
        let action = self.queue.discard(&self.user_id, id).await?;
        self.sync_queue_count().await?;
        self.refresh();
        Ok(action)
    }

    /// Drain the queue now. Coalesced into a no-op while a drain is running.
    pub async fn retry_now(&self) -> Result<DrainOutcome, LifelineError> {
        self.drain().await
    }

    async fn sync_queue_count(&self) -> Result<usize, LifelineError> {
        let count = self.queue.count(&self.user_id).await?;
        self.lock().queue_count = count;
        Ok(count)
    }

    async fn drain(&self) -> Result<DrainOutcome, LifelineError> {
        {
            let mut inner = self.lock();
            inner.drain_requested = false;
            if inner.queue_count > 0 && !inner.state.blocks_replay() {
                inner.sync_status = SyncStatus::Syncing;
            }
        }

        let result = self.engine.drain(&self.user_id).await;
        let count = self.sync_queue_count().await;

        {
            let poll = Instant::now() + self.settings.poll_interval;
            let mut inner = self.lock();
            let pending = count.as_ref().map(|c| *c > 0).unwrap_or(true);
            match &result {
                Ok(DrainOutcome::Empty) => {
                    if inner.sync_status == SyncStatus::Syncing {
                        inner.sync_status = SyncStatus::Idle;
                    }
                    inner.next_drain_at = pending.then_some(poll);
                }
                Ok(DrainOutcome::Drained { .. }) => {
                    inner.sync_status = SyncStatus::Success;
                    inner.last_sync_error = None;
                    inner.next_drain_at = pending.then_some(poll);
                }
                Ok(DrainOutcome::Halted { .. }) => {
                    inner.sync_status = SyncStatus::Idle;
                    inner.next_drain_at = pending.then_some(poll);
                }
                Ok(DrainOutcome::Backoff { error, delay, .. }) => {
                    inner.sync_status = SyncStatus::Error;
                    inner.last_sync_error = Some(error.clone());
                    inner.next_drain_at = Some(Instant::now() + *delay);
                }
                Ok(DrainOutcome::AlreadyRunning) => {}
                Err(e) => {
                    inner.sync_status = SyncStatus::Error;
                    inner.last_sync_error = Some(sanitize_text(&e.to_string()));
                    inner.next_drain_at = Some(poll);
                }
            }
        }

        self.refresh();
        self.wake.notify_one();
        count?;
        result
    }

    /// Assemble a sanitized support report from the current diagnostics.
    pub fn build_support_report(
        &self,
        request: &SupportReportRequest,
    ) -> Result<SupportReportPayload, LifelineError> {
        let snapshot = self.snapshot();
        let route = self.lock().route.clone();
        let client = &self.settings.client;
        let diagnostics = Diagnostics {
            app_version: client.app_version.clone(),
            platform: client.platform.clone(),
            route,
            auth_state: "authenticated".to_string(),
            connectivity: ConnectivityDiagnostics {
                is_online: snapshot.is_online,
                resilience_state: snapshot.state,
                backend_health: snapshot.backend_health,
            },
            queue_depth: snapshot.queue_count,
            recent_error_fingerprints: self.telemetry.recent_fingerprints(),
            user_agent: client.user_agent.clone(),
            captured_at: self.clock.now(),
        };
        build_payload(request, diagnostics)
    }

    /// Submit a support report, queueing it when the backend is unreachable
    /// or submission fails.
    pub async fn report_issue(
        &self,
        request: &SupportReportRequest,
    ) -> Result<ReportOutcome, LifelineError> {
        let payload = self.build_support_report(request)?;
        let correlation_id = payload.correlation_id;
        let value =
            serde_json::to_value(&payload).map_err(|e| LifelineError::Internal(e.to_string()))?;

        if self.state().blocks_replay() {
            return self
                .queue_report(value, correlation_id, QueueReason::Unreachable)
                .await;
        }

        let Some(executor) = self.engine.registry().get(SUPPORT_REPORT_KIND) else {
            warn!("no support report executor registered");
            return self
                .queue_report(value, correlation_id, QueueReason::SubmitFailed)
                .await;
        };

        let mut action = QueuedAction::new(
            &self.user_id,
            SUPPORT_REPORT_KIND,
            value.clone(),
            self.clock.now(),
        );
        action.id = correlation_id;

        let timeout = self.engine.attempt_timeout();
        let result = match tokio::time::timeout(timeout, executor.execute(&action)).await {
            Ok(result) => result,
            Err(_) => Err(LifelineError::Timeout { duration: timeout }),
        };

        match result {
            Ok(()) => {
                self.telemetry.emit(ResilienceEvent::SupportReportSubmitted {
                    correlation_id: correlation_id.to_string(),
                });
                Ok(ReportOutcome::Submitted { correlation_id })
            }
            Err(e) => {
                self.report_api_failure(
                    &e.to_string(),
                    Some(&serde_json::json!({ "source": "support_report_submit" })),
                );
                self.queue_report(value, correlation_id, QueueReason::SubmitFailed)
                    .await
            }
        }
    }

    async fn queue_report(
        &self,
        payload: serde_json::Value,
        correlation_id: Uuid,
        reason: QueueReason,
    ) -> Result<ReportOutcome, LifelineError> {
        let action = self
            .queue_with_id(correlation_id, SUPPORT_REPORT_KIND, payload)
            .await?;
        self.telemetry.emit(ResilienceEvent::SupportReportQueued {
            correlation_id: correlation_id.to_string(),
            reason,
        });
        Ok(ReportOutcome::Queued {
            correlation_id,
            action_id: action.id,
        })
    }

    /// Spawn the probe loop and the drain scheduler.
    pub fn start(self: &Arc<Self>) {
        let probe_core = Arc::clone(self);
        let probe_task = tokio::spawn(async move { probe_core.probe_loop().await });
        let drain_core = Arc::clone(self);
        let drain_task = tokio::spawn(async move { drain_core.schedule_loop().await });
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([probe_task, drain_task]);
        info!(user_id = %self.user_id, "resilience core started");
    }

    /// Stop background tasks and close the store.
    pub async fn shutdown(&self) -> Result<(), LifelineError> {
        self.cancel.cancel();
        let tasks = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        self.queue.store().close().await?;
        info!("resilience core stopped");
        Ok(())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn probe_loop(&self) {
        let mut ticker = tokio::time::interval(self.settings.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.run_probe() => {}
            }
        }
    }

    async fn schedule_loop(&self) {
        loop {
            let (requested, next_drain, refresh_at) = {
                let mut inner = self.lock();
                (
                    std::mem::take(&mut inner.drain_requested),
                    inner.next_drain_at,
                    inner.refresh_at(),
                )
            };

            let due = next_drain.is_some_and(|at| at <= Instant::now());
            if requested || due {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    result = self.drain() => {
                        if let Err(e) = result {
                            warn!(error = %e, "scheduled drain failed");
                        }
                    }
                }
                continue;
            }

            let refresh_deadline = refresh_at.map(|at| {
                let remaining = (at - self.clock.now()).to_std().unwrap_or(Duration::ZERO);
                Instant::now() + remaining
            });
            let deadline = [next_drain, refresh_deadline].into_iter().flatten().min();

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = sleep_until(deadline) => {
                    self.refresh();
                }
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Assembles a [`ResilienceCore`] from its collaborators.
pub struct ResilienceCoreBuilder {
    user_id: String,
    settings: ResilienceSettings,
    store: Option<Arc<dyn QueueStore>>,
    probe: Option<Arc<dyn HealthProbe>>,
    registry: ExecutorRegistry,
    clock: Arc<dyn Clock>,
    bus: EventBus,
    online: bool,
}

impl ResilienceCoreBuilder {
    fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            settings: ResilienceSettings::default(),
            store: None,
            probe: None,
            registry: ExecutorRegistry::new(),
            clock: Arc::new(SystemClock),
            bus: EventBus::default(),
            online: true,
        }
    }

    pub fn settings(mut self, settings: ResilienceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn executors(mut self, registry: ExecutorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// Initial OS reachability. Defaults to online.
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Initialize the store and derive the initial state.
    ///
    /// Actions left over from a previous run count as an open incident, so
    /// the core starts in `recovering` and drains them right away.
    pub async fn build(self) -> Result<Arc<ResilienceCore>, LifelineError> {
        if self.user_id.trim().is_empty() {
            return Err(LifelineError::Config("user id must not be empty".to_string()));
        }
        let store = self
            .store
            .ok_or_else(|| LifelineError::Config("a queue store is required".to_string()))?;
        let probe = self
            .probe
            .ok_or_else(|| LifelineError::Config("a health probe is required".to_string()))?;

        store.initialize().await?;

        let settings = self.settings;
        let telemetry = Arc::new(Telemetry::new(
            self.bus,
            Arc::clone(&self.clock),
            settings.max_fingerprints,
            settings.fingerprint_max_len,
        ));
        let queue = Arc::new(ActionQueue::new(
            store,
            Arc::clone(&self.clock),
            Arc::clone(&telemetry),
            settings.queue.clone(),
        ));
        let (state_tx, state_rx) = watch::channel(ResilienceState::Healthy);
        let engine = ReplayEngine::new(
            Arc::clone(&queue),
            self.registry,
            settings.backoff,
            settings.attempt_timeout,
            Arc::clone(&telemetry),
            state_rx,
        );

        let queue_count = queue.count(&self.user_id).await?;
        let mut signals = ConnectivitySignals::new(
            settings.outage_threshold,
            settings.degraded_latency,
            ErrorWindow::new(settings.error_window, settings.error_threshold),
        );
        signals.set_online(self.online);

        let core = Arc::new(ResilienceCore {
            user_id: self.user_id,
            clock: self.clock,
            probe,
            queue,
            engine,
            telemetry,
            inner: Mutex::new(CoreInner {
                signals,
                has_incident: queue_count > 0,
                degraded_dismissed: false,
                show_recovered_until: None,
                queue_count,
                state: ResilienceState::Healthy,
                sync_status: SyncStatus::Idle,
                last_sync_error: None,
                last_healthy_at: None,
                route: None,
                next_drain_at: None,
                drain_requested: queue_count > 0,
            }),
            state_tx,
            wake: Notify::new(),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            settings,
        });
        core.refresh();
        debug!(user_id = %core.user_id, queue_count, "resilience core built");
        Ok(core)
    }
}
