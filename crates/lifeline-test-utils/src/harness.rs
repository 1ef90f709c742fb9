// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end resilience tests.
//!
//! `TestHarness` wires a [`ResilienceCore`] to an in-memory store, a scripted
//! probe, a scripted executor and a manual clock, and captures every event
//! published on the bus.

use std::sync::Arc;

use lifeline_bus::{EventBus, EventEnvelope, ResilienceEvent};
use lifeline_core::{LifelineError, QueuedAction};
use lifeline_resilience::{ExecutorRegistry, ResilienceCore, ResilienceSettings};
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::clock::ManualClock;
use crate::mock_executor::ScriptedExecutor;
use crate::mock_probe::ScriptedProbe;
use crate::mock_store::MemoryQueueStore;

pub const TEST_USER: &str = "user-1";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    settings: ResilienceSettings,
    online: bool,
    records: Vec<QueuedAction>,
    with_executor: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            settings: ResilienceSettings::default(),
            online: true,
            records: Vec::new(),
            with_executor: true,
        }
    }

    pub fn with_settings(mut self, settings: ResilienceSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Start with the device offline.
    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    /// Seed the store with actions left over from an earlier session.
    pub fn with_records(mut self, records: Vec<QueuedAction>) -> Self {
        self.records = records;
        self
    }

    /// Register no executors at all.
    pub fn without_executor(mut self) -> Self {
        self.with_executor = false;
        self
    }

    pub async fn build(self) -> Result<TestHarness, LifelineError> {
        let store = Arc::new(MemoryQueueStore::with_records(self.records));
        let probe = Arc::new(ScriptedProbe::new());
        let executor = Arc::new(ScriptedExecutor::new());
        let clock = Arc::new(ManualClock::default());
        let bus = EventBus::new(1024);
        let events = bus.subscribe();

        let registry = if self.with_executor {
            ExecutorRegistry::new().with_fallback(executor.clone())
        } else {
            ExecutorRegistry::new()
        };

        let core = ResilienceCore::builder(TEST_USER)
            .settings(self.settings)
            .store(store.clone())
            .probe(probe.clone())
            .executors(registry)
            .clock(clock.clone())
            .bus(bus)
            .online(self.online)
            .build()
            .await?;

        Ok(TestHarness {
            core,
            store,
            probe,
            executor,
            clock,
            events,
        })
    }
}

/// A wired core plus handles on every fake behind it.
pub struct TestHarness {
    pub core: Arc<ResilienceCore>,
    pub store: Arc<MemoryQueueStore>,
    pub probe: Arc<ScriptedProbe>,
    pub executor: Arc<ScriptedExecutor>,
    pub clock: Arc<ManualClock>,
    events: broadcast::Receiver<EventEnvelope>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Events published since the last call.
    pub fn take_events(&mut self) -> Vec<ResilienceEvent> {
        let mut out = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(envelope) => out.push(envelope.event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        out
    }

    /// Names of the events published since the last call.
    pub fn take_event_names(&mut self) -> Vec<&'static str> {
        self.take_events().iter().map(ResilienceEvent::name).collect()
    }
}
