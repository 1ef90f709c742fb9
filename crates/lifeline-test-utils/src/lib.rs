// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Lifeline integration tests.
//!
//! Provides in-memory adapters and a harness for fast, deterministic tests
//! without a database or a network.
//!
//! # Components
//!
//! - [`MemoryQueueStore`] - in-memory [`QueueStore`](lifeline_core::QueueStore)
//! - [`ScriptedProbe`] - health probe returning pre-configured results
//! - [`ScriptedExecutor`] - replay executor returning pre-configured results
//! - [`ManualClock`] - clock that only moves when told to
//! - [`TestHarness`] - a fully wired [`ResilienceCore`](lifeline_resilience::ResilienceCore)

pub mod clock;
pub mod harness;
pub mod mock_executor;
pub mod mock_probe;
pub mod mock_store;

pub use clock::ManualClock;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_executor::ScriptedExecutor;
pub use mock_probe::ScriptedProbe;
pub use mock_store::MemoryQueueStore;
