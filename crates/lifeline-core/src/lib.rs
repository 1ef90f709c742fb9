// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Lifeline client resilience subsystem.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Lifeline workspace. Persistence backends,
//! health probes and replay executors implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LifelineError;
pub use types::{BackendHealth, QueuedAction, ResilienceState, SyncStatus};

pub use traits::{ActionExecutor, Clock, HealthProbe, ProbeResponse, QueueStore, SystemClock};
