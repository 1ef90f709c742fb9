// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits for the resilience subsystem.
//!
//! Every seam that talks to the outside world (persistence, the health
//! probe, replay executors, wall-clock time) is a trait so the core can be
//! driven deterministically in tests.

pub mod clock;
pub mod executor;
pub mod probe;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use executor::ActionExecutor;
pub use probe::{HealthProbe, ProbeResponse};
pub use store::QueueStore;
