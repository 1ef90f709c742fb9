// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client resilience for Lifeline.
//!
//! Derives a single user-facing [`ResilienceState`](lifeline_core::ResilienceState)
//! from device reachability, backend health probes and foreground error
//! rates; persists user mutations while the backend is unreachable; and
//! replays them in order once it comes back.
//!
//! # Components
//!
//! - [`derive_resilience_state`] - pure state derivation
//! - [`ConnectivitySignals`] - probe and error-rate bookkeeping
//! - [`ActionQueue`] - durable FIFO with capacity and TTL policy
//! - [`ReplayEngine`] - ordered, single-flight replay with backoff
//! - [`Telemetry`] - structured events, banners and error fingerprints
//! - [`ResilienceCore`] - orchestration and background scheduling

pub mod backoff;
pub mod core;
pub mod queue;
pub mod replay;
pub mod settings;
pub mod signal;
pub mod state;
pub mod support;
pub mod telemetry;

pub use backoff::BackoffPolicy;
pub use core::{ResilienceCore, ResilienceCoreBuilder, ResilienceSnapshot};
pub use queue::{ActionQueue, Claim, QueuePolicy};
pub use replay::{DrainOutcome, ExecutorRegistry, ReplayEngine};
pub use settings::{ClientInfo, ResilienceSettings};
pub use signal::{ConnectivitySignals, ErrorWindow};
pub use state::{ConnectivityInputs, derive_resilience_state};
pub use support::{
    ConnectivityDiagnostics, Diagnostics, ReportCategory, ReportOutcome, SUPPORT_REPORT_KIND,
    SupportReportPayload, SupportReportRequest, build_payload,
};
pub use telemetry::{FingerprintLog, Telemetry};
