// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP collaborators for the resilience core: a health probe and a replay
//! executor, both built on a TLS-enforcing reqwest client.

pub mod client;
pub mod executor;
pub mod probe;

pub use client::BackendClient;
pub use executor::{HttpActionExecutor, IDEMPOTENCY_HEADER};
pub use probe::HttpHealthProbe;
