// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend health probe trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::LifelineError;

/// Raw outcome of a probe request that produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    /// HTTP-style status code reported by the backend.
    pub status: u16,
    /// Time from request start to response.
    pub latency: Duration,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A lightweight request used only to assess backend health.
///
/// Transport failures are returned as `Err` and are counted exactly like a
/// non-success status.
#[async_trait]
pub trait HealthProbe: Send + Sync + 'static {
    async fn probe(&self) -> Result<ProbeResponse, LifelineError>;
}
