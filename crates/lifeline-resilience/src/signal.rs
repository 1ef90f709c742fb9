// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw connectivity signals: OS reachability, probe classification and the
//! foreground error-rate window.
//!
//! Nothing here decides the resilience state; it only maintains inputs.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lifeline_core::{BackendHealth, LifelineError, ProbeResponse};

/// Sliding window of recent foreground request failures.
#[derive(Debug, Clone)]
pub struct ErrorWindow {
    failures: VecDeque<DateTime<Utc>>,
    window: chrono::Duration,
    threshold: usize,
}

impl ErrorWindow {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            failures: VecDeque::new(),
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
            threshold,
        }
    }

    pub fn record(&mut self, at: DateTime<Utc>) {
        self.failures.push_back(at);
        self.prune(at);
    }

    /// Whether at least `threshold` failures fall inside the window ending at `now`.
    pub fn is_elevated(&mut self, now: DateTime<Utc>) -> bool {
        self.prune(now);
        self.threshold > 0 && self.failures.len() >= self.threshold
    }

    /// When the error rate drops back below the threshold, if nothing new fails.
    pub fn elevated_until(&self) -> Option<DateTime<Utc>> {
        if self.threshold == 0 || self.failures.len() < self.threshold {
            return None;
        }
        let idx = self.failures.len() - self.threshold;
        self.failures
            .get(idx)
            .and_then(|at| at.checked_add_signed(self.window))
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some(front) = self.failures.front() {
            if now - *front >= self.window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Mutable connectivity signal state.
#[derive(Debug, Clone)]
pub struct ConnectivitySignals {
    is_online: bool,
    backend_health: BackendHealth,
    probe_failures: u32,
    outage_threshold: u32,
    degraded_latency: Duration,
    errors: ErrorWindow,
}

impl ConnectivitySignals {
    pub fn new(outage_threshold: u32, degraded_latency: Duration, errors: ErrorWindow) -> Self {
        Self {
            is_online: true,
            backend_health: BackendHealth::Unknown,
            probe_failures: 0,
            outage_threshold,
            degraded_latency,
            errors,
        }
    }

    pub fn is_online(&self) -> bool {
        self.is_online
    }

    pub fn backend_health(&self) -> BackendHealth {
        self.backend_health
    }

    pub fn probe_failures(&self) -> u32 {
        self.probe_failures
    }

    pub fn outage_threshold(&self) -> u32 {
        self.outage_threshold
    }

    /// Apply an OS reachability event. Returns whether anything changed.
    ///
    /// Going offline pauses probing, so the last classification is dropped.
    pub fn set_online(&mut self, online: bool) -> bool {
        if self.is_online == online {
            return false;
        }
        self.is_online = online;
        if !online {
            self.backend_health = BackendHealth::Unknown;
        }
        true
    }

    /// Classify a probe result and update the failure counter.
    ///
    /// Transport errors and timeouts count exactly like non-2xx responses.
    pub fn record_probe(&mut self, result: &Result<ProbeResponse, LifelineError>) -> BackendHealth {
        match result {
            Ok(resp) if resp.is_success() => {
                self.probe_failures = 0;
                self.backend_health = if resp.latency > self.degraded_latency {
                    BackendHealth::Degraded
                } else {
                    BackendHealth::Healthy
                };
            }
            _ => {
                self.probe_failures = self.probe_failures.saturating_add(1);
                self.backend_health = if self.probe_failures >= self.outage_threshold {
                    BackendHealth::Down
                } else {
                    BackendHealth::Degraded
                };
            }
        }
        self.backend_health
    }

    pub fn record_error(&mut self, at: DateTime<Utc>) {
        self.errors.record(at);
    }

    pub fn degraded_by_errors(&mut self, now: DateTime<Utc>) -> bool {
        self.errors.is_elevated(now)
    }

    pub fn errors_elevated_until(&self) -> Option<DateTime<Utc>> {
        self.errors.elevated_until()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signals() -> ConnectivitySignals {
        ConnectivitySignals::new(
            3,
            Duration::from_millis(2000),
            ErrorWindow::new(Duration::from_secs(120), 3),
        )
    }

    fn ok(status: u16, ms: u64) -> Result<ProbeResponse, LifelineError> {
        Ok(ProbeResponse {
            status,
            latency: Duration::from_millis(ms),
        })
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn fast_success_is_healthy_and_resets_failures() {
        let mut s = signals();
        s.record_probe(&ok(503, 10));
        assert_eq!(s.probe_failures(), 1);
        assert_eq!(s.record_probe(&ok(200, 40)), BackendHealth::Healthy);
        assert_eq!(s.probe_failures(), 0);
    }

    #[test]
    fn slow_success_is_degraded_without_counting_failure() {
        let mut s = signals();
        assert_eq!(s.record_probe(&ok(204, 2500)), BackendHealth::Degraded);
        assert_eq!(s.probe_failures(), 0);
    }

    #[test]
    fn failures_escalate_to_down_at_threshold() {
        let mut s = signals();
        assert_eq!(s.record_probe(&ok(500, 5)), BackendHealth::Degraded);
        assert_eq!(
            s.record_probe(&Err(LifelineError::probe("dns failure"))),
            BackendHealth::Degraded
        );
        assert_eq!(
            s.record_probe(&Err(LifelineError::Timeout {
                duration: Duration::from_secs(8)
            })),
            BackendHealth::Down
        );
        assert_eq!(s.probe_failures(), 3);
    }

    #[test]
    fn going_offline_resets_health_to_unknown() {
        let mut s = signals();
        s.record_probe(&ok(200, 5));
        assert!(s.set_online(false));
        assert!(!s.set_online(false));
        assert_eq!(s.backend_health(), BackendHealth::Unknown);
        assert!(s.set_online(true));
    }

    #[test]
    fn error_window_needs_threshold_inside_window() {
        let mut w = ErrorWindow::new(Duration::from_secs(120), 3);
        w.record(t0());
        w.record(t0() + chrono::Duration::seconds(10));
        assert!(!w.is_elevated(t0() + chrono::Duration::seconds(10)));
        w.record(t0() + chrono::Duration::seconds(20));
        assert!(w.is_elevated(t0() + chrono::Duration::seconds(20)));
        assert_eq!(w.elevated_until(), Some(t0() + chrono::Duration::seconds(120)));
        assert!(!w.is_elevated(t0() + chrono::Duration::seconds(120)));
    }
}
