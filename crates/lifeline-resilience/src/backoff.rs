// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capped exponential backoff for replay retries.

use std::time::Duration;

/// Delay schedule between failed replay attempts of the same action.
///
/// The delay for an action that has failed `n` times is
/// `initial * factor^n`, capped at `max`. Overflow saturates to `max`.
///
/// ```
/// # use std::time::Duration;
/// # use lifeline_resilience::BackoffPolicy;
/// let policy = BackoffPolicy::default();
/// assert_eq!(policy.delay(1), Duration::from_secs(4));
/// assert_eq!(policy.delay(30), Duration::from_secs(300));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Base delay, returned for an attempt count of zero.
    pub initial: Duration,
    /// Growth per further failure. Validated to be finite and at least 1.
    pub factor: f64,
    /// Upper bound on any single delay.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(2),
            factor: 2.0,
            max: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    /// `min(max, initial * factor^attempt_count)`.
    pub fn delay(&self, attempt_count: u32) -> Duration {
        let exp = i32::try_from(attempt_count).unwrap_or(i32::MAX);
        let secs = self.initial.as_secs_f64() * self.factor.powi(exp);
        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}
