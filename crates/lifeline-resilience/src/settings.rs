// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime tuning derived from [`LifelineConfig`].

use std::time::Duration;

use chrono::TimeDelta;
use lifeline_config::LifelineConfig;

use crate::backoff::BackoffPolicy;
use crate::queue::QueuePolicy;

/// Client metadata attached to support reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub app_version: String,
    pub platform: String,
    pub user_agent: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            user_agent: format!("lifeline/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResilienceSettings {
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub outage_threshold: u32,
    pub degraded_latency: Duration,
    pub error_threshold: usize,
    pub error_window: Duration,
    pub recovered_window: Duration,
    pub queue: QueuePolicy,
    pub backoff: BackoffPolicy,
    pub attempt_timeout: Duration,
    pub poll_interval: Duration,
    pub max_fingerprints: usize,
    pub fingerprint_max_len: usize,
    pub client: ClientInfo,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self::from(&LifelineConfig::default())
    }
}

fn secs_delta(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

impl From<&LifelineConfig> for ResilienceSettings {
    fn from(config: &LifelineConfig) -> Self {
        Self {
            probe_interval: config.probe.interval(),
            probe_timeout: config.probe.timeout(),
            outage_threshold: config.probe.outage_threshold,
            degraded_latency: config.probe.degraded_latency(),
            error_threshold: config.degradation.error_threshold,
            error_window: config.degradation.error_window(),
            recovered_window: config.degradation.recovered_window(),
            queue: QueuePolicy {
                max_entries: config.queue.max_entries,
                eviction_min_age: secs_delta(config.queue.eviction_min_age_secs),
                ttl: config.queue.ttl_secs.map(secs_delta),
            },
            backoff: BackoffPolicy {
                initial: config.replay.initial_delay(),
                factor: config.replay.backoff_factor,
                max: config.replay.max_delay(),
            },
            attempt_timeout: config.replay.attempt_timeout(),
            poll_interval: config.replay.poll_interval(),
            max_fingerprints: config.telemetry.max_fingerprints,
            fingerprint_max_len: config.telemetry.fingerprint_max_len,
            client: ClientInfo {
                app_version: config.client.app_version.clone(),
                platform: config.client.platform.clone(),
                user_agent: config.client.user_agent.clone(),
            },
        }
    }
}
