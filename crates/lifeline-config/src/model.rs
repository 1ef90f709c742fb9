// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Lifeline resilience subsystem.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Lifeline configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LifelineConfig {
    /// Client identity and diagnostics metadata.
    #[serde(default)]
    pub client: ClientConfig,

    /// Backend endpoints used for probing and replay.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Health probe cadence and classification.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Error-rate degradation and recovered-banner settings.
    #[serde(default)]
    pub degradation: DegradationConfig,

    /// Action queue capacity policy.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Replay backoff and scheduling.
    #[serde(default)]
    pub replay: ReplayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Diagnostics fingerprint limits.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Transport security settings.
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Client identity and diagnostics metadata.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Authenticated user whose queue is replayed. `None` requires `--user`.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Version string attached to support reports.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Platform name attached to support reports.
    #[serde(default = "default_platform")]
    pub platform: String,

    /// User agent attached to support reports (sanitized before sending).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            log_level: default_log_level(),
            app_version: default_app_version(),
            platform: default_platform(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_platform() -> String {
    std::env::consts::OS.to_string()
}

fn default_user_agent() -> String {
    format!("lifeline/{}", env!("CARGO_PKG_VERSION"))
}

/// Backend endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the backend, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the lightweight health endpoint.
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Path actions are replayed to. `{kind}` is substituted with the action kind.
    #[serde(default = "default_replay_path")]
    pub replay_path: String,

    /// Publishable API key sent with probes and replays.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            health_path: default_health_path(),
            replay_path: default_replay_path(),
            api_key: None,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:54321".to_string()
}

fn default_health_path() -> String {
    "/auth/v1/health".to_string()
}

fn default_replay_path() -> String {
    "/functions/v1/replay/{kind}".to_string()
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    /// Seconds between probes.
    #[serde(default = "default_probe_interval_secs")]
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,

    /// Consecutive failed probes before the backend is considered in outage.
    #[serde(default = "default_outage_threshold")]
    pub outage_threshold: u32,

    /// Successful probes slower than this are classified as degraded.
    #[serde(default = "default_degraded_latency_ms")]
    pub degraded_latency_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_probe_interval_secs(),
            timeout_secs: default_probe_timeout_secs(),
            outage_threshold: default_outage_threshold(),
            degraded_latency_ms: default_degraded_latency_ms(),
        }
    }
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn degraded_latency(&self) -> Duration {
        Duration::from_millis(self.degraded_latency_ms)
    }
}

fn default_probe_interval_secs() -> u64 {
    30
}

fn default_probe_timeout_secs() -> u64 {
    8
}

fn default_outage_threshold() -> u32 {
    3
}

fn default_degraded_latency_ms() -> u64 {
    2000
}

/// Error-rate degradation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DegradationConfig {
    /// Foreground failures inside the window that mark the backend degraded.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: usize,

    /// Sliding window for counting foreground failures, in seconds.
    #[serde(default = "default_error_window_secs")]
    pub error_window_secs: u64,

    /// How long the recovered banner stays up, in milliseconds.
    #[serde(default = "default_recovered_window_ms")]
    pub recovered_window_ms: u64,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            error_threshold: default_error_threshold(),
            error_window_secs: default_error_window_secs(),
            recovered_window_ms: default_recovered_window_ms(),
        }
    }
}

impl DegradationConfig {
    pub fn error_window(&self) -> Duration {
        Duration::from_secs(self.error_window_secs)
    }

    pub fn recovered_window(&self) -> Duration {
        Duration::from_millis(self.recovered_window_ms)
    }
}

fn default_error_threshold() -> usize {
    3
}

fn default_error_window_secs() -> u64 {
    120
}

fn default_recovered_window_ms() -> u64 {
    5000
}

/// Action queue capacity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Soft cap on queued actions per user.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Only actions at least this old (seconds) may be evicted by the soft cap.
    #[serde(default = "default_eviction_min_age_secs")]
    pub eviction_min_age_secs: u64,

    /// Optional time-to-live after which queued actions are expired.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            eviction_min_age_secs: default_eviction_min_age_secs(),
            ttl_secs: None,
        }
    }
}

fn default_max_entries() -> usize {
    500
}

fn default_eviction_min_age_secs() -> u64 {
    86_400
}

/// Replay backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayConfig {
    /// Base delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Multiplier applied per attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Upper bound on the backoff delay, in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Timeout for a single replay attempt, in seconds.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Drain retry cadence while the queue is non-empty, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_secs: default_max_delay_secs(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl ReplayConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_initial_delay_ms() -> u64 {
    2000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_secs() -> u64 {
    300
}

fn default_attempt_timeout_secs() -> u64 {
    15
}

fn default_poll_interval_secs() -> u64 {
    60
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("lifeline").join("queue.db"))
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "lifeline.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// Diagnostics fingerprint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Number of recent error fingerprints kept for support reports.
    #[serde(default = "default_max_fingerprints")]
    pub max_fingerprints: usize,

    /// Maximum characters per fingerprint.
    #[serde(default = "default_fingerprint_max_len")]
    pub fingerprint_max_len: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_fingerprints: default_max_fingerprints(),
            fingerprint_max_len: default_fingerprint_max_len(),
        }
    }
}

fn default_max_fingerprints() -> usize {
    20
}

fn default_fingerprint_max_len() -> usize {
    220
}

/// Transport security configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// Require HTTPS for all non-localhost backend URLs.
    #[serde(default = "default_require_tls")]
    pub require_tls: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            require_tls: default_require_tls(),
        }
    }
}

fn default_require_tls() -> bool {
    true
}
