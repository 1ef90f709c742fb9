// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express,
//! such as well-formed backend URLs, positive intervals and sane backoff factors.

use url::Url;

use crate::diagnostic::ConfigError;
use crate::model::LifelineConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &LifelineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid =
        |key: &str, message: String| errors.push(ConfigError::validation(key, message));

    match Url::parse(&config.backend.base_url) {
        Ok(url) => {
            let local = matches!(
                url.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("::1") | Some("[::1]")
            );
            if config.security.require_tls && url.scheme() != "https" && !local {
                invalid(
                    "backend.base_url",
                    format!(
                        "`{}` must use https while security.require_tls is set",
                        config.backend.base_url
                    ),
                );
            }
        }
        Err(e) => invalid(
            "backend.base_url",
            format!("`{}` is not a valid URL: {e}", config.backend.base_url),
        ),
    }

    for (key, path) in [
        ("backend.health_path", &config.backend.health_path),
        ("backend.replay_path", &config.backend.replay_path),
    ] {
        if !path.starts_with('/') {
            invalid(key, format!("must start with `/`, got `{path}`"));
        }
    }

    if config
        .client
        .user_id
        .as_deref()
        .is_some_and(|u| u.trim().is_empty())
    {
        invalid("client.user_id", "must not be empty when set".into());
    }

    for (key, value) in [
        ("probe.interval_secs", config.probe.interval_secs),
        ("probe.timeout_secs", config.probe.timeout_secs),
        ("probe.outage_threshold", u64::from(config.probe.outage_threshold)),
        ("degradation.error_threshold", config.degradation.error_threshold as u64),
        ("queue.max_entries", config.queue.max_entries as u64),
        ("replay.initial_delay_ms", config.replay.initial_delay_ms),
        ("replay.attempt_timeout_secs", config.replay.attempt_timeout_secs),
        ("replay.poll_interval_secs", config.replay.poll_interval_secs),
        ("telemetry.fingerprint_max_len", config.telemetry.fingerprint_max_len as u64),
    ] {
        if value == 0 {
            invalid(key, "must be at least 1".into());
        }
    }

    if config.queue.ttl_secs == Some(0) {
        invalid("queue.ttl_secs", "must be at least 1 when set".into());
    }

    if !config.replay.backoff_factor.is_finite() || config.replay.backoff_factor < 1.0 {
        invalid(
            "replay.backoff_factor",
            format!(
                "must be a finite number >= 1.0, got {}",
                config.replay.backoff_factor
            ),
        );
    }

    if config.replay.max_delay_secs.saturating_mul(1000) < config.replay.initial_delay_ms {
        invalid(
            "replay.max_delay_secs",
            format!(
                "{}s is below replay.initial_delay_ms ({}ms)",
                config.replay.max_delay_secs, config.replay.initial_delay_ms
            ),
        );
    }

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path", "must not be empty".into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
