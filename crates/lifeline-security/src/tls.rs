// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TLS enforcement for outbound HTTP connections.
//!
//! Provides a reqwest client builder with a TLS 1.2 minimum and URL
//! validation that rejects plain-HTTP connections to remote hosts.

use std::time::Duration;

use lifeline_config::model::SecurityConfig;
use lifeline_core::LifelineError;
use reqwest::header::HeaderMap;
use tracing::error;

/// Build a reqwest::Client with security defaults and a per-request timeout.
pub fn build_secure_client(
    config: &SecurityConfig,
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::Client, LifelineError> {
    build_secure_client_with_headers(config, user_agent, timeout, HeaderMap::new())
}

/// Like [`build_secure_client`], with headers sent on every request.
pub fn build_secure_client_with_headers(
    config: &SecurityConfig,
    user_agent: &str,
    timeout: Duration,
    headers: HeaderMap,
) -> Result<reqwest::Client, LifelineError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(timeout);
    if config.require_tls {
        builder = builder.min_tls_version(reqwest::tls::Version::TLS_1_2);
    }
    builder.build().map_err(|e| {
        error!("failed to build secure HTTP client: {e}");
        LifelineError::Security(format!("failed to build secure HTTP client: {e}"))
    })
}

/// Validate a URL against the transport policy.
///
/// Localhost URLs are allowed with any scheme; remote URLs must use HTTPS
/// when `require_tls` is set.
pub fn validate_url(url: &str, require_tls: bool) -> Result<url::Url, LifelineError> {
    let parsed =
        url::Url::parse(url).map_err(|e| LifelineError::Security(format!("invalid URL: {e}")))?;

    let host = parsed.host_str().unwrap_or("");
    if !require_tls || is_localhost(host) {
        return Ok(parsed);
    }

    if parsed.scheme() != "https" {
        error!(url = %url, "TLS required for remote connections");
        return Err(LifelineError::Security(
            "TLS required for remote connections -- use HTTPS".to_string(),
        ));
    }

    Ok(parsed)
}

/// Check if a host refers to the loopback interface.
pub fn is_localhost(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "::1" | "localhost" | "[::1]") || host.starts_with("127.")
}
