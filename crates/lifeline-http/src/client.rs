// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared HTTP plumbing for talking to the backend.
//!
//! [`BackendClient`] owns a TLS-enforcing reqwest client with the backend's
//! authentication headers preinstalled, and resolves endpoint paths against
//! the configured base URL.

use std::time::Duration;

use lifeline_config::model::{BackendConfig, SecurityConfig};
use lifeline_core::LifelineError;
use lifeline_security::{build_secure_client_with_headers, validate_url};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    require_tls: bool,
}

impl BackendClient {
    /// Build a client whose requests time out after `timeout`.
    pub fn new(
        backend: &BackendConfig,
        security: &SecurityConfig,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, LifelineError> {
        let base_url = backend.base_url.trim_end_matches('/').to_string();
        validate_url(&base_url, security.require_tls)?;

        let mut headers = HeaderMap::new();
        if let Some(key) = backend.api_key.as_deref().filter(|k| !k.is_empty()) {
            let mut apikey = HeaderValue::from_str(key)
                .map_err(|e| LifelineError::Config(format!("invalid API key header value: {e}")))?;
            apikey.set_sensitive(true);
            let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| LifelineError::Config(format!("invalid API key header value: {e}")))?;
            bearer.set_sensitive(true);
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }

        let client = build_secure_client_with_headers(security, user_agent, timeout, headers)?;
        Ok(Self {
            client,
            base_url,
            require_tls: security.require_tls,
        })
    }

    /// Absolute URL for `path`, checked against the transport policy.
    pub fn endpoint(&self, path: &str) -> Result<String, LifelineError> {
        let url = format!("{}{}", self.base_url, path);
        validate_url(&url, self.require_tls)?;
        Ok(url)
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
