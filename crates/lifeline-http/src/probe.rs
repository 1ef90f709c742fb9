// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health probe against the backend's lightweight health endpoint.

use std::time::Instant;

use async_trait::async_trait;
use lifeline_config::LifelineConfig;
use lifeline_core::{HealthProbe, LifelineError, ProbeResponse};
use tracing::debug;

use crate::client::BackendClient;

#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: BackendClient,
    url: String,
}

impl HttpHealthProbe {
    pub fn new(client: BackendClient, health_path: &str) -> Result<Self, LifelineError> {
        let url = client.endpoint(health_path)?;
        Ok(Self { client, url })
    }

    /// Probe configured from `[backend]`, `[probe]` and `[security]`.
    pub fn from_config(config: &LifelineConfig) -> Result<Self, LifelineError> {
        let client = BackendClient::new(
            &config.backend,
            &config.security,
            &config.client.user_agent,
            config.probe.timeout(),
        )?;
        Self::new(client, &config.backend.health_path)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    /// Any HTTP response is `Ok`; classification of the status is left to
    /// the caller. Transport failures and timeouts are errors.
    async fn probe(&self) -> Result<ProbeResponse, LifelineError> {
        let started = Instant::now();
        let response = self
            .client
            .http()
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LifelineError::Probe {
                message: format!("health request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        let latency = started.elapsed();
        let status = response.status().as_u16();
        debug!(
            status,
            latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            "health endpoint answered"
        );
        Ok(ProbeResponse { status, latency })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use lifeline_config::model::{BackendConfig, SecurityConfig};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe_for(server: &MockServer, api_key: Option<&str>, timeout: Duration) -> HttpHealthProbe {
        let backend = BackendConfig {
            base_url: server.uri(),
            api_key: api_key.map(str::to_string),
            ..BackendConfig::default()
        };
        let client = BackendClient::new(
            &backend,
            &SecurityConfig { require_tls: true },
            "lifeline/test",
            timeout,
        )
        .unwrap();
        HttpHealthProbe::new(client, &backend.health_path).unwrap()
    }

    #[tokio::test]
    async fn healthy_endpoint_reports_status_and_latency() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/health"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let probe = probe_for(&server, Some("anon-key"), Duration::from_secs(5));
        let resp = probe.probe().await.unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.is_success());
    }

    #[tokio::test]
    async fn server_errors_are_returned_as_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resp = probe_for(&server, None, Duration::from_secs(5))
            .probe()
            .await
            .unwrap();
        assert_eq!(resp.status, 503);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn slow_endpoint_times_out_as_probe_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/health"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = probe_for(&server, None, Duration::from_millis(200))
            .probe()
            .await
            .unwrap_err();
        assert!(matches!(err, LifelineError::Probe { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_probe_error() {
        let backend = BackendConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..BackendConfig::default()
        };
        let client = BackendClient::new(
            &backend,
            &SecurityConfig { require_tls: true },
            "lifeline/test",
            Duration::from_secs(2),
        )
        .unwrap();
        let probe = HttpHealthProbe::new(client, "/health").unwrap();
        assert!(probe.probe().await.is_err());
    }
}
