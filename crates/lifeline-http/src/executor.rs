// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replay executor that POSTs queued actions to the backend.
//!
//! The action id is sent as `Idempotency-Key`, so a replay that reached the
//! backend but whose response was lost can be retried safely.

use async_trait::async_trait;
use lifeline_config::LifelineConfig;
use lifeline_core::{ActionExecutor, LifelineError, QueuedAction};
use lifeline_security::truncate;
use serde::Serialize;
use tracing::debug;

use crate::client::BackendClient;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Error bodies beyond this many characters are cut.
const MAX_BODY_CHARS: usize = 200;

#[derive(Serialize)]
struct ReplayBody<'a> {
    kind: &'a str,
    payload: &'a serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct HttpActionExecutor {
    client: BackendClient,
    replay_path: String,
}

impl HttpActionExecutor {
    /// `replay_path` may contain `{kind}`, substituted per action.
    pub fn new(client: BackendClient, replay_path: impl Into<String>) -> Self {
        Self {
            client,
            replay_path: replay_path.into(),
        }
    }

    /// Executor configured from `[backend]`, `[replay]` and `[security]`.
    pub fn from_config(config: &LifelineConfig) -> Result<Self, LifelineError> {
        let client = BackendClient::new(
            &config.backend,
            &config.security,
            &config.client.user_agent,
            config.replay.attempt_timeout(),
        )?;
        Ok(Self::new(client, config.backend.replay_path.clone()))
    }

    fn url_for(&self, kind: &str) -> Result<String, LifelineError> {
        if kind.is_empty()
            || !kind
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(LifelineError::Validation(format!(
                "action kind `{kind}` is not URL safe"
            )));
        }
        self.client
            .endpoint(&self.replay_path.replace("{kind}", kind))
    }
}

#[async_trait]
impl ActionExecutor for HttpActionExecutor {
    async fn execute(&self, action: &QueuedAction) -> Result<(), LifelineError> {
        let url = self.url_for(&action.kind)?;
        let body = ReplayBody {
            kind: &action.kind,
            payload: &action.payload,
        };

        let response = self
            .client
            .http()
            .post(&url)
            .header(IDEMPOTENCY_HEADER, action.id.to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| LifelineError::Replay {
                message: format!("replay request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(action_id = %action.id, kind = %action.kind, status = %status, "replay response received");
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(LifelineError::replay(format!(
            "backend returned {status}: {}",
            truncate(text.trim(), MAX_BODY_CHARS)
        )))
    }
}
