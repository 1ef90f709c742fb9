// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health probe with pre-configured results.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lifeline_core::{HealthProbe, LifelineError, ProbeResponse};
use tokio::sync::Mutex;

type Step = Result<ProbeResponse, String>;

/// Pops scripted results in FIFO order, then repeats the fallback.
///
/// The fallback starts as a fast `200`.
#[derive(Debug)]
pub struct ScriptedProbe {
    steps: Mutex<VecDeque<Step>>,
    fallback: Mutex<Step>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(ok_response(200, Duration::from_millis(20)))),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn push_ok(&self, status: u16, latency: Duration) {
        self.steps
            .lock()
            .await
            .push_back(Ok(ok_response(status, latency)));
    }

    pub async fn push_err(&self, message: &str) {
        self.steps.lock().await.push_back(Err(message.to_string()));
    }

    /// Result returned once the script runs out.
    pub async fn set_fallback_ok(&self, status: u16, latency: Duration) {
        *self.fallback.lock().await = Ok(ok_response(status, latency));
    }

    pub async fn set_fallback_err(&self, message: &str) {
        *self.fallback.lock().await = Err(message.to_string());
    }

    /// Sleep before answering, to exercise probe timeouts.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().await = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn ok_response(status: u16, latency: Duration) -> ProbeResponse {
    ProbeResponse { status, latency }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self) -> Result<ProbeResponse, LifelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let step = match self.steps.lock().await.pop_front() {
            Some(step) => step,
            None => self.fallback.lock().await.clone(),
        };
        step.map_err(LifelineError::probe)
    }
}
