// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replay executor with pre-configured results.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use lifeline_core::{ActionExecutor, LifelineError, QueuedAction};
use uuid::Uuid;

type Hook = Arc<dyn Fn(&QueuedAction) + Send + Sync>;

#[derive(Default)]
struct Script {
    results: VecDeque<Result<(), String>>,
    /// Per-action scripted results, consulted before `results`.
    by_id: Vec<(Uuid, VecDeque<Result<(), String>>)>,
    executed: Vec<QueuedAction>,
    delay: Option<Duration>,
    hook: Option<Hook>,
}

/// Records every action it is asked to execute and answers from a script.
///
/// Unscripted calls succeed.
#[derive(Default)]
pub struct ScriptedExecutor {
    script: Mutex<Script>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_ok(&self) {
        self.script().results.push_back(Ok(()));
    }

    pub fn push_err(&self, message: &str) {
        self.script().results.push_back(Err(message.to_string()));
    }

    /// Script the results for one specific action.
    pub fn script_for(&self, id: Uuid, results: Vec<Result<(), String>>) {
        self.script().by_id.push((id, results.into()));
    }

    /// Sleep before answering, to exercise attempt timeouts and interruption.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.script().delay = delay;
    }

    /// Run `hook` at the start of every execution.
    pub fn on_execute(&self, hook: impl Fn(&QueuedAction) + Send + Sync + 'static) {
        self.script().hook = Some(Arc::new(hook));
    }

    /// Actions in the order they were executed, retries included.
    pub fn executed(&self) -> Vec<QueuedAction> {
        self.script().executed.clone()
    }

    pub fn executed_ids(&self) -> Vec<Uuid> {
        self.script().executed.iter().map(|a| a.id).collect()
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn execute(&self, action: &QueuedAction) -> Result<(), LifelineError> {
        let (hook, delay, result) = {
            let mut script = self.script();
            script.executed.push(action.clone());
            let scripted = script
                .by_id
                .iter_mut()
                .find(|(id, _)| *id == action.id)
                .and_then(|(_, results)| results.pop_front());
            let result = match scripted {
                Some(result) => result,
                None => script.results.pop_front().unwrap_or(Ok(())),
            };
            (script.hook.clone(), script.delay, result)
        };

        if let Some(hook) = hook {
            hook(action);
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result.map_err(LifelineError::replay)
    }
}
