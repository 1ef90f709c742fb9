// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring of the production collaborators into a [`ResilienceCore`].

use std::sync::Arc;

use lifeline_config::LifelineConfig;
use lifeline_core::LifelineError;
use lifeline_http::{HttpActionExecutor, HttpHealthProbe};
use lifeline_resilience::{ExecutorRegistry, ResilienceCore, ResilienceSettings};
use lifeline_storage::SqliteQueueStore;
use tracing::info;

/// The user every command acts for.
pub fn resolve_user(config: &LifelineConfig) -> Result<String, LifelineError> {
    config
        .client
        .user_id
        .clone()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| {
            LifelineError::Config(
                "no user configured; set client.user_id or pass --user".to_string(),
            )
        })
}

/// SQLite store, HTTP probe and HTTP executor for every action kind.
pub async fn build_core(config: &LifelineConfig) -> Result<Arc<ResilienceCore>, LifelineError> {
    let user_id = resolve_user(config)?;
    let store = Arc::new(SqliteQueueStore::new(config.storage.clone()));
    let probe = Arc::new(HttpHealthProbe::from_config(config)?);
    let executor = Arc::new(HttpActionExecutor::from_config(config)?);

    info!(
        user_id = %user_id,
        health_url = %probe.url(),
        database = %config.storage.database_path,
        "assembling resilience core"
    );

    ResilienceCore::builder(user_id)
        .settings(ResilienceSettings::from(config))
        .store(store)
        .probe(probe)
        .executors(ExecutorRegistry::new().with_fallback(executor))
        .build()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeline_config::model::StorageConfig;
    use lifeline_core::ResilienceState;
    use lifeline_resilience::DrainOutcome;
    use lifeline_test_utils::{ScriptedExecutor, ScriptedProbe};

    #[test]
    fn missing_user_is_a_config_error() {
        let err = resolve_user(&LifelineConfig::default()).unwrap_err();
        assert!(matches!(err, LifelineError::Config(_)));
    }

    #[test]
    fn blank_user_is_rejected() {
        let mut config = LifelineConfig::default();
        config.client.user_id = Some("  ".into());
        assert!(resolve_user(&config).is_err());
    }

    #[tokio::test]
    async fn queue_survives_a_restart_and_drains_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            database_path: dir.path().join("queue.db").to_string_lossy().to_string(),
            wal_mode: true,
        };

        let first = ResilienceCore::builder("u1")
            .store(Arc::new(SqliteQueueStore::new(storage.clone())))
            .probe(Arc::new(ScriptedProbe::new()))
            .online(false)
            .build()
            .await
            .unwrap();
        let a = first.queue_action("complete_habit", serde_json::json!({"n": 1})).await.unwrap();
        let b = first.queue_action("log_mood", serde_json::json!({"n": 2})).await.unwrap();
        first.shutdown().await.unwrap();
        drop(first);

        let executor = Arc::new(ScriptedExecutor::new());
        let second = ResilienceCore::builder("u1")
            .store(Arc::new(SqliteQueueStore::new(storage)))
            .probe(Arc::new(ScriptedProbe::new()))
            .executors(ExecutorRegistry::new().with_fallback(executor.clone()))
            .build()
            .await
            .unwrap();

        assert_eq!(second.state(), ResilienceState::Recovering);
        assert_eq!(second.queue_count(), 2);
        assert_eq!(
            second.retry_now().await.unwrap(),
            DrainOutcome::Drained { replayed: 2 }
        );
        assert_eq!(executor.executed_ids(), vec![a.id, b.id]);
        second.shutdown().await.unwrap();
    }
}
