// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the QueueStore trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

use lifeline_config::model::StorageConfig;
use lifeline_core::{LifelineError, QueueStore, QueuedAction};

use crate::database::Database;
use crate::queries::actions;

/// SQLite-backed action queue store.
///
/// The database is opened lazily by [`QueueStore::initialize`].
pub struct SqliteQueueStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteQueueStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, LifelineError> {
        self.db.get().ok_or_else(|| LifelineError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn initialize(&self) -> Result<(), LifelineError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| LifelineError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite queue store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), LifelineError> {
        if let Some(db) = self.db.get() {
            if self.config.wal_mode {
                db.checkpoint().await?;
            }
        }
        Ok(())
    }

    async fn insert(&self, action: &QueuedAction) -> Result<(), LifelineError> {
        actions::insert_action(self.db()?, action).await
    }

    async fn list(&self, user_id: &str) -> Result<Vec<QueuedAction>, LifelineError> {
        actions::list_actions(self.db()?, user_id).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<QueuedAction>, LifelineError> {
        actions::get_action(self.db()?, id).await
    }

    async fn update(&self, action: &QueuedAction) -> Result<(), LifelineError> {
        actions::update_attempt(self.db()?, action).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, LifelineError> {
        actions::delete_action(self.db()?, id).await
    }

    async fn count(&self, user_id: &str) -> Result<usize, LifelineError> {
        actions::count_actions(self.db()?, user_id).await
    }
}
