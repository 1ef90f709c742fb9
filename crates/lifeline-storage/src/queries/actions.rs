// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRUD operations for the `queued_actions` table.

use chrono::{DateTime, SecondsFormat, Utc};
use lifeline_core::{LifelineError, QueuedAction};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use crate::database::{Database, map_tr_err};

const SELECT_COLUMNS: &str = "SELECT id, user_id, kind, payload, attempt_count,
            created_at, last_attempt_at, last_error
     FROM queued_actions";

/// Timestamps are stored as fixed-width RFC 3339 UTC text so that string
/// order equals chronological order.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_action(row: &Row<'_>) -> rusqlite::Result<QueuedAction> {
    let id: String = row.get(0)?;
    let payload: String = row.get(3)?;
    let attempt_count: i64 = row.get(4)?;
    let created_at: String = row.get(5)?;
    let last_attempt_at: Option<String> = row.get(6)?;

    Ok(QueuedAction {
        id: Uuid::parse_str(&id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        payload: serde_json::from_str(&payload)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        attempt_count: u32::try_from(attempt_count).unwrap_or(u32::MAX),
        created_at: parse_ts(5, &created_at)?,
        last_attempt_at: last_attempt_at
            .as_deref()
            .map(|raw| parse_ts(6, raw))
            .transpose()?,
        last_error: row.get(7)?,
    })
}

/// Insert a new action.
pub async fn insert_action(db: &Database, action: &QueuedAction) -> Result<(), LifelineError> {
    let payload = serde_json::to_string(&action.payload).map_err(LifelineError::storage)?;
    let id = action.id.to_string();
    let user_id = action.user_id.clone();
    let kind = action.kind.clone();
    let attempt_count = i64::from(action.attempt_count);
    let created_at = format_ts(&action.created_at);
    let last_attempt_at = action.last_attempt_at.as_ref().map(format_ts);
    let last_error = action.last_error.clone();

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO queued_actions
                    (id, user_id, kind, payload, attempt_count, created_at, last_attempt_at, last_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    user_id,
                    kind,
                    payload,
                    attempt_count,
                    created_at,
                    last_attempt_at,
                    last_error
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All actions for a user, oldest first.
pub async fn list_actions(db: &Database, user_id: &str) -> Result<Vec<QueuedAction>, LifelineError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<QueuedAction>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY created_at ASC, seq ASC"
            ))?;
            let rows = stmt.query_map(params![user_id], row_to_action)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one action by id.
pub async fn get_action(db: &Database, id: Uuid) -> Result<Option<QueuedAction>, LifelineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<QueuedAction>, rusqlite::Error> {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                row_to_action,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Persist the attempt bookkeeping of an existing action.
pub async fn update_attempt(db: &Database, action: &QueuedAction) -> Result<(), LifelineError> {
    let id = action.id.to_string();
    let attempt_count = i64::from(action.attempt_count);
    let last_attempt_at = action.last_attempt_at.as_ref().map(format_ts);
    let last_error = action.last_error.clone();

    let updated = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE queued_actions
                 SET attempt_count = ?2, last_attempt_at = ?3, last_error = ?4
                 WHERE id = ?1",
                params![id, attempt_count, last_attempt_at, last_error],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if updated == 0 {
        return Err(LifelineError::ActionNotFound { id: action.id });
    }
    Ok(())
}

/// Delete an action. Returns whether a row was removed.
pub async fn delete_action(db: &Database, id: Uuid) -> Result<bool, LifelineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute("DELETE FROM queued_actions WHERE id = ?1", params![id])?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of actions queued for a user.
pub async fn count_actions(db: &Database, user_id: &str) -> Result<usize, LifelineError> {
    let user_id = user_id.to_string();
    let count = db
        .connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM queued_actions WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(usize::try_from(count).unwrap_or(0))
}
