// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry queue operations.
//!
//! One row per ledgered event (`event_id` is unique). Attempt counts only
//! move forward, and a dead-lettered row is never rescheduled.

use rusqlite::{OptionalExtension, Row, params};
use stowage_core::StowageError;

use crate::database::Database;
use crate::models::{RetryEntry, RetryWrite};

const SELECT_COLUMNS: &str = "id, event_id, subscriber_id, payload, error_message, attempt_count,
     next_retry_at, dead_lettered, dead_lettered_at, resolved_at, created_at, updated_at";

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<RetryEntry> {
    Ok(RetryEntry {
        id: row.get(0)?,
        event_id: row.get(1)?,
        subscriber_id: row.get(2)?,
        payload: row.get(3)?,
        error_message: row.get(4)?,
        attempt_count: row.get(5)?,
        next_retry_at: row.get(6)?,
        dead_lettered: row.get(7)?,
        dead_lettered_at: row.get(8)?,
        resolved_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Insert or advance a pending retry.
///
/// An existing row is only updated when `write.attempt` is greater than its
/// stored count and it is neither dead-lettered nor resolved. Returns whether
/// a row was written.
pub async fn upsert_scheduled(
    db: &Database,
    write: &RetryWrite,
    next_retry_at: &str,
) -> Result<bool, StowageError> {
    let write = write.clone();
    let next_retry_at = next_retry_at.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT INTO retry_queue
                    (event_id, subscriber_id, payload, error_message, attempt_count,
                     next_retry_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(event_id) DO UPDATE SET
                    error_message = excluded.error_message,
                    attempt_count = excluded.attempt_count,
                    next_retry_at = excluded.next_retry_at,
                    updated_at = excluded.updated_at
                 WHERE excluded.attempt_count > retry_queue.attempt_count
                   AND retry_queue.dead_lettered = 0
                   AND retry_queue.resolved_at IS NULL",
                params![
                    write.event_id,
                    write.subscriber_id,
                    write.payload,
                    write.error_message,
                    write.attempt,
                    next_retry_at,
                    write.now,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dead-letter an event, inserting the row if it was never queued.
///
/// Already dead-lettered rows are left untouched. Returns whether a row was written.
pub async fn mark_dead_lettered(db: &Database, write: &RetryWrite) -> Result<bool, StowageError> {
    let write = write.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT INTO retry_queue
                    (event_id, subscriber_id, payload, error_message, attempt_count,
                     next_retry_at, dead_lettered, dead_lettered_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, 1, ?6, ?6, ?6)
                 ON CONFLICT(event_id) DO UPDATE SET
                    error_message = excluded.error_message,
                    attempt_count = MAX(retry_queue.attempt_count, excluded.attempt_count),
                    next_retry_at = NULL,
                    dead_lettered = 1,
                    dead_lettered_at = excluded.dead_lettered_at,
                    updated_at = excluded.updated_at
                 WHERE retry_queue.dead_lettered = 0",
                params![
                    write.event_id,
                    write.subscriber_id,
                    write.payload,
                    write.error_message,
                    write.attempt,
                    write.now,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Entries whose retry time has come, oldest first.
pub async fn due_entries(
    db: &Database,
    now: &str,
    limit: u32,
) -> Result<Vec<RetryEntry>, StowageError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM retry_queue
                 WHERE next_retry_at <= ?1 AND dead_lettered = 0 AND resolved_at IS NULL
                 ORDER BY next_retry_at ASC, id ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![now, limit], row_to_entry)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark an entry as successfully re-processed.
pub async fn mark_resolved(db: &Database, id: i64, now: &str) -> Result<(), StowageError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE retry_queue SET resolved_at = ?2, next_retry_at = NULL, updated_at = ?2
                 WHERE id = ?1 AND resolved_at IS NULL",
                params![id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dead-lettered entries, most recent first.
pub async fn dead_letters(db: &Database, limit: u32) -> Result<Vec<RetryEntry>, StowageError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM retry_queue
                 WHERE dead_lettered = 1
                 ORDER BY dead_lettered_at DESC, id DESC
                 LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], row_to_entry)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Entries still waiting for another attempt.
pub async fn pending_count(db: &Database) -> Result<u64, StowageError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM retry_queue
                 WHERE dead_lettered = 0 AND resolved_at IS NULL",
                [],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .map(|n| n.max(0) as u64)
        .map_err(crate::database::map_tr_err)
}

/// The queue row for a ledgered event, if any.
pub async fn get_by_event_id(
    db: &Database,
    event_id: i64,
) -> Result<Option<RetryEntry>, StowageError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM retry_queue WHERE event_id = ?1"),
                params![event_id],
                row_to_entry,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
