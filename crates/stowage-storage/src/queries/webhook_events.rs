// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only billing event ledger.
//!
//! The unique constraint on `dedup_key` is the only concurrency control for
//! ingestion: whichever insert commits first owns the event.

use rusqlite::{OptionalExtension, Row, params};
use stowage_core::StowageError;

use crate::database::Database;
use crate::models::{NewWebhookEvent, UnprocessedEvent};

const UNPROCESSED_FILTER: &str = "w.processed_at IS NULL
     AND w.received_at <= ?1
     AND NOT EXISTS (SELECT 1 FROM retry_queue r WHERE r.event_id = w.id)";

fn row_to_unprocessed(row: &Row<'_>) -> rusqlite::Result<UnprocessedEvent> {
    Ok(UnprocessedEvent {
        id: row.get(0)?,
        subscriber_id: row.get(1)?,
        payload: row.get(2)?,
        received_at: row.get(3)?,
    })
}

/// Insert the event unless its dedup key is already ledgered.
///
/// Returns the new row id, or `None` for a duplicate.
pub async fn insert_if_absent(
    db: &Database,
    event: &NewWebhookEvent,
) -> Result<Option<i64>, StowageError> {
    let event = event.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "INSERT INTO webhook_events
                    (dedup_key, provider_event_id, subscriber_id, event_type, product_id,
                     entitlement_id, original_transaction_id, transaction_at_ms,
                     expiration_at_ms, payload, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(dedup_key) DO NOTHING
                 RETURNING id",
                params![
                    event.dedup_key,
                    event.provider_event_id,
                    event.subscriber_id,
                    event.event_type,
                    event.product_id,
                    event.entitlement_id,
                    event.original_transaction_id,
                    event.transaction_at_ms,
                    event.expiration_at_ms,
                    event.payload,
                    event.received_at,
                ],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Look up a ledgered event id by dedup key.
pub async fn find_by_dedup_key(db: &Database, dedup_key: &str) -> Result<Option<i64>, StowageError> {
    let dedup_key = dedup_key.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id FROM webhook_events WHERE dedup_key = ?1",
                params![dedup_key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record that a ledgered event was applied or skipped.
///
/// The first timestamp wins.
pub async fn mark_processed(db: &Database, id: i64, now: &str) -> Result<(), StowageError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE webhook_events SET processed_at = ?2
                 WHERE id = ?1 AND processed_at IS NULL",
                params![id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The event behind `dedup_key`, if it was ledgered at or before
/// `received_before` and never processed or queued.
pub async fn find_unprocessed(
    db: &Database,
    dedup_key: &str,
    received_before: &str,
) -> Result<Option<UnprocessedEvent>, StowageError> {
    let dedup_key = dedup_key.to_string();
    let received_before = received_before.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT w.id, w.subscriber_id, w.payload, w.received_at
                     FROM webhook_events w
                     WHERE w.dedup_key = ?2 AND {UNPROCESSED_FILTER}"
                ),
                params![received_before, dedup_key],
                row_to_unprocessed,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Unprocessed, unqueued events ledgered at or before `received_before`, oldest first.
pub async fn unprocessed(
    db: &Database,
    received_before: &str,
    limit: u32,
) -> Result<Vec<UnprocessedEvent>, StowageError> {
    let received_before = received_before.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT w.id, w.subscriber_id, w.payload, w.received_at
                 FROM webhook_events w
                 WHERE {UNPROCESSED_FILTER}
                 ORDER BY w.id ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![received_before, limit], row_to_unprocessed)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of ledgered events for a subscriber.
pub async fn count_for_subscriber(db: &Database, subscriber_id: &str) -> Result<u64, StowageError> {
    let subscriber_id = subscriber_id.to_string();
    let count: i64 = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM webhook_events WHERE subscriber_id = ?1",
                params![subscriber_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(u64::try_from(count).unwrap_or_default())
}
