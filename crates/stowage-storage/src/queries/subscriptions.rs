// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription record operations.
//!
//! Records are created on first event or first status query and never
//! deleted. Writes are last-applied-wins.

use rusqlite::{OptionalExtension, Row, params};
use stowage_core::{Plan, StateTransition, StowageError, SubscriptionStatus};

use super::parse_column;
use crate::database::Database;
use crate::models::{SubscriptionRecord, SubscriptionStats};

const SELECT_COLUMNS: &str =
    "subscriber_id, status, plan, renews_at, created_at, updated_at";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<SubscriptionRecord> {
    let plan: Option<String> = row.get(2)?;
    Ok(SubscriptionRecord {
        subscriber_id: row.get(0)?,
        status: parse_column::<SubscriptionStatus>(1, row.get(1)?)?,
        plan: plan.map(|p| parse_column::<Plan>(2, p)).transpose()?,
        renews_at: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Fetch a subscriber's record.
pub async fn get_subscription(
    db: &Database,
    subscriber_id: &str,
) -> Result<Option<SubscriptionRecord>, StowageError> {
    let subscriber_id = subscriber_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM subscriptions WHERE subscriber_id = ?1"),
                params![subscriber_id],
                row_to_record,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a subscriber's record, creating a `free` one if none exists.
pub async fn get_or_create_subscription(
    db: &Database,
    subscriber_id: &str,
    now: &str,
) -> Result<SubscriptionRecord, StowageError> {
    let subscriber_id = subscriber_id.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO subscriptions (subscriber_id, status, created_at, updated_at)
                 VALUES (?1, 'free', ?2, ?2)
                 ON CONFLICT(subscriber_id) DO NOTHING",
                params![subscriber_id, now],
            )?;
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM subscriptions WHERE subscriber_id = ?1"),
                params![subscriber_id],
                row_to_record,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn upsert_record(
    conn: &rusqlite::Connection,
    subscriber_id: &str,
    transition: &StateTransition,
    now: &str,
) -> rusqlite::Result<SubscriptionRecord> {
    conn.query_row(
        &format!(
            "INSERT INTO subscriptions
                (subscriber_id, status, plan, renews_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(subscriber_id) DO UPDATE SET
                status = excluded.status,
                plan = excluded.plan,
                renews_at = excluded.renews_at,
                updated_at = excluded.updated_at
             RETURNING {SELECT_COLUMNS}"
        ),
        params![
            subscriber_id,
            transition.status.to_string(),
            transition.plan.map(|p| p.to_string()),
            transition.renews_at,
            now
        ],
        row_to_record,
    )
}

/// Apply a classified transition, creating the record if needed.
///
/// Status, plan and renewal date are overwritten unconditionally.
#[cfg(test)]
pub async fn apply_transition(
    db: &Database,
    subscriber_id: &str,
    transition: &StateTransition,
    now: &str,
) -> Result<SubscriptionRecord, StowageError> {
    let subscriber_id = subscriber_id.to_string();
    let transition = transition.clone();
    let now = now.to_string();
    db.connection()
        .call(move |conn| upsert_record(conn, &subscriber_id, &transition, &now))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply the transition for ledgered event `event_id` and mark the event
/// processed, in one transaction.
pub async fn apply_event_transition(
    db: &Database,
    event_id: i64,
    subscriber_id: &str,
    transition: &StateTransition,
    now: &str,
) -> Result<SubscriptionRecord, StowageError> {
    let subscriber_id = subscriber_id.to_string();
    let transition = transition.clone();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let record = upsert_record(&tx, &subscriber_id, &transition, &now)?;
            tx.execute(
                "UPDATE webhook_events SET processed_at = ?2
                 WHERE id = ?1 AND processed_at IS NULL",
                params![event_id, now],
            )?;
            tx.commit()?;
            Ok(record)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Count subscriptions by status and by plan.
///
/// Every status appears in `by_status`, with zero when no row has it.
pub async fn subscription_stats(db: &Database) -> Result<SubscriptionStats, StowageError> {
    let (by_status, by_plan) = db
        .connection()
        .call(|conn| -> Result<_, rusqlite::Error> {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM subscriptions GROUP BY status")?;
            let by_status = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT plan, COUNT(*) FROM subscriptions WHERE plan IS NOT NULL GROUP BY plan",
            )?;
            let by_plan = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok((by_status, by_plan))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    let mut stats = SubscriptionStats::default();
    for status in SubscriptionStatus::ALL {
        stats.by_status.insert(status.to_string(), 0);
    }
    for (status, count) in by_status {
        let count = u64::try_from(count).unwrap_or_default();
        stats.total += count;
        stats.by_status.insert(status, count);
    }
    for (plan, count) in by_plan {
        stats
            .by_plan
            .insert(plan, u64::try_from(count).unwrap_or_default());
    }
    Ok(stats)
}
