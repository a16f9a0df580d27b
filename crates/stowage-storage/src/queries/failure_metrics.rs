// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Windowed failure counters.

use rusqlite::params;
use stowage_core::StowageError;

use crate::database::Database;

/// Atomically add one failure to `(metric, window_start)` and return the new count.
pub async fn increment(
    db: &Database,
    metric: &str,
    window_start: &str,
) -> Result<u32, StowageError> {
    let metric = metric.to_string();
    let window_start = window_start.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "INSERT INTO failure_metrics (metric, window_start, failure_count)
                 VALUES (?1, ?2, 1)
                 ON CONFLICT(metric, window_start)
                 DO UPDATE SET failure_count = failure_count + 1
                 RETURNING failure_count",
                params![metric, window_start],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete windows that started before `cutoff`. Returns rows removed.
pub async fn prune_before(db: &Database, cutoff: &str) -> Result<usize, StowageError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM failure_metrics WHERE window_start < ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::OptionalExtension;

    use crate::queries::test_support::setup_db;

    const W0: &str = "2026-01-01T00:00:00.000Z";
    const W1: &str = "2026-01-01T00:05:00.000Z";

    /// Current count for a window, zero when nothing was recorded.
    async fn window_count(
        db: &Database,
        metric: &str,
        window_start: &str,
    ) -> Result<u32, StowageError> {
        let metric = metric.to_string();
        let window_start = window_start.to_string();
        let count: Option<u32> = db
            .connection()
            .call(move |conn| {
                conn.query_row(
                    "SELECT failure_count FROM failure_metrics
                     WHERE metric = ?1 AND window_start = ?2",
                    params![metric, window_start],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(count.unwrap_or(0))
    }

    #[tokio::test]
    async fn increment_counts_per_window() {
        let (db, _dir) = setup_db().await;

        assert_eq!(increment(&db, "webhook_auth_failure", W0).await.unwrap(), 1);
        assert_eq!(increment(&db, "webhook_auth_failure", W0).await.unwrap(), 2);
        assert_eq!(increment(&db, "webhook_auth_failure", W1).await.unwrap(), 1);
        assert_eq!(increment(&db, "webhook_validation_failure", W0).await.unwrap(), 1);

        assert_eq!(window_count(&db, "webhook_auth_failure", W0).await.unwrap(), 2);
        assert_eq!(window_count(&db, "unknown", W0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let (db, _dir) = setup_db().await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                increment(&db, "webhook_auth_failure", W0).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(window_count(&db, "webhook_auth_failure", W0).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn prune_removes_old_windows() {
        let (db, _dir) = setup_db().await;
        increment(&db, "m", W0).await.unwrap();
        increment(&db, "m", W1).await.unwrap();

        assert_eq!(prune_before(&db, W1).await.unwrap(), 1);
        assert_eq!(window_count(&db, "m", W0).await.unwrap(), 0);
        assert_eq!(window_count(&db, "m", W1).await.unwrap(), 1);
    }
}
