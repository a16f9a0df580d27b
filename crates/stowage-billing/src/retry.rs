// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry scheduling and dead-lettering for events that failed to apply.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use stowage_core::StowageError;
use stowage_storage::models::RetryWrite;
use stowage_storage::queries::retry_queue;
use stowage_storage::timestamp::format_timestamp;
use stowage_storage::Database;
use tracing::{error, info};

/// Delay before attempt N+1, indexed by N-1: 30s, 2m, 5m, 15m, 30m.
pub const BACKOFF_SCHEDULE_SECS: [i64; 5] = [30, 120, 300, 900, 1800];

/// Delay for attempts past the end of the schedule.
pub const BACKOFF_FALLBACK_SECS: i64 = 3600;

/// Backoff for the given 1-based attempt number.
pub fn backoff_delay(attempt: u32) -> Duration {
    let idx = attempt.saturating_sub(1) as usize;
    let secs = BACKOFF_SCHEDULE_SECS
        .get(idx)
        .copied()
        .unwrap_or(BACKOFF_FALLBACK_SECS);
    Duration::seconds(secs)
}

/// What happened to a failed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RetryDecision {
    Scheduled { attempt: u32, next_retry_at: String },
    DeadLettered { attempt: u32 },
}

/// A failed event to (re)schedule.
#[derive(Debug, Clone)]
pub struct FailedEvent<'a> {
    pub event_id: i64,
    pub subscriber_id: &'a str,
    pub payload: &'a str,
    pub error: &'a str,
}

/// Writes retry and dead-letter rows.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    db: Database,
    max_attempts: u32,
}

impl RetryScheduler {
    pub fn new(db: Database, max_attempts: u32) -> Self {
        Self { db, max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Schedule `attempt` for `failed`, or dead-letter it once attempts are exhausted.
    pub async fn schedule(
        &self,
        failed: FailedEvent<'_>,
        attempt: u32,
        now: DateTime<Utc>,
    ) -> Result<RetryDecision, StowageError> {
        let attempt = attempt.max(1);
        let write = RetryWrite {
            event_id: failed.event_id,
            subscriber_id: failed.subscriber_id.to_string(),
            payload: failed.payload.to_string(),
            error_message: failed.error.to_string(),
            attempt,
            now: format_timestamp(now),
        };

        if attempt > self.max_attempts {
            retry_queue::mark_dead_lettered(&self.db, &write).await?;
            stowage_prometheus::record_dead_lettered();
            error!(
                event_id = failed.event_id,
                subscriber_id = failed.subscriber_id,
                attempt,
                error = failed.error,
                "billing event dead-lettered after exhausting retries"
            );
            return Ok(RetryDecision::DeadLettered { attempt });
        }

        let next_retry_at = format_timestamp(now + backoff_delay(attempt));
        let written = retry_queue::upsert_scheduled(&self.db, &write, &next_retry_at).await?;
        if written {
            stowage_prometheus::record_retry_scheduled();
            info!(
                event_id = failed.event_id,
                subscriber_id = failed.subscriber_id,
                attempt,
                next_retry_at = %next_retry_at,
                error = failed.error,
                "billing event scheduled for retry"
            );
        } else {
            info!(
                event_id = failed.event_id,
                attempt,
                "retry entry already past this attempt, left unchanged"
            );
        }
        Ok(RetryDecision::Scheduled {
            attempt,
            next_retry_at,
        })
    }

    /// Queue a ledgered event that was never applied or queued, due at `now`.
    ///
    /// The row starts at attempt 1. Returns false when a row already exists,
    /// so only one caller claims the event.
    pub async fn requeue_now(
        &self,
        failed: FailedEvent<'_>,
        now: DateTime<Utc>,
    ) -> Result<bool, StowageError> {
        let now = format_timestamp(now);
        let write = RetryWrite {
            event_id: failed.event_id,
            subscriber_id: failed.subscriber_id.to_string(),
            payload: failed.payload.to_string(),
            error_message: failed.error.to_string(),
            attempt: 1,
            now: now.clone(),
        };
        let claimed = retry_queue::upsert_scheduled(&self.db, &write, &now).await?;
        if claimed {
            stowage_prometheus::record_retry_scheduled();
            info!(
                event_id = failed.event_id,
                subscriber_id = failed.subscriber_id,
                "unfinished billing event requeued"
            );
        }
        Ok(claimed)
    }
}
