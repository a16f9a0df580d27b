// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Windowed failure counting and threshold alerts.
//!
//! Counters live in the database so several service instances share a window.
//! Alerts are structured `error!` events named `ThresholdExceeded`; log
//! shipping turns them into pages.

use chrono::{DateTime, TimeZone, Utc};
use stowage_storage::Database;
use stowage_storage::queries::failure_metrics;
use stowage_storage::timestamp::format_timestamp;
use tracing::{error, warn};

/// Failure kinds tracked per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureMetric {
    Auth,
    Validation,
    Processing,
}

impl FailureMetric {
    /// Stored metric name.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureMetric::Auth => "webhook_auth_failure",
            FailureMetric::Validation => "webhook_validation_failure",
            FailureMetric::Processing => "webhook_processing_failure",
        }
    }
}

/// Floor `now` to the start of its window, aligned to the Unix epoch.
pub fn window_start(now: DateTime<Utc>, window_secs: u64) -> DateTime<Utc> {
    let width = i64::try_from(window_secs.max(1)).unwrap_or(i64::MAX);
    let floored = now.timestamp().div_euclid(width) * width;
    Utc.timestamp_opt(floored, 0).single().unwrap_or(now)
}

/// Counts failures and raises alerts when a window crosses its threshold.
#[derive(Debug, Clone)]
pub struct FailureMonitor {
    db: Database,
    auth_threshold: u32,
    failure_threshold: u32,
    window_secs: u64,
}

impl FailureMonitor {
    pub fn new(db: Database, auth_threshold: u32, failure_threshold: u32, window_secs: u64) -> Self {
        Self {
            db,
            auth_threshold,
            failure_threshold,
            window_secs,
        }
    }

    /// Alert threshold for a metric.
    pub fn threshold(&self, metric: FailureMetric) -> u32 {
        match metric {
            FailureMetric::Auth => self.auth_threshold,
            FailureMetric::Validation | FailureMetric::Processing => self.failure_threshold,
        }
    }

    /// Count one failure. Returns the window count, or `None` when the
    /// counter could not be written; that failure is logged and never
    /// propagated to the caller's response.
    pub async fn record(&self, metric: FailureMetric, now: DateTime<Utc>) -> Option<u32> {
        stowage_prometheus::record_webhook_failure(metric.as_str());

        let window = format_timestamp(window_start(now, self.window_secs));
        let count = match failure_metrics::increment(&self.db, metric.as_str(), &window).await {
            Ok(count) => count,
            Err(e) => {
                warn!(metric = metric.as_str(), error = %e, "failed to record failure metric");
                return None;
            }
        };

        let threshold = self.threshold(metric);
        if count > threshold {
            error!(
                alert = "ThresholdExceeded",
                metric = metric.as_str(),
                window_start = %window,
                count,
                threshold,
                "failure threshold exceeded"
            );
        }
        Some(count)
    }

    /// Drop windows that ended more than a day before `now`.
    pub async fn prune(&self, now: DateTime<Utc>) -> Result<usize, stowage_core::StowageError> {
        let cutoff = format_timestamp(now - chrono::Duration::days(1));
        failure_metrics::prune_before(&self.db, &cutoff).await
    }
}
