// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Stowage metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "stowage_webhook_events_total",
        "Billing webhook events by ingestion outcome"
    );
    describe_counter!(
        "stowage_webhook_failures_total",
        "Billing webhooks rejected before ledgering, by failure metric"
    );
    describe_counter!(
        "stowage_retry_scheduled_total",
        "Billing events scheduled for deferred processing"
    );
    describe_counter!(
        "stowage_retry_resolved_total",
        "Queued billing events that applied on retry"
    );
    describe_counter!(
        "stowage_retry_dead_lettered_total",
        "Billing events that exhausted their retries"
    );
    describe_counter!(
        "stowage_lookups_total",
        "Barcode lookups by source and outcome"
    );
    describe_counter!(
        "stowage_provider_requests_total",
        "Product provider calls by provider and outcome"
    );
    describe_histogram!(
        "stowage_lookup_latency_seconds",
        "End-to-end barcode lookup latency in seconds"
    );
    describe_gauge!(
        "stowage_retry_pending",
        "Retry entries still awaiting processing after the last sweep"
    );
}

/// Record a webhook ingestion outcome (applied, duplicate, skipped, queued).
pub fn record_webhook_event(outcome: &'static str) {
    metrics::counter!("stowage_webhook_events_total", "outcome" => outcome).increment(1);
}

/// Record a rejected webhook under its failure metric name.
pub fn record_webhook_failure(metric: &'static str) {
    metrics::counter!("stowage_webhook_failures_total", "metric" => metric).increment(1);
}

pub fn record_retry_scheduled() {
    metrics::counter!("stowage_retry_scheduled_total").increment(1);
}

pub fn record_retry_resolved() {
    metrics::counter!("stowage_retry_resolved_total").increment(1);
}

pub fn record_dead_lettered() {
    metrics::counter!("stowage_retry_dead_lettered_total").increment(1);
}

/// Record a finished lookup. `source` is the product source or `none`.
pub fn record_lookup(source: &str, outcome: &'static str) {
    metrics::counter!(
        "stowage_lookups_total",
        "source" => source.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record one provider call (hit, miss, error).
pub fn record_provider_request(provider: &str, outcome: &'static str) {
    metrics::counter!(
        "stowage_provider_requests_total",
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record end-to-end lookup latency.
pub fn record_lookup_latency(seconds: f64) {
    metrics::histogram!("stowage_lookup_latency_seconds").record(seconds);
}

/// Set the number of retries still pending.
pub fn set_pending_retries(count: f64) {
    metrics::gauge!("stowage_retry_pending").set(count);
}
