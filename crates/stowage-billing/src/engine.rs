// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reconciliation engine: webhook ingestion, retry sweeps, and
//! subscription reads.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use stowage_config::model::{BillingConfig, RetryConfig};
use stowage_core::{
    BillingEvent, CanonicalEvent, Clock, EventClassifier, StowageError, SubscriptionRecord,
    SystemClock, WebhookEnvelope,
};
use stowage_storage::models::{NewWebhookEvent, RetryEntry, SubscriptionStats, UnprocessedEvent};
use stowage_storage::queries::{retry_queue, subscriptions, webhook_events};
use stowage_storage::timestamp::format_timestamp;
use stowage_storage::Database;
use tracing::{debug, error, info, warn};

use crate::alerting::{FailureMetric, FailureMonitor};
use crate::auth;
use crate::classifier::StatusClassifier;
use crate::dedup::dedup_key;
use crate::plans::PlanCatalog;
use crate::retry::{FailedEvent, RetryDecision, RetryScheduler};

/// Unfinished events younger than this are assumed to still be in flight.
const ORPHAN_GRACE_SECS: i64 = 30;

/// Result of ingesting one webhook.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Ledgered and applied to the subscription.
    Applied(SubscriptionRecord),
    /// Already ledgered earlier; nothing was done.
    Duplicate,
    /// Ledgered, but about an entitlement this service does not track.
    Skipped,
    /// Ledgered, failed to apply, and handed to the retry queue.
    Queued(RetryDecision),
    /// Ledgered, but neither applied nor queued. A redelivery or the next
    /// retry sweep picks it up.
    Pending,
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Applied(_) => "applied",
            IngestOutcome::Duplicate => "duplicate",
            IngestOutcome::Skipped => "skipped",
            IngestOutcome::Queued(_) => "queued",
            IngestOutcome::Pending => "pending",
        }
    }
}

/// What a single retry attempt did.
enum RetryOutcome {
    Applied(SubscriptionRecord),
    Skipped,
    Failed(RetryDecision),
}

/// Counts from one retry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Unfinished events put back on the queue before the sweep.
    pub recovered: u32,
    pub examined: u32,
    pub resolved: u32,
    pub rescheduled: u32,
    pub dead_lettered: u32,
}

/// Idempotent billing event reconciliation over the canonical store.
///
/// Cheap to clone; clones share the database handle and classifier.
#[derive(Clone)]
pub struct ReconciliationEngine {
    db: Database,
    config: BillingConfig,
    classifier: Arc<dyn EventClassifier>,
    scheduler: RetryScheduler,
    monitor: FailureMonitor,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("config", &self.config)
            .field("max_attempts", &self.scheduler.max_attempts())
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    /// Build an engine with the given classifier and the system clock.
    pub fn new(
        db: Database,
        config: BillingConfig,
        retry: &RetryConfig,
        classifier: Arc<dyn EventClassifier>,
    ) -> Self {
        let scheduler = RetryScheduler::new(db.clone(), retry.max_attempts);
        let monitor = FailureMonitor::new(
            db.clone(),
            config.auth_failure_threshold,
            config.failure_threshold,
            config.failure_window_secs,
        );
        Self {
            db,
            config,
            classifier,
            scheduler,
            monitor,
            clock: Arc::new(SystemClock),
        }
    }

    /// Build an engine with the production classifier for `config`.
    pub fn from_config(db: Database, config: BillingConfig, retry: &RetryConfig) -> Self {
        let classifier = StatusClassifier::new(PlanCatalog::with_overrides(&config.plans));
        Self::new(db, config, retry, Arc::new(classifier))
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Ingest a raw webhook body.
    ///
    /// Malformed JSON is a validation failure like any missing field.
    pub async fn ingest_payload(
        &self,
        body: &[u8],
        header_token: Option<&str>,
    ) -> Result<IngestOutcome, StowageError> {
        match serde_json::from_slice::<WebhookEnvelope>(body) {
            Ok(envelope) => self.ingest(envelope, header_token).await,
            Err(e) => {
                self.monitor
                    .record(FailureMetric::Validation, self.clock.now())
                    .await;
                Err(StowageError::Validation(format!("malformed webhook body: {e}")))
            }
        }
    }

    /// Ingest one webhook envelope.
    ///
    /// Validation and auth failures are returned to the caller. Anything that
    /// goes wrong after the event is ledgered is absorbed into the retry
    /// queue and reported as [`IngestOutcome::Queued`], or as
    /// [`IngestOutcome::Pending`] when the queue itself cannot be written.
    ///
    /// A redelivery of an event that was ledgered but never finished is
    /// processed again instead of being treated as a duplicate.
    pub async fn ingest(
        &self,
        envelope: WebhookEnvelope,
        header_token: Option<&str>,
    ) -> Result<IngestOutcome, StowageError> {
        let now = self.clock.now();

        let validated = envelope
            .event
            .as_ref()
            .ok_or_else(|| StowageError::Validation("event is required".into()))
            .and_then(BillingEvent::validate);
        let canonical = match validated {
            Ok(canonical) => canonical,
            Err(e) => {
                self.monitor.record(FailureMetric::Validation, now).await;
                return Err(e);
            }
        };

        if let Some(expected) = &self.config.webhook_token {
            let supplied = auth::supplied_token(header_token, envelope.authorization.as_deref());
            let ok = supplied.is_some_and(|token| auth::token_matches(expected, token));
            if !ok {
                self.monitor.record(FailureMetric::Auth, now).await;
                warn!(
                    subscriber_id = %canonical.subscriber_id,
                    token_present = supplied.is_some(),
                    "webhook rejected: bad token"
                );
                return Err(StowageError::Auth("invalid webhook token".into()));
            }
        }

        // `validate` succeeded, so the event is present.
        let payload = match &envelope.event {
            Some(event) => serde_json::to_string(event).map_err(|e| StowageError::Internal(
                format!("failed to serialize webhook event: {e}"),
            ))?,
            None => return Err(StowageError::Validation("event is required".into())),
        };

        let key = dedup_key(&canonical);
        let received_at = format_timestamp(now);
        let new_event = NewWebhookEvent {
            dedup_key: key.clone(),
            provider_event_id: canonical.provider_event_id.clone(),
            subscriber_id: canonical.subscriber_id.clone(),
            event_type: canonical.event_type.clone(),
            product_id: canonical.product_id.clone(),
            entitlement_id: canonical.entitlement_ids.first().cloned(),
            original_transaction_id: canonical.original_transaction_id.clone(),
            transaction_at_ms: canonical.transaction_at_ms,
            expiration_at_ms: canonical.expiration_at_ms,
            payload: payload.clone(),
            received_at,
        };

        let Some(event_id) = webhook_events::insert_if_absent(&self.db, &new_event).await? else {
            let outcome = self.redelivered(&key, &canonical.subscriber_id, now).await;
            return Ok(self.finish(outcome));
        };

        if !self.is_tracked(&canonical) {
            debug!(
                event_id,
                subscriber_id = %canonical.subscriber_id,
                entitlements = ?canonical.entitlement_ids,
                "billing event for untracked entitlement skipped"
            );
            if let Err(e) =
                webhook_events::mark_processed(&self.db, event_id, &format_timestamp(now)).await
            {
                warn!(event_id, error = %e, "failed to mark skipped billing event processed");
            }
            return Ok(self.finish(IngestOutcome::Skipped));
        }

        match self.apply(event_id, &canonical, now).await {
            Ok(record) => {
                info!(
                    event_id,
                    subscriber_id = %record.subscriber_id,
                    event_type = %canonical.event_type,
                    status = %record.status,
                    plan = ?record.plan,
                    "billing event applied"
                );
                Ok(self.finish(IngestOutcome::Applied(record)))
            }
            Err(e) => {
                self.monitor.record(FailureMetric::Processing, now).await;
                let error = e.to_string();
                warn!(event_id, subscriber_id = %canonical.subscriber_id, error = %error, "billing event failed to apply");
                let failed = FailedEvent {
                    event_id,
                    subscriber_id: &canonical.subscriber_id,
                    payload: &payload,
                    error: &error,
                };
                match self.scheduler.schedule(failed, 1, now).await {
                    Ok(decision) => Ok(self.finish(IngestOutcome::Queued(decision))),
                    Err(queue_err) => {
                        error!(
                            event_id,
                            subscriber_id = %canonical.subscriber_id,
                            error = %queue_err,
                            "failed to queue billing event for retry, left for recovery"
                        );
                        Ok(self.finish(IngestOutcome::Pending))
                    }
                }
            }
        }
    }

    /// Handle a dedup hit: recover the event if it never finished, otherwise
    /// report a duplicate.
    async fn redelivered(
        &self,
        key: &str,
        subscriber_id: &str,
        now: DateTime<Utc>,
    ) -> IngestOutcome {
        match self.recover_redelivered(key, now).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                info!(
                    dedup_key = %key,
                    subscriber_id = %subscriber_id,
                    "duplicate billing event ignored"
                );
                IngestOutcome::Duplicate
            }
            Err(e) => {
                error!(
                    dedup_key = %key,
                    subscriber_id = %subscriber_id,
                    error = %e,
                    "failed to recover unfinished billing event"
                );
                IngestOutcome::Pending
            }
        }
    }

    async fn recover_redelivered(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IngestOutcome>, StowageError> {
        let cutoff = format_timestamp(now - Duration::seconds(ORPHAN_GRACE_SECS));
        let Some(orphan) = webhook_events::find_unprocessed(&self.db, key, &cutoff).await? else {
            return Ok(None);
        };
        if !self.requeue(&orphan, now).await? {
            return Ok(None);
        }
        let Some(entry) = retry_queue::get_by_event_id(&self.db, orphan.id).await? else {
            return Ok(None);
        };
        let outcome = match self.retry_entry(&entry, now).await? {
            RetryOutcome::Applied(record) => IngestOutcome::Applied(record),
            RetryOutcome::Skipped => IngestOutcome::Skipped,
            RetryOutcome::Failed(decision) => IngestOutcome::Queued(decision),
        };
        Ok(Some(outcome))
    }

    async fn requeue(
        &self,
        orphan: &UnprocessedEvent,
        now: DateTime<Utc>,
    ) -> Result<bool, StowageError> {
        self.scheduler
            .requeue_now(
                FailedEvent {
                    event_id: orphan.id,
                    subscriber_id: &orphan.subscriber_id,
                    payload: &orphan.payload,
                    error: "ledgered but never applied or queued",
                },
                now,
            )
            .await
    }

    /// Schedule (or dead-letter) a ledgered event for another attempt.
    pub async fn schedule_retry(
        &self,
        event_id: i64,
        subscriber_id: &str,
        payload: &str,
        error: &str,
        attempt: u32,
    ) -> Result<RetryDecision, StowageError> {
        self.scheduler
            .schedule(
                FailedEvent {
                    event_id,
                    subscriber_id,
                    payload,
                    error,
                },
                attempt,
                self.clock.now(),
            )
            .await
    }

    /// Re-process up to `limit` due retry entries, oldest first.
    ///
    /// Ledgered events that were never applied or queued are requeued first,
    /// so they are retried in the same sweep.
    pub async fn process_due_retries(&self, limit: u32) -> Result<SweepReport, StowageError> {
        let now = self.clock.now();
        let mut report = SweepReport {
            recovered: self.recover_unfinished(now, limit).await?,
            ..SweepReport::default()
        };

        let due = retry_queue::due_entries(&self.db, &format_timestamp(now), limit).await?;
        for entry in due {
            report.examined += 1;
            match self.retry_entry(&entry, now).await? {
                RetryOutcome::Applied(_) | RetryOutcome::Skipped => report.resolved += 1,
                RetryOutcome::Failed(RetryDecision::Scheduled { .. }) => report.rescheduled += 1,
                RetryOutcome::Failed(RetryDecision::DeadLettered { .. }) => {
                    report.dead_lettered += 1
                }
            }
        }

        match retry_queue::pending_count(&self.db).await {
            Ok(pending) => stowage_prometheus::set_pending_retries(pending as f64),
            Err(e) => warn!(error = %e, "failed to count pending retries"),
        }

        match self.monitor.prune(now).await {
            Ok(pruned) if pruned > 0 => debug!(pruned, "pruned old failure windows"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to prune failure windows"),
        }

        if report.examined > 0 {
            info!(
                recovered = report.recovered,
                examined = report.examined,
                resolved = report.resolved,
                rescheduled = report.rescheduled,
                dead_lettered = report.dead_lettered,
                "retry sweep complete"
            );
        }
        Ok(report)
    }

    async fn recover_unfinished(&self, now: DateTime<Utc>, limit: u32) -> Result<u32, StowageError> {
        let cutoff = format_timestamp(now - Duration::seconds(ORPHAN_GRACE_SECS));
        let mut recovered = 0;
        for orphan in webhook_events::unprocessed(&self.db, &cutoff, limit).await? {
            if self.requeue(&orphan, now).await? {
                recovered += 1;
            }
        }
        if recovered > 0 {
            warn!(recovered, "requeued unfinished billing events");
        }
        Ok(recovered)
    }

    /// Attempt one queued entry and record the result on the queue.
    async fn retry_entry(
        &self,
        entry: &RetryEntry,
        now: DateTime<Utc>,
    ) -> Result<RetryOutcome, StowageError> {
        let ts = format_timestamp(now);
        match self.reapply(entry, now).await {
            Ok(Some(record)) => {
                retry_queue::mark_resolved(&self.db, entry.id, &ts).await?;
                stowage_prometheus::record_retry_resolved();
                info!(
                    event_id = entry.event_id,
                    subscriber_id = %record.subscriber_id,
                    attempt = entry.attempt_count,
                    status = %record.status,
                    "queued billing event applied"
                );
                Ok(RetryOutcome::Applied(record))
            }
            Ok(None) => {
                webhook_events::mark_processed(&self.db, entry.event_id, &ts).await?;
                retry_queue::mark_resolved(&self.db, entry.id, &ts).await?;
                debug!(
                    event_id = entry.event_id,
                    "queued billing event for untracked entitlement skipped"
                );
                Ok(RetryOutcome::Skipped)
            }
            Err(e) => {
                let decision = self
                    .scheduler
                    .schedule(
                        FailedEvent {
                            event_id: entry.event_id,
                            subscriber_id: &entry.subscriber_id,
                            payload: &entry.payload,
                            error: &e.to_string(),
                        },
                        entry.attempt_count + 1,
                        now,
                    )
                    .await?;
                Ok(RetryOutcome::Failed(decision))
            }
        }
    }

    /// Current status for a subscriber, creating a `free` record on first sight.
    pub async fn subscription_status(
        &self,
        subscriber_id: &str,
    ) -> Result<SubscriptionRecord, StowageError> {
        let subscriber_id = subscriber_id.trim();
        if subscriber_id.is_empty() {
            return Err(StowageError::Validation("subscriber id is required".into()));
        }
        subscriptions::get_or_create_subscription(
            &self.db,
            subscriber_id,
            &format_timestamp(self.clock.now()),
        )
        .await
    }

    /// Subscription counts by status and plan.
    pub async fn subscription_stats(&self) -> Result<SubscriptionStats, StowageError> {
        subscriptions::subscription_stats(&self.db).await
    }

    /// Entries waiting for another attempt.
    pub async fn pending_retries(&self) -> Result<u64, StowageError> {
        retry_queue::pending_count(&self.db).await
    }

    /// Most recently dead-lettered entries.
    pub async fn dead_letters(&self, limit: u32) -> Result<Vec<RetryEntry>, StowageError> {
        retry_queue::dead_letters(&self.db, limit).await
    }

    fn is_tracked(&self, event: &CanonicalEvent) -> bool {
        match &self.config.tracked_entitlement {
            Some(tracked) if !event.entitlement_ids.is_empty() => {
                event.entitlement_ids.iter().any(|id| id == tracked)
            }
            _ => true,
        }
    }

    async fn apply(
        &self,
        event_id: i64,
        event: &CanonicalEvent,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionRecord, StowageError> {
        let transition = self.classifier.classify(event)?;
        subscriptions::apply_event_transition(
            &self.db,
            event_id,
            &event.subscriber_id,
            &transition,
            &format_timestamp(now),
        )
        .await
    }

    /// Re-run a stored event. `None` means it is for an untracked entitlement.
    async fn reapply(
        &self,
        entry: &RetryEntry,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionRecord>, StowageError> {
        let event: BillingEvent = serde_json::from_str(&entry.payload).map_err(|e| {
            StowageError::Processing {
                message: format!("stored payload is not a billing event: {e}"),
            }
        })?;
        let canonical = event.validate()?;
        if !self.is_tracked(&canonical) {
            return Ok(None);
        }
        self.apply(entry.event_id, &canonical, now).await.map(Some)
    }

    fn finish(&self, outcome: IngestOutcome) -> IngestOutcome {
        stowage_prometheus::record_webhook_event(outcome.as_str());
        outcome
    }
}
