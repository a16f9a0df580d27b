// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the reconciliation engine against a real SQLite store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use stowage_billing::{
    IngestOutcome, PlanCatalog, ReconciliationEngine, RetryDecision, StatusClassifier, SweepReport,
};
use stowage_config::model::{BillingConfig, RetryConfig};
use stowage_core::{
    CanonicalEvent, Clock, EventClassifier, Plan, StateTransition, StowageError,
    SubscriptionStatus, WebhookEnvelope,
};
use stowage_storage::Database;
use stowage_storage::queries::{retry_queue, webhook_events};

struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        )))
    }

    fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Counts calls and fails while `failing` is set.
#[derive(Default)]
struct ScriptedClassifier {
    inner: StatusClassifier,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl EventClassifier for ScriptedClassifier {
    fn classify(&self, event: &CanonicalEvent) -> Result<StateTransition, StowageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StowageError::Processing {
                message: "classifier offline".into(),
            });
        }
        self.inner.classify(event)
    }
}

struct Fixture {
    engine: ReconciliationEngine,
    db: Database,
    clock: Arc<TestClock>,
    classifier: Arc<ScriptedClassifier>,
    _dir: tempfile::TempDir,
}

async fn fixture(billing: BillingConfig, max_attempts: u32) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("billing.db").to_str().unwrap())
        .await
        .unwrap();
    let clock = TestClock::new();
    let classifier = Arc::new(ScriptedClassifier {
        inner: StatusClassifier::new(PlanCatalog::default()),
        ..Default::default()
    });
    let retry = RetryConfig {
        max_attempts,
        ..Default::default()
    };
    let engine = ReconciliationEngine::new(db.clone(), billing, &retry, classifier.clone())
        .with_clock(clock.clone());
    Fixture {
        engine,
        db,
        clock,
        classifier,
        _dir: dir,
    }
}

fn envelope(value: serde_json::Value) -> WebhookEnvelope {
    serde_json::from_value(value).unwrap()
}

fn purchase(id: &str, user: &str) -> WebhookEnvelope {
    envelope(json!({
        "event": {
            "id": id,
            "type": "INITIAL_PURCHASE",
            "app_user_id": user,
            "product_id": "rc_pro_monthly",
            "entitlement_ids": ["pro"],
            "expiration_at_ms": 1_775_000_000_000_i64
        }
    }))
}

#[tokio::test]
async fn purchase_activates_subscription() {
    let f = fixture(BillingConfig::default(), 5).await;

    let outcome = f.engine.ingest(purchase("evt-1", "user-1"), None).await.unwrap();
    let IngestOutcome::Applied(record) = outcome else {
        panic!("expected applied, got {outcome:?}");
    };
    assert_eq!(record.status, SubscriptionStatus::Active);
    assert_eq!(record.plan, Some(Plan::ProMonthly));
    assert!(record.renews_at.is_some());

    let status = f.engine.subscription_status("user-1").await.unwrap();
    assert_eq!(status, record);
}

#[tokio::test]
async fn concurrent_duplicates_classify_once() {
    let f = fixture(BillingConfig::default(), 5).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = f.engine.clone();
        handles.push(tokio::spawn(async move {
            engine.ingest(purchase("evt-42", "user-42"), None).await
        }));
    }

    let mut applied = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            IngestOutcome::Applied(_) => applied += 1,
            IngestOutcome::Duplicate => duplicates += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(duplicates, 9);
    assert_eq!(f.classifier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        webhook_events::count_for_subscriber(&f.db, "user-42").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn events_without_id_dedup_by_content() {
    let f = fixture(BillingConfig::default(), 5).await;
    let body = json!({
        "event": {
            "type": "RENEWAL",
            "app_user_id": "user-7",
            "product_id": "rc_pro_yearly",
            "original_transaction_id": "tx-1",
            "transaction_at_ms": 1_700_000_000_000_i64
        }
    });

    let first = f.engine.ingest(envelope(body.clone()), None).await.unwrap();
    assert_eq!(first.as_str(), "applied");
    let second = f.engine.ingest(envelope(body), None).await.unwrap();
    assert_eq!(second, IngestOutcome::Duplicate);
}

#[tokio::test]
async fn missing_fields_are_rejected_before_ledgering() {
    let f = fixture(BillingConfig::default(), 5).await;

    let err = f
        .engine
        .ingest(envelope(json!({ "event": { "type": "RENEWAL" } })), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StowageError::Validation(_)));

    let err = f
        .engine
        .ingest(envelope(json!({})), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StowageError::Validation(_)));

    let err = f
        .engine
        .ingest_payload(b"{not json", None)
        .await
        .unwrap_err();
    assert!(matches!(err, StowageError::Validation(_)));
    assert_eq!(f.classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn token_is_checked_when_configured() {
    let billing = BillingConfig {
        webhook_token: Some("hook-secret".into()),
        ..Default::default()
    };
    let f = fixture(billing, 5).await;

    let err = f
        .engine
        .ingest(purchase("evt-a", "user-a"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StowageError::Auth(_)));

    let err = f
        .engine
        .ingest(purchase("evt-a", "user-a"), Some("Bearer wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, StowageError::Auth(_)));

    // A rejected event is not ledgered, so the real one still applies.
    let ok = f
        .engine
        .ingest(purchase("evt-a", "user-a"), Some("Bearer hook-secret"))
        .await
        .unwrap();
    assert_eq!(ok.as_str(), "applied");

    let mut in_body = purchase("evt-b", "user-b");
    in_body.authorization = Some("hook-secret".into());
    let ok = f.engine.ingest(in_body, None).await.unwrap();
    assert_eq!(ok.as_str(), "applied");
}

#[tokio::test]
async fn untracked_entitlement_is_ledgered_and_skipped() {
    let billing = BillingConfig {
        tracked_entitlement: Some("pro".into()),
        ..Default::default()
    };
    let f = fixture(billing, 5).await;

    let other = envelope(json!({
        "event": {
            "id": "evt-x",
            "type": "INITIAL_PURCHASE",
            "app_user_id": "user-x",
            "entitlement_ids": ["family"]
        }
    }));
    assert_eq!(f.engine.ingest(other.clone(), None).await.unwrap(), IngestOutcome::Skipped);
    assert_eq!(f.engine.ingest(other, None).await.unwrap(), IngestOutcome::Duplicate);
    assert_eq!(f.classifier.calls.load(Ordering::SeqCst), 0);

    let status = f.engine.subscription_status("user-x").await.unwrap();
    assert_eq!(status.status, SubscriptionStatus::Free);
}

#[tokio::test]
async fn failed_event_is_queued_and_resolved_by_sweep() {
    let f = fixture(BillingConfig::default(), 5).await;
    f.classifier.failing.store(true, Ordering::SeqCst);

    let outcome = f.engine.ingest(purchase("evt-q", "user-q"), None).await.unwrap();
    assert_eq!(
        outcome,
        IngestOutcome::Queued(RetryDecision::Scheduled {
            attempt: 1,
            next_retry_at: "2026-03-01T12:00:30.000Z".into(),
        })
    );

    // Not yet due.
    let report = f.engine.process_due_retries(10).await.unwrap();
    assert_eq!(report, SweepReport::default());

    f.clock.advance(Duration::seconds(31));
    f.classifier.failing.store(false, Ordering::SeqCst);
    let report = f.engine.process_due_retries(10).await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            examined: 1,
            resolved: 1,
            ..Default::default()
        }
    );

    let status = f.engine.subscription_status("user-q").await.unwrap();
    assert_eq!(status.status, SubscriptionStatus::Active);

    // Resolved entries are never picked up again.
    f.clock.advance(Duration::hours(2));
    let report = f.engine.process_due_retries(10).await.unwrap();
    assert_eq!(report.examined, 0);
}

#[tokio::test]
async fn exhausted_retries_are_dead_lettered() {
    let f = fixture(BillingConfig::default(), 2).await;
    f.classifier.failing.store(true, Ordering::SeqCst);

    f.engine.ingest(purchase("evt-d", "user-d"), None).await.unwrap();

    f.clock.advance(Duration::seconds(31));
    let report = f.engine.process_due_retries(10).await.unwrap();
    assert_eq!(report.rescheduled, 1);

    f.clock.advance(Duration::seconds(121));
    let report = f.engine.process_due_retries(10).await.unwrap();
    assert_eq!(report.dead_lettered, 1);

    let dead = f.engine.dead_letters(10).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].subscriber_id, "user-d");
    assert_eq!(dead[0].attempt_count, 3);
    assert!(dead[0].error_message.contains("classifier offline"));

    // Dead letters are not due.
    f.clock.advance(Duration::days(1));
    assert_eq!(f.engine.process_due_retries(10).await.unwrap().examined, 0);
    let entry = retry_queue::get_by_event_id(&f.db, dead[0].event_id)
        .await
        .unwrap()
        .unwrap();
    assert!(entry.dead_lettered);
}

#[tokio::test]
async fn later_events_win() {
    let f = fixture(BillingConfig::default(), 5).await;

    f.engine.ingest(purchase("evt-1", "user-w"), None).await.unwrap();
    let cancel = envelope(json!({
        "event": {
            "id": "evt-2",
            "type": "CANCELLATION",
            "app_user_id": "user-w",
            "product_id": "rc_pro_monthly"
        }
    }));
    f.engine.ingest(cancel, None).await.unwrap();

    let status = f.engine.subscription_status("user-w").await.unwrap();
    assert_eq!(status.status, SubscriptionStatus::Canceled);
    assert_eq!(status.plan, Some(Plan::ProMonthly));

    let stats = f.engine.subscription_stats().await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.by_status.get("canceled"), Some(&1));
}

#[tokio::test]
async fn blank_subscriber_id_is_rejected() {
    let f = fixture(BillingConfig::default(), 5).await;
    let err = f.engine.subscription_status("  ").await.unwrap_err();
    assert!(matches!(err, StowageError::Validation(_)));
}

/// Rename the retry queue away (or back) so writes to it fail.
async fn park_retry_queue(db: &Database, parked: bool) {
    let sql = if parked {
        "ALTER TABLE retry_queue RENAME TO retry_queue_parked"
    } else {
        "ALTER TABLE retry_queue_parked RENAME TO retry_queue"
    };
    db.connection()
        .call(move |conn| conn.execute_batch(sql))
        .await
        .unwrap();
}

#[tokio::test]
async fn unqueueable_failure_is_recovered_on_redelivery() {
    let f = fixture(BillingConfig::default(), 5).await;
    f.classifier.failing.store(true, Ordering::SeqCst);
    park_retry_queue(&f.db, true).await;

    let outcome = f.engine.ingest(purchase("evt-9", "user-9"), None).await.unwrap();
    assert_eq!(outcome, IngestOutcome::Pending);

    park_retry_queue(&f.db, false).await;
    f.classifier.failing.store(false, Ordering::SeqCst);

    // A redelivery racing the first attempt is still a duplicate.
    let outcome = f.engine.ingest(purchase("evt-9", "user-9"), None).await.unwrap();
    assert_eq!(outcome, IngestOutcome::Duplicate);

    f.clock.advance(Duration::seconds(31));
    let outcome = f.engine.ingest(purchase("evt-9", "user-9"), None).await.unwrap();
    let IngestOutcome::Applied(record) = outcome else {
        panic!("expected applied, got {outcome:?}");
    };
    assert_eq!(record.status, SubscriptionStatus::Active);

    let outcome = f.engine.ingest(purchase("evt-9", "user-9"), None).await.unwrap();
    assert_eq!(outcome, IngestOutcome::Duplicate);
    assert_eq!(
        webhook_events::count_for_subscriber(&f.db, "user-9").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn unqueueable_failure_is_recovered_by_sweep() {
    let f = fixture(BillingConfig::default(), 5).await;
    f.classifier.failing.store(true, Ordering::SeqCst);
    park_retry_queue(&f.db, true).await;

    let outcome = f.engine.ingest(purchase("evt-s", "user-s"), None).await.unwrap();
    assert_eq!(outcome, IngestOutcome::Pending);

    park_retry_queue(&f.db, false).await;
    f.classifier.failing.store(false, Ordering::SeqCst);

    // Too fresh to be considered abandoned.
    assert_eq!(f.engine.process_due_retries(10).await.unwrap(), SweepReport::default());

    f.clock.advance(Duration::seconds(31));
    let report = f.engine.process_due_retries(10).await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            recovered: 1,
            examined: 1,
            resolved: 1,
            ..Default::default()
        }
    );
    let status = f.engine.subscription_status("user-s").await.unwrap();
    assert_eq!(status.status, SubscriptionStatus::Active);

    // Nothing left to recover.
    f.clock.advance(Duration::hours(1));
    assert_eq!(f.engine.process_due_retries(10).await.unwrap(), SweepReport::default());
}
