// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full service (temp SQLite database, both
//! engines, and the gateway router) with a manual clock, a counting
//! classifier, and mock product providers. Requests are driven through the
//! router with `oneshot`, so no port is bound.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use stowage_billing::{PlanCatalog, ReconciliationEngine, StatusClassifier};
use stowage_config::model::{BillingConfig, RetryConfig, StorageConfig};
use stowage_core::{ProductProvider, StorageAdapter, StowageError};
use stowage_gateway::{AuthConfig, GatewayState, HealthState, build_router};
use stowage_lookup::LookupEngine;
use stowage_storage::{Database, SqliteStorage};
use tower::ServiceExt;

use crate::clock::ManualClock;
use crate::mock_classifier::CountingClassifier;

pub const TEST_API_TOKEN: &str = "test-api-token";
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    billing: BillingConfig,
    retry: RetryConfig,
    providers: Vec<Arc<dyn ProductProvider>>,
    cache_ttl_days: u32,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            billing: BillingConfig::default(),
            retry: RetryConfig::default(),
            providers: Vec::new(),
            cache_ttl_days: 30,
        }
    }

    /// Require this webhook token.
    pub fn with_webhook_token(mut self, token: &str) -> Self {
        self.billing.webhook_token = Some(token.to_string());
        self
    }

    /// Only apply events for this entitlement.
    pub fn with_tracked_entitlement(mut self, entitlement: &str) -> Self {
        self.billing.tracked_entitlement = Some(entitlement.to_string());
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    /// Append a provider to the lookup chain.
    pub fn with_provider(mut self, provider: Arc<dyn ProductProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_cache_ttl_days(mut self, days: u32) -> Self {
        self.cache_ttl_days = days;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, StowageError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| StowageError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        });
        storage.initialize().await?;
        let db = storage.database()?;

        let clock = Arc::new(ManualClock::default());
        let classifier = Arc::new(CountingClassifier::new(StatusClassifier::new(
            PlanCatalog::with_overrides(&self.billing.plans),
        )));

        let billing = ReconciliationEngine::new(
            db.clone(),
            self.billing,
            &self.retry,
            classifier.clone(),
        )
        .with_clock(clock.clone());
        let lookup = LookupEngine::new(db.clone(), self.providers, self.cache_ttl_days)
            .with_clock(clock.clone());

        let state = GatewayState {
            billing: billing.clone(),
            lookup: lookup.clone(),
            api_auth: AuthConfig::new(Some(TEST_API_TOKEN.to_string())),
            admin_auth: AuthConfig::new(Some(TEST_ADMIN_TOKEN.to_string())),
            sweep_batch_size: self.retry.sweep_batch_size,
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render: None,
            },
        };

        Ok(TestHarness {
            router: build_router(state),
            billing,
            lookup,
            db,
            clock,
            classifier,
            storage,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock collaborators and temp storage.
pub struct TestHarness {
    /// The gateway router, ready for `oneshot`.
    pub router: Router,
    pub billing: ReconciliationEngine,
    pub lookup: LookupEngine,
    /// Direct database access for assertions.
    pub db: Database,
    pub clock: Arc<ManualClock>,
    pub classifier: Arc<CountingClassifier>,
    storage: SqliteStorage,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Send a request through the router and decode the JSON body.
    ///
    /// An empty body decodes to `Value::Null`; a non-JSON body to a string.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let status = response.status();
        let bytes = match response.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => panic!("failed to read response body: {e}"),
        };
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// POST a billing webhook body, with an optional `Authorization` header.
    pub async fn post_webhook(&self, body: &Value, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::post("/v1/webhooks/billing")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", token);
        }
        self.send(build(builder, Body::from(body.to_string()))).await
    }

    /// GET with the app API token.
    pub async fn api_get(&self, uri: &str) -> (StatusCode, Value) {
        let builder =
            Request::get(uri).header("authorization", format!("Bearer {TEST_API_TOKEN}"));
        self.send(build(builder, Body::empty())).await
    }

    /// GET /v1/subscription for a subscriber.
    pub async fn subscription(&self, subscriber_id: &str) -> (StatusCode, Value) {
        let builder = Request::get("/v1/subscription")
            .header("authorization", format!("Bearer {TEST_API_TOKEN}"))
            .header("x-subscriber-id", subscriber_id);
        self.send(build(builder, Body::empty())).await
    }

    /// Call an admin route with the admin token.
    pub async fn admin(&self, method: &str, uri: &str) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {TEST_ADMIN_TOKEN}"));
        self.send(build(builder, Body::empty())).await
    }

    /// Close the storage adapter, checkpointing the WAL.
    pub async fn shutdown(self) -> Result<(), StowageError> {
        self.storage.close().await
    }
}

fn build(builder: axum::http::request::Builder, body: Body) -> Request<Body> {
    match builder.body(body) {
        Ok(request) => request,
        Err(e) => panic!("invalid test request: {e}"),
    }
}
