// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stowage_billing::SweepReport;
use stowage_core::{Plan, ProductInfo, StowageError, SubscriptionStatus};
use stowage_storage::models::{RetryEntry, SubscriptionStats};

use crate::error::{public_message, status_for, ApiError};
use crate::server::{GatewayState, HealthState};

/// Header carrying the authenticated caller's subscriber id.
pub const SUBSCRIBER_ID_HEADER: &str = "x-subscriber-id";

/// Dead-letter entries returned per admin request.
const DEAD_LETTER_LIMIT: u32 = 100;

/// Response body for POST /v1/webhooks/billing.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response body for GET /v1/subscription.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub status: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renew_date: Option<String>,
    pub created_at: String,
}

/// Response body for GET /admin/retries/dead-letter.
#[derive(Debug, Serialize)]
pub struct DeadLetterResponse {
    pub entries: Vec<RetryEntry>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status string.
    pub status: String,
    /// Binary version.
    pub version: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
}

/// POST /v1/webhooks/billing
///
/// The body is parsed by the engine so malformed JSON counts as a
/// validation failure. Events that fail after ledgering still answer 200;
/// the retry queue owns them from then on.
pub async fn post_billing_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    match state.billing.ingest_payload(&body, header_token).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(WebhookResponse {
                success: true,
                outcome: Some(outcome.as_str()),
                error: None,
            }),
        )
            .into_response(),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!(kind = e.kind(), error = %e, "webhook ingestion failed");
            } else {
                tracing::info!(status = status.as_u16(), error = %e, "webhook rejected");
            }
            (
                status,
                Json(WebhookResponse {
                    success: false,
                    outcome: None,
                    error: Some(public_message(&e)),
                }),
            )
                .into_response()
        }
    }
}

/// GET /v1/subscription
pub async fn get_subscription(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let subscriber_id = headers
        .get(SUBSCRIBER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            StowageError::Validation(format!("{SUBSCRIBER_ID_HEADER} header is required"))
        })?;

    let record = state.billing.subscription_status(subscriber_id).await?;
    Ok(Json(SubscriptionResponse {
        status: record.status,
        plan: record.plan,
        renew_date: record.renews_at,
        created_at: record.created_at,
    }))
}

/// GET /v1/barcodes/{code}
///
/// The lookup runs in its own task so a caller hanging up does not cancel
/// the provider call or the cache write.
pub async fn get_barcode(
    State(state): State<GatewayState>,
    Path(code): Path<String>,
) -> Result<Json<ProductInfo>, ApiError> {
    let lookup = state.lookup.clone();
    let product = tokio::spawn(async move { lookup.lookup(&code).await })
        .await
        .map_err(|e| StowageError::Internal(format!("lookup task failed: {e}")))??;
    Ok(Json(product))
}

/// GET /admin/subscriptions/stats
pub async fn get_subscription_stats(
    State(state): State<GatewayState>,
) -> Result<Json<SubscriptionStats>, ApiError> {
    Ok(Json(state.billing.subscription_stats().await?))
}

/// GET /admin/retries/dead-letter
pub async fn get_dead_letters(
    State(state): State<GatewayState>,
) -> Result<Json<DeadLetterResponse>, ApiError> {
    let entries = state.billing.dead_letters(DEAD_LETTER_LIMIT).await?;
    Ok(Json(DeadLetterResponse { entries }))
}

/// POST /admin/retries/process
pub async fn post_process_retries(
    State(state): State<GatewayState>,
) -> Result<Json<SweepReport>, ApiError> {
    Ok(Json(
        state
            .billing
            .process_due_retries(state.sweep_batch_size)
            .await?,
    ))
}

/// GET /health
pub async fn get_health(State(health): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: health.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when metrics are disabled.
pub async fn get_metrics(State(health): State<HealthState>) -> Response {
    match &health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
