// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::FromRef,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use stowage_billing::ReconciliationEngine;
use stowage_core::StowageError;
use stowage_lookup::LookupEngine;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl std::fmt::Debug for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthState")
            .field("start_time", &self.start_time)
            .field("prometheus_render", &self.prometheus_render.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Shared state for axum request handlers.
#[derive(Debug, Clone)]
pub struct GatewayState {
    /// Billing webhook ingestion and subscription reads.
    pub billing: ReconciliationEngine,
    /// Barcode lookups.
    pub lookup: LookupEngine,
    /// Token for app-facing routes.
    pub api_auth: AuthConfig,
    /// Token for admin routes.
    pub admin_auth: AuthConfig,
    /// Due entries handled by one admin-triggered sweep.
    pub sweep_batch_size: u32,
    /// Health state for unauthenticated endpoints.
    pub health: HealthState,
}

impl FromRef<GatewayState> for HealthState {
    fn from_ref(state: &GatewayState) -> Self {
        state.health.clone()
    }
}

/// Gateway listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Build the gateway router.
///
/// - `POST /v1/webhooks/billing` (webhook token, checked by the engine)
/// - `GET /v1/subscription`, `GET /v1/barcodes/{code}` (API bearer)
/// - `GET /admin/...`, `POST /admin/retries/process` (admin bearer)
/// - `GET /health`, `GET /metrics` (public)
pub fn build_router(state: GatewayState) -> Router {
    // Unauthenticated public routes (health + metrics for systemd and Prometheus).
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .route("/v1/webhooks/billing", post(handlers::post_billing_webhook))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/subscription", get(handlers::get_subscription))
        .route("/v1/barcodes/{code}", get(handlers::get_barcode))
        .route_layer(axum_middleware::from_fn_with_state(
            state.api_auth.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route(
            "/admin/subscriptions/stats",
            get(handlers::get_subscription_stats),
        )
        .route("/admin/retries/dead-letter", get(handlers::get_dead_letters))
        .route("/admin/retries/process", post(handlers::post_process_retries))
        .route_layer(axum_middleware::from_fn_with_state(
            state.admin_auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve the gateway until `shutdown` resolves.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), StowageError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| StowageError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| StowageError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
    }

    #[test]
    fn health_state_debug_hides_render_fn() {
        let health = HealthState {
            start_time: std::time::Instant::now(),
            prometheus_render: Some(Arc::new(|| "metrics".to_string())),
        };
        assert!(format!("{health:?}").contains("<fn>"));
    }
}
