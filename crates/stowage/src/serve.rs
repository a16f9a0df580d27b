// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Implementation of the `stowage serve` command.
//!
//! Opens storage, builds the reconciliation and lookup engines, starts the
//! in-process retry sweeper, and serves the gateway until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use stowage_billing::ReconciliationEngine;
use stowage_config::StowageConfig;
use stowage_core::{HealthStatus, PluginAdapter, StorageAdapter, StowageError};
use stowage_gateway::{AuthConfig, GatewayState, HealthState, ServerConfig, start_server};
use stowage_lookup::LookupEngine;
use stowage_prometheus::PrometheusAdapter;
use stowage_storage::SqliteStorage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::sweep::sweeper_loop;

/// Runs the `stowage serve` command.
pub async fn run_serve(config: StowageConfig) -> Result<(), StowageError> {
    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        "starting stowage"
    );

    let prometheus_render = if config.prometheus.enabled {
        let adapter = Arc::new(PrometheusAdapter::new()?);
        let render: Arc<dyn Fn() -> String + Send + Sync> = Arc::new(move || adapter.render());
        Some(render)
    } else {
        None
    };

    let storage = open_storage(&config).await?;
    let db = storage.database()?;

    let billing =
        ReconciliationEngine::from_config(db.clone(), config.billing.clone(), &config.retry);
    let lookup = LookupEngine::from_config(db, &config.lookup)?;
    info!(providers = ?lookup.provider_names(), "lookup chain ready");

    if config.server.api_token.is_none() {
        warn!("server.api_token is not set; app routes will reject every request");
    }
    if config.billing.webhook_token.is_none() {
        warn!("billing.webhook_token is not set; webhooks are accepted without authentication");
    }

    let cancel = install_signal_handler();

    let sweeper = if config.retry.sweeper_enabled {
        Some(tokio::spawn(sweeper_loop(
            billing.clone(),
            Duration::from_secs(config.retry.sweep_interval_secs),
            config.retry.sweep_batch_size,
            cancel.clone(),
        )))
    } else {
        info!("retry sweeper disabled");
        None
    };

    let state = GatewayState {
        billing,
        lookup,
        api_auth: AuthConfig::new(config.server.api_token.clone()),
        admin_auth: AuthConfig::new(config.server.admin_token.clone()),
        sweep_batch_size: config.retry.sweep_batch_size,
        health: HealthState {
            start_time: std::time::Instant::now(),
            prometheus_render,
        },
    };
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    let served = start_server(&server_config, state, cancel.clone().cancelled_owned()).await;

    // A bind failure returns before any signal; stop the sweeper either way.
    cancel.cancel();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            warn!(error = %e, "retry sweeper task ended abnormally");
        }
    }

    if let Err(e) = storage.close().await {
        warn!(error = %e, "failed to checkpoint storage on shutdown");
    }
    info!("stowage stopped");

    served
}

/// Open the configured SQLite database and run migrations.
pub(crate) async fn open_storage(config: &StowageConfig) -> Result<SqliteStorage, StowageError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;

    match storage.health_check().await? {
        HealthStatus::Healthy => debug!("storage healthy"),
        HealthStatus::Degraded(reason) => warn!(%reason, "storage degraded"),
        HealthStatus::Unhealthy(reason) => {
            return Err(StowageError::Storage {
                source: reason.into(),
            });
        }
    }
    Ok(storage)
}

/// Installs handlers for SIGTERM and SIGINT.
///
/// The returned token is cancelled when either signal arrives.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, listening for Ctrl+C only");
            let _ = ctrl_c.await;
            info!("received SIGINT (Ctrl+C), initiating shutdown");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received Ctrl+C, initiating shutdown");
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies to the
/// stowage crates and everything else logs at `warn`. Output goes to stderr
/// so `stowage lookup --json` keeps stdout clean.
pub(crate) fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stowage={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
