// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry sweeping: the background loop used by `serve` and the one-shot
//! `stowage sweep` command.

use std::time::Duration;

use colored::Colorize;
use stowage_billing::{ReconciliationEngine, SweepReport};
use stowage_config::StowageConfig;
use stowage_core::{StorageAdapter, StowageError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::serve::open_storage;

/// Process due retries every `interval` until `cancel` fires.
///
/// A failed pass is logged and the loop carries on; the next tick retries.
pub async fn sweeper_loop(
    engine: ReconciliationEngine,
    interval: Duration,
    batch_size: u32,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = interval.as_secs(), batch_size, "retry sweeper started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match engine.process_due_retries(batch_size).await {
                    Ok(report) => debug!(?report, "retry sweep pass"),
                    Err(e) => warn!(error = %e, "retry sweep failed"),
                }
            }
        }
    }

    info!("retry sweeper stopped");
}

/// Runs the `stowage sweep` command.
pub async fn run_sweep(config: StowageConfig, limit: Option<u32>) -> Result<(), StowageError> {
    let report = sweep_once(&config, limit).await?;
    print_report(&report);
    Ok(())
}

async fn sweep_once(config: &StowageConfig, limit: Option<u32>) -> Result<SweepReport, StowageError> {
    let storage = open_storage(config).await?;
    let engine = ReconciliationEngine::from_config(
        storage.database()?,
        config.billing.clone(),
        &config.retry,
    );

    let limit = limit.unwrap_or(config.retry.sweep_batch_size);
    let report = engine.process_due_retries(limit).await;
    storage.close().await?;
    report
}

fn print_report(report: &SweepReport) {
    println!("\n  {}\n", "Retry sweep".bold());
    println!("  recovered      {}", report.recovered);
    println!("  examined       {}", report.examined);
    println!("  resolved       {}", report.resolved.to_string().green());
    println!("  rescheduled    {}", report.rescheduled.to_string().yellow());
    let dead = if report.dead_lettered > 0 {
        report.dead_lettered.to_string().red().to_string()
    } else {
        report.dead_lettered.to_string()
    };
    println!("  dead-lettered  {dead}\n");
}
