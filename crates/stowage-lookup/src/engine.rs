// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache-aside barcode lookup over an ordered provider chain.

use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use stowage_config::model::LookupConfig;
use stowage_core::{
    Barcode, CachePolicy, Clock, ProductInfo, ProductProvider, ProductSource, ProviderHit,
    ProviderOutcome, StowageError, SystemClock,
};
use stowage_storage::Database;
use stowage_storage::queries::barcode_cache;
use stowage_storage::timestamp::format_timestamp;
use tracing::{debug, info, warn};

use crate::providers::build_providers;

/// Resolves barcodes to products, consulting the cache before any provider.
#[derive(Clone)]
pub struct LookupEngine {
    db: Database,
    providers: Vec<Arc<dyn ProductProvider>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LookupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupEngine")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("ttl_days", &self.ttl.num_days())
            .finish_non_exhaustive()
    }
}

impl LookupEngine {
    pub fn new(db: Database, providers: Vec<Arc<dyn ProductProvider>>, ttl_days: u32) -> Self {
        Self {
            db,
            providers,
            ttl: Duration::days(i64::from(ttl_days)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Build an engine with the default provider chain for `config`.
    pub fn from_config(db: Database, config: &LookupConfig) -> Result<Self, StowageError> {
        Ok(Self::new(db, build_providers(config)?, config.cache_ttl_days))
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Names of the configured providers, in lookup order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Look up a barcode.
    ///
    /// Fails with `Validation` for a malformed key, `ProviderUnavailable`
    /// when no configured provider handles the key, and `NotFound` when
    /// every applicable provider missed or failed.
    pub async fn lookup(&self, raw_key: &str) -> Result<ProductInfo, StowageError> {
        let started = Instant::now();
        let barcode = Barcode::parse(raw_key)?;
        let result = self.resolve(&barcode).await;

        let (source, outcome) = match &result {
            Ok(product) => (product.source.to_string(), "found"),
            Err(StowageError::NotFound(_)) => ("none".to_string(), "not_found"),
            Err(StowageError::ProviderUnavailable(_)) => ("none".to_string(), "unavailable"),
            Err(_) => ("none".to_string(), "error"),
        };
        stowage_prometheus::record_lookup(&source, outcome);
        stowage_prometheus::record_lookup_latency(started.elapsed().as_secs_f64());
        result
    }

    async fn resolve(&self, barcode: &Barcode) -> Result<ProductInfo, StowageError> {
        let now = self.clock.now();
        // A TTL reaching past the earliest representable time keeps every row fresh.
        let fresh_after = now
            .checked_sub_signed(self.ttl)
            .map(format_timestamp)
            .unwrap_or_default();

        match barcode_cache::get_fresh(&self.db, barcode.as_str(), &fresh_after).await {
            Ok(Some(cached)) => {
                debug!(barcode = %barcode, cached_at = %cached.cached_at, "barcode cache hit");
                let mut product = cached.product;
                product.source = ProductSource::Cache;
                return Ok(product);
            }
            Ok(None) => {}
            Err(e) => warn!(barcode = %barcode, error = %e, "barcode cache read failed"),
        }

        let applicable: Vec<&Arc<dyn ProductProvider>> = self
            .providers
            .iter()
            .filter(|p| p.supports(barcode))
            .collect();
        if applicable.is_empty() {
            return Err(StowageError::ProviderUnavailable(format!(
                "no product provider configured for {barcode}"
            )));
        }

        for provider in applicable {
            match provider.try_lookup(barcode).await {
                Ok(ProviderOutcome::Found(hit)) => {
                    stowage_prometheus::record_provider_request(provider.name(), "hit");
                    info!(
                        barcode = %barcode,
                        provider = provider.name(),
                        name = %hit.product.name,
                        "product found"
                    );
                    self.store(provider.cache_policy(), &hit, now).await;
                    return Ok(hit.product);
                }
                Ok(ProviderOutcome::Miss) => {
                    stowage_prometheus::record_provider_request(provider.name(), "miss");
                    debug!(barcode = %barcode, provider = provider.name(), "provider miss");
                }
                Err(e) => {
                    stowage_prometheus::record_provider_request(provider.name(), "error");
                    warn!(
                        barcode = %barcode,
                        provider = provider.name(),
                        error = %e,
                        "provider failed, trying next"
                    );
                }
            }
        }

        Err(StowageError::NotFound(format!("no product found for {barcode}")))
    }

    async fn store(&self, policy: CachePolicy, hit: &ProviderHit, now: chrono::DateTime<chrono::Utc>) {
        let now = format_timestamp(now);
        let result = match policy {
            CachePolicy::Upsert => {
                barcode_cache::upsert(&self.db, &hit.product, Some(&hit.raw), &now).await
            }
            CachePolicy::InsertIfAbsent => {
                barcode_cache::insert_if_absent(&self.db, &hit.product, Some(&hit.raw), &now)
                    .await
                    .map(|_| ())
            }
        };
        if let Err(e) = result {
            warn!(barcode = %hit.product.barcode, error = %e, "barcode cache write failed");
        }
    }
}
