// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Product provider trait for external barcode/ISBN metadata sources.

use async_trait::async_trait;

use crate::error::StowageError;
use crate::types::{Barcode, ProductInfo, ProductSource};

/// How a provider's hit is written back into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Insert, or overwrite an existing row.
    Upsert,
    /// Insert only when no row exists for the key.
    InsertIfAbsent,
}

/// A normalized product plus the provider's raw payload.
#[derive(Debug, Clone)]
pub struct ProviderHit {
    pub product: ProductInfo,
    pub raw: serde_json::Value,
}

/// Result of asking one provider about one key.
#[derive(Debug, Clone)]
pub enum ProviderOutcome {
    Found(ProviderHit),
    Miss,
}

/// One external product database in the lookup chain.
///
/// Errors returned from [`ProductProvider::try_lookup`] are treated by the
/// orchestrator as a miss for that provider.
#[async_trait]
pub trait ProductProvider: Send + Sync + 'static {
    /// Human-readable provider name for logs.
    fn name(&self) -> &str;

    /// Source tag recorded on products this provider returns.
    fn source(&self) -> ProductSource;

    /// Whether this provider should be consulted for the key.
    fn supports(&self, barcode: &Barcode) -> bool;

    /// Cache write policy for hits from this provider.
    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Upsert
    }

    /// Query the provider.
    async fn try_lookup(&self, barcode: &Barcode) -> Result<ProviderOutcome, StowageError>;
}
