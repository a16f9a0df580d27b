// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Stowage.
//!
//! This crate provides the error type, domain types, and trait seams used
//! throughout the workspace. The reconciliation engine, the lookup engine,
//! and their adapters all depend on it.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::StowageError;
pub use types::{
    AdapterType, Barcode, BillingEvent, CanonicalEvent, HealthStatus, Plan, ProductInfo,
    ProductSource, StateTransition, SubscriptionRecord, SubscriptionStatus, WebhookEnvelope,
};

pub use traits::{
    CachePolicy, Clock, EventClassifier, PluginAdapter, ProductProvider, ProviderHit,
    ProviderOutcome, StorageAdapter, SystemClock,
};
