// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.
//!
//! Subscription records are defined in `stowage-core::types` because they
//! cross the engine boundary; they are re-exported here for convenience.

use std::collections::BTreeMap;

use serde::Serialize;

pub use stowage_core::types::{ProductInfo, SubscriptionRecord};

/// A billing event about to be appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWebhookEvent {
    pub dedup_key: String,
    pub provider_event_id: Option<String>,
    pub subscriber_id: String,
    pub event_type: String,
    pub product_id: Option<String>,
    pub entitlement_id: Option<String>,
    pub original_transaction_id: Option<String>,
    pub transaction_at_ms: Option<i64>,
    pub expiration_at_ms: Option<i64>,
    /// Raw event JSON, kept so retries can re-process without the caller.
    pub payload: String,
    pub received_at: String,
}

/// A ledgered event that was neither processed nor handed to the retry queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnprocessedEvent {
    pub id: i64,
    pub subscriber_id: String,
    pub payload: String,
    pub received_at: String,
}

/// A retry queue row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryEntry {
    pub id: i64,
    pub event_id: i64,
    pub subscriber_id: String,
    pub payload: String,
    pub error_message: String,
    pub attempt_count: u32,
    pub next_retry_at: Option<String>,
    pub dead_lettered: bool,
    pub dead_lettered_at: Option<String>,
    pub resolved_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for scheduling or dead-lettering a retry.
#[derive(Debug, Clone)]
pub struct RetryWrite {
    pub event_id: i64,
    pub subscriber_id: String,
    pub payload: String,
    pub error_message: String,
    pub attempt: u32,
    pub now: String,
}

/// A product cache row.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedProduct {
    pub product: ProductInfo,
    pub raw_payload: Option<serde_json::Value>,
    pub cached_at: String,
}

/// Subscription counts for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_plan: BTreeMap<String, u64>,
}
