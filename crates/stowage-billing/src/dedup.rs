// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dedup key derivation for billing events.
//!
//! Provider-assigned ids are authoritative. Without one, the key is a digest
//! of the fields that identify a transaction, so a redelivered payload maps
//! to the same ledger row.

use sha2::{Digest, Sha256};
use stowage_core::CanonicalEvent;

/// Derive the ledger dedup key for an event.
///
/// `evt:<id>` when the provider supplied an id, else `sha256:<hex>` over
/// subscriber, type, product, original_txn, txn_ms and exp_ms, each written
/// as `<byte length>:<value>` so no two field lists share an encoding.
/// Absent fields are empty.
pub fn dedup_key(event: &CanonicalEvent) -> String {
    if let Some(id) = &event.provider_event_id {
        return format!("evt:{id}");
    }

    let txn_ms = event.transaction_at_ms.map(|v| v.to_string());
    let exp_ms = event.expiration_at_ms.map(|v| v.to_string());
    let fields = [
        event.subscriber_id.as_str(),
        event.event_type.as_str(),
        event.product_id.as_deref().unwrap_or_default(),
        event.original_transaction_id.as_deref().unwrap_or_default(),
        txn_ms.as_deref().unwrap_or_default(),
        exp_ms.as_deref().unwrap_or_default(),
    ];

    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(format!("{}:{field}", field.len()).as_bytes());
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
