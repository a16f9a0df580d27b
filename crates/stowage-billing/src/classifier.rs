// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event type classification.

use stowage_core::{
    CanonicalEvent, EventClassifier, StateTransition, StowageError, SubscriptionStatus,
};
use stowage_storage::timestamp::timestamp_from_millis;
use tracing::warn;

use crate::plans::PlanCatalog;

/// Map a provider event type to the status it implies.
///
/// Total: matching ignores case and treats spaces and hyphens as
/// underscores, and anything unrecognized is `Free`.
pub fn status_for_event_type(event_type: &str) -> SubscriptionStatus {
    let normalized: String = event_type
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();

    match normalized.as_str() {
        "INITIAL_PURCHASE"
        | "RENEWAL"
        | "NON_RENEWING_PURCHASE"
        | "UNCANCELLATION"
        | "PRODUCT_CHANGE"
        | "SUBSCRIPTION_EXTENDED" => SubscriptionStatus::Active,
        "EXPIRATION" | "BILLING_ISSUE" => SubscriptionStatus::Expired,
        "CANCELLATION" | "SUBSCRIPTION_PAUSED" | "TRANSFER" => SubscriptionStatus::Canceled,
        _ => SubscriptionStatus::Free,
    }
}

/// The production classifier: event type table plus plan catalog.
#[derive(Debug, Clone, Default)]
pub struct StatusClassifier {
    catalog: PlanCatalog,
}

impl StatusClassifier {
    pub fn new(catalog: PlanCatalog) -> Self {
        Self { catalog }
    }
}

impl EventClassifier for StatusClassifier {
    fn classify(&self, event: &CanonicalEvent) -> Result<StateTransition, StowageError> {
        let status = status_for_event_type(&event.event_type);

        // A free subscriber holds no plan, whatever product the event names.
        let plan = match (&event.product_id, status) {
            (_, SubscriptionStatus::Free) | (None, _) => None,
            (Some(product_id), _) => {
                let plan = self.catalog.resolve(product_id);
                if plan.is_none() {
                    warn!(
                        product_id = %product_id,
                        subscriber_id = %event.subscriber_id,
                        "unknown product id, recording no plan"
                    );
                }
                plan
            }
        };

        let renews_at = event.expiration_at_ms.and_then(timestamp_from_millis);

        Ok(StateTransition {
            status,
            plan,
            renews_at,
        })
    }
}
