// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the reconciliation and lookup engines.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::StowageError;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Observability,
}

// --- Subscriptions ---

/// Canonical subscription status of a subscriber.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Free,
    Active,
    Expired,
    Canceled,
}

impl SubscriptionStatus {
    /// All statuses, in reporting order.
    pub const ALL: [SubscriptionStatus; 4] = [
        SubscriptionStatus::Free,
        SubscriptionStatus::Active,
        SubscriptionStatus::Expired,
        SubscriptionStatus::Canceled,
    ];
}

/// Commercial plan tier a subscriber pays for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    ProMonthly,
    ProYearly,
    ProLifetime,
}

/// Persisted subscription state for one subscriber identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub subscriber_id: String,
    pub status: SubscriptionStatus,
    pub plan: Option<Plan>,
    /// ISO 8601 renewal/expiration timestamp, when known.
    pub renews_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// The state a classified event asks the store to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub status: SubscriptionStatus,
    pub plan: Option<Plan>,
    pub renews_at: Option<String>,
}

// --- Billing webhook payloads ---

/// Envelope posted by the billing provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// Token echoed back by the provider when no header is configured.
    #[serde(default)]
    pub authorization: Option<String>,
    #[serde(default)]
    pub event: Option<BillingEvent>,
}

/// A raw billing event as delivered by the provider.
///
/// Every field is optional on the wire; [`BillingEvent::validate`] enforces
/// the fields ingestion needs. Unknown fields are preserved in `extra` so the
/// payload snapshot stored for retries is lossless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entitlement_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entitlement_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_transaction_id: Option<String>,
    #[serde(
        default,
        alias = "purchased_at_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_at_ms: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A billing event whose required fields have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEvent {
    pub provider_event_id: Option<String>,
    pub subscriber_id: String,
    pub event_type: String,
    pub product_id: Option<String>,
    pub entitlement_ids: Vec<String>,
    pub original_transaction_id: Option<String>,
    pub transaction_at_ms: Option<i64>,
    pub expiration_at_ms: Option<i64>,
}

impl BillingEvent {
    /// Check required fields and produce the canonical form.
    pub fn validate(&self) -> Result<CanonicalEvent, StowageError> {
        let subscriber_id = non_blank(self.app_user_id.as_deref())
            .ok_or_else(|| StowageError::Validation("event.app_user_id is required".into()))?;
        let event_type = non_blank(self.event_type.as_deref())
            .ok_or_else(|| StowageError::Validation("event.type is required".into()))?;

        let mut entitlement_ids: Vec<String> = self.entitlement_ids.clone().unwrap_or_default();
        if let Some(id) = non_blank(self.entitlement_id.as_deref()) {
            if !entitlement_ids.iter().any(|e| e == id) {
                entitlement_ids.insert(0, id.to_string());
            }
        }

        Ok(CanonicalEvent {
            provider_event_id: non_blank(self.id.as_deref()).map(str::to_string),
            subscriber_id: subscriber_id.to_string(),
            event_type: event_type.to_string(),
            product_id: non_blank(self.product_id.as_deref()).map(str::to_string),
            entitlement_ids,
            original_transaction_id: non_blank(self.original_transaction_id.as_deref())
                .map(str::to_string),
            transaction_at_ms: self.transaction_at_ms,
            expiration_at_ms: self.expiration_at_ms,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// --- Product lookup ---

/// Which source satisfied a product lookup.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductSource {
    Cache,
    OpenLibrary,
    GoogleBooks,
    OpenFoodFacts,
    Upcitemdb,
}

/// Normalized product information, independent of the provider schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub barcode: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub ingredients: Option<String>,
    pub source: ProductSource,
}

impl ProductInfo {
    /// An empty product carrying only its key, name, and source.
    pub fn new(barcode: impl Into<String>, name: impl Into<String>, source: ProductSource) -> Self {
        Self {
            barcode: barcode.into(),
            name: name.into(),
            description: None,
            brand: None,
            color: None,
            size: None,
            category: None,
            image_url: None,
            features: Vec::new(),
            ingredients: None,
            source,
        }
    }
}

/// A validated external product key (UPC, EAN, or ISBN-13).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Barcode(String);

impl Barcode {
    /// Parse a user-supplied key. Hyphens and spaces are ignored; the rest
    /// must be 8 to 14 ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, StowageError> {
        let digits: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != ' ')
            .collect();
        if !(8..=14).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StowageError::Validation(format!(
                "barcode `{raw}` must be 8 to 14 digits"
            )));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for EAN-13 ISBNs (`978`/`979` prefix).
    pub fn is_isbn(&self) -> bool {
        self.0.len() == 13 && (self.0.starts_with("978") || self.0.starts_with("979"))
    }
}

impl std::fmt::Display for Barcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn billing_event_preserves_unknown_fields() {
        let json = r#"{"type":"RENEWAL","app_user_id":"u1","store":"APP_STORE"}"#;
        let event: BillingEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type.as_deref(), Some("RENEWAL"));
        assert_eq!(event.extra.get("store").and_then(|v| v.as_str()), Some("APP_STORE"));

        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back["store"], "APP_STORE");
        assert_eq!(back["type"], "RENEWAL");
    }

    #[test]
    fn purchased_at_ms_is_accepted_as_transaction_time() {
        let json = r#"{"type":"RENEWAL","app_user_id":"u1","purchased_at_ms":1700000000000}"#;
        let event: BillingEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.transaction_at_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn validate_requires_subscriber_and_type() {
        let missing_user = BillingEvent {
            event_type: Some("RENEWAL".into()),
            ..Default::default()
        };
        assert!(matches!(missing_user.validate(), Err(StowageError::Validation(_))));

        let blank_type = BillingEvent {
            event_type: Some("   ".into()),
            app_user_id: Some("u1".into()),
            ..Default::default()
        };
        assert!(matches!(blank_type.validate(), Err(StowageError::Validation(_))));
    }

    #[test]
    fn validate_merges_entitlement_fields() {
        let event = BillingEvent {
            event_type: Some("RENEWAL".into()),
            app_user_id: Some("u1".into()),
            entitlement_id: Some("premium".into()),
            entitlement_ids: Some(vec!["premium".into(), "extras".into()]),
            ..Default::default()
        };
        let canonical = event.validate().unwrap();
        assert_eq!(canonical.entitlement_ids, vec!["premium", "extras"]);
    }

    #[test]
    fn status_and_plan_string_forms() {
        assert_eq!(SubscriptionStatus::Canceled.to_string(), "canceled");
        assert_eq!(Plan::ProMonthly.to_string(), "pro_monthly");
        assert_eq!(Plan::from_str("pro_yearly").unwrap(), Plan::ProYearly);
        assert_eq!(
            serde_json::to_string(&SubscriptionStatus::Active).unwrap(),
            "\"active\""
        );
        assert_eq!(ProductSource::Upcitemdb.to_string(), "upcitemdb");
        assert_eq!(ProductSource::OpenFoodFacts.to_string(), "open_food_facts");
    }

    #[test]
    fn barcode_parsing() {
        assert_eq!(Barcode::parse(" 978-0-13-468599-1 ").unwrap().as_str(), "9780134685991");
        assert!(Barcode::parse("1234567").is_err());
        assert!(Barcode::parse("12345678901234567").is_err());
        assert!(Barcode::parse("0123abc456789").is_err());
    }

    #[test]
    fn isbn_detection() {
        assert!(Barcode::parse("9780134685991").unwrap().is_isbn());
        assert!(Barcode::parse("9791032305690").unwrap().is_isbn());
        assert!(!Barcode::parse("0885909950805").unwrap().is_isbn());
        assert!(!Barcode::parse("978013468599").unwrap().is_isbn());
    }

    #[test]
    fn product_info_uses_camel_case_on_the_wire() {
        let mut info = ProductInfo::new("0885909950805", "Widget", ProductSource::Upcitemdb);
        info.image_url = Some("https://img.example/w.png".into());
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["imageUrl"], "https://img.example/w.png");
        assert_eq!(json["source"], "upcitemdb");
    }
}
