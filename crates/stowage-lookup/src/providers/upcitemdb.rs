// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! UPCitemdb lookup API.
//!
//! Without an API key the rate-limited trial endpoint is used. Hits are
//! cached insert-if-absent so a trial answer never overwrites a better row.

use async_trait::async_trait;
use serde_json::Value;
use stowage_core::{
    Barcode, CachePolicy, ProductInfo, ProductProvider, ProductSource, ProviderHit,
    ProviderOutcome, StowageError,
};

use super::{endpoint, text, text_list};
use crate::client::ProviderClient;

const DEFAULT_BASE_URL: &str = "https://api.upcitemdb.com";

pub struct UpcItemDbProvider {
    client: ProviderClient,
    base_url: String,
    api_key: Option<String>,
}

impl UpcItemDbProvider {
    pub fn new(client: ProviderClient, base_url: Option<&str>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl ProductProvider for UpcItemDbProvider {
    fn name(&self) -> &str {
        "upcitemdb"
    }

    fn source(&self) -> ProductSource {
        ProductSource::Upcitemdb
    }

    fn supports(&self, _barcode: &Barcode) -> bool {
        true
    }

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::InsertIfAbsent
    }

    async fn try_lookup(&self, barcode: &Barcode) -> Result<ProviderOutcome, StowageError> {
        let params = [("upc", barcode.as_str())];
        let (url, headers) = match &self.api_key {
            Some(key) => (
                endpoint(&self.base_url, "/prod/v1/lookup", &params)?,
                vec![("user_key", key.clone()), ("key_type", "3scale".to_string())],
            ),
            None => (endpoint(&self.base_url, "/prod/trial/lookup", &params)?, Vec::new()),
        };

        let Some(body) = self.client.get_json(self.name(), url, &headers).await? else {
            return Ok(ProviderOutcome::Miss);
        };
        let Some(item) = body
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
        else {
            return Ok(ProviderOutcome::Miss);
        };

        Ok(match normalize(barcode, item) {
            Some(product) => ProviderOutcome::Found(ProviderHit {
                product,
                raw: item.clone(),
            }),
            None => ProviderOutcome::Miss,
        })
    }
}

fn normalize(barcode: &Barcode, item: &Value) -> Option<ProductInfo> {
    let name = text(item, "title")?;

    let mut product = ProductInfo::new(barcode.as_str(), name, ProductSource::Upcitemdb);
    product.description = text(item, "description");
    product.brand = text(item, "brand");
    product.color = text(item, "color");
    product.size = text(item, "size");
    product.category = text(item, "category");
    product.image_url = text_list(item, "images").into_iter().next();

    for (key, label) in [("model", "Model"), ("dimension", "Dimensions"), ("weight", "Weight")] {
        if let Some(value) = text(item, key) {
            product.features.push(format!("{label}: {value}"));
        }
    }
    Some(product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> ProviderClient {
        ProviderClient::new("t", Duration::from_secs(2), 1, Duration::from_millis(1)).unwrap()
    }

    fn body() -> Value {
        json!({
            "code": "OK",
            "total": 1,
            "items": [{
                "title": "Stainless Bottle",
                "brand": "Hydro",
                "color": "Blue",
                "category": "Kitchen",
                "images": ["https://upc.test/1.jpg", "https://upc.test/2.jpg"],
                "model": "HB-32",
                "weight": "0.5 lb"
            }]
        })
    }

    #[tokio::test]
    async fn trial_endpoint_without_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/prod/trial/lookup"))
            .and(query_param("upc", "012345678905"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = UpcItemDbProvider::new(client(), Some(&server.uri()), None);
        let barcode = Barcode::parse("012345678905").unwrap();
        let ProviderOutcome::Found(hit) = provider.try_lookup(&barcode).await.unwrap() else {
            panic!("expected a hit");
        };
        assert_eq!(hit.product.name, "Stainless Bottle");
        assert_eq!(hit.product.color.as_deref(), Some("Blue"));
        assert_eq!(hit.product.image_url.as_deref(), Some("https://upc.test/1.jpg"));
        assert_eq!(hit.product.features, vec!["Model: HB-32", "Weight: 0.5 lb"]);
        assert_eq!(provider.cache_policy(), CachePolicy::InsertIfAbsent);
    }

    #[tokio::test]
    async fn paid_endpoint_with_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/prod/v1/lookup"))
            .and(header("user_key", "upc-key"))
            .and(header("key_type", "3scale"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body()))
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            UpcItemDbProvider::new(client(), Some(&server.uri()), Some("upc-key".into()));
        let barcode = Barcode::parse("012345678905").unwrap();
        assert!(matches!(
            provider.try_lookup(&barcode).await.unwrap(),
            ProviderOutcome::Found(_)
        ));
    }

    #[tokio::test]
    async fn empty_items_is_a_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/prod/trial/lookup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "OK", "items": []})))
            .mount(&server)
            .await;

        let provider = UpcItemDbProvider::new(client(), Some(&server.uri()), None);
        let barcode = Barcode::parse("012345678905").unwrap();
        assert!(matches!(
            provider.try_lookup(&barcode).await.unwrap(),
            ProviderOutcome::Miss
        ));
    }
}
