// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Open Food Facts product API.

use async_trait::async_trait;
use serde_json::Value;
use stowage_core::{
    Barcode, ProductInfo, ProductProvider, ProductSource, ProviderHit, ProviderOutcome,
    StowageError,
};

use super::{endpoint, split_list, text};
use crate::client::ProviderClient;

const DEFAULT_BASE_URL: &str = "https://world.openfoodfacts.org";

pub struct OpenFoodFactsProvider {
    client: ProviderClient,
    base_url: String,
}

impl OpenFoodFactsProvider {
    pub fn new(client: ProviderClient, base_url: Option<&str>) -> Self {
        Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
        }
    }
}

#[async_trait]
impl ProductProvider for OpenFoodFactsProvider {
    fn name(&self) -> &str {
        "open_food_facts"
    }

    fn source(&self) -> ProductSource {
        ProductSource::OpenFoodFacts
    }

    fn supports(&self, _barcode: &Barcode) -> bool {
        true
    }

    async fn try_lookup(&self, barcode: &Barcode) -> Result<ProviderOutcome, StowageError> {
        let url = endpoint(
            &self.base_url,
            &format!("/api/v2/product/{barcode}.json"),
            &[],
        )?;
        let Some(body) = self.client.get_json(self.name(), url, &[]).await? else {
            return Ok(ProviderOutcome::Miss);
        };
        if body.get("status").and_then(Value::as_i64) != Some(1) {
            return Ok(ProviderOutcome::Miss);
        }
        let Some(item) = body.get("product") else {
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
    let name = text(item, "product_name").or_else(|| text(item, "generic_name"))?;

    let mut product = ProductInfo::new(barcode.as_str(), name, ProductSource::OpenFoodFacts);
    product.brand = text(item, "brands").and_then(|b| split_list(&b).into_iter().next());
    product.category = text(item, "categories").and_then(|c| {
        split_list(&c)
            .into_iter()
            .next_back()
            .map(|last| humanize_tag(&last))
    });
    product.image_url = text(item, "image_url").or_else(|| text(item, "image_front_url"));
    product.size = text(item, "quantity");
    product.ingredients = text(item, "ingredients_text");
    product.features = text(item, "labels")
        .map(|labels| split_list(&labels).iter().map(|l| humanize_tag(l)).collect())
        .unwrap_or_default();
    Some(product)
}

/// `en:plant-based-foods` -> `plant based foods`.
fn humanize_tag(tag: &str) -> String {
    let tag = match tag.split_once(':') {
        Some((lang, rest)) if lang.len() == 2 => rest,
        _ => tag,
    };
    tag.replace('-', " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenFoodFactsProvider {
        let client =
            ProviderClient::new("t", Duration::from_secs(2), 1, Duration::from_millis(1)).unwrap();
        OpenFoodFactsProvider::new(client, Some(&server.uri()))
    }

    #[test]
    fn humanizes_tags() {
        assert_eq!(humanize_tag("en:plant-based-foods"), "plant based foods");
        assert_eq!(humanize_tag("Spreads"), "Spreads");
        assert_eq!(humanize_tag("https://x"), "https://x");
    }

    #[test]
    fn normalizes_product() {
        let item = json!({
            "product_name": "Nutella",
            "brands": "Ferrero, Nutella",
            "categories": "Spreads, Sweet spreads, en:hazelnut-spreads",
            "image_url": "https://off.test/n.jpg",
            "quantity": "400 g",
            "ingredients_text": "Sugar, palm oil, hazelnuts",
            "labels": "en:gluten-free, Vegetarian"
        });
        let barcode = Barcode::parse("3017620422003").unwrap();
        let product = normalize(&barcode, &item).unwrap();
        assert_eq!(product.name, "Nutella");
        assert_eq!(product.brand.as_deref(), Some("Ferrero"));
        assert_eq!(product.category.as_deref(), Some("hazelnut spreads"));
        assert_eq!(product.size.as_deref(), Some("400 g"));
        assert_eq!(product.ingredients.as_deref(), Some("Sugar, palm oil, hazelnuts"));
        assert_eq!(product.features, vec!["gluten free", "Vegetarian"]);
    }

    #[tokio::test]
    async fn status_zero_is_a_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/product/3017620422003.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 0,
                "status_verbose": "product not found"
            })))
            .mount(&server)
            .await;

        let barcode = Barcode::parse("3017620422003").unwrap();
        let outcome = provider(&server).try_lookup(&barcode).await.unwrap();
        assert!(matches!(outcome, ProviderOutcome::Miss));
    }

    #[tokio::test]
    async fn found_product() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/product/3017620422003.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 1,
                "product": {"product_name": "Nutella", "brands": "Ferrero"}
            })))
            .mount(&server)
            .await;

        let barcode = Barcode::parse("3017620422003").unwrap();
        let ProviderOutcome::Found(hit) = provider(&server).try_lookup(&barcode).await.unwrap()
        else {
            panic!("expected a hit");
        };
        assert_eq!(hit.product.source, ProductSource::OpenFoodFacts);
        assert_eq!(hit.raw["product_name"], "Nutella");
    }
}
