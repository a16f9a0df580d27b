// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Books volumes API.

use async_trait::async_trait;
use serde_json::Value;
use stowage_core::{
    Barcode, ProductInfo, ProductProvider, ProductSource, ProviderHit, ProviderOutcome,
    StowageError,
};

use super::{endpoint, text, text_list};
use crate::client::ProviderClient;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

pub struct GoogleBooksProvider {
    client: ProviderClient,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksProvider {
    pub fn new(client: ProviderClient, base_url: Option<&str>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl ProductProvider for GoogleBooksProvider {
    fn name(&self) -> &str {
        "google_books"
    }

    fn source(&self) -> ProductSource {
        ProductSource::GoogleBooks
    }

    fn supports(&self, barcode: &Barcode) -> bool {
        barcode.is_isbn()
    }

    async fn try_lookup(&self, barcode: &Barcode) -> Result<ProviderOutcome, StowageError> {
        let query = format!("isbn:{barcode}");
        let mut params = vec![("q", query.as_str())];
        if let Some(key) = &self.api_key {
            params.push(("key", key.as_str()));
        }
        let url = endpoint(&self.base_url, "/books/v1/volumes", &params)?;

        let Some(body) = self.client.get_json(self.name(), url, &[]).await? else {
            return Ok(ProviderOutcome::Miss);
        };
        let Some(volume) = body
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(|item| item.get("volumeInfo"))
        else {
            return Ok(ProviderOutcome::Miss);
        };

        Ok(match normalize(barcode, volume) {
            Some(product) => ProviderOutcome::Found(ProviderHit {
                product,
                raw: volume.clone(),
            }),
            None => ProviderOutcome::Miss,
        })
    }
}

fn normalize(barcode: &Barcode, volume: &Value) -> Option<ProductInfo> {
    let title = text(volume, "title")?;
    let name = match text(volume, "subtitle") {
        Some(subtitle) => format!("{title}: {subtitle}"),
        None => title,
    };

    let mut product = ProductInfo::new(barcode.as_str(), name, ProductSource::GoogleBooks);
    let authors = text_list(volume, "authors");
    if !authors.is_empty() {
        product.brand = Some(authors.join(", "));
    }
    product.description = text(volume, "description");
    product.category = Some("Book".to_string());
    product.image_url = volume
        .get("imageLinks")
        .and_then(|links| text(links, "thumbnail").or_else(|| text(links, "smallThumbnail")));

    if let Some(publisher) = text(volume, "publisher") {
        product.features.push(format!("Publisher: {publisher}"));
    }
    if let Some(pages) = volume.get("pageCount").and_then(Value::as_u64) {
        product.features.push(format!("Pages: {pages}"));
    }
    let categories = text_list(volume, "categories");
    if !categories.is_empty() {
        product.features.push(format!("Categories: {}", categories.join(", ")));
    }

    Some(product)
}
