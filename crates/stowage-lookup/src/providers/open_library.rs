// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Open Library books API.

use async_trait::async_trait;
use serde_json::Value;
use stowage_core::{
    Barcode, ProductInfo, ProductProvider, ProductSource, ProviderHit, ProviderOutcome,
    StowageError,
};

use super::{endpoint, names, text};
use crate::client::ProviderClient;

const DEFAULT_BASE_URL: &str = "https://openlibrary.org";

pub struct OpenLibraryProvider {
    client: ProviderClient,
    base_url: String,
}

impl OpenLibraryProvider {
    pub fn new(client: ProviderClient, base_url: Option<&str>) -> Self {
        Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
        }
    }
}

#[async_trait]
impl ProductProvider for OpenLibraryProvider {
    fn name(&self) -> &str {
        "open_library"
    }

    fn source(&self) -> ProductSource {
        ProductSource::OpenLibrary
    }

    fn supports(&self, barcode: &Barcode) -> bool {
        barcode.is_isbn()
    }

    async fn try_lookup(&self, barcode: &Barcode) -> Result<ProviderOutcome, StowageError> {
        let bibkey = format!("ISBN:{barcode}");
        let url = endpoint(
            &self.base_url,
            "/api/books",
            &[("bibkeys", bibkey.as_str()), ("format", "json"), ("jscmd", "data")],
        )?;
        let Some(body) = self.client.get_json(self.name(), url, &[]).await? else {
            return Ok(ProviderOutcome::Miss);
        };
        let Some(book) = body.get(&bibkey) else {
            return Ok(ProviderOutcome::Miss);
        };
        Ok(match normalize(barcode, book) {
            Some(product) => ProviderOutcome::Found(ProviderHit {
                product,
                raw: book.clone(),
            }),
            None => ProviderOutcome::Miss,
        })
    }
}

fn normalize(barcode: &Barcode, book: &Value) -> Option<ProductInfo> {
    let title = text(book, "title")?;
    let name = match text(book, "subtitle") {
        Some(subtitle) => format!("{title}: {subtitle}"),
        None => title,
    };

    let mut product = ProductInfo::new(barcode.as_str(), name, ProductSource::OpenLibrary);
    let authors = names(book, "authors");
    if !authors.is_empty() {
        product.brand = Some(authors.join(", "));
    }
    product.category = Some("Book".to_string());
    product.image_url = book.get("cover").and_then(|cover| {
        text(cover, "large")
            .or_else(|| text(cover, "medium"))
            .or_else(|| text(cover, "small"))
    });

    let publishers = names(book, "publishers");
    if !publishers.is_empty() {
        product.features.push(format!("Publisher: {}", publishers.join(", ")));
    }
    if let Some(pages) = book.get("number_of_pages").and_then(Value::as_u64) {
        product.features.push(format!("Pages: {pages}"));
    }
    if let Some(date) = text(book, "publish_date") {
        product.features.push(format!("Published: {date}"));
    }

    // `notes` is either a string or `{type, value}`.
    product.description = book
        .get("notes")
        .and_then(|notes| {
            notes
                .as_str()
                .map(str::to_string)
                .or_else(|| text(notes, "value"))
        })
        .or_else(|| {
            book.get("excerpts")
                .and_then(Value::as_array)
                .and_then(|excerpts| excerpts.first())
                .and_then(|first| text(first, "text"))
        });

    Some(product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenLibraryProvider {
        let client =
            ProviderClient::new("t", Duration::from_secs(2), 1, Duration::from_millis(1)).unwrap();
        OpenLibraryProvider::new(client, Some(&server.uri()))
    }

    #[test]
    fn only_isbns_are_supported() {
        let client =
            ProviderClient::new("t", Duration::from_secs(2), 1, Duration::from_millis(1)).unwrap();
        let p = OpenLibraryProvider::new(client, None);
        assert!(p.supports(&Barcode::parse("9780140328721").unwrap()));
        assert!(!p.supports(&Barcode::parse("012345678905").unwrap()));
    }

    #[test]
    fn normalizes_book() {
        let book = json!({
            "title": "Fantastic Mr Fox",
            "subtitle": "A Story",
            "authors": [{"name": "Roald Dahl"}],
            "publishers": [{"name": "Puffin"}],
            "number_of_pages": 96,
            "cover": {"medium": "https://covers.test/m.jpg", "small": "https://covers.test/s.jpg"},
            "notes": {"type": "/type/text", "value": "A fox outwits three farmers."}
        });
        let barcode = Barcode::parse("9780140328721").unwrap();
        let product = normalize(&barcode, &book).unwrap();
        assert_eq!(product.name, "Fantastic Mr Fox: A Story");
        assert_eq!(product.brand.as_deref(), Some("Roald Dahl"));
        assert_eq!(product.category.as_deref(), Some("Book"));
        assert_eq!(product.image_url.as_deref(), Some("https://covers.test/m.jpg"));
        assert_eq!(product.features, vec!["Publisher: Puffin", "Pages: 96"]);
        assert_eq!(product.description.as_deref(), Some("A fox outwits three farmers."));
        assert_eq!(product.source, ProductSource::OpenLibrary);
    }

    #[test]
    fn untitled_book_is_a_miss() {
        let barcode = Barcode::parse("9780140328721").unwrap();
        assert!(normalize(&barcode, &json!({"authors": []})).is_none());
    }

    #[tokio::test]
    async fn fetches_by_bibkey() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/books"))
            .and(query_param("bibkeys", "ISBN:9780140328721"))
            .and(query_param("jscmd", "data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ISBN:9780140328721": {"title": "Fantastic Mr Fox"}
            })))
            .mount(&server)
            .await;

        let barcode = Barcode::parse("9780140328721").unwrap();
        let outcome = provider(&server).try_lookup(&barcode).await.unwrap();
        let ProviderOutcome::Found(hit) = outcome else {
            panic!("expected a hit");
        };
        assert_eq!(hit.product.name, "Fantastic Mr Fox");
        assert_eq!(hit.raw["title"], "Fantastic Mr Fox");
    }

    #[tokio::test]
    async fn empty_response_is_a_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/books"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let barcode = Barcode::parse("9780140328721").unwrap();
        let outcome = provider(&server).try_lookup(&barcode).await.unwrap();
        assert!(matches!(outcome, ProviderOutcome::Miss));
    }
}
