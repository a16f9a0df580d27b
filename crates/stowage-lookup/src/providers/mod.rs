// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External product providers and the default lookup chain.

pub mod google_books;
pub mod open_food_facts;
pub mod open_library;
pub mod upcitemdb;

use std::sync::Arc;

use serde_json::Value;
use stowage_config::model::LookupConfig;
use stowage_core::{ProductProvider, StowageError};
use tracing::info;

use crate::client::ProviderClient;

pub use google_books::GoogleBooksProvider;
pub use open_food_facts::OpenFoodFactsProvider;
pub use open_library::OpenLibraryProvider;
pub use upcitemdb::UpcItemDbProvider;

/// Build the provider chain in lookup order: the book providers first, then
/// Open Food Facts, then UPCitemdb. Disabled providers are left out.
pub fn build_providers(
    config: &LookupConfig,
) -> Result<Vec<Arc<dyn ProductProvider>>, StowageError> {
    let client = ProviderClient::from_config(config)?;
    let mut providers: Vec<Arc<dyn ProductProvider>> = Vec::new();

    if config.open_library.enabled {
        providers.push(Arc::new(OpenLibraryProvider::new(
            client.clone(),
            config.open_library.base_url.as_deref(),
        )));
    }
    if config.google_books.enabled {
        providers.push(Arc::new(GoogleBooksProvider::new(
            client.clone(),
            config.google_books.base_url.as_deref(),
            config.google_books.api_key.clone(),
        )));
    }
    if config.open_food_facts.enabled {
        providers.push(Arc::new(OpenFoodFactsProvider::new(
            client.clone(),
            config.open_food_facts.base_url.as_deref(),
        )));
    }
    if config.upcitemdb.enabled {
        providers.push(Arc::new(UpcItemDbProvider::new(
            client,
            config.upcitemdb.base_url.as_deref(),
            config.upcitemdb.api_key.clone(),
        )));
    }

    info!(
        providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
        "lookup provider chain built"
    );
    Ok(providers)
}

/// Join a base URL and path, then append query parameters.
pub(crate) fn endpoint(
    base_url: &str,
    path: &str,
    params: &[(&str, &str)],
) -> Result<reqwest::Url, StowageError> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), path);
    reqwest::Url::parse_with_params(&raw, params)
        .map_err(|e| StowageError::Config(format!("invalid provider url `{raw}`: {e}")))
}

/// A trimmed, non-empty string field.
pub(crate) fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Non-empty strings from an array of strings.
pub(crate) fn text_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `name` fields from an array of objects, as Open Library returns them.
pub(crate) fn names(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|item| text(item, "name")).collect())
        .unwrap_or_default()
}

/// Split a comma-separated field, dropping blanks.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
