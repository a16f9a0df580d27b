// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Implementation of the `stowage lookup` command.

use colored::Colorize;
use stowage_config::StowageConfig;
use stowage_core::{ProductInfo, StorageAdapter, StowageError};
use stowage_lookup::LookupEngine;

use crate::serve::open_storage;

/// Resolve one barcode through the cache and provider chain and print it.
pub async fn run_lookup(config: StowageConfig, code: &str, json: bool) -> Result<(), StowageError> {
    let storage = open_storage(&config).await?;
    let engine = LookupEngine::from_config(storage.database()?, &config.lookup)?;

    let result = engine.lookup(code).await;
    storage.close().await?;
    let product = result?;

    if json {
        let rendered = serde_json::to_string_pretty(&product)
            .map_err(|e| StowageError::Internal(format!("failed to render product: {e}")))?;
        println!("{rendered}");
    } else {
        print_product(&product);
    }
    Ok(())
}

fn print_product(product: &ProductInfo) {
    println!("\n  {}  {}", product.name.bold(), format!("({})", product.source).dimmed());
    println!("  {:<12} {}", "barcode", product.barcode);

    let optional = [
        ("brand", &product.brand),
        ("category", &product.category),
        ("size", &product.size),
        ("color", &product.color),
        ("image", &product.image_url),
        ("description", &product.description),
        ("ingredients", &product.ingredients),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            println!("  {label:<12} {value}");
        }
    }
    for feature in &product.features {
        println!("  {:<12} {}", "-", feature);
    }
    println!();
}
