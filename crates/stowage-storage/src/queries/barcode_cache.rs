// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Product lookup cache keyed by barcode.
//!
//! Stale rows are never deleted; freshness is decided at read time against
//! a caller-supplied cutoff.

use rusqlite::{OptionalExtension, params};
use stowage_core::{ProductInfo, StowageError};

use crate::database::Database;
use crate::models::CachedProduct;

type CacheRow = (String, Option<String>, String);

fn decode(row: CacheRow) -> Result<CachedProduct, StowageError> {
    let (product_json, raw_payload, cached_at) = row;
    let product: ProductInfo =
        serde_json::from_str(&product_json).map_err(|e| StowageError::Storage {
            source: Box::new(e),
        })?;
    // A corrupt raw payload is not worth failing the read over.
    let raw_payload = raw_payload.and_then(|raw| serde_json::from_str(&raw).ok());
    Ok(CachedProduct {
        product,
        raw_payload,
        cached_at,
    })
}

/// A cached product whose `cached_at` is strictly after `fresh_after`.
pub async fn get_fresh(
    db: &Database,
    barcode: &str,
    fresh_after: &str,
) -> Result<Option<CachedProduct>, StowageError> {
    let barcode = barcode.to_string();
    let fresh_after = fresh_after.to_string();
    let row: Option<CacheRow> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT product_json, raw_payload, cached_at FROM barcode_cache
                 WHERE barcode = ?1 AND cached_at > ?2",
                params![barcode, fresh_after],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    row.map(decode).transpose()
}

/// A cached product regardless of age.
pub async fn get(db: &Database, barcode: &str) -> Result<Option<CachedProduct>, StowageError> {
    let barcode = barcode.to_string();
    let row: Option<CacheRow> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT product_json, raw_payload, cached_at FROM barcode_cache
                 WHERE barcode = ?1",
                params![barcode],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    row.map(decode).transpose()
}

/// Write a product, replacing any existing row for the barcode.
pub async fn upsert(
    db: &Database,
    product: &ProductInfo,
    raw_payload: Option<&serde_json::Value>,
    now: &str,
) -> Result<(), StowageError> {
    write(db, product, raw_payload, now, true).await.map(|_| ())
}

/// Write a product only when the barcode has no row yet. Returns whether it was written.
pub async fn insert_if_absent(
    db: &Database,
    product: &ProductInfo,
    raw_payload: Option<&serde_json::Value>,
    now: &str,
) -> Result<bool, StowageError> {
    write(db, product, raw_payload, now, false).await
}

async fn write(
    db: &Database,
    product: &ProductInfo,
    raw_payload: Option<&serde_json::Value>,
    now: &str,
    replace: bool,
) -> Result<bool, StowageError> {
    let product_json = serde_json::to_string(product).map_err(|e| StowageError::Storage {
        source: Box::new(e),
    })?;
    let raw_payload = raw_payload.map(|v| v.to_string());
    let product = product.clone();
    let source = product.source.to_string();
    let now = now.to_string();

    let conflict = if replace {
        "ON CONFLICT(barcode) DO UPDATE SET
            product_name = excluded.product_name,
            brand = excluded.brand,
            category = excluded.category,
            image_url = excluded.image_url,
            size = excluded.size,
            source = excluded.source,
            product_json = excluded.product_json,
            raw_payload = excluded.raw_payload,
            cached_at = excluded.cached_at"
    } else {
        "ON CONFLICT(barcode) DO NOTHING"
    };

    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "INSERT INTO barcode_cache
                        (barcode, product_name, brand, category, image_url, size, source,
                         product_json, raw_payload, cached_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     {conflict}"
                ),
                params![
                    product.barcode,
                    product.name,
                    product.brand,
                    product.category,
                    product.image_url,
                    product.size,
                    source,
                    product_json,
                    raw_payload,
                    now,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;
    use stowage_core::ProductSource;

    const T0: &str = "2026-01-01T00:00:00.000Z";
    const T1: &str = "2026-01-15T00:00:00.000Z";

    fn product(name: &str, source: ProductSource) -> ProductInfo {
        let mut p = ProductInfo::new("0885909950805", name, source);
        p.brand = Some("Acme".to_string());
        p.features = vec!["sturdy".to_string()];
        p
    }

    #[tokio::test]
    async fn upsert_then_read_back() {
        let (db, _dir) = setup_db().await;
        let raw = serde_json::json!({"items": [{"title": "Widget"}]});

        upsert(&db, &product("Widget", ProductSource::Upcitemdb), Some(&raw), T0)
            .await
            .unwrap();

        let cached = get(&db, "0885909950805").await.unwrap().unwrap();
        assert_eq!(cached.product.name, "Widget");
        assert_eq!(cached.product.features, vec!["sturdy"]);
        assert_eq!(cached.product.source, ProductSource::Upcitemdb);
        assert_eq!(cached.raw_payload, Some(raw));
        assert_eq!(cached.cached_at, T0);
    }

    #[tokio::test]
    async fn freshness_cutoff_is_exclusive() {
        let (db, _dir) = setup_db().await;
        upsert(&db, &product("Widget", ProductSource::OpenFoodFacts), None, T0)
            .await
            .unwrap();

        assert!(get_fresh(&db, "0885909950805", "2025-12-31T23:59:59.999Z")
            .await
            .unwrap()
            .is_some());
        assert!(get_fresh(&db, "0885909950805", T0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_and_insert_if_absent_does_not() {
        let (db, _dir) = setup_db().await;
        upsert(&db, &product("Old", ProductSource::OpenFoodFacts), None, T0)
            .await
            .unwrap();

        let written = insert_if_absent(&db, &product("Ignored", ProductSource::Upcitemdb), None, T1)
            .await
            .unwrap();
        assert!(!written);
        assert_eq!(get(&db, "0885909950805").await.unwrap().unwrap().product.name, "Old");

        upsert(&db, &product("New", ProductSource::OpenFoodFacts), None, T1)
            .await
            .unwrap();
        let cached = get(&db, "0885909950805").await.unwrap().unwrap();
        assert_eq!(cached.product.name, "New");
        assert_eq!(cached.cached_at, T1);
    }
}
