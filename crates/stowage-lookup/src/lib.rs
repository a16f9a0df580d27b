// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Barcode lookup for Stowage.
//!
//! [`LookupEngine`] answers from the SQLite cache while entries are fresh
//! and otherwise walks an ordered chain of external providers (Open Library,
//! Google Books, Open Food Facts, UPCitemdb), caching the first hit.

pub mod client;
pub mod engine;
pub mod providers;

pub use client::ProviderClient;
pub use engine::LookupEngine;
pub use providers::build_providers;
