// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Stowage.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed query modules for the
//! canonical subscription store (subscriptions, event ledger, retry queue,
//! failure windows) and the product cache.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod timestamp;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use models::*;
