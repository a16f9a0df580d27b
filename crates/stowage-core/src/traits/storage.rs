// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends.

use async_trait::async_trait;

use crate::error::StowageError;
use crate::traits::adapter::PluginAdapter;

/// Adapter for storage and persistence backends.
///
/// Storage adapters own the database lifecycle: opening, running migrations,
/// and flushing on close. Both engines share the handle they expose.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), StowageError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), StowageError>;
}
