// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Stowage.

use thiserror::Error;

/// The primary error type used across all Stowage crates.
#[derive(Debug, Error)]
pub enum StowageError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// External product provider errors (transport failure, bad status, bad body).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed inbound payload. Rejected with a 4xx and counted toward alerting.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or mismatched webhook/API token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Classification or persistence failed after the event was ledgered.
    ///
    /// Absorbed by the reconciliation engine and routed to the retry queue.
    #[error("processing error: {message}")]
    Processing { message: String },

    /// No provider knows the requested product.
    #[error("not found: {0}")]
    NotFound(String),

    /// No usable provider exists for the request.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StowageError {
    /// Short machine-readable kind, used as a metric label and in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            StowageError::Config(_) => "config",
            StowageError::Storage { .. } => "storage",
            StowageError::Provider { .. } => "provider",
            StowageError::Validation(_) => "validation",
            StowageError::Auth(_) => "auth",
            StowageError::Processing { .. } => "processing",
            StowageError::NotFound(_) => "not_found",
            StowageError::ProviderUnavailable(_) => "unavailable",
            StowageError::Timeout { .. } => "timeout",
            StowageError::Internal(_) => "internal",
        }
    }
}
