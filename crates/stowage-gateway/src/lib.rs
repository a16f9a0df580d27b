// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Stowage.
//!
//! An axum router over the billing reconciliation engine and the barcode
//! lookup engine. App routes and admin routes are guarded by separate bearer
//! tokens; the billing webhook authenticates inside the engine.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{build_router, start_server, GatewayState, HealthState, ServerConfig};
