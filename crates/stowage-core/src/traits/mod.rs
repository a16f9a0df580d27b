// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the engines and their collaborators.
//!
//! Lifecycle-managed adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod classifier;
pub mod clock;
pub mod provider;
pub mod storage;

pub use adapter::PluginAdapter;
pub use classifier::EventClassifier;
pub use clock::{Clock, SystemClock};
pub use provider::{CachePolicy, ProductProvider, ProviderHit, ProviderOutcome};
pub use storage::StorageAdapter;
