// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Billing webhook reconciliation for Stowage.
//!
//! Events are validated, authenticated, ledgered exactly once under a dedup
//! key, classified into a subscription status, and applied last-applied-wins.
//! Events that fail to apply go to a retry queue with exponential backoff and
//! are dead-lettered once attempts run out.

pub mod alerting;
pub mod auth;
pub mod classifier;
pub mod dedup;
pub mod engine;
pub mod plans;
pub mod retry;

pub use classifier::{StatusClassifier, status_for_event_type};
pub use dedup::dedup_key;
pub use engine::{IngestOutcome, ReconciliationEngine, SweepReport};
pub use plans::PlanCatalog;
pub use retry::{RetryDecision, backoff_delay};
