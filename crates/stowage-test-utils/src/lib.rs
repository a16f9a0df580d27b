// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Stowage integration tests.
//!
//! Provides mock collaborators and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`TestHarness`] - Full service stack over a temp database
//! - [`MockProductProvider`] - Product provider with scripted answers
//! - [`CountingClassifier`] - Classifier that counts calls and can fail on demand
//! - [`ManualClock`] - Clock moved by hand

pub mod clock;
pub mod harness;
pub mod mock_classifier;
pub mod mock_provider;

pub use clock::ManualClock;
pub use harness::{TEST_ADMIN_TOKEN, TEST_API_TOKEN, TestHarness};
pub use mock_classifier::CountingClassifier;
pub use mock_provider::{MockProductProvider, MockResponse};
