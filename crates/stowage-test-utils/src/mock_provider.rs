// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock product provider for deterministic lookup tests.
//!
//! `MockProductProvider` implements `ProductProvider` with pre-configured
//! responses, so lookup tests run without external API calls.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use stowage_core::{
    Barcode, CachePolicy, ProductInfo, ProductProvider, ProductSource, ProviderHit,
    ProviderOutcome, StowageError,
};

/// One scripted provider answer.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// A hit with this product name.
    Found(String),
    Miss,
    /// A provider failure, as from a 500 or a timeout.
    Error(String),
}

/// A mock provider that answers from a FIFO queue.
///
/// When the queue is empty every lookup is a miss.
#[derive(Debug)]
pub struct MockProductProvider {
    name: String,
    source: ProductSource,
    isbn_only: bool,
    policy: CachePolicy,
    responses: Mutex<VecDeque<MockResponse>>,
    calls: AtomicUsize,
}

impl MockProductProvider {
    pub fn new(name: impl Into<String>, source: ProductSource) -> Self {
        Self {
            name: name.into(),
            source,
            isbn_only: false,
            policy: CachePolicy::Upsert,
            responses: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Pre-load responses.
    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        *self.responses.lock().unwrap_or_else(|e| e.into_inner()) = VecDeque::from(responses);
        self
    }

    /// Only handle ISBN keys, like the book providers.
    pub fn isbn_only(mut self) -> Self {
        self.isbn_only = true;
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a response to the end of the queue.
    pub fn push_response(&self, response: MockResponse) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    /// Number of lookups served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> MockResponse {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(MockResponse::Miss)
    }
}

#[async_trait]
impl ProductProvider for MockProductProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> ProductSource {
        self.source
    }

    fn supports(&self, barcode: &Barcode) -> bool {
        !self.isbn_only || barcode.is_isbn()
    }

    fn cache_policy(&self) -> CachePolicy {
        self.policy
    }

    async fn try_lookup(&self, barcode: &Barcode) -> Result<ProviderOutcome, StowageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_response() {
            MockResponse::Found(name) => Ok(ProviderOutcome::Found(ProviderHit {
                raw: serde_json::json!({ "mock": self.name, "title": name }),
                product: ProductInfo::new(barcode.as_str(), name, self.source),
            })),
            MockResponse::Miss => Ok(ProviderOutcome::Miss),
            MockResponse::Error(message) => Err(StowageError::Provider {
                message,
                source: None,
            }),
        }
    }
}
