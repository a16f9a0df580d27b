// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classifier wrapper that counts calls and can be made to fail.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use stowage_billing::StatusClassifier;
use stowage_core::{CanonicalEvent, EventClassifier, StateTransition, StowageError};

/// Delegates to the production classifier unless failure is switched on.
#[derive(Debug, Default)]
pub struct CountingClassifier {
    inner: StatusClassifier,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingClassifier {
    pub fn new(inner: StatusClassifier) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// Number of `classify` calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl EventClassifier for CountingClassifier {
    fn classify(&self, event: &CanonicalEvent) -> Result<StateTransition, StowageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StowageError::Processing {
                message: "classifier switched off by test".into(),
            });
        }
        self.inner.classify(event)
    }
}
