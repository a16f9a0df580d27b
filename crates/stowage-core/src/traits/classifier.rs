// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event classifier trait: maps a billing event to a subscription transition.

use crate::error::StowageError;
use crate::types::{CanonicalEvent, StateTransition};

/// Maps a canonical billing event to the subscription state it implies.
///
/// Implementations must be pure with respect to the store; the reconciliation
/// engine applies the returned transition itself.
pub trait EventClassifier: Send + Sync {
    fn classify(&self, event: &CanonicalEvent) -> Result<StateTransition, StowageError>;
}
