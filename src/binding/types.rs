// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for hash state bindings.

use crate::listener::FallbackReason;

/// Binding lifecycle state.
///
/// ```text
/// Uninitialized → Reconciled → Deactivated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Created, fragment not yet reconciled
    Uninitialized,
    /// Active: state mirrors the fragment
    Reconciled,
    /// Torn down; listener removed and pending write cancelled
    Deactivated,
}

impl std::fmt::Display for BindingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Reconciled => write!(f, "Reconciled"),
            Self::Deactivated => write!(f, "Deactivated"),
        }
    }
}

/// How the initial state was chosen at activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The fragment decoded and validated; its value was adopted
    FromFragment,
    /// The initial value was adopted and written back to the URL
    Fallback(FallbackReason),
}

impl Reconciliation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FromFragment => "from_fragment",
            Self::Fallback(reason) => reason.as_str(),
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

impl std::fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FromFragment => write!(f, "FromFragment"),
            Self::Fallback(reason) => write!(f, "Fallback({})", reason),
        }
    }
}

/// Result of an accepted update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Equal to the current state; nothing changed
    Unchanged,
    /// State changed and the fragment was written
    Written,
    /// State changed; the fragment write is waiting for its quiet period
    Scheduled,
}

impl UpdateOutcome {
    #[must_use]
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}
