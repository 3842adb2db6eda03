// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy for hash state bindings.
//!
//! Decode and validation failures on inbound paths (activation, external
//! hash changes) are handled locally: they are logged and the binding keeps
//! its last known-good state. Only write failures and misuse of the public
//! API ever reach the caller.

use thiserror::Error;

use crate::validator::ValidatorKind;
use crate::value::ValueKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashStateError {
    /// The fragment is empty or absent. Not a fault: it is the "no state" marker.
    #[error("Hash fragment is empty")]
    EmptyFragment,

    #[error("Hash is not valid JSON: {0}")]
    Decode(String),

    #[error("Value rejected by {validator} validator")]
    Rejected { validator: ValidatorKind },

    #[error("Failed to serialize state: {0}")]
    Encode(String),

    /// The host history API refused the mutation. Never retried.
    #[error("History write failed: {0}")]
    Write(String),

    /// The host environment is missing something the port needs (window, timers).
    #[error("Host environment unavailable: {0}")]
    Host(String),

    #[error("Cannot update key of a {kind} state, expected a mapping")]
    NotAMapping { kind: ValueKind },

    #[error("Binding is deactivated")]
    Deactivated,

    /// Called back into the binding from inside one of its own callbacks.
    #[error("Binding is busy with another operation")]
    Reentrant,
}

impl HashStateError {
    /// True for errors that are handled locally and never surfaced.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EmptyFragment | Self::Decode(_) | Self::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(HashStateError::EmptyFragment.is_recoverable());
        assert!(HashStateError::Decode("eof".into()).is_recoverable());
        assert!(HashStateError::Rejected { validator: ValidatorKind::Custom }.is_recoverable());

        assert!(!HashStateError::Write("SecurityError".into()).is_recoverable());
        assert!(!HashStateError::Deactivated.is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        let err = HashStateError::Rejected { validator: ValidatorKind::Structural };
        assert_eq!(err.to_string(), "Value rejected by structural validator");

        let err = HashStateError::NotAMapping { kind: ValueKind::Sequence };
        assert_eq!(err.to_string(), "Cannot update key of a sequence state, expected a mapping");
    }
}
