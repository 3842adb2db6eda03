// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Inbound reconciliation of fragment changes.
//!
//! Every value read from the URL (at activation and on each change
//! notification) goes through [`decode_candidate`]: parse, then validate.
//! Failures are logged here, at the call site, and never propagate.
//!
//! The [`ChangeListener`] is a two-state machine (`Idle` / `Processing`) that
//! wraps one notification at a time. A notification that arrives while
//! another is still being processed is skipped.
//!
//! ```text
//!        notify()                      reconcile done
//! Idle ───────────▶ Processing ─────────────────────▶ Idle
//!                      │ notify() (re-entrant)
//!                      └──▶ Skipped
//! ```

use std::cell::Cell;

use tracing::{debug, warn};

use crate::codec::HashCodec;
use crate::error::HashStateError;
use crate::validator::ValidatorChain;
use crate::value::StateValue;

/// Where an inbound value came from, for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundSource {
    Activation,
    HashChange,
}

impl InboundSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::HashChange => "hash_change",
        }
    }
}

/// Why a fragment did not yield usable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No fragment, or an empty one
    EmptyFragment,
    /// Not valid percent-encoding or not valid under the codec's grammar
    Undecodable,
    /// Decoded, but a validator refused it
    Rejected,
}

impl FallbackReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyFragment => "empty_fragment",
            Self::Undecodable => "undecodable",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse and validate raw fragment text.
pub fn decode_candidate(
    raw: &str,
    codec: &dyn HashCodec,
    validator: &ValidatorChain,
    source: InboundSource,
) -> Result<StateValue, FallbackReason> {
    let candidate = match codec.parse(Some(raw)) {
        Ok(candidate) => candidate,
        Err(HashStateError::EmptyFragment) => {
            debug!(source = source.as_str(), "No state in hash");
            return Err(FallbackReason::EmptyFragment);
        }
        Err(e) => {
            warn!(source = source.as_str(), error = %e, "Hash is not valid JSON, ignoring");
            crate::metrics::record_decode_failure(source);
            return Err(FallbackReason::Undecodable);
        }
    };

    if let Err(kind) = validator.check(&candidate) {
        warn!(
            source = source.as_str(),
            validator = %kind,
            candidate = %candidate,
            "Hash state is invalid, ignoring"
        );
        crate::metrics::record_rejection(source, kind);
        return Err(FallbackReason::Rejected);
    }

    Ok(candidate)
}

/// Listener state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerState {
    #[default]
    Idle,
    Processing,
}

/// Result of one change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashChangeOutcome {
    /// New state adopted
    Applied,
    /// Fragment decodes to a value equal to the current state
    Unchanged,
    /// Fragment was cleared; state kept
    Empty,
    /// Fragment could not be decoded; state kept
    Undecodable,
    /// Fragment failed validation; state kept
    Rejected,
    /// Not processed: re-entrant notification or inactive binding
    Skipped,
}

impl HashChangeOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Unchanged => "unchanged",
            Self::Empty => "empty",
            Self::Undecodable => "undecodable",
            Self::Rejected => "rejected",
            Self::Skipped => "skipped",
        }
    }

    /// Whether the fragment's content was accepted as the current state.
    #[must_use]
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Applied | Self::Unchanged)
    }
}

impl From<FallbackReason> for HashChangeOutcome {
    fn from(reason: FallbackReason) -> Self {
        match reason {
            FallbackReason::EmptyFragment => Self::Empty,
            FallbackReason::Undecodable => Self::Undecodable,
            FallbackReason::Rejected => Self::Rejected,
        }
    }
}

impl std::fmt::Display for HashChangeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializes change notifications for one binding.
#[derive(Debug, Default)]
pub struct ChangeListener {
    state: Cell<ListenerState>,
    last_outcome: Cell<Option<HashChangeOutcome>>,
    processed: Cell<u64>,
}

impl ChangeListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `reconcile` for one notification unless one is already in flight.
    pub fn notify<F>(&self, reconcile: F) -> HashChangeOutcome
    where
        F: FnOnce() -> HashChangeOutcome,
    {
        let outcome = if self.state.get() == ListenerState::Processing {
            debug!("Hash change arrived while processing another, skipping");
            HashChangeOutcome::Skipped
        } else {
            self.state.set(ListenerState::Processing);
            let _idle = ResetToIdle(&self.state);
            reconcile()
        };

        self.processed.set(self.processed.get() + 1);
        self.last_outcome.set(Some(outcome));
        crate::metrics::record_hash_change(outcome);
        outcome
    }

    #[must_use]
    pub fn state(&self) -> ListenerState {
        self.state.get()
    }

    #[must_use]
    pub fn last_outcome(&self) -> Option<HashChangeOutcome> {
        self.last_outcome.get()
    }

    /// Notifications seen, including skipped ones.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.get()
    }
}

/// Returns the listener to `Idle` on every exit path, unwinding included.
struct ResetToIdle<'a>(&'a Cell<ListenerState>);

impl Drop for ResetToIdle<'_> {
    fn drop(&mut self) {
        self.0.set(ListenerState::Idle);
    }
}
