// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Hash state binding.
//!
//! The [`HashState`] is the synchronization core that ties together all
//! components:
//! - reconciliation of the initial value against the URL at activation
//! - the equality guard and validator on every update
//! - the debounced writer between updates and the history API
//! - the change listener feeding external fragment changes back into state
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized → Reconciled → Deactivated
//! ```
//!
//! # Example
//!
//! ```
//! use hash_state::{HashState, HashStateOptions, MemoryLocation, Reconciliation};
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! let location = Rc::new(MemoryLocation::new("/search"));
//! let state = HashState::activate(location.clone(), json!({"q": ""}), HashStateOptions::new())
//!     .expect("activation failed");
//!
//! // Nothing in the URL yet: the initial value was adopted and written back
//! assert!(state.reconciliation().is_fallback());
//! assert_eq!(location.current_url(), "/search#%7B%22q%22%3A%22%22%7D");
//!
//! state.update_at_key("q", json!("rust")).unwrap();
//! assert_eq!(state.read(), json!({"q": "rust"}));
//! assert_eq!(location.current_url(), "/search#%7B%22q%22%3A%22rust%22%7D");
//! ```

mod types;
mod api;
mod lifecycle;
mod flush;

pub use types::{BindingState, Reconciliation, UpdateOutcome};
pub use api::StateSetter;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::clock::{Clock, Timer, TimerHandle};
use crate::codec::HashCodec;
use crate::config::HashStateConfig;
use crate::debounce::DebouncedWriter;
use crate::equality::Equality;
use crate::error::HashStateError;
use crate::listener::ChangeListener;
use crate::location::{LocationPort, Subscription};
use crate::validator::ValidatorChain;
use crate::value::StateValue;

/// A live binding between one state value and the URL fragment.
///
/// Single-threaded: the binding and everything it hands out are `!Send`.
/// Dropping it deactivates it.
pub struct HashState<P: LocationPort + 'static> {
    pub(super) inner: Rc<RefCell<Inner<P>>>,
    pub(super) listener: Rc<ChangeListener>,
    pub(super) subscription: RefCell<Option<Subscription>>,
    pub(super) reconciliation: Reconciliation,
}

/// Mutable core shared with the change-notification and timer callbacks,
/// which hold it weakly.
pub(crate) struct Inner<P: LocationPort + 'static> {
    pub(super) self_ref: Weak<RefCell<Inner<P>>>,
    pub(super) port: Rc<P>,
    pub(super) codec: Rc<dyn HashCodec>,
    pub(super) validator: ValidatorChain,
    pub(super) equality: Equality,
    pub(super) config: HashStateConfig,
    pub(super) clock: Rc<dyn Clock>,
    pub(super) timer: Option<Rc<dyn Timer>>,

    /// Current state: the initial value or one that passed the validator
    pub(super) state: StateValue,
    pub(super) lifecycle: BindingState,

    /// At most one pending write
    pub(super) writer: DebouncedWriter,
    pub(super) armed_timer: Option<TimerHandle>,

    /// Failure of a write fired from the host timer, where no caller can receive it
    pub(super) last_write_error: Option<HashStateError>,
    pub(super) writes: u64,
}

impl<P: LocationPort + 'static> HashState<P> {
    /// Reconciliation outcome from activation.
    #[must_use]
    pub fn reconciliation(&self) -> Reconciliation {
        self.reconciliation
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BindingState {
        self.inner.borrow().lifecycle
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == BindingState::Reconciled
    }

    /// The port this binding writes through.
    #[must_use]
    pub fn port(&self) -> Rc<P> {
        Rc::clone(&self.inner.borrow().port)
    }

    /// Change listener for this binding.
    #[must_use]
    pub fn listener(&self) -> &ChangeListener {
        &self.listener
    }

    /// Fragment writes performed so far, activation write-back included.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.borrow().writes
    }
}

impl<P: LocationPort + 'static> std::fmt::Debug for HashState<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("HashState")
                .field("lifecycle", &inner.lifecycle)
                .field("reconciliation", &self.reconciliation)
                .field("state", &inner.state)
                .field("pending_write", &inner.writer.is_pending())
                .field("validators", &inner.validator)
                .finish_non_exhaustive(),
            Err(_) => f.debug_struct("HashState").finish_non_exhaustive(),
        }
    }
}
