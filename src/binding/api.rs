// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Binding API: read, update, update-at-key, external change handling.

use std::cell::{RefCell, RefMut};
use std::rc::Weak;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::HashStateError;
use crate::listener::{decode_candidate, ChangeListener, HashChangeOutcome, InboundSource};
use crate::location::LocationPort;
use crate::value::{StateValue, ValueKind};

use super::{BindingState, HashState, Inner, UpdateOutcome};

impl<P: LocationPort + 'static> HashState<P> {
    /// Snapshot of the current state.
    ///
    /// Reflects every accepted update immediately, even while its fragment
    /// write is still waiting out the debounce window.
    #[must_use]
    pub fn read(&self) -> StateValue {
        self.inner.borrow().state.clone()
    }

    /// Borrow the current state without cloning it.
    pub fn with_state<R>(&self, f: impl FnOnce(&StateValue) -> R) -> R {
        f(&self.inner.borrow().state)
    }

    /// Replace the state and schedule a fragment write.
    ///
    /// A value equal to the current state (under the configured
    /// [`crate::Equality`]) is dropped without a write. A value refused by
    /// the validator is returned as [`HashStateError::Rejected`] and the state
    /// is left untouched, as is one the codec fails to encode
    /// ([`HashStateError::Encode`]).
    pub fn update(&self, value: StateValue) -> Result<UpdateOutcome, HashStateError> {
        borrow_active(&self.inner)?.update(value)
    }

    /// Replace one key of a mapping state.
    pub fn update_at_key(
        &self,
        key: impl Into<String>,
        value: StateValue,
    ) -> Result<UpdateOutcome, HashStateError> {
        borrow_active(&self.inner)?.update_at_key(key.into(), value)
    }

    /// Cloneable setter for handing to a UI layer.
    #[must_use]
    pub fn setter(&self) -> StateSetter<P> {
        StateSetter {
            inner: std::rc::Rc::downgrade(&self.inner),
        }
    }

    /// Reconcile the current fragment into state, as on a change notification.
    ///
    /// For hosts that route navigation events themselves.
    pub fn handle_hash_change(&self) -> HashChangeOutcome {
        dispatch_hash_change(&self.inner, &self.listener)
    }
}

/// Weak setter handle: `set` / `set_at_key` on the binding it came from.
///
/// Fails with [`HashStateError::Deactivated`] once the binding is gone.
pub struct StateSetter<P: LocationPort + 'static> {
    inner: Weak<RefCell<Inner<P>>>,
}

impl<P: LocationPort + 'static> StateSetter<P> {
    pub fn set(&self, value: StateValue) -> Result<UpdateOutcome, HashStateError> {
        let inner = self.inner.upgrade().ok_or(HashStateError::Deactivated)?;
        let outcome = borrow_active(&inner)?.update(value);
        outcome
    }

    pub fn set_at_key(
        &self,
        key: impl Into<String>,
        value: StateValue,
    ) -> Result<UpdateOutcome, HashStateError> {
        let inner = self.inner.upgrade().ok_or(HashStateError::Deactivated)?;
        let outcome = borrow_active(&inner)?.update_at_key(key.into(), value);
        outcome
    }
}

impl<P: LocationPort + 'static> Clone for StateSetter<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<P: LocationPort + 'static> std::fmt::Debug for StateSetter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSetter")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

fn borrow_active<P: LocationPort + 'static>(
    inner: &RefCell<Inner<P>>,
) -> Result<RefMut<'_, Inner<P>>, HashStateError> {
    let guard = inner.try_borrow_mut().map_err(|_| HashStateError::Reentrant)?;
    if guard.lifecycle != BindingState::Reconciled {
        return Err(HashStateError::Deactivated);
    }
    Ok(guard)
}

/// Route one change notification through the listener into the binding.
pub(super) fn dispatch_hash_change<P: LocationPort + 'static>(
    inner: &RefCell<Inner<P>>,
    listener: &ChangeListener,
) -> HashChangeOutcome {
    listener.notify(|| match inner.try_borrow_mut() {
        Ok(mut inner) => inner.apply_hash_change(),
        Err(_) => {
            debug!("Binding busy, skipping hash change");
            HashChangeOutcome::Skipped
        }
    })
}

impl<P: LocationPort + 'static> Inner<P> {
    pub(super) fn update(&mut self, value: StateValue) -> Result<UpdateOutcome, HashStateError> {
        if self.equality.equal(&self.state, &value) {
            debug!("Update equal to current state, skipping");
            crate::metrics::record_suppressed_update();
            return Ok(UpdateOutcome::Unchanged);
        }

        if let Err(kind) = self.validator.check(&value) {
            warn!(validator = %kind, value = %value, "Update rejected by validator");
            return Err(HashStateError::Rejected { validator: kind });
        }

        // A value the codec cannot dump would never reach the URL
        if let Err(e) = self.codec.dump(&value) {
            warn!(error = %e, "Update cannot be encoded, state unchanged");
            return Err(e);
        }

        self.state = value;
        self.schedule_write()
    }

    pub(super) fn update_at_key(
        &mut self,
        key: String,
        value: StateValue,
    ) -> Result<UpdateOutcome, HashStateError> {
        let mut next = match &self.state {
            Value::Object(fields) => fields.clone(),
            other => {
                return Err(HashStateError::NotAMapping {
                    kind: ValueKind::of(other),
                })
            }
        };
        next.insert(key, value);
        self.update(Value::Object(next))
    }

    /// Reconcile the live fragment into state without writing back.
    pub(super) fn apply_hash_change(&mut self) -> HashChangeOutcome {
        if self.lifecycle != BindingState::Reconciled {
            return HashChangeOutcome::Skipped;
        }

        let raw = self.port.read_fragment();
        let candidate =
            match decode_candidate(&raw, &*self.codec, &self.validator, InboundSource::HashChange) {
                Ok(candidate) => candidate,
                Err(reason) => return reason.into(),
            };

        // The live fragment wins over anything still waiting to be written
        if self.cancel_pending() {
            debug!("Discarded pending hash write after external change");
        }

        if self.equality.equal(&self.state, &candidate) {
            return HashChangeOutcome::Unchanged;
        }

        debug!("Adopted state from external hash change");
        self.state = candidate;
        HashChangeOutcome::Applied
    }
}
