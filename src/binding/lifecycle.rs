// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Binding lifecycle: activation, teardown.
//!
//! Activation reconciles once, in order:
//! 1. Read the fragment through the port
//! 2. Parse it; undecodable or empty → initial value
//! 3. Validate a decoded candidate; rejected → initial value
//! 4. Adopt the candidate
//! 5. If the initial value was adopted, write it back synchronously so the
//!    URL reflects the active state as soon as activation returns
//! 6. Subscribe to fragment changes

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::config::HashStateOptions;
use crate::debounce::{DebounceConfig, DebouncedWriter, WriteReason};
use crate::error::HashStateError;
use crate::listener::{decode_candidate, ChangeListener, InboundSource};
use crate::location::{HashChangeCallback, LocationPort};
use crate::validator::ValidatorChain;
use crate::value::StateValue;

use super::api::dispatch_hash_change;
use super::{BindingState, HashState, Inner, Reconciliation};

/// The caller's initial value, evaluated only when needed.
enum Initial<F> {
    Deferred(F),
    Ready(StateValue),
}

impl<F: FnOnce() -> StateValue> Initial<F> {
    fn force(self) -> StateValue {
        match self {
            Self::Deferred(make) => make(),
            Self::Ready(value) => value,
        }
    }
}

impl<P: LocationPort + 'static> HashState<P> {
    /// Bind `initial` to the URL fragment exposed by `port`.
    pub fn activate(
        port: Rc<P>,
        initial: StateValue,
        options: HashStateOptions,
    ) -> Result<Self, HashStateError> {
        Self::activate_with(port, move || initial, options)
    }

    /// Like [`Self::activate`], computing the initial value only if it is
    /// needed (fallback, or as the reference for structural validation).
    ///
    /// Fails only when the activation write-back is refused by the host or
    /// the port cannot subscribe to change notifications.
    #[tracing::instrument(skip_all)]
    pub fn activate_with<F>(
        port: Rc<P>,
        initial: F,
        options: HashStateOptions,
    ) -> Result<Self, HashStateError>
    where
        F: FnOnce() -> StateValue,
    {
        let HashStateOptions {
            config,
            custom_validator,
            equality,
            codec,
            clock,
            timer,
        } = options;

        if timer.is_none() && config.write_debounce_ms > 0 {
            warn!(
                debounce_ms = config.write_debounce_ms,
                "No write timer; trailing writes wait for flush_due or drive_pending_write"
            );
        }

        let initial = if config.validate_keys_and_types {
            Initial::Ready(initial())
        } else {
            Initial::Deferred(initial)
        };
        let reference = match &initial {
            Initial::Ready(value) => Some(value),
            Initial::Deferred(_) => None,
        };
        let validator = ValidatorChain::from_parts(reference, custom_validator);

        let raw = port.read_fragment();
        let (state, reconciliation) =
            match decode_candidate(&raw, &*codec, &validator, InboundSource::Activation) {
                Ok(value) => (value, Reconciliation::FromFragment),
                Err(reason) => (initial.force(), Reconciliation::Fallback(reason)),
            };

        let writer = DebouncedWriter::new(DebounceConfig::from(&config));
        let inner = Rc::new_cyclic(|self_ref| {
            RefCell::new(Inner {
                self_ref: self_ref.clone(),
                port: Rc::clone(&port),
                codec,
                validator,
                equality,
                config,
                clock,
                timer,
                state,
                lifecycle: BindingState::Uninitialized,
                writer,
                armed_timer: None,
                last_write_error: None,
                writes: 0,
            })
        });

        {
            let mut guard = inner.borrow_mut();
            if reconciliation.is_fallback() {
                guard.write_now(WriteReason::Activation)?;
            }
            guard.lifecycle = BindingState::Reconciled;
        }

        let listener = Rc::new(ChangeListener::new());
        let callback: HashChangeCallback = {
            let weak = Rc::downgrade(&inner);
            let listener = Rc::clone(&listener);
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    dispatch_hash_change(&inner, &listener);
                }
            })
        };
        let subscription = port.subscribe(callback)?;

        crate::metrics::record_activation(reconciliation.as_str());
        {
            let guard = inner.borrow();
            info!(
                %reconciliation,
                push = guard.config.push_history_state,
                debounce_ms = guard.config.write_debounce_ms,
                validators = guard.validator.len(),
                "Hash state binding activated"
            );
        }

        Ok(Self {
            inner,
            listener,
            subscription: RefCell::new(Some(subscription)),
            reconciliation,
        })
    }

    /// Tear the binding down: unsubscribe from change notifications and
    /// cancel any pending write. Idempotent; also runs on drop.
    pub fn deactivate(&self) {
        // Unsubscribe first so no notification can land mid-teardown
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
        match self.inner.try_borrow_mut() {
            Ok(mut inner) => inner.teardown(),
            Err(_) => debug!("Binding busy during deactivate, listener removed only"),
        }
    }
}

impl<P: LocationPort + 'static> Inner<P> {
    pub(super) fn teardown(&mut self) {
        if self.lifecycle == BindingState::Deactivated {
            return;
        }
        if self.cancel_pending() {
            debug!("Cancelled pending hash write on teardown");
        }
        self.lifecycle = BindingState::Deactivated;
        info!(writes = self.writes, "Hash state binding deactivated");
    }
}

impl<P: LocationPort + 'static> Drop for HashState<P> {
    fn drop(&mut self) {
        self.deactivate();
    }
}
