// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fragment write path: debounced scheduling, timer arming, flushing.

use std::cell::RefCell;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::debounce::{ReadyWrite, WriteReason};
use crate::error::HashStateError;
use crate::location::{HistoryMode, LocationPort};

use super::{BindingState, HashState, Inner, UpdateOutcome};

impl<P: LocationPort + 'static> HashState<P> {
    /// Perform the pending write if its quiet period has elapsed.
    ///
    /// Hosts without a [`crate::clock::Timer`] call this from their own
    /// timer, at or after [`Self::next_write_deadline`]. Returns whether a
    /// write happened.
    pub fn flush_due(&self) -> Result<bool, HashStateError> {
        let mut inner = self.inner.try_borrow_mut().map_err(|_| HashStateError::Reentrant)?;
        if inner.lifecycle != BindingState::Reconciled {
            return Ok(false);
        }
        inner.flush_due()
    }

    /// Write any pending value now, ignoring the debounce window.
    pub fn flush(&self) -> Result<bool, HashStateError> {
        let mut inner = self.inner.try_borrow_mut().map_err(|_| HashStateError::Reentrant)?;
        if inner.lifecycle != BindingState::Reconciled {
            return Err(HashStateError::Deactivated);
        }
        inner.flush_now()
    }

    /// Clock time at which the pending write becomes due.
    #[must_use]
    pub fn next_write_deadline(&self) -> Option<Duration> {
        let inner = self.inner.borrow();
        match inner.lifecycle {
            BindingState::Reconciled => inner.writer.next_deadline(),
            _ => None,
        }
    }

    #[must_use]
    pub fn has_pending_write(&self) -> bool {
        self.inner.borrow().writer.is_pending()
    }

    /// Current time on the binding's clock.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.borrow().clock.now()
    }

    /// Error from a write fired by the host timer, if any, clearing it.
    pub fn take_write_error(&self) -> Option<HashStateError> {
        self.inner.borrow_mut().last_write_error.take()
    }
}

impl<P: LocationPort + 'static> Inner<P> {
    fn mode(&self) -> HistoryMode {
        HistoryMode::from_push_flag(self.config.push_history_state)
    }

    /// Write the current state right away, outside the debounce window.
    pub(super) fn write_now(&mut self, reason: WriteReason) -> Result<(), HashStateError> {
        let now = self.clock.now();
        self.cancel_pending();
        self.writer.note_written(now);
        let write = ReadyWrite {
            value: self.state.clone(),
            mode: self.mode(),
            reason,
        };
        self.perform_write(write)
    }

    /// Hand the current state to the debouncer.
    pub(super) fn schedule_write(&mut self) -> Result<UpdateOutcome, HashStateError> {
        let now = self.clock.now();
        let mode = self.mode();
        match self.writer.schedule(self.state.clone(), mode, now) {
            Some(write) => {
                self.perform_write(write)?;
                Ok(UpdateOutcome::Written)
            }
            None => {
                self.arm_timer(now);
                crate::metrics::set_pending_write(true);
                Ok(UpdateOutcome::Scheduled)
            }
        }
    }

    pub(super) fn flush_due(&mut self) -> Result<bool, HashStateError> {
        let now = self.clock.now();
        match self.writer.take_if_due(now) {
            Some(write) => {
                self.armed_timer = None;
                crate::metrics::set_pending_write(false);
                self.perform_write(write).map(|()| true)
            }
            None => {
                // Timer fired early or was never armed: wait for the deadline again
                if self.writer.is_pending() && self.armed_timer.is_none() {
                    self.arm_timer(now);
                }
                Ok(false)
            }
        }
    }

    pub(super) fn flush_now(&mut self) -> Result<bool, HashStateError> {
        let now = self.clock.now();
        match self.writer.force_flush(now) {
            Some(write) => {
                self.armed_timer = None;
                crate::metrics::set_pending_write(false);
                self.perform_write(write).map(|()| true)
            }
            None => Ok(false),
        }
    }

    /// Drop the pending write and its timer. Returns whether one existed.
    pub(super) fn cancel_pending(&mut self) -> bool {
        self.armed_timer = None;
        let cancelled = self.writer.cancel();
        if cancelled {
            crate::metrics::set_pending_write(false);
        }
        cancelled
    }

    fn perform_write(&mut self, write: ReadyWrite) -> Result<(), HashStateError> {
        let encoded = self.codec.dump(&write.value)?;
        match self
            .port
            .write_fragment(&encoded, write.mode, &self.config.document_title)
        {
            Ok(()) => {
                self.writes += 1;
                crate::metrics::record_write(write.mode, write.reason);
                crate::metrics::record_fragment_bytes(encoded.len());
                debug!(
                    mode = %write.mode,
                    reason = %write.reason,
                    bytes = encoded.len(),
                    "Hash written"
                );
                Ok(())
            }
            Err(e) => {
                crate::metrics::record_write_failure(write.mode);
                error!(mode = %write.mode, reason = %write.reason, error = %e, "Failed to write hash");
                Err(e)
            }
        }
    }

    /// Arm the host timer for the pending deadline, replacing any armed one.
    fn arm_timer(&mut self, now: Duration) {
        let (Some(timer), Some(deadline)) = (self.timer.as_ref(), self.writer.next_deadline()) else {
            return;
        };
        let weak = self.self_ref.clone();
        let handle = timer.arm(
            deadline.saturating_sub(now),
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    fire_write_timer(&inner);
                }
            }),
        );
        // Replacing the handle cancels the previous timer
        self.armed_timer = Some(handle);
    }
}

fn fire_write_timer<P: LocationPort + 'static>(inner: &RefCell<Inner<P>>) {
    let Ok(mut inner) = inner.try_borrow_mut() else {
        warn!("Binding busy when write timer fired; call flush_due to retry");
        return;
    };
    if inner.lifecycle != BindingState::Reconciled {
        return;
    }
    inner.armed_timer = None;
    if let Err(e) = inner.flush_due() {
        // Already logged; keep it for the host to collect
        inner.last_write_error = Some(e);
    }
}
