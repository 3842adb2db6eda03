// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Time sources and host timers.
//!
//! The debounced writer measures time as a [`Duration`] since an arbitrary
//! clock origin, which keeps it independent of `std::time::Instant` (not
//! available on `wasm32-unknown-unknown`). A binding may also be handed a
//! [`Timer`], the host's deferred-callback facility, in which case trailing
//! writes fire on their own. Without one the host polls
//! [`crate::HashState::flush_due`].
//!
//! [`ManualClock`] implements both traits over virtual time and is what the
//! test-suite uses to step through debounce windows deterministically.
//!
//! # Example
//!
//! ```
//! use hash_state::clock::{Clock, ManualClock, Timer};
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let fired = Rc::new(Cell::new(false));
//! let flag = fired.clone();
//! let _handle = clock.arm(Duration::from_millis(100), Box::new(move || flag.set(true)));
//!
//! clock.advance(Duration::from_millis(99));
//! assert!(!fired.get());
//! clock.advance(Duration::from_millis(1));
//! assert!(fired.get());
//! assert_eq!(clock.now(), Duration::from_millis(100));
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Monotonic time since an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Host facility that runs a callback once after a delay.
pub trait Timer {
    /// Dropping the returned handle cancels the callback if it has not fired.
    fn arm(&self, delay: Duration, fire: Box<dyn FnOnce()>) -> TimerHandle;
}

/// Cancels an armed timer on drop.
#[must_use = "dropping a TimerHandle cancels the timer"]
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl TimerHandle {
    pub fn new<F: FnOnce() + 'static>(cancel: F) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Handle with nothing to cancel.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Wall-clock time from `std::time::Instant`.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<(Duration, u64), Box<dyn FnOnce()>>,
}

/// Virtual clock with timers that fire only when time is advanced.
///
/// Cloning shares the same timeline.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Rc<RefCell<ManualState>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward, firing due timers in deadline order.
    ///
    /// While a callback runs, `now()` reports that timer's deadline. Timers
    /// armed by a callback fire in the same call if they fall inside the step.
    pub fn advance(&self, step: Duration) {
        let target = self.state.borrow().now + step;
        loop {
            let due = {
                let mut state = self.state.borrow_mut();
                let key = match state.timers.keys().next() {
                    Some(key) if key.0 <= target => *key,
                    _ => break,
                };
                state.now = state.now.max(key.0);
                state.timers.remove(&key)
            };
            // Fire without holding the borrow; the callback may re-arm
            if let Some(fire) = due {
                fire();
            }
        }
        self.state.borrow_mut().now = target;
    }

    /// Number of armed, unfired timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    fn disarm(state: &Weak<RefCell<ManualState>>, key: (Duration, u64)) {
        if let Some(state) = state.upgrade() {
            // Removed outside the borrow so the callback's captures drop freely
            let removed = state.borrow_mut().timers.remove(&key);
            drop(removed);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.state.borrow().now
    }
}

impl Timer for ManualClock {
    fn arm(&self, delay: Duration, fire: Box<dyn FnOnce()>) -> TimerHandle {
        let key = {
            let mut state = self.state.borrow_mut();
            let key = (state.now + delay, state.next_id);
            state.next_id += 1;
            state.timers.insert(key, fire);
            key
        };
        let weak = Rc::downgrade(&self.state);
        TimerHandle::new(move || Self::disarm(&weak, key))
    }
}

impl std::fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ManualClock")
            .field("now", &state.now)
            .field("pending_timers", &state.timers.len())
            .finish()
    }
}
