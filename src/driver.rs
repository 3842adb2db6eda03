// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Async debounce driver for native hosts.
//!
//! A binding without a [`crate::clock::Timer`] only writes trailing values
//! when the host asks it to. [`drive_pending_write`] does the asking: it
//! sleeps until the pending write's deadline and flushes it. Pair it with
//! [`TokioClock`] so the binding and the runtime share one timeline (and so
//! `tokio::time::pause` applies to both).
//!
//! # Example
//!
//! ```
//! use hash_state::{drive_pending_write, HashState, HashStateOptions, MemoryLocation, TokioClock};
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let location = Rc::new(MemoryLocation::new("/"));
//! let options = HashStateOptions::new()
//!     .write_debounce_ms(20)
//!     .clock(Rc::new(TokioClock::new()));
//! let state = HashState::activate(location.clone(), json!(0), options).unwrap();
//!
//! state.update(json!(1)).unwrap();
//! assert!(drive_pending_write(&state).await.unwrap());
//! assert_eq!(location.current_url(), "/#1");
//! # }
//! ```

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::binding::HashState;
use crate::clock::Clock;
use crate::error::HashStateError;
use crate::location::LocationPort;

/// Clock on the tokio timeline.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Wait out the pending write and perform it.
///
/// Returns `Ok(false)` when nothing is pending, or when the pending write was
/// cancelled (by an external fragment change or teardown) while waiting.
/// Updates arriving meanwhile push the deadline back and are picked up by the
/// same call.
pub async fn drive_pending_write<P>(state: &HashState<P>) -> Result<bool, HashStateError>
where
    P: LocationPort + 'static,
{
    loop {
        let Some(deadline) = state.next_write_deadline() else {
            return Ok(false);
        };
        let now = state.now();
        if deadline > now {
            debug!(wait_ms = (deadline - now).as_millis() as u64, "Waiting for debounce deadline");
            tokio::time::sleep(deadline - now).await;
        }
        if state.flush_due()? {
            return Ok(true);
        }
    }
}
