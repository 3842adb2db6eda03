// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The URL port: the only component that touches the address bar.
//!
//! - [`LocationPort`] - read the fragment, write it through the history API,
//!   subscribe to fragment-change notifications
//! - [`MemoryLocation`] - in-process history stack for tests and headless hosts
//! - `BrowserLocation` - `window.location` / `window.history` (feature `browser`,
//!   `wasm32` only)
//!
//! Ports only ever touch the fragment. The path and query are carried over
//! unchanged, and no write triggers a navigation.

pub mod memory;
#[cfg(all(feature = "browser", target_arch = "wasm32"))]
pub mod browser;

pub use memory::{HistoryWrite, MemoryLocation};

use std::rc::Rc;

use crate::error::HashStateError;

/// History-entry semantics for a fragment write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HistoryMode {
    /// Overwrite the current entry
    #[default]
    Replace,
    /// Create a new entry so back/forward step through snapshots
    Push,
}

impl HistoryMode {
    #[must_use]
    pub fn from_push_flag(push: bool) -> Self {
        if push {
            Self::Push
        } else {
            Self::Replace
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Push => "push",
        }
    }
}

impl std::fmt::Display for HistoryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback invoked when the fragment changes from outside the binding.
pub type HashChangeCallback = Rc<dyn Fn()>;

/// Address-bar access for one document.
pub trait LocationPort {
    /// Fragment text without the leading `#`; empty when absent.
    fn read_fragment(&self) -> String;

    /// Everything before `#` in the current URL.
    fn path_and_query(&self) -> String;

    /// Point the current (or a new) history entry at `<path_and_query>#<encoded>`.
    ///
    /// `encoded` is already URL-safe. The entry carries no associated data.
    fn write_fragment(
        &self,
        encoded: &str,
        mode: HistoryMode,
        title: &str,
    ) -> Result<(), HashStateError>;

    /// Register for fragment-change notifications until the subscription drops.
    fn subscribe(&self, callback: HashChangeCallback) -> Result<Subscription, HashStateError>;
}

impl<P: LocationPort + ?Sized> LocationPort for Rc<P> {
    fn read_fragment(&self) -> String {
        (**self).read_fragment()
    }

    fn path_and_query(&self) -> String {
        (**self).path_and_query()
    }

    fn write_fragment(
        &self,
        encoded: &str,
        mode: HistoryMode,
        title: &str,
    ) -> Result<(), HashStateError> {
        (**self).write_fragment(encoded, mode, title)
    }

    fn subscribe(&self, callback: HashChangeCallback) -> Result<Subscription, HashStateError> {
        (**self).subscribe(callback)
    }
}

/// Join a path with an encoded fragment.
#[must_use]
pub fn build_url(path_and_query: &str, encoded: &str) -> String {
    format!("{}#{}", path_and_query, encoded)
}

/// Listener registration that is removed exactly once, on drop at the latest.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new<F: FnOnce() + 'static>(dispose: F) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.dispose_now();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.dispose.is_some()
    }

    fn dispose_now(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
