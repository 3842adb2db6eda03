// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::{build_url, HashChangeCallback, HistoryMode, LocationPort, Subscription};
use crate::error::HashStateError;

/// One history primitive call made through the port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryWrite {
    pub mode: HistoryMode,
    pub url: String,
    pub title: String,
}

#[derive(Debug)]
struct History {
    entries: Vec<String>,
    index: usize,
}

impl History {
    fn current(&self) -> &str {
        &self.entries[self.index]
    }

    fn push(&mut self, url: String) {
        self.entries.truncate(self.index + 1);
        self.entries.push(url);
        self.index = self.entries.len() - 1;
    }

    fn replace(&mut self, url: String) {
        self.entries[self.index] = url;
    }
}

type Listeners = RefCell<Vec<(u64, HashChangeCallback)>>;

/// In-process document location with a browser-like history stack.
///
/// Writes through [`LocationPort`] are recorded so callers can assert which
/// primitive was used. External navigation ([`Self::set_hash`],
/// [`Self::back`], [`Self::forward`]) behaves like the address bar: it
/// changes the fragment and, where a browser would, fires the change
/// notification.
pub struct MemoryLocation {
    history: RefCell<History>,
    writes: RefCell<Vec<HistoryWrite>>,
    listeners: Rc<Listeners>,
    next_listener_id: Cell<u64>,
    write_failure: RefCell<Option<String>>,
}

impl MemoryLocation {
    /// Location at `url`, which may already carry a fragment.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            history: RefCell::new(History {
                entries: vec![url.into()],
                index: 0,
            }),
            writes: RefCell::new(Vec::new()),
            listeners: Rc::new(RefCell::new(Vec::new())),
            next_listener_id: Cell::new(0),
            write_failure: RefCell::new(None),
        }
    }

    /// Full URL of the current history entry.
    #[must_use]
    pub fn current_url(&self) -> String {
        self.history.borrow().current().to_string()
    }

    /// Change the fragment like an address-bar edit: a new history entry,
    /// no notification. Follow with [`Self::dispatch_hash_change`].
    pub fn set_hash(&self, raw: &str) {
        let raw = raw.strip_prefix('#').unwrap_or(raw);
        let url = build_url(&self.path_and_query(), raw);
        self.history.borrow_mut().push(url);
    }

    /// [`Self::set_hash`] followed by the change notification.
    pub fn navigate_hash(&self, raw: &str) {
        self.set_hash(raw);
        self.dispatch_hash_change();
    }

    /// Fire the change notification to every current subscriber.
    pub fn dispatch_hash_change(&self) {
        // Snapshot so callbacks may (un)subscribe while we iterate
        let callbacks: Vec<HashChangeCallback> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Step back one entry. Notifies when the fragment changed.
    pub fn back(&self) -> bool {
        self.traverse(-1)
    }

    /// Step forward one entry. Notifies when the fragment changed.
    pub fn forward(&self) -> bool {
        self.traverse(1)
    }

    fn traverse(&self, delta: isize) -> bool {
        let changed = {
            let mut history = self.history.borrow_mut();
            let target = history.index as isize + delta;
            if target < 0 || target as usize >= history.entries.len() {
                return false;
            }
            let before = fragment_of(history.current()).to_string();
            history.index = target as usize;
            fragment_of(history.current()) != before
        };
        if changed {
            self.dispatch_hash_change();
        }
        true
    }

    /// Make every subsequent write fail with `reason` (`None` to recover).
    pub fn fail_writes(&self, reason: Option<&str>) {
        *self.write_failure.borrow_mut() = reason.map(str::to_string);
    }

    #[must_use]
    pub fn writes(&self) -> Vec<HistoryWrite> {
        self.writes.borrow().clone()
    }

    #[must_use]
    pub fn replace_calls(&self) -> usize {
        self.count_writes(HistoryMode::Replace)
    }

    #[must_use]
    pub fn push_calls(&self) -> usize {
        self.count_writes(HistoryMode::Push)
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.borrow().entries.len()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn count_writes(&self, mode: HistoryMode) -> usize {
        self.writes.borrow().iter().filter(|w| w.mode == mode).count()
    }

    fn remove_listener(listeners: &Weak<Listeners>, id: u64) {
        if let Some(listeners) = listeners.upgrade() {
            let removed = {
                let mut listeners = listeners.borrow_mut();
                listeners
                    .iter()
                    .position(|(entry, _)| *entry == id)
                    .map(|index| listeners.remove(index))
            };
            drop(removed);
        }
    }
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new("/")
    }
}

impl std::fmt::Debug for MemoryLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLocation")
            .field("url", &self.current_url())
            .field("history_len", &self.history_len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn fragment_of(url: &str) -> &str {
    url.split_once('#').map_or("", |(_, fragment)| fragment)
}

impl LocationPort for MemoryLocation {
    fn read_fragment(&self) -> String {
        fragment_of(self.history.borrow().current()).to_string()
    }

    fn path_and_query(&self) -> String {
        let history = self.history.borrow();
        let url = history.current();
        url.split_once('#').map_or(url, |(path, _)| path).to_string()
    }

    fn write_fragment(
        &self,
        encoded: &str,
        mode: HistoryMode,
        title: &str,
    ) -> Result<(), HashStateError> {
        if let Some(reason) = self.write_failure.borrow().as_ref() {
            return Err(HashStateError::Write(reason.clone()));
        }

        let url = build_url(&self.path_and_query(), encoded);
        {
            let mut history = self.history.borrow_mut();
            match mode {
                HistoryMode::Replace => history.replace(url.clone()),
                HistoryMode::Push => history.push(url.clone()),
            }
        }
        self.writes.borrow_mut().push(HistoryWrite {
            mode,
            url,
            title: title.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self, callback: HashChangeCallback) -> Result<Subscription, HashStateError> {
        let id = self.next_listener_id.get();
        self.next_listener_id.set(id + 1);
        self.listeners.borrow_mut().push((id, callback));

        let listeners = Rc::downgrade(&self.listeners);
        Ok(Subscription::new(move || Self::remove_listener(&listeners, id)))
    }
}
