// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Debounced fragment writes.
//!
//! The [`DebouncedWriter`] collapses bursts of state changes into a single
//! history mutation. It holds at most one pending write; a newer request
//! supersedes it and re-arms the trailing deadline. The writer never touches
//! the URL itself: it hands back a [`ReadyWrite`] when something should be
//! written and the binding performs it.
//!
//! # Example
//!
//! ```
//! use hash_state::{DebounceConfig, DebouncedWriter, HistoryMode, WriteReason};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let mut writer = DebouncedWriter::new(DebounceConfig {
//!     window: Duration::from_millis(100),
//!     ..Default::default()
//! });
//!
//! let ms = Duration::from_millis;
//! assert!(writer.schedule(json!(1), HistoryMode::Replace, ms(0)).is_none());
//! assert!(writer.schedule(json!(2), HistoryMode::Replace, ms(30)).is_none());
//! assert!(writer.schedule(json!(3), HistoryMode::Replace, ms(60)).is_none());
//!
//! assert!(writer.take_if_due(ms(159)).is_none());
//! let write = writer.take_if_due(ms(160)).unwrap();
//! assert_eq!(write.value, json!(3));
//! assert_eq!(write.reason, WriteReason::Trailing);
//! ```

use std::time::Duration;
use tracing::debug;

use crate::config::HashStateConfig;
use crate::location::HistoryMode;
use crate::value::StateValue;

/// Why a write left the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteReason {
    /// Write-back of the initial value during activation
    Activation,
    /// Debounce window is zero
    Immediate,
    /// First request of a quiet period under the leading policy
    Leading,
    /// Quiet period elapsed after the last request
    Trailing,
    /// Flush requested by the host
    Manual,
}

impl WriteReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Immediate => "immediate",
            Self::Leading => "leading",
            Self::Trailing => "trailing",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for WriteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing policy for the writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Quiet period before a trailing write. Zero writes synchronously.
    pub window: Duration,
    /// Fire the first request of a quiet period immediately
    pub leading: bool,
    /// Cap on how long a burst may keep postponing its write
    pub max_wait: Option<Duration>,
}

impl From<&HashStateConfig> for DebounceConfig {
    fn from(config: &HashStateConfig) -> Self {
        Self {
            window: Duration::from_millis(config.write_debounce_ms),
            leading: config.leading_write,
            max_wait: config.max_write_wait_ms.map(Duration::from_millis),
        }
    }
}

/// A write waiting for its quiet period.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub value: StateValue,
    pub mode: HistoryMode,
    /// When the burst that this write belongs to started
    pub first_requested_at: Duration,
    pub deadline: Duration,
    /// Requests folded into this write
    pub coalesced: usize,
}

/// A write that should be performed now.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyWrite {
    pub value: StateValue,
    pub mode: HistoryMode,
    pub reason: WriteReason,
}

/// Per-binding debounce state: the pending value and its deadline.
#[derive(Debug)]
pub struct DebouncedWriter {
    config: DebounceConfig,
    pending: Option<PendingWrite>,
    last_write_at: Option<Duration>,
}

impl DebouncedWriter {
    #[must_use]
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            pending: None,
            last_write_at: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Request a write of `value`, superseding any pending one.
    ///
    /// Returns the write when it must happen right away (zero window, or the
    /// leading policy on an idle writer). Otherwise the value waits until
    /// [`Self::take_if_due`] releases it.
    pub fn schedule(&mut self, value: StateValue, mode: HistoryMode, now: Duration) -> Option<ReadyWrite> {
        if self.config.window.is_zero() {
            self.pending = None;
            self.last_write_at = Some(now);
            return Some(ReadyWrite { value, mode, reason: WriteReason::Immediate });
        }

        if self.config.leading && self.is_idle(now) {
            self.last_write_at = Some(now);
            return Some(ReadyWrite { value, mode, reason: WriteReason::Leading });
        }

        let (first_requested_at, coalesced) = match self.pending.take() {
            Some(previous) => {
                debug!(coalesced = previous.coalesced + 1, "Superseding pending hash write");
                crate::metrics::record_superseded_write();
                (previous.first_requested_at, previous.coalesced + 1)
            }
            None => (now, 1),
        };

        let mut deadline = now + self.config.window;
        if let Some(max_wait) = self.config.max_wait {
            // Never earlier than one window after the burst started
            deadline = deadline.min(first_requested_at + max_wait.max(self.config.window));
        }

        self.pending = Some(PendingWrite {
            value,
            mode,
            first_requested_at,
            deadline,
            coalesced,
        });
        None
    }

    /// Release the pending write once its deadline has passed.
    pub fn take_if_due(&mut self, now: Duration) -> Option<ReadyWrite> {
        match &self.pending {
            Some(pending) if pending.deadline <= now => self.release(now, WriteReason::Trailing),
            _ => None,
        }
    }

    /// Release the pending write regardless of its deadline.
    pub fn force_flush(&mut self, now: Duration) -> Option<ReadyWrite> {
        self.release(now, WriteReason::Manual)
    }

    /// Drop the pending write. Returns whether there was one.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Record a write performed outside the writer (activation write-back),
    /// so the leading policy treats it as the start of a window.
    pub fn note_written(&mut self, now: Duration) {
        self.last_write_at = Some(now);
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingWrite> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn is_idle(&self, now: Duration) -> bool {
        self.pending.is_none()
            && self
                .last_write_at
                .map_or(true, |last| now.saturating_sub(last) >= self.config.window)
    }

    fn release(&mut self, now: Duration, reason: WriteReason) -> Option<ReadyWrite> {
        let pending = self.pending.take()?;
        debug!(coalesced = pending.coalesced, %reason, "Releasing debounced hash write");
        crate::metrics::record_coalesced(pending.coalesced);
        self.last_write_at = Some(now);
        Some(ReadyWrite {
            value: pending.value,
            mode: pending.mode,
            reason,
        })
    }
}
