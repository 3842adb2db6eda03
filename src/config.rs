// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for hash state bindings.
//!
//! [`HashStateConfig`] is the plain-data half and deserializes from any serde
//! format with every field defaulted. [`HashStateOptions`] wraps it together
//! with the behavioural hooks (validator, equality, codec, clock, timer) that
//! cannot be expressed as data.
//!
//! # Example
//!
//! ```
//! use hash_state::{HashStateConfig, HashStateOptions, Equality};
//!
//! // Minimal config (uses defaults)
//! let config = HashStateConfig::default();
//! assert!(!config.push_history_state);
//! assert_eq!(config.write_debounce_ms, 0);
//!
//! // From JSON, e.g. an app settings blob
//! let config: HashStateConfig =
//!     serde_json::from_str(r#"{"push_history_state": true, "write_debounce_ms": 150}"#).unwrap();
//!
//! let options = HashStateOptions::new()
//!     .with_config(config)
//!     .validate_keys_and_types(true)
//!     .equality(Equality::Value);
//! assert_eq!(options.config().write_debounce_ms, 150);
//! ```

use std::rc::Rc;

use serde::Deserialize;

use crate::clock::{Clock, Timer};
use crate::codec::{HashCodec, JsonCodec};
use crate::equality::Equality;
use crate::validator::Validator;
use crate::value::StateValue;

/// Data options for a binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HashStateConfig {
    /// Create a history entry per write instead of replacing the current one
    #[serde(default)]
    pub push_history_state: bool,

    /// Only accept fragment values with the initial value's keys and kinds
    #[serde(default)]
    pub validate_keys_and_types: bool,

    /// Quiet period before a trailing write, 0 = write synchronously
    #[serde(default = "default_write_debounce_ms")]
    pub write_debounce_ms: u64,

    /// Fire the first write of a quiet period immediately
    #[serde(default)]
    pub leading_write: bool,

    /// Longest a burst of updates may postpone its write
    #[serde(default)]
    pub max_write_wait_ms: Option<u64>,

    /// Title passed to the history primitive
    #[serde(default)]
    pub document_title: String,
}

fn default_write_debounce_ms() -> u64 { 0 }

impl Default for HashStateConfig {
    fn default() -> Self {
        Self {
            push_history_state: false,
            validate_keys_and_types: false,
            write_debounce_ms: default_write_debounce_ms(),
            leading_write: false,
            max_write_wait_ms: None,
            document_title: String::new(),
        }
    }
}

/// Full option set for [`crate::HashState::activate`].
#[derive(Clone)]
pub struct HashStateOptions {
    pub(crate) config: HashStateConfig,
    pub(crate) custom_validator: Option<Validator>,
    pub(crate) equality: Equality,
    pub(crate) codec: Rc<dyn HashCodec>,
    pub(crate) clock: Rc<dyn Clock>,
    pub(crate) timer: Option<Rc<dyn Timer>>,
}

impl HashStateOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: HashStateConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn push_history_state(mut self, push: bool) -> Self {
        self.config.push_history_state = push;
        self
    }

    #[must_use]
    pub fn validate_keys_and_types(mut self, validate: bool) -> Self {
        self.config.validate_keys_and_types = validate;
        self
    }

    #[must_use]
    pub fn write_debounce_ms(mut self, ms: u64) -> Self {
        self.config.write_debounce_ms = ms;
        self
    }

    #[must_use]
    pub fn leading_write(mut self, leading: bool) -> Self {
        self.config.leading_write = leading;
        self
    }

    #[must_use]
    pub fn max_write_wait_ms(mut self, ms: u64) -> Self {
        self.config.max_write_wait_ms = Some(ms);
        self
    }

    /// Title handed to the history primitive on every write.
    #[must_use]
    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.config.document_title = title.into();
        self
    }

    #[must_use]
    pub fn custom_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&StateValue) -> bool + 'static,
    {
        self.custom_validator = Some(Rc::new(validator));
        self
    }

    #[must_use]
    pub fn equality(mut self, equality: Equality) -> Self {
        self.equality = equality;
        self
    }

    /// Replace the JSON codec with a custom parse/dump pair.
    #[must_use]
    pub fn codec(mut self, codec: Rc<dyn HashCodec>) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Host timer used to fire trailing writes without polling.
    #[must_use]
    pub fn timer(mut self, timer: Rc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    #[must_use]
    pub fn config(&self) -> &HashStateConfig {
        &self.config
    }
}

impl Default for HashStateOptions {
    fn default() -> Self {
        Self {
            config: HashStateConfig::default(),
            custom_validator: None,
            equality: Equality::default(),
            codec: Rc::new(JsonCodec),
            clock: default_clock(),
            timer: default_timer(),
        }
    }
}

impl std::fmt::Debug for HashStateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashStateOptions")
            .field("config", &self.config)
            .field("custom_validator", &self.custom_validator.is_some())
            .field("equality", &self.equality)
            .field("timer", &self.timer.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn default_clock() -> Rc<dyn Clock> {
    Rc::new(crate::clock::SystemClock::new())
}

#[cfg(all(target_arch = "wasm32", feature = "browser"))]
fn default_clock() -> Rc<dyn Clock> {
    Rc::new(crate::location::browser::BrowserTimer::new())
}

// No host clock to fall back on: debounce windows never elapse unless the
// host supplies one.
#[cfg(all(target_arch = "wasm32", not(feature = "browser")))]
fn default_clock() -> Rc<dyn Clock> {
    Rc::new(crate::clock::ManualClock::new())
}

#[cfg(all(target_arch = "wasm32", feature = "browser"))]
fn default_timer() -> Option<Rc<dyn Timer>> {
    Some(Rc::new(crate::location::browser::BrowserTimer::new()))
}

// Native hosts run trailing writes through `drive_pending_write` or
// `flush_due`, or supply their own timer.
#[cfg(not(all(target_arch = "wasm32", feature = "browser")))]
fn default_timer() -> Option<Rc<dyn Timer>> {
    None
}
