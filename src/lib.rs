//! # Hash State
//!
//! Bidirectional synchronization of a JSON-like state value with the URL
//! fragment, so that application state survives reloads, is shareable as a
//! link, and optionally steps through browser back/forward navigation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        HashState                            │
//! │  • activate(): reconcile initial value against the URL     │
//! │  • read() / update() / update_at_key() / setter()          │
//! └─────────────────────────────────────────────────────────────┘
//!            │ outbound                        ▲ inbound
//!            ▼                                 │
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │ Equality guard           │   │ ChangeListener               │
//! │ Validator chain          │   │  • Idle / Processing         │
//! │ DebouncedWriter          │   │  • parse → validate → adopt  │
//! │  • one pending write     │   │  • cancels pending writes    │
//! └──────────────────────────┘   └──────────────────────────────┘
//!            │ HashCodec::dump                 │ HashCodec::parse
//!            ▼                                 │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LocationPort                           │
//! │  • MemoryLocation (in-process history stack)               │
//! │  • BrowserLocation (window.history, hashchange)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use hash_state::{HashState, HashStateOptions, MemoryLocation, UpdateOutcome};
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! // A shared link already carries state in its fragment
//! let location = Rc::new(MemoryLocation::new("/list#%7B%22page%22%3A3%7D"));
//! let options = HashStateOptions::new()
//!     .validate_keys_and_types(true)
//!     .push_history_state(true);
//!
//! let state = HashState::activate(location.clone(), json!({"page": 1}), options).unwrap();
//! assert_eq!(state.read(), json!({"page": 3}));
//!
//! // Each change becomes a history entry
//! assert_eq!(state.update(json!({"page": 4})).unwrap(), UpdateOutcome::Written);
//! assert_eq!(location.history_len(), 2);
//!
//! // Back restores the previous snapshot
//! location.back();
//! assert_eq!(state.read(), json!({"page": 3}));
//! ```
//!
//! ## Features
//!
//! - **Reconciliation**: the URL wins at activation when it holds valid state
//! - **Validation**: structural (keys and kinds of the initial value) and custom
//! - **Equality guard**: updates equal to the current state never touch the URL
//! - **Debounced writes**: trailing, leading and max-wait policies
//! - **History modes**: replace the current entry or push a new one
//! - **Pluggable codec**: JSON by default, any parse/dump pair otherwise
//!
//! ## Modules
//!
//! - [`binding`]: the [`HashState`] binding and its lifecycle
//! - [`location`]: the [`LocationPort`] trait and its implementations
//! - [`codec`]: fragment encoding
//! - [`validator`]: structural and custom validators
//! - [`debounce`]: the [`DebouncedWriter`]
//! - [`listener`]: inbound change handling
//! - [`clock`]: time sources and host timers

pub mod value;
pub mod error;
pub mod codec;
pub mod validator;
pub mod equality;
pub mod clock;
pub mod location;
pub mod debounce;
pub mod listener;
pub mod config;
pub mod binding;
pub mod metrics;
#[cfg(feature = "tokio")]
pub mod driver;

pub use value::{StateValue, ValueKind};
pub use error::HashStateError;
pub use codec::{FnCodec, HashCodec, JsonCodec};
pub use validator::{Validator, ValidatorChain, ValidatorKind};
pub use equality::Equality;
pub use clock::{Clock, ManualClock, Timer, TimerHandle};
#[cfg(not(target_arch = "wasm32"))]
pub use clock::SystemClock;
pub use location::{HistoryMode, HistoryWrite, LocationPort, MemoryLocation, Subscription};
#[cfg(all(feature = "browser", target_arch = "wasm32"))]
pub use location::browser::{BrowserLocation, BrowserTimer};
pub use debounce::{DebounceConfig, DebouncedWriter, ReadyWrite, WriteReason};
pub use listener::{ChangeListener, FallbackReason, HashChangeOutcome, ListenerState};
pub use config::{HashStateConfig, HashStateOptions};
pub use binding::{BindingState, HashState, Reconciliation, StateSetter, UpdateOutcome};
#[cfg(feature = "tokio")]
pub use driver::{drive_pending_write, TokioClock};
