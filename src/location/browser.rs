// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! `window.location` / `window.history` port and `setTimeout` timer.

use std::time::Duration;

use tracing::warn;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Performance, Window};

use super::{build_url, HashChangeCallback, HistoryMode, LocationPort, Subscription};
use crate::clock::{Clock, Timer, TimerHandle};
use crate::error::HashStateError;

fn host_error(context: &str, e: &JsValue) -> HashStateError {
    HashStateError::Host(format!("{}: {:?}", context, e))
}

/// The current document's location.
#[derive(Debug, Clone)]
pub struct BrowserLocation {
    window: Window,
}

impl BrowserLocation {
    /// Port for the global `window`. Fails outside a browsing context.
    pub fn new() -> Result<Self, HashStateError> {
        let window = web_sys::window()
            .ok_or_else(|| HashStateError::Host("no global window".to_string()))?;
        Ok(Self { window })
    }
}

impl LocationPort for BrowserLocation {
    fn read_fragment(&self) -> String {
        match self.window.location().hash() {
            Ok(hash) => hash.strip_prefix('#').unwrap_or(&hash).to_string(),
            Err(e) => {
                warn!(error = ?e, "Failed to read location.hash");
                String::new()
            }
        }
    }

    fn path_and_query(&self) -> String {
        let location = self.window.location();
        let pathname = location.pathname().unwrap_or_default();
        let search = location.search().unwrap_or_default();
        format!("{}{}", pathname, search)
    }

    fn write_fragment(
        &self,
        encoded: &str,
        mode: HistoryMode,
        title: &str,
    ) -> Result<(), HashStateError> {
        let history = self
            .window
            .history()
            .map_err(|e| host_error("window.history unavailable", &e))?;
        let url = build_url(&self.path_and_query(), encoded);
        let result = match mode {
            HistoryMode::Replace => history.replace_state_with_url(&JsValue::UNDEFINED, title, Some(&url)),
            HistoryMode::Push => history.push_state_with_url(&JsValue::UNDEFINED, title, Some(&url)),
        };
        result.map_err(|e| HashStateError::Write(format!("{:?}", e)))
    }

    fn subscribe(&self, callback: HashChangeCallback) -> Result<Subscription, HashStateError> {
        let onhashchange: Closure<dyn Fn()> = Closure::new(move || callback());
        self.window
            .add_event_listener_with_callback("hashchange", onhashchange.as_ref().unchecked_ref())
            .map_err(|e| host_error("failed to add hashchange listener", &e))?;

        let window = self.window.clone();
        Ok(Subscription::new(move || {
            if let Err(e) = window
                .remove_event_listener_with_callback("hashchange", onhashchange.as_ref().unchecked_ref())
            {
                warn!(error = ?e, "Failed to remove hashchange listener");
            }
            drop(onhashchange);
        }))
    }
}

/// `performance.now()` clock and `setTimeout` timer.
#[derive(Debug, Clone)]
pub struct BrowserTimer {
    performance: Option<Performance>,
    origin_ms: f64,
}

impl BrowserTimer {
    #[must_use]
    pub fn new() -> Self {
        let performance = web_sys::window().and_then(|window| window.performance());
        if performance.is_none() {
            warn!("performance.now unavailable, falling back to Date.now");
        }
        let origin_ms = now_ms(performance.as_ref());
        Self {
            performance,
            origin_ms,
        }
    }
}

fn now_ms(performance: Option<&Performance>) -> f64 {
    match performance {
        Some(performance) => performance.now(),
        None => js_sys::Date::now(),
    }
}

impl Default for BrowserTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for BrowserTimer {
    fn now(&self) -> Duration {
        // Only the Date.now fallback can step backwards
        let elapsed_ms = (now_ms(self.performance.as_ref()) - self.origin_ms).max(0.0);
        Duration::from_secs_f64(elapsed_ms / 1000.0)
    }
}

impl Timer for BrowserTimer {
    fn arm(&self, delay: Duration, fire: Box<dyn FnOnce()>) -> TimerHandle {
        let Some(window) = web_sys::window() else {
            warn!("No global window, write timer not armed");
            return TimerHandle::detached();
        };

        let callback = Closure::once(move || fire());
        let timeout_ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            timeout_ms,
        ) {
            Ok(id) => TimerHandle::new(move || {
                window.clear_timeout_with_handle(id);
                drop(callback);
            }),
            Err(e) => {
                warn!(error = ?e, "setTimeout failed, write timer not armed");
                TimerHandle::detached()
            }
        }
    }
}
