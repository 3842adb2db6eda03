//! Integration tests for hash state bindings.
//!
//! Every test runs against an in-process [`MemoryLocation`] and, where
//! debouncing is involved, a [`ManualClock`] that doubles as the host timer,
//! so windows elapse only when the test advances time.
//!
//! # Running Tests
//! ```bash
//! cargo test --test hash_state
//! ```
//!
//! # Test Organization
//! - `activation_*` - reconciliation of the initial value against the URL
//! - `update_*` - outbound path: equality guard, validation, history writes
//! - `debounce_*` - trailing, leading and max-wait write policies
//! - `external_*` - inbound path: navigation and change notifications
//! - `lifecycle_*` - teardown, setters, re-entrancy, write failures

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::Registry;

use hash_state::{
    BindingState, Equality, FallbackReason, FnCodec, HashChangeOutcome, HashCodec, HashState,
    HashStateError, HashStateOptions, HistoryMode, JsonCodec, LocationPort, ManualClock, MemoryLocation,
    Reconciliation, UpdateOutcome, ValidatorKind, ValueKind,
};

// =============================================================================
// Helpers
// =============================================================================

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn encode(value: &Value) -> String {
    JsonCodec.dump(value).unwrap()
}

/// Location whose fragment already holds `value`.
fn location_with(value: &Value) -> Rc<MemoryLocation> {
    Rc::new(MemoryLocation::new(format!("/page#{}", encode(value))))
}

fn empty_location() -> Rc<MemoryLocation> {
    Rc::new(MemoryLocation::new("/page"))
}

/// Options driven by a manual clock that also fires the write timer.
fn timed_options(clock: &ManualClock, debounce_ms: u64) -> HashStateOptions {
    HashStateOptions::new()
        .write_debounce_ms(debounce_ms)
        .clock(Rc::new(clock.clone()))
        .timer(Rc::new(clock.clone()))
}

fn written_fragment(location: &MemoryLocation, index: usize) -> String {
    let url = &location.writes()[index].url;
    url.split_once('#').map(|(_, fragment)| fragment.to_string()).unwrap()
}

/// Captures every event as `(level, "field=value ...")`.
#[derive(Clone, Default)]
struct CapturedEvents(Arc<Mutex<Vec<(Level, String)>>>);

impl CapturedEvents {
    fn at(&self, level: Level) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, text)| text.clone())
            .collect()
    }

    fn warnings(&self) -> Vec<String> {
        self.at(Level::WARN)
    }
}

struct FieldText(String);

impl Visit for FieldText {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        self.0.push_str(&format!("{}={:?}", field.name(), value));
    }
}

impl<S: Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut text = FieldText(String::new());
        event.record(&mut text);
        self.0.lock().unwrap().push((*event.metadata().level(), text.0));
    }
}

/// Run `f` with a subscriber that records its events.
fn capture<R>(f: impl FnOnce() -> R) -> (R, CapturedEvents) {
    let events = CapturedEvents::default();
    let subscriber = Registry::default().with(events.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, events)
}

// =============================================================================
// Activation
// =============================================================================

#[test]
fn activation_empty_fragment_adopts_and_writes_initial() {
    let location = empty_location();
    let initial = json!({"foo": "bar"});

    let state = HashState::activate(location.clone(), initial.clone(), HashStateOptions::new()).unwrap();

    assert_eq!(state.read(), initial);
    assert_eq!(
        state.reconciliation(),
        Reconciliation::Fallback(FallbackReason::EmptyFragment)
    );
    assert_eq!(state.state(), BindingState::Reconciled);
    assert_eq!(location.read_fragment(), encode(&initial));
    assert_eq!(location.replace_calls(), 1);
    assert_eq!(location.push_calls(), 0);
    assert_eq!(state.write_count(), 1);
}

#[test]
fn activation_accepts_valid_fragment_without_writing() {
    let location = location_with(&json!({"foo": "zoo"}));
    let options = HashStateOptions::new().validate_keys_and_types(true);

    let state = HashState::activate(location.clone(), json!({"foo": "bar"}), options).unwrap();

    assert_eq!(state.read(), json!({"foo": "zoo"}));
    assert_eq!(state.reconciliation(), Reconciliation::FromFragment);
    assert!(location.writes().is_empty());
}

#[test]
fn activation_malformed_fragment_falls_back_with_one_warning() {
    let location = Rc::new(MemoryLocation::new("/page#AKJSFKLASJF"));
    let initial = json!({"foo": "bar"});

    let (state, events) = capture(|| {
        HashState::activate(location.clone(), initial.clone(), HashStateOptions::new()).unwrap()
    });

    assert_eq!(state.read(), initial);
    assert_eq!(
        state.reconciliation(),
        Reconciliation::Fallback(FallbackReason::Undecodable)
    );
    let warnings = events.warnings();
    assert_eq!(warnings.len(), 1, "warnings: {:?}", warnings);
    assert!(warnings[0].contains("Hash is not valid JSON, ignoring"));
    assert_eq!(location.read_fragment(), encode(&initial));
}

#[test]
fn activation_structurally_invalid_fragment_is_rejected_and_logged() {
    let location = location_with(&json!({"foo": 1}));
    let initial = json!({"foo": "bar"});
    let options = HashStateOptions::new().validate_keys_and_types(true);

    let (state, events) = capture(|| HashState::activate(location.clone(), initial.clone(), options).unwrap());

    assert_eq!(state.read(), initial);
    assert_eq!(
        state.reconciliation(),
        Reconciliation::Fallback(FallbackReason::Rejected)
    );
    let warnings = events.warnings();
    assert_eq!(warnings.len(), 1, "warnings: {:?}", warnings);
    assert!(warnings[0].contains("Hash state is invalid, ignoring"));
    assert!(warnings[0].contains(r#"candidate={"foo":1}"#), "got: {}", warnings[0]);
    assert_eq!(location.read_fragment(), encode(&initial));
}

#[test]
fn activation_without_validation_adopts_any_shape() {
    let location = location_with(&json!({"foo": 1}));

    let state = HashState::activate(location, json!({"foo": "bar"}), HashStateOptions::new()).unwrap();

    assert_eq!(state.read(), json!({"foo": 1}));
}

#[test]
fn activation_custom_validator_rejects_fragment() {
    let location = location_with(&json!({"n": -5}));
    let options = HashStateOptions::new().custom_validator(|v| v["n"].as_i64().is_some_and(|n| n >= 0));

    let state = HashState::activate(location, json!({"n": 0}), options).unwrap();

    assert_eq!(state.read(), json!({"n": 0}));
    assert!(state.reconciliation().is_fallback());
}

#[test]
fn activation_lazy_initial_only_evaluated_when_needed() {
    let calls = Rc::new(Cell::new(0));

    let counter = calls.clone();
    let state = HashState::activate_with(
        location_with(&json!("from-url")),
        move || {
            counter.set(counter.get() + 1);
            json!("initial")
        },
        HashStateOptions::new(),
    )
    .unwrap();
    assert_eq!(state.read(), json!("from-url"));
    assert_eq!(calls.get(), 0);

    let counter = calls.clone();
    let state = HashState::activate_with(
        empty_location(),
        move || {
            counter.set(counter.get() + 1);
            json!("initial")
        },
        HashStateOptions::new(),
    )
    .unwrap();
    assert_eq!(state.read(), json!("initial"));
    assert_eq!(calls.get(), 1);
}

#[test]
fn activation_preserves_path_query_and_title() {
    let location = Rc::new(MemoryLocation::new("/app/list?tab=2"));
    let options = HashStateOptions::new().document_title("Results");

    let _state = HashState::activate(location.clone(), json!({"a": 1}), options).unwrap();

    let writes = location.writes();
    assert_eq!(writes[0].url, format!("/app/list?tab=2#{}", encode(&json!({"a": 1}))));
    assert_eq!(writes[0].title, "Results");
}

#[test]
fn activation_write_failure_is_returned() {
    let location = empty_location();
    location.fail_writes(Some("SecurityError"));

    let err = HashState::activate(location.clone(), json!({}), HashStateOptions::new()).unwrap_err();

    assert_eq!(err, HashStateError::Write("SecurityError".into()));
    assert_eq!(location.listener_count(), 0);
}

// =============================================================================
// Updates
// =============================================================================

#[test]
fn update_writes_synchronously_by_default() {
    let location = empty_location();
    let state = HashState::activate(location.clone(), json!({"foo": "bar"}), HashStateOptions::new()).unwrap();

    let outcome = state.update(json!({"foo": "baz"})).unwrap();

    assert_eq!(outcome, UpdateOutcome::Written);
    assert_eq!(state.read(), json!({"foo": "baz"}));
    assert_eq!(location.read_fragment(), encode(&json!({"foo": "baz"})));
}

#[test]
fn update_equal_value_is_suppressed() {
    let location = empty_location();
    let state = HashState::activate(location.clone(), json!({"foo": "bar"}), HashStateOptions::new()).unwrap();
    let writes_before = location.writes().len();

    let outcome = state.update(json!({"foo": "bar"})).unwrap();

    assert_eq!(outcome, UpdateOutcome::Unchanged);
    assert_eq!(location.writes().len(), writes_before);
    assert_eq!(state.read(), json!({"foo": "bar"}));
}

#[test]
fn update_strict_equality_treats_fresh_mappings_as_changes() {
    let location = empty_location();
    let options = HashStateOptions::new().equality(Equality::Strict);
    let state = HashState::activate(location.clone(), json!({"foo": "bar"}), options).unwrap();

    assert_eq!(state.update(json!({"foo": "bar"})).unwrap(), UpdateOutcome::Written);
    assert_eq!(location.writes().len(), 2);

    state.update(json!(7)).unwrap();
    assert_eq!(state.update(json!(7)).unwrap(), UpdateOutcome::Unchanged);
}

#[test]
fn update_custom_equality() {
    let location = empty_location();
    // Case-insensitive string state
    let options = HashStateOptions::new().equality(Equality::custom(|a, b| {
        match (a.as_str(), b.as_str()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => a == b,
        }
    }));
    let state = HashState::activate(location, json!("Rust"), options).unwrap();

    assert_eq!(state.update(json!("RUST")).unwrap(), UpdateOutcome::Unchanged);
    assert_eq!(state.read(), json!("Rust"));
}

#[test]
fn update_push_mode_uses_only_push() {
    let location = empty_location();
    let options = HashStateOptions::new().push_history_state(true);
    let state = HashState::activate(location.clone(), json!({"page": 1}), options).unwrap();

    state.update(json!({"page": 2})).unwrap();
    state.update(json!({"page": 3})).unwrap();

    assert_eq!(location.push_calls(), 3);
    assert_eq!(location.replace_calls(), 0);
    assert!(location.writes().iter().all(|w| w.mode == HistoryMode::Push));
}

#[test]
fn update_replace_mode_uses_only_replace() {
    let location = empty_location();
    let state = HashState::activate(location.clone(), json!({"page": 1}), HashStateOptions::new()).unwrap();

    state.update(json!({"page": 2})).unwrap();
    state.update(json!({"page": 3})).unwrap();

    assert_eq!(location.replace_calls(), 3);
    assert_eq!(location.push_calls(), 0);
    assert_eq!(location.history_len(), 1);
}

#[test]
fn update_rejected_by_validator_leaves_state_untouched() {
    let location = empty_location();
    let options = HashStateOptions::new()
        .validate_keys_and_types(true)
        .custom_validator(|v| v["n"].as_i64().is_some_and(|n| n >= 0));
    let state = HashState::activate(location.clone(), json!({"n": 0}), options).unwrap();
    let writes_before = location.writes().len();

    let custom = state.update(json!({"n": -1})).unwrap_err();
    let structural = state.update(json!({"n": "zero"})).unwrap_err();

    assert_eq!(custom, HashStateError::Rejected { validator: ValidatorKind::Custom });
    assert_eq!(structural, HashStateError::Rejected { validator: ValidatorKind::Structural });
    assert_eq!(state.read(), json!({"n": 0}));
    assert_eq!(location.writes().len(), writes_before);
}

#[test]
fn update_at_key_replaces_one_key() {
    let location = location_with(&json!({"q": "", "page": 1}));
    let state = HashState::activate(location.clone(), json!({"q": "", "page": 1}), HashStateOptions::new()).unwrap();

    state.update_at_key("q", json!("rust")).unwrap();

    assert_eq!(state.read(), json!({"q": "rust", "page": 1}));
    assert_eq!(location.read_fragment(), encode(&json!({"q": "rust", "page": 1})));
}

#[test]
fn update_at_key_on_non_mapping_fails() {
    let state = HashState::activate(empty_location(), json!([1, 2]), HashStateOptions::new()).unwrap();

    let err = state.update_at_key("a", json!(1)).unwrap_err();

    assert_eq!(err, HashStateError::NotAMapping { kind: ValueKind::Sequence });
    assert_eq!(state.read(), json!([1, 2]));
}

#[test]
fn update_with_custom_codec() {
    // Plain-text string state
    let codec = FnCodec::new(
        |raw| {
            if raw == "Invalid_Json" {
                Err(HashStateError::Decode("unparseable".into()))
            } else {
                Ok(Value::String(raw.to_string()))
            }
        },
        |value| {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| HashStateError::Encode("not a string".into()))
        },
    );
    let location = Rc::new(MemoryLocation::new("/page#hello"));
    let options = HashStateOptions::new().codec(Rc::new(codec));
    let state = HashState::activate(location.clone(), json!("initial"), options).unwrap();
    assert_eq!(state.read(), json!("hello"));

    state.update(json!("world")).unwrap();
    assert_eq!(location.current_url(), "/page#world");

    let (outcome, events) = capture(|| {
        location.set_hash("Invalid_Json");
        state.handle_hash_change()
    });
    assert_eq!(outcome, HashChangeOutcome::Undecodable);
    assert_eq!(events.warnings().len(), 1);
    assert_eq!(state.read(), json!("world"));

    let writes = location.writes().len();
    let (result, events) = capture(|| state.update(json!(5)));
    assert!(matches!(result, Err(HashStateError::Encode(_))));
    assert_eq!(events.warnings().len(), 1);

    // Neither state nor URL moved
    assert_eq!(state.read(), json!("world"));
    assert_eq!(location.writes().len(), writes);
    assert_eq!(location.current_url(), "/page#Invalid_Json");
    assert_eq!(state.update(json!("world")).unwrap(), UpdateOutcome::Unchanged);
}

#[test]
fn update_unencodable_value_is_not_scheduled() {
    let clock = ManualClock::new();
    let codec = FnCodec::new(
        |raw| Ok(Value::String(raw.to_string())),
        |value| {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| HashStateError::Encode("not a string".into()))
        },
    );
    let location = Rc::new(MemoryLocation::new("/page#hello"));
    let options = timed_options(&clock, 100).codec(Rc::new(codec));
    let state = HashState::activate(location.clone(), json!("initial"), options).unwrap();

    assert!(matches!(state.update(json!(5)), Err(HashStateError::Encode(_))));
    assert!(!state.has_pending_write());
    assert_eq!(clock.pending_timers(), 0);
    assert_eq!(state.read(), json!("hello"));
}

// =============================================================================
// Debounce
// =============================================================================

#[test]
fn debounce_burst_collapses_to_one_write() {
    let clock = ManualClock::new();
    let location = empty_location();
    let state = HashState::activate(location.clone(), json!({"n": 0}), timed_options(&clock, 100)).unwrap();
    assert_eq!(location.writes().len(), 1);

    assert_eq!(state.update(json!({"n": 1})).unwrap(), UpdateOutcome::Scheduled);
    clock.advance(ms(10));
    state.update(json!({"n": 2})).unwrap();
    clock.advance(ms(10));
    state.update(json!({"n": 3})).unwrap();

    // Intermediate values are readable before the write lands
    assert_eq!(state.read(), json!({"n": 3}));
    assert!(state.has_pending_write());
    assert_eq!(state.next_write_deadline(), Some(ms(120)));

    clock.advance(ms(99));
    assert_eq!(location.writes().len(), 1);

    clock.advance(ms(1));
    assert_eq!(location.writes().len(), 2);
    assert_eq!(written_fragment(&location, 1), encode(&json!({"n": 3})));
    assert!(!state.has_pending_write());
    assert_eq!(clock.pending_timers(), 0);
}

#[test]
fn debounce_leading_write_fires_first_then_trails() {
    let clock = ManualClock::new();
    let location = location_with(&json!(0));
    let options = timed_options(&clock, 100).leading_write(true);
    let state = HashState::activate(location.clone(), json!(0), options).unwrap();

    assert_eq!(state.update(json!(1)).unwrap(), UpdateOutcome::Written);
    clock.advance(ms(10));
    assert_eq!(state.update(json!(2)).unwrap(), UpdateOutcome::Scheduled);
    assert_eq!(location.writes().len(), 1);

    clock.advance(ms(100));
    assert_eq!(location.writes().len(), 2);
    assert_eq!(written_fragment(&location, 1), "2");
}

#[test]
fn debounce_max_wait_bounds_a_continuous_burst() {
    let clock = ManualClock::new();
    let location = location_with(&json!(-1));
    let options = timed_options(&clock, 100).max_write_wait_ms(250);
    let state = HashState::activate(location.clone(), json!(-1), options).unwrap();

    // Updates every 50ms would postpone a plain trailing write forever
    for n in 0..5 {
        state.update(json!(n)).unwrap();
        clock.advance(ms(50));
    }

    assert_eq!(location.writes().len(), 1);
    assert_eq!(written_fragment(&location, 0), "4");
}

#[test]
fn debounce_without_timer_waits_for_flush_due() {
    let clock = ManualClock::new();
    let location = empty_location();
    let options = HashStateOptions::new()
        .write_debounce_ms(100)
        .clock(Rc::new(clock.clone()));
    let state = HashState::activate(location.clone(), json!("a"), options).unwrap();

    state.update(json!("b")).unwrap();
    assert_eq!(state.next_write_deadline(), Some(ms(100)));
    assert!(!state.flush_due().unwrap());

    clock.advance(ms(100));
    assert_eq!(location.writes().len(), 1);
    assert!(state.flush_due().unwrap());
    assert_eq!(location.writes().len(), 2);
    assert_eq!(state.next_write_deadline(), None);
}

#[test]
fn debounce_flush_forces_pending_write() {
    let clock = ManualClock::new();
    let location = empty_location();
    let state = HashState::activate(location.clone(), json!("a"), timed_options(&clock, 500)).unwrap();

    state.update(json!("b")).unwrap();
    assert!(state.flush().unwrap());
    assert_eq!(location.writes().len(), 2);
    assert!(!state.flush().unwrap());

    // Timer was disarmed with the flush
    clock.advance(ms(1_000));
    assert_eq!(location.writes().len(), 2);
}

#[test]
fn debounce_timer_write_failure_is_kept_for_host() {
    let clock = ManualClock::new();
    let location = empty_location();
    let state = HashState::activate(location.clone(), json!("a"), timed_options(&clock, 50)).unwrap();

    state.update(json!("b")).unwrap();
    location.fail_writes(Some("QuotaExceeded"));
    clock.advance(ms(50));

    assert_eq!(state.take_write_error(), Some(HashStateError::Write("QuotaExceeded".into())));
    assert_eq!(state.take_write_error(), None);
    assert!(!state.has_pending_write());
}

// =============================================================================
// External changes
// =============================================================================

#[test]
fn external_change_updates_state_without_writing() {
    let location = location_with(&json!({"foo": "bar"}));
    let options = HashStateOptions::new().validate_keys_and_types(true);
    let state = HashState::activate(location.clone(), json!({"foo": "bar"}), options).unwrap();

    location.navigate_hash(&encode(&json!({"foo": "new"})));

    assert_eq!(state.read(), json!({"foo": "new"}));
    assert!(location.writes().is_empty());
    assert_eq!(state.listener().last_outcome(), Some(HashChangeOutcome::Applied));
}

#[test]
fn external_change_rejected_keeps_state() {
    let location = location_with(&json!({"foo": "bar"}));
    let options = HashStateOptions::new().validate_keys_and_types(true);
    let state = HashState::activate(location.clone(), json!({"foo": "bar"}), options).unwrap();

    let (_, events) = capture(|| location.navigate_hash(&encode(&json!({"other": true}))));

    assert_eq!(state.read(), json!({"foo": "bar"}));
    assert_eq!(state.listener().last_outcome(), Some(HashChangeOutcome::Rejected));
    assert_eq!(events.warnings().len(), 1);
}

#[test]
fn external_change_to_empty_fragment_keeps_state() {
    let location = location_with(&json!({"foo": "bar"}));
    let state = HashState::activate(location.clone(), json!({"foo": "bar"}), HashStateOptions::new()).unwrap();

    location.navigate_hash("");

    assert_eq!(state.read(), json!({"foo": "bar"}));
    assert_eq!(state.listener().last_outcome(), Some(HashChangeOutcome::Empty));
    assert!(location.writes().is_empty());
}

#[test]
fn external_change_equal_to_state_is_unchanged() {
    let location = location_with(&json!({"foo": "bar"}));
    let state = HashState::activate(location.clone(), json!({"foo": "bar"}), HashStateOptions::new()).unwrap();

    location.navigate_hash(&encode(&json!({"foo": "bar"})));

    assert_eq!(state.listener().last_outcome(), Some(HashChangeOutcome::Unchanged));
}

#[test]
fn external_change_cancels_pending_write() {
    let clock = ManualClock::new();
    let location = location_with(&json!("a"));
    let state = HashState::activate(location.clone(), json!("a"), timed_options(&clock, 100)).unwrap();

    state.update(json!("b")).unwrap();
    location.navigate_hash(&encode(&json!("c")));

    assert_eq!(state.read(), json!("c"));
    assert!(!state.has_pending_write());
    clock.advance(ms(200));
    assert!(location.writes().is_empty());
    assert_eq!(location.read_fragment(), encode(&json!("c")));
}

#[test]
fn external_change_undecodable_keeps_pending_write() {
    let clock = ManualClock::new();
    let location = location_with(&json!("a"));
    let state = HashState::activate(location.clone(), json!("a"), timed_options(&clock, 100)).unwrap();

    state.update(json!("b")).unwrap();
    location.navigate_hash("%7Bbroken");
    assert_eq!(state.listener().last_outcome(), Some(HashChangeOutcome::Undecodable));
    assert!(state.has_pending_write());

    clock.advance(ms(100));
    assert_eq!(location.read_fragment(), encode(&json!("b")));
}

#[test]
fn external_back_and_forward_step_through_pushed_snapshots() {
    let location = empty_location();
    let options = HashStateOptions::new().push_history_state(true);
    let state = HashState::activate(location.clone(), json!({"page": 1}), options).unwrap();
    state.update(json!({"page": 2})).unwrap();
    state.update(json!({"page": 3})).unwrap();
    let writes = location.writes().len();

    assert!(location.back());
    assert_eq!(state.read(), json!({"page": 2}));
    assert!(location.back());
    assert_eq!(state.read(), json!({"page": 1}));
    assert!(location.forward());
    assert_eq!(state.read(), json!({"page": 2}));

    // Navigation never writes back
    assert_eq!(location.writes().len(), writes);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn lifecycle_deactivate_cancels_pending_write_and_unsubscribes() {
    let clock = ManualClock::new();
    let location = empty_location();
    let state = HashState::activate(location.clone(), json!("a"), timed_options(&clock, 100)).unwrap();
    assert_eq!(location.listener_count(), 1);

    state.update(json!("b")).unwrap();
    state.deactivate();

    assert_eq!(state.state(), BindingState::Deactivated);
    assert_eq!(location.listener_count(), 0);
    assert_eq!(clock.pending_timers(), 0);
    clock.advance(ms(500));
    assert_eq!(location.writes().len(), 1);

    assert_eq!(state.update(json!("c")), Err(HashStateError::Deactivated));
    assert_eq!(state.flush(), Err(HashStateError::Deactivated));
    assert_eq!(state.next_write_deadline(), None);

    // Idempotent
    state.deactivate();
    assert_eq!(state.state(), BindingState::Deactivated);
}

#[test]
fn lifecycle_drop_tears_down() {
    let clock = ManualClock::new();
    let location = empty_location();
    {
        let state = HashState::activate(location.clone(), json!("a"), timed_options(&clock, 100)).unwrap();
        state.update(json!("b")).unwrap();
    }

    assert_eq!(location.listener_count(), 0);
    assert_eq!(clock.pending_timers(), 0);
    location.navigate_hash(&encode(&json!("external")));
    clock.advance(ms(500));
    assert_eq!(location.writes().len(), 1);
}

#[test]
fn lifecycle_setter_outlives_binding_gracefully() {
    let location = empty_location();
    let state = HashState::activate(location.clone(), json!({"q": ""}), HashStateOptions::new()).unwrap();
    let setter = state.setter();
    let other = setter.clone();

    setter.set(json!({"q": "a"})).unwrap();
    other.set_at_key("q", json!("b")).unwrap();
    assert_eq!(state.read(), json!({"q": "b"}));

    drop(state);
    assert_eq!(setter.set(json!({"q": "c"})), Err(HashStateError::Deactivated));
}

#[test]
fn lifecycle_notification_during_update_is_skipped() {
    let location = empty_location();
    let trigger = Rc::new(Cell::new(false));

    // Validator that fires a change notification from inside the update
    let (port, armed) = (Rc::downgrade(&location), trigger.clone());
    let options = HashStateOptions::new().custom_validator(move |_| {
        if armed.replace(false) {
            if let Some(port) = port.upgrade() {
                port.dispatch_hash_change();
            }
        }
        true
    });
    let state = HashState::activate(location.clone(), json!(1), options).unwrap();

    trigger.set(true);
    assert_eq!(state.update(json!(2)).unwrap(), UpdateOutcome::Written);

    assert_eq!(state.listener().last_outcome(), Some(HashChangeOutcome::Skipped));
    assert_eq!(state.read(), json!(2));
}

#[test]
fn lifecycle_reentrant_notification_is_skipped() {
    let location = location_with(&json!(1));
    let trigger = Rc::new(Cell::new(false));

    let (port, armed) = (Rc::downgrade(&location), trigger.clone());
    let options = HashStateOptions::new().custom_validator(move |_| {
        if armed.replace(false) {
            if let Some(port) = port.upgrade() {
                port.dispatch_hash_change();
            }
        }
        true
    });
    let state = HashState::activate(location.clone(), json!(0), options).unwrap();
    let processed = state.listener().processed();

    trigger.set(true);
    location.navigate_hash(&encode(&json!(5)));

    // Outer notification applied, nested one skipped
    assert_eq!(state.read(), json!(5));
    assert_eq!(state.listener().processed(), processed + 2);
    assert_eq!(state.listener().last_outcome(), Some(HashChangeOutcome::Applied));
}

#[test]
fn lifecycle_update_write_failure_propagates() {
    let location = empty_location();
    let state = HashState::activate(location.clone(), json!("a"), HashStateOptions::new()).unwrap();
    location.fail_writes(Some("SecurityError"));

    let err = state.update(json!("b")).unwrap_err();

    assert_eq!(err, HashStateError::Write("SecurityError".into()));
    assert_eq!(location.writes().len(), 1);

    location.fail_writes(None);
    assert_eq!(state.update(json!("c")).unwrap(), UpdateOutcome::Written);
}

#[test]
fn lifecycle_activation_logs_info() {
    let location = empty_location();
    let (_state, events) = capture(|| HashState::activate(location.clone(), json!({}), HashStateOptions::new()).unwrap());

    let info = events.at(Level::INFO);
    assert!(info.iter().any(|e| e.contains("Hash state binding activated")), "{:?}", info);
}

#[test]
fn lifecycle_debounce_without_timer_warns_at_activation() {
    let location = empty_location();
    let options = HashStateOptions::new().write_debounce_ms(20);
    let (_state, events) = capture(|| HashState::activate(location.clone(), json!(0), options).unwrap());

    let warnings = events.warnings();
    assert_eq!(warnings.len(), 1, "{:?}", warnings);
    assert!(warnings[0].contains("No write timer"), "{:?}", warnings);

    // Synchronous writes and an explicit timer need no warning
    let (_plain, events) = capture(|| HashState::activate(empty_location(), json!(0), HashStateOptions::new()).unwrap());
    assert!(events.warnings().is_empty());
    let clock = ManualClock::new();
    let (_timed, events) = capture(|| HashState::activate(empty_location(), json!(0), timed_options(&clock, 20)).unwrap());
    assert!(events.warnings().is_empty());
}

#[test]
fn lifecycle_teardown_right_after_activation() {
    let clock = ManualClock::new();
    let location = location_with(&json!({"page": 1}));
    let state = HashState::activate(location.clone(), json!({"page": 0}), timed_options(&clock, 100)).unwrap();
    assert_eq!(location.listener_count(), 1);

    drop(state);

    assert_eq!(location.listener_count(), 0);
    assert_eq!(clock.pending_timers(), 0);
    location.navigate_hash(&encode(&json!({"page": 2})));
    clock.advance(ms(500));
    assert!(location.writes().is_empty());

    let location = empty_location();
    let state = HashState::activate(location.clone(), json!("a"), HashStateOptions::new()).unwrap();
    state.deactivate();
    assert_eq!(state.state(), BindingState::Deactivated);
    assert_eq!(location.listener_count(), 0);
    assert_eq!(location.writes().len(), 1);
}
