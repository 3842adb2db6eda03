// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for hash state bindings.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter, if any.
//! Without an installed recorder every call here is a no-op.
//!
//! # Metric Naming Convention
//! - `hash_state_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_bytes` suffix for size histograms
//!
//! # Labels
//! - `mode`: replace, push
//! - `reason`: activation, immediate, leading, trailing, manual
//! - `source`: activation, hash_change
//! - `outcome`: applied, unchanged, empty, undecodable, rejected, skipped

use metrics::{counter, gauge, histogram};

use crate::debounce::WriteReason;
use crate::listener::{HashChangeOutcome, InboundSource};
use crate::location::HistoryMode;
use crate::validator::ValidatorKind;

/// Record a fragment written through the history API
pub fn record_write(mode: HistoryMode, reason: WriteReason) {
    counter!(
        "hash_state_writes_total",
        "mode" => mode.as_str(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record the encoded size of a written fragment
pub fn record_fragment_bytes(bytes: usize) {
    histogram!("hash_state_fragment_bytes").record(bytes as f64);
}

/// Record how many updates a debounced write folded together
pub fn record_coalesced(count: usize) {
    histogram!("hash_state_coalesced_updates").record(count as f64);
}

/// Record a history API refusal
pub fn record_write_failure(mode: HistoryMode) {
    counter!("hash_state_write_failures_total", "mode" => mode.as_str()).increment(1);
}

/// Record a pending write replaced by a newer one
pub fn record_superseded_write() {
    counter!("hash_state_superseded_writes_total").increment(1);
}

/// Record an update dropped by the equality guard
pub fn record_suppressed_update() {
    counter!("hash_state_suppressed_updates_total").increment(1);
}

/// Record a fragment that could not be decoded
pub fn record_decode_failure(source: InboundSource) {
    counter!("hash_state_decode_failures_total", "source" => source.as_str()).increment(1);
}

/// Record a candidate refused by a validator
pub fn record_rejection(source: InboundSource, validator: ValidatorKind) {
    counter!(
        "hash_state_rejections_total",
        "source" => source.as_str(),
        "validator" => validator.as_str()
    )
    .increment(1);
}

/// Record the outcome of an external fragment change
pub fn record_hash_change(outcome: HashChangeOutcome) {
    counter!("hash_state_hash_changes_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record how a binding reconciled at activation
pub fn record_activation(reconciliation: &'static str) {
    counter!("hash_state_activations_total", "reconciliation" => reconciliation).increment(1);
}

/// Set whether a debounced write is pending (0 or 1)
pub fn set_pending_write(pending: bool) {
    gauge!("hash_state_pending_write").set(if pending { 1.0 } else { 0.0 });
}
