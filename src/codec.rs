// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fragment codecs.
//!
//! A [`HashCodec`] turns a [`StateValue`] into URL-safe fragment text and back.
//! The default [`JsonCodec`] serializes to JSON and percent-encodes the whole
//! string with the same unreserved set as `encodeURIComponent`, so
//! structural characters (`{`, `"`, `:`) never appear raw in the address bar.
//!
//! # Example
//!
//! ```
//! use hash_state::{HashCodec, JsonCodec};
//! use serde_json::json;
//!
//! let codec = JsonCodec;
//! let encoded = codec.dump(&json!({"foo": "bar"})).unwrap();
//! assert_eq!(encoded, "%7B%22foo%22%3A%22bar%22%7D");
//! assert_eq!(codec.parse(Some(&encoded)).unwrap(), json!({"foo": "bar"}));
//! ```

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::HashStateError;
use crate::value::StateValue;

/// Bytes left unescaped by `encodeURIComponent`.
const FRAGMENT_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Serializes state to fragment text and parses it back.
///
/// `parse` must never panic: every malformed input maps to an error, which
/// callers treat as "no usable state in the URL". `parse(Some(&dump(v)?))`
/// must yield `v`.
pub trait HashCodec {
    /// Parse raw fragment text (without `#`). `None` and `""` mean no state.
    fn parse(&self, raw: Option<&str>) -> Result<StateValue, HashStateError>;

    /// Encode a value as fragment text (without `#`).
    fn dump(&self, value: &StateValue) -> Result<String, HashStateError>;
}

/// Percent-encoded JSON, the default codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl HashCodec for JsonCodec {
    fn parse(&self, raw: Option<&str>) -> Result<StateValue, HashStateError> {
        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(HashStateError::EmptyFragment),
        };

        // Text without escapes decodes to itself
        let decoded = percent_decode_str(raw)
            .decode_utf8()
            .map_err(|e| HashStateError::Decode(e.to_string()))?;

        serde_json::from_str(&decoded).map_err(|e| HashStateError::Decode(e.to_string()))
    }

    fn dump(&self, value: &StateValue) -> Result<String, HashStateError> {
        let json = serde_json::to_string(value).map_err(|e| HashStateError::Encode(e.to_string()))?;
        Ok(utf8_percent_encode(&json, FRAGMENT_COMPONENT).to_string())
    }
}

type ParseFn = dyn Fn(&str) -> Result<StateValue, HashStateError>;
type DumpFn = dyn Fn(&StateValue) -> Result<String, HashStateError>;

/// A codec assembled from a caller-supplied parse/dump pair.
///
/// Empty fragments are filtered before `parse` is called, so the closure only
/// ever sees non-empty text.
pub struct FnCodec {
    parse: Box<ParseFn>,
    dump: Box<DumpFn>,
}

impl FnCodec {
    pub fn new<P, D>(parse: P, dump: D) -> Self
    where
        P: Fn(&str) -> Result<StateValue, HashStateError> + 'static,
        D: Fn(&StateValue) -> Result<String, HashStateError> + 'static,
    {
        Self {
            parse: Box::new(parse),
            dump: Box::new(dump),
        }
    }
}

impl std::fmt::Debug for FnCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}

impl HashCodec for FnCodec {
    fn parse(&self, raw: Option<&str>) -> Result<StateValue, HashStateError> {
        match raw {
            Some(raw) if !raw.is_empty() => (self.parse)(raw),
            _ => Err(HashStateError::EmptyFragment),
        }
    }

    fn dump(&self, value: &StateValue) -> Result<String, HashStateError> {
        (self.dump)(value)
    }
}
