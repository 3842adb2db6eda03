// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! State values and their kinds.
//!
//! A binding holds exactly one [`StateValue`]. It is a plain
//! [`serde_json::Value`], so anything the JSON grammar can express can be
//! mirrored into the URL. [`ValueKind`] is the closed set of shapes the
//! structural validator compares.
//!
//! # Example
//!
//! ```
//! use hash_state::{ValueKind};
//! use serde_json::json;
//!
//! assert_eq!(ValueKind::of(&json!({"foo": "bar"})), ValueKind::Mapping);
//! assert_eq!(ValueKind::of(&json!([1, 2])), ValueKind::Sequence);
//! assert!(ValueKind::of(&json!(1.5)).is_primitive());
//! ```

use serde_json::Value;

/// The state carried by a binding.
pub type StateValue = Value;

/// Shape of a [`StateValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Sequence,
    Mapping,
}

impl ValueKind {
    #[must_use]
    pub fn of(value: &StateValue) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Sequence,
            Value::Object(_) => Self::Mapping,
        }
    }

    /// Primitives compare by value even under strict equality.
    #[must_use]
    pub fn is_primitive(self) -> bool {
        !matches!(self, Self::Sequence | Self::Mapping)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
