// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Equality guard.
//!
//! An update equal to the current state is dropped before it touches either
//! the in-memory state or the URL, so it never creates a redundant history
//! entry.

use std::rc::Rc;

use crate::value::{StateValue, ValueKind};

type EqualFn = dyn Fn(&StateValue, &StateValue) -> bool;

/// Policy deciding whether two states are indistinguishable.
#[derive(Clone, Default)]
pub enum Equality {
    /// Deep structural equality
    #[default]
    Value,
    /// Identity semantics: primitives compare by value, sequences and
    /// mappings never compare equal because every update is a fresh value
    Strict,
    /// Caller-supplied predicate, `true` when equal
    Custom(Rc<EqualFn>),
}

impl Equality {
    pub fn custom<F>(equal: F) -> Self
    where
        F: Fn(&StateValue, &StateValue) -> bool + 'static,
    {
        Self::Custom(Rc::new(equal))
    }

    #[must_use]
    pub fn equal(&self, old: &StateValue, new: &StateValue) -> bool {
        match self {
            Self::Value => old == new,
            Self::Strict => ValueKind::of(old).is_primitive() && old == new,
            Self::Custom(equal) => equal(old, new),
        }
    }
}

impl std::fmt::Debug for Equality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value => write!(f, "Value"),
            Self::Strict => write!(f, "Strict"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
