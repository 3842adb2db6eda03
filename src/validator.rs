// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Candidate validation.
//!
//! A [`Validator`] decides whether a value decoded from the URL may replace
//! the current state. Validators are pure predicates: they never mutate the
//! candidate and never log. The binding logs rejections at the call site.
//!
//! # Example
//!
//! ```
//! use hash_state::validator::{compose, structural_validator};
//! use std::rc::Rc;
//! use serde_json::json;
//!
//! let shape = structural_validator(&json!({"page": 1, "query": ""}));
//! let positive: hash_state::Validator = Rc::new(|v: &serde_json::Value| v["page"].as_i64().unwrap_or(0) > 0);
//! let check = compose(Some(shape), Some(positive));
//!
//! assert!(check(&json!({"query": "rust", "page": 2})));
//! assert!(!check(&json!({"query": "rust", "page": 0})));
//! assert!(!check(&json!({"query": "rust"})));
//! ```

use std::rc::Rc;

use serde_json::{Map, Value};

use crate::value::{StateValue, ValueKind};

/// Predicate over candidate state.
pub type Validator = Rc<dyn Fn(&StateValue) -> bool>;

/// Which validator in a chain refused a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorKind {
    /// Key set and per-key kinds of the initial value
    Structural,
    /// Caller-supplied predicate
    Custom,
}

impl ValidatorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a check that accepts only values shaped like `reference`.
///
/// For a mapping reference, the candidate must be a mapping with exactly the
/// same keys (order-independent) and each value must have the same
/// [`ValueKind`] as the reference's value for that key. Nested values are not
/// inspected. For any other reference the candidate must simply have the
/// same kind.
#[must_use]
pub fn structural_validator(reference: &StateValue) -> Validator {
    match reference {
        Value::Object(fields) => {
            let expected: Vec<(String, ValueKind)> = fields
                .iter()
                .map(|(key, value)| (key.clone(), ValueKind::of(value)))
                .collect();
            Rc::new(move |candidate: &StateValue| match candidate {
                Value::Object(candidate) => same_shape(&expected, candidate),
                _ => false,
            })
        }
        other => {
            let kind = ValueKind::of(other);
            Rc::new(move |candidate: &StateValue| ValueKind::of(candidate) == kind)
        }
    }
}

fn same_shape(expected: &[(String, ValueKind)], candidate: &Map<String, Value>) -> bool {
    candidate.len() == expected.len()
        && expected.iter().all(|(key, kind)| {
            candidate
                .get(key)
                .is_some_and(|value| ValueKind::of(value) == *kind)
        })
}

/// AND of the present validators. With neither present, accepts everything.
#[must_use]
pub fn compose(base: Option<Validator>, custom: Option<Validator>) -> Validator {
    match (base, custom) {
        (Some(base), Some(custom)) => {
            Rc::new(move |candidate: &StateValue| base(candidate) && custom(candidate))
        }
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => Rc::new(|_: &StateValue| true),
    }
}

/// Ordered list of validators that reports which one rejected.
///
/// The empty chain accepts everything.
#[derive(Clone, Default)]
pub struct ValidatorChain {
    validators: Vec<(ValidatorKind, Validator)>,
}

impl ValidatorChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain with the structural check of `reference` and/or a custom predicate.
    #[must_use]
    pub fn from_parts(reference: Option<&StateValue>, custom: Option<Validator>) -> Self {
        let mut chain = Self::new();
        if let Some(reference) = reference {
            chain.push(ValidatorKind::Structural, structural_validator(reference));
        }
        if let Some(custom) = custom {
            chain.push(ValidatorKind::Custom, custom);
        }
        chain
    }

    pub fn push(&mut self, kind: ValidatorKind, validator: Validator) {
        self.validators.push((kind, validator));
    }

    /// Run every validator in order, stopping at the first rejection.
    pub fn check(&self, candidate: &StateValue) -> Result<(), ValidatorKind> {
        match self.validators.iter().find(|(_, validator)| !validator(candidate)) {
            Some((kind, _)) => Err(*kind),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Collapse the chain into a single predicate.
    #[must_use]
    pub fn into_validator(self) -> Validator {
        self.validators
            .into_iter()
            .map(|(_, validator)| validator)
            .fold(compose(None, None), |acc, next| compose(Some(acc), Some(next)))
    }
}

impl std::fmt::Debug for ValidatorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.validators.iter().map(|(kind, _)| kind))
            .finish()
    }
}
