//! First-wins merge of capability declarations.
//!
//! Merging `primary` with `secondary` keeps every value `primary` already set
//! and fills the gaps from `secondary`. Nested structures recurse, and lists
//! accumulate as a left-biased distinct union so command and section lists
//! collected from several servers add up instead of replacing each other.

use serde_json::{Map, Value};

/// A value that can absorb a lower-priority value of the same type.
pub trait Merge {
    /// Merge `secondary` into `self`; `self` wins every conflict.
    fn merge(self, secondary: Self) -> Self;
}

impl<T: Merge> Merge for Option<T> {
    fn merge(self, secondary: Self) -> Self {
        match (self, secondary) {
            (Some(primary), Some(secondary)) => Some(primary.merge(secondary)),
            (Some(primary), None) => Some(primary),
            (None, secondary) => secondary,
        }
    }
}

impl Merge for Map<String, Value> {
    fn merge(mut self, secondary: Self) -> Self {
        for (key, value) in secondary {
            match self.remove(&key) {
                Some(existing) => {
                    let merged = existing.merge(value);
                    self.insert(key, merged);
                }
                None => {
                    self.insert(key, value);
                }
            }
        }
        self
    }
}

impl Merge for Value {
    /// Objects recurse, arrays union, anything else keeps `self`.
    ///
    /// A key whose value kind differs between the two sides (object against
    /// scalar, array against object, ...) keeps the primary value untouched.
    fn merge(self, secondary: Self) -> Self {
        match (self, secondary) {
            (Value::Object(primary), Value::Object(secondary)) => {
                Value::Object(primary.merge(secondary))
            }
            (Value::Array(primary), Value::Array(secondary)) => {
                Value::Array(union(primary, secondary))
            }
            (primary, _) => primary,
        }
    }
}

/// Distinct union of two lists, keeping first-seen order.
pub fn union<T: PartialEq>(primary: Vec<T>, secondary: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(primary.len() + secondary.len());
    for item in primary.into_iter().chain(secondary) {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
