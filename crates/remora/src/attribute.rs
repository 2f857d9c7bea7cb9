//! Attribute values and the boundary filter.
//!
//! The mirror only ever stores a small, render-relevant subset of the source
//! graph's attributes. Everything else is dropped at the boundary by
//! [`AttributeFilter`] before it can reach the element registry.

use serde::{Deserialize, Serialize};

/// Reserved namespace for UI-only attributes. Keys under this prefix are
/// always retained by the mirror and carry no meaning for the source graph's
/// own semantics.
pub const UI_NAMESPACE: &str = "ui";

/// `UI_NAMESPACE` followed by the separator, ready for prefix tests.
pub const UI_PREFIX: &str = "ui.";

/// Prefix of the sprite sub-namespace (see the `sprite` module for the full
/// key grammar).
pub const SPRITE_PREFIX: &str = "ui.sprite.";

/// Position/label keys retained outside the reserved namespace.
const RETAINED_KEYS: [&str; 7] = ["x", "y", "z", "xy", "xyz", "label", "stylesheet"];

/// A value carried by a retained attribute.
///
/// `Flag` is the "present but valueless" sentinel used by the sprite
/// attachment protocol (an attach key is set with no value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
    Vector(Vec<f64>),
    Flag,
}

impl AttributeValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::Vector(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric components of the value, whether scalar or vector.
    pub fn components(&self) -> &[f64] {
        match self {
            AttributeValue::Number(n) => std::slice::from_ref(n),
            AttributeValue::Vector(v) => v.as_slice(),
            _ => &[],
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        AttributeValue::Number(n)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<Vec<f64>> for AttributeValue {
    fn from(v: Vec<f64>) -> Self {
        AttributeValue::Vector(v)
    }
}

/// Pure predicate over attribute keys: which attributes does the mirror keep?
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeFilter;

impl AttributeFilter {
    pub fn retains(&self, key: &str) -> bool {
        RETAINED_KEYS.contains(&key) || key.starts_with(UI_PREFIX)
    }
}
