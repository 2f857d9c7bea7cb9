//! Resolved styles and the style-sheet resolution seam.
//!
//! The style-sheet grammar and cascade live outside this crate. The mirror
//! only consumes the *result* of resolution: a [`StyleSignature`] naming the
//! resolved style, its z-index, and which visual properties it declares as
//! attribute-driven. Resolution is injected through [`StyleResolver`] and is
//! treated as a pure function; nothing is cached across a reload.

use serde::{Deserialize, Serialize};

use crate::element::ElementKind;

/// Identity of a resolved style. Two elements with equal signatures share one
/// style group and can be drawn with a single state setup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleSignature {
    id: String,
    z_index: i32,
    /// Visual property keys the style declares as attribute-driven, sorted.
    dynamic_keys: Vec<String>,
}

impl StyleSignature {
    pub fn new(
        id: impl Into<String>,
        z_index: i32,
        dynamic_keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut dynamic_keys: Vec<String> = dynamic_keys.into_iter().map(Into::into).collect();
        dynamic_keys.sort();
        dynamic_keys.dedup();
        Self {
            id: id.into(),
            z_index,
            dynamic_keys,
        }
    }

    /// The implicit default style: z-index 0, no dynamic properties. Used
    /// whenever resolution yields nothing for an element.
    pub fn default_style() -> Self {
        Self {
            id: "default".to_string(),
            z_index: 0,
            dynamic_keys: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn is_dynamic_key(&self, key: &str) -> bool {
        self.dynamic_keys.binary_search_by(|k| k.as_str().cmp(key)).is_ok()
    }

    pub fn dynamic_keys(&self) -> &[String] {
        &self.dynamic_keys
    }
}

impl Default for StyleSignature {
    fn default() -> Self {
        Self::default_style()
    }
}

/// The external style-sheet component, seen from the mirror.
///
/// Implementations must behave as pure functions of their current sheet: for
/// a given `(kind, id, classes)` the same signature comes back until
/// [`StyleResolver::reload`] replaces the sheet.
pub trait StyleResolver {
    fn resolve(&self, kind: ElementKind, id: &str, classes: &[String]) -> StyleSignature;

    /// Replaces the style sheet wholesale. The mirror follows this with one
    /// batched re-resolution pass over every element.
    fn reload(&mut self, source: &str) {
        let _ = source;
    }
}

/// Resolver used when no style sheet is installed: everything gets the
/// default signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStyleResolver;

impl StyleResolver for DefaultStyleResolver {
    fn resolve(&self, _kind: ElementKind, _id: &str, _classes: &[String]) -> StyleSignature {
        StyleSignature::default_style()
    }
}

/// Scope of a style invalidation: which elements could a sheet change have
/// re-matched?
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    All,
    Kind(ElementKind),
    Id(String),
    Class(String),
}

impl Selector {
    pub fn matches(&self, kind: ElementKind, id: &str, classes: &[String]) -> bool {
        match self {
            Selector::All => true,
            Selector::Kind(k) => *k == kind,
            Selector::Id(target) => target == id,
            Selector::Class(class) => classes.iter().any(|c| c == class),
        }
    }
}
