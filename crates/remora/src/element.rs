//! The graphic element hierarchy: nodes, edges, and sprites.
//!
//! Common state (id, retained attributes, owning group) lives in
//! [`GraphicElement`]; kind-specific state lives in the [`ElementBody`]
//! payload. Elements never exist outside a style group: the registry assigns
//! a group before insertion and keeps the back-reference current through
//! migrations.

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;
use crate::group::GroupId;
use crate::sprite::SpriteState;

pub(crate) type AttrMap = IndexMap<String, AttributeValue, FxBuildHasher>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Node,
    Edge,
    Sprite,
}

/// Kind-specific payload of a graphic element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementBody {
    Node {
        x: f64,
        y: f64,
        z: f64,
    },
    Edge {
        source: String,
        target: String,
        directed: bool,
    },
    Sprite(SpriteState),
}

impl ElementBody {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementBody::Node { .. } => ElementKind::Node,
            ElementBody::Edge { .. } => ElementKind::Edge,
            ElementBody::Sprite(_) => ElementKind::Sprite,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphicElement {
    id: String,
    body: ElementBody,
    attributes: AttrMap,
    classes: Vec<String>,
    group: GroupId,
}

impl GraphicElement {
    pub(crate) fn new(id: impl Into<String>, body: ElementBody, group: GroupId) -> Self {
        Self {
            id: id.into(),
            body,
            attributes: AttrMap::default(),
            classes: Vec::new(),
            group,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ElementKind {
        self.body.kind()
    }

    pub fn body(&self) -> &ElementBody {
        &self.body
    }

    /// The group this element currently belongs to. Exactly one at all times.
    pub fn group(&self) -> GroupId {
        self.group
    }

    pub(crate) fn set_group(&mut self, group: GroupId) {
        self.group = group;
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Sets or removes (`None`) a retained attribute. Returns the previous
    /// value.
    pub(crate) fn put_attribute(
        &mut self,
        key: &str,
        value: Option<AttributeValue>,
    ) -> Option<AttributeValue> {
        match value {
            Some(value) => self.attributes.insert(key.to_string(), value),
            None => self.attributes.shift_remove(key),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.attribute("label").and_then(AttributeValue::as_text)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub(crate) fn set_classes(&mut self, classes: Vec<String>) {
        self.classes = classes;
    }

    /// Node position, if this is a node.
    pub fn position(&self) -> Option<(f64, f64, f64)> {
        match &self.body {
            ElementBody::Node { x, y, z } => Some((*x, *y, *z)),
            _ => None,
        }
    }

    /// Applies the position attribute convention (`x`/`y`/`z` scalars,
    /// `xy`/`xyz` vectors) to a node body. Non-node bodies ignore it.
    pub(crate) fn apply_position_key(&mut self, key: &str, value: &AttributeValue) {
        let ElementBody::Node { x, y, z } = &mut self.body else {
            return;
        };
        let c = value.components();
        match key {
            "x" => {
                if let Some(v) = c.first() {
                    *x = *v;
                }
            }
            "y" => {
                if let Some(v) = c.first() {
                    *y = *v;
                }
            }
            "z" => {
                if let Some(v) = c.first() {
                    *z = *v;
                }
            }
            "xy" | "xyz" => {
                if let Some(v) = c.first() {
                    *x = *v;
                }
                if let Some(v) = c.get(1) {
                    *y = *v;
                }
                if let Some(v) = c.get(2) {
                    *z = *v;
                }
            }
            _ => {}
        }
    }

    pub fn sprite(&self) -> Option<&SpriteState> {
        match &self.body {
            ElementBody::Sprite(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn sprite_mut(&mut self) -> Option<&mut SpriteState> {
        match &mut self.body {
            ElementBody::Sprite(state) => Some(state),
            _ => None,
        }
    }
}
