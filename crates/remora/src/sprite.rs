//! Sprites encoded as plain graph attributes.
//!
//! A sprite never has its own serialization: its existence, position,
//! attachment, and custom properties are all carried by string-keyed
//! attributes, so any format that round-trips arbitrary attributes
//! round-trips sprites for free.
//!
//! Key grammar (under the reserved `ui.` namespace):
//!
//! - `ui.sprite.<id>` on the graph: the sprite exists; the value holds one to
//!   three numeric coordinates interpreted against the current attachment
//!   (free x/y/z, fraction along an attached edge, or angle+radius around an
//!   attached node).
//! - `ui.sprite.<id>` on a node or edge (value is the sentinel): the sprite
//!   is attached to that element. Removing the key there detaches it.
//! - `ui.sprite.<id>.<prop>`: custom property `<prop>`; tracks attribute
//!   set/remove 1:1. Dots after `<id>` belong to the property name, so
//!   unknown trailing segments stay decodable.
//!
//! Decoding is idempotent (replaying the full attribute set rebuilds the same
//! state) and encoding emits only the changed key, keeping relay payloads
//! minimal.

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeValue, SPRITE_PREFIX};
use crate::event::{ElementScope, GraphEvent};

type PropMap = IndexMap<String, AttributeValue, FxBuildHasher>;

/// What a sprite is attached to. At most one attach point at a time; the
/// codec enforces this by synthesizing a detach when a second one appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachPoint {
    Node(String),
    Edge(String),
}

impl AttachPoint {
    pub fn target(&self) -> &str {
        match self {
            AttachPoint::Node(id) | AttachPoint::Edge(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpritePosition {
    /// Graph coordinates, used while unattached.
    Free { x: f64, y: f64, z: f64 },
    /// Fraction in `[0, 1]` along the attached edge.
    AlongEdge { fraction: f64 },
    /// Polar offset around the attached node.
    AroundNode { angle: f64, radius: f64 },
}

impl SpritePosition {
    pub const ORIGIN: SpritePosition = SpritePosition::Free {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
}

/// Decoded state of one sprite.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteState {
    position: SpritePosition,
    attachment: Option<AttachPoint>,
    // Free-floating coordinates kept while attached; restored on detach.
    last_free: Option<[f64; 3]>,
    properties: PropMap,
}

impl Default for SpriteState {
    fn default() -> Self {
        Self {
            position: SpritePosition::ORIGIN,
            attachment: None,
            last_free: None,
            properties: PropMap::default(),
        }
    }
}

impl SpriteState {
    pub fn position(&self) -> SpritePosition {
        self.position
    }

    pub fn attachment(&self) -> Option<&AttachPoint> {
        self.attachment.as_ref()
    }

    /// The last free-floating position, kept (but unused for placement)
    /// while the sprite is attached.
    pub fn last_free_position(&self) -> Option<(f64, f64, f64)> {
        self.last_free.map(|[x, y, z]| (x, y, z))
    }

    pub fn property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn apply(&mut self, update: &SpriteUpdate) {
        match update {
            SpriteUpdate::Moved { position, .. } => {
                self.position = *position;
                if let SpritePosition::Free { x, y, z } = position {
                    self.last_free = Some([*x, *y, *z]);
                }
            }
            SpriteUpdate::Attached { attach, .. } => {
                if let SpritePosition::Free { x, y, z } = self.position {
                    self.last_free = Some([x, y, z]);
                }
                self.position = match attach {
                    AttachPoint::Edge(_) => SpritePosition::AlongEdge { fraction: 0.0 },
                    AttachPoint::Node(_) => SpritePosition::AroundNode {
                        angle: 0.0,
                        radius: 0.0,
                    },
                };
                self.attachment = Some(attach.clone());
            }
            SpriteUpdate::Detached { .. } => {
                self.attachment = None;
                let [x, y, z] = self.last_free.unwrap_or([0.0, 0.0, 0.0]);
                self.position = SpritePosition::Free { x, y, z };
            }
            SpriteUpdate::PropertySet { key, value, .. } => {
                self.properties.insert(key.clone(), value.clone());
            }
            SpriteUpdate::PropertyRemoved { key, .. } => {
                self.properties.shift_remove(key);
            }
            SpriteUpdate::Added { .. } | SpriteUpdate::Removed { .. } => {}
        }
    }
}

/// A single sprite mutation synthesized from one attribute change.
#[derive(Debug, Clone, PartialEq)]
pub enum SpriteUpdate {
    Added { id: String },
    Removed { id: String },
    Moved { id: String, position: SpritePosition },
    Attached { id: String, attach: AttachPoint },
    Detached { id: String, from: AttachPoint },
    PropertySet {
        id: String,
        key: String,
        value: AttributeValue,
    },
    PropertyRemoved { id: String, key: String },
}

impl SpriteUpdate {
    pub fn sprite_id(&self) -> &str {
        match self {
            SpriteUpdate::Added { id }
            | SpriteUpdate::Removed { id }
            | SpriteUpdate::Moved { id, .. }
            | SpriteUpdate::Attached { id, .. }
            | SpriteUpdate::Detached { id, .. }
            | SpriteUpdate::PropertySet { id, .. }
            | SpriteUpdate::PropertyRemoved { id, .. } => id,
        }
    }
}

/// A parsed sprite attribute key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteKey<'a> {
    Main { sprite: &'a str },
    Property { sprite: &'a str, prop: &'a str },
}

/// Parses a key against the sprite grammar. Malformed keys (missing id or
/// empty property) yield `None` and are ignored by the codec.
pub fn parse_sprite_key(key: &str) -> Option<SpriteKey<'_>> {
    let rest = key.strip_prefix(SPRITE_PREFIX)?;
    match rest.split_once('.') {
        None if rest.is_empty() => None,
        None => Some(SpriteKey::Main { sprite: rest }),
        Some((sprite, prop)) => {
            if sprite.is_empty() || prop.is_empty() {
                None
            } else {
                Some(SpriteKey::Property { sprite, prop })
            }
        }
    }
}

/// Where a sprite attribute change landed, with the attach-point kind
/// already resolved by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteScope<'a> {
    Graph,
    OnNode(&'a str),
    OnEdge(&'a str),
}

/// Translates sprite-namespace attribute changes into [`SpriteUpdate`]s and
/// sprite mutations back into minimal attribute deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpriteCodec;

impl SpriteCodec {
    /// Decodes one attribute change (`value: None` = removal). `current` is
    /// the sprite's existing state, if any. Returns the updates in
    /// application order; malformed keys decode to nothing.
    pub fn decode(
        &self,
        scope: SpriteScope<'_>,
        key: &str,
        value: Option<&AttributeValue>,
        current: Option<&SpriteState>,
    ) -> Vec<SpriteUpdate> {
        let Some(parsed) = parse_sprite_key(key) else {
            return Vec::new();
        };
        match parsed {
            SpriteKey::Main { sprite } => self.decode_main(scope, sprite, value, current),
            SpriteKey::Property { sprite, prop } => {
                self.decode_property(sprite, prop, value, current)
            }
        }
    }

    fn decode_main(
        &self,
        scope: SpriteScope<'_>,
        sprite: &str,
        value: Option<&AttributeValue>,
        current: Option<&SpriteState>,
    ) -> Vec<SpriteUpdate> {
        let mut out = Vec::new();
        match scope {
            SpriteScope::Graph => match value {
                Some(value) => {
                    if current.is_none() {
                        out.push(SpriteUpdate::Added {
                            id: sprite.to_string(),
                        });
                    }
                    let position = Self::position_from(value, current);
                    out.push(SpriteUpdate::Moved {
                        id: sprite.to_string(),
                        position,
                    });
                }
                None => {
                    if current.is_some() {
                        out.push(SpriteUpdate::Removed {
                            id: sprite.to_string(),
                        });
                    }
                }
            },
            SpriteScope::OnNode(target) | SpriteScope::OnEdge(target) => {
                let attach = match scope {
                    SpriteScope::OnNode(_) => AttachPoint::Node(target.to_string()),
                    _ => AttachPoint::Edge(target.to_string()),
                };
                match value {
                    Some(_) => {
                        if current.is_none() {
                            out.push(SpriteUpdate::Added {
                                id: sprite.to_string(),
                            });
                        }
                        let previous = current.and_then(SpriteState::attachment);
                        if previous == Some(&attach) {
                            return out;
                        }
                        // Single-attachment policy: a second attach point
                        // implicitly detaches the first, as a distinct update
                        // so the removal is relayed too.
                        if let Some(previous) = previous {
                            out.push(SpriteUpdate::Detached {
                                id: sprite.to_string(),
                                from: previous.clone(),
                            });
                        }
                        out.push(SpriteUpdate::Attached {
                            id: sprite.to_string(),
                            attach,
                        });
                    }
                    None => {
                        if current.and_then(SpriteState::attachment) == Some(&attach) {
                            out.push(SpriteUpdate::Detached {
                                id: sprite.to_string(),
                                from: attach,
                            });
                        }
                    }
                }
            }
        }
        out
    }

    fn decode_property(
        &self,
        sprite: &str,
        prop: &str,
        value: Option<&AttributeValue>,
        current: Option<&SpriteState>,
    ) -> Vec<SpriteUpdate> {
        let mut out = Vec::new();
        match value {
            Some(value) => {
                if current.is_none() {
                    out.push(SpriteUpdate::Added {
                        id: sprite.to_string(),
                    });
                }
                out.push(SpriteUpdate::PropertySet {
                    id: sprite.to_string(),
                    key: prop.to_string(),
                    value: value.clone(),
                });
            }
            None => {
                if current.is_some_and(|s| s.property(prop).is_some()) {
                    out.push(SpriteUpdate::PropertyRemoved {
                        id: sprite.to_string(),
                        key: prop.to_string(),
                    });
                }
            }
        }
        out
    }

    // Coordinates are read against the current attachment: fraction along an
    // edge, angle+radius around a node, free x/y/z otherwise.
    fn position_from(value: &AttributeValue, current: Option<&SpriteState>) -> SpritePosition {
        let c = value.components();
        let nth = |i: usize| c.get(i).copied().unwrap_or(0.0);
        match current.and_then(SpriteState::attachment) {
            Some(AttachPoint::Edge(_)) => SpritePosition::AlongEdge { fraction: nth(0) },
            Some(AttachPoint::Node(_)) => SpritePosition::AroundNode {
                angle: nth(0),
                radius: nth(1),
            },
            None => SpritePosition::Free {
                x: nth(0),
                y: nth(1),
                z: nth(2),
            },
        }
    }

    /// Minimal attribute delta for one sprite mutation: exactly the changed
    /// key, never a snapshot.
    pub fn encode(&self, update: &SpriteUpdate) -> GraphEvent {
        match update {
            SpriteUpdate::Added { id } => GraphEvent::AttributeChanged {
                scope: ElementScope::Graph,
                key: main_key(id),
                value: Some(AttributeValue::Vector(vec![0.0, 0.0, 0.0])),
            },
            SpriteUpdate::Removed { id } => GraphEvent::AttributeChanged {
                scope: ElementScope::Graph,
                key: main_key(id),
                value: None,
            },
            SpriteUpdate::Moved { id, position } => GraphEvent::AttributeChanged {
                scope: ElementScope::Graph,
                key: main_key(id),
                value: Some(encode_position(*position)),
            },
            SpriteUpdate::Attached { id, attach } => GraphEvent::AttributeChanged {
                scope: ElementScope::Element(attach.target().to_string()),
                key: main_key(id),
                value: Some(AttributeValue::Flag),
            },
            SpriteUpdate::Detached { id, from } => GraphEvent::AttributeChanged {
                scope: ElementScope::Element(from.target().to_string()),
                key: main_key(id),
                value: None,
            },
            SpriteUpdate::PropertySet { id, key, value } => GraphEvent::AttributeChanged {
                scope: ElementScope::Graph,
                key: prop_key(id, key),
                value: Some(value.clone()),
            },
            SpriteUpdate::PropertyRemoved { id, key } => GraphEvent::AttributeChanged {
                scope: ElementScope::Graph,
                key: prop_key(id, key),
                value: None,
            },
        }
    }
}

pub fn main_key(sprite: &str) -> String {
    format!("{SPRITE_PREFIX}{sprite}")
}

pub fn prop_key(sprite: &str, prop: &str) -> String {
    format!("{SPRITE_PREFIX}{sprite}.{prop}")
}

fn encode_position(position: SpritePosition) -> AttributeValue {
    match position {
        SpritePosition::Free { x, y, z } => AttributeValue::Vector(vec![x, y, z]),
        SpritePosition::AlongEdge { fraction } => AttributeValue::Number(fraction),
        SpritePosition::AroundNode { angle, radius } => {
            AttributeValue::Vector(vec![angle, radius])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_grammar_accepts_main_and_property_keys() {
        assert_eq!(
            parse_sprite_key("ui.sprite.S1"),
            Some(SpriteKey::Main { sprite: "S1" })
        );
        assert_eq!(
            parse_sprite_key("ui.sprite.S1.color"),
            Some(SpriteKey::Property {
                sprite: "S1",
                prop: "color"
            })
        );
    }

    #[test]
    fn key_grammar_keeps_trailing_segments_in_the_property_name() {
        assert_eq!(
            parse_sprite_key("ui.sprite.S1.icon.hover.src"),
            Some(SpriteKey::Property {
                sprite: "S1",
                prop: "icon.hover.src"
            })
        );
    }

    #[test]
    fn malformed_keys_are_ignored() {
        assert_eq!(parse_sprite_key("ui.sprite."), None);
        assert_eq!(parse_sprite_key("ui.sprite..x"), None);
        assert_eq!(parse_sprite_key("ui.spritex.S1"), None);
        assert_eq!(parse_sprite_key("sprite.S1"), None);
    }

    #[test]
    fn graph_scope_set_creates_a_free_sprite() {
        let codec = SpriteCodec;
        let updates = codec.decode(
            SpriteScope::Graph,
            "ui.sprite.S1",
            Some(&AttributeValue::Vector(vec![0.5, 0.0, 0.0])),
            None,
        );
        assert_eq!(
            updates,
            vec![
                SpriteUpdate::Added {
                    id: "S1".to_string()
                },
                SpriteUpdate::Moved {
                    id: "S1".to_string(),
                    position: SpritePosition::Free {
                        x: 0.5,
                        y: 0.0,
                        z: 0.0
                    },
                },
            ]
        );
    }

    #[test]
    fn second_attachment_synthesizes_a_detach() {
        let codec = SpriteCodec;
        let mut state = SpriteState::default();
        for u in codec.decode(
            SpriteScope::OnNode("N1"),
            "ui.sprite.S1",
            Some(&AttributeValue::Flag),
            Some(&state),
        ) {
            state.apply(&u);
        }
        assert_eq!(state.attachment(), Some(&AttachPoint::Node("N1".into())));

        let updates = codec.decode(
            SpriteScope::OnEdge("E1"),
            "ui.sprite.S1",
            Some(&AttributeValue::Flag),
            Some(&state),
        );
        assert_eq!(
            updates,
            vec![
                SpriteUpdate::Detached {
                    id: "S1".to_string(),
                    from: AttachPoint::Node("N1".to_string()),
                },
                SpriteUpdate::Attached {
                    id: "S1".to_string(),
                    attach: AttachPoint::Edge("E1".to_string()),
                },
            ]
        );
        for u in &updates {
            state.apply(u);
        }
        assert_eq!(state.attachment(), Some(&AttachPoint::Edge("E1".into())));
        assert_eq!(state.position(), SpritePosition::AlongEdge { fraction: 0.0 });
    }

    #[test]
    fn detach_restores_the_last_free_position() {
        let codec = SpriteCodec;
        let mut state = SpriteState::default();
        let free = AttributeValue::Vector(vec![0.2, 0.3]);
        for u in codec.decode(SpriteScope::Graph, "ui.sprite.S1", Some(&free), Some(&state)) {
            state.apply(&u);
        }
        for u in codec.decode(
            SpriteScope::OnNode("N1"),
            "ui.sprite.S1",
            Some(&AttributeValue::Flag),
            Some(&state),
        ) {
            state.apply(&u);
        }
        assert_eq!(state.last_free_position(), Some((0.2, 0.3, 0.0)));

        for u in codec.decode(SpriteScope::OnNode("N1"), "ui.sprite.S1", None, Some(&state)) {
            state.apply(&u);
        }
        assert_eq!(state.attachment(), None);
        assert_eq!(
            state.position(),
            SpritePosition::Free {
                x: 0.2,
                y: 0.3,
                z: 0.0
            }
        );
    }

    #[test]
    fn replaying_the_attribute_set_from_scratch_rebuilds_identical_state() {
        let codec = SpriteCodec;
        let play = |state: &mut SpriteState| {
            let moves = [
                (
                    SpriteScope::Graph,
                    Some(AttributeValue::Vector(vec![1.0, 2.0])),
                ),
                (SpriteScope::OnNode("N1"), Some(AttributeValue::Flag)),
            ];
            for (scope, value) in moves {
                for u in codec.decode(scope, "ui.sprite.S1", value.as_ref(), Some(state)) {
                    state.apply(&u);
                }
            }
            for u in codec.decode(
                SpriteScope::Graph,
                "ui.sprite.S1.color",
                Some(&AttributeValue::Text("red".into())),
                Some(state),
            ) {
                state.apply(&u);
            }
        };
        let mut first = SpriteState::default();
        let mut second = SpriteState::default();
        play(&mut first);
        play(&mut second);
        assert_eq!(first, second);
        assert_eq!(first.attachment(), Some(&AttachPoint::Node("N1".into())));
        assert_eq!(
            first.property("color"),
            Some(&AttributeValue::Text("red".into()))
        );
    }

    #[test]
    fn encode_emits_only_the_changed_key() {
        let codec = SpriteCodec;
        let event = codec.encode(&SpriteUpdate::PropertySet {
            id: "S1".to_string(),
            key: "color".to_string(),
            value: AttributeValue::Text("red".into()),
        });
        assert_eq!(
            event,
            GraphEvent::AttributeChanged {
                scope: ElementScope::Graph,
                key: "ui.sprite.S1.color".to_string(),
                value: Some(AttributeValue::Text("red".into())),
            }
        );
    }
}
