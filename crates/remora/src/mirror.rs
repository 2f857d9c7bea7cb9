//! The render mirror: element registry, connectivity index, style-group
//! partitioning, and the event sink/source pair.
//!
//! Storage is style-group-indexed, not graph-indexed: the element→group
//! index and the z-ordered group sequence are the primary structure the
//! render pass iterates. Connectivity (node→incident edges) is a secondary
//! index used only by operations that need it, never by the render path.
//!
//! The mirror is owned by a single context at a time. Draining inbound
//! events and reading `groups_in_z_order()` must be serialized by the
//! caller; the mirror itself never blocks on the other side.

use rustc_hash::FxBuildHasher;

use crate::attribute::{AttributeFilter, AttributeValue, SPRITE_PREFIX};
use crate::element::{AttrMap, ElementBody, ElementKind, GraphicElement};
use crate::error::{Error, Result};
use crate::event::{
    ElementScope, EventSink, GraphEvent, Origin, SequenceStamper, Side, TaggedEvent,
};
use crate::group::{InteractionKind, StyleGroup, StyleGroupSet};
use crate::mailbox::SyncMailbox;
use crate::sprite::{
    AttachPoint, SpriteCodec, SpriteKey, SpriteScope, SpriteState, SpriteUpdate, main_key,
    parse_sprite_key, prop_key,
};
use crate::style::{DefaultStyleResolver, Selector, StyleResolver, StyleSignature};

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
type ElementMap = indexmap::IndexMap<String, GraphicElement, FxBuildHasher>;

pub struct MirrorGraph {
    elements: ElementMap,
    // Secondary index: node id -> incident edge ids.
    incidence: HashMap<String, Vec<String>>,
    groups: StyleGroupSet,
    graph_attributes: AttrMap,
    resolver: Box<dyn StyleResolver + Send>,
    filter: AttributeFilter,
    codec: SpriteCodec,
    stamper: SequenceStamper,
    outgoing: Vec<TaggedEvent>,
    // Set while applying an inbound event; reactions reuse this origin so
    // the other side recognizes and suppresses the echo.
    relay_origin: Option<Origin>,
}

impl Default for MirrorGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorGraph {
    pub fn new() -> Self {
        Self {
            elements: ElementMap::default(),
            incidence: HashMap::default(),
            groups: StyleGroupSet::new(),
            graph_attributes: AttrMap::default(),
            resolver: Box::new(DefaultStyleResolver),
            filter: AttributeFilter,
            codec: SpriteCodec,
            stamper: SequenceStamper::new(Side::Mirror),
            outgoing: Vec::new(),
            relay_origin: None,
        }
    }

    /// Installs a style resolver and re-resolves every element against it.
    pub fn with_resolver(mut self, resolver: Box<dyn StyleResolver + Send>) -> Self {
        self.resolver = resolver;
        self.invalidate_styles(&Selector::All);
        self
    }

    /// Which side of the relay this instance stamps its own events with.
    /// Defaults to [`Side::Mirror`]; tests and symmetric setups can run a
    /// second instance as the source side.
    pub fn with_side(mut self, side: Side) -> Self {
        self.stamper = SequenceStamper::new(side);
        self
    }

    pub fn side(&self) -> Side {
        self.stamper.side()
    }

    // ---- registry queries -------------------------------------------------

    pub fn element(&self, id: &str) -> Option<&GraphicElement> {
        self.elements.get(id)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> impl Iterator<Item = &GraphicElement> {
        self.elements.values()
    }

    pub fn sprite(&self, id: &str) -> Option<&SpriteState> {
        self.elements.get(id).and_then(GraphicElement::sprite)
    }

    /// Edge ids incident to a node. Secondary index; not used for drawing.
    pub fn node_edges(&self, node: &str) -> &[String] {
        self.incidence.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn graph_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.graph_attributes.get(key)
    }

    pub fn style_groups(&self) -> &StyleGroupSet {
        &self.groups
    }

    /// Groups back-to-front for the render pass. Fetch fresh every pass.
    pub fn groups_in_z_order(&self) -> impl Iterator<Item = &StyleGroup> {
        self.groups.groups_in_z_order()
    }

    // ---- mirror-originated mutations --------------------------------------

    pub fn add_node(&mut self, id: &str) -> Result<()> {
        self.register(
            id,
            ElementBody::Node {
                x: 0.0,
                y: 0.0,
                z: 0.0,
            },
        )?;
        self.emit(GraphEvent::NodeAdded { id: id.to_string() });
        Ok(())
    }

    pub fn add_edge(&mut self, id: &str, source: &str, target: &str, directed: bool) -> Result<()> {
        self.register(
            id,
            ElementBody::Edge {
                source: source.to_string(),
                target: target.to_string(),
                directed,
            },
        )?;
        self.emit(GraphEvent::EdgeAdded {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            directed,
        });
        Ok(())
    }

    /// Removes an element. Removing a node removes its incident edges;
    /// removing an attach point detaches the sprites riding on it.
    pub fn remove_element(&mut self, id: &str) -> Result<()> {
        let Some(kind) = self.elements.get(id).map(GraphicElement::kind) else {
            return Err(Error::UnknownElement { id: id.to_string() });
        };
        // Sprite lifecycle is attribute-encoded; route through the protocol
        // so the removal relays as the attribute delta it is.
        if kind == ElementKind::Sprite {
            return self.remove_sprite(id);
        }
        let mut doomed: Vec<String> = Vec::new();
        if let Some(edges) = self.incidence.get(id) {
            doomed.extend(edges.iter().cloned());
        }
        doomed.push(id.to_string());
        for victim in doomed {
            self.remove_single(&victim);
        }
        Ok(())
    }

    /// Sets (`Some`) or removes (`None`) an attribute. Unretained keys are
    /// dropped at the boundary; sprite-namespace keys run through the codec.
    pub fn set_attribute(
        &mut self,
        scope: ElementScope,
        key: &str,
        value: Option<AttributeValue>,
    ) -> Result<()> {
        if !self.filter.retains(key) {
            tracing::trace!(key, "attribute dropped at the boundary");
            return Ok(());
        }
        self.apply_attribute(&scope, key, value.clone())?;
        self.emit(GraphEvent::AttributeChanged {
            scope,
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    pub fn move_node(&mut self, id: &str, x: f64, y: f64) -> Result<()> {
        self.set_attribute(
            ElementScope::Element(id.to_string()),
            "xy",
            Some(AttributeValue::Vector(vec![x, y])),
        )
    }

    // Sprite API: every operation is expressed as its canonical attribute
    // change, so local mutation and relay encoding stay one and the same.

    pub fn add_sprite(&mut self, id: &str, x: f64, y: f64, z: f64) -> Result<()> {
        self.set_attribute(
            ElementScope::Graph,
            &main_key(id),
            Some(AttributeValue::Vector(vec![x, y, z])),
        )
    }

    pub fn remove_sprite(&mut self, id: &str) -> Result<()> {
        self.set_attribute(ElementScope::Graph, &main_key(id), None)
    }

    pub fn attach_sprite(&mut self, sprite: &str, target: &str) -> Result<()> {
        self.set_attribute(
            ElementScope::Element(target.to_string()),
            &main_key(sprite),
            Some(AttributeValue::Flag),
        )
    }

    pub fn detach_sprite(&mut self, sprite: &str) -> Result<()> {
        let Some(target) = self
            .sprite(sprite)
            .and_then(SpriteState::attachment)
            .map(|a| a.target().to_string())
        else {
            return Ok(());
        };
        self.set_attribute(ElementScope::Element(target), &main_key(sprite), None)
    }

    /// Moves a sprite; coordinates are interpreted against its current
    /// attachment (free x/y/z, fraction, or angle+radius).
    pub fn move_sprite(&mut self, sprite: &str, coords: Vec<f64>) -> Result<()> {
        self.set_attribute(
            ElementScope::Graph,
            &main_key(sprite),
            Some(AttributeValue::Vector(coords)),
        )
    }

    pub fn set_sprite_property(
        &mut self,
        sprite: &str,
        prop: &str,
        value: Option<AttributeValue>,
    ) -> Result<()> {
        self.set_attribute(ElementScope::Graph, &prop_key(sprite, prop), value)
    }

    /// Interaction state (selection, pointer-down) is mirror-local: it moves
    /// the element between subsets and is never relayed.
    pub fn set_interaction(&mut self, id: &str, kind: InteractionKind, active: bool) {
        self.groups.on_interaction_event(id, kind, active);
    }

    /// Replaces the style sheet and re-resolves every element in one batch.
    pub fn apply_stylesheet(&mut self, source: &str) {
        self.reload_stylesheet(source);
        self.emit(GraphEvent::StyleSheetReload {
            source: source.to_string(),
        });
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.incidence.clear();
        self.groups = StyleGroupSet::new();
        self.graph_attributes.clear();
        self.emit(GraphEvent::Cleared);
    }

    // ---- relay ------------------------------------------------------------

    /// Takes the buffered outbound events (mirror-originated changes plus
    /// reactions to inbound ones, origin-tagged for loop suppression).
    pub fn take_outgoing(&mut self) -> Vec<TaggedEvent> {
        std::mem::take(&mut self.outgoing)
    }

    /// Pushes the buffered outbound events into the mailbox toward the
    /// opposite side.
    pub fn relay_outgoing(&mut self, mailbox: &SyncMailbox) {
        let side = self.stamper.side();
        let events = self.take_outgoing();
        mailbox.enqueue_all(side, events);
    }

    // ---- internals --------------------------------------------------------

    fn emit(&mut self, event: GraphEvent) {
        let origin = match self.relay_origin {
            Some(origin) => origin,
            None => self.stamper.next_origin(),
        };
        self.outgoing.push(TaggedEvent { origin, event });
    }

    fn resolve(&self, kind: ElementKind, id: &str, classes: &[String]) -> StyleSignature {
        self.resolver.resolve(kind, id, classes)
    }

    fn register(&mut self, id: &str, body: ElementBody) -> Result<()> {
        if self.elements.contains_key(id) {
            return Err(Error::DuplicateElement { id: id.to_string() });
        }
        if let ElementBody::Edge { source, target, .. } = &body {
            for endpoint in [source, target] {
                let is_node = self
                    .elements
                    .get(endpoint)
                    .is_some_and(|e| e.kind() == ElementKind::Node);
                if !is_node {
                    return Err(Error::DanglingEndpoint {
                        edge: id.to_string(),
                        endpoint: endpoint.to_string(),
                    });
                }
            }
        }
        let kind = body.kind();
        let signature = self.resolve(kind, id, &[]);
        let gid = self.groups.add_element(id, signature);
        if let ElementBody::Edge { source, target, .. } = &body {
            self.incidence
                .entry(source.clone())
                .or_default()
                .push(id.to_string());
            self.incidence
                .entry(target.clone())
                .or_default()
                .push(id.to_string());
        }
        self.elements
            .insert(id.to_string(), GraphicElement::new(id, body, gid));
        Ok(())
    }

    fn remove_single(&mut self, id: &str) {
        // Sprites attached to the departing element fall off first.
        let detached: Vec<(String, AttachPoint)> = self
            .elements
            .values()
            .filter_map(|e| {
                let attach = e.sprite()?.attachment()?;
                (attach.target() == id).then(|| (e.id().to_string(), attach.clone()))
            })
            .collect();
        for (sprite, from) in detached {
            let update = SpriteUpdate::Detached {
                id: sprite.clone(),
                from,
            };
            if let Some(state) = self.elements.get_mut(&sprite).and_then(GraphicElement::sprite_mut)
            {
                state.apply(&update);
            }
            let event = self.codec.encode(&update);
            self.emit(event);
        }

        if let Some(ElementBody::Edge { source, target, .. }) =
            self.elements.get(id).map(GraphicElement::body)
        {
            let (source, target) = (source.clone(), target.clone());
            for endpoint in [source, target] {
                if let Some(edges) = self.incidence.get_mut(&endpoint) {
                    edges.retain(|e| e != id);
                }
            }
        }
        let removed = self.elements.shift_remove(id);
        self.incidence.remove(id);
        self.groups.remove_element(id);
        // Sprites are attribute-encoded; only nodes and edges relay an
        // element-removed event.
        if removed.is_some_and(|e| e.kind() != ElementKind::Sprite) {
            self.emit(GraphEvent::ElementRemoved { id: id.to_string() });
        }
    }

    fn apply_attribute(
        &mut self,
        scope: &ElementScope,
        key: &str,
        value: Option<AttributeValue>,
    ) -> Result<()> {
        if key.starts_with(SPRITE_PREFIX) {
            return self.apply_sprite_attribute(scope, key, value.as_ref());
        }
        match scope {
            ElementScope::Graph => {
                if let (true, Some(source)) = (
                    key == "stylesheet" || key == "ui.stylesheet",
                    value.as_ref().and_then(AttributeValue::as_text),
                ) {
                    let source = source.to_string();
                    self.reload_stylesheet(&source);
                }
                match value {
                    Some(value) => {
                        self.graph_attributes.insert(key.to_string(), value);
                    }
                    None => {
                        self.graph_attributes.shift_remove(key);
                    }
                }
                Ok(())
            }
            ElementScope::Element(id) => {
                let Some(element) = self.elements.get_mut(id) else {
                    return Err(Error::UnknownElement { id: id.clone() });
                };
                let old = element.put_attribute(key, value.clone());
                if let Some(value) = &value {
                    element.apply_position_key(key, value);
                }
                if key == "ui.class" {
                    let classes = value
                        .as_ref()
                        .and_then(AttributeValue::as_text)
                        .map(|text| {
                            text.split(',')
                                .map(str::trim)
                                .filter(|c| !c.is_empty())
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    element.set_classes(classes);
                    // Class changes can re-match selectors for this element.
                    let id = id.clone();
                    self.invalidate_styles(&Selector::Id(id));
                    return Ok(());
                }
                let id = id.clone();
                self.groups
                    .on_attribute_changed(&id, key, old.is_some(), value.is_some());
                Ok(())
            }
        }
    }

    fn apply_sprite_attribute(
        &mut self,
        scope: &ElementScope,
        key: &str,
        value: Option<&AttributeValue>,
    ) -> Result<()> {
        let Some(parsed) = parse_sprite_key(key) else {
            // Malformed sprite keys are tolerated, not errors.
            tracing::debug!(key, "ignoring malformed sprite attribute key");
            return Ok(());
        };
        let sprite_id = match parsed {
            SpriteKey::Main { sprite } => sprite,
            SpriteKey::Property { sprite, .. } => sprite,
        }
        .to_string();

        let sprite_scope = match scope {
            ElementScope::Graph => SpriteScope::Graph,
            ElementScope::Element(target) => {
                let kind = self
                    .elements
                    .get(target)
                    .map(GraphicElement::kind)
                    .ok_or_else(|| Error::UnknownElement { id: target.clone() })?;
                match kind {
                    ElementKind::Node => SpriteScope::OnNode(target),
                    ElementKind::Edge => SpriteScope::OnEdge(target),
                    ElementKind::Sprite => {
                        tracing::debug!(key, target, "sprites cannot carry attach points");
                        return Ok(());
                    }
                }
            }
        };

        let current = self.elements.get(&sprite_id).and_then(GraphicElement::sprite);
        let updates = self.codec.decode(sprite_scope, key, value, current);
        let attach_target = match scope {
            ElementScope::Element(target) => Some(target.as_str()),
            ElementScope::Graph => None,
        };

        for update in updates {
            match &update {
                SpriteUpdate::Added { id } => {
                    self.register(id, ElementBody::Sprite(SpriteState::default()))?;
                }
                SpriteUpdate::Removed { id } => {
                    let id = id.clone();
                    self.remove_single(&id);
                }
                other => {
                    if let Some(state) = self
                        .elements
                        .get_mut(other.sprite_id())
                        .and_then(GraphicElement::sprite_mut)
                    {
                        state.apply(other);
                    }
                    // The incoming attribute already carries this change;
                    // only the synthesized implicit detach (single-attachment
                    // policy) needs an extra relayed removal.
                    if let SpriteUpdate::Detached { from, .. } = other {
                        if attach_target != Some(from.target()) {
                            let event = self.codec.encode(other);
                            self.emit(event);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn reload_stylesheet(&mut self, source: &str) {
        self.resolver.reload(source);
        self.invalidate_styles(&Selector::All);
    }

    /// Batched re-resolution of every element the selector could have
    /// re-matched; migrates only elements whose signature actually changed.
    pub fn invalidate_styles(&mut self, selector: &Selector) {
        let elements = &self.elements;
        let resolver = &self.resolver;
        let migrated = self.groups.on_style_invalidated(|id, _current| {
            let element = elements.get(id)?;
            if !selector.matches(element.kind(), id, element.classes()) {
                return None;
            }
            let signature = resolver.resolve(element.kind(), id, element.classes());
            let overrides = element
                .attributes()
                .filter(|(key, _)| signature.is_dynamic_key(key))
                .count() as u32;
            Some((signature, overrides))
        });
        for id in migrated {
            if let (Some(gid), Some(element)) =
                (self.groups.group_of(&id), self.elements.get_mut(&id))
            {
                element.set_group(gid);
            }
        }
    }
}

impl EventSink for MirrorGraph {
    /// Applies one inbound event. Reactions emitted while applying reuse the
    /// inbound origin, so they are suppressed when they echo back.
    fn apply(&mut self, event: &TaggedEvent) -> Result<()> {
        self.relay_origin = Some(event.origin);
        let result = match &event.event {
            GraphEvent::NodeAdded { id } => self.add_node(id),
            GraphEvent::EdgeAdded {
                id,
                source,
                target,
                directed,
            } => self.add_edge(id, source, target, *directed),
            GraphEvent::ElementRemoved { id } => self.remove_element(id),
            GraphEvent::AttributeChanged { scope, key, value } => {
                self.set_attribute(scope.clone(), key, value.clone())
            }
            GraphEvent::StyleSheetReload { source } => {
                self.apply_stylesheet(source);
                Ok(())
            }
            GraphEvent::Cleared => {
                self.clear();
                Ok(())
            }
        };
        self.relay_origin = None;
        result
    }
}
