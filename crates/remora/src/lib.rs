#![forbid(unsafe_code)]

//! Render-optimized mirror of a mutable, attributed graph.
//!
//! remora keeps a drawing-friendly copy of a graph being edited elsewhere:
//! every node, edge, and floating decoration ("sprite") is classified into a
//! style group of visually identical elements, groups stay sorted by
//! z-index, and within a group members split into bulk / dynamic / event
//! subsets so a renderer can push style state once and draw the bulk in one
//! go.
//!
//! Synchronization with the source graph crosses the thread boundary through
//! [`SyncMailbox`], a swap-and-drain event queue with origin-token loop
//! suppression, so both sides can listen to each other without bouncing a
//! change back and forth forever. Sprites are encoded purely as graph
//! attributes (see the [`sprite`] module) and therefore survive any
//! serialization that round-trips string-keyed attributes.
//!
//! This crate is deliberately not a general-purpose graph engine: storage is
//! laid out for style-group iteration in z-order, and connectivity is a
//! secondary index. The style-sheet grammar and the pixel backend live
//! outside, behind [`StyleResolver`] and the group iteration contract.

pub mod attribute;
pub mod element;
pub mod error;
pub mod event;
pub mod group;
pub mod mailbox;
pub mod mirror;
pub mod sprite;
pub mod style;

pub use attribute::{AttributeFilter, AttributeValue, SPRITE_PREFIX, UI_NAMESPACE, UI_PREFIX};
pub use element::{ElementBody, ElementKind, GraphicElement};
pub use error::{Error, Result};
pub use event::{
    ElementScope, EventSink, GraphEvent, Origin, SequenceStamper, Side, TaggedEvent,
};
pub use group::{GroupId, InteractionKind, StyleGroup, StyleGroupSet, Subset};
pub use mailbox::{LoopGuard, SyncMailbox};
pub use mirror::MirrorGraph;
pub use sprite::{AttachPoint, SpriteCodec, SpritePosition, SpriteState, SpriteUpdate};
pub use style::{DefaultStyleResolver, Selector, StyleResolver, StyleSignature};
