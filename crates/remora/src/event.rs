//! Change events relayed between the source graph and the render mirror.
//!
//! Both directions speak the same vocabulary. Every relayed event is tagged
//! with an [`Origin`] token (originating side + per-origin sequence number);
//! the mailbox uses those tokens to break feedback loops between two stores
//! that listen to each other.

use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;
use crate::error::Result;

/// Which side of the boundary produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Source,
    Mirror,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Source => Side::Mirror,
            Side::Mirror => Side::Source,
        }
    }
}

/// Provenance token carried by every relayed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub side: Side,
    pub seq: u64,
}

/// Target of an attribute change: the graph itself or one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementScope {
    Graph,
    Element(String),
}

/// The change-event shapes exchanged across the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphEvent {
    NodeAdded {
        id: String,
    },
    EdgeAdded {
        id: String,
        source: String,
        target: String,
        directed: bool,
    },
    ElementRemoved {
        id: String,
    },
    /// `value: None` means the attribute was removed.
    AttributeChanged {
        scope: ElementScope,
        key: String,
        value: Option<AttributeValue>,
    },
    StyleSheetReload {
        source: String,
    },
    Cleared,
}

/// An event plus its provenance, ready for the mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedEvent {
    pub origin: Origin,
    pub event: GraphEvent,
}

/// Consumer side of the relay: anything that can apply graph events.
pub trait EventSink {
    fn apply(&mut self, event: &TaggedEvent) -> Result<()>;
}

/// Stamps outgoing events with monotonically increasing origin tokens for
/// one side.
#[derive(Debug, Clone)]
pub struct SequenceStamper {
    side: Side,
    next: u64,
}

impl SequenceStamper {
    pub fn new(side: Side) -> Self {
        Self { side, next: 0 }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn next_origin(&mut self) -> Origin {
        let seq = self.next;
        self.next += 1;
        Origin {
            side: self.side,
            seq,
        }
    }

    pub fn stamp(&mut self, event: GraphEvent) -> TaggedEvent {
        TaggedEvent {
            origin: self.next_origin(),
            event,
        }
    }
}
