//! Cross-boundary event relay.
//!
//! Two independently scheduled contexts (the computation side editing the
//! source graph, the presentation side driving the mirror) exchange change
//! events through a pair of pending queues. Producers append without
//! blocking consumers; consumers swap the whole pending queue out under the
//! lock and apply it outside the lock, once per tick. The queue handoff is
//! the only shared state needing mutual exclusion.
//!
//! Loop suppression: every event carries an origin token. An event arriving
//! back at the side that stamped it reflects a change that side already
//! holds, and is discarded instead of reapplied. Eventual consistency is the
//! guarantee here, not strict causality; a misidentified duplicate
//! self-corrects on the next full pass.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::event::{EventSink, Origin, Side, TaggedEvent};

const RECENT_ORIGIN_WINDOW: usize = 128;

/// Per-side window of recently applied origin tokens.
#[derive(Debug)]
pub struct LoopGuard {
    side: Side,
    recent: VecDeque<Origin>,
    cap: usize,
}

impl LoopGuard {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            recent: VecDeque::new(),
            cap: RECENT_ORIGIN_WINDOW,
        }
    }

    /// Whether an inbound event should be applied. An origin this side
    /// stamped itself, or one already applied within the window, is a
    /// re-entrant duplicate.
    pub fn admit(&mut self, origin: Origin) -> bool {
        if origin.side == self.side {
            return false;
        }
        if self.recent.contains(&origin) {
            return false;
        }
        if self.recent.len() == self.cap {
            self.recent.pop_front();
        }
        self.recent.push_back(origin);
        true
    }
}

/// The mailbox between the source graph and the render mirror.
///
/// Shared by reference (typically behind an `Arc`) between both contexts;
/// every method takes `&self`.
#[derive(Debug)]
pub struct SyncMailbox {
    to_source: Mutex<Vec<TaggedEvent>>,
    to_mirror: Mutex<Vec<TaggedEvent>>,
    source_guard: Mutex<LoopGuard>,
    mirror_guard: Mutex<LoopGuard>,
}

impl Default for SyncMailbox {
    fn default() -> Self {
        Self {
            to_source: Mutex::new(Vec::new()),
            to_mirror: Mutex::new(Vec::new()),
            source_guard: Mutex::new(LoopGuard::new(Side::Source)),
            mirror_guard: Mutex::new(LoopGuard::new(Side::Mirror)),
        }
    }
}

impl SyncMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_for(&self, consumer: Side) -> &Mutex<Vec<TaggedEvent>> {
        match consumer {
            Side::Source => &self.to_source,
            Side::Mirror => &self.to_mirror,
        }
    }

    fn guard_for(&self, consumer: Side) -> &Mutex<LoopGuard> {
        match consumer {
            Side::Source => &self.source_guard,
            Side::Mirror => &self.mirror_guard,
        }
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        // A poisoned queue only means a producer panicked mid-push; the
        // events already in it are still well-formed.
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an event produced by `from` to the queue the opposite side
    /// will drain. Never blocks beyond the push itself.
    pub fn enqueue(&self, from: Side, event: TaggedEvent) {
        Self::lock(self.queue_for(from.opposite())).push(event);
    }

    pub fn enqueue_all(&self, from: Side, events: impl IntoIterator<Item = TaggedEvent>) {
        let mut queue = Self::lock(self.queue_for(from.opposite()));
        queue.extend(events);
    }

    /// Swaps out and returns everything pending for `consumer`. Per-origin
    /// enqueue order is preserved.
    pub fn drain(&self, consumer: Side) -> Vec<TaggedEvent> {
        std::mem::take(&mut *Self::lock(self.queue_for(consumer)))
    }

    /// Drops everything pending for `consumer` without applying it
    /// (teardown path).
    pub fn discard_pending(&self, consumer: Side) {
        Self::lock(self.queue_for(consumer)).clear();
    }

    pub fn pending(&self, consumer: Side) -> usize {
        Self::lock(self.queue_for(consumer)).len()
    }

    /// Drains the pending queue for `consumer` and applies each admitted
    /// event to `target`, outside the queue lock. Suppressed echoes are
    /// skipped; an event `target` rejects is dropped with a diagnostic and
    /// never aborts the rest of the drain. Returns how many events were
    /// applied.
    pub fn drain_and_apply(&self, consumer: Side, target: &mut dyn EventSink) -> usize {
        let events = self.drain(consumer);
        if events.is_empty() {
            return 0;
        }
        let mut applied = 0;
        for event in &events {
            let admitted = Self::lock(self.guard_for(consumer)).admit(event.origin);
            if !admitted {
                tracing::debug!(?event.origin, "suppressed re-entrant event");
                continue;
            }
            match target.apply(event) {
                Ok(()) => applied += 1,
                Err(err) => {
                    tracing::warn!(%err, ?event.origin, "dropped unapplicable event");
                }
            }
        }
        applied
    }
}
