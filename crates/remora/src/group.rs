//! Style-group partitioning: every graphic element belongs to exactly one
//! [`StyleGroup`], and within its group to exactly one of three subsets
//! (bulk / dynamic / event).
//!
//! The split is deliberate: "which group" touches style resolution and is
//! expensive, "which subset" flips one flag and is cheap. Attribute-driven
//! visual changes and interaction highlighting only ever take the cheap path.

use indexmap::IndexSet as RawIndexSet;
use rustc_hash::FxBuildHasher;

use crate::style::StyleSignature;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
type IndexSet<T> = RawIndexSet<T, FxBuildHasher>;

/// Stable identifier of a style group, valid for the group's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(u32);

/// The three disjoint member subsets of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subset {
    /// Draw state fully shared with the group: one style setup draws all.
    Bulk,
    /// At least one attribute-driven property is overridden per element.
    Dynamic,
    /// An active interaction event overrides the style per element.
    Event,
}

/// Interaction events that move an element into the event subset while
/// active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Clicked,
    Selected,
}

/// A set of elements sharing one resolved style.
///
/// Membership boundary is immutable (elements migrate by leaving one group
/// and entering another); subset placement within the group is mutable.
/// Intra-group iteration order is unspecified; only inter-group z-order
/// matters to consumers.
#[derive(Debug, Clone)]
pub struct StyleGroup {
    id: GroupId,
    signature: StyleSignature,
    // Creation order, breaks z-index ties so the sequence stays stable.
    ordinal: u64,
    bulk: IndexSet<String>,
    dynamic: IndexSet<String>,
    event: IndexSet<String>,
}

impl StyleGroup {
    fn new(id: GroupId, signature: StyleSignature, ordinal: u64) -> Self {
        Self {
            id,
            signature,
            ordinal,
            bulk: IndexSet::default(),
            dynamic: IndexSet::default(),
            event: IndexSet::default(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn signature(&self) -> &StyleSignature {
        &self.signature
    }

    pub fn z_index(&self) -> i32 {
        self.signature.z_index()
    }

    pub fn bulk(&self) -> impl Iterator<Item = &str> {
        self.bulk.iter().map(String::as_str)
    }

    pub fn dynamic(&self) -> impl Iterator<Item = &str> {
        self.dynamic.iter().map(String::as_str)
    }

    pub fn event(&self) -> impl Iterator<Item = &str> {
        self.event.iter().map(String::as_str)
    }

    /// All members, bulk first, then dynamic, then event.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.bulk().chain(self.dynamic()).chain(self.event())
    }

    pub fn len(&self) -> usize {
        self.bulk.len() + self.dynamic.len() + self.event.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bulk.is_empty() && self.dynamic.is_empty() && self.event.is_empty()
    }

    pub fn bulk_is_empty(&self) -> bool {
        self.bulk.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.subset_of(id).is_some()
    }

    pub fn subset_of(&self, id: &str) -> Option<Subset> {
        if self.bulk.contains(id) {
            Some(Subset::Bulk)
        } else if self.dynamic.contains(id) {
            Some(Subset::Dynamic)
        } else if self.event.contains(id) {
            Some(Subset::Event)
        } else {
            None
        }
    }

    fn subset_mut(&mut self, subset: Subset) -> &mut IndexSet<String> {
        match subset {
            Subset::Bulk => &mut self.bulk,
            Subset::Dynamic => &mut self.dynamic,
            Subset::Event => &mut self.event,
        }
    }

    fn insert(&mut self, id: String, subset: Subset) {
        self.subset_mut(subset).insert(id);
    }

    fn remove(&mut self, id: &str) -> Option<Subset> {
        let subset = self.subset_of(id)?;
        self.subset_mut(subset).swap_remove(id);
        Some(subset)
    }

    fn move_to(&mut self, id: &str, subset: Subset) {
        let Some(current) = self.subset_of(id) else {
            return;
        };
        if current == subset {
            return;
        }
        self.subset_mut(current).swap_remove(id);
        self.subset_mut(subset).insert(id.to_string());
    }
}

/// Owner of all style groups, the element→group index, and the z-ordered
/// group sequence.
#[derive(Debug, Default)]
pub struct StyleGroupSet {
    groups: HashMap<GroupId, StyleGroup>,
    by_signature: HashMap<String, GroupId>,
    index: HashMap<String, GroupId>,
    // Per-element count of attribute overrides hitting a dynamic-capable key
    // of the element's current signature.
    overrides: HashMap<String, u32>,
    // Active interaction events per element; non-empty means event subset.
    interactions: HashMap<String, Vec<InteractionKind>>,
    z_order: Vec<GroupId>,
    next_group: u32,
    next_ordinal: u64,
}

impl StyleGroupSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn element_count(&self) -> usize {
        self.index.len()
    }

    pub fn group(&self, id: GroupId) -> Option<&StyleGroup> {
        self.groups.get(&id)
    }

    pub fn group_of(&self, element: &str) -> Option<GroupId> {
        self.index.get(element).copied()
    }

    pub fn signature_of(&self, element: &str) -> Option<&StyleSignature> {
        let gid = self.group_of(element)?;
        self.groups.get(&gid).map(|g| g.signature())
    }

    pub fn subset_of(&self, element: &str) -> Option<Subset> {
        let gid = self.group_of(element)?;
        self.groups.get(&gid)?.subset_of(element)
    }

    /// Assigns `element` to the group for `signature`, creating the group on
    /// a previously-unseen signature. New elements land in the bulk subset
    /// (no overrides, no interactions recorded yet). Never fails.
    pub fn add_element(&mut self, element: &str, signature: StyleSignature) -> GroupId {
        debug_assert!(
            !self.index.contains_key(element),
            "element {element} already assigned"
        );
        let gid = self.ensure_group(signature);
        let subset = self.subset_for(element);
        if let Some(group) = self.groups.get_mut(&gid) {
            group.insert(element.to_string(), subset);
        }
        self.index.insert(element.to_string(), gid);
        gid
    }

    /// Removes `element` entirely, destroying its group if it was the last
    /// member. Also forgets override/interaction bookkeeping.
    pub fn remove_element(&mut self, element: &str) -> Option<GroupId> {
        let gid = self.detach(element)?;
        self.overrides.remove(element);
        self.interactions.remove(element);
        Some(gid)
    }

    /// Subset recomputation after an attribute changed. `was_present` /
    /// `now_present` describe the key before and after the change. Only keys
    /// the element's signature declares dynamic-capable have any effect, and
    /// the element never leaves its group on this path.
    pub fn on_attribute_changed(
        &mut self,
        element: &str,
        key: &str,
        was_present: bool,
        now_present: bool,
    ) {
        let Some(gid) = self.group_of(element) else {
            return;
        };
        let dynamic_capable = self
            .groups
            .get(&gid)
            .map(|g| g.signature().is_dynamic_key(key))
            .unwrap_or(false);
        if !dynamic_capable || was_present == now_present {
            return;
        }
        let count = self.overrides.entry(element.to_string()).or_insert(0);
        if now_present {
            *count += 1;
        } else {
            *count = count.saturating_sub(1);
        }
        if *count == 0 {
            self.overrides.remove(element);
        }
        self.reseat(element, gid);
    }

    /// Moves the element into or out of the event subset. Group membership
    /// is untouched; on deactivation the element falls back to dynamic or
    /// bulk depending on its recorded overrides.
    pub fn on_interaction_event(&mut self, element: &str, kind: InteractionKind, active: bool) {
        let Some(gid) = self.group_of(element) else {
            return;
        };
        let kinds = self.interactions.entry(element.to_string()).or_default();
        if active {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        } else {
            kinds.retain(|k| *k != kind);
        }
        if kinds.is_empty() {
            self.interactions.remove(element);
        }
        self.reseat(element, gid);
    }

    /// Batch re-resolution after a style-sheet change.
    ///
    /// `resolve` is called once per element with its current signature; it
    /// returns `None` for elements the invalidation cannot have re-matched,
    /// or the new signature plus the element's override count under that
    /// signature. Elements whose signature id is unchanged are left exactly
    /// where they are (no churn). Returns the migrated element ids.
    pub fn on_style_invalidated<F>(&mut self, mut resolve: F) -> Vec<String>
    where
        F: FnMut(&str, &StyleSignature) -> Option<(StyleSignature, u32)>,
    {
        let candidates: Vec<String> = self.index.keys().cloned().collect();
        let mut migrated = Vec::new();
        for element in candidates {
            let Some(current) = self.signature_of(&element) else {
                continue;
            };
            let Some((signature, override_count)) = resolve(&element, current) else {
                continue;
            };
            if signature.id() == current.id() {
                continue;
            }
            self.detach(&element);
            if override_count == 0 {
                self.overrides.remove(&element);
            } else {
                self.overrides.insert(element.clone(), override_count);
            }
            self.add_element(&element, signature);
            migrated.push(element);
        }
        migrated
    }

    /// Groups back-to-front. Fetch fresh on every render pass; group
    /// identity and order may change between passes.
    pub fn groups_in_z_order(&self) -> impl Iterator<Item = &StyleGroup> {
        self.z_order.iter().filter_map(|gid| self.groups.get(gid))
    }

    /// Consistency check used by tests: the index and the subsets must
    /// partition the membership exactly, and the z sequence must cover every
    /// live group once in (z, creation) order.
    pub fn partition_is_consistent(&self) -> bool {
        for (element, gid) in &self.index {
            let Some(group) = self.groups.get(gid) else {
                return false;
            };
            let in_bulk = group.bulk.contains(element);
            let in_dynamic = group.dynamic.contains(element);
            let in_event = group.event.contains(element);
            if [in_bulk, in_dynamic, in_event].iter().filter(|b| **b).count() != 1 {
                return false;
            }
            for (other_gid, other) in &self.groups {
                if other_gid != gid && other.contains(element) {
                    return false;
                }
            }
        }
        for group in self.groups.values() {
            for member in group.members() {
                if self.index.get(member) != Some(&group.id) {
                    return false;
                }
            }
        }
        if self.z_order.len() != self.groups.len() {
            return false;
        }
        self.z_order.windows(2).all(|w| {
            match (self.groups.get(&w[0]), self.groups.get(&w[1])) {
                (Some(a), Some(b)) => (a.z_index(), a.ordinal) < (b.z_index(), b.ordinal),
                _ => false,
            }
        })
    }

    fn subset_for(&self, element: &str) -> Subset {
        if self.interactions.get(element).is_some_and(|k| !k.is_empty()) {
            Subset::Event
        } else if self.overrides.get(element).copied().unwrap_or(0) > 0 {
            Subset::Dynamic
        } else {
            Subset::Bulk
        }
    }

    fn reseat(&mut self, element: &str, gid: GroupId) {
        let subset = self.subset_for(element);
        if let Some(group) = self.groups.get_mut(&gid) {
            group.move_to(element, subset);
        }
    }

    fn ensure_group(&mut self, signature: StyleSignature) -> GroupId {
        if let Some(&gid) = self.by_signature.get(signature.id()) {
            return gid;
        }
        let gid = GroupId(self.next_group);
        self.next_group += 1;
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.by_signature.insert(signature.id().to_string(), gid);
        self.groups
            .insert(gid, StyleGroup::new(gid, signature, ordinal));
        self.z_order.push(gid);
        self.resort_z();
        gid
    }

    /// Removes group membership and the index entry, keeping the
    /// override/interaction bookkeeping for a follow-up `add_element`
    /// (group migration).
    fn detach(&mut self, element: &str) -> Option<GroupId> {
        let gid = self.index.remove(element)?;
        let emptied = match self.groups.get_mut(&gid) {
            Some(group) => {
                group.remove(element);
                group.is_empty()
            }
            None => false,
        };
        if emptied {
            if let Some(group) = self.groups.remove(&gid) {
                self.by_signature.remove(group.signature().id());
            }
            self.z_order.retain(|g| *g != gid);
        }
        Some(gid)
    }

    fn resort_z(&mut self) {
        let groups = &self.groups;
        self.z_order.sort_by_key(|gid| {
            groups
                .get(gid)
                .map(|g| (g.z_index(), g.ordinal))
                .unwrap_or((i32::MAX, u64::MAX))
        });
    }
}
