use remora::{
    ElementKind, ElementScope, InteractionKind, MirrorGraph, Selector, StyleResolver,
    StyleSignature, Subset,
};

/// Styles nodes/edges/sprites apart and gives `hot`-classed elements their
/// own dynamic-capable group in front.
struct KindResolver;

impl StyleResolver for KindResolver {
    fn resolve(&self, kind: ElementKind, _id: &str, classes: &[String]) -> StyleSignature {
        if classes.iter().any(|c| c == "hot") {
            return StyleSignature::new("hot", 10, ["ui.color"]);
        }
        match kind {
            ElementKind::Edge => StyleSignature::new("edge", 0, std::iter::empty::<&str>()),
            ElementKind::Node => StyleSignature::new("node", 1, std::iter::empty::<&str>()),
            ElementKind::Sprite => StyleSignature::new("sprite", 5, std::iter::empty::<&str>()),
        }
    }
}

/// Resolver whose node style depends on the loaded sheet.
#[derive(Default)]
struct SheetResolver {
    sheet: String,
}

impl StyleResolver for SheetResolver {
    fn resolve(&self, kind: ElementKind, _id: &str, _classes: &[String]) -> StyleSignature {
        match kind {
            ElementKind::Node if self.sheet == "v2" => {
                StyleSignature::new("node-v2", 3, ["ui.color"])
            }
            ElementKind::Node => StyleSignature::new("node-v1", 1, std::iter::empty::<&str>()),
            ElementKind::Edge => StyleSignature::new("edge", 0, std::iter::empty::<&str>()),
            ElementKind::Sprite => StyleSignature::new("sprite", 5, std::iter::empty::<&str>()),
        }
    }

    fn reload(&mut self, source: &str) {
        self.sheet = source.to_string();
    }
}

fn demo_mirror() -> MirrorGraph {
    let mut mirror = MirrorGraph::new().with_resolver(Box::new(KindResolver));
    mirror.add_node("a").unwrap();
    mirror.add_node("b").unwrap();
    mirror.add_edge("ab", "a", "b", true).unwrap();
    mirror
}

#[test]
fn every_element_lands_in_exactly_one_group() {
    let mirror = demo_mirror();
    assert!(mirror.style_groups().partition_is_consistent());
    assert_eq!(mirror.style_groups().element_count(), 3);
    // Nodes share one group, the edge gets its own, back-to-front by z.
    let order: Vec<(&str, usize)> = mirror
        .groups_in_z_order()
        .map(|g| (g.signature().id(), g.len()))
        .collect();
    assert_eq!(order, vec![("edge", 1), ("node", 2)]);
}

#[test]
fn class_change_migrates_the_element_to_its_new_group() {
    let mut mirror = demo_mirror();
    mirror
        .set_attribute(
            ElementScope::Element("a".to_string()),
            "ui.class",
            Some("hot".into()),
        )
        .unwrap();
    let groups: Vec<&str> = mirror
        .groups_in_z_order()
        .map(|g| g.signature().id())
        .collect();
    assert_eq!(groups, vec!["edge", "node", "hot"]);
    assert!(mirror.style_groups().partition_is_consistent());

    // Dropping the class sends it home and reaps the emptied group.
    mirror
        .set_attribute(ElementScope::Element("a".to_string()), "ui.class", None)
        .unwrap();
    let groups: Vec<&str> = mirror
        .groups_in_z_order()
        .map(|g| g.signature().id())
        .collect();
    assert_eq!(groups, vec!["edge", "node"]);
}

#[test]
fn dynamic_override_and_interaction_only_move_subsets() {
    let mut mirror = demo_mirror();
    mirror
        .set_attribute(
            ElementScope::Element("a".to_string()),
            "ui.class",
            Some("hot".into()),
        )
        .unwrap();
    let before: Vec<String> = mirror
        .groups_in_z_order()
        .map(|g| g.signature().id().to_string())
        .collect();

    // Attribute override on a dynamic-capable key: bulk -> dynamic.
    mirror
        .set_attribute(
            ElementScope::Element("a".to_string()),
            "ui.color",
            Some("red".into()),
        )
        .unwrap();
    assert_eq!(mirror.style_groups().subset_of("a"), Some(Subset::Dynamic));

    // Interaction wins over the override while active.
    mirror.set_interaction("a", InteractionKind::Selected, true);
    assert_eq!(mirror.style_groups().subset_of("a"), Some(Subset::Event));
    mirror.set_interaction("a", InteractionKind::Selected, false);
    assert_eq!(mirror.style_groups().subset_of("a"), Some(Subset::Dynamic));

    let after: Vec<String> = mirror
        .groups_in_z_order()
        .map(|g| g.signature().id().to_string())
        .collect();
    assert_eq!(before, after, "subset churn must not disturb z-order");
    assert!(mirror.style_groups().partition_is_consistent());
}

#[test]
fn stylesheet_reload_regroups_in_one_batch() {
    let mut mirror = MirrorGraph::new().with_resolver(Box::new(SheetResolver::default()));
    mirror.add_node("a").unwrap();
    mirror.add_node("b").unwrap();
    mirror.add_edge("ab", "a", "b", false).unwrap();
    // The override exists before the reload; the v1 node style ignores it.
    mirror
        .set_attribute(
            ElementScope::Element("a".to_string()),
            "ui.color",
            Some("red".into()),
        )
        .unwrap();
    assert_eq!(mirror.style_groups().subset_of("a"), Some(Subset::Bulk));

    mirror.apply_stylesheet("v2");
    let order: Vec<&str> = mirror
        .groups_in_z_order()
        .map(|g| g.signature().id())
        .collect();
    assert_eq!(order, vec!["edge", "node-v2"]);
    // The v2 style declares ui.color dynamic, so the migrated element's
    // recorded override now counts.
    assert_eq!(mirror.style_groups().subset_of("a"), Some(Subset::Dynamic));
    assert_eq!(mirror.style_groups().subset_of("b"), Some(Subset::Bulk));
    assert!(mirror.style_groups().partition_is_consistent());
}

#[test]
fn reload_with_an_unchanged_sheet_migrates_nothing() {
    let mut mirror = MirrorGraph::new().with_resolver(Box::new(SheetResolver::default()));
    mirror.add_node("a").unwrap();
    let before = mirror.style_groups().group_of("a");
    mirror.invalidate_styles(&Selector::All);
    assert_eq!(mirror.style_groups().group_of("a"), before);
}

#[test]
fn removing_a_node_removes_its_edges_and_reaps_groups() {
    let mut mirror = demo_mirror();
    mirror.remove_element("a").unwrap();
    assert!(mirror.element("ab").is_none());
    assert!(mirror.element("a").is_none());
    assert_eq!(mirror.style_groups().element_count(), 1);
    let order: Vec<&str> = mirror
        .groups_in_z_order()
        .map(|g| g.signature().id())
        .collect();
    assert_eq!(order, vec!["node"]);
    assert!(mirror.style_groups().partition_is_consistent());
}

#[test]
fn node_positions_follow_position_attributes() {
    let mut mirror = demo_mirror();
    mirror.move_node("a", 2.0, 3.0).unwrap();
    assert_eq!(mirror.element("a").unwrap().position(), Some((2.0, 3.0, 0.0)));
    mirror
        .set_attribute(ElementScope::Element("a".to_string()), "z", Some(1.5.into()))
        .unwrap();
    assert_eq!(mirror.element("a").unwrap().position(), Some((2.0, 3.0, 1.5)));
}
