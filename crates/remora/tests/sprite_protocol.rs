use remora::{
    AttachPoint, AttributeValue, ElementKind, ElementScope, GraphEvent, MirrorGraph,
    SpritePosition,
};

fn mirror_with_graph() -> MirrorGraph {
    let mut mirror = MirrorGraph::new();
    mirror.add_node("N1").unwrap();
    mirror.add_node("N2").unwrap();
    mirror.add_edge("E1", "N1", "N2", true).unwrap();
    mirror
}

#[test]
fn sprite_round_trips_through_its_attributes() {
    let mut mirror = mirror_with_graph();
    mirror.add_sprite("S1", 0.5, 0.0, 0.0).unwrap();

    let sprite = mirror.sprite("S1").expect("sprite decoded");
    assert_eq!(
        sprite.position(),
        SpritePosition::Free {
            x: 0.5,
            y: 0.0,
            z: 0.0
        }
    );
    assert_eq!(sprite.attachment(), None);
    assert_eq!(mirror.element("S1").unwrap().kind(), ElementKind::Sprite);

    mirror.attach_sprite("S1", "N1").unwrap();
    assert_eq!(
        mirror.sprite("S1").unwrap().attachment(),
        Some(&AttachPoint::Node("N1".to_string()))
    );

    // Removing the attach attribute detaches; the free position survives.
    mirror.detach_sprite("S1").unwrap();
    let sprite = mirror.sprite("S1").unwrap();
    assert_eq!(sprite.attachment(), None);
    assert_eq!(
        sprite.position(),
        SpritePosition::Free {
            x: 0.5,
            y: 0.0,
            z: 0.0
        }
    );
}

#[test]
fn reattaching_keeps_a_single_attach_point_and_relays_the_detach() {
    let mut mirror = mirror_with_graph();
    mirror.add_sprite("S1", 0.0, 0.0, 0.0).unwrap();
    mirror.attach_sprite("S1", "N1").unwrap();
    mirror.take_outgoing();

    mirror.attach_sprite("S1", "E1").unwrap();
    assert_eq!(
        mirror.sprite("S1").unwrap().attachment(),
        Some(&AttachPoint::Edge("E1".to_string()))
    );

    // One synthesized removal for the old attach point, plus the attach
    // attribute itself.
    let events: Vec<GraphEvent> = mirror
        .take_outgoing()
        .into_iter()
        .map(|t| t.event)
        .collect();
    assert!(events.contains(&GraphEvent::AttributeChanged {
        scope: ElementScope::Element("N1".to_string()),
        key: "ui.sprite.S1".to_string(),
        value: None,
    }));
    assert!(events.contains(&GraphEvent::AttributeChanged {
        scope: ElementScope::Element("E1".to_string()),
        key: "ui.sprite.S1".to_string(),
        value: Some(AttributeValue::Flag),
    }));
    assert_eq!(events.len(), 2);
}

#[test]
fn free_position_is_kept_but_unused_while_attached() {
    let mut mirror = mirror_with_graph();
    mirror
        .set_attribute(
            ElementScope::Graph,
            "ui.sprite.S1",
            Some(AttributeValue::Vector(vec![0.2, 0.3])),
        )
        .unwrap();
    mirror.attach_sprite("S1", "N1").unwrap();

    let sprite = mirror.sprite("S1").unwrap();
    assert_eq!(
        sprite.attachment(),
        Some(&AttachPoint::Node("N1".to_string()))
    );
    assert_eq!(sprite.last_free_position(), Some((0.2, 0.3, 0.0)));
    assert_eq!(
        sprite.position(),
        SpritePosition::AroundNode {
            angle: 0.0,
            radius: 0.0
        }
    );
}

#[test]
fn coordinates_are_interpreted_against_the_attachment() {
    let mut mirror = mirror_with_graph();
    mirror.add_sprite("S1", 0.0, 0.0, 0.0).unwrap();
    mirror.attach_sprite("S1", "E1").unwrap();
    mirror.move_sprite("S1", vec![0.4]).unwrap();
    assert_eq!(
        mirror.sprite("S1").unwrap().position(),
        SpritePosition::AlongEdge { fraction: 0.4 }
    );

    mirror.attach_sprite("S1", "N2").unwrap();
    mirror.move_sprite("S1", vec![1.57, 12.0]).unwrap();
    assert_eq!(
        mirror.sprite("S1").unwrap().position(),
        SpritePosition::AroundNode {
            angle: 1.57,
            radius: 12.0
        }
    );
}

#[test]
fn sprite_properties_track_attributes_one_to_one() {
    let mut mirror = mirror_with_graph();
    mirror.add_sprite("S1", 0.0, 0.0, 0.0).unwrap();
    mirror
        .set_sprite_property("S1", "color", Some("red".into()))
        .unwrap();
    assert_eq!(
        mirror.sprite("S1").unwrap().property("color"),
        Some(&AttributeValue::Text("red".to_string()))
    );

    mirror.set_sprite_property("S1", "color", None).unwrap();
    assert_eq!(mirror.sprite("S1").unwrap().property("color"), None);
}

#[test]
fn removing_the_main_attribute_deletes_the_sprite() {
    let mut mirror = mirror_with_graph();
    mirror.add_sprite("S1", 0.0, 0.0, 0.0).unwrap();
    mirror.remove_sprite("S1").unwrap();
    assert!(mirror.sprite("S1").is_none());
    assert!(mirror.element("S1").is_none());
    assert!(mirror.style_groups().partition_is_consistent());
}

#[test]
fn removing_the_attach_target_detaches_the_sprite() {
    let mut mirror = mirror_with_graph();
    mirror.add_sprite("S1", 1.0, 2.0, 0.0).unwrap();
    mirror.attach_sprite("S1", "E1").unwrap();
    mirror.remove_element("E1").unwrap();

    let sprite = mirror.sprite("S1").unwrap();
    assert_eq!(sprite.attachment(), None);
    assert_eq!(
        sprite.position(),
        SpritePosition::Free {
            x: 1.0,
            y: 2.0,
            z: 0.0
        }
    );
}

#[test]
fn malformed_sprite_keys_are_ignored_without_error() {
    let mut mirror = mirror_with_graph();
    mirror
        .set_attribute(
            ElementScope::Graph,
            "ui.sprite.",
            Some(AttributeValue::Number(1.0)),
        )
        .unwrap();
    mirror
        .set_attribute(
            ElementScope::Graph,
            "ui.sprite..broken",
            Some(AttributeValue::Number(1.0)),
        )
        .unwrap();
    assert_eq!(mirror.elements().filter(|e| e.kind() == ElementKind::Sprite).count(), 0);
}
