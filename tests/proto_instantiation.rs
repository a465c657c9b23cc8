//! Integration tests for PROTO instantiation
//!
//! Each test loads a scene through the public API and inspects the
//! implementation nodes created for the instances.

use pretty_assertions::assert_eq;
use protoscene::graph::{compute_path, resolve_path};
use protoscene::proto::WiringError;
use protoscene::{load, Capability, FieldValue, NodeError, NodeId, World};

fn impl_nodes(world: &World, name: &str) -> Vec<NodeId> {
    let node = world.node(name).expect("named node");
    world
        .graph()
        .node(node)
        .unwrap()
        .as_proto()
        .expect("a prototype instance")
        .impl_nodes()
        .to_vec()
}

const LAMP: &str = r#"
PROTO Lamp [ exposedField SFFloat level 1 ] {
    PointLight { intensity IS level }
}
"#;

#[test]
fn test_instances_are_isolated() {
    let src = format!("{} DEF A Lamp {{}} DEF B Lamp {{ level 0.5 }}", LAMP);
    let mut world = load(&src).expect("Should load");

    let a = impl_nodes(&world, "A");
    let b = impl_nodes(&world, "B");
    assert_eq!(a.len(), 1);
    assert_ne!(a, b);

    world
        .send_event("A", "set_level", FieldValue::SfFloat(0.25), 1.0)
        .unwrap();
    assert_eq!(world.field("A", "level").unwrap(), FieldValue::SfFloat(0.25));
    assert_eq!(world.field("B", "level").unwrap(), FieldValue::SfFloat(0.5));
    assert_eq!(
        world.graph().field(b[0], "intensity").unwrap(),
        FieldValue::SfFloat(0.5)
    );
}

#[test]
fn test_is_takes_argument_or_default() {
    let src = format!("{} DEF A Lamp {{}} DEF B Lamp {{ level 0.5 }}", LAMP);
    let world = load(&src).expect("Should load");

    let a = impl_nodes(&world, "A")[0];
    let b = impl_nodes(&world, "B")[0];
    assert_eq!(world.graph().field(a, "intensity").unwrap(), FieldValue::SfFloat(1.0));
    assert_eq!(world.graph().field(b, "intensity").unwrap(), FieldValue::SfFloat(0.5));
}

#[test]
fn test_unaliased_fields_copy_the_template() {
    let src = r#"
        PROTO Red [] { Material { diffuseColor 1 0 0 } }
        DEF R Red {}
    "#;
    let world = load(src).expect("Should load");
    let material = impl_nodes(&world, "R")[0];
    assert_eq!(
        world.graph().field(material, "diffuseColor").unwrap(),
        FieldValue::SfColor([1.0, 0.0, 0.0])
    );
}

#[test]
fn test_node_arguments_are_cloned() {
    let src = r#"
        PROTO Holder [ field SFNode geom NULL ] {
            Shape { geometry IS geom }
        }
        DEF S Sphere { radius 2 }
        DEF H Holder { geom USE S }
    "#;
    let world = load(src).expect("Should load");
    let sphere = world.node("S").unwrap();
    let shape = impl_nodes(&world, "H")[0];

    let geometry = world
        .graph()
        .field(shape, "geometry")
        .unwrap()
        .as_node()
        .expect("a geometry node");
    assert_ne!(geometry, sphere);
    assert_eq!(
        world.graph().field(geometry, "radius").unwrap(),
        FieldValue::SfFloat(2.0)
    );
}

#[test]
fn test_unaliased_node_arguments_are_cloned() {
    let src = r#"
        PROTO Keeper [ field SFNode kept NULL ] { WorldInfo {} }
        DEF S Sphere { radius 2 }
        DEF X Keeper { kept USE S }
        DEF Y Keeper { kept USE S }
    "#;
    let world = load(src).expect("Should load");
    let sphere = world.node("S").unwrap();
    let x = world.field("X", "kept").unwrap().as_node().expect("a node");
    let y = world.field("Y", "kept").unwrap().as_node().expect("a node");

    assert_ne!(x, sphere);
    assert_ne!(y, sphere);
    assert_ne!(x, y);
    assert_eq!(world.graph().field(x, "radius").unwrap(), FieldValue::SfFloat(2.0));
}

#[test]
fn test_route_into_nested_argument_is_skipped() {
    let src = r#"
        PROTO Holder [ field MFNode kids [] ] { Group { children IS kids } }
        PROTO Outer [ eventIn SFFloat fraction ] {
            Group { children [
                Holder { kids [ DEF HELD PointLight {} ] }
                DEF I ScalarInterpolator {
                    key [ 0 1 ]
                    keyValue [ 0 10 ]
                    set_fraction IS fraction
                }
                DEF M PointLight {}
            ] }
            ROUTE I.value_changed TO HELD.set_intensity
            ROUTE I.value_changed TO M.set_intensity
        }
        DEF O Outer {}
    "#;
    let mut world = load(src).expect("Should load");
    let o = world.node("O").unwrap();
    let (scope, errors) = {
        let instance = world.graph().node(o).unwrap().as_proto().unwrap();
        (instance.scope(), instance.wiring_errors().to_vec())
    };
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        WiringError::Route { to_input, source: NodeError::Unreachable(_), .. } if to_input == "set_intensity"
    ));

    world
        .send_event("O", "fraction", FieldValue::SfFloat(0.5), 1.0)
        .unwrap();
    let m = world.graph().lookup(scope, "M").unwrap();
    assert_eq!(
        world.graph().field(m, "intensity").unwrap(),
        FieldValue::SfFloat(5.0)
    );
}

#[test]
fn test_self_reference_is_cloned_onto_itself() {
    let src = r#"
        PROTO Loop [] { DEF G Group { children [ USE G ] } }
        DEF L1 Loop {}
        DEF L2 Loop {}
    "#;
    let world = load(src).expect("Should load");

    for name in ["L1", "L2"] {
        let group = impl_nodes(&world, name)[0];
        assert_eq!(
            world.graph().field(group, "children").unwrap(),
            FieldValue::MfNode(vec![group])
        );
    }
    assert_ne!(impl_nodes(&world, "L1"), impl_nodes(&world, "L2"));
}

#[test]
fn test_shared_nodes_stay_shared() {
    let src = r#"
        PROTO Pair [] {
            Group { children [
                Shape { appearance DEF A Appearance {} }
                Shape { appearance USE A }
            ] }
        }
        DEF P Pair {}
    "#;
    let world = load(src).expect("Should load");
    let group = impl_nodes(&world, "P")[0];
    let graph = world.graph();
    let shapes = graph.field(group, "children").unwrap().as_nodes().unwrap().to_vec();

    let first = graph.field(shapes[0], "appearance").unwrap();
    let second = graph.field(shapes[1], "appearance").unwrap();
    assert_eq!(first, second);
    assert!(first.as_node().is_some());
}

#[test]
fn test_impl_names_live_in_the_instance_scope() {
    let src = r#"
        PROTO Named [] { DEF INNER Box {} }
        DEF N Named {}
    "#;
    let world = load(src).expect("Should load");
    assert_eq!(world.node("INNER"), None);

    let n = world.node("N").unwrap();
    let instance = world.graph().node(n).unwrap().as_proto().unwrap();
    assert_eq!(
        world.graph().lookup(instance.scope(), "INNER"),
        Some(instance.impl_nodes()[0])
    );
}

#[test]
fn test_path_replays_across_instances() {
    let src = r#"
        PROTO Scene2 [] {
            Transform { children [
                Shape {}
                Shape { geometry DEF CONE Cone {} }
            ] }
        }
        DEF S1 Scene2 {}
        DEF S2 Scene2 {}
    "#;
    let world = load(src).expect("Should load");
    let graph = world.graph();
    let s1 = graph.node(world.node("S1").unwrap()).unwrap().as_proto().unwrap();
    let s2 = graph.node(world.node("S2").unwrap()).unwrap().as_proto().unwrap();

    let cone1 = graph.lookup(s1.scope(), "CONE").unwrap();
    let cone2 = graph.lookup(s2.scope(), "CONE").unwrap();

    let path = compute_path(graph, s1.impl_nodes(), cone1).expect("a path");
    assert_eq!(path.len(), 3);
    assert_eq!(resolve_path(graph, s2.impl_nodes(), &path), Some(cone2));
}

#[test]
fn test_exposed_field_forwards_both_ways() {
    let src = format!(
        "{} DEF A Lamp {{}} DEF B Lamp {{}} ROUTE A.level_changed TO B.set_level",
        LAMP
    );
    let mut world = load(&src).expect("Should load");

    world
        .send_event("A", "set_level", FieldValue::SfFloat(0.3), 1.0)
        .unwrap();
    assert_eq!(world.field("B", "level").unwrap(), FieldValue::SfFloat(0.3));

    // a change made inside the implementation reaches the public output
    let light = impl_nodes(&world, "B")[0];
    world
        .graph_mut()
        .send_event(light, "set_intensity", FieldValue::SfFloat(0.9), 2.0)
        .unwrap();
    let b = world.node("B").unwrap();
    assert_eq!(
        world.graph().output_value(b, "level_changed").unwrap(),
        &FieldValue::SfFloat(0.9)
    );
}

const DIMMER: &str = r#"
PROTO Dimmer [
    eventIn SFFloat set_fraction
    exposedField SFFloat level 1
    eventOut SFFloat dimmed
] {
    Group { children [
        DEF I ScalarInterpolator {
            key [ 0 1 ]
            keyValue [ 0 10 ]
            set_fraction IS set_fraction
            value_changed IS dimmed
        }
        DEF L PointLight { intensity IS level }
    ] }
    ROUTE I.value_changed TO L.set_intensity
}
"#;

#[test]
fn test_internal_routes_are_per_instance() {
    let src = format!("{} DEF D1 Dimmer {{}} DEF D2 Dimmer {{}}", DIMMER);
    let mut world = load(&src).expect("Should load");

    world
        .send_event("D1", "set_fraction", FieldValue::SfFloat(0.5), 1.0)
        .unwrap();
    assert_eq!(world.field("D1", "level").unwrap(), FieldValue::SfFloat(5.0));
    assert_eq!(world.field("D2", "level").unwrap(), FieldValue::SfFloat(1.0));

    let d1 = world.node("D1").unwrap();
    assert_eq!(
        world.graph().output_value(d1, "dimmed").unwrap(),
        &FieldValue::SfFloat(5.0)
    );
}

#[test]
fn test_event_out_reaches_scene_routes() {
    let src = format!(
        "{} DEF D Dimmer {{}} DEF W Dimmer {{}} ROUTE D.dimmed TO W.set_fraction",
        DIMMER
    );
    let mut world = load(&src).expect("Should load");
    assert!(world.scene().warnings().is_empty());

    // 0.1 * 10 = 1.0 feeds W, which clamps to its last key
    world
        .send_event("D", "set_fraction", FieldValue::SfFloat(0.1), 1.0)
        .unwrap();
    assert_eq!(world.field("W", "level").unwrap(), FieldValue::SfFloat(10.0));
}

#[test]
fn test_bad_internal_route_is_skipped() {
    let src = r#"
        PROTO Broken [] {
            Group { children [
                DEF I ScalarInterpolator {}
                DEF L PointLight {}
            ] }
            ROUTE I.value_changed TO L.set_on
        }
        DEF B Broken {}
    "#;
    let world = load(src).expect("Should load");
    let b = world.node("B").unwrap();
    let instance = world.graph().node(b).unwrap().as_proto().unwrap();
    assert_eq!(instance.wiring_errors().len(), 1);
}

#[test]
fn test_capabilities_forward_to_first_impl_node() {
    let src = r#"
        PROTO Ball [ field SFFloat r 1 ] { Sphere { radius IS r } WorldInfo {} }
        DEF B Ball { r 3 }
        Shape { geometry USE B }
    "#;
    let world = load(src).expect("Should load");
    let b = world.node("B").unwrap();
    let sphere = impl_nodes(&world, "B")[0];

    assert!(world.graph().has_capability(b, Capability::Geometry));
    assert!(!world.graph().has_capability(b, Capability::Light));
    assert_eq!(world.graph().to_capability(b, Capability::Geometry), Some(sphere));
}

#[test]
fn test_nested_instances() {
    let src = format!(
        "{} PROTO Fixture [ field SFFloat level 0.5 ] {{ Group {{ children [ Lamp {{ level IS level }} ] }} }} DEF F Fixture {{ level 0.75 }}",
        LAMP
    );
    let world = load(&src).expect("Should load");
    let group = impl_nodes(&world, "F")[0];
    let graph = world.graph();
    let lamp = graph.field(group, "children").unwrap().as_nodes().unwrap()[0];
    assert_eq!(graph.field(lamp, "level").unwrap(), FieldValue::SfFloat(0.75));

    let light = graph.node(lamp).unwrap().as_proto().unwrap().impl_nodes()[0];
    assert_eq!(graph.field(light, "intensity").unwrap(), FieldValue::SfFloat(0.75));
    assert!(graph.has_capability(lamp, Capability::Light));
}

#[test]
fn test_lifecycle_reaches_impl_nodes() {
    let src = format!("{} DEF A Lamp {{}}", LAMP);
    let mut world = load(&src).expect("Should load");
    let light = impl_nodes(&world, "A")[0];

    world.initialize(0.0).unwrap();
    assert!(world.graph().node(light).unwrap().is_initialized());
    world.shutdown(1.0).unwrap();
    assert!(!world.graph().node(light).unwrap().is_initialized());
}
