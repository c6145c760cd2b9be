use super::*;
use crate::scene::observer::SceneEventKind;

fn sphere_scene() -> (Scene, NodeId, NodeId) {
    let mut s = Scene::new();
    let xf = s.create_node("transform", "pSphere1", None).unwrap();
    let shape = s.create_node("mesh", "pSphereShape1", Some(xf)).unwrap();
    (s, xf, shape)
}

#[test]
fn names_are_uniquified_per_scope() {
    let mut s = Scene::new();
    let a = s.create_node("transform", "pSphere1", None).unwrap();
    let b = s.create_node("transform", "pSphere1", None).unwrap();
    assert_eq!(s.leaf_name(b), "pSphere2");

    let g = s.create_node("transform", "group", None).unwrap();
    let c = s.create_node("transform", "pSphere1", Some(g)).unwrap();
    assert_eq!(s.leaf_name(c), "pSphere1");
    assert_eq!(s.full_path(c), "|group|pSphere1");

    let d = s.create_node("blinn", "pSphere1", None).unwrap();
    assert_eq!(s.leaf_name(d), "pSphere3");
    assert_eq!(s.leaf_name(a), "pSphere1");

    let e = s.create_node("blinn", "shader", None).unwrap();
    let f = s.create_node("blinn", "shader", None).unwrap();
    assert_eq!(s.leaf_name(e), "shader");
    assert_eq!(s.leaf_name(f), "shader1");
}

#[test]
fn invalid_names_are_rejected() {
    let mut s = Scene::new();
    assert!(s.create_node("transform", "", None).is_err());
    assert!(s.create_node("transform", "1abc", None).is_err());
    assert!(s.create_node("transform", "a b", None).is_err());
    assert!(s.create_node("transform", "ns:", None).is_err());
    assert!(s.create_node("transform", "ns:pSphere1", None).is_ok());
}

#[test]
fn dg_nodes_cannot_be_parented() {
    let (mut s, xf, _) = sphere_scene();
    assert!(s.create_node("blinn", "blinn1", Some(xf)).is_err());
    let b = s.create_node("blinn", "blinn1", None).unwrap();
    assert!(s.create_node("transform", "t", Some(b)).is_err());
}

#[test]
fn resolve_accepts_paths_partial_paths_and_leaves() {
    let mut s = Scene::new();
    let g1 = s.create_node("transform", "g1", None).unwrap();
    let g2 = s.create_node("transform", "g2", None).unwrap();
    let a = s.create_node("transform", "ball", Some(g1)).unwrap();
    let b = s.create_node("transform", "ball", Some(g2)).unwrap();

    assert_eq!(s.find("|g1|ball"), Some(a));
    assert_eq!(s.find("g2|ball"), Some(b));
    assert_eq!(s.find("ball"), None);
    assert!(s.resolve("ball").unwrap_err().to_string().contains("ambiguous"));
    assert!(s.resolve("nothing").is_err());
    assert_eq!(s.unique_name(a), "g1|ball");
    assert_eq!(s.unique_name(g1), "g1");
}

#[test]
fn every_node_has_a_message_attribute() {
    let (s, xf, shape) = sphere_scene();
    for id in [xf, shape] {
        assert_eq!(
            s.attribute(&Plug::new(id, "message")).unwrap().ty,
            PlugType::Message
        );
    }
}

#[test]
fn set_value_coerces_and_refuses_connected_plugs() {
    let (mut s, xf, _) = sphere_scene();
    let tx = Plug::new(xf, "translateX");
    s.set_value(&tx, PlugValue::Int(3)).unwrap();
    assert_eq!(s.evaluate(&tx).unwrap(), PlugValue::Double(3.0));
    assert!(s.set_value(&tx, PlugValue::String("x".into())).is_err());

    let other = s.create_node("transform", "driver", None).unwrap();
    let src = Plug::new(other, "translateY");
    s.set_value(&src, PlugValue::Double(9.0)).unwrap();
    s.connect(&src, &tx).unwrap();
    assert_eq!(s.evaluate(&tx).unwrap(), PlugValue::Double(9.0));
    assert!(s.set_value(&tx, PlugValue::Double(1.0)).is_err());
}

#[test]
fn connect_checks_types_and_single_input() {
    let mut s = Scene::new();
    let tex1 = s.create_node("file", "texture1", None).unwrap();
    let tex2 = s.create_node("file", "texture2", None).unwrap();
    let blinn = s.create_node("blinn", "blinn1", None).unwrap();
    let color = Plug::new(blinn, "color");

    s.connect(&Plug::new(tex1, "outColor"), &color).unwrap();
    assert!(s.connect(&Plug::new(tex2, "outColor"), &color).is_err());
    assert!(
        s.connect(&Plug::new(tex2, "fileTextureName"), &Plug::new(blinn, "transparency"))
            .is_err()
    );
    assert_eq!(s.input(&color), Some(&Plug::new(tex1, "outColor")));
    assert_eq!(s.outputs(&Plug::new(tex1, "outColor")), vec![color.clone()]);

    assert!(s.disconnect(&Plug::new(tex2, "outColor"), &color).is_err());
    s.disconnect(&Plug::new(tex1, "outColor"), &color).unwrap();
    assert!(s.input(&color).is_none());
    assert!(s.outputs(&Plug::new(tex1, "outColor")).is_empty());
}

#[test]
fn delete_removes_descendants_and_connections() {
    let (mut s, xf, shape) = sphere_scene();
    let sg = s.create_node("shadingEngine", "blinn1SG", None).unwrap();
    s.connect(&Plug::new(sg, "message"), &Plug::new(shape, "shadingEngine"))
        .unwrap();
    s.take_events();

    s.delete_node(xf).unwrap();
    assert!(s.node(xf).is_none());
    assert!(s.node(shape).is_none());
    assert!(s.outputs(&Plug::new(sg, "message")).is_empty());

    let kinds: Vec<SceneEventKind> = s.take_events().iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            SceneEventKind::ConnectionChanged,
            SceneEventKind::NodeRemoved,
            SceneEventKind::NodeRemoved,
        ]
    );
}

#[test]
fn rename_and_reparent_emit_events_and_update_paths() {
    let (mut s, xf, shape) = sphere_scene();
    let g = s.create_node("transform", "group1", None).unwrap();
    s.take_events();

    assert_eq!(s.rename_node(xf, "ball").unwrap(), "ball");
    assert_eq!(s.full_path(shape), "|ball|pSphereShape1");
    s.reparent_node(xf, Some(g)).unwrap();
    assert_eq!(s.full_path(shape), "|group1|ball|pSphereShape1");
    assert!(s.reparent_node(g, Some(shape)).is_err());
    assert!(s.reparent_node(g, Some(g)).is_err());

    let events = s.take_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[1],
        SceneEvent::NodeReparented { old_path, new_path, .. }
            if old_path == "|ball" && new_path == "|group1|ball"
    ));
}

#[test]
fn shading_helpers_follow_assignments() {
    let (mut s, _, shape) = sphere_scene();
    let blinn = s.create_node("blinn", "blinn1", None).unwrap();
    let sg = s.create_node("shadingEngine", "blinn1SG", None).unwrap();
    s.connect(&Plug::new(blinn, "outColor"), &Plug::new(sg, "surfaceShader"))
        .unwrap();
    s.connect(&Plug::new(sg, "message"), &Plug::new(shape, "shadingEngine"))
        .unwrap();
    assert_eq!(s.assigned_shading_engine(shape), Some(sg));
    assert_eq!(s.surface_shader(sg), Some(blinn));
}

#[test]
fn reference_edits_are_recorded_unless_ignored() {
    let mut s = Scene::new();
    let mut contents = Scene::new();
    contents.create_node("transform", "pSphere1", None).unwrap();
    s.create_reference("ref", contents.snapshot()).unwrap();

    let node = s.find("ref:pSphere1").unwrap();
    assert_eq!(s.node(node).unwrap().reference(), Some("ref"));
    let tx = Plug::new(node, "translateX");

    s.set_ignore_reference_edits(true);
    s.set_value(&tx, PlugValue::Double(1.0)).unwrap();
    assert!(s.reference_edits().is_empty());

    s.set_ignore_reference_edits(false);
    s.set_value(&tx, PlugValue::Double(2.0)).unwrap();
    assert_eq!(s.reference_edits().len(), 1);
    assert_eq!(s.reference_edits()[0].namespace, "ref");
}

#[test]
fn unload_and_reload_reference() {
    let mut s = Scene::new();
    let mut contents = Scene::new();
    let g = contents.create_node("transform", "grp", None).unwrap();
    contents.create_node("transform", "ball", Some(g)).unwrap();
    s.create_reference("chars", contents.snapshot()).unwrap();
    assert!(s.find("|chars:grp|chars:ball").is_some());

    s.unload_reference("chars").unwrap();
    assert!(s.is_empty());
    assert_eq!(s.references(), vec![("chars".to_owned(), false)]);

    s.load_reference("chars").unwrap();
    assert_eq!(s.len(), 2);
    s.remove_reference("chars").unwrap();
    assert!(s.is_empty());
    assert!(s.references().is_empty());
    assert!(s.create_reference("chars", SceneSnapshot::default()).is_ok());
}

#[test]
fn reference_load_and_unload_are_bracketed_by_load_markers() {
    let mut s = Scene::new();
    let mut contents = Scene::new();
    contents.create_node("transform", "ball", None).unwrap();
    s.create_reference("chars", contents.snapshot()).unwrap();

    let pending = s.take_pending();
    assert_eq!(pending.len(), 5);
    assert!(matches!(
        pending[0],
        Pending::Event(SceneEvent::ReferenceCreated { .. })
    ));
    assert_eq!(pending[1], Pending::LoadBegin);
    assert!(matches!(pending[2], Pending::Event(SceneEvent::NodeAdded { .. })));
    assert_eq!(pending[3], Pending::LoadEnd);
    assert!(matches!(
        pending[4],
        Pending::Event(SceneEvent::ReferenceLoaded { .. })
    ));

    s.unload_reference("chars").unwrap();
    let pending = s.take_pending();
    assert_eq!(pending.first(), Some(&Pending::LoadBegin));
    assert_eq!(pending.get(pending.len() - 2), Some(&Pending::LoadEnd));
    assert!(!s.has_pending_events());
}

#[test]
fn snapshot_round_trip_is_stable() {
    let (mut s, xf, shape) = sphere_scene();
    let blinn = s.create_node("blinn", "blinn1", None).unwrap();
    let sg = s.create_node("shadingEngine", "blinn1SG", None).unwrap();
    s.connect(&Plug::new(blinn, "outColor"), &Plug::new(sg, "surfaceShader"))
        .unwrap();
    s.connect(&Plug::new(sg, "message"), &Plug::new(shape, "shadingEngine"))
        .unwrap();
    s.set_value(&Plug::new(xf, "translateY"), PlugValue::Double(7.5))
        .unwrap();
    s.add_attribute(xf, "customTag", PlugType::String, Some(PlugValue::String("hero".into())))
        .unwrap();

    let snap = s.snapshot();
    assert_eq!(snap.nodes[0].path, "|pSphere1");
    assert_eq!(snap.nodes[1].path, "|pSphere1|pSphereShape1");

    let again = Scene::from_snapshot(&snap).unwrap();
    assert_eq!(again.snapshot(), snap);
    assert_eq!(
        again.evaluate(&again.plug("pSphere1.translateY").unwrap()).unwrap(),
        PlugValue::Double(7.5)
    );
    assert_eq!(
        again.stored_value(&again.plug("pSphere1.customTag").unwrap()).unwrap(),
        &PlugValue::String("hero".into())
    );
}

#[test]
fn plug_path_requires_existing_attribute() {
    let (s, _, _) = sphere_scene();
    assert!(s.plug("pSphere1.translateX").is_ok());
    assert!(s.plug("pSphere1.nope").is_err());
    assert!(s.plug("pSphere1").is_err());
}
