use super::*;
use crate::ApplyKind;
use crate::scene::observer::SceneEventKind;
use crate::selector::eval::Selector;
use crate::selector::filter::TypeFilter;
use std::cell::RefCell;
use std::rc::Rc;

fn engine_with(build: impl FnOnce(&mut Scene)) -> Engine {
    let mut scene = Scene::new();
    build(&mut scene);
    Engine::new(scene, EngineConfig::default()).unwrap()
}

fn spheres(n: usize) -> Engine {
    engine_with(|s| {
        for i in 1..=n {
            s.create_node("transform", &format!("pSphere{i}"), None)
                .unwrap();
        }
    })
}

fn transforms(pattern: &str) -> Selector {
    Selector::simple()
        .with_pattern(pattern)
        .with_type_filter(TypeFilter::Transforms)
}

/// Layer `L1` with collection `C` selecting `pattern` and an absolute override of
/// `translateX` set to 5.
fn absolute_setup(e: &mut Engine, pattern: &str) -> (ItemId, ItemId, ItemId) {
    let layer = e.create_layer("L1").unwrap();
    let c = e.create_collection(layer, "C").unwrap();
    e.set_selector(c, transforms(pattern)).unwrap();
    let o = e
        .create_absolute_override(c, "tx", "pSphere1.translateX")
        .unwrap();
    e.set_absolute_value(o, PlugValue::Double(5.0)).unwrap();
    (layer, c, o)
}

fn value(e: &Engine, path: &str) -> PlugValue {
    e.plug_value(path).unwrap()
}

#[test]
fn absolute_override_applies_and_unapplies() {
    let mut e = spheres(1);
    let (layer, _, _) = absolute_setup(&mut e, "pSphere1");
    let tx = e.scene().plug("pSphere1.translateX").unwrap();
    assert_eq!(value(&e, "pSphere1.translateX"), PlugValue::Double(0.0));

    e.switch_to_layer(Some(layer)).unwrap();
    assert_eq!(value(&e, "pSphere1.translateX"), PlugValue::Double(5.0));
    let src = e.scene().input(&tx).cloned().unwrap();
    let node = e.scene().node(src.node).unwrap();
    assert!(node.is_internal());
    assert_eq!(node.compute(), Some(ApplyKind::Absolute));

    e.switch_to_layer(None).unwrap();
    assert_eq!(value(&e, "pSphere1.translateX"), PlugValue::Double(0.0));
    assert!(e.scene().input(&tx).is_none());
    assert!(e.scene().node(src.node).is_none());
    assert!(e.applied().is_empty());
}

#[test]
fn relative_chain_composes_in_document_order() {
    let mut e = spheres(1);
    e.set_plug_value("pSphere1.scaleX", PlugValue::Double(2.0))
        .unwrap();
    let layer = e.create_layer("L1").unwrap();
    let c = e.create_collection(layer, "C").unwrap();
    e.set_selector(c, transforms("pSphere1")).unwrap();
    let first = e
        .create_relative_override(c, "double_it", "pSphere1.scaleX")
        .unwrap();
    e.set_relative_values(first, PlugValue::Double(2.0), PlugValue::Double(0.0))
        .unwrap();
    let second = e
        .create_relative_override(c, "plus_one", "pSphere1.scaleX")
        .unwrap();
    e.set_relative_values(second, PlugValue::Double(1.0), PlugValue::Double(1.0))
        .unwrap();

    e.switch_to_layer(Some(layer)).unwrap();
    assert_eq!(value(&e, "pSphere1.scaleX"), PlugValue::Double(5.0));
}

#[test]
fn disabled_override_is_transparent_without_reapply() {
    let mut e = spheres(1);
    let (layer, _, o) = absolute_setup(&mut e, "pSphere1");
    e.switch_to_layer(Some(layer)).unwrap();
    let nodes = e.applied().len();
    let tx = e.scene().plug("pSphere1.translateX").unwrap();
    let apply_node = e.scene().input(&tx).cloned().unwrap();

    e.set_self_enabled(o, false).unwrap();
    assert_eq!(value(&e, "pSphere1.translateX"), PlugValue::Double(0.0));
    assert_eq!(e.applied().len(), nodes);
    assert_eq!(e.scene().input(&tx), Some(&apply_node));

    e.set_self_enabled(o, true).unwrap();
    assert_eq!(value(&e, "pSphere1.translateX"), PlugValue::Double(5.0));
}

#[test]
fn connection_override_restores_the_exact_source() {
    let mut e = engine_with(|s| {
        let blinn = s.create_node("blinn", "blinn1", None).unwrap();
        let t1 = s.create_node("file", "texture1", None).unwrap();
        let t2 = s.create_node("file", "texture2", None).unwrap();
        s.set_value(
            &Plug::new(t2, "outColor"),
            PlugValue::Color([0.0, 1.0, 0.0]),
        )
        .unwrap();
        s.connect(&Plug::new(t1, "outColor"), &Plug::new(blinn, "color"))
            .unwrap();
    });
    let layer = e.create_layer("L1").unwrap();
    let c = e.create_collection(layer, "C").unwrap();
    e.set_selector(
        c,
        Selector::simple()
            .with_pattern("blinn1")
            .with_type_filter(TypeFilter::Shaders),
    )
    .unwrap();
    e.create_connection_override(c, "tex", "blinn1.color", Some("texture2.outColor"))
        .unwrap();

    let color = e.scene().plug("blinn1.color").unwrap();
    let t1_out = e.scene().plug("texture1.outColor").unwrap();
    let t2_out = e.scene().plug("texture2.outColor").unwrap();

    e.switch_to_layer(Some(layer)).unwrap();
    assert_eq!(e.scene().effective_source(&color), Some(t2_out));
    assert_eq!(value(&e, "blinn1.color"), PlugValue::Color([0.0, 1.0, 0.0]));

    e.switch_to_layer(None).unwrap();
    assert_eq!(e.scene().input(&color), Some(&t1_out));
}

#[test]
fn apply_then_unapply_restores_the_scene_snapshot() {
    let mut e = spheres(2);
    let (layer, _, _) = absolute_setup(&mut e, "pSphere*");
    let before = e.scene().snapshot();

    e.switch_to_layer(Some(layer)).unwrap();
    let applied = e.scene().snapshot();
    assert_ne!(applied, before);

    e.switch_to_layer(None).unwrap();
    assert_eq!(e.scene().snapshot(), before);

    e.switch_to_layer(Some(layer)).unwrap();
    assert_eq!(e.scene().snapshot(), applied);
}

#[test]
fn new_scene_nodes_are_picked_up_by_the_visible_layer() {
    let mut e = spheres(1);
    let (layer, c, _) = absolute_setup(&mut e, "pSphere*");
    e.switch_to_layer(Some(layer)).unwrap();

    e.edit_scene(|s| s.create_node("transform", "pSphere2", None).map(|_| ()))
        .unwrap();
    assert_eq!(value(&e, "pSphere2.translateX"), PlugValue::Double(5.0));
    assert_eq!(
        e.setup().collection_at(c).unwrap().selector().members().len(),
        2
    );
    assert!(!e.setup().layer_at(layer).unwrap().needs_apply_update());

    let victim = e.scene().resolve("pSphere2").unwrap();
    e.edit_scene(|s| s.delete_node(victim)).unwrap();
    assert_eq!(value(&e, "pSphere1.translateX"), PlugValue::Double(5.0));
}

#[test]
fn writes_to_overridden_plugs_land_under_the_override() {
    let mut e = spheres(1);
    let (layer, _, _) = absolute_setup(&mut e, "pSphere1");
    e.switch_to_layer(Some(layer)).unwrap();

    e.set_plug_value("pSphere1.translateX", PlugValue::Double(3.0))
        .unwrap();
    assert_eq!(value(&e, "pSphere1.translateX"), PlugValue::Double(5.0));

    e.switch_to_layer(None).unwrap();
    assert_eq!(value(&e, "pSphere1.translateX"), PlugValue::Double(3.0));
}

#[test]
fn layer_switch_reports_progress_and_notifies() {
    let mut e = spheres(2);
    let (layer, _, _) = absolute_setup(&mut e, "pSphere*");

    let progress = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&progress);
    e.set_progress_callback(Some(Box::new(move |p: &ApplyProgress| {
        sink.borrow_mut().push(*p)
    })));
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    e.add_tree_listener(Box::new(move |ev: &TreeEvent| sink.borrow_mut().push(ev.clone())));

    e.switch_to_layer(Some(layer)).unwrap();
    e.switch_to_layer(None).unwrap();

    let progress = progress.borrow();
    assert_eq!(
        progress.first(),
        Some(&ApplyProgress {
            phase: ApplyPhase::Apply,
            done: 1,
            total: 1
        })
    );
    assert_eq!(
        progress.last(),
        Some(&ApplyProgress {
            phase: ApplyPhase::Unapply,
            done: 1,
            total: 1
        })
    );
    let switches: Vec<TreeEvent> = events
        .borrow()
        .iter()
        .filter(|ev| matches!(ev, TreeEvent::VisibleLayerChanged { .. }))
        .cloned()
        .collect();
    assert_eq!(
        switches,
        vec![
            TreeEvent::VisibleLayerChanged {
                old: None,
                new: Some(layer)
            },
            TreeEvent::VisibleLayerChanged {
                old: Some(layer),
                new: None
            },
        ]
    );
}

#[test]
fn legacy_layer_nodes_track_visibility() {
    let mut e = spheres(1);
    let (layer, _, _) = absolute_setup(&mut e, "pSphere1");
    let visible = |e: &Engine, node: &str| value(e, &format!("{node}.visible"));

    assert_eq!(visible(&e, "defaultRenderLayer"), PlugValue::Bool(true));
    assert_eq!(visible(&e, "rs_L1"), PlugValue::Bool(false));

    e.switch_to_layer(Some(layer)).unwrap();
    assert_eq!(visible(&e, "defaultRenderLayer"), PlugValue::Bool(false));
    assert_eq!(visible(&e, "rs_L1"), PlugValue::Bool(true));
}

#[test]
fn missing_connection_source_is_flagged_and_skipped() {
    let mut e = engine_with(|s| {
        s.create_node("blinn", "blinn1", None).unwrap();
    });
    let layer = e.create_layer("L1").unwrap();
    let c = e.create_collection(layer, "C").unwrap();
    e.set_selector_pattern(c, "blinn1").unwrap();
    let o = e
        .create_connection_override(c, "tex", "blinn1.color", Some("nothing.outColor"))
        .unwrap();

    e.switch_to_layer(Some(layer)).unwrap();
    assert!(e.setup().override_at(o).unwrap().has_missing_dependencies());
    assert!(e.applied().is_empty());
}

#[test]
fn members_without_the_attribute_are_not_overridden() {
    let mut e = engine_with(|s| {
        s.create_node("transform", "pSphere1", None).unwrap();
        s.create_node("blinn", "blinn1", None).unwrap();
    });
    let layer = e.create_layer("L1").unwrap();
    let c = e.create_collection(layer, "C").unwrap();
    e.set_selector_pattern(c, "pSphere1 blinn1").unwrap();
    // `visibility` exists only on the transform.
    let o = e
        .create_absolute_override(c, "vis", "pSphere1.visibility")
        .unwrap();
    e.set_absolute_value(o, PlugValue::Bool(false)).unwrap();

    e.switch_to_layer(Some(layer)).unwrap();
    assert_eq!(value(&e, "pSphere1.visibility"), PlugValue::Bool(false));
    assert_eq!(e.applied().len(), 1);
}

#[test]
fn invalid_config_is_rejected() {
    let config = EngineConfig {
        undo_depth: 0,
        ..EngineConfig::default()
    };
    assert!(Engine::new(Scene::new(), config).is_err());
}

#[test]
fn reference_load_suppresses_node_events_and_catches_up_once() {
    let mut e = spheres(1);
    let (layer, _, _) = absolute_setup(&mut e, "::pSphere*");
    e.switch_to_layer(Some(layer)).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    e.observer_mut().register_all(Box::new(move |ev: &SceneEvent| {
        if !ev.is_internal() {
            s.borrow_mut().push(ev.kind());
        }
        Ok(())
    }));

    let mut contents = Scene::new();
    let xf = contents.create_node("transform", "pSphere1", None).unwrap();
    contents
        .create_node("mesh", "pSphereShape1", Some(xf))
        .unwrap();
    e.edit_scene(|s| s.create_reference("ref", contents.snapshot()))
        .unwrap();

    let kinds = seen.borrow().clone();
    assert_eq!(
        kinds[..2],
        [SceneEventKind::ReferenceCreated, SceneEventKind::ReferenceLoaded]
    );
    assert!(!kinds.contains(&SceneEventKind::NodeAdded));
    assert!(!e.observer_mut().is_loading());
    assert_eq!(value(&e, "ref:pSphere1.translateX"), PlugValue::Double(5.0));

    seen.borrow_mut().clear();
    e.edit_scene(|s| s.unload_reference("ref")).unwrap();
    let kinds = seen.borrow().clone();
    assert_eq!(kinds.first(), Some(&SceneEventKind::ReferenceUnloaded));
    assert!(!kinds.contains(&SceneEventKind::NodeRemoved));
    assert_eq!(value(&e, "pSphere1.translateX"), PlugValue::Double(5.0));
    assert!(e.scene().find("ref:pSphere1").is_none());
}

#[test]
fn editing_a_later_collection_keeps_earlier_apply_nodes() {
    let mut e = spheres(2);
    let layer = e.create_layer("L1").unwrap();
    let first = e.create_collection(layer, "first").unwrap();
    e.set_selector(first, transforms("pSphere*")).unwrap();
    let double_it = e
        .create_relative_override(first, "double_it", "pSphere1.translateX")
        .unwrap();
    e.set_relative_values(double_it, PlugValue::Double(2.0), PlugValue::Double(1.0))
        .unwrap();
    let second = e.create_collection(layer, "second").unwrap();
    e.set_selector(second, transforms("pSphere1")).unwrap();
    let plus_ten = e
        .create_relative_override(second, "plus_ten", "pSphere1.translateX")
        .unwrap();
    e.set_relative_values(plus_ten, PlugValue::Double(1.0), PlugValue::Double(10.0))
        .unwrap();
    e.set_plug_value("pSphere1.translateX", PlugValue::Double(1.0))
        .unwrap();
    e.set_plug_value("pSphere2.translateX", PlugValue::Double(1.0))
        .unwrap();

    e.switch_to_layer(Some(layer)).unwrap();
    assert_eq!(value(&e, "pSphere1.translateX"), PlugValue::Double(13.0));
    assert_eq!(value(&e, "pSphere2.translateX"), PlugValue::Double(3.0));
    let earlier = e.applied().records_of(double_it);
    assert_eq!(earlier.len(), 2);

    e.set_selector_pattern(second, "pSphere*").unwrap();
    assert_eq!(e.applied().records_of(double_it), earlier);
    for (_, node) in &earlier {
        assert!(e.scene().node(*node).is_some());
    }
    assert_eq!(e.applied().records_of(plus_ten).len(), 2);
    assert_eq!(value(&e, "pSphere1.translateX"), PlugValue::Double(13.0));
    assert_eq!(value(&e, "pSphere2.translateX"), PlugValue::Double(13.0));
}

/// Replace the legacy node of `layer` with a user set of the same name, so the layer's apply
/// fails after its overrides are spliced in.
fn squat_legacy_node(e: &mut Engine, layer: &str) {
    let name = format!("rs_{layer}");
    e.edit_scene(|s| {
        let legacy = s.resolve(&name)?;
        s.delete_node(legacy)?;
        s.create_node("objectSet", &name, None).map(|_| ())
    })
    .unwrap();
}

#[test]
fn failed_apply_restores_the_scene_snapshot() {
    let mut e = spheres(2);
    let (layer, _, _) = absolute_setup(&mut e, "pSphere*");
    squat_legacy_node(&mut e, "L1");
    let before = e.scene().snapshot();

    assert!(e.switch_to_layer(Some(layer)).is_err());
    assert_eq!(e.setup().visible_layer(), None);
    assert!(e.applied().is_empty());
    assert_eq!(e.scene().snapshot(), before);
    assert_eq!(value(&e, "defaultRenderLayer.visible"), PlugValue::Bool(true));
}

#[test]
fn failed_switch_reapplies_the_previous_layer() {
    let mut e = spheres(1);
    let (broken, _, _) = absolute_setup(&mut e, "pSphere1");
    let good = e.create_layer("L0").unwrap();
    let c = e.create_collection(good, "C0").unwrap();
    e.set_selector(c, transforms("pSphere1")).unwrap();
    let o = e
        .create_absolute_override(c, "tx0", "pSphere1.translateX")
        .unwrap();
    e.set_absolute_value(o, PlugValue::Double(7.0)).unwrap();
    e.switch_to_layer(Some(good)).unwrap();
    squat_legacy_node(&mut e, "L1");

    assert!(e.switch_to_layer(Some(broken)).is_err());
    assert_eq!(e.setup().visible_layer(), Some(good));
    assert_eq!(value(&e, "pSphere1.translateX"), PlugValue::Double(7.0));
    assert_eq!(value(&e, "rs_L0.visible"), PlugValue::Bool(true));
}
