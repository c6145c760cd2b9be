use super::*;
use crate::foundation::config::EngineConfig;
use crate::scene::graph::Scene;

/// Layers `A` (collections `rocks` on rock*, `hero` on hero1) and `B` (`all` on everything).
fn engine() -> (Engine, ItemId, ItemId) {
    let mut s = Scene::new();
    for name in ["rock1", "rock2", "hero1", "tree1"] {
        s.create_node("transform", name, None).unwrap();
    }
    let mut e = Engine::new(s, EngineConfig::default()).unwrap();
    let a = e.create_layer("A").unwrap();
    let rocks = e.create_collection(a, "rocks").unwrap();
    e.set_selector_pattern(rocks, "rock*").unwrap();
    let hero = e.create_collection(a, "hero").unwrap();
    e.set_selector_pattern(hero, "hero1").unwrap();
    let b = e.create_layer("B").unwrap();
    let all = e.create_collection(b, "all").unwrap();
    e.set_selector_pattern(all, "*").unwrap();
    (e, a, b)
}

#[test]
fn layers_are_listed_in_order() {
    let (e, _, _) = engine();
    assert_eq!(e.render_layers(), vec!["A", "B"]);
}

#[test]
fn legacy_layer_names() {
    let (e, _, _) = engine();
    assert_eq!(e.legacy_layer("A").unwrap(), "rs_A");
    assert_eq!(
        e.legacy_layer(DEFAULT_LEGACY_LAYER).unwrap(),
        DEFAULT_LEGACY_LAYER
    );
    assert!(e.legacy_layer("missing").is_err());
}

#[test]
fn members_filter_by_layer() {
    let (mut e, _, _) = engine();
    let mut inside = e
        .render_layer_members(&["rock1", "hero1", "tree1"], &["A"], false)
        .unwrap();
    inside.sort();
    assert_eq!(inside, vec!["hero1", "rock1"]);

    let outside = e
        .render_layer_members(&["rock1", "hero1", "tree1"], &["A"], true)
        .unwrap();
    assert_eq!(outside, vec!["tree1"]);
}

#[test]
fn default_layer_holds_every_user_node() {
    let (mut e, _, _) = engine();
    let outside = e
        .render_layer_members(&[], &[DEFAULT_LEGACY_LAYER], true)
        .unwrap();
    assert!(outside.is_empty());
}

#[test]
fn unknown_layers_and_objects_are_errors() {
    let (mut e, _, _) = engine();
    assert!(e.render_layer_members(&["rock1"], &["Nope"], false).is_err());
    assert!(e.render_layer_members(&["nope"], &["A"], false).is_err());
    assert!(e.find(&["nope"], &[], false).is_err());
}

#[test]
fn find_lists_collections_in_document_order() {
    let (mut e, _, _) = engine();
    assert_eq!(e.find(&["rock2"], &[], false).unwrap(), vec!["rocks", "all"]);
    assert_eq!(
        e.find(&["rock2", "hero1"], &["A"], true).unwrap(),
        vec!["A", "rocks", "hero"]
    );
    assert!(e.find(&["tree1"], &["A"], true).unwrap().is_empty());
}

#[test]
fn find_in_returns_ids() {
    let (mut e, a, b) = engine();
    let rocks = e.setup().find_by_name("rocks").unwrap();
    assert_eq!(e.find_in(a, &["rock1"], false).unwrap(), vec![rocks]);
    let all = e.setup().find_by_name("all").unwrap();
    assert_eq!(e.find_in(b, &["tree1"], true).unwrap(), vec![b, all]);
}

#[test]
fn queries_on_the_visible_layer_see_new_nodes() {
    let (mut e, a, _) = engine();
    e.switch_to_layer(Some(a)).unwrap();
    e.scene_mut().create_node("transform", "rock3", None).unwrap();
    assert_eq!(e.find(&["rock3"], &["A"], false).unwrap(), vec!["rocks"]);
}
