use super::*;
use crate::plug::handle::Plug;

fn spheres() -> Scene {
    let mut s = Scene::new();
    for i in 1..=3 {
        let xf = s.create_node("transform", &format!("pSphere{i}"), None).unwrap();
        s.create_node("mesh", &format!("pSphereShape{i}"), Some(xf))
            .unwrap();
    }
    s
}

#[test]
fn negated_pattern_yields_expected_names() {
    let s = spheres();
    let mut sel = Selector::simple()
        .with_pattern("pSphere* -pSphere2")
        .with_type_filter(TypeFilter::Transforms);
    assert!(sel.refresh(&s, None));
    let names: Vec<String> = sel.names(&s).into_iter().collect();
    assert_eq!(names, vec!["pSphere1", "pSphere3"]);
    assert!(!sel.is_dirty());
}

#[test]
fn invalid_pattern_is_empty_and_not_fatal() {
    let s = spheres();
    let mut sel = Selector::simple().with_pattern("pSphere?");
    sel.refresh(&s, None);
    assert!(sel.members().is_empty());
    assert!(sel.pattern_error().is_some());

    sel.set_pattern("pSphere1");
    sel.refresh(&s, None);
    assert_eq!(sel.members().len(), 1);
    assert!(sel.pattern_error().is_none());
}

#[test]
fn static_selection_adds_members_and_respects_filter() {
    let s = spheres();
    let mut sel = Selector::simple()
        .with_static_selection(StaticSelection::new([
            "|pSphere2",
            "|pSphere2|pSphereShape2",
            "|missing",
        ]))
        .with_type_filter(TypeFilter::Shapes);
    sel.refresh(&s, None);
    assert_eq!(sel.members(), [s.find("pSphereShape2").unwrap()]);

    let entries = sel.static_entries(&s);
    assert!(entries[0].filtered_out);
    assert!(entries[2].missing);
}

#[test]
fn basic_selector_expands_hierarchy_before_filtering() {
    let s = spheres();
    let mut flat = Selector::basic(false)
        .with_pattern("pSphere1")
        .with_type_filter(TypeFilter::Shapes);
    flat.refresh(&s, None);
    assert!(flat.members().is_empty());

    let mut deep = Selector::basic(true)
        .with_pattern("pSphere1")
        .with_type_filter(TypeFilter::Shapes);
    deep.refresh(&s, None);
    assert_eq!(deep.members(), [s.find("pSphereShape1").unwrap()]);
    assert!(deep.is_legacy());
}

#[test]
fn deactivated_selector_ignores_scene_dirtying() {
    let mut s = spheres();
    let mut sel = Selector::simple()
        .with_pattern("pSphere*")
        .with_type_filter(TypeFilter::Transforms);
    sel.refresh(&s, None);
    assert_eq!(sel.members().len(), 3);

    sel.deactivate();
    s.create_node("transform", "pSphere4", None).unwrap();
    sel.mark_dirty();
    assert!(!sel.is_dirty());
    assert!(!sel.refresh(&s, None));
    assert_eq!(sel.members().len(), 3);

    sel.activate();
    sel.mark_dirty();
    assert!(sel.refresh(&s, None));
    assert_eq!(sel.members().len(), 4);
}

#[test]
fn unchanged_scene_gives_unchanged_members() {
    let mut s = spheres();
    let mut sel = Selector::simple().with_pattern("pSphere*");
    sel.refresh(&s, None);
    let before = sel.names(&s);

    let tx = s.plug("pSphere1.translateX").unwrap();
    s.set_value(&tx, crate::plug::value::PlugValue::Double(3.0))
        .unwrap();
    sel.mark_dirty();
    assert!(!sel.refresh(&s, None));
    assert_eq!(sel.names(&s), before);
}

#[test]
fn nested_universe_adds_shading_network_for_shading_filters() {
    let mut s = spheres();
    let blinn = s.create_node("blinn", "blinn1", None).unwrap();
    let other = s.create_node("blinn", "blinn2", None).unwrap();
    let sg = s.create_node("shadingEngine", "blinn1SG", None).unwrap();
    let shape = s.find("pSphereShape1").unwrap();
    s.connect(&Plug::new(blinn, "outColor"), &Plug::new(sg, "surfaceShader"))
        .unwrap();
    s.connect(&Plug::new(sg, "message"), &Plug::new(shape, "shadingEngine"))
        .unwrap();

    let parent = [s.find("pSphere1").unwrap()];
    let mut shaders = Selector::simple()
        .with_pattern("*")
        .with_type_filter(TypeFilter::Shaders);
    shaders.refresh(&s, Some(&parent));
    assert_eq!(shaders.members(), [blinn]);
    assert!(!shaders.members().contains(&other));

    let mut everything = Selector::simple().with_pattern("*");
    everything.refresh(&s, Some(&parent));
    assert_eq!(everything.members().len(), 2);
    assert!(!everything.members().contains(&sg));
    assert!(!everything.members().contains(&blinn));
}

#[test]
fn static_paths_follow_renames() {
    let s = spheres();
    let mut sel = Selector::simple().with_static_selection(StaticSelection::new(["|pSphere1"]));
    sel.refresh(&s, None);
    sel.rename_static_paths("|pSphere1", "|ball");
    assert!(sel.is_dirty());
    assert_eq!(sel.static_selection().paths(), ["|ball"]);
}
