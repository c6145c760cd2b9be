use super::*;
use crate::foundation::config::EngineConfig;
use crate::selector::eval::SelectorKind;
use crate::selector::filter::TypeFilter;
use serde_json::json;

fn scene() -> Scene {
    let mut s = Scene::new();
    s.create_node("transform", "pSphere1", None).unwrap();
    s.create_node("transform", "pSphere2", None).unwrap();
    s
}

fn engine() -> Engine {
    Engine::new(scene(), EngineConfig::default()).unwrap()
}

fn layer(name: &str, collections: Value) -> Value {
    json!({"renderSetupLayer": {"name": name, "collections": collections}})
}

fn collection(name: &str, pattern: &str, children: Value) -> Value {
    json!({"collection": {
        "name": name,
        "selector": {"simpleSelector": {"pattern": pattern, "typeFilter": 1}},
        "children": children,
    }})
}

fn absolute(name: &str, attr: &str, value: f64) -> Value {
    json!({"absoluteOverride": {
        "name": name,
        "targetNodeName": "pSphere1",
        "attribute": attr,
        "attrValue": {"double": value},
    }})
}

fn document(layers: Vec<Value>, visible: Option<&str>) -> Value {
    json!({"renderSetup": {"renderLayers": layers, "visibleRenderLayer": visible}})
}

#[test]
fn full_document_decodes_and_applies_the_visible_layer() {
    let mut e = engine();
    let doc = document(
        vec![layer(
            "L1",
            json!([collection("C", "pSphere*", json!([absolute("tx", "translateX", 5.0)]))]),
        )],
        Some("L1"),
    );
    let report = e.decode(&doc, MergeMode::Overwrite).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.layers, vec!["L1"]);

    let l1 = e.setup().layer_by_name("L1").unwrap();
    assert_eq!(e.setup().visible_layer(), Some(l1));
    assert_eq!(
        e.plug_value("pSphere2.translateX").unwrap(),
        PlugValue::Double(5.0)
    );
    let c = e.setup().find_by_name("C").unwrap();
    let sel = e.setup().collection_at(c).unwrap().selector();
    assert_eq!(sel.type_filter(), TypeFilter::Transforms);
    assert_eq!(sel.kind(), SelectorKind::Simple);
}

#[test]
fn encode_decode_round_trip() {
    let mut e = engine();
    let doc = document(
        vec![
            layer(
                "A",
                json!([collection("C", "pSphere1", json!([absolute("tx", "translateX", 2.0)]))]),
            ),
            layer("B", json!([])),
        ],
        None,
    );
    e.decode(&doc, MergeMode::Overwrite).unwrap();
    let first = e.encode().unwrap();

    let mut other = engine();
    other
        .decode(&serde_json::to_value(&first).unwrap(), MergeMode::Overwrite)
        .unwrap();
    assert_eq!(other.encode().unwrap(), first);
}

#[test]
fn overwrite_replaces_and_is_undoable() {
    let mut e = engine();
    e.create_layer("Old").unwrap();
    e.decode(&document(vec![layer("New", json!([]))], None), MergeMode::Overwrite)
        .unwrap();
    assert_eq!(e.render_layers(), vec!["New"]);
    assert!(e.scene().find("rs_Old").is_none());

    e.undo().unwrap();
    assert_eq!(e.render_layers(), vec!["Old"]);
    assert!(e.scene().find("rs_New").is_none());
}

#[test]
fn merge_reuses_layers_and_prefixes_collisions() {
    let mut e = engine();
    let l1 = e.create_layer("L1").unwrap();
    e.create_collection(l1, "C").unwrap();

    let doc = json!([layer("L1", json!([collection("C", "pSphere1", json!([]))]))]);
    let report = e.decode(&doc, MergeMode::Merge).unwrap();
    assert_eq!(report.layers, vec!["L1"]);
    assert_eq!(e.render_layers(), vec!["L1"]);
    let names: Vec<&str> = e
        .setup()
        .children(l1)
        .iter()
        .map(|c| e.setup().get(*c).unwrap().name())
        .collect();
    assert_eq!(names, vec!["C", "imported_C"]);
}

#[test]
fn rename_prefixes_every_item() {
    let mut e = engine();
    e.create_layer("L1").unwrap();
    let doc = json!([layer("L1", json!([collection("C", "pSphere1", json!([]))]))]);
    let report = e.decode(&doc, MergeMode::Rename).unwrap();
    assert_eq!(report.layers, vec!["imported_L1"]);
    assert_eq!(e.render_layers(), vec!["L1", "imported_L1"]);
    assert!(e.setup().find_by_name("imported_C").is_some());
}

#[test]
fn bad_nodes_become_warnings() {
    let mut e = engine();
    let doc = document(
        vec![layer(
            "L1",
            json!([
                collection("C", "pSphere1", json!([
                    {"absoluteOverride": {"name": "broken", "attribute": "translateX"}},
                    absolute("tx", "translateX", 1.0),
                ])),
                {"mysteryNode": {"name": "?"}},
            ]),
        )],
        None,
    );
    let report = e.decode(&doc, MergeMode::Overwrite).unwrap();
    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings[0].contains("attrValue"));
    assert!(e.setup().find_by_name("tx").is_some());
    assert!(e.setup().find_by_name("broken").is_none());
}

#[test]
fn bare_setup_dictionary_is_accepted() {
    let mut e = engine();
    let doc = json!({"renderLayers": [layer("L1", json!([]))]});
    e.decode(&doc, MergeMode::Overwrite).unwrap();
    assert_eq!(e.render_layers(), vec!["L1"]);
}

#[test]
fn other_shapes_are_rejected() {
    let mut e = engine();
    assert!(e.decode(&json!({"layers": []}), MergeMode::Overwrite).is_err());
    assert!(e.decode(&json!(3), MergeMode::Overwrite).is_err());
    assert!(e.import_json("{not json", MergeMode::Overwrite).is_err());
    assert!(!e.can_undo());
}

#[test]
fn attribute_type_falls_back_to_the_parameters() {
    let mut e = engine();
    let doc = json!([layer("L1", json!([collection("C", "ghost*", json!([
        {"absoluteOverride": {
            "name": "gone",
            "targetNodeName": "ghost1",
            "attribute": "intensity",
            "attrValue": {"float": 2.0},
        }},
        {"shaderOverride": {"name": "shade", "source": "blinn1"}},
    ]))]))]);
    e.decode(&doc, MergeMode::Overwrite).unwrap();

    let gone = e.setup().find_by_name("gone").unwrap();
    assert_eq!(e.setup().override_at(gone).unwrap().attr_type(), PlugType::Float);
    let shade = e.setup().find_by_name("shade").unwrap();
    let ov = e.setup().override_at(shade).unwrap();
    assert_eq!(ov.attribute(), "surfaceShader");
    assert_eq!(ov.kind(), &OverrideKind::Shader { shader: Some("blinn1".into()) });
}

#[test]
fn scene_settings_restore_the_default_nodes() {
    let mut e = engine();
    let doc = json!({
        "sceneSettings": {"default": {
            "userData": {},
            "defaultNodes": {"defaultResolution": {"width": {"int": 1920}}},
            "defaultRendererNodes": {},
        }},
        "renderSetup": {"renderLayers": []},
    });
    let report = e.decode(&doc, MergeMode::Overwrite).unwrap();
    assert!(report.is_clean());
    assert_eq!(
        e.plug_value("defaultResolution.width").unwrap(),
        PlugValue::Int(1920)
    );
}

#[test]
fn legacy_collections_are_migrated_before_decoding() {
    let mut e = engine();
    let doc = json!([layer("L1", json!([
        {"collection": {
            "name": "old",
            "expression": "pSphere1",
            "typeFilter": 1,
            "children": [absolute("tx", "translateX", 3.0)],
        }}
    ]))]);
    let report = e.decode(&doc, MergeMode::Overwrite).unwrap();
    assert_eq!(report.migrated, 1);
    let old = e.setup().find_by_name("old").unwrap();
    assert_eq!(
        e.setup().collection_at(old).unwrap().selector().pattern(),
        "pSphere1"
    );
    let tx = e.setup().find_by_name("tx").unwrap();
    assert_eq!(e.setup().parent_collection(tx), Some(old));
}

#[test]
fn migrated_hierarchy_reaches_referenced_children() {
    let mut contents = Scene::new();
    let group = contents.create_node("transform", "group1", None).unwrap();
    contents.create_node("transform", "ball", Some(group)).unwrap();
    let mut e = engine();
    e.edit_scene(|s| s.create_reference("ref", contents.snapshot()))
        .unwrap();

    let doc = document(
        vec![layer(
            "L1",
            json!([{"collection": {
                "name": "env",
                "expression": "::group1",
                "typeFilter": 1,
                "includeHierarchy": true,
                "children": [absolute("tx", "translateX", 4.0)],
            }}]),
        )],
        Some("L1"),
    );
    let report = e.decode(&doc, MergeMode::Overwrite).unwrap();
    assert_eq!(report.migrated, 1);
    assert!(e.setup().find_by_name("env_hierarchy").is_some());
    assert_eq!(
        e.plug_value("ref:ball.translateX").unwrap(),
        PlugValue::Double(4.0)
    );
    assert_eq!(
        e.plug_value("pSphere1.translateX").unwrap(),
        PlugValue::Double(0.0)
    );
}

#[test]
fn selector_dictionaries_decode_every_field() {
    let doc: SelectorDoc = serde_json::from_value(json!({"basicSelector": {
        "pattern": "group*",
        "staticSelection": "a\nb",
        "typeFilter": 11,
        "customFilterValue": "mesh",
        "includeHierarchy": true,
    }}))
    .unwrap();
    let sel = decode_selector(doc);
    assert_eq!(sel.kind(), SelectorKind::Basic { include_hierarchy: true });
    assert_eq!(sel.pattern(), "group*");
    assert_eq!(sel.static_selection().paths(), &["a".to_owned(), "b".to_owned()]);
    assert_eq!(sel.type_filter(), TypeFilter::Custom);
    assert_eq!(sel.custom_filter(), "mesh");
}
