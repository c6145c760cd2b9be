use super::*;
use crate::foundation::config::EngineConfig;
use crate::plug::value::PlugValue;
use crate::scene::graph::Scene;
use crate::selector::filter::TypeFilter;
use serde_json::json;

fn engine() -> (Engine, ItemId) {
    let mut s = Scene::new();
    s.create_node("transform", "pSphere1", None).unwrap();
    s.create_node("resolution", "defaultResolution", None).unwrap();
    let mut e = Engine::new(s, EngineConfig::default()).unwrap();
    let layer = e.create_layer("L1").unwrap();
    let c = e.create_collection(layer, "C").unwrap();
    e.set_selector(
        c,
        Selector::simple()
            .with_pattern("pSphere*")
            .with_type_filter(TypeFilter::Transforms),
    )
    .unwrap();
    let o = e
        .create_absolute_override(c, "tx", "pSphere1.translateX")
        .unwrap();
    e.set_absolute_value(o, PlugValue::Double(5.0)).unwrap();
    (e, layer)
}

#[test]
fn document_shape() {
    let (e, _) = engine();
    let doc = serde_json::to_value(e.encode().unwrap()).unwrap();
    assert_eq!(
        doc["renderSetup"]["renderLayers"][0],
        json!({
            "renderSetupLayer": {
                "name": "L1",
                "renderable": true,
                "selfEnabled": true,
                "collections": [{
                    "collection": {
                        "name": "C",
                        "selfEnabled": true,
                        "isolateSelected": false,
                        "selector": {
                            "simpleSelector": {
                                "pattern": "pSphere*",
                                "staticSelection": "",
                                "typeFilter": 1,
                                "customFilterValue": ""
                            }
                        },
                        "children": [{
                            "absoluteOverride": {
                                "name": "tx",
                                "selfEnabled": true,
                                "targetNodeName": "pSphere1",
                                "attribute": "translateX",
                                "attrValue": {"double": 5.0}
                            }
                        }]
                    }
                }]
            }
        })
    );
    assert_eq!(doc["renderSetup"]["visibleRenderLayer"], Value::Null);
}

#[test]
fn visible_layer_is_recorded_by_name() {
    let (mut e, layer) = engine();
    e.switch_to_layer(Some(layer)).unwrap();
    let doc = e.encode().unwrap();
    assert_eq!(doc.render_setup.visible_render_layer.as_deref(), Some("L1"));
}

#[test]
fn scene_settings_are_keyed_by_renderer() {
    let (e, _) = engine();
    let doc = e.encode().unwrap();
    let settings = &doc.scene_settings[DEFAULT_RENDERER];
    assert_eq!(
        settings.default_nodes["defaultResolution"]["width"],
        json!({"int": 640})
    );
    assert_eq!(settings.default_renderer_nodes, json!({}));
    assert_eq!(settings.user_data, json!({}));
}

#[test]
fn connection_family_overrides_store_their_source() {
    let mut s = Scene::new();
    s.create_node("blinn", "blinn1", None).unwrap();
    let mut e = Engine::new(s, EngineConfig::default()).unwrap();
    let layer = e.create_layer("L1").unwrap();
    let c = e.create_collection(layer, "C").unwrap();
    e.create_shader_override(c, "shade", Some("blinn1")).unwrap();
    e.create_connection_override(c, "link", "blinn1.color", None)
        .unwrap();

    let layers = e.encode_layers(&[layer]).unwrap();
    let children = &layers[0]["renderSetupLayer"]["collections"][0]["collection"]["children"];
    assert_eq!(children[0]["shaderOverride"]["source"], json!("blinn1"));
    assert_eq!(children[0]["shaderOverride"]["attribute"], json!("surfaceShader"));
    assert!(children[1]["connectionOverride"].get("source").is_none());
}

#[test]
fn legacy_selectors_encode_as_basic() {
    let doc = encode_selector(&Selector::basic(true).with_pattern("group1"));
    let SelectorDoc::BasicSelector(body) = doc else {
        panic!("expected a basic selector");
    };
    assert_eq!(body.include_hierarchy, Some(true));
    assert_eq!(body.pattern, "group1");
}

#[test]
fn pretty_json_parses_back() {
    let (e, _) = engine();
    let text = e.to_json().unwrap();
    let back: Document = serde_json::from_str(&text).unwrap();
    assert_eq!(back, e.encode().unwrap());
}
