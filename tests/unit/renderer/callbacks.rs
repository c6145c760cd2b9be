use super::*;

#[test]
fn default_settings_round_trip() {
    let mut scene = Scene::new();
    let cb = DefaultRenderSettings;
    assert!(cb.get_nodes(&scene).is_empty());
    cb.create_default_nodes(&mut scene).unwrap();
    assert_eq!(
        cb.get_nodes(&scene),
        vec!["defaultRenderGlobals".to_string(), "defaultResolution".to_string()]
    );

    let width = scene.plug("defaultResolution.width").unwrap();
    scene.set_value(&width, PlugValue::Int(1920)).unwrap();
    let encoded = cb.encode(&scene).unwrap();
    assert_eq!(encoded["defaultResolution"]["width"], serde_json::json!({"int": 1920}));

    let mut other = Scene::new();
    cb.decode(&mut other, &encoded).unwrap();
    let width = other.plug("defaultResolution.width").unwrap();
    assert_eq!(other.evaluate(&width).unwrap(), PlugValue::Int(1920));
}

#[test]
fn registry_always_has_the_default_renderer() {
    let r = RendererRegistry::default();
    assert!(r.settings(DEFAULT_RENDERER).is_some());
    assert!(r.aovs(DEFAULT_RENDERER).is_none());
    assert!(r.require_aovs("arnold").is_err());
    assert_eq!(r.names().collect::<Vec<_>>(), vec!["default"]);
}

#[test]
fn selector_spec_builds_a_simple_selector() {
    let spec = SelectorSpec {
        pattern: "aiAOV_*".into(),
        type_filter: TypeFilter::Custom,
        custom_filter: "aiAOV".into(),
        static_selection: vec!["defaultArnoldDriver".into()],
    };
    let s = spec.to_selector();
    assert_eq!(s.pattern(), "aiAOV_*");
    assert_eq!(s.type_filter(), TypeFilter::Custom);
    assert_eq!(s.custom_filter(), "aiAOV");
    assert_eq!(s.static_selection().paths(), &["defaultArnoldDriver".to_string()]);
}
