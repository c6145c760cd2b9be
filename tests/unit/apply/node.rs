use super::*;

fn node_of(scene: &mut Scene, kind: ApplyKind, ty: PlugType) -> NodeId {
    create(scene, kind, "apply1", ty, true).unwrap()
}

#[test]
fn absolute_switches_on_enabled() {
    let mut s = Scene::new();
    let n = node_of(&mut s, ApplyKind::Absolute, PlugType::Double);
    s.write_stored(&Plug::new(n, ORIGINAL), PlugValue::Double(1.0))
        .unwrap();
    s.write_stored(&Plug::new(n, VALUE), PlugValue::Double(5.0))
        .unwrap();
    assert_eq!(s.evaluate(&Plug::new(n, OUT)).unwrap(), PlugValue::Double(5.0));

    set_enabled(&mut s, n, false).unwrap();
    assert_eq!(s.evaluate(&Plug::new(n, OUT)).unwrap(), PlugValue::Double(1.0));
}

#[test]
fn relative_is_affine_and_keeps_type() {
    let mut s = Scene::new();
    let n = node_of(&mut s, ApplyKind::Relative, PlugType::Color);
    assert_eq!(
        s.attribute(&Plug::new(n, MULTIPLY)).unwrap().value,
        PlugValue::Double3([1.0, 1.0, 1.0])
    );
    s.write_stored(&Plug::new(n, ORIGINAL), PlugValue::Color([0.5, 0.25, 1.0]))
        .unwrap();
    s.write_stored(&Plug::new(n, MULTIPLY), PlugValue::Double3([2.0, 2.0, 0.5]))
        .unwrap();
    s.write_stored(&Plug::new(n, OFFSET), PlugValue::Double3([0.0, 0.5, 0.0]))
        .unwrap();
    assert_eq!(
        s.evaluate(&Plug::new(n, OUT)).unwrap(),
        PlugValue::Color([1.0, 1.0, 0.5])
    );
}

#[test]
fn connection_reads_target_when_enabled() {
    let mut s = Scene::new();
    let t1 = s.create_node("file", "texture1", None).unwrap();
    let t2 = s.create_node("file", "texture2", None).unwrap();
    s.write_stored(&Plug::new(t2, "outColor"), PlugValue::Color([0.0, 1.0, 0.0]))
        .unwrap();
    let n = node_of(&mut s, ApplyKind::Connection, PlugType::Color);
    s.connect(&Plug::new(t1, "outColor"), &Plug::new(n, ORIGINAL))
        .unwrap();
    s.connect(&Plug::new(t2, "outColor"), &Plug::new(n, TARGET))
        .unwrap();
    assert_eq!(
        s.evaluate(&Plug::new(n, OUT)).unwrap(),
        PlugValue::Color([0.0, 1.0, 0.0])
    );
    set_enabled(&mut s, n, false).unwrap();
    assert_eq!(
        s.evaluate(&Plug::new(n, OUT)).unwrap(),
        PlugValue::Color([0.0, 0.0, 0.0])
    );
}

#[test]
fn nodes_are_internal_and_typed() {
    let mut s = Scene::new();
    let n = node_of(&mut s, ApplyKind::Connection, PlugType::Message);
    let node = s.node(n).unwrap();
    assert!(node.is_internal());
    assert_eq!(node.type_name(), "applyConnectionOverride");
    assert_eq!(node.compute(), Some(ApplyKind::Connection));
    assert_eq!(relative_param_type(PlugType::Int), PlugType::Double);
    assert_eq!(relative_param_type(PlugType::Short2), PlugType::Double2);
}
