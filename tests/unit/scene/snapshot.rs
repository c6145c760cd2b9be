use super::*;

#[test]
fn parses_minimal_scene_json() {
    let json = r#"{
        "nodes": [
            {
                "path": "|pSphere1",
                "type": "transform",
                "attributes": { "translateX": { "double": 2.0 } }
            },
            { "path": "blinn1", "type": "blinn" }
        ]
    }"#;
    let s = SceneSnapshot::from_reader(json.as_bytes()).unwrap();
    assert_eq!(s.nodes.len(), 2);
    assert!(s.connections.is_empty());
    assert_eq!(
        s.node("|pSphere1").unwrap().attributes["translateX"],
        PlugValue::Double(2.0)
    );
    assert!(!s.nodes[1].internal);
}

#[test]
fn rejects_malformed_json() {
    let err = SceneSnapshot::from_reader("{ nodes: 1 }".as_bytes()).unwrap_err();
    assert!(err.to_string().starts_with("serialization error:"));
}

#[test]
fn without_internal_drops_engine_nodes_and_their_connections() {
    let s = SceneSnapshot {
        nodes: vec![
            NodeSnapshot {
                path: "|pSphere1".to_owned(),
                type_name: "transform".to_owned(),
                internal: false,
                compute: None,
                attributes: BTreeMap::new(),
            },
            NodeSnapshot {
                path: "apply_x".to_owned(),
                type_name: "applyAbsoluteOverride".to_owned(),
                internal: true,
                compute: Some(ApplyKind::Absolute),
                attributes: BTreeMap::new(),
            },
        ],
        connections: vec![ConnectionSnapshot {
            src: "apply_x.out".to_owned(),
            dst: "|pSphere1.translateX".to_owned(),
        }],
    };
    let user = s.without_internal();
    assert_eq!(user.nodes.len(), 1);
    assert!(user.connections.is_empty());
}

#[test]
fn internal_flag_is_omitted_when_false() {
    let s = SceneSnapshot {
        nodes: vec![NodeSnapshot {
            path: "blinn1".to_owned(),
            type_name: "blinn".to_owned(),
            internal: false,
            compute: None,
            attributes: BTreeMap::new(),
        }],
        connections: Vec::new(),
    };
    let json = s.to_json_pretty().unwrap();
    assert!(!json.contains("internal"));
    assert!(!json.contains("compute"));
    assert!(json.contains("\"type\": \"blinn\""));
}
