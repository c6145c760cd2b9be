use super::*;

#[test]
fn empty_object_uses_defaults() {
    let cfg = EngineConfig::from_reader("{}".as_bytes()).unwrap();
    assert_eq!(cfg, EngineConfig::default());
    assert_eq!(cfg.merge_prefix, "imported_");
    assert_eq!(cfg.undo_depth, 256);
}

#[test]
fn camel_case_fields_are_read() {
    let cfg = EngineConfig::from_reader(
        r#"{ "mergePrefix": "ref_", "autoConvertLegacySelectors": true, "renderer": "arnold" }"#
            .as_bytes(),
    )
    .unwrap();
    assert_eq!(cfg.merge_prefix, "ref_");
    assert!(cfg.auto_convert_legacy_selectors);
    assert_eq!(cfg.renderer, "arnold");
    assert!(cfg.warn_on_sibling_conflicts);
}

#[test]
fn invalid_values_are_rejected() {
    assert!(EngineConfig::from_reader(r#"{ "undoDepth": 0 }"#.as_bytes()).is_err());
    assert!(EngineConfig::from_reader(r#"{ "renderer": " " }"#.as_bytes()).is_err());
    assert!(EngineConfig::from_reader(r#"{ "mergePrefix": "a b" }"#.as_bytes()).is_err());
}
