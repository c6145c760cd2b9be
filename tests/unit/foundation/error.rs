use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        RenderSetupError::structural("x")
            .to_string()
            .contains("structural error:")
    );
    assert!(
        RenderSetupError::missing_dependency("x")
            .to_string()
            .contains("missing dependency:")
    );
    assert!(
        RenderSetupError::type_mismatch("x")
            .to_string()
            .contains("type mismatch:")
    );
    assert!(
        RenderSetupError::selector("x")
            .to_string()
            .contains("selector error:")
    );
    assert!(
        RenderSetupError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
    assert!(RenderSetupError::scene("x").to_string().contains("scene error:"));
    assert!(
        RenderSetupError::command("x")
            .to_string()
            .contains("command error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = RenderSetupError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn json_errors_map_to_serde() {
    let e = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: RenderSetupError = e.into();
    assert!(matches!(err, RenderSetupError::Serde(_)));
}
