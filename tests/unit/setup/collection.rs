use super::*;
use crate::plug::value::PlugValue;

#[test]
fn nesting_rules() {
    use CollectionKind as K;
    let aov = K::AovChild {
        aov_name: "diffuse".into(),
    };
    assert!(K::Standard.accepts_collection(&K::Standard));
    assert!(!K::Standard.accepts_collection(&K::Lights));
    assert!(K::Aovs.accepts_collection(&aov));
    assert!(!K::Aovs.accepts_collection(&K::Standard));
    assert!(K::Lights.accepts_collection(&K::LightsChild));
    assert!(!K::RenderSettings.accepts_collection(&K::Standard));
    assert!(K::Lights.allowed_in_layer());
    assert!(!aov.allowed_in_layer());
    assert!(K::Aovs.is_singleton());
    assert!(!K::Standard.is_singleton());
}

#[test]
fn override_rules() {
    use CollectionKind as K;
    let abs = OverrideKind::Absolute {
        value: PlugValue::Double(1.0),
    };
    let rel = OverrideKind::Relative {
        multiply: PlugValue::Double(1.0),
        offset: PlugValue::Double(0.0),
    };
    let conn = OverrideKind::Connection { source: None };
    let aov = K::AovChild {
        aov_name: "diffuse".into(),
    };
    assert!(K::Standard.accepts_override(&conn));
    assert!(aov.accepts_override(&abs));
    assert!(!aov.accepts_override(&rel));
    assert!(K::Lights.accepts_override(&rel));
    assert!(!K::Lights.accepts_override(&conn));
    assert!(!K::Aovs.accepts_override(&abs));
}

#[test]
fn type_keys() {
    assert_eq!(CollectionKind::Standard.type_key(), "collection");
    assert_eq!(
        CollectionKind::AovChild {
            aov_name: String::new()
        }
        .type_key(),
        "aovChildCollection"
    );
    let c = Collection::new(CollectionKind::Lights, Selector::simple());
    assert!(c.children().is_empty());
    assert!(!c.isolate_selected());
    assert_eq!(c.num_isolated_children(), 0);
}
