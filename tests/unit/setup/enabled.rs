use super::*;
use crate::plug::value::{PlugType, PlugValue};
use crate::selector::eval::Selector;
use crate::setup::collection::{Collection, CollectionKind};
use crate::setup::layer::RenderLayer;
use crate::setup::overrides::{Override, OverrideKind};
use crate::setup::tree::Item;

struct Fixture {
    rs: RenderSetup,
    layer: ItemId,
    a: ItemId,
    a_child: ItemId,
    b: ItemId,
    o_a: ItemId,
    o_b: ItemId,
}

fn fixture() -> Fixture {
    let mut rs = RenderSetup::new();
    let layer = rs
        .insert(Item::new("L1", ItemKind::Layer(RenderLayer::default())), None, None)
        .unwrap();
    let coll = |rs: &mut RenderSetup, parent: ItemId, name: &str| {
        let c = Collection::new(CollectionKind::Standard, Selector::simple());
        rs.insert(Item::new(name, ItemKind::Collection(c)), Some(parent), None)
            .unwrap()
    };
    let a = coll(&mut rs, layer, "a");
    let a_child = coll(&mut rs, a, "a_child");
    let b = coll(&mut rs, layer, "b");
    let ov = |rs: &mut RenderSetup, parent: ItemId, name: &str| {
        let o = Override::new(
            OverrideKind::Absolute {
                value: PlugValue::Double(1.0),
            },
            "translateX",
            "pSphere1",
            PlugType::Double,
        )
        .unwrap();
        rs.insert(Item::new(name, ItemKind::Override(o)), Some(parent), None)
            .unwrap()
    };
    let o_a = ov(&mut rs, a_child, "o_a");
    let o_b = ov(&mut rs, b, "o_b");
    Fixture {
        rs,
        layer,
        a,
        a_child,
        b,
        o_a,
        o_b,
    }
}

fn enabled(rs: &RenderSetup, id: ItemId) -> bool {
    rs.get(id).unwrap().is_enabled()
}

#[test]
fn self_disabled_propagates_down() {
    let mut f = fixture();
    assert!(refresh(&mut f.rs, f.layer).unwrap().is_empty());

    f.rs.get_mut(f.a).unwrap().self_enabled = false;
    let changed = refresh(&mut f.rs, f.layer).unwrap();
    assert_eq!(changed, vec![f.a, f.a_child, f.o_a]);
    assert!(!enabled(&f.rs, f.o_a));
    assert!(enabled(&f.rs, f.o_b));

    f.rs.get_mut(f.layer).unwrap().self_enabled = false;
    refresh(&mut f.rs, f.layer).unwrap();
    assert!(!enabled(&f.rs, f.o_b));
}

#[test]
fn isolate_disables_siblings_off_the_path() {
    let mut f = fixture();
    f.rs.collection_mut(f.a_child).unwrap().isolate_selected = true;
    let changed = refresh(&mut f.rs, f.layer).unwrap();
    assert_eq!(changed, vec![f.b, f.o_b]);

    assert_eq!(f.rs.layer_at(f.layer).unwrap().num_isolated_children(), 1);
    assert_eq!(f.rs.collection_at(f.a).unwrap().num_isolated_children(), 1);
    assert_eq!(f.rs.collection_at(f.a_child).unwrap().num_isolated_children(), 0);
    assert!(enabled(&f.rs, f.a));
    assert!(enabled(&f.rs, f.o_a));
}

#[test]
fn disabled_ancestor_wins_over_isolate() {
    let mut f = fixture();
    f.rs.collection_mut(f.a_child).unwrap().isolate_selected = true;
    f.rs.get_mut(f.a).unwrap().self_enabled = false;
    refresh(&mut f.rs, f.layer).unwrap();
    assert!(!enabled(&f.rs, f.a_child));
    assert!(!enabled(&f.rs, f.o_a));
    assert!(!enabled(&f.rs, f.b));
}

#[test]
fn descendants_of_isolated_collection_stay_enabled() {
    let mut f = fixture();
    f.rs.collection_mut(f.a).unwrap().isolate_selected = true;
    refresh(&mut f.rs, f.layer).unwrap();
    assert!(enabled(&f.rs, f.a_child));
    assert!(enabled(&f.rs, f.o_a));
    assert!(!enabled(&f.rs, f.b));

    f.rs.collection_mut(f.a).unwrap().isolate_selected = false;
    let changed = refresh(&mut f.rs, f.layer).unwrap();
    assert_eq!(changed, vec![f.b, f.o_b]);
}
