use super::*;
use std::cell::RefCell;
use std::rc::Rc;

fn added(n: u32) -> SceneEvent {
    SceneEvent::NodeAdded {
        node: NodeId(n),
        path: format!("|n{n}"),
        internal: false,
    }
}

fn removed(n: u32) -> SceneEvent {
    SceneEvent::NodeRemoved {
        node: NodeId(n),
        path: format!("|n{n}"),
        internal: false,
    }
}

#[test]
fn listeners_filter_by_kind() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut obs = SceneObserver::new();
    let s = seen.clone();
    obs.register(
        SceneEventKind::NodeAdded,
        Box::new(move |e: &SceneEvent| {
            s.borrow_mut().push(e.kind());
            Ok(())
        }),
    );
    let all = Rc::new(RefCell::new(0usize));
    let a = all.clone();
    obs.register_all(Box::new(move |_| {
        *a.borrow_mut() += 1;
        Ok(())
    }));

    assert!(obs.dispatch(&added(1)));
    assert!(obs.dispatch(&removed(1)));
    assert_eq!(*seen.borrow(), vec![SceneEventKind::NodeAdded]);
    assert_eq!(*all.borrow(), 2);
}

#[test]
fn disabled_and_loading_drop_events() {
    let count = Rc::new(RefCell::new(0usize));
    let mut obs = SceneObserver::new();
    let c = count.clone();
    obs.register_all(Box::new(move |_| {
        *c.borrow_mut() += 1;
        Ok(())
    }));

    obs.set_enabled(false);
    assert!(!obs.dispatch(&added(1)));
    obs.set_enabled(true);
    obs.begin_load();
    assert!(obs.is_loading());
    assert!(!obs.dispatch(&added(2)));
    obs.end_load();
    assert!(obs.dispatch(&added(3)));
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn failing_listener_does_not_stop_delivery() {
    let count = Rc::new(RefCell::new(0usize));
    let mut obs = SceneObserver::new();
    obs.register_all(Box::new(|_| Err(anyhow::anyhow!("boom"))));
    let c = count.clone();
    obs.register_all(Box::new(move |_| {
        *c.borrow_mut() += 1;
        Ok(())
    }));
    obs.dispatch(&added(1));
    assert_eq!(*count.borrow(), 1);
    assert!(!obs.is_in_callback());
}

#[test]
fn unregister_removes_listener() {
    let count = Rc::new(RefCell::new(0usize));
    let mut obs = SceneObserver::new();
    let c = count.clone();
    let id = obs.register_all(Box::new(move |_| {
        *c.borrow_mut() += 1;
        Ok(())
    }));
    assert!(obs.unregister(id));
    assert!(!obs.unregister(id));
    obs.dispatch(&added(1));
    assert_eq!(*count.borrow(), 0);
}

#[test]
fn listener_sees_in_callback_state() {
    let mut obs = SceneObserver::new();
    obs.register_all(Box::new(|e: &SceneEvent| {
        assert!(!e.is_internal());
        Ok(())
    }));
    obs.dispatch(&added(1));
    assert!(!obs.is_in_callback());
}
