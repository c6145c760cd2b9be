use crate::foundation::ids::{ListenerId, NodeId};
use crate::plug::handle::Plug;

/// Kind tag of a [`SceneEvent`], used to register listeners for one event family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SceneEventKind {
    /// A node was created.
    NodeAdded,
    /// A node was deleted.
    NodeRemoved,
    /// A node was renamed.
    NodeRenamed,
    /// A DAG node moved under a different parent.
    NodeReparented,
    /// A connection was made or broken.
    ConnectionChanged,
    /// A reference was created.
    ReferenceCreated,
    /// A reference's nodes were loaded.
    ReferenceLoaded,
    /// A reference's nodes were unloaded.
    ReferenceUnloaded,
    /// A reference was removed.
    ReferenceRemoved,
}

/// Change notification produced by the scene graph.
///
/// `internal` is set when the change only touches engine-owned nodes (apply-override and legacy
/// layer nodes); those never influence selectors.
#[derive(Clone, Debug, PartialEq)]
pub enum SceneEvent {
    /// A node was created.
    NodeAdded {
        /// New node.
        node: NodeId,
        /// Full path at creation time.
        path: String,
        /// Engine-owned node.
        internal: bool,
    },
    /// A node was deleted.
    NodeRemoved {
        /// Deleted node (no longer resolvable).
        node: NodeId,
        /// Full path before deletion.
        path: String,
        /// Engine-owned node.
        internal: bool,
    },
    /// A node was renamed.
    NodeRenamed {
        /// Renamed node.
        node: NodeId,
        /// Full path before the rename.
        old_path: String,
        /// Full path after the rename.
        new_path: String,
        /// Engine-owned node.
        internal: bool,
    },
    /// A DAG node changed parent.
    NodeReparented {
        /// Moved node.
        node: NodeId,
        /// Full path before the move.
        old_path: String,
        /// Full path after the move.
        new_path: String,
        /// Engine-owned node.
        internal: bool,
    },
    /// A connection was made (`connected`) or broken.
    ConnectionChanged {
        /// Source plug.
        src: Plug,
        /// Destination plug.
        dst: Plug,
        /// `true` when the connection was made.
        connected: bool,
        /// Both ends are engine-owned nodes.
        internal: bool,
    },
    /// A reference was created.
    ReferenceCreated {
        /// Reference namespace.
        namespace: String,
    },
    /// A reference's nodes were loaded.
    ReferenceLoaded {
        /// Reference namespace.
        namespace: String,
    },
    /// A reference's nodes were unloaded.
    ReferenceUnloaded {
        /// Reference namespace.
        namespace: String,
    },
    /// A reference was removed.
    ReferenceRemoved {
        /// Reference namespace.
        namespace: String,
    },
}

impl SceneEvent {
    /// Kind tag of this event.
    pub fn kind(&self) -> SceneEventKind {
        match self {
            SceneEvent::NodeAdded { .. } => SceneEventKind::NodeAdded,
            SceneEvent::NodeRemoved { .. } => SceneEventKind::NodeRemoved,
            SceneEvent::NodeRenamed { .. } => SceneEventKind::NodeRenamed,
            SceneEvent::NodeReparented { .. } => SceneEventKind::NodeReparented,
            SceneEvent::ConnectionChanged { .. } => SceneEventKind::ConnectionChanged,
            SceneEvent::ReferenceCreated { .. } => SceneEventKind::ReferenceCreated,
            SceneEvent::ReferenceLoaded { .. } => SceneEventKind::ReferenceLoaded,
            SceneEvent::ReferenceUnloaded { .. } => SceneEventKind::ReferenceUnloaded,
            SceneEvent::ReferenceRemoved { .. } => SceneEventKind::ReferenceRemoved,
        }
    }

    /// Return `true` when the event only concerns engine-owned nodes.
    pub fn is_internal(&self) -> bool {
        match self {
            SceneEvent::NodeAdded { internal, .. }
            | SceneEvent::NodeRemoved { internal, .. }
            | SceneEvent::NodeRenamed { internal, .. }
            | SceneEvent::NodeReparented { internal, .. }
            | SceneEvent::ConnectionChanged { internal, .. } => *internal,
            _ => false,
        }
    }
}

/// Entry of a scene's pending-event queue.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Pending {
    Event(SceneEvent),
    /// A file or reference load started.
    LoadBegin,
    /// The matching load finished.
    LoadEnd,
}

/// Callback invoked synchronously for each delivered event.
pub type SceneListener = Box<dyn FnMut(&SceneEvent) -> anyhow::Result<()>>;

struct Registration {
    id: ListenerId,
    kind: Option<SceneEventKind>,
    listener: SceneListener,
}

/// Fan-out of scene change events to registered listeners.
///
/// There is one observer per [`crate::Engine`]. Events are dropped while the observer is
/// disabled (the engine disables it while it mutates the scene itself) or while a file or
/// reference load is in progress; listeners catch up in an after-load pass.
pub struct SceneObserver {
    listeners: Vec<Registration>,
    next_id: u32,
    enabled: bool,
    load_depth: u32,
    in_callback: bool,
}

impl Default for SceneObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SceneObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneObserver")
            .field("listeners", &self.listeners.len())
            .field("enabled", &self.enabled)
            .field("load_depth", &self.load_depth)
            .finish()
    }
}

impl SceneObserver {
    /// Enabled observer without listeners.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 1,
            enabled: true,
            load_depth: 0,
            in_callback: false,
        }
    }

    /// Listen to one event kind.
    pub fn register(&mut self, kind: SceneEventKind, listener: SceneListener) -> ListenerId {
        self.push(Some(kind), listener)
    }

    /// Listen to every event.
    pub fn register_all(&mut self, listener: SceneListener) -> ListenerId {
        self.push(None, listener)
    }

    fn push(&mut self, kind: Option<SceneEventKind>, listener: SceneListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Registration { id, kind, listener });
        id
    }

    /// Remove a listener. Returns `false` when the id is unknown.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|r| r.id != id);
        self.listeners.len() != before
    }

    /// Global switch; while off every event is silently dropped.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Current state of the global switch.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return `true` while listeners are being invoked.
    pub fn is_in_callback(&self) -> bool {
        self.in_callback
    }

    /// Return `true` while a file or reference load suppresses notifications.
    pub fn is_loading(&self) -> bool {
        self.load_depth > 0
    }

    pub(crate) fn begin_load(&mut self) {
        self.load_depth += 1;
    }

    pub(crate) fn end_load(&mut self) {
        self.load_depth = self.load_depth.saturating_sub(1);
    }

    /// Deliver one event. Returns `true` when the event was accepted (observer enabled and
    /// not loading), whether or not any listener matched.
    ///
    /// Listener errors are logged and do not stop delivery to the remaining listeners.
    pub fn dispatch(&mut self, event: &SceneEvent) -> bool {
        if !self.enabled || self.load_depth > 0 {
            return false;
        }
        self.in_callback = true;
        let kind = event.kind();
        for reg in &mut self.listeners {
            if reg.kind.is_some_and(|k| k != kind) {
                continue;
            }
            if let Err(e) = (reg.listener)(event) {
                tracing::warn!(listener = reg.id.0, ?kind, "scene listener failed: {e:#}");
            }
        }
        self.in_callback = false;
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/observer.rs"]
mod tests;
