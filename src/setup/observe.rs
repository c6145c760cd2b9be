use crate::foundation::ids::{ItemId, ListenerId};

/// Change notification for the render-setup tree.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeEvent {
    /// A layer was created or restored.
    LayerAdded {
        /// New layer.
        layer: ItemId,
    },
    /// A layer was deleted.
    LayerRemoved {
        /// Deleted layer.
        layer: ItemId,
        /// Its name.
        name: String,
    },
    /// The visible layer changed (`None` is the default layer).
    VisibleLayerChanged {
        /// Previously visible layer.
        old: Option<ItemId>,
        /// Newly visible layer.
        new: Option<ItemId>,
    },
    /// A collection or override was created or restored.
    ItemAdded {
        /// New item.
        item: ItemId,
        /// Owning layer or collection.
        parent: ItemId,
    },
    /// A collection or override was deleted.
    ItemRemoved {
        /// Deleted item.
        item: ItemId,
        /// Its name.
        name: String,
    },
    /// An item was renamed.
    ItemRenamed {
        /// Renamed item.
        item: ItemId,
        /// Previous name.
        old: String,
        /// New name.
        new: String,
    },
    /// The effective enabled state of an item flipped.
    EnabledChanged {
        /// Item.
        item: ItemId,
        /// New effective state.
        enabled: bool,
    },
    /// A collection's selector was edited or replaced.
    SelectorChanged {
        /// Collection.
        collection: ItemId,
    },
    /// An override's parameters changed.
    OverrideValueChanged {
        /// Override.
        item: ItemId,
    },
    /// The issue list changed.
    IssuesChanged,
}

/// Callback for [`TreeEvent`]s.
pub type TreeListener = Box<dyn FnMut(&TreeEvent)>;

/// Synchronous fan-out of tree events.
#[derive(Default)]
pub struct TreeObservable {
    listeners: Vec<(ListenerId, TreeListener)>,
    next_id: u32,
}

impl std::fmt::Debug for TreeObservable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeObservable")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TreeObservable {
    /// Add a listener.
    pub fn add_listener(&mut self, listener: TreeListener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` when the id is unknown.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    pub(crate) fn notify(&mut self, event: &TreeEvent) {
        tracing::trace!(?event, "tree event");
        for (_, l) in &mut self.listeners {
            l(event);
        }
    }
}

/// Kind of a detected issue; also names its resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssueKind {
    /// Collections still use the legacy basic selector. Resolved by converting them to simple
    /// selectors.
    LegacySelectors,
}

/// One detected problem with the render setup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    /// Kind, which selects the resolver.
    pub kind: IssueKind,
    /// Human-readable description.
    pub description: String,
    /// Affected items.
    pub items: Vec<ItemId>,
}

/// Current issues, at most one per kind.
#[derive(Clone, Debug, Default)]
pub struct Issues {
    issues: Vec<Issue>,
}

impl Issues {
    /// Current issues.
    pub fn list(&self) -> &[Issue] {
        &self.issues
    }

    /// Issue of `kind`.
    pub fn get(&self, kind: IssueKind) -> Option<&Issue> {
        self.issues.iter().find(|i| i.kind == kind)
    }

    /// Return `true` when there is nothing to report.
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Replace the issue of `kind` (`None` clears it). Returns `true` when the list changed.
    pub(crate) fn set(&mut self, kind: IssueKind, issue: Option<Issue>) -> bool {
        let old = self.issues.iter().position(|i| i.kind == kind);
        match (old, issue) {
            (None, None) => false,
            (Some(pos), None) => {
                self.issues.remove(pos);
                true
            }
            (Some(pos), Some(new)) => {
                if self.issues[pos] == new {
                    return false;
                }
                self.issues[pos] = new;
                true
            }
            (None, Some(new)) => {
                self.issues.push(new);
                self.issues.sort_by_key(|i| i.kind);
                true
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/setup/observe.rs"]
mod tests;
