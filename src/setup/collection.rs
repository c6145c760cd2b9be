use crate::foundation::ids::ItemId;
use crate::selector::eval::Selector;
use crate::setup::overrides::OverrideKind;

/// Collection flavor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollectionKind {
    /// Plain collection.
    Standard,
    /// Renderer settings nodes (from the active renderer's callbacks).
    RenderSettings,
    /// Parent of the per-AOV collections.
    Aovs,
    /// One AOV of the active renderer.
    AovChild {
        /// AOV name passed to the renderer callbacks.
        aov_name: String,
    },
    /// Every light in the scene.
    Lights,
    /// One light (or light group).
    LightsChild,
}

impl CollectionKind {
    /// Document type key (`collection`, `aovChildCollection`, ...).
    pub fn type_key(&self) -> &'static str {
        match self {
            CollectionKind::Standard => "collection",
            CollectionKind::RenderSettings => "renderSettingsCollection",
            CollectionKind::Aovs => "aovCollection",
            CollectionKind::AovChild { .. } => "aovChildCollection",
            CollectionKind::Lights => "lightsCollection",
            CollectionKind::LightsChild => "lightsChildCollection",
        }
    }

    /// Return `true` for kinds a layer may hold at most once.
    pub fn is_singleton(&self) -> bool {
        matches!(
            self,
            CollectionKind::RenderSettings | CollectionKind::Aovs | CollectionKind::Lights
        )
    }

    /// Return `true` when this kind may sit directly under a layer.
    pub fn allowed_in_layer(&self) -> bool {
        matches!(
            self,
            CollectionKind::Standard
                | CollectionKind::RenderSettings
                | CollectionKind::Aovs
                | CollectionKind::Lights
        )
    }

    /// Return `true` when a collection of this kind may hold a child collection of `child`.
    pub fn accepts_collection(&self, child: &CollectionKind) -> bool {
        match self {
            CollectionKind::Standard => matches!(child, CollectionKind::Standard),
            CollectionKind::Aovs => matches!(child, CollectionKind::AovChild { .. }),
            CollectionKind::Lights => matches!(child, CollectionKind::LightsChild),
            CollectionKind::LightsChild => matches!(child, CollectionKind::Standard),
            CollectionKind::RenderSettings | CollectionKind::AovChild { .. } => false,
        }
    }

    /// Return `true` when a collection of this kind may hold an override of `kind`.
    pub fn accepts_override(&self, kind: &OverrideKind) -> bool {
        match self {
            CollectionKind::Standard => true,
            CollectionKind::AovChild { .. } => matches!(kind, OverrideKind::Absolute { .. }),
            CollectionKind::RenderSettings
            | CollectionKind::Lights
            | CollectionKind::LightsChild => kind.is_value(),
            CollectionKind::Aovs => false,
        }
    }
}

/// Ordered group of child collections and overrides, scoped by a selector.
#[derive(Clone, Debug)]
pub struct Collection {
    pub(crate) kind: CollectionKind,
    pub(crate) children: Vec<ItemId>,
    pub(crate) selector: Selector,
    pub(crate) isolate_selected: bool,
    pub(crate) num_isolated_children: u32,
}

impl Collection {
    /// Empty collection with `selector`.
    pub fn new(kind: CollectionKind, selector: Selector) -> Self {
        Self {
            kind,
            children: Vec::new(),
            selector,
            isolate_selected: false,
            num_isolated_children: 0,
        }
    }

    /// Flavor.
    pub fn kind(&self) -> &CollectionKind {
        &self.kind
    }

    /// Children in declaration order.
    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    /// Selector.
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Isolate-select flag.
    pub fn isolate_selected(&self) -> bool {
        self.isolate_selected
    }

    /// Number of isolated collections below this one.
    pub fn num_isolated_children(&self) -> u32 {
        self.num_isolated_children
    }
}

#[cfg(test)]
#[path = "../../tests/unit/setup/collection.rs"]
mod tests;
