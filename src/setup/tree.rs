use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::ItemId;
use crate::setup::collection::{Collection, CollectionKind};
use crate::setup::layer::RenderLayer;
use crate::setup::overrides::{Override, OverrideKind};
use std::collections::BTreeMap;

/// Payload of a render-setup item.
#[derive(Clone, Debug)]
pub enum ItemKind {
    /// Render layer.
    Layer(RenderLayer),
    /// Collection.
    Collection(Collection),
    /// Override.
    Override(Override),
}

/// One layer, collection or override in the [`RenderSetup`] arena.
#[derive(Clone, Debug)]
pub struct Item {
    pub(crate) id: ItemId,
    pub(crate) name: String,
    pub(crate) notes: String,
    pub(crate) parent: Option<ItemId>,
    pub(crate) self_enabled: bool,
    pub(crate) enabled: bool,
    pub(crate) kind: ItemKind,
}

impl Item {
    pub(crate) fn new(name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: ItemId(0),
            name: name.into(),
            notes: String::new(),
            parent: None,
            self_enabled: true,
            enabled: true,
            kind,
        }
    }

    /// Id.
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Name, unique across the render setup.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form notes.
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Owning layer or collection.
    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    /// User-writable enabled flag.
    pub fn self_enabled(&self) -> bool {
        self.self_enabled
    }

    /// Effective enabled state: self-enabled, every ancestor enabled, and not excluded by an
    /// isolate-select elsewhere in the layer.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Payload.
    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    /// Layer payload.
    pub fn as_layer(&self) -> Option<&RenderLayer> {
        match &self.kind {
            ItemKind::Layer(l) => Some(l),
            _ => None,
        }
    }

    /// Collection payload.
    pub fn as_collection(&self) -> Option<&Collection> {
        match &self.kind {
            ItemKind::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// Override payload.
    pub fn as_override(&self) -> Option<&Override> {
        match &self.kind {
            ItemKind::Override(o) => Some(o),
            _ => None,
        }
    }

    pub(crate) fn as_collection_mut(&mut self) -> Option<&mut Collection> {
        match &mut self.kind {
            ItemKind::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn as_override_mut(&mut self) -> Option<&mut Override> {
        match &mut self.kind {
            ItemKind::Override(o) => Some(o),
            _ => None,
        }
    }

    pub(crate) fn as_layer_mut(&mut self) -> Option<&mut RenderLayer> {
        match &mut self.kind {
            ItemKind::Layer(l) => Some(l),
            _ => None,
        }
    }

    fn children(&self) -> &[ItemId] {
        match &self.kind {
            ItemKind::Layer(l) => &l.children,
            ItemKind::Collection(c) => &c.children,
            ItemKind::Override(_) => &[],
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<ItemId>> {
        match &mut self.kind {
            ItemKind::Layer(l) => Some(&mut l.children),
            ItemKind::Collection(c) => Some(&mut c.children),
            ItemKind::Override(_) => None,
        }
    }
}

/// Items detached from the tree by a delete, kept for undo.
#[derive(Clone, Debug)]
pub struct RemovedSubtree {
    pub(crate) items: Vec<Item>,
    pub(crate) parent: Option<ItemId>,
    pub(crate) position: usize,
}

impl RemovedSubtree {
    /// Root of the removed subtree.
    pub fn root(&self) -> Option<ItemId> {
        self.items.first().map(|i| i.id)
    }
}

/// Root of the declarative override tree: every layer, collection and override lives here.
#[derive(Clone, Debug)]
pub struct RenderSetup {
    items: BTreeMap<ItemId, Item>,
    layers: Vec<ItemId>,
    pub(crate) visible: Option<ItemId>,
    pub(crate) default_renderable: bool,
    next_id: u32,
}

impl Default for RenderSetup {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn validate_item_name(name: &str) -> RenderSetupResult<()> {
    let Some(first) = name.chars().next() else {
        return Err(RenderSetupError::structural("name must be non-empty"));
    };
    if first.is_ascii_digit() {
        return Err(RenderSetupError::structural(format!(
            "name '{name}' must not start with a digit"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RenderSetupError::structural(format!(
            "name '{name}' may only contain [A-Za-z0-9_]"
        )));
    }
    Ok(())
}

impl RenderSetup {
    /// Empty render setup; the default layer is visible.
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
            layers: Vec::new(),
            visible: None,
            default_renderable: true,
            next_id: 1,
        }
    }

    /// Look up an item.
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Look up an item, with a structural error when it does not exist.
    pub fn get(&self, id: ItemId) -> RenderSetupResult<&Item> {
        self.items
            .get(&id)
            .ok_or_else(|| RenderSetupError::structural(format!("unknown item {id}")))
    }

    pub(crate) fn get_mut(&mut self, id: ItemId) -> RenderSetupResult<&mut Item> {
        self.items
            .get_mut(&id)
            .ok_or_else(|| RenderSetupError::structural(format!("unknown item {id}")))
    }

    /// Layer payload of `id`.
    pub fn layer_at(&self, id: ItemId) -> RenderSetupResult<&RenderLayer> {
        self.get(id)?
            .as_layer()
            .ok_or_else(|| RenderSetupError::structural(format!("{id} is not a render layer")))
    }

    /// Collection payload of `id`.
    pub fn collection_at(&self, id: ItemId) -> RenderSetupResult<&Collection> {
        self.get(id)?
            .as_collection()
            .ok_or_else(|| RenderSetupError::structural(format!("{id} is not a collection")))
    }

    /// Override payload of `id`.
    pub fn override_at(&self, id: ItemId) -> RenderSetupResult<&Override> {
        self.get(id)?
            .as_override()
            .ok_or_else(|| RenderSetupError::structural(format!("{id} is not an override")))
    }

    pub(crate) fn layer_mut(&mut self, id: ItemId) -> RenderSetupResult<&mut RenderLayer> {
        self.get_mut(id)?
            .as_layer_mut()
            .ok_or_else(|| RenderSetupError::structural(format!("{id} is not a render layer")))
    }

    pub(crate) fn collection_mut(&mut self, id: ItemId) -> RenderSetupResult<&mut Collection> {
        self.get_mut(id)?
            .as_collection_mut()
            .ok_or_else(|| RenderSetupError::structural(format!("{id} is not a collection")))
    }

    pub(crate) fn override_mut(&mut self, id: ItemId) -> RenderSetupResult<&mut Override> {
        self.get_mut(id)?
            .as_override_mut()
            .ok_or_else(|| RenderSetupError::structural(format!("{id} is not an override")))
    }

    /// Layers in declaration order.
    pub fn layers(&self) -> &[ItemId] {
        &self.layers
    }

    /// Visible layer, `None` when the default layer is visible.
    pub fn visible_layer(&self) -> Option<ItemId> {
        self.visible
    }

    /// Whether the default layer is renderable.
    pub fn default_renderable(&self) -> bool {
        self.default_renderable
    }

    /// Find any item by name.
    pub fn find_by_name(&self, name: &str) -> Option<ItemId> {
        self.items.values().find(|i| i.name == name).map(|i| i.id)
    }

    /// Find a layer by name.
    pub fn layer_by_name(&self, name: &str) -> Option<ItemId> {
        self.layers
            .iter()
            .copied()
            .find(|id| self.items.get(id).is_some_and(|i| i.name == name))
    }

    /// Children of a layer or collection (empty for overrides).
    pub fn children(&self, id: ItemId) -> &[ItemId] {
        self.items.get(&id).map(Item::children).unwrap_or(&[])
    }

    /// Ancestors from the parent up to the layer.
    pub fn ancestors(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut cur = self.items.get(&id).and_then(|i| i.parent);
        while let Some(p) = cur {
            out.push(p);
            cur = self.items.get(&p).and_then(|i| i.parent);
        }
        out
    }

    /// Layer an item belongs to (itself for layers).
    pub fn layer_of(&self, id: ItemId) -> Option<ItemId> {
        let item = self.items.get(&id)?;
        if item.as_layer().is_some() {
            return Some(id);
        }
        self.ancestors(id).last().copied()
    }

    /// Items below `id` in pre-order (document order), `id` excluded.
    pub fn descendants(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack: Vec<ItemId> = self.children(id).iter().rev().copied().collect();
        while let Some(c) = stack.pop() {
            out.push(c);
            stack.extend(self.children(c).iter().rev().copied());
        }
        out
    }

    /// Document position of every item in `layer` (pre-order, collections and overrides).
    pub fn order_map(&self, layer: ItemId) -> BTreeMap<ItemId, usize> {
        self.descendants(layer)
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect()
    }

    /// Collections below `id` in document order.
    pub fn collections_recursive(&self, id: ItemId) -> Vec<ItemId> {
        self.descendants(id)
            .into_iter()
            .filter(|c| self.items.get(c).is_some_and(|i| i.as_collection().is_some()))
            .collect()
    }

    /// Overrides below `id` in document order.
    pub fn overrides_recursive(&self, id: ItemId) -> Vec<ItemId> {
        self.descendants(id)
            .into_iter()
            .filter(|c| self.items.get(c).is_some_and(|i| i.as_override().is_some()))
            .collect()
    }

    /// Collection owning an override or nested collection.
    pub fn parent_collection(&self, id: ItemId) -> Option<ItemId> {
        let p = self.items.get(&id)?.parent?;
        self.items.get(&p)?.as_collection().map(|_| p)
    }

    /// `base` if free, else `base1`, `base2`, ...
    pub fn unique_name(&self, base: &str) -> String {
        if self.find_by_name(base).is_none() {
            return base.to_owned();
        }
        let stem = base.trim_end_matches(|c: char| c.is_ascii_digit());
        let stem = if stem.is_empty() { base } else { stem };
        (1..)
            .map(|n| format!("{stem}{n}"))
            .find(|n| self.find_by_name(n).is_none())
            .unwrap_or_else(|| base.to_owned())
    }

    /// Attach a new item under `parent` (or as a layer) at `position` (append when `None`).
    pub(crate) fn insert(
        &mut self,
        mut item: Item,
        parent: Option<ItemId>,
        position: Option<usize>,
    ) -> RenderSetupResult<ItemId> {
        validate_item_name(&item.name)?;
        if self.find_by_name(&item.name).is_some() {
            return Err(RenderSetupError::structural(format!(
                "name '{}' is already used in the render setup",
                item.name
            )));
        }
        let is_layer = item.as_layer().is_some();
        if is_layer != parent.is_none() {
            return Err(RenderSetupError::structural(
                "layers must be roots and other items must have a parent",
            ));
        }
        if item.id == ItemId(0) {
            item.id = ItemId(self.next_id);
            self.next_id += 1;
        } else {
            if self.items.contains_key(&item.id) {
                return Err(RenderSetupError::structural(format!(
                    "item id {} already in use",
                    item.id
                )));
            }
            self.next_id = self.next_id.max(item.id.0 + 1);
        }
        let id = item.id;
        item.parent = parent;

        let siblings = match parent {
            None => &mut self.layers,
            Some(p) => self.get_mut(p)?.children_mut().ok_or_else(|| {
                RenderSetupError::structural(format!("{p} cannot have children"))
            })?,
        };
        let at = position.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(at, id);
        self.items.insert(id, item);
        Ok(id)
    }

    /// Detach `id` and its descendants.
    pub(crate) fn remove_subtree(&mut self, id: ItemId) -> RenderSetupResult<RemovedSubtree> {
        let parent = self.get(id)?.parent;
        let siblings = match parent {
            None => &mut self.layers,
            Some(p) => self
                .get_mut(p)?
                .children_mut()
                .ok_or_else(|| RenderSetupError::structural(format!("{p} has no children")))?,
        };
        let position = siblings.iter().position(|c| *c == id).ok_or_else(|| {
            RenderSetupError::structural(format!("{id} is not listed under its parent"))
        })?;
        siblings.remove(position);

        let mut ids = vec![id];
        ids.extend(self.descendants(id));
        let items = ids
            .into_iter()
            .filter_map(|i| self.items.remove(&i))
            .collect();
        if self.visible == Some(id) {
            self.visible = None;
        }
        Ok(RemovedSubtree {
            items,
            parent,
            position,
        })
    }

    /// Re-attach a subtree produced by [`Self::remove_subtree`].
    pub(crate) fn restore_subtree(&mut self, removed: RemovedSubtree) -> RenderSetupResult<ItemId> {
        let mut items = removed.items.into_iter();
        let root = items
            .next()
            .ok_or_else(|| RenderSetupError::structural("empty subtree"))?;
        let root_id = root.id;
        for item in items {
            if self.items.contains_key(&item.id) {
                return Err(RenderSetupError::structural(format!(
                    "item id {} already in use",
                    item.id
                )));
            }
            self.next_id = self.next_id.max(item.id.0 + 1);
            self.items.insert(item.id, item);
        }
        let mut root = root;
        let children = root.children().to_vec();
        if let Some(c) = root.children_mut() {
            c.clear();
        }
        self.insert(root, removed.parent, Some(removed.position))?;
        if let Some(c) = self.get_mut(root_id)?.children_mut() {
            *c = children;
        }
        Ok(root_id)
    }

    /// Rename an item. Taken names are a structural error.
    pub(crate) fn rename(&mut self, id: ItemId, name: &str) -> RenderSetupResult<String> {
        validate_item_name(name)?;
        if let Some(other) = self.find_by_name(name)
            && other != id
        {
            return Err(RenderSetupError::structural(format!(
                "name '{name}' is already used in the render setup"
            )));
        }
        let item = self.get_mut(id)?;
        Ok(std::mem::replace(&mut item.name, name.to_owned()))
    }

    /// Check that a collection of `kind` may be created under `parent`.
    pub(crate) fn check_collection_parent(
        &self,
        parent: ItemId,
        kind: &CollectionKind,
    ) -> RenderSetupResult<()> {
        let owner = self.get(parent)?;
        match &owner.kind {
            ItemKind::Layer(layer) => {
                if !kind.allowed_in_layer() {
                    return Err(RenderSetupError::structural(format!(
                        "a {} cannot be a top-level collection",
                        kind.type_key()
                    )));
                }
                let taken = kind.is_singleton()
                    && layer.children.iter().any(|c| {
                        self.collection_at(*c)
                            .is_ok_and(|c| c.kind().type_key() == kind.type_key())
                    });
                if taken {
                    return Err(RenderSetupError::structural(format!(
                        "layer '{}' already has a {}",
                        owner.name,
                        kind.type_key()
                    )));
                }
                Ok(())
            }
            ItemKind::Collection(c) if c.kind().accepts_collection(kind) => Ok(()),
            ItemKind::Collection(c) => Err(RenderSetupError::structural(format!(
                "a {} cannot hold a {}",
                c.kind().type_key(),
                kind.type_key()
            ))),
            ItemKind::Override(_) => Err(RenderSetupError::structural(format!(
                "override '{}' cannot hold a collection",
                owner.name
            ))),
        }
    }

    /// Check that an override of `kind` may be created in `collection`.
    pub(crate) fn check_override_parent(
        &self,
        collection: ItemId,
        kind: &OverrideKind,
    ) -> RenderSetupResult<()> {
        let coll = self.collection_at(collection)?;
        if coll.kind().accepts_override(kind) {
            return Ok(());
        }
        Err(RenderSetupError::structural(format!(
            "a {} cannot hold a {}",
            coll.kind().type_key(),
            kind.type_key()
        )))
    }

    /// Move every child of `from` except `to` under `to`, keeping their order.
    pub(crate) fn adopt_children(&mut self, from: ItemId, to: ItemId) -> RenderSetupResult<()> {
        let moved: Vec<ItemId> = self
            .children(from)
            .iter()
            .copied()
            .filter(|c| *c != to)
            .collect();
        if let Some(c) = self.get_mut(from)?.children_mut() {
            c.retain(|c| *c == to);
        }
        self.get_mut(to)?
            .children_mut()
            .ok_or_else(|| RenderSetupError::structural(format!("{to} cannot have children")))?
            .extend(moved.iter().copied());
        for m in moved {
            self.get_mut(m)?.parent = Some(to);
        }
        Ok(())
    }

    /// Every item id.
    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.keys().copied()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Return `true` when there are no layers.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/setup/tree.rs"]
mod tests;
