use super::Engine;
use crate::apply::context::ApplyContext;
use crate::apply::node::OUT;
use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::ItemId;
use crate::plug::handle::Plug;
use crate::selector::eval::Selector;
use crate::setup::collection::{Collection, CollectionKind};
use crate::setup::layer::{RenderLayer, legacy_layer_name};
use crate::setup::observe::TreeEvent;
use crate::setup::overrides::{Override, OverrideKind};
use crate::setup::tree::{Item, ItemKind, RemovedSubtree, RenderSetup};
use std::collections::VecDeque;

/// One undoable mutation of the render setup.
///
/// Setters hold the value to write; running them swaps it with the current one, so the same
/// call both undoes and redoes them. Creations remember the id they allocated so a redo
/// recreates the same item.
#[derive(Debug)]
pub(crate) enum Command {
    CreateLayer {
        name: String,
        id: Option<ItemId>,
    },
    CreateCollection {
        parent: ItemId,
        name: String,
        kind: CollectionKind,
        selector: Selector,
        id: Option<ItemId>,
    },
    CreateOverride {
        collection: ItemId,
        name: String,
        payload: Override,
        id: Option<ItemId>,
    },
    DeleteItem {
        item: ItemId,
        removed: Option<(RemovedSubtree, bool)>,
    },
    Rename {
        item: ItemId,
        name: String,
    },
    SetSelfEnabled {
        item: ItemId,
        enabled: bool,
    },
    SetIsolateSelected {
        collection: ItemId,
        isolate: bool,
    },
    SetRenderable {
        layer: Option<ItemId>,
        renderable: bool,
    },
    SetNotes {
        item: ItemId,
        notes: String,
    },
    SetOverrideKind {
        item: ItemId,
        kind: OverrideKind,
    },
    SetSelector {
        collection: ItemId,
        selector: Selector,
    },
    SwitchVisibleLayer {
        layer: Option<ItemId>,
    },
    PostApply {
        item: ItemId,
        was_applied: bool,
    },
    ReplaceSetup {
        setup: Box<RenderSetup>,
    },
    Batch(Vec<Command>),
}

impl Command {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Command::CreateLayer { .. } => "createLayer",
            Command::CreateCollection { .. } => "createCollection",
            Command::CreateOverride { .. } => "createOverride",
            Command::DeleteItem { .. } => "delete",
            Command::Rename { .. } => "rename",
            Command::SetSelfEnabled { .. } => "setSelfEnabled",
            Command::SetIsolateSelected { .. } => "setIsolateSelected",
            Command::SetRenderable { .. } => "setRenderable",
            Command::SetNotes { .. } => "setNotes",
            Command::SetOverrideKind { .. } => "setOverrideValue",
            Command::SetSelector { .. } => "setSelector",
            Command::SwitchVisibleLayer { .. } => "switchVisibleRenderLayer",
            Command::PostApply { .. } => "postApply",
            Command::ReplaceSetup { .. } => "replaceRenderSetup",
            Command::Batch(_) => "batch",
        }
    }

    fn created_id(&self) -> Option<ItemId> {
        match self {
            Command::CreateLayer { id, .. }
            | Command::CreateCollection { id, .. }
            | Command::CreateOverride { id, .. } => *id,
            _ => None,
        }
    }

    pub(crate) fn do_it(&mut self, e: &mut Engine) -> RenderSetupResult<()> {
        match self {
            Command::CreateLayer { name, id } => {
                *id = Some(e.raw_create_layer(name, *id)?);
            }
            Command::CreateCollection {
                parent,
                name,
                kind,
                selector,
                id,
            } => {
                *id = Some(e.raw_create_collection(
                    *parent,
                    name,
                    kind.clone(),
                    selector.clone(),
                    *id,
                )?);
            }
            Command::CreateOverride {
                collection,
                name,
                payload,
                id,
            } => {
                *id = Some(e.raw_create_override(*collection, name, payload.clone(), *id)?);
            }
            Command::DeleteItem { item, removed } => {
                *removed = Some(e.raw_delete(*item)?);
            }
            Command::Rename { item, name } => *name = e.raw_rename(*item, name)?,
            Command::SetSelfEnabled { item, enabled } => {
                *enabled = e.raw_set_self_enabled(*item, *enabled)?;
            }
            Command::SetIsolateSelected {
                collection,
                isolate,
            } => *isolate = e.raw_set_isolate_selected(*collection, *isolate)?,
            Command::SetRenderable { layer, renderable } => {
                *renderable = e.raw_set_renderable(*layer, *renderable)?;
            }
            Command::SetNotes { item, notes } => {
                *notes = e.raw_set_notes(*item, std::mem::take(notes))?;
            }
            Command::SetOverrideKind { item, kind } => {
                *kind = e.raw_set_override_kind(*item, kind.clone())?;
            }
            Command::SetSelector {
                collection,
                selector,
            } => *selector = e.raw_set_selector(*collection, selector.clone())?,
            Command::SwitchVisibleLayer { layer } => {
                let old = e.setup.visible;
                e.switch_visible(*layer)?;
                *layer = old;
            }
            Command::PostApply { item, was_applied } => {
                *was_applied = !e.applied.records_of(*item).is_empty();
                e.post_apply_item(*item)?;
            }
            Command::ReplaceSetup { setup } => {
                let next = std::mem::take(setup.as_mut());
                **setup = e.raw_replace_setup(next)?;
            }
            Command::Batch(cmds) => {
                for i in 0..cmds.len() {
                    if let Err(err) = cmds[i].do_it(e) {
                        for done in cmds[..i].iter_mut().rev() {
                            if let Err(undo) = done.undo_it(e) {
                                tracing::warn!(command = done.label(), "rollback failed: {undo}");
                            }
                        }
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn undo_it(&mut self, e: &mut Engine) -> RenderSetupResult<()> {
        match self {
            Command::CreateLayer { id, .. }
            | Command::CreateCollection { id, .. }
            | Command::CreateOverride { id, .. } => {
                let created = id.ok_or_else(|| {
                    RenderSetupError::command("cannot undo a creation that never ran")
                })?;
                e.raw_delete(created)?;
            }
            Command::DeleteItem { removed, .. } => {
                let (subtree, was_visible) = removed.take().ok_or_else(|| {
                    RenderSetupError::command("cannot undo a delete that never ran")
                })?;
                e.raw_restore(subtree, was_visible)?;
            }
            Command::PostApply { item, was_applied } => {
                if !*was_applied && e.setup.item(*item).is_some() {
                    e.with_context(ApplyContext::Unapply, |e| e.unapply_override_tree(*item))?;
                }
            }
            Command::Batch(cmds) => {
                for c in cmds.iter_mut().rev() {
                    c.undo_it(e)?;
                }
            }
            _ => self.do_it(e)?,
        }
        Ok(())
    }

    pub(crate) fn redo_it(&mut self, e: &mut Engine) -> RenderSetupResult<()> {
        match self {
            Command::Batch(cmds) => cmds.iter_mut().try_for_each(|c| c.redo_it(e)),
            _ => self.do_it(e),
        }
    }
}

/// Bounded undo/redo history.
#[derive(Debug)]
pub(crate) struct UndoStack {
    done: VecDeque<Command>,
    undone: Vec<Command>,
    depth: usize,
}

impl UndoStack {
    pub(crate) fn new(depth: usize) -> Self {
        Self {
            done: VecDeque::new(),
            undone: Vec::new(),
            depth,
        }
    }

    pub(crate) fn push(&mut self, cmd: Command) {
        self.undone.clear();
        self.done.push_back(cmd);
        while self.done.len() > self.depth {
            self.done.pop_front();
        }
    }

    pub(crate) fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub(crate) fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
    }
}

impl Engine {
    /// Run `cmd` and record it for undo. A failing command leaves no history entry.
    pub(crate) fn execute(&mut self, cmd: Command) -> RenderSetupResult<()> {
        self.run(cmd).map(drop)
    }

    /// Run a creation command and return the created item.
    pub(crate) fn execute_create(&mut self, cmd: Command) -> RenderSetupResult<ItemId> {
        self.run(cmd)?
            .ok_or_else(|| RenderSetupError::command("command did not create an item"))
    }

    fn run(&mut self, mut cmd: Command) -> RenderSetupResult<Option<ItemId>> {
        let label = cmd.label();
        let out = cmd.do_it(self);
        let settled = self.process_events();
        if let Err(e) = out {
            tracing::warn!(command = label, "command failed: {e}");
            return Err(e);
        }
        settled?;
        tracing::debug!(command = label, "command done");
        let created = cmd.created_id();
        self.undo.push(cmd);
        self.refresh_issues()?;
        Ok(created)
    }

    /// Undo the last command. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> RenderSetupResult<bool> {
        let Some(mut cmd) = self.undo.done.pop_back() else {
            return Ok(false);
        };
        if let Err(e) = cmd.undo_it(self) {
            self.undo.clear();
            return Err(e);
        }
        self.process_events()?;
        tracing::debug!(command = cmd.label(), "undone");
        self.undo.undone.push(cmd);
        self.refresh_issues()?;
        Ok(true)
    }

    /// Redo the last undone command. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> RenderSetupResult<bool> {
        let Some(mut cmd) = self.undo.undone.pop() else {
            return Ok(false);
        };
        if let Err(e) = cmd.redo_it(self) {
            self.undo.clear();
            return Err(e);
        }
        self.process_events()?;
        tracing::debug!(command = cmd.label(), "redone");
        self.undo.done.push_back(cmd);
        self.refresh_issues()?;
        Ok(true)
    }

    /// Return `true` when [`Self::undo`] has something to undo.
    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    /// Return `true` when [`Self::redo`] has something to redo.
    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    // ---- raw mutations (no history) ----------------------------------------------------------

    fn raw_create_layer(&mut self, name: &str, id: Option<ItemId>) -> RenderSetupResult<ItemId> {
        let mut item = Item::new(name, ItemKind::Layer(RenderLayer::default()));
        item.id = id.unwrap_or(ItemId(0));
        let id = self.setup.insert(item, None, None)?;
        self.sync_legacy_layer(id)?;
        self.notify(TreeEvent::LayerAdded { layer: id });
        Ok(id)
    }

    fn raw_create_collection(
        &mut self,
        parent: ItemId,
        name: &str,
        kind: CollectionKind,
        selector: Selector,
        id: Option<ItemId>,
    ) -> RenderSetupResult<ItemId> {
        self.setup.check_collection_parent(parent, &kind)?;
        let mut item = Item::new(name, ItemKind::Collection(Collection::new(kind, selector)));
        item.id = id.unwrap_or(ItemId(0));
        let id = self.setup.insert(item, Some(parent), None)?;
        self.notify(TreeEvent::ItemAdded { item: id, parent });
        if let Some(layer) = self.setup.layer_of(id) {
            self.refresh_enabled(layer)?;
        }
        Ok(id)
    }

    fn raw_create_override(
        &mut self,
        collection: ItemId,
        name: &str,
        payload: Override,
        id: Option<ItemId>,
    ) -> RenderSetupResult<ItemId> {
        self.setup.check_override_parent(collection, payload.kind())?;
        let mut item = Item::new(name, ItemKind::Override(payload));
        item.id = id.unwrap_or(ItemId(0));
        let id = self.setup.insert(item, Some(collection), None)?;
        self.notify(TreeEvent::ItemAdded {
            item: id,
            parent: collection,
        });
        if let Some(layer) = self.setup.layer_of(id) {
            self.refresh_enabled(layer)?;
        }
        self.post_apply_item(id)?;
        Ok(id)
    }

    /// Detach an item. Its overrides are unapplied first when its layer is visible; a visible
    /// layer makes the default layer visible.
    fn raw_delete(&mut self, item: ItemId) -> RenderSetupResult<(RemovedSubtree, bool)> {
        let it = self.setup.get(item)?;
        let name = it.name().to_owned();
        let is_layer = it.as_layer().is_some();
        let was_visible = self.setup.visible == Some(item);
        if was_visible {
            self.switch_visible(None)?;
        }
        let layer = self.setup.layer_of(item);
        if !is_layer && layer.is_some() && layer == self.setup.visible {
            self.with_context(ApplyContext::Unapply, |e| e.unapply_override_tree(item))?;
        }

        let removed = self.setup.remove_subtree(item)?;
        if is_layer {
            if let Some(node) = self.scene.find(&legacy_layer_name(&name))
                && self.scene.node(node).is_some_and(|n| n.is_internal())
            {
                self.scene.delete_node(node)?;
            }
            self.notify(TreeEvent::LayerRemoved { layer: item, name });
        } else {
            self.notify(TreeEvent::ItemRemoved { item, name });
            if let Some(layer) = layer {
                self.refresh_enabled(layer)?;
            }
        }
        Ok((removed, was_visible))
    }

    fn raw_restore(
        &mut self,
        removed: RemovedSubtree,
        was_visible: bool,
    ) -> RenderSetupResult<ItemId> {
        let id = self.setup.restore_subtree(removed)?;
        let item = self.setup.get(id)?;
        if item.as_layer().is_some() {
            self.sync_legacy_layer(id)?;
            self.notify(TreeEvent::LayerAdded { layer: id });
            self.refresh_enabled(id)?;
            if was_visible {
                self.switch_visible(Some(id))?;
            }
        } else {
            if let Some(parent) = item.parent() {
                self.notify(TreeEvent::ItemAdded { item: id, parent });
            }
            if let Some(layer) = self.setup.layer_of(id) {
                self.refresh_enabled(layer)?;
            }
            self.post_apply_item(id)?;
        }
        Ok(id)
    }

    /// Unapply `item` if it is an override, else every override below it.
    pub(crate) fn unapply_override_tree(&mut self, item: ItemId) -> RenderSetupResult<()> {
        let overrides = if self.setup.get(item)?.as_override().is_some() {
            vec![item]
        } else {
            self.setup.overrides_recursive(item)
        };
        overrides
            .iter()
            .rev()
            .try_for_each(|o| self.unapply_override(*o))
    }

    fn raw_rename(&mut self, item: ItemId, name: &str) -> RenderSetupResult<String> {
        let old = self.setup.rename(item, name)?;
        if self.setup.get(item)?.as_layer().is_some()
            && let Some(node) = self.scene.find(&legacy_layer_name(&old))
        {
            self.scene.rename_node(node, &legacy_layer_name(name))?;
        }
        self.notify(TreeEvent::ItemRenamed {
            item,
            old: old.clone(),
            new: name.to_owned(),
        });
        Ok(old)
    }

    fn raw_set_self_enabled(&mut self, item: ItemId, enabled: bool) -> RenderSetupResult<bool> {
        let old = std::mem::replace(&mut self.setup.get_mut(item)?.self_enabled, enabled);
        if let Some(layer) = self.setup.layer_of(item) {
            self.refresh_enabled(layer)?;
        }
        Ok(old)
    }

    fn raw_set_isolate_selected(
        &mut self,
        collection: ItemId,
        isolate: bool,
    ) -> RenderSetupResult<bool> {
        let coll = self.setup.collection_mut(collection)?;
        let old = std::mem::replace(&mut coll.isolate_selected, isolate);
        if let Some(layer) = self.setup.layer_of(collection) {
            self.refresh_enabled(layer)?;
        }
        Ok(old)
    }

    fn raw_set_renderable(
        &mut self,
        layer: Option<ItemId>,
        renderable: bool,
    ) -> RenderSetupResult<bool> {
        let old = match layer {
            None => std::mem::replace(&mut self.setup.default_renderable, renderable),
            Some(l) => std::mem::replace(&mut self.setup.layer_mut(l)?.renderable, renderable),
        };
        self.set_legacy_attr(layer, "renderable", renderable)?;
        Ok(old)
    }

    fn raw_set_notes(&mut self, item: ItemId, notes: String) -> RenderSetupResult<String> {
        Ok(std::mem::replace(&mut self.setup.get_mut(item)?.notes, notes))
    }

    /// Replace an override's parameters. Value overrides rewrite their apply nodes in place;
    /// connection overrides are reapplied.
    fn raw_set_override_kind(
        &mut self,
        item: ItemId,
        kind: OverrideKind,
    ) -> RenderSetupResult<OverrideKind> {
        let ov = self.setup.override_mut(item)?;
        let old = ov.kind().clone();
        ov.set_kind(kind)?;
        let ov = ov.clone();

        let records = self.applied.records_of(item);
        let in_place = ov.kind().is_value() && !records.is_empty();
        if in_place {
            let rewritten = self.with_context(ApplyContext::ApplyCollection, |e| {
                for (_, node) in &records {
                    let ty = Plug::new(*node, OUT).ty(&e.scene)?;
                    for (attr, value) in e.override_params(&ov, None, ty)? {
                        e.scene.write_stored(&Plug::new(*node, attr), value)?;
                    }
                }
                Ok(())
            });
            if let Err(err) = rewritten {
                tracing::debug!("in-place update failed ({err}); reapplying");
                self.post_apply_item(item)?;
            }
        } else {
            self.post_apply_item(item)?;
        }
        self.notify(TreeEvent::OverrideValueChanged { item });
        Ok(old)
    }

    fn raw_set_selector(
        &mut self,
        collection: ItemId,
        selector: Selector,
    ) -> RenderSetupResult<Selector> {
        let old = self.setup.collection_at(collection)?.selector.clone();
        self.with_pivot(collection, |e| {
            let mut selector = selector;
            selector.activate();
            selector.mark_dirty();
            e.setup.collection_mut(collection)?.selector = selector;
            Ok(())
        })?;
        self.notify(TreeEvent::SelectorChanged { collection });
        Ok(old)
    }

    /// Swap in a whole new tree: the visible layer is unapplied, the tree replaced, legacy
    /// layer nodes synchronized, and the new tree's visible layer applied.
    fn raw_replace_setup(&mut self, next: RenderSetup) -> RenderSetupResult<RenderSetup> {
        let target = next.visible;
        let current = self.setup.visible;
        self.switch_visible(None)?;

        let mut next = next;
        next.visible = None;
        let mut old = std::mem::replace(&mut self.setup, next);
        old.visible = current;

        for layer in old.layers() {
            let Some(item) = old.item(*layer) else {
                continue;
            };
            if self.setup.layer_by_name(item.name()).is_none()
                && let Some(node) = self.scene.find(&legacy_layer_name(item.name()))
                && self.scene.node(node).is_some_and(|n| n.is_internal())
            {
                self.scene.delete_node(node)?;
            }
        }
        for layer in self.setup.layers().to_vec() {
            self.sync_legacy_layer(layer)?;
            self.refresh_enabled(layer)?;
        }
        let default_renderable = self.setup.default_renderable;
        self.set_legacy_attr(None, "renderable", default_renderable)?;
        self.mismatch_warned.clear();
        self.sibling_warned.clear();

        let target = target.filter(|l| self.setup.layer_at(*l).is_ok());
        self.switch_visible(target)?;
        Ok(old)
    }

    /// Create (or reuse) the legacy node of `layer` and copy its renderable flag.
    fn sync_legacy_layer(&mut self, layer: ItemId) -> RenderSetupResult<()> {
        let renderable = self.setup.layer_at(layer)?.renderable;
        let name = self.legacy_node_name(Some(layer))?;
        self.ensure_legacy_node(&name)?;
        self.set_legacy_attr(Some(layer), "renderable", renderable)?;
        let visible = self.setup.visible == Some(layer);
        self.set_legacy_visible(Some(layer), visible)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/command.rs"]
mod tests;
