use super::{ApplyPhase, Engine};
use crate::apply::chain::ApplyRecord;
use crate::apply::context::ApplyContext;
use crate::apply::node::{self as apply_node, MULTIPLY, OFFSET, TARGET, VALUE};
use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::{ItemId, NodeId};
use crate::plug::handle::Plug;
use crate::plug::value::{PlugType, PlugValue};
use crate::scene::types::NodeCategory;
use crate::setup::enabled;
use crate::setup::observe::TreeEvent;
use crate::setup::overrides::{Override, OverrideKind};
use std::collections::{BTreeMap, BTreeSet};

impl Engine {
    /// Recompute selectors of `collections` (given top-down) that are dirty or whose parent
    /// collection changed. Returns the collections whose members changed.
    pub(crate) fn refresh_selectors(
        &mut self,
        collections: &[ItemId],
    ) -> RenderSetupResult<Vec<ItemId>> {
        let mut changed: Vec<ItemId> = Vec::new();
        for &c in collections {
            let parent = self.setup.parent_collection(c);
            let parent_members = match parent {
                Some(p) => Some(self.setup.collection_at(p)?.selector.members().to_vec()),
                None => None,
            };
            let force = parent.is_some_and(|p| changed.contains(&p));
            let coll = self.setup.collection_mut(c)?;
            let did = if force {
                coll.selector.force_refresh(&self.scene, parent_members.as_deref())
            } else {
                coll.selector.refresh(&self.scene, parent_members.as_deref())
            };
            if did {
                changed.push(c);
            }
        }
        Ok(changed)
    }

    /// Refresh `collection` and its ancestor collections, top-down.
    fn refresh_path(&mut self, collection: ItemId) -> RenderSetupResult<()> {
        let mut path: Vec<ItemId> = self
            .setup
            .ancestors(collection)
            .into_iter()
            .filter(|a| self.setup.collection_at(*a).is_ok())
            .collect();
        path.reverse();
        path.push(collection);
        self.refresh_selectors(&path)?;
        Ok(())
    }

    pub(crate) fn set_selectors_active(&mut self, collections: &[ItemId], active: bool) {
        for c in collections {
            if let Ok(coll) = self.setup.collection_mut(*c) {
                if active {
                    coll.selector.activate();
                } else {
                    coll.selector.deactivate();
                }
            }
        }
    }

    /// Shapes among `members`; transforms contribute their direct child shapes.
    fn member_shapes(&self, members: &[NodeId]) -> BTreeSet<NodeId> {
        let mut out = BTreeSet::new();
        for m in members {
            if self.scene.has_category(*m, NodeCategory::Shape) {
                out.insert(*m);
            } else if self.scene.has_category(*m, NodeCategory::Transform)
                && let Some(node) = self.scene.node(*m)
            {
                out.extend(
                    node.children()
                        .iter()
                        .copied()
                        .filter(|c| self.scene.has_category(*c, NodeCategory::Shape)),
                );
            }
        }
        out.retain(|s| self.scene.node(*s).is_some_and(|n| !n.is_internal()));
        out
    }

    /// Plugs `ov` realizes on for the given collection members.
    fn override_targets(&self, ov: &Override, members: &[NodeId]) -> Vec<Plug> {
        match ov.kind() {
            OverrideKind::Shader { .. } => {
                let engines: BTreeSet<NodeId> = self
                    .member_shapes(members)
                    .into_iter()
                    .filter_map(|s| self.scene.assigned_shading_engine(s))
                    .collect();
                engines
                    .into_iter()
                    .map(|sg| Plug::new(sg, "surfaceShader"))
                    .filter(|p| self.scene.attribute(p).is_some())
                    .collect()
            }
            OverrideKind::Material { .. } => self
                .member_shapes(members)
                .into_iter()
                .map(|s| Plug::new(s, "shadingEngine"))
                .filter(|p| self.scene.attribute(p).is_some())
                .collect(),
            _ => members
                .iter()
                .map(|m| Plug::new(*m, ov.attribute()))
                .filter(|p| self.scene.attribute(p).is_some())
                .collect(),
        }
    }

    /// Realize override `o` on every current target. Overrides are realized whether or not
    /// they are enabled; the flag is written into the apply-override nodes.
    pub(crate) fn apply_override(
        &mut self,
        o: ItemId,
        order: &BTreeMap<ItemId, usize>,
    ) -> RenderSetupResult<()> {
        let item = self.setup.get(o)?;
        let name = item.name().to_owned();
        let enabled = item.is_enabled();
        let ov = item
            .as_override()
            .ok_or_else(|| RenderSetupError::structural(format!("{o} is not an override")))?
            .clone();
        let coll = self.setup.parent_collection(o).ok_or_else(|| {
            RenderSetupError::structural(format!("override '{name}' has no collection"))
        })?;
        self.refresh_path(coll)?;
        let members = self.setup.collection_at(coll)?.selector.members().to_vec();

        let source = if ov.kind().is_value() {
            None
        } else {
            let Some(path) = ov.kind().source_path() else {
                tracing::debug!(item = %name, "connection override has no source; skipped");
                self.setup.override_mut(o)?.set_missing_dependencies(false);
                return Ok(());
            };
            match self.scene.plug(&path) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(item = %name, source = %path, "missing dependency: {e}");
                    self.setup.override_mut(o)?.set_missing_dependencies(true);
                    return Ok(());
                }
            }
        };
        self.setup.override_mut(o)?.set_missing_dependencies(false);

        let layer = self.setup.layer_of(o);
        for target in self.override_targets(&ov, &members) {
            let Some(ty) = self.scene.attribute(&target).map(|a| a.ty) else {
                continue;
            };
            let params = match self.override_params(&ov, source.as_ref(), ty) {
                Ok(p) => p,
                Err(e) => {
                    if self.mismatch_warned.insert((o, target.node)) {
                        tracing::warn!(
                            item = %name,
                            plug = %target.name(&self.scene),
                            "override skipped: {e}"
                        );
                    }
                    continue;
                }
            };
            if let Some(layer) = layer {
                self.warn_sibling_conflict(layer, o, coll, &target);
            }

            let node = apply_node::create(
                &mut self.scene,
                ov.kind().apply_kind(),
                &format!("{name}_apply"),
                ty,
                enabled,
            )?;
            let spliced = self.write_params(node, params, source.as_ref()).and_then(|()| {
                self.applied.insert(
                    &mut self.scene,
                    &target,
                    ApplyRecord { node, item: o },
                    order,
                )
            });
            if let Err(e) = spliced {
                if self.scene.node(node).is_some()
                    && let Err(cleanup) = self.scene.delete_node(node)
                {
                    tracing::warn!("could not delete apply node: {cleanup}");
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Parameter values of `ov` for a target of type `ty`, or why it cannot drive it.
    pub(crate) fn override_params(
        &self,
        ov: &Override,
        source: Option<&Plug>,
        ty: PlugType,
    ) -> RenderSetupResult<Vec<(&'static str, PlugValue)>> {
        match ov.kind() {
            OverrideKind::Absolute { value } => Ok(vec![(VALUE, value.coerce(ty)?)]),
            OverrideKind::Relative { multiply, offset } => {
                if !ty.supports_relative() {
                    return Err(RenderSetupError::type_mismatch(format!(
                        "relative override cannot drive {ty}"
                    )));
                }
                let pt = apply_node::relative_param_type(ty);
                Ok(vec![(MULTIPLY, multiply.coerce(pt)?), (OFFSET, offset.coerce(pt)?)])
            }
            _ => {
                if let Some(src) = source {
                    let src_ty = src.ty(&self.scene)?;
                    if !ty.accepts(src_ty) {
                        return Err(RenderSetupError::type_mismatch(format!(
                            "cannot connect {src_ty} to {ty}"
                        )));
                    }
                }
                Ok(Vec::new())
            }
        }
    }

    fn write_params(
        &mut self,
        node: NodeId,
        params: Vec<(&'static str, PlugValue)>,
        source: Option<&Plug>,
    ) -> RenderSetupResult<()> {
        for (attr, value) in params {
            self.scene.write_stored(&Plug::new(node, attr), value)?;
        }
        match source {
            Some(src) => self.scene.connect(src, &Plug::new(node, TARGET)),
            None => Ok(()),
        }
    }

    fn warn_sibling_conflict(&mut self, layer: ItemId, o: ItemId, coll: ItemId, target: &Plug) {
        if !self.config.warn_on_sibling_conflicts {
            return;
        }
        let sibling = self
            .applied
            .chain(target)
            .iter()
            .any(|r| r.item != o && self.setup.parent_collection(r.item) == Some(coll));
        if sibling && self.sibling_warned.insert((layer, target.attr.clone())) {
            tracing::warn!(
                plug = %target.name(&self.scene),
                "sibling overrides target the same attribute; composing in document order"
            );
        }
    }

    /// Remove every apply-override node created by `o`.
    pub(crate) fn unapply_override(&mut self, o: ItemId) -> RenderSetupResult<()> {
        for (target, node) in self.applied.records_of(o).into_iter().rev() {
            self.applied.remove(&mut self.scene, &target, node)?;
        }
        Ok(())
    }

    /// Full apply pipeline of `layer`. On failure everything applied so far is torn down.
    #[tracing::instrument(skip(self))]
    pub(crate) fn apply_layer(&mut self, layer: ItemId) -> RenderSetupResult<()> {
        self.setup.layer_mut(layer)?.about_to_apply = true;
        let out = self.with_context(ApplyContext::ApplyLayer, |e| e.apply_layer_steps(layer));
        if let Ok(l) = self.setup.layer_mut(layer) {
            l.about_to_apply = false;
        }
        if let Err(e) = &out {
            tracing::warn!("apply failed, tearing down: {e}");
            let collections = self.setup.collections_recursive(layer);
            self.set_selectors_active(&collections, true);
            self.with_context(ApplyContext::Unapply, |e| {
                e.applied.clear(&mut e.scene)?;
                e.set_legacy_visible(None, true)?;
                if let Err(err) = e.set_legacy_visible(Some(layer), false) {
                    tracing::warn!("could not reset the legacy layer node: {err}");
                }
                Ok(())
            })?;
        }
        out
    }

    fn apply_layer_steps(&mut self, layer: ItemId) -> RenderSetupResult<()> {
        let collections = self.setup.collections_recursive(layer);
        self.refresh_selectors(&collections)?;
        self.set_selectors_active(&collections, false);

        let order = self.setup.order_map(layer);
        let overrides = self.setup.overrides_recursive(layer);
        let total = overrides.len();
        for (i, o) in overrides.iter().enumerate() {
            self.apply_override(*o, &order)?;
            self.report_progress(ApplyPhase::Apply, i + 1, total);
        }

        self.set_selectors_active(&collections, true);
        self.set_legacy_visible(None, false)?;
        self.set_legacy_visible(Some(layer), true)?;
        self.setup.layer_mut(layer)?.needs_apply_update = false;
        tracing::debug!(overrides = total, nodes = self.applied.len(), "layer applied");
        Ok(())
    }

    /// Remove every apply-override node of `layer`, restoring the scene.
    #[tracing::instrument(skip(self))]
    pub(crate) fn unapply_layer(&mut self, layer: ItemId) -> RenderSetupResult<()> {
        let collections = self.setup.collections_recursive(layer);
        self.set_selectors_active(&collections, false);
        let out = self.with_context(ApplyContext::Unapply, |e| {
            let overrides = e.setup.overrides_recursive(layer);
            let total = overrides.len();
            for (i, o) in overrides.iter().rev().enumerate() {
                e.unapply_override(*o)?;
                e.report_progress(ApplyPhase::Unapply, i + 1, total);
            }
            e.applied.clear(&mut e.scene)?;
            e.set_legacy_visible(Some(layer), false)?;
            e.set_legacy_visible(None, true)
        });
        self.set_selectors_active(&collections, true);
        out
    }

    /// Make `layer` (or the default layer) the visible one: unapply the previous layer, then
    /// apply the new one. If the apply fails the previous layer is restored.
    #[tracing::instrument(skip(self))]
    pub(crate) fn switch_visible(&mut self, layer: Option<ItemId>) -> RenderSetupResult<()> {
        let old = self.setup.visible;
        if old == layer {
            return Ok(());
        }
        if let Some(l) = layer {
            self.setup.layer_at(l)?;
        }
        if let Some(prev) = old {
            self.unapply_layer(prev)?;
        }
        self.setup.visible = layer;
        if let Some(l) = layer
            && let Err(e) = self.apply_layer(l)
        {
            self.setup.visible = old;
            if let Some(prev) = old {
                self.apply_layer(prev)?;
            }
            return Err(e);
        }
        self.sibling_warned.clear();
        tracing::info!(
            from = ?old.and_then(|l| self.setup.item(l)).map(|i| i.name().to_owned()),
            to = ?layer.and_then(|l| self.setup.item(l)).map(|i| i.name().to_owned()),
            "visible layer switched"
        );
        self.notify(TreeEvent::VisibleLayerChanged { old, new: layer });
        Ok(())
    }

    /// Deferred reaction to dirty selectors of the visible layer: reapply the suffix that
    /// starts at the first collection whose members changed.
    pub(crate) fn refresh_visible_layer(&mut self, layer: ItemId) -> RenderSetupResult<()> {
        if self.setup.visible != Some(layer) || !self.setup.layer_at(layer)?.needs_apply_update {
            return Ok(());
        }
        let collections = self.setup.collections_recursive(layer);
        let changed = self.refresh_selectors(&collections)?;
        self.setup.layer_mut(layer)?.needs_apply_update = false;
        let Some(first) = changed.first() else {
            return Ok(());
        };
        let rank = self.setup.order_map(layer).get(first).copied().unwrap_or(0);
        tracing::debug!(from = rank, "selectors changed; partial reapply");
        self.reapply_from(layer, rank)
    }

    /// Unapply and reapply every override of `layer` at or after document position `rank`.
    pub(crate) fn reapply_from(&mut self, layer: ItemId, rank: usize) -> RenderSetupResult<()> {
        self.setup.layer_mut(layer)?.about_to_apply = true;
        let out = self.reapply_steps(layer, rank);
        if let Ok(l) = self.setup.layer_mut(layer) {
            l.about_to_apply = false;
            l.needs_apply_update = false;
        }
        out
    }

    fn reapply_steps(&mut self, layer: ItemId, rank: usize) -> RenderSetupResult<()> {
        let order = self.setup.order_map(layer);
        let suffix: Vec<ItemId> = self
            .setup
            .overrides_recursive(layer)
            .into_iter()
            .filter(|o| order.get(o).is_some_and(|r| *r >= rank))
            .collect();
        let collections = self.setup.collections_recursive(layer);

        self.set_selectors_active(&collections, false);
        self.with_context(ApplyContext::Unapply, |e| {
            suffix
                .iter()
                .rev()
                .try_for_each(|o| e.unapply_override(*o))
        })?;
        self.refresh_selectors(&collections)?;
        self.set_selectors_active(&collections, false);
        let out = self.with_context(ApplyContext::ApplyCollection, |e| {
            suffix.iter().try_for_each(|o| e.apply_override(*o, &order))
        });
        self.set_selectors_active(&collections, true);
        out
    }

    /// Run a mutation of `item` while its layer is visible.
    ///
    /// Selectors of collections before `item` in document order are deactivated for the
    /// duration; afterwards, if any collection at or after `item` became dirty, only that suffix
    /// of the layer is reapplied.
    pub(crate) fn with_pivot<T>(
        &mut self,
        item: ItemId,
        f: impl FnOnce(&mut Self) -> RenderSetupResult<T>,
    ) -> RenderSetupResult<T> {
        let layer = self
            .setup
            .layer_of(item)
            .filter(|l| self.setup.visible == Some(*l));
        let Some(layer) = layer else {
            return f(self);
        };
        let order = self.setup.order_map(layer);
        let rank = order.get(&item).copied().unwrap_or(0);
        let before: Vec<ItemId> = self
            .setup
            .collections_recursive(layer)
            .into_iter()
            .filter(|c| order.get(c).is_some_and(|r| *r < rank))
            .collect();

        self.set_selectors_active(&before, false);
        let out = self.with_context(ApplyContext::Stack { observers: true }, f);
        self.set_selectors_active(&before, true);
        let out = out?;

        let order = self.setup.order_map(layer);
        let later_dirty = self
            .setup
            .collections_recursive(layer)
            .into_iter()
            .filter(|c| order.get(c).is_some_and(|r| *r >= rank))
            .any(|c| self.setup.collection_at(c).is_ok_and(|c| c.selector.is_dirty()));
        if later_dirty {
            tracing::debug!(from = rank, "pivot edit dirtied later collections");
            self.reapply_from(layer, rank)?;
        }
        Ok(out)
    }

    /// Recompute effective enabled flags of `layer`, notify, and push changed flags into the
    /// apply-override nodes without reapplying.
    pub(crate) fn refresh_enabled(&mut self, layer: ItemId) -> RenderSetupResult<()> {
        let changed = enabled::refresh(&mut self.setup, layer)?;
        let visible = self.setup.visible == Some(layer);
        for id in changed {
            let on = self.setup.get(id)?.is_enabled();
            if visible {
                for (_, node) in self.applied.records_of(id) {
                    apply_node::set_enabled(&mut self.scene, node, on)?;
                }
            }
            self.notify(TreeEvent::EnabledChanged {
                item: id,
                enabled: on,
            });
        }
        Ok(())
    }

    /// (Re)realize an override, or every override below a collection, in the visible layer.
    /// Returns `false` when the item's layer is not visible.
    pub(crate) fn post_apply_item(&mut self, item: ItemId) -> RenderSetupResult<bool> {
        let Some(layer) = self
            .setup
            .layer_of(item)
            .filter(|l| self.setup.visible == Some(*l))
        else {
            return Ok(false);
        };
        let overrides = if self.setup.get(item)?.as_override().is_some() {
            vec![item]
        } else {
            self.setup.overrides_recursive(item)
        };
        let order = self.setup.order_map(layer);
        self.with_context(ApplyContext::ApplyCollection, |e| {
            for o in &overrides {
                e.unapply_override(*o)?;
                e.apply_override(*o, &order)?;
            }
            Ok(())
        })?;
        Ok(true)
    }
}
