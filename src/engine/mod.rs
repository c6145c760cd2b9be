//! The render-setup engine: owns the scene, the declarative tree and the applied overlay, and
//! keeps them consistent.
//!
//! All mutation goes through [`command::Command`]s so it can be undone. Scene changes are
//! queued by the scene and drained through the observer by [`Engine::process_events`];
//! reactions that need a reapply are deferred to the end of the current command.

pub(crate) mod apply;
pub(crate) mod command;
pub(crate) mod edit;
pub(crate) mod issues;
pub(crate) mod query;

use crate::apply::chain::ApplyIndex;
use crate::apply::context::{ApplyContext, ContextStack};
use crate::foundation::config::EngineConfig;
use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::{ItemId, ListenerId, NodeId};
use crate::plug::handle::Plug;
use crate::plug::value::PlugValue;
use crate::renderer::callbacks::{RendererCallbacks, RendererRegistry};
use crate::scene::graph::{NodeSpec, Scene};
use crate::scene::observer::{Pending, SceneEvent, SceneObserver};
use crate::setup::layer::{DEFAULT_LEGACY_LAYER, legacy_layer_name};
use crate::setup::observe::{Issues, TreeEvent, TreeListener, TreeObservable};
use crate::setup::tree::RenderSetup;
use command::UndoStack;
use std::collections::BTreeSet;

/// Phase reported by [`ApplyProgress`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyPhase {
    /// Removing the previously visible layer's overrides.
    Unapply,
    /// Realizing the newly visible layer's overrides.
    Apply,
}

/// One unit of apply/unapply work done.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyProgress {
    /// Phase.
    pub phase: ApplyPhase,
    /// Units done in this phase.
    pub done: usize,
    /// Units in this phase.
    pub total: usize,
}

/// Callback for [`ApplyProgress`] updates.
pub type ProgressCallback = Box<dyn FnMut(&ApplyProgress)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Deferred {
    RefreshLayer(ItemId),
    PruneApplied,
}

/// Render-setup engine bound to one scene.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) scene: Scene,
    pub(crate) observer: SceneObserver,
    pub(crate) setup: RenderSetup,
    pub(crate) applied: ApplyIndex,
    pub(crate) undo: UndoStack,
    pub(crate) deferred: Vec<Deferred>,
    pub(crate) contexts: ContextStack,
    pub(crate) tree: TreeObservable,
    pub(crate) issues: Issues,
    pub(crate) renderers: RendererRegistry,
    pub(crate) progress: Option<ProgressCallback>,
    pub(crate) sibling_warned: BTreeSet<(ItemId, String)>,
    pub(crate) mismatch_warned: BTreeSet<(ItemId, NodeId)>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("nodes", &self.scene.len())
            .field("items", &self.setup.len())
            .field("visible", &self.setup.visible_layer())
            .field("applied", &self.applied.len())
            .finish()
    }
}

impl Engine {
    /// Engine over `scene` with an empty render setup (the default layer is visible).
    pub fn new(scene: Scene, config: EngineConfig) -> RenderSetupResult<Self> {
        config.validate()?;
        let undo = UndoStack::new(config.undo_depth);
        let mut engine = Self {
            config,
            scene,
            observer: SceneObserver::new(),
            setup: RenderSetup::new(),
            applied: ApplyIndex::default(),
            undo,
            deferred: Vec::new(),
            contexts: ContextStack::default(),
            tree: TreeObservable::default(),
            issues: Issues::default(),
            renderers: RendererRegistry::default(),
            progress: None,
            sibling_warned: BTreeSet::new(),
            mismatch_warned: BTreeSet::new(),
        };
        engine.ensure_legacy_node(DEFAULT_LEGACY_LAYER)?;
        engine.set_legacy_visible(None, true)?;
        engine.scene.take_events();
        Ok(engine)
    }

    /// Configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scene, including apply-override nodes of the visible layer.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable scene access. Call [`Self::process_events`] afterwards so selectors and the
    /// visible layer catch up; [`Self::edit_scene`] does both.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Run `f` on the scene, then process the resulting change events.
    pub fn edit_scene<T>(
        &mut self,
        f: impl FnOnce(&mut Scene) -> RenderSetupResult<T>,
    ) -> RenderSetupResult<T> {
        let out = f(&mut self.scene);
        self.process_events()?;
        out
    }

    /// Declarative tree.
    pub fn setup(&self) -> &RenderSetup {
        &self.setup
    }

    /// Apply-override chains of the visible layer.
    pub fn applied(&self) -> &ApplyIndex {
        &self.applied
    }

    /// Current issues.
    pub fn issues(&self) -> &Issues {
        &self.issues
    }

    /// Scene observer, to register listeners of raw scene events.
    pub fn observer_mut(&mut self) -> &mut SceneObserver {
        &mut self.observer
    }

    /// Listen to render-setup tree events.
    pub fn add_tree_listener(&mut self, listener: TreeListener) -> ListenerId {
        self.tree.add_listener(listener)
    }

    /// Stop listening to render-setup tree events.
    pub fn remove_tree_listener(&mut self, id: ListenerId) -> bool {
        self.tree.remove_listener(id)
    }

    /// Receive an [`ApplyProgress`] for each unit of layer-switch work.
    pub fn set_progress_callback(&mut self, callback: Option<ProgressCallback>) {
        self.progress = callback;
    }

    /// Register renderer plug-in callbacks.
    pub fn register_callbacks(&mut self, renderer: &str, callbacks: RendererCallbacks) {
        self.renderers.register(renderer, callbacks);
    }

    /// Registered renderer callbacks.
    pub fn renderers(&self) -> &RendererRegistry {
        &self.renderers
    }

    /// Effective value of `node.attr`.
    pub fn plug_value(&self, path: &str) -> RenderSetupResult<PlugValue> {
        let plug = self.scene.plug(path)?;
        self.scene.evaluate(&plug)
    }

    /// Write `node.attr`. When the attribute is overridden by the visible layer, the
    /// pre-render-setup value held by the chain's tail is written instead, so the override
    /// keeps winning and unapply restores the new value.
    pub fn set_plug_value(&mut self, path: &str, value: PlugValue) -> RenderSetupResult<()> {
        let plug = self.scene.plug(path)?;
        match self.applied.tail_original(&plug) {
            None => self.scene.set_value(&plug, value)?,
            Some(tail) => {
                if let Some(src) = self.scene.input(&tail) {
                    return Err(RenderSetupError::scene(format!(
                        "'{path}' is driven by '{}'",
                        src.name(&self.scene)
                    )));
                }
                self.scene.write_stored(&tail, value)?;
            }
        }
        self.process_events()
    }

    // ---- events ------------------------------------------------------------------------------

    /// Deliver pending scene events and, outside of any apply context, run deferred work.
    pub fn process_events(&mut self) -> RenderSetupResult<()> {
        self.drain_events();
        if self.contexts.is_empty() {
            self.flush_deferred()?;
        }
        Ok(())
    }

    pub(crate) fn drain_events(&mut self) {
        for pending in self.scene.take_pending() {
            match pending {
                Pending::Event(event) => {
                    if self.observer.dispatch(&event) {
                        self.react(&event);
                    }
                }
                Pending::LoadBegin => self.observer.begin_load(),
                Pending::LoadEnd => {
                    self.observer.end_load();
                    if !self.observer.is_loading() && self.observer.is_enabled() {
                        self.after_load();
                    }
                }
            }
        }
    }

    /// Single catch-up pass for the node events a load suppressed.
    fn after_load(&mut self) {
        tracing::debug!("scene load finished");
        self.dirty_selectors(false);
        if !self.applied.is_empty() {
            self.defer(Deferred::PruneApplied);
        }
        self.schedule_visible_refresh();
    }

    fn react(&mut self, event: &SceneEvent) {
        if event.is_internal() {
            return;
        }
        match event {
            SceneEvent::NodeAdded { .. }
            | SceneEvent::ReferenceCreated { .. }
            | SceneEvent::ReferenceLoaded { .. }
            | SceneEvent::ReferenceUnloaded { .. }
            | SceneEvent::ReferenceRemoved { .. } => self.dirty_selectors(false),
            SceneEvent::NodeRemoved { .. } => {
                self.dirty_selectors(false);
                if !self.applied.is_empty() {
                    self.defer(Deferred::PruneApplied);
                }
            }
            SceneEvent::NodeRenamed {
                old_path, new_path, ..
            }
            | SceneEvent::NodeReparented {
                old_path, new_path, ..
            } => {
                for c in self.all_collections() {
                    if let Ok(coll) = self.setup.collection_mut(c) {
                        coll.selector.rename_static_paths(old_path, new_path);
                    }
                }
                self.dirty_selectors(false);
            }
            SceneEvent::ConnectionChanged { dst, .. } => {
                if dst.attr == "shadingEngine" || dst.attr == "surfaceShader" {
                    self.dirty_selectors(true);
                }
            }
        }
        self.schedule_visible_refresh();
    }

    /// Queue a refresh of the visible layer when one of its selectors went dirty.
    fn schedule_visible_refresh(&mut self) {
        let Some(layer) = self.setup.visible_layer() else {
            return;
        };
        let applying = self
            .setup
            .layer_at(layer)
            .map(|l| l.about_to_apply)
            .unwrap_or(true);
        if applying {
            return;
        }
        let dirty = self
            .setup
            .collections_recursive(layer)
            .into_iter()
            .any(|c| self.setup.collection_at(c).is_ok_and(|c| c.selector.is_dirty()));
        if dirty {
            if let Ok(l) = self.setup.layer_mut(layer) {
                l.needs_apply_update = true;
            }
            self.defer(Deferred::RefreshLayer(layer));
        }
    }

    fn dirty_selectors(&mut self, nested_only: bool) {
        for c in self.all_collections() {
            if nested_only && self.setup.parent_collection(c).is_none() {
                continue;
            }
            if let Ok(coll) = self.setup.collection_mut(c) {
                coll.selector.mark_dirty();
            }
        }
    }

    pub(crate) fn all_collections(&self) -> Vec<ItemId> {
        self.setup
            .layers()
            .iter()
            .flat_map(|l| self.setup.collections_recursive(*l))
            .collect()
    }

    pub(crate) fn defer(&mut self, work: Deferred) {
        if !self.deferred.contains(&work) {
            self.deferred.push(work);
        }
    }

    /// Run work queued by scene reactions. Loops until no new work is queued.
    pub(crate) fn flush_deferred(&mut self) -> RenderSetupResult<()> {
        while !self.deferred.is_empty() {
            let work = std::mem::take(&mut self.deferred);
            for w in work {
                match w {
                    Deferred::PruneApplied => self.applied.prune(&mut self.scene)?,
                    Deferred::RefreshLayer(layer) => self.refresh_visible_layer(layer)?,
                }
            }
            self.drain_events();
        }
        Ok(())
    }

    // ---- contexts ----------------------------------------------------------------------------

    /// Run `f` inside an apply context. Pending events are delivered under the outer state
    /// before entering and under `ctx` before leaving; when the outermost context exits, every
    /// selector is re-armed.
    pub(crate) fn with_context<T>(
        &mut self,
        ctx: ApplyContext,
        f: impl FnOnce(&mut Self) -> RenderSetupResult<T>,
    ) -> RenderSetupResult<T> {
        self.drain_events();
        self.contexts.push(ctx, &mut self.scene, &mut self.observer);
        let out = f(self);
        self.drain_events();
        if self.contexts.pop(&mut self.scene, &mut self.observer) {
            for c in self.all_collections() {
                if let Ok(coll) = self.setup.collection_mut(c) {
                    coll.selector.activate();
                }
            }
        }
        out
    }

    // ---- legacy layers -----------------------------------------------------------------------

    pub(crate) fn legacy_node_name(&self, layer: Option<ItemId>) -> RenderSetupResult<String> {
        Ok(match layer {
            None => DEFAULT_LEGACY_LAYER.to_owned(),
            Some(l) => legacy_layer_name(self.setup.get(l)?.name()),
        })
    }

    pub(crate) fn ensure_legacy_node(&mut self, name: &str) -> RenderSetupResult<NodeId> {
        if let Some(id) = self.scene.find(name)
            && self.scene.node(id).is_some_and(|n| n.type_name() == "renderLayer")
        {
            return Ok(id);
        }
        self.scene.create_node_with(
            "renderLayer",
            name,
            None,
            NodeSpec {
                internal: true,
                exact_name: true,
                ..NodeSpec::default()
            },
        )
    }

    pub(crate) fn set_legacy_attr(
        &mut self,
        layer: Option<ItemId>,
        attr: &str,
        value: bool,
    ) -> RenderSetupResult<()> {
        let name = self.legacy_node_name(layer)?;
        let id = self.ensure_legacy_node(&name)?;
        self.scene
            .write_stored(&Plug::new(id, attr), PlugValue::Bool(value))
    }

    pub(crate) fn set_legacy_visible(
        &mut self,
        layer: Option<ItemId>,
        visible: bool,
    ) -> RenderSetupResult<()> {
        self.set_legacy_attr(layer, "visible", visible)
    }

    pub(crate) fn notify(&mut self, event: TreeEvent) {
        self.tree.notify(&event);
    }

    pub(crate) fn report_progress(&mut self, phase: ApplyPhase, done: usize, total: usize) {
        if let Some(cb) = self.progress.as_mut() {
            cb(&ApplyProgress { phase, done, total });
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/mod.rs"]
mod tests;
