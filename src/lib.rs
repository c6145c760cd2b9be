//! Rendersetup is a layered, non-destructive scene-override engine.
//!
//! A render setup is a tree of render layers. Each layer holds collections that select scene
//! nodes through selectors, and overrides that change attributes of the selected nodes. Only
//! the visible layer is realized in the scene: its overrides are spliced into the dependency
//! graph as apply-override nodes, and switching layers removes them again without touching
//! the values underneath.
//!
//! # Pipeline overview
//!
//! 1. **Select**: every collection of the layer evaluates its [`Selector`] against the scene
//!    (nested collections against their parent's members).
//! 2. **Apply**: overrides are realized in document order; overrides on the same attribute
//!    chain, innermost first.
//! 3. **Track**: scene edits are queued as [`SceneEvent`]s and drained by
//!    [`Engine::process_events`], which reapplies only the suffix of the layer whose members
//!    changed.
//!
//! Every tree mutation is an undoable command (see [`Engine::undo`]). Documents are JSON
//! ([`Engine::encode`], [`Engine::decode`]).
//!
//! The in-memory [`Scene`] stands in for a DCC host's dependency graph.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod apply;
mod engine;
mod foundation;
mod plug;
mod renderer;
mod scene;
mod selector;
mod serialize;
mod setup;

pub use apply::chain::{ApplyIndex, ApplyRecord};
pub use apply::node::ApplyKind;
pub use engine::{ApplyPhase, ApplyProgress, Engine, ProgressCallback};
pub use foundation::config::EngineConfig;
pub use foundation::error::{RenderSetupError, RenderSetupResult};
pub use foundation::ids::{ItemId, ListenerId, NodeId};
pub use plug::handle::Plug;
pub use plug::value::{PlugType, PlugValue};
pub use renderer::callbacks::{
    AovCallbacks, DEFAULT_RENDERER, DefaultRenderSettings, RenderSettingsCallbacks,
    RendererCallbacks, RendererRegistry, SelectorSpec,
};
pub use scene::graph::{Attribute, Node, ReferenceEdit, Scene};
pub use scene::observer::{SceneEvent, SceneEventKind, SceneListener, SceneObserver};
pub use scene::snapshot::{ConnectionSnapshot, NodeSnapshot, SceneSnapshot};
pub use scene::types::{AttrTemplate, NodeCategory, NodeTypeInfo, TypeRegistry};
pub use selector::eval::{Selector, SelectorKind};
pub use selector::filter::{CustomFilter, StaticEntry, StaticSelection, TypeFilter};
pub use serialize::document::{
    CollectionBody, Document, LayerBody, LayerDoc, NodeDoc, OverrideBody, RendererSettings,
    SelectorBody, SelectorDoc, SetupDoc,
};
pub use serialize::{ImportReport, MergeMode};
pub use setup::collection::{Collection, CollectionKind};
pub use setup::layer::{DEFAULT_LEGACY_LAYER, RenderLayer, legacy_layer_name};
pub use setup::observe::{Issue, IssueKind, Issues, TreeEvent, TreeListener, TreeObservable};
pub use setup::overrides::{Override, OverrideKind};
pub use setup::tree::{Item, ItemKind, RemovedSubtree, RenderSetup};
