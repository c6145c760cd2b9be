//! In-memory scene dependency graph the engine applies layers to.
//!
//! The graph stands in for a host application's scene: typed nodes with attributes,
//! single-input connections, a DAG hierarchy, references, and a change-event queue
//! that the engine drains through the [`observer::SceneObserver`].

pub(crate) mod graph;
pub(crate) mod observer;
pub(crate) mod snapshot;
pub(crate) mod types;
