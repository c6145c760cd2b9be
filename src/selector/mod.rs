//! Selectors: which scene nodes a collection targets.
//!
//! A selector combines a wildcard pattern, a static list of node paths and a node-type
//! filter, and caches the resulting member list until the scene invalidates it.

pub(crate) mod eval;
pub(crate) mod filter;
pub(crate) mod pattern;
