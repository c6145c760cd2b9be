//! The declarative render-setup tree: layers, collections and overrides.
//!
//! Items live in one arena owned by [`tree::RenderSetup`]; parents and children are linked by
//! [`crate::ItemId`]. Nothing here touches the scene; realizing a layer is the engine's job.

pub(crate) mod collection;
pub(crate) mod enabled;
pub(crate) mod layer;
pub(crate) mod observe;
pub(crate) mod overrides;
pub(crate) mod tree;
