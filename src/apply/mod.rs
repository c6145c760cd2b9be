//! Runtime realization of overrides in the scene.
//!
//! Apply-override nodes are spliced between an attribute and whatever fed it, and chained
//! per target attribute in document order. The context stack guards the scene switches the
//! engine flips while it applies or unapplies.

pub(crate) mod chain;
pub(crate) mod context;
pub(crate) mod node;
