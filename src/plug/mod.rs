//! Typed attribute handles and the tagged value variant they carry.

pub(crate) mod handle;
pub(crate) mod value;
