//! Shared building blocks: error taxonomy, id newtypes and engine configuration.

pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod ids;
