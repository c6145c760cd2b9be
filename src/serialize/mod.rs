//! JSON documents of the render setup: encode, decode with merge modes, and migration of
//! 2016-R2 collection dictionaries.

pub(crate) mod decode;
pub(crate) mod document;
pub(crate) mod encode;
pub(crate) mod legacy;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a decoded document combines with the existing render setup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Replace the existing render setup.
    #[default]
    Overwrite,
    /// Reuse layers with the same name; colliding item names get the merge prefix.
    Merge,
    /// Create new items, every name prefixed.
    Rename,
}

impl MergeMode {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            MergeMode::Overwrite => "overwrite",
            MergeMode::Merge => "merge",
            MergeMode::Rename => "rename",
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(MergeMode::Overwrite),
            "merge" => Ok(MergeMode::Merge),
            "rename" => Ok(MergeMode::Rename),
            other => Err(format!(
                "unknown merge mode '{other}' (expected overwrite, merge or rename)"
            )),
        }
    }
}

/// Outcome of a decode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Names of the layers created or merged into, in document order.
    pub layers: Vec<String>,
    /// Per-node failures; the rest of the document still loaded.
    pub warnings: Vec<String>,
    /// Number of 2016-R2 collections migrated.
    pub migrated: usize,
}

impl ImportReport {
    /// Return `true` when every node decoded.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/serialize/mod.rs"]
mod tests;
