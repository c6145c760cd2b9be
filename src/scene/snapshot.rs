use crate::apply::node::ApplyKind;
use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::plug::value::PlugValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Serde form of a [`crate::Scene`].
///
/// Nodes are listed DAG-first in pre-order (roots sorted by name), then DG nodes sorted by name,
/// so equal graphs produce byte-identical JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneSnapshot {
    /// Nodes; a DAG node's parent always precedes it.
    pub nodes: Vec<NodeSnapshot>,
    /// Connections, sorted.
    pub connections: Vec<ConnectionSnapshot>,
}

/// One node of a [`SceneSnapshot`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    /// Full path (`|group1|pSphere1`) or DG name.
    pub path: String,
    /// Node type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Engine-owned node.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub internal: bool,
    /// Apply-override compute kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<ApplyKind>,
    /// Stored attribute values. Attributes missing here keep their type defaults.
    #[serde(default)]
    pub attributes: BTreeMap<String, PlugValue>,
}

/// One `src -> dst` connection, both ends as `path.attr`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    /// Source plug path.
    pub src: String,
    /// Destination plug path.
    pub dst: String,
}

impl SceneSnapshot {
    /// Parse a snapshot from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> RenderSetupResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| RenderSetupError::serde(format!("parse scene JSON: {e}")))
    }

    /// Parse a snapshot from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> RenderSetupResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            RenderSetupError::serde(format!("open scene '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Pretty JSON text.
    pub fn to_json_pretty(&self) -> RenderSetupResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Snapshot without engine-owned nodes and the connections that touch them.
    pub fn without_internal(&self) -> Self {
        let internal: Vec<&str> = self
            .nodes
            .iter()
            .filter(|n| n.internal)
            .map(|n| n.path.as_str())
            .collect();
        let touches = |plug: &str| {
            plug.rsplit_once('.')
                .is_some_and(|(node, _)| internal.contains(&node))
        };
        Self {
            nodes: self.nodes.iter().filter(|n| !n.internal).cloned().collect(),
            connections: self
                .connections
                .iter()
                .filter(|c| !touches(&c.src) && !touches(&c.dst))
                .cloned()
                .collect(),
        }
    }

    /// Look up a node by path.
    pub fn node(&self, path: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.path == path)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/snapshot.rs"]
mod tests;
