use crate::foundation::error::RenderSetupError;
use crate::foundation::ids::NodeId;
use crate::scene::graph::Scene;
use crate::scene::types::NodeCategory;
use serde::{Deserialize, Serialize};

/// Node-type filter of a selector.
///
/// Serialized as its integer code (`kAll` = 0 ... `kCustom` = 11).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TypeFilter {
    /// Every node.
    #[default]
    All,
    /// Transforms.
    Transforms,
    /// Shapes.
    Shapes,
    /// Shaders.
    Shaders,
    /// Lights.
    Lights,
    /// Sets.
    Sets,
    /// Cameras.
    Cameras,
    /// Generators.
    Generators,
    /// Shading engines.
    ShadingEngines,
    /// Transforms and shapes.
    TransformsAndShapes,
    /// Transforms, shapes and shaders.
    TransformsShapesShaders,
    /// User-supplied list of type names and classifications.
    Custom,
}

const ALL_FILTERS: [TypeFilter; 12] = [
    TypeFilter::All,
    TypeFilter::Transforms,
    TypeFilter::Shapes,
    TypeFilter::Shaders,
    TypeFilter::Lights,
    TypeFilter::Sets,
    TypeFilter::Cameras,
    TypeFilter::Generators,
    TypeFilter::ShadingEngines,
    TypeFilter::TransformsAndShapes,
    TypeFilter::TransformsShapesShaders,
    TypeFilter::Custom,
];

impl TypeFilter {
    /// Integer code used in documents.
    pub fn code(self) -> u8 {
        ALL_FILTERS.iter().position(|f| *f == self).unwrap_or(0) as u8
    }

    /// Filter for an integer code.
    pub fn from_code(code: u8) -> Option<Self> {
        ALL_FILTERS.get(usize::from(code)).copied()
    }

    /// Whether the filter can accept shading engines or shaders.
    pub(crate) fn selects_shading(self) -> bool {
        matches!(
            self,
            TypeFilter::Shaders
                | TypeFilter::ShadingEngines
                | TypeFilter::TransformsShapesShaders
                | TypeFilter::Custom
        )
    }

    /// Host-style name (`kTransforms`, ...).
    pub fn name(self) -> &'static str {
        match self {
            TypeFilter::All => "kAll",
            TypeFilter::Transforms => "kTransforms",
            TypeFilter::Shapes => "kShapes",
            TypeFilter::Shaders => "kShaders",
            TypeFilter::Lights => "kLights",
            TypeFilter::Sets => "kSets",
            TypeFilter::Cameras => "kCameras",
            TypeFilter::Generators => "kGenerators",
            TypeFilter::ShadingEngines => "kShadingEngines",
            TypeFilter::TransformsAndShapes => "kTransformsAndShapes",
            TypeFilter::TransformsShapesShaders => "kTransformsShapesShaders",
            TypeFilter::Custom => "kCustom",
        }
    }

    /// Parse a host-style name.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_FILTERS.iter().copied().find(|f| f.name() == name)
    }

    /// Return `true` when node `id` passes this filter. `custom` is consulted for
    /// [`TypeFilter::Custom`] only.
    pub fn accepts(self, scene: &Scene, id: NodeId, custom: &CustomFilter) -> bool {
        use NodeCategory as C;
        let has = |c| scene.has_category(id, c);
        match self {
            TypeFilter::All => true,
            TypeFilter::Transforms => has(C::Transform),
            TypeFilter::Shapes => has(C::Shape),
            TypeFilter::Shaders => has(C::Shader),
            TypeFilter::Lights => has(C::Light),
            TypeFilter::Sets => has(C::Set),
            TypeFilter::Cameras => has(C::Camera),
            TypeFilter::Generators => has(C::Generator),
            TypeFilter::ShadingEngines => has(C::ShadingEngine),
            TypeFilter::TransformsAndShapes => has(C::Transform) || has(C::Shape),
            TypeFilter::TransformsShapesShaders => {
                has(C::Transform) || has(C::Shape) || has(C::Shader)
            }
            TypeFilter::Custom => scene
                .node(id)
                .is_some_and(|n| custom.accepts(scene, n.type_name())),
        }
    }
}

impl From<TypeFilter> for u8 {
    fn from(f: TypeFilter) -> Self {
        f.code()
    }
}

impl TryFrom<u8> for TypeFilter {
    type Error = RenderSetupError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
            .ok_or_else(|| RenderSetupError::selector(format!("unknown type filter code {code}")))
    }
}

/// Parsed `kCustom` filter: whitespace-separated type names or classifications, with a `-`
/// prefix excluding instead of including.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl CustomFilter {
    /// Parse a custom filter value.
    pub fn parse(value: &str) -> Self {
        let mut f = Self::default();
        for token in value.split_whitespace() {
            match token.strip_prefix('-') {
                Some(t) if !t.is_empty() => f.exclude.push(t.to_owned()),
                Some(_) => {}
                None => f.include.push(token.to_owned()),
            }
        }
        f
    }

    /// Return `true` when the filter has no tokens at all.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// An empty include list admits every type not excluded.
    pub fn accepts(&self, scene: &Scene, type_name: &str) -> bool {
        let types = scene.types();
        if self.exclude.iter().any(|t| types.matches_token(type_name, t)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|t| types.matches_token(type_name, t))
    }
}

/// Static selection entry with its derived status bits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticEntry {
    /// Node path as stored.
    pub path: String,
    /// Resolved node, when it exists.
    pub node: Option<NodeId>,
    /// The node no longer exists.
    pub missing: bool,
    /// The node exists but does not pass the type filter.
    pub filtered_out: bool,
}

/// Explicit list of node paths added to a selector.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticSelection {
    paths: Vec<String>,
}

impl StaticSelection {
    /// Selection from a list of paths; duplicates are dropped.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut s = Self::default();
        for p in paths {
            s.add(p);
        }
        s
    }

    /// Parse the newline-separated document form.
    pub fn from_text(text: &str) -> Self {
        Self::new(text.lines().map(str::trim).filter(|l| !l.is_empty()))
    }

    /// Newline-separated document form.
    pub fn to_text(&self) -> String {
        self.paths.join("\n")
    }

    /// Stored paths in insertion order.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Return `true` when the selection is empty.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Add a path. Returns `false` when it was already present.
    pub fn add(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.paths.contains(&path) {
            return false;
        }
        self.paths.push(path);
        true
    }

    /// Remove a path. Returns `false` when it was not present.
    pub fn remove(&mut self, path: &str) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p != path);
        self.paths.len() != before
    }

    /// Rewrite paths after a node moved from `old` to `new`, descendants included.
    /// Returns `true` when anything changed.
    pub fn rename_prefix(&mut self, old: &str, new: &str) -> bool {
        let mut changed = false;
        for p in &mut self.paths {
            if p == old {
                *p = new.to_owned();
                changed = true;
            } else if let Some(rest) = p.strip_prefix(old)
                && rest.starts_with('|')
            {
                *p = format!("{new}{rest}");
                changed = true;
            }
        }
        changed
    }

    /// Resolve every path and derive its status bits.
    pub fn entries(
        &self,
        scene: &Scene,
        filter: TypeFilter,
        custom: &CustomFilter,
    ) -> Vec<StaticEntry> {
        self.paths
            .iter()
            .map(|path| {
                let node = scene
                    .find(path)
                    .filter(|id| scene.node(*id).is_some_and(|n| !n.is_internal()));
                StaticEntry {
                    path: path.clone(),
                    node,
                    missing: node.is_none(),
                    filtered_out: node.is_some_and(|id| !filter.accepts(scene, id, custom)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/selector/filter.rs"]
mod tests;
