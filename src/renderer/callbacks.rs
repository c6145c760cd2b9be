use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::NodeId;
use crate::plug::handle::Plug;
use crate::plug::value::PlugValue;
use crate::scene::graph::Scene;
use crate::selector::eval::Selector;
use crate::selector::filter::{StaticSelection, TypeFilter};
use crate::serialize::MergeMode;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Selector inputs handed out by renderer callbacks for AOV collections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectorSpec {
    /// Pattern expression.
    pub pattern: String,
    /// Type filter.
    pub type_filter: TypeFilter,
    /// `kCustom` filter value.
    pub custom_filter: String,
    /// Static node paths.
    pub static_selection: Vec<String>,
}

impl SelectorSpec {
    /// Build the simple selector these inputs describe.
    pub fn to_selector(&self) -> Selector {
        Selector::simple()
            .with_pattern(self.pattern.clone())
            .with_type_filter(self.type_filter)
            .with_custom_filter(self.custom_filter.clone())
            .with_static_selection(StaticSelection::new(self.static_selection.iter().cloned()))
    }
}

/// Render-settings participation of a renderer plug-in.
pub trait RenderSettingsCallbacks {
    /// Names of the nodes holding the renderer's settings.
    fn get_nodes(&self, scene: &Scene) -> Vec<String>;

    /// Settings as a JSON dictionary.
    fn encode(&self, scene: &Scene) -> RenderSetupResult<Value>;

    /// Restore settings from [`Self::encode`] output.
    fn decode(&self, scene: &mut Scene, dict: &Value) -> RenderSetupResult<()>;

    /// Create the settings nodes when missing.
    fn create_default_nodes(&self, scene: &mut Scene) -> RenderSetupResult<()>;
}

/// AOV participation of a renderer plug-in.
pub trait AovCallbacks {
    /// AOV definitions as a JSON dictionary.
    fn encode(&self, scene: &Scene) -> RenderSetupResult<Value>;

    /// Restore AOV definitions.
    fn decode(&self, scene: &mut Scene, dict: &Value, mode: MergeMode) -> RenderSetupResult<()>;

    /// AOV name of an AOV node, `None` for other nodes.
    fn get_aov_name(&self, scene: &Scene, node: NodeId) -> Option<String>;

    /// Selector of the top-level AOV collection named `name`.
    fn get_collection_selector(&self, name: &str) -> SelectorSpec;

    /// Selector of the per-AOV collection named `name` for `aov_name`.
    fn get_child_collection_selector(&self, name: &str, aov_name: &str) -> SelectorSpec;

    /// AOV name recorded in an encoded child collection selector.
    fn get_child_collection_selector_aov_node_from_dict(&self, dict: &Value) -> Option<String>;

    /// Entries of the renderer's AOV menu.
    fn display_menu(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Callbacks of one family, for [`crate::Engine::register_callbacks`].
pub enum RendererCallbacks {
    /// Render settings.
    RenderSettings(Box<dyn RenderSettingsCallbacks>),
    /// AOVs.
    Aovs(Box<dyn AovCallbacks>),
}

#[derive(Default)]
struct RendererEntry {
    settings: Option<Box<dyn RenderSettingsCallbacks>>,
    aovs: Option<Box<dyn AovCallbacks>>,
}

/// Callbacks by renderer name. `default` always has render settings for the built-in
/// `defaultRenderGlobals` and `defaultResolution` nodes.
pub struct RendererRegistry {
    renderers: BTreeMap<String, RendererEntry>,
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.renderers.keys()).finish()
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        let mut r = Self {
            renderers: BTreeMap::new(),
        };
        r.register(
            DEFAULT_RENDERER,
            RendererCallbacks::RenderSettings(Box::new(DefaultRenderSettings)),
        );
        r
    }
}

/// Name of the built-in renderer.
pub const DEFAULT_RENDERER: &str = "default";

impl RendererRegistry {
    /// Register (or replace) callbacks for `renderer`.
    pub fn register(&mut self, renderer: &str, callbacks: RendererCallbacks) {
        let entry = self.renderers.entry(renderer.to_owned()).or_default();
        match callbacks {
            RendererCallbacks::RenderSettings(cb) => entry.settings = Some(cb),
            RendererCallbacks::Aovs(cb) => entry.aovs = Some(cb),
        }
    }

    /// Render-settings callbacks of `renderer`.
    pub fn settings(&self, renderer: &str) -> Option<&dyn RenderSettingsCallbacks> {
        self.renderers.get(renderer)?.settings.as_deref()
    }

    /// AOV callbacks of `renderer`.
    pub fn aovs(&self, renderer: &str) -> Option<&dyn AovCallbacks> {
        self.renderers.get(renderer)?.aovs.as_deref()
    }

    /// AOV callbacks of `renderer`, or a structural error.
    pub fn require_aovs(&self, renderer: &str) -> RenderSetupResult<&dyn AovCallbacks> {
        self.aovs(renderer).ok_or_else(|| {
            RenderSetupError::structural(format!("renderer '{renderer}' has no AOV callbacks"))
        })
    }

    /// Registered renderer names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.renderers.keys().map(String::as_str)
    }
}

const GLOBALS: (&str, &str) = ("defaultRenderGlobals", "renderGlobals");
const RESOLUTION: (&str, &str) = ("defaultResolution", "resolution");

/// Render settings of the built-in renderer: every attribute of the global settings nodes.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRenderSettings;

impl RenderSettingsCallbacks for DefaultRenderSettings {
    fn get_nodes(&self, scene: &Scene) -> Vec<String> {
        [GLOBALS.0, RESOLUTION.0]
            .into_iter()
            .filter(|n| scene.find(n).is_some())
            .map(str::to_owned)
            .collect()
    }

    fn encode(&self, scene: &Scene) -> RenderSetupResult<Value> {
        let mut out = Map::new();
        for name in self.get_nodes(scene) {
            let id = scene.resolve(&name)?;
            let Some(node) = scene.node(id) else {
                continue;
            };
            let mut attrs = Map::new();
            for (attr, a) in node.attributes() {
                if a.value == PlugValue::Message {
                    continue;
                }
                let v = scene.evaluate(&Plug::new(id, attr.clone()))?;
                attrs.insert(attr.clone(), serde_json::to_value(v)?);
            }
            out.insert(name, Value::Object(attrs));
        }
        Ok(Value::Object(out))
    }

    fn decode(&self, scene: &mut Scene, dict: &Value) -> RenderSetupResult<()> {
        let Some(nodes) = dict.as_object() else {
            return Err(RenderSetupError::serde("render settings must be a dictionary"));
        };
        self.create_default_nodes(scene)?;
        for (name, attrs) in nodes {
            let Some(id) = scene.find(name) else {
                tracing::warn!(node = %name, "unknown render settings node");
                continue;
            };
            let Some(attrs) = attrs.as_object() else {
                continue;
            };
            for (attr, v) in attrs {
                let plug = Plug::new(id, attr.clone());
                if scene.attribute(&plug).is_none() || scene.input(&plug).is_some() {
                    continue;
                }
                let v: PlugValue = serde_json::from_value(v.clone())?;
                scene.set_value(&plug, v)?;
            }
        }
        Ok(())
    }

    fn create_default_nodes(&self, scene: &mut Scene) -> RenderSetupResult<()> {
        for (name, ty) in [GLOBALS, RESOLUTION] {
            if scene.find(name).is_none() {
                scene.create_node(ty, name, None)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/renderer/callbacks.rs"]
mod tests;
