use crate::plug::value::PlugValue;
use crate::selector::filter::TypeFilter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Whole render-setup document: per-renderer scene settings plus the tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Settings by renderer name.
    #[serde(default)]
    pub scene_settings: BTreeMap<String, RendererSettings>,
    /// The tree.
    #[serde(default)]
    pub render_setup: SetupDoc,
}

/// Scene settings captured through one renderer's callbacks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererSettings {
    /// AOV definitions.
    #[serde(default)]
    pub user_data: Value,
    /// Settings of the built-in renderer nodes.
    #[serde(default)]
    pub default_nodes: Value,
    /// Settings of the renderer's own nodes.
    #[serde(default)]
    pub default_renderer_nodes: Value,
}

/// Layers and the visible layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupDoc {
    /// Layer dictionaries, kept raw so each decodes on its own.
    #[serde(default)]
    pub render_layers: Vec<Value>,
    /// Visible layer name; `None` for the default layer.
    #[serde(default)]
    pub visible_render_layer: Option<String>,
}

/// Layer dictionary, keyed by its type name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LayerDoc {
    /// The only layer type.
    #[serde(rename = "renderSetupLayer")]
    RenderSetupLayer(LayerBody),
}

/// Layer attributes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerBody {
    /// Name.
    pub name: String,
    /// Renderable flag.
    #[serde(default = "yes")]
    pub renderable: bool,
    /// Own enabled flag.
    #[serde(default = "yes")]
    pub self_enabled: bool,
    /// Notes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// Top-level collection dictionaries.
    #[serde(default)]
    pub collections: Vec<Value>,
}

/// Collection or override dictionary, keyed by its type name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum NodeDoc {
    Collection(CollectionBody),
    RenderSettingsCollection(CollectionBody),
    AovCollection(CollectionBody),
    AovChildCollection(CollectionBody),
    LightsCollection(CollectionBody),
    LightsChildCollection(CollectionBody),
    AbsoluteOverride(OverrideBody),
    RelativeOverride(OverrideBody),
    ConnectionOverride(OverrideBody),
    ShaderOverride(OverrideBody),
    MaterialOverride(OverrideBody),
}

/// Collection attributes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBody {
    /// Name.
    pub name: String,
    /// Own enabled flag.
    #[serde(default = "yes")]
    pub self_enabled: bool,
    /// Isolate-select flag.
    #[serde(default)]
    pub isolate_selected: bool,
    /// Notes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// AOV name of an `aovChildCollection`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aov_name: Option<String>,
    /// Selector; missing in 2016-R2 documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<SelectorDoc>,
    /// Child collection and override dictionaries.
    #[serde(default)]
    pub children: Vec<Value>,
}

/// Selector dictionary, keyed by its type name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum SelectorDoc {
    SimpleSelector(SelectorBody),
    BasicSelector(SelectorBody),
}

/// Selector attributes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorBody {
    /// Pattern expression.
    #[serde(default)]
    pub pattern: String,
    /// Static node paths, newline separated.
    #[serde(default)]
    pub static_selection: String,
    /// Type filter code.
    #[serde(default)]
    pub type_filter: TypeFilter,
    /// `kCustom` filter value.
    #[serde(default)]
    pub custom_filter_value: String,
    /// Basic selectors only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_hierarchy: Option<bool>,
}

/// Override attributes. Which parameters are present depends on the override type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideBody {
    /// Name.
    pub name: String,
    /// Own enabled flag.
    #[serde(default = "yes")]
    pub self_enabled: bool,
    /// Notes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// Node the attribute type was discovered on.
    #[serde(default)]
    pub target_node_name: String,
    /// Overridden attribute.
    #[serde(default)]
    pub attribute: String,
    /// Absolute value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr_value: Option<PlugValue>,
    /// Relative factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiply: Option<PlugValue>,
    /// Relative offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<PlugValue>,
    /// Connection source (`node.attr`), shader or shading engine name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

fn yes() -> bool {
    true
}
