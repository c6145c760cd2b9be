use crate::engine::Engine;
use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::ItemId;
use crate::renderer::callbacks::DEFAULT_RENDERER;
use crate::selector::eval::{Selector, SelectorKind};
use crate::serialize::document::{
    CollectionBody, Document, LayerBody, LayerDoc, NodeDoc, OverrideBody, RendererSettings,
    SelectorBody, SelectorDoc, SetupDoc,
};
use crate::setup::collection::{Collection, CollectionKind};
use crate::setup::overrides::{Override, OverrideKind};
use crate::setup::tree::{Item, ItemKind, RenderSetup};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

impl Engine {
    /// Encode the whole render setup plus the active renderer's scene settings.
    pub fn encode(&self) -> RenderSetupResult<Document> {
        let mut scene_settings = BTreeMap::new();
        scene_settings.insert(self.config.renderer.clone(), self.encode_scene_settings()?);
        Ok(Document {
            scene_settings,
            render_setup: encode_setup(&self.setup)?,
        })
    }

    /// [`Self::encode`] as pretty-printed JSON.
    pub fn to_json(&self) -> RenderSetupResult<String> {
        Ok(serde_json::to_string_pretty(&self.encode()?)?)
    }

    /// Layer dictionaries of `layers`, the template-file form.
    pub fn encode_layers(&self, layers: &[ItemId]) -> RenderSetupResult<Vec<Value>> {
        layers
            .iter()
            .map(|l| encode_layer(&self.setup, *l))
            .collect()
    }

    fn encode_scene_settings(&self) -> RenderSetupResult<RendererSettings> {
        let renderer = self.config.renderer.as_str();
        let empty = || Value::Object(Map::new());
        let default_nodes = match self.renderers.settings(DEFAULT_RENDERER) {
            Some(cb) => cb.encode(&self.scene)?,
            None => empty(),
        };
        let default_renderer_nodes = match self.renderers.settings(renderer) {
            Some(cb) if renderer != DEFAULT_RENDERER => cb.encode(&self.scene)?,
            _ => empty(),
        };
        let user_data = match self.renderers.aovs(renderer) {
            Some(cb) => cb.encode(&self.scene)?,
            None => empty(),
        };
        Ok(RendererSettings {
            user_data,
            default_nodes,
            default_renderer_nodes,
        })
    }
}

pub(crate) fn encode_setup(rs: &RenderSetup) -> RenderSetupResult<SetupDoc> {
    let render_layers = rs
        .layers()
        .iter()
        .map(|l| encode_layer(rs, *l))
        .collect::<RenderSetupResult<_>>()?;
    let visible_render_layer = match rs.visible_layer() {
        Some(l) => Some(rs.get(l)?.name().to_owned()),
        None => None,
    };
    Ok(SetupDoc {
        render_layers,
        visible_render_layer,
    })
}

pub(crate) fn encode_layer(rs: &RenderSetup, layer: ItemId) -> RenderSetupResult<Value> {
    let item = rs.get(layer)?;
    let l = rs.layer_at(layer)?;
    let collections = l
        .children()
        .iter()
        .map(|c| encode_node(rs, *c))
        .collect::<RenderSetupResult<_>>()?;
    let doc = LayerDoc::RenderSetupLayer(LayerBody {
        name: item.name().to_owned(),
        renderable: l.renderable(),
        self_enabled: item.self_enabled(),
        notes: item.notes().to_owned(),
        collections,
    });
    Ok(serde_json::to_value(doc)?)
}

fn encode_node(rs: &RenderSetup, id: ItemId) -> RenderSetupResult<Value> {
    let item = rs.get(id)?;
    let doc = match item.kind() {
        ItemKind::Collection(c) => encode_collection(rs, item, c)?,
        ItemKind::Override(o) => encode_override(item, o),
        ItemKind::Layer(_) => {
            return Err(RenderSetupError::structural(format!(
                "layer '{}' nested below another item",
                item.name()
            )));
        }
    };
    Ok(serde_json::to_value(doc)?)
}

fn encode_collection(rs: &RenderSetup, item: &Item, c: &Collection) -> RenderSetupResult<NodeDoc> {
    let children = c
        .children()
        .iter()
        .map(|child| encode_node(rs, *child))
        .collect::<RenderSetupResult<_>>()?;
    let aov_name = match c.kind() {
        CollectionKind::AovChild { aov_name } => Some(aov_name.clone()),
        _ => None,
    };
    let body = CollectionBody {
        name: item.name().to_owned(),
        self_enabled: item.self_enabled(),
        isolate_selected: c.isolate_selected(),
        notes: item.notes().to_owned(),
        aov_name,
        selector: Some(encode_selector(c.selector())),
        children,
    };
    Ok(match c.kind() {
        CollectionKind::Standard => NodeDoc::Collection(body),
        CollectionKind::RenderSettings => NodeDoc::RenderSettingsCollection(body),
        CollectionKind::Aovs => NodeDoc::AovCollection(body),
        CollectionKind::AovChild { .. } => NodeDoc::AovChildCollection(body),
        CollectionKind::Lights => NodeDoc::LightsCollection(body),
        CollectionKind::LightsChild => NodeDoc::LightsChildCollection(body),
    })
}

pub(crate) fn encode_selector(s: &Selector) -> SelectorDoc {
    let (include_hierarchy, basic) = match s.kind() {
        SelectorKind::Simple => (None, false),
        SelectorKind::Basic { include_hierarchy } => (Some(include_hierarchy), true),
    };
    let body = SelectorBody {
        pattern: s.pattern().to_owned(),
        static_selection: s.static_selection().to_text(),
        type_filter: s.type_filter(),
        custom_filter_value: s.custom_filter().to_owned(),
        include_hierarchy,
    };
    if basic {
        SelectorDoc::BasicSelector(body)
    } else {
        SelectorDoc::SimpleSelector(body)
    }
}

fn encode_override(item: &Item, o: &Override) -> NodeDoc {
    let mut body = OverrideBody {
        name: item.name().to_owned(),
        self_enabled: item.self_enabled(),
        notes: item.notes().to_owned(),
        target_node_name: o.target_node_name().to_owned(),
        attribute: o.attribute().to_owned(),
        ..OverrideBody::default()
    };
    match o.kind() {
        OverrideKind::Absolute { value } => {
            body.attr_value = Some(value.clone());
            NodeDoc::AbsoluteOverride(body)
        }
        OverrideKind::Relative { multiply, offset } => {
            body.multiply = Some(multiply.clone());
            body.offset = Some(offset.clone());
            NodeDoc::RelativeOverride(body)
        }
        OverrideKind::Connection { source } => {
            body.source = source.clone();
            NodeDoc::ConnectionOverride(body)
        }
        OverrideKind::Shader { shader } => {
            body.source = shader.clone();
            NodeDoc::ShaderOverride(body)
        }
        OverrideKind::Material { material } => {
            body.source = material.clone();
            NodeDoc::MaterialOverride(body)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/serialize/encode.rs"]
mod tests;
