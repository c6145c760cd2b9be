use crate::engine::Engine;
use crate::engine::command::Command;
use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::ItemId;
use crate::plug::handle::Plug;
use crate::plug::value::{PlugType, PlugValue};
use crate::renderer::callbacks::{DEFAULT_RENDERER, RendererRegistry};
use crate::scene::graph::Scene;
use crate::selector::eval::Selector;
use crate::selector::filter::StaticSelection;
use crate::serialize::document::{
    CollectionBody, Document, LayerDoc, NodeDoc, OverrideBody, RendererSettings, SelectorDoc,
    SetupDoc,
};
use crate::serialize::{ImportReport, MergeMode, legacy};
use crate::setup::collection::{Collection, CollectionKind};
use crate::setup::layer::RenderLayer;
use crate::setup::overrides::{Override, OverrideKind};
use crate::setup::tree::{Item, ItemKind, RenderSetup};
use serde_json::Value;
use std::collections::BTreeMap;

impl Engine {
    /// Decode a render-setup document as one undoable step.
    ///
    /// Accepts a full document, a bare `renderSetup` dictionary or a template list of layer
    /// dictionaries. Nodes that fail to decode are skipped and reported; the rest loads.
    #[tracing::instrument(skip(self, doc))]
    pub fn decode(&mut self, doc: &Value, mode: MergeMode) -> RenderSetupResult<ImportReport> {
        let (settings, setup) = split_document(doc)?;
        let SetupDoc {
            mut render_layers,
            visible_render_layer,
        } = setup;
        let mut report = ImportReport {
            migrated: legacy::migrate_layers(&mut render_layers),
            ..ImportReport::default()
        };

        if let Some(settings) = settings.get(&self.config.renderer) {
            self.scene.begin_load();
            self.decode_scene_settings(settings, mode, &mut report.warnings);
            self.scene.end_load();
        }
        self.process_events()?;

        let base = match mode {
            MergeMode::Overwrite => {
                let mut rs = RenderSetup::new();
                rs.default_renderable = self.setup.default_renderable;
                rs
            }
            MergeMode::Merge | MergeMode::Rename => self.setup.clone(),
        };
        let mut decoder = Decoder {
            scene: &self.scene,
            renderers: &self.renderers,
            renderer: &self.config.renderer,
            prefix: &self.config.merge_prefix,
            mode,
            rs: base,
            warnings: Vec::new(),
        };
        for layer in &render_layers {
            match decoder.layer(layer) {
                Ok(id) => report.layers.push(decoder.rs.get(id)?.name().to_owned()),
                Err(e) => decoder.warn("renderSetupLayer", &e),
            }
        }
        let mut next = decoder.rs;
        report.warnings.extend(decoder.warnings);
        if mode == MergeMode::Overwrite {
            next.visible = visible_render_layer
                .as_deref()
                .and_then(|name| next.layer_by_name(name));
        }

        self.execute(Command::ReplaceSetup {
            setup: Box::new(next),
        })?;
        tracing::info!(
            %mode,
            layers = report.layers.len(),
            migrated = report.migrated,
            warnings = report.warnings.len(),
            "decoded render setup"
        );
        Ok(report)
    }

    /// Parse `json` and [`Self::decode`] it.
    pub fn import_json(&mut self, json: &str, mode: MergeMode) -> RenderSetupResult<ImportReport> {
        let doc: Value = serde_json::from_str(json)?;
        self.decode(&doc, mode)
    }

    fn decode_scene_settings(
        &mut self,
        settings: &RendererSettings,
        mode: MergeMode,
        warnings: &mut Vec<String>,
    ) {
        let renderer = self.config.renderer.as_str();
        let mut report = |what: &str, r: RenderSetupResult<()>| {
            if let Err(e) = r {
                tracing::warn!(section = what, error = %e, "scene settings not restored");
                warnings.push(format!("{what}: {e}"));
            }
        };
        if has_content(&settings.default_nodes)
            && let Some(cb) = self.renderers.settings(DEFAULT_RENDERER)
        {
            report("defaultNodes", cb.decode(&mut self.scene, &settings.default_nodes));
        }
        if renderer != DEFAULT_RENDERER
            && has_content(&settings.default_renderer_nodes)
            && let Some(cb) = self.renderers.settings(renderer)
        {
            report(
                "defaultRendererNodes",
                cb.decode(&mut self.scene, &settings.default_renderer_nodes),
            );
        }
        if has_content(&settings.user_data)
            && let Some(cb) = self.renderers.aovs(renderer)
        {
            report("userData", cb.decode(&mut self.scene, &settings.user_data, mode));
        }
    }
}

fn has_content(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Object(m) => !m.is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => true,
    }
}

/// Scene settings and tree of any accepted document shape.
fn split_document(
    doc: &Value,
) -> RenderSetupResult<(BTreeMap<String, RendererSettings>, SetupDoc)> {
    match doc {
        Value::Array(layers) => Ok((
            BTreeMap::new(),
            SetupDoc {
                render_layers: layers.clone(),
                visible_render_layer: None,
            },
        )),
        Value::Object(map) if map.contains_key("renderSetup") => {
            let doc: Document = serde_json::from_value(doc.clone())?;
            Ok((doc.scene_settings, doc.render_setup))
        }
        Value::Object(map) if map.contains_key("renderLayers") => {
            Ok((BTreeMap::new(), serde_json::from_value(doc.clone())?))
        }
        _ => Err(RenderSetupError::serde(
            "expected a render-setup document, a renderSetup dictionary or a list of layers",
        )),
    }
}

/// Selector described by a selector dictionary.
pub(crate) fn decode_selector(doc: SelectorDoc) -> Selector {
    let (selector, body) = match doc {
        SelectorDoc::SimpleSelector(body) => (Selector::simple(), body),
        SelectorDoc::BasicSelector(body) => {
            (Selector::basic(body.include_hierarchy.unwrap_or(false)), body)
        }
    };
    selector
        .with_pattern(body.pattern)
        .with_type_filter(body.type_filter)
        .with_custom_filter(body.custom_filter_value)
        .with_static_selection(StaticSelection::from_text(&body.static_selection))
}

struct Decoder<'a> {
    scene: &'a Scene,
    renderers: &'a RendererRegistry,
    renderer: &'a str,
    prefix: &'a str,
    mode: MergeMode,
    rs: RenderSetup,
    warnings: Vec<String>,
}

impl Decoder<'_> {
    fn warn(&mut self, context: &str, e: &RenderSetupError) {
        tracing::warn!(context, error = %e, "skipped undecodable node");
        self.warnings.push(format!("{context}: {e}"));
    }

    fn item_name(&self, name: &str) -> String {
        match self.mode {
            MergeMode::Overwrite => self.rs.unique_name(name),
            MergeMode::Merge if self.rs.find_by_name(name).is_none() => name.to_owned(),
            MergeMode::Merge | MergeMode::Rename => {
                self.rs.unique_name(&format!("{}{name}", self.prefix))
            }
        }
    }

    fn insert(
        &mut self,
        name: &str,
        kind: ItemKind,
        self_enabled: bool,
        notes: &str,
        parent: Option<ItemId>,
    ) -> RenderSetupResult<ItemId> {
        let mut item = Item::new(self.item_name(name), kind);
        item.self_enabled = self_enabled;
        item.notes = notes.to_owned();
        self.rs.insert(item, parent, None)
    }

    fn children(&mut self, owner: ItemId, children: &[Value]) -> RenderSetupResult<()> {
        let owner_name = self.rs.get(owner)?.name().to_owned();
        for child in children {
            if let Err(e) = self.node(child, owner) {
                self.warn(&owner_name, &e);
            }
        }
        Ok(())
    }

    fn layer(&mut self, value: &Value) -> RenderSetupResult<ItemId> {
        let LayerDoc::RenderSetupLayer(body) = serde_json::from_value(value.clone())?;
        let existing = match self.mode {
            MergeMode::Merge => self.rs.layer_by_name(&body.name),
            MergeMode::Overwrite | MergeMode::Rename => None,
        };
        let id = match existing {
            Some(id) => id,
            None => {
                let layer = RenderLayer {
                    renderable: body.renderable,
                    ..RenderLayer::default()
                };
                self.insert(
                    &body.name,
                    ItemKind::Layer(layer),
                    body.self_enabled,
                    &body.notes,
                    None,
                )?
            }
        };
        self.children(id, &body.collections)?;
        Ok(id)
    }

    fn node(&mut self, value: &Value, parent: ItemId) -> RenderSetupResult<ItemId> {
        let doc: NodeDoc = serde_json::from_value(value.clone())?;
        match doc {
            NodeDoc::Collection(b) => self.collection(CollectionKind::Standard, b, parent),
            NodeDoc::RenderSettingsCollection(b) => {
                self.collection(CollectionKind::RenderSettings, b, parent)
            }
            NodeDoc::AovCollection(b) => self.collection(CollectionKind::Aovs, b, parent),
            NodeDoc::AovChildCollection(b) => {
                let aov_name = match b.aov_name.clone() {
                    Some(n) => n,
                    None => self.aov_name_from_selector(value)?,
                };
                self.collection(CollectionKind::AovChild { aov_name }, b, parent)
            }
            NodeDoc::LightsCollection(b) => self.collection(CollectionKind::Lights, b, parent),
            NodeDoc::LightsChildCollection(b) => {
                self.collection(CollectionKind::LightsChild, b, parent)
            }
            NodeDoc::AbsoluteOverride(mut b) => {
                let value = b.attr_value.take().ok_or_else(|| {
                    RenderSetupError::serde(format!("override '{}' has no attrValue", b.name))
                })?;
                self.override_item(OverrideKind::Absolute { value }, b, parent)
            }
            NodeDoc::RelativeOverride(mut b) => {
                let kind = OverrideKind::Relative {
                    multiply: b.multiply.take().unwrap_or(PlugValue::Double(1.0)),
                    offset: b.offset.take().unwrap_or(PlugValue::Double(0.0)),
                };
                self.override_item(kind, b, parent)
            }
            NodeDoc::ConnectionOverride(mut b) => {
                let source = b.source.take();
                self.override_item(OverrideKind::Connection { source }, b, parent)
            }
            NodeDoc::ShaderOverride(mut b) => {
                let shader = b.source.take();
                self.override_item(OverrideKind::Shader { shader }, b, parent)
            }
            NodeDoc::MaterialOverride(mut b) => {
                let material = b.source.take();
                self.override_item(OverrideKind::Material { material }, b, parent)
            }
        }
    }

    fn aov_name_from_selector(&self, value: &Value) -> RenderSetupResult<String> {
        let selector = value
            .get("aovChildCollection")
            .and_then(|b| b.get("selector"))
            .cloned()
            .unwrap_or(Value::Null);
        self.renderers
            .require_aovs(self.renderer)?
            .get_child_collection_selector_aov_node_from_dict(&selector)
            .ok_or_else(|| RenderSetupError::serde("AOV child collection without an AOV name"))
    }

    fn collection(
        &mut self,
        kind: CollectionKind,
        body: CollectionBody,
        parent: ItemId,
    ) -> RenderSetupResult<ItemId> {
        self.rs.check_collection_parent(parent, &kind)?;
        let selector = body.selector.map(decode_selector).unwrap_or_default();
        let mut collection = Collection::new(kind, selector);
        collection.isolate_selected = body.isolate_selected;
        let id = self.insert(
            &body.name,
            ItemKind::Collection(collection),
            body.self_enabled,
            &body.notes,
            Some(parent),
        )?;
        self.children(id, &body.children)?;
        Ok(id)
    }

    /// Attribute type from the scene when the discovery node still exists, else from the
    /// override's own parameters.
    fn attr_type(&self, kind: &OverrideKind, body: &OverrideBody) -> PlugType {
        let discovered = self
            .scene
            .find(&body.target_node_name)
            .and_then(|id| self.scene.attribute(&Plug::new(id, body.attribute.clone())))
            .map(|a| a.ty);
        if let Some(ty) = discovered {
            return ty;
        }
        match kind {
            OverrideKind::Absolute { value } => value.ty(),
            OverrideKind::Relative { multiply, .. } => multiply.ty(),
            OverrideKind::Connection { .. } => PlugType::Generic,
            OverrideKind::Shader { .. } => PlugType::Color,
            OverrideKind::Material { .. } => PlugType::Message,
        }
    }

    fn override_item(
        &mut self,
        kind: OverrideKind,
        mut body: OverrideBody,
        parent: ItemId,
    ) -> RenderSetupResult<ItemId> {
        self.rs.check_override_parent(parent, &kind)?;
        if body.attribute.is_empty() {
            match &kind {
                OverrideKind::Shader { .. } => body.attribute = "surfaceShader".to_owned(),
                OverrideKind::Material { .. } => body.attribute = "shadingEngine".to_owned(),
                _ => {}
            }
        }
        let ty = self.attr_type(&kind, &body);
        let payload = Override::new(kind, body.attribute, body.target_node_name, ty)?;
        self.insert(
            &body.name,
            ItemKind::Override(payload),
            body.self_enabled,
            &body.notes,
            Some(parent),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/serialize/decode.rs"]
mod tests;
