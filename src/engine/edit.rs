use super::Engine;
use super::command::Command;
use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::ItemId;
use crate::plug::value::{PlugType, PlugValue};
use crate::selector::eval::Selector;
use crate::selector::filter::{StaticSelection, TypeFilter};
use crate::selector::pattern::ALL_NAMESPACES;
use crate::setup::collection::CollectionKind;
use crate::setup::overrides::{Override, OverrideKind};

impl Engine {
    /// Create a render layer. `name` is made unique across the render setup.
    pub fn create_layer(&mut self, name: &str) -> RenderSetupResult<ItemId> {
        let name = self.setup.unique_name(name);
        let cmd = Command::CreateLayer { name, id: None };
        self.execute_create(cmd)
    }

    /// Create a standard collection with an empty simple selector under a layer or collection.
    pub fn create_collection(&mut self, parent: ItemId, name: &str) -> RenderSetupResult<ItemId> {
        self.create_collection_of(parent, name, CollectionKind::Standard, Selector::simple())
    }

    /// Create a collection of any kind with `selector`.
    ///
    /// Render-settings and AOV collections take their selector from the active renderer's
    /// callbacks instead; `selector` is ignored for them.
    pub fn create_collection_of(
        &mut self,
        parent: ItemId,
        name: &str,
        kind: CollectionKind,
        selector: Selector,
    ) -> RenderSetupResult<ItemId> {
        let selector = self.selector_for(&kind, name, selector)?;
        let name = self.setup.unique_name(name);
        let cmd = Command::CreateCollection {
            parent,
            name,
            kind,
            selector,
            id: None,
        };
        self.execute_create(cmd)
    }

    fn selector_for(
        &self,
        kind: &CollectionKind,
        name: &str,
        selector: Selector,
    ) -> RenderSetupResult<Selector> {
        let renderer = self.config.renderer.as_str();
        Ok(match kind {
            CollectionKind::RenderSettings => {
                let nodes = self
                    .renderers
                    .settings(renderer)
                    .map(|cb| cb.get_nodes(&self.scene))
                    .unwrap_or_default();
                Selector::simple().with_static_selection(StaticSelection::new(nodes))
            }
            CollectionKind::Aovs => self
                .renderers
                .require_aovs(renderer)?
                .get_collection_selector(name)
                .to_selector(),
            CollectionKind::AovChild { aov_name } => self
                .renderers
                .require_aovs(renderer)?
                .get_child_collection_selector(name, aov_name)
                .to_selector(),
            CollectionKind::Lights => Selector::simple()
                .with_pattern(ALL_NAMESPACES)
                .with_type_filter(TypeFilter::Lights),
            CollectionKind::Standard | CollectionKind::LightsChild => selector,
        })
    }

    /// Create an override of `attr_path` (`node.attr`). The attribute type is discovered on
    /// that node; `kind` parameters are coerced to it.
    pub fn create_override(
        &mut self,
        collection: ItemId,
        name: &str,
        attr_path: &str,
        kind: OverrideKind,
    ) -> RenderSetupResult<ItemId> {
        let plug = self.scene.plug(attr_path)?;
        let ty = plug.ty(&self.scene)?;
        let node_name = self.scene.leaf_name(plug.node).to_owned();
        let payload = Override::new(kind, plug.attr, node_name, ty)?;
        self.create_with_payload(collection, name, payload)
    }

    /// Absolute override of `attr_path`, initialized to the attribute's current value.
    pub fn create_absolute_override(
        &mut self,
        collection: ItemId,
        name: &str,
        attr_path: &str,
    ) -> RenderSetupResult<ItemId> {
        let value = self.plug_value(attr_path)?;
        self.create_override(collection, name, attr_path, OverrideKind::Absolute { value })
    }

    /// Relative override of `attr_path`, initialized to the identity (multiply 1, offset 0).
    pub fn create_relative_override(
        &mut self,
        collection: ItemId,
        name: &str,
        attr_path: &str,
    ) -> RenderSetupResult<ItemId> {
        self.create_override(
            collection,
            name,
            attr_path,
            OverrideKind::Relative {
                multiply: PlugValue::Double(1.0),
                offset: PlugValue::Double(0.0),
            },
        )
    }

    /// Connection override of `attr_path` from `source` (`node.attr`).
    pub fn create_connection_override(
        &mut self,
        collection: ItemId,
        name: &str,
        attr_path: &str,
        source: Option<&str>,
    ) -> RenderSetupResult<ItemId> {
        let kind = OverrideKind::Connection {
            source: source.map(str::to_owned),
        };
        self.create_override(collection, name, attr_path, kind)
    }

    /// Shader override: the collection's shapes render with `shader`.
    pub fn create_shader_override(
        &mut self,
        collection: ItemId,
        name: &str,
        shader: Option<&str>,
    ) -> RenderSetupResult<ItemId> {
        let kind = OverrideKind::Shader {
            shader: shader.map(str::to_owned),
        };
        let payload = Override::new(kind, "surfaceShader", "", PlugType::Color)?;
        self.create_with_payload(collection, name, payload)
    }

    /// Material override: the collection's shapes are assigned to shading engine `material`.
    pub fn create_material_override(
        &mut self,
        collection: ItemId,
        name: &str,
        material: Option<&str>,
    ) -> RenderSetupResult<ItemId> {
        let kind = OverrideKind::Material {
            material: material.map(str::to_owned),
        };
        let payload = Override::new(kind, "shadingEngine", "", PlugType::Message)?;
        self.create_with_payload(collection, name, payload)
    }

    fn create_with_payload(
        &mut self,
        collection: ItemId,
        name: &str,
        payload: Override,
    ) -> RenderSetupResult<ItemId> {
        let name = self.setup.unique_name(name);
        let cmd = Command::CreateOverride {
            collection,
            name,
            payload,
            id: None,
        };
        self.execute_create(cmd)
    }

    /// Replace an override's parameters (same variant).
    pub fn set_override_kind(&mut self, item: ItemId, kind: OverrideKind) -> RenderSetupResult<()> {
        self.execute(Command::SetOverrideKind { item, kind })
    }

    /// Set the value of an absolute override.
    pub fn set_absolute_value(&mut self, item: ItemId, value: PlugValue) -> RenderSetupResult<()> {
        self.set_override_kind(item, OverrideKind::Absolute { value })
    }

    /// Set the parameters of a relative override.
    pub fn set_relative_values(
        &mut self,
        item: ItemId,
        multiply: PlugValue,
        offset: PlugValue,
    ) -> RenderSetupResult<()> {
        self.set_override_kind(item, OverrideKind::Relative { multiply, offset })
    }

    /// Set (or clear) the source of a connection override.
    pub fn set_connection_source(
        &mut self,
        item: ItemId,
        source: Option<&str>,
    ) -> RenderSetupResult<()> {
        let kind = match self.setup.override_at(item)?.kind() {
            OverrideKind::Connection { .. } => OverrideKind::Connection {
                source: source.map(str::to_owned),
            },
            OverrideKind::Shader { .. } => OverrideKind::Shader {
                shader: source.map(str::to_owned),
            },
            OverrideKind::Material { .. } => OverrideKind::Material {
                material: source.map(str::to_owned),
            },
            other => {
                return Err(RenderSetupError::structural(format!(
                    "a {} has no connection source",
                    other.type_key()
                )));
            }
        };
        self.set_override_kind(item, kind)
    }

    /// Delete a layer, collection or override with everything below it.
    pub fn delete_item(&mut self, item: ItemId) -> RenderSetupResult<()> {
        self.execute(Command::DeleteItem {
            item,
            removed: None,
        })
    }

    /// Delete several items as one undoable step.
    pub fn delete_items(&mut self, items: &[ItemId]) -> RenderSetupResult<()> {
        let cmds = items
            .iter()
            .map(|item| Command::DeleteItem {
                item: *item,
                removed: None,
            })
            .collect();
        self.execute(Command::Batch(cmds))
    }

    /// Rename an item; a layer's legacy node follows.
    pub fn rename_item(&mut self, item: ItemId, name: &str) -> RenderSetupResult<()> {
        self.execute(Command::Rename {
            item,
            name: name.to_owned(),
        })
    }

    /// Set an item's own enabled flag.
    pub fn set_self_enabled(&mut self, item: ItemId, enabled: bool) -> RenderSetupResult<()> {
        self.execute(Command::SetSelfEnabled { item, enabled })
    }

    /// Set a collection's isolate-select flag.
    pub fn set_isolate_selected(
        &mut self,
        collection: ItemId,
        isolate: bool,
    ) -> RenderSetupResult<()> {
        self.execute(Command::SetIsolateSelected {
            collection,
            isolate,
        })
    }

    /// Set the renderable flag of a layer (`None` for the default layer).
    pub fn set_renderable(
        &mut self,
        layer: Option<ItemId>,
        renderable: bool,
    ) -> RenderSetupResult<()> {
        self.execute(Command::SetRenderable { layer, renderable })
    }

    /// Set an item's notes.
    pub fn set_notes(&mut self, item: ItemId, notes: &str) -> RenderSetupResult<()> {
        self.execute(Command::SetNotes {
            item,
            notes: notes.to_owned(),
        })
    }

    /// Replace a collection's selector.
    pub fn set_selector(
        &mut self,
        collection: ItemId,
        selector: Selector,
    ) -> RenderSetupResult<()> {
        self.execute(Command::SetSelector {
            collection,
            selector,
        })
    }

    fn edit_selector(
        &mut self,
        collection: ItemId,
        f: impl FnOnce(&mut Selector),
    ) -> RenderSetupResult<()> {
        let mut selector = self.setup.collection_at(collection)?.selector().clone();
        f(&mut selector);
        self.set_selector(collection, selector)
    }

    /// Set a collection's selector pattern.
    pub fn set_selector_pattern(
        &mut self,
        collection: ItemId,
        pattern: &str,
    ) -> RenderSetupResult<()> {
        self.edit_selector(collection, |s| s.set_pattern(pattern))
    }

    /// Set a collection's static selection.
    pub fn set_static_selection(
        &mut self,
        collection: ItemId,
        selection: StaticSelection,
    ) -> RenderSetupResult<()> {
        self.edit_selector(collection, |s| s.set_static_selection(selection))
    }

    /// Set a collection's type filter.
    pub fn set_type_filter(
        &mut self,
        collection: ItemId,
        filter: TypeFilter,
    ) -> RenderSetupResult<()> {
        self.edit_selector(collection, |s| s.set_type_filter(filter))
    }

    /// Set a collection's `kCustom` filter value.
    pub fn set_custom_filter(&mut self, collection: ItemId, value: &str) -> RenderSetupResult<()> {
        self.edit_selector(collection, |s| s.set_custom_filter(value))
    }

    /// Make `layer` visible (`None` for the default layer) as one undoable step.
    pub fn switch_to_layer(&mut self, layer: Option<ItemId>) -> RenderSetupResult<()> {
        if self.setup.visible == layer {
            return Ok(());
        }
        self.execute(Command::SwitchVisibleLayer { layer })
    }

    /// Re-realize an override, or the overrides below a collection, in the visible layer.
    /// Returns `false` when the item's layer is not visible.
    pub fn post_apply(&mut self, item: ItemId) -> RenderSetupResult<bool> {
        let visible = self
            .setup
            .layer_of(item)
            .is_some_and(|l| self.setup.visible == Some(l));
        if !visible {
            return Ok(false);
        }
        self.execute(Command::PostApply {
            item,
            was_applied: false,
        })?;
        Ok(true)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/edit.rs"]
mod tests;
