use super::Engine;
use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::{ItemId, NodeId};
use crate::setup::layer::{DEFAULT_LEGACY_LAYER, legacy_layer_name};
use std::collections::BTreeSet;

impl Engine {
    /// Layer names in declaration order.
    pub fn render_layers(&self) -> Vec<String> {
        self.setup
            .layers()
            .iter()
            .filter_map(|l| self.setup.item(*l))
            .map(|i| i.name().to_owned())
            .collect()
    }

    /// Legacy render-layer node name backing layer `name`. The default layer maps to itself.
    pub fn legacy_layer(&self, name: &str) -> RenderSetupResult<String> {
        if name == DEFAULT_LEGACY_LAYER {
            return Ok(name.to_owned());
        }
        self.setup
            .layer_by_name(name)
            .map(|_| legacy_layer_name(name))
            .ok_or_else(|| RenderSetupError::structural(format!("unknown render layer '{name}'")))
    }

    /// Bring the selectors of `layer` up to date. The visible layer catches up through the
    /// pending scene events so its applied state stays consistent.
    fn refresh_layer_selectors(&mut self, layer: ItemId) -> RenderSetupResult<()> {
        self.process_events()?;
        if self.setup.visible != Some(layer) {
            let collections = self.setup.collections_recursive(layer);
            self.refresh_selectors(&collections)?;
        }
        Ok(())
    }

    fn layer_ids(&self, layers: &[&str]) -> RenderSetupResult<Vec<Option<ItemId>>> {
        layers
            .iter()
            .map(|name| {
                if *name == DEFAULT_LEGACY_LAYER {
                    return Ok(None);
                }
                self.setup.layer_by_name(name).map(Some).ok_or_else(|| {
                    RenderSetupError::structural(format!("unknown render layer '{name}'"))
                })
            })
            .collect()
    }

    /// Every node selected by some collection of `layer`; the default layer holds every user
    /// node.
    fn layer_members(&mut self, layer: Option<ItemId>) -> RenderSetupResult<BTreeSet<NodeId>> {
        let Some(layer) = layer else {
            return Ok(self.scene.user_node_ids().collect());
        };
        self.refresh_layer_selectors(layer)?;
        let mut out = BTreeSet::new();
        for c in self.setup.collections_recursive(layer) {
            out.extend(self.setup.collection_at(c)?.selector().members().iter().copied());
        }
        Ok(out)
    }

    /// Filter `objects` (every user node when empty) by membership in any of `layers`, or by
    /// non-membership in all of them with `not_in`. Returns unique node names.
    pub fn render_layer_members(
        &mut self,
        objects: &[&str],
        layers: &[&str],
        not_in: bool,
    ) -> RenderSetupResult<Vec<String>> {
        let mut members = BTreeSet::new();
        for layer in self.layer_ids(layers)? {
            members.extend(self.layer_members(layer)?);
        }
        let candidates: Vec<NodeId> = if objects.is_empty() {
            self.scene.user_node_ids().collect()
        } else {
            objects
                .iter()
                .map(|o| self.scene.resolve(o))
                .collect::<RenderSetupResult<_>>()?
        };
        let mut seen = BTreeSet::new();
        Ok(candidates
            .into_iter()
            .filter(|id| members.contains(id) != not_in)
            .filter(|id| seen.insert(*id))
            .map(|id| self.scene.unique_name(id))
            .collect())
    }

    /// Reverse lookup: names of the collections in `layers` (every layer when empty) whose
    /// members include any of `objects`, in document order. With `include_layers` the owning
    /// layer names are listed before their collections.
    pub fn find(
        &mut self,
        objects: &[&str],
        layers: &[&str],
        include_layers: bool,
    ) -> RenderSetupResult<Vec<String>> {
        let ids: Vec<ItemId> = if layers.is_empty() {
            self.setup.layers().to_vec()
        } else {
            self.layer_ids(layers)?.into_iter().flatten().collect()
        };
        let mut out = Vec::new();
        for layer in ids {
            for item in self.find_in(layer, objects, include_layers)? {
                out.push(self.setup.get(item)?.name().to_owned());
            }
        }
        Ok(out)
    }

    /// Collections of `layer` whose members include any node named in `paths`, in document
    /// order. With `include_self` the layer itself leads a non-empty result.
    pub fn find_in(
        &mut self,
        layer: ItemId,
        paths: &[&str],
        include_self: bool,
    ) -> RenderSetupResult<Vec<ItemId>> {
        self.setup.layer_at(layer)?;
        let wanted: BTreeSet<NodeId> = paths
            .iter()
            .map(|p| self.scene.resolve(p))
            .collect::<RenderSetupResult<_>>()?;
        self.refresh_layer_selectors(layer)?;
        let mut out: Vec<ItemId> = Vec::new();
        for c in self.setup.collections_recursive(layer) {
            let members = self.setup.collection_at(c)?.selector().members();
            if members.iter().any(|m| wanted.contains(m)) {
                out.push(c);
            }
        }
        if include_self && !out.is_empty() {
            out.insert(0, layer);
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/query.rs"]
mod tests;
