use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::NodeId;
use crate::plug::value::{PlugType, PlugValue};
use crate::scene::graph::Scene;
use serde::{Deserialize, Serialize};

/// Handle to one attribute of one scene node.
///
/// A plug is a plain address; every operation takes the [`Scene`] it lives in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Plug {
    /// Owning node.
    pub node: NodeId,
    /// Attribute name.
    pub attr: String,
}

impl Plug {
    /// Build a plug address.
    pub fn new(node: NodeId, attr: impl Into<String>) -> Self {
        Self {
            node,
            attr: attr.into(),
        }
    }

    /// Declared type of the attribute.
    pub fn ty(&self, scene: &Scene) -> RenderSetupResult<PlugType> {
        scene
            .attribute(self)
            .map(|a| a.ty)
            .ok_or_else(|| RenderSetupError::scene(format!("no such plug '{}'", self.name(scene))))
    }

    /// Effective value (input connections and apply-override chains evaluated).
    pub fn value(&self, scene: &Scene) -> RenderSetupResult<PlugValue> {
        scene.evaluate(self)
    }

    /// Write a value, coerced to the attribute type. Fails when the plug has an input.
    pub fn set_value(&self, scene: &mut Scene, value: PlugValue) -> RenderSetupResult<()> {
        scene.set_value(self, value)
    }

    /// Return `true` when the plug has an input connection.
    pub fn is_connected(&self, scene: &Scene) -> bool {
        scene.input(self).is_some()
    }

    /// Plug driving this one, if any.
    pub fn source(&self, scene: &Scene) -> Option<Plug> {
        scene.input(self).cloned()
    }

    /// Plugs driven by this one.
    pub fn destinations(&self, scene: &Scene) -> Vec<Plug> {
        scene.outputs(self)
    }

    /// Connect `src -> dst`.
    pub fn connect(scene: &mut Scene, src: &Plug, dst: &Plug) -> RenderSetupResult<()> {
        scene.connect(src, dst)
    }

    /// Break `src -> dst`.
    pub fn disconnect(scene: &mut Scene, src: &Plug, dst: &Plug) -> RenderSetupResult<()> {
        scene.disconnect(src, dst)
    }

    /// Copy `from` onto this plug: its input connection when it has one, its value otherwise.
    pub fn copy_value(&self, scene: &mut Scene, from: &Plug) -> RenderSetupResult<()> {
        if !self.accepts(scene, from)? {
            return Err(RenderSetupError::type_mismatch(format!(
                "'{}' does not accept '{}'",
                self.name(scene),
                from.name(scene)
            )));
        }
        if let Some(src) = scene.input(from).cloned() {
            if let Some(old) = scene.input(self).cloned() {
                scene.disconnect(&old, self)?;
            }
            return scene.connect(&src, self);
        }
        let v = scene.stored_value(from)?.clone();
        scene.set_value(self, v)
    }

    /// Return `true` when a value or connection of `other`'s type can be placed here.
    pub fn accepts(&self, scene: &Scene, other: &Plug) -> RenderSetupResult<bool> {
        let mine = self.ty(scene)?;
        let theirs = other.ty(scene)?;
        Ok(mine.accepts(theirs))
    }

    /// `node.attr` display name using the node's shortest unique name.
    pub fn name(&self, scene: &Scene) -> String {
        match scene.node(self.node) {
            Some(_) => format!("{}.{}", scene.unique_name(self.node), self.attr),
            None => format!("{}.{}", self.node, self.attr),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/plug/handle.rs"]
mod tests;
