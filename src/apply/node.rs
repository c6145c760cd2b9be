use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::NodeId;
use crate::plug::handle::Plug;
use crate::plug::value::{PlugType, PlugValue};
use crate::scene::graph::{NodeSpec, Scene};
use serde::{Deserialize, Serialize};

pub(crate) const ORIGINAL: &str = "original";
pub(crate) const OUT: &str = "out";
pub(crate) const ENABLED: &str = "enabled";
pub(crate) const VALUE: &str = "value";
pub(crate) const MULTIPLY: &str = "multiply";
pub(crate) const OFFSET: &str = "offset";
pub(crate) const TARGET: &str = "target";

/// Compute kind of an apply-override node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApplyKind {
    /// `out = enabled ? value : original`.
    Absolute,
    /// `out = enabled ? original * multiply + offset : original`.
    Relative,
    /// `out = enabled ? target : original`, where both are connections.
    Connection,
}

impl ApplyKind {
    /// Scene type name of the node.
    pub fn type_name(self) -> &'static str {
        match self {
            ApplyKind::Absolute => "applyAbsoluteOverride",
            ApplyKind::Relative => "applyRelativeOverride",
            ApplyKind::Connection => "applyConnectionOverride",
        }
    }
}

/// Parameter type of relative `multiply`/`offset` for a target type.
pub(crate) fn relative_param_type(ty: PlugType) -> PlugType {
    match ty.arity() {
        Some(1) => PlugType::Double,
        Some(2) => PlugType::Double2,
        Some(3) => PlugType::Double3,
        _ => PlugType::NumericCompound,
    }
}

/// Create a detached apply-override node for a target of type `ty`.
///
/// `original` starts at the type default; the chain splices it in.
pub(crate) fn create(
    scene: &mut Scene,
    kind: ApplyKind,
    name: &str,
    ty: PlugType,
    enabled: bool,
) -> RenderSetupResult<NodeId> {
    let id = scene.create_node_with(
        kind.type_name(),
        name,
        None,
        NodeSpec {
            internal: true,
            compute: Some(kind),
            ..NodeSpec::default()
        },
    )?;
    scene.add_attribute(id, ORIGINAL, ty, None)?;
    scene.add_attribute(id, OUT, ty, None)?;
    scene.add_attribute(id, ENABLED, PlugType::Bool, Some(PlugValue::Bool(enabled)))?;
    match kind {
        ApplyKind::Absolute => scene.add_attribute(id, VALUE, ty, None)?,
        ApplyKind::Relative => {
            let pt = relative_param_type(ty);
            scene.add_attribute(id, MULTIPLY, pt, PlugValue::ones_for(pt))?;
            scene.add_attribute(id, OFFSET, pt, None)?;
        }
        ApplyKind::Connection => scene.add_attribute(id, TARGET, ty, None)?,
    }
    Ok(id)
}

/// Evaluate `out` of an apply-override node.
pub(crate) fn compute(
    scene: &Scene,
    node: NodeId,
    kind: ApplyKind,
    depth: usize,
) -> RenderSetupResult<PlugValue> {
    let enabled = matches!(
        scene.evaluate_at(&Plug::new(node, ENABLED), depth)?,
        PlugValue::Bool(true)
    );
    let original = scene.evaluate_at(&Plug::new(node, ORIGINAL), depth)?;
    if !enabled {
        return Ok(original);
    }
    match kind {
        ApplyKind::Absolute => scene.evaluate_at(&Plug::new(node, VALUE), depth),
        ApplyKind::Relative => {
            let m = scene.evaluate_at(&Plug::new(node, MULTIPLY), depth)?;
            let o = scene.evaluate_at(&Plug::new(node, OFFSET), depth)?;
            original.affine(&m, &o)
        }
        ApplyKind::Connection => {
            let target = Plug::new(node, TARGET);
            if scene.input(&target).is_none() {
                return Err(RenderSetupError::missing_dependency(format!(
                    "connection override node {} has no source",
                    scene.leaf_name(node)
                )));
            }
            scene.evaluate_at(&target, depth)
        }
    }
}

/// Write the enabled flag of an apply-override node.
pub(crate) fn set_enabled(scene: &mut Scene, node: NodeId, enabled: bool) -> RenderSetupResult<()> {
    scene.write_stored(&Plug::new(node, ENABLED), PlugValue::Bool(enabled))
}

#[cfg(test)]
#[path = "../../tests/unit/apply/node.rs"]
mod tests;
