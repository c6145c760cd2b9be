use crate::apply::node::ApplyKind;
use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::plug::value::{PlugType, PlugValue};

/// Override parameters by variant.
#[derive(Clone, Debug, PartialEq)]
pub enum OverrideKind {
    /// Replace the attribute's value.
    Absolute {
        /// Value written while enabled.
        value: PlugValue,
    },
    /// `out = in * multiply + offset`.
    Relative {
        /// Scalar or per-component factor.
        multiply: PlugValue,
        /// Scalar or per-component offset.
        offset: PlugValue,
    },
    /// Replace the attribute's input connection with `source` (`node.attr`).
    Connection {
        /// Source plug path; `None` leaves the override inert.
        source: Option<String>,
    },
    /// Replace the surface shader of the shading engines assigned to the selected shapes.
    Shader {
        /// Shader node name; its `outColor` drives `surfaceShader`.
        shader: Option<String>,
    },
    /// Reassign the selected shapes to another shading engine.
    Material {
        /// Shading engine node name; its `message` drives `shadingEngine`.
        material: Option<String>,
    },
}

impl OverrideKind {
    /// Document type key (`absoluteOverride`, ...).
    pub fn type_key(&self) -> &'static str {
        match self {
            OverrideKind::Absolute { .. } => "absoluteOverride",
            OverrideKind::Relative { .. } => "relativeOverride",
            OverrideKind::Connection { .. } => "connectionOverride",
            OverrideKind::Shader { .. } => "shaderOverride",
            OverrideKind::Material { .. } => "materialOverride",
        }
    }

    /// Apply-override node kind that realizes this override.
    pub fn apply_kind(&self) -> ApplyKind {
        match self {
            OverrideKind::Absolute { .. } => ApplyKind::Absolute,
            OverrideKind::Relative { .. } => ApplyKind::Relative,
            OverrideKind::Connection { .. }
            | OverrideKind::Shader { .. }
            | OverrideKind::Material { .. } => ApplyKind::Connection,
        }
    }

    /// Return `true` for absolute and relative overrides.
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            OverrideKind::Absolute { .. } | OverrideKind::Relative { .. }
        )
    }

    /// Source plug path of a connection-family override.
    pub fn source_path(&self) -> Option<String> {
        match self {
            OverrideKind::Connection { source } => source.clone(),
            OverrideKind::Shader { shader } => shader.as_ref().map(|s| format!("{s}.outColor")),
            OverrideKind::Material { material } => {
                material.as_ref().map(|m| format!("{m}.message"))
            }
            _ => None,
        }
    }
}

/// Declarative attribute change; a leaf of the render-setup tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Override {
    kind: OverrideKind,
    attribute: String,
    target_node_name: String,
    attr_type: PlugType,
    missing_dependencies: bool,
}

impl Override {
    /// Override of `attribute` with type `attr_type`, discovered on `target_node_name`.
    ///
    /// Value parameters are coerced to `attr_type`; unsupported combinations are a type
    /// mismatch.
    pub fn new(
        kind: OverrideKind,
        attribute: impl Into<String>,
        target_node_name: impl Into<String>,
        attr_type: PlugType,
    ) -> RenderSetupResult<Self> {
        let attribute = attribute.into();
        if attribute.is_empty() {
            return Err(RenderSetupError::structural("override needs an attribute name"));
        }
        let kind = normalize(kind, attr_type)?;
        Ok(Self {
            kind,
            attribute,
            target_node_name: target_node_name.into(),
            attr_type,
            missing_dependencies: false,
        })
    }

    /// Parameters.
    pub fn kind(&self) -> &OverrideKind {
        &self.kind
    }

    /// Replace the parameters (same variant family), coercing values to the attribute type.
    pub fn set_kind(&mut self, kind: OverrideKind) -> RenderSetupResult<()> {
        if std::mem::discriminant(&kind) != std::mem::discriminant(&self.kind) {
            return Err(RenderSetupError::structural(format!(
                "cannot turn a {} into a {}",
                self.kind.type_key(),
                kind.type_key()
            )));
        }
        self.kind = normalize(kind, self.attr_type)?;
        Ok(())
    }

    /// Overridden attribute name.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Node the attribute type was discovered on.
    pub fn target_node_name(&self) -> &str {
        &self.target_node_name
    }

    /// Attribute type.
    pub fn attr_type(&self) -> PlugType {
        self.attr_type
    }

    /// `node.attr` of the discovery node.
    pub fn attribute_path(&self) -> String {
        format!("{}.{}", self.target_node_name, self.attribute)
    }

    /// A dependency (connection source) was missing at the last apply.
    pub fn has_missing_dependencies(&self) -> bool {
        self.missing_dependencies
    }

    pub(crate) fn set_missing_dependencies(&mut self, missing: bool) {
        self.missing_dependencies = missing;
    }
}

fn normalize(kind: OverrideKind, ty: PlugType) -> RenderSetupResult<OverrideKind> {
    Ok(match kind {
        OverrideKind::Absolute { value } => {
            if !ty.supports_absolute() {
                return Err(RenderSetupError::type_mismatch(format!(
                    "absolute override cannot drive {ty}"
                )));
            }
            OverrideKind::Absolute {
                value: value.coerce(ty)?,
            }
        }
        OverrideKind::Relative { multiply, offset } => {
            if !ty.supports_relative() {
                return Err(RenderSetupError::type_mismatch(format!(
                    "relative override cannot drive {ty}"
                )));
            }
            let pt = crate::apply::node::relative_param_type(ty);
            // Scalars broadcast to every component.
            let param = |v: PlugValue| -> RenderSetupResult<PlugValue> {
                match v.components() {
                    Some(c) if c.len() == 1 => {
                        let n = pt.arity().unwrap_or(1);
                        PlugValue::from_components(pt, &vec![c[0]; n]).ok_or_else(|| {
                            RenderSetupError::type_mismatch(format!("cannot build {pt} value"))
                        })
                    }
                    _ => v.coerce(pt),
                }
            };
            OverrideKind::Relative {
                multiply: param(multiply)?,
                offset: param(offset)?,
            }
        }
        other => other,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/setup/overrides.rs"]
mod tests;
