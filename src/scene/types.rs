use crate::plug::value::{PlugType, PlugValue};
use std::collections::BTreeMap;

/// Coarse node categories used by the built-in selector type filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeCategory {
    /// DAG transforms (including joints).
    Transform,
    /// DAG shapes (geometry, lights and cameras are shapes too).
    Shape,
    /// Surface/volume/displacement shaders.
    Shader,
    /// Texture nodes.
    Texture,
    /// Light shapes.
    Light,
    /// Object sets (shading engines are sets).
    Set,
    /// Camera shapes.
    Camera,
    /// Procedural creation nodes (`polySphere`, ...).
    Generator,
    /// Shading engines.
    ShadingEngine,
    /// Legacy render layer nodes.
    RenderLayer,
}

/// Template for an attribute created with every node of a type.
#[derive(Clone, Debug, PartialEq)]
pub struct AttrTemplate {
    /// Attribute name.
    pub name: String,
    /// Attribute type.
    pub ty: PlugType,
    /// Initial value.
    pub default: PlugValue,
}

impl AttrTemplate {
    /// Template with the type's zero value.
    pub fn new(name: &str, ty: PlugType) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            default: PlugValue::default_for(ty).unwrap_or(PlugValue::Message),
        }
    }

    /// Template with an explicit initial value.
    pub fn with_default(name: &str, default: PlugValue) -> Self {
        Self {
            name: name.to_owned(),
            ty: default.ty(),
            default,
        }
    }
}

/// Static description of a node type.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeTypeInfo {
    /// Type name (`transform`, `mesh`, `blinn`, ...).
    pub name: String,
    /// DAG nodes live in the transform hierarchy and have `|`-separated paths.
    pub dag: bool,
    /// Categories consulted by built-in type filters.
    pub categories: Vec<NodeCategory>,
    /// Classification strings (`shader/surface`, `geometry`, ...) consulted by custom filters.
    pub classification: Vec<String>,
    /// Attributes every node of this type starts with.
    pub attributes: Vec<AttrTemplate>,
}

/// Registry of node types known to a [`crate::Scene`].
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, NodeTypeInfo>,
}

fn info(
    name: &str,
    dag: bool,
    categories: &[NodeCategory],
    classification: &[&str],
    attributes: Vec<AttrTemplate>,
) -> NodeTypeInfo {
    NodeTypeInfo {
        name: name.to_owned(),
        dag,
        categories: categories.to_vec(),
        classification: classification.iter().map(|s| (*s).to_owned()).collect(),
        attributes,
    }
}

fn transform_attrs() -> Vec<AttrTemplate> {
    let mut v = Vec::new();
    for axis in ["X", "Y", "Z"] {
        v.push(AttrTemplate::new(&format!("translate{axis}"), PlugType::Double));
    }
    for axis in ["X", "Y", "Z"] {
        v.push(AttrTemplate::new(&format!("rotate{axis}"), PlugType::Double));
    }
    for axis in ["X", "Y", "Z"] {
        v.push(AttrTemplate::with_default(
            &format!("scale{axis}"),
            PlugValue::Double(1.0),
        ));
    }
    v.push(AttrTemplate::with_default("visibility", PlugValue::Bool(true)));
    v
}

fn shape_attrs() -> Vec<AttrTemplate> {
    vec![
        AttrTemplate::with_default("visibility", PlugValue::Bool(true)),
        AttrTemplate::with_default("castsShadows", PlugValue::Bool(true)),
        AttrTemplate::with_default("receiveShadows", PlugValue::Bool(true)),
        AttrTemplate::with_default("primaryVisibility", PlugValue::Bool(true)),
        AttrTemplate::new("shadingEngine", PlugType::Message),
    ]
}

fn light_attrs() -> Vec<AttrTemplate> {
    vec![
        AttrTemplate::with_default("visibility", PlugValue::Bool(true)),
        AttrTemplate::with_default("intensity", PlugValue::Float(1.0)),
        AttrTemplate::with_default("color", PlugValue::Color([1.0, 1.0, 1.0])),
        AttrTemplate::with_default("emitDiffuse", PlugValue::Bool(true)),
        AttrTemplate::with_default("emitSpecular", PlugValue::Bool(true)),
    ]
}

fn shader_attrs() -> Vec<AttrTemplate> {
    vec![
        AttrTemplate::with_default("color", PlugValue::Color([0.5, 0.5, 0.5])),
        AttrTemplate::new("transparency", PlugType::Color),
        AttrTemplate::with_default("diffuse", PlugValue::Float(0.8)),
        AttrTemplate::new("outColor", PlugType::Color),
    ]
}

fn texture_attrs() -> Vec<AttrTemplate> {
    vec![
        AttrTemplate::new("outColor", PlugType::Color),
        AttrTemplate::new("outAlpha", PlugType::Float),
        AttrTemplate::new("fileTextureName", PlugType::String),
    ]
}

impl TypeRegistry {
    /// Empty registry; unknown types are still creatable as plain DG nodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the common scene node types.
    pub fn builtin() -> Self {
        use NodeCategory as C;
        let mut r = Self::new();
        r.register(info(
            "transform",
            true,
            &[C::Transform],
            &["drawdb/geometry/transform"],
            transform_attrs(),
        ));
        r.register(info(
            "joint",
            true,
            &[C::Transform],
            &["drawdb/geometry/joint"],
            transform_attrs(),
        ));
        for shape in ["mesh", "nurbsSurface", "subdiv"] {
            r.register(info(
                shape,
                true,
                &[C::Shape],
                &["geometry", "drawdb/geometry/mesh"],
                shape_attrs(),
            ));
        }
        r.register(info(
            "nurbsCurve",
            true,
            &[C::Shape],
            &["geometry/curve"],
            shape_attrs(),
        ));
        let cam = vec![
            AttrTemplate::with_default("focalLength", PlugValue::Double(35.0)),
            AttrTemplate::with_default("renderable", PlugValue::Bool(true)),
        ];
        r.register(info(
            "camera",
            true,
            &[C::Shape, C::Camera],
            &["drawdb/geometry/camera"],
            cam,
        ));
        for light in [
            "pointLight",
            "directionalLight",
            "spotLight",
            "areaLight",
            "ambientLight",
        ] {
            r.register(info(
                light,
                true,
                &[C::Shape, C::Light],
                &["light", "drawdb/light"],
                light_attrs(),
            ));
        }
        for shader in [
            "lambert",
            "blinn",
            "phong",
            "surfaceShader",
            "aiStandardSurface",
        ] {
            r.register(info(
                shader,
                false,
                &[C::Shader],
                &["shader/surface"],
                shader_attrs(),
            ));
        }
        for texture in ["file", "checker", "ramp", "noise"] {
            r.register(info(
                texture,
                false,
                &[C::Texture],
                &["texture/2d"],
                texture_attrs(),
            ));
        }
        r.register(info(
            "shadingEngine",
            false,
            &[C::Set, C::ShadingEngine],
            &["shadingEngine"],
            vec![AttrTemplate::new("surfaceShader", PlugType::Color)],
        ));
        r.register(info("objectSet", false, &[C::Set], &["set"], Vec::new()));
        for generator in ["polySphere", "polyCube", "polyPlane"] {
            r.register(info(
                generator,
                false,
                &[C::Generator],
                &["generator"],
                vec![AttrTemplate::with_default("radius", PlugValue::Double(1.0))],
            ));
        }
        r.register(info(
            "renderGlobals",
            false,
            &[],
            &["renderSettings"],
            vec![
                AttrTemplate::with_default("startFrame", PlugValue::Double(1.0)),
                AttrTemplate::with_default("endFrame", PlugValue::Double(10.0)),
                AttrTemplate::with_default("imageFilePrefix", PlugValue::String(String::new())),
            ],
        ));
        r.register(info(
            "resolution",
            false,
            &[],
            &["renderSettings"],
            vec![
                AttrTemplate::with_default("width", PlugValue::Int(640)),
                AttrTemplate::with_default("height", PlugValue::Int(480)),
            ],
        ));
        r.register(info(
            "renderLayer",
            false,
            &[C::RenderLayer],
            &["renderLayer"],
            vec![
                AttrTemplate::with_default("renderable", PlugValue::Bool(true)),
                AttrTemplate::with_default("visible", PlugValue::Bool(false)),
            ],
        ));
        r
    }

    /// Register (or replace) a type.
    pub fn register(&mut self, info: NodeTypeInfo) {
        self.types.insert(info.name.clone(), info);
    }

    /// Look up a type.
    pub fn get(&self, name: &str) -> Option<&NodeTypeInfo> {
        self.types.get(name)
    }

    /// Return `true` for DAG types. Unknown types are DG nodes.
    pub fn is_dag(&self, name: &str) -> bool {
        self.get(name).is_some_and(|t| t.dag)
    }

    /// Return `true` when `type_name` belongs to `category`.
    pub fn has_category(&self, type_name: &str, category: NodeCategory) -> bool {
        self.get(type_name)
            .is_some_and(|t| t.categories.contains(&category))
    }

    /// Match a custom-filter token against a type: either the exact type name or a
    /// classification, where `shader` also matches `shader/surface`.
    pub fn matches_token(&self, type_name: &str, token: &str) -> bool {
        if type_name == token {
            return true;
        }
        let Some(t) = self.get(type_name) else {
            return false;
        };
        t.classification.iter().any(|c| {
            c == token
                || (c.starts_with(token) && c.as_bytes().get(token.len()) == Some(&b'/'))
        })
    }

    /// Attribute templates for a type (empty for unknown types).
    pub fn attributes(&self, type_name: &str) -> &[AttrTemplate] {
        self.get(type_name)
            .map(|t| t.attributes.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/types.rs"]
mod tests;
