use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of attribute type kinds understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlugType {
    /// Unknown or unsupported attribute.
    Invalid,
    /// Boolean.
    Bool,
    /// 32-bit signed integer.
    Int,
    /// 8-bit unsigned integer.
    Byte,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Time in seconds.
    Time,
    /// Angle in radians.
    Angle,
    /// Linear distance.
    Distance,
    /// Enumerated value (stored as its index).
    Enum,
    /// UTF-8 string.
    String,
    /// Message (connection-only) attribute.
    Message,
    /// RGB color.
    Color,
    /// Two floats.
    Float2,
    /// Three floats.
    Float3,
    /// Two integers.
    Int2,
    /// Three integers.
    Int3,
    /// Two doubles.
    Double2,
    /// Three doubles.
    Double3,
    /// Two shorts.
    Short2,
    /// Three shorts.
    Short3,
    /// 4x4 row-major matrix.
    Matrix,
    /// Three-component vector.
    Vector,
    /// Numeric compound of arbitrary arity.
    NumericCompound,
    /// Opaque, host-defined payload.
    Generic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Family {
    Scalar,
    Tuple,
    Text,
    Message,
    Matrix,
    Generic,
    Invalid,
}

impl PlugType {
    fn family(self) -> Family {
        match self {
            PlugType::Bool
            | PlugType::Int
            | PlugType::Byte
            | PlugType::Float
            | PlugType::Double
            | PlugType::Time
            | PlugType::Angle
            | PlugType::Distance
            | PlugType::Enum => Family::Scalar,
            PlugType::Color
            | PlugType::Float2
            | PlugType::Float3
            | PlugType::Int2
            | PlugType::Int3
            | PlugType::Double2
            | PlugType::Double3
            | PlugType::Short2
            | PlugType::Short3
            | PlugType::Vector
            | PlugType::NumericCompound => Family::Tuple,
            PlugType::String => Family::Text,
            PlugType::Message => Family::Message,
            PlugType::Matrix => Family::Matrix,
            PlugType::Generic => Family::Generic,
            PlugType::Invalid => Family::Invalid,
        }
    }

    /// Number of numeric components, or `None` for non-numeric and variable-arity types.
    pub fn arity(self) -> Option<usize> {
        match self {
            PlugType::Bool
            | PlugType::Int
            | PlugType::Byte
            | PlugType::Float
            | PlugType::Double
            | PlugType::Time
            | PlugType::Angle
            | PlugType::Distance
            | PlugType::Enum => Some(1),
            PlugType::Float2 | PlugType::Int2 | PlugType::Double2 | PlugType::Short2 => Some(2),
            PlugType::Color
            | PlugType::Float3
            | PlugType::Int3
            | PlugType::Double3
            | PlugType::Short3
            | PlugType::Vector => Some(3),
            PlugType::Matrix => Some(16),
            _ => None,
        }
    }

    /// Return `true` when a value or connection of type `other` can be placed on a plug of
    /// this type.
    pub fn accepts(self, other: PlugType) -> bool {
        if self == other {
            return self != PlugType::Invalid;
        }
        match (self.family(), other.family()) {
            (Family::Generic, f) => f != Family::Invalid,
            (Family::Scalar, Family::Scalar) => true,
            (Family::Tuple, Family::Tuple) => true,
            _ => false,
        }
    }

    /// Return `true` for types a relative (`in * multiply + offset`) override can drive.
    pub fn supports_relative(self) -> bool {
        !matches!(self, PlugType::Bool | PlugType::Enum)
            && matches!(self.family(), Family::Scalar | Family::Tuple)
    }

    /// Return `true` for types an absolute override can drive.
    pub fn supports_absolute(self) -> bool {
        !matches!(self.family(), Family::Message | Family::Invalid)
    }
}

impl fmt::Display for PlugType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| format!("{self:?}"));
        f.write_str(&s)
    }
}

/// Tagged attribute value.
///
/// Serialized externally tagged by type name (`{"double": 5.0}`), which is also the form used
/// by render-setup documents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlugValue {
    /// Boolean.
    Bool(bool),
    /// 32-bit signed integer.
    Int(i32),
    /// 8-bit unsigned integer.
    Byte(u8),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Time in seconds.
    Time(f64),
    /// Angle in radians.
    Angle(f64),
    /// Linear distance.
    Distance(f64),
    /// Enumerated value index.
    Enum(i16),
    /// UTF-8 string.
    String(String),
    /// Message attributes carry no data.
    Message,
    /// RGB color.
    Color([f32; 3]),
    /// Two floats.
    Float2([f32; 2]),
    /// Three floats.
    Float3([f32; 3]),
    /// Two integers.
    Int2([i32; 2]),
    /// Three integers.
    Int3([i32; 3]),
    /// Two doubles.
    Double2([f64; 2]),
    /// Three doubles.
    Double3([f64; 3]),
    /// Two shorts.
    Short2([i16; 2]),
    /// Three shorts.
    Short3([i16; 3]),
    /// 4x4 row-major matrix.
    Matrix([f64; 16]),
    /// Three-component vector.
    Vector([f64; 3]),
    /// Numeric compound of arbitrary arity.
    NumericCompound(Vec<f64>),
    /// Opaque, host-defined payload.
    Generic(serde_json::Value),
}

const IDENTITY: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

impl PlugValue {
    /// Type kind of this value.
    pub fn ty(&self) -> PlugType {
        match self {
            PlugValue::Bool(_) => PlugType::Bool,
            PlugValue::Int(_) => PlugType::Int,
            PlugValue::Byte(_) => PlugType::Byte,
            PlugValue::Float(_) => PlugType::Float,
            PlugValue::Double(_) => PlugType::Double,
            PlugValue::Time(_) => PlugType::Time,
            PlugValue::Angle(_) => PlugType::Angle,
            PlugValue::Distance(_) => PlugType::Distance,
            PlugValue::Enum(_) => PlugType::Enum,
            PlugValue::String(_) => PlugType::String,
            PlugValue::Message => PlugType::Message,
            PlugValue::Color(_) => PlugType::Color,
            PlugValue::Float2(_) => PlugType::Float2,
            PlugValue::Float3(_) => PlugType::Float3,
            PlugValue::Int2(_) => PlugType::Int2,
            PlugValue::Int3(_) => PlugType::Int3,
            PlugValue::Double2(_) => PlugType::Double2,
            PlugValue::Double3(_) => PlugType::Double3,
            PlugValue::Short2(_) => PlugType::Short2,
            PlugValue::Short3(_) => PlugType::Short3,
            PlugValue::Matrix(_) => PlugType::Matrix,
            PlugValue::Vector(_) => PlugType::Vector,
            PlugValue::NumericCompound(_) => PlugType::NumericCompound,
            PlugValue::Generic(_) => PlugType::Generic,
        }
    }

    /// Zero value for a type (identity for matrices), or `None` for [`PlugType::Invalid`].
    pub fn default_for(ty: PlugType) -> Option<PlugValue> {
        let v = match ty {
            PlugType::Invalid => return None,
            PlugType::String => PlugValue::String(String::new()),
            PlugType::Message => PlugValue::Message,
            PlugType::Matrix => PlugValue::Matrix(IDENTITY),
            PlugType::NumericCompound => PlugValue::NumericCompound(Vec::new()),
            PlugType::Generic => PlugValue::Generic(serde_json::Value::Null),
            _ => PlugValue::from_components(ty, &[])?,
        };
        Some(v)
    }

    /// Multiplicative identity for a numeric type (all components `1`).
    pub fn ones_for(ty: PlugType) -> Option<PlugValue> {
        let n = ty.arity()?;
        PlugValue::from_components(ty, &vec![1.0; n])
    }

    /// Numeric components of the value, or `None` for non-numeric values.
    pub fn components(&self) -> Option<Vec<f64>> {
        let v = match self {
            PlugValue::Bool(b) => vec![if *b { 1.0 } else { 0.0 }],
            PlugValue::Int(v) => vec![f64::from(*v)],
            PlugValue::Byte(v) => vec![f64::from(*v)],
            PlugValue::Float(v) => vec![f64::from(*v)],
            PlugValue::Double(v)
            | PlugValue::Time(v)
            | PlugValue::Angle(v)
            | PlugValue::Distance(v) => vec![*v],
            PlugValue::Enum(v) => vec![f64::from(*v)],
            PlugValue::Color(a) | PlugValue::Float3(a) => a.iter().map(|x| f64::from(*x)).collect(),
            PlugValue::Float2(a) => a.iter().map(|x| f64::from(*x)).collect(),
            PlugValue::Int2(a) => a.iter().map(|x| f64::from(*x)).collect(),
            PlugValue::Int3(a) => a.iter().map(|x| f64::from(*x)).collect(),
            PlugValue::Double2(a) => a.to_vec(),
            PlugValue::Double3(a) | PlugValue::Vector(a) => a.to_vec(),
            PlugValue::Short2(a) => a.iter().map(|x| f64::from(*x)).collect(),
            PlugValue::Short3(a) => a.iter().map(|x| f64::from(*x)).collect(),
            PlugValue::Matrix(m) => m.to_vec(),
            PlugValue::NumericCompound(v) => v.clone(),
            PlugValue::String(_) | PlugValue::Message | PlugValue::Generic(_) => return None,
        };
        Some(v)
    }

    /// Build a numeric value of type `ty` from components, zero-filling or truncating to the
    /// type's arity. Integer types round to nearest and saturate.
    pub fn from_components(ty: PlugType, c: &[f64]) -> Option<PlugValue> {
        let at = |i: usize| c.get(i).copied().unwrap_or(0.0);
        let f = |i: usize| at(i) as f32;
        let i32_ = |i: usize| at(i).round() as i32;
        let i16_ = |i: usize| at(i).round() as i16;
        let v = match ty {
            PlugType::Bool => PlugValue::Bool(at(0) != 0.0),
            PlugType::Int => PlugValue::Int(i32_(0)),
            PlugType::Byte => PlugValue::Byte(at(0).round().clamp(0.0, 255.0) as u8),
            PlugType::Float => PlugValue::Float(f(0)),
            PlugType::Double => PlugValue::Double(at(0)),
            PlugType::Time => PlugValue::Time(at(0)),
            PlugType::Angle => PlugValue::Angle(at(0)),
            PlugType::Distance => PlugValue::Distance(at(0)),
            PlugType::Enum => PlugValue::Enum(i16_(0)),
            PlugType::Color => PlugValue::Color([f(0), f(1), f(2)]),
            PlugType::Float2 => PlugValue::Float2([f(0), f(1)]),
            PlugType::Float3 => PlugValue::Float3([f(0), f(1), f(2)]),
            PlugType::Int2 => PlugValue::Int2([i32_(0), i32_(1)]),
            PlugType::Int3 => PlugValue::Int3([i32_(0), i32_(1), i32_(2)]),
            PlugType::Double2 => PlugValue::Double2([at(0), at(1)]),
            PlugType::Double3 => PlugValue::Double3([at(0), at(1), at(2)]),
            PlugType::Short2 => PlugValue::Short2([i16_(0), i16_(1)]),
            PlugType::Short3 => PlugValue::Short3([i16_(0), i16_(1), i16_(2)]),
            PlugType::Vector => PlugValue::Vector([at(0), at(1), at(2)]),
            PlugType::Matrix => {
                let mut m = IDENTITY;
                for (i, slot) in m.iter_mut().enumerate() {
                    if let Some(x) = c.get(i) {
                        *slot = *x;
                    }
                }
                PlugValue::Matrix(m)
            }
            PlugType::NumericCompound => PlugValue::NumericCompound(c.to_vec()),
            PlugType::String
            | PlugType::Message
            | PlugType::Generic
            | PlugType::Invalid => return None,
        };
        Some(v)
    }

    /// Convert this value to type `ty` following the promotion rules.
    ///
    /// Scalars convert among each other, numeric tuples convert among each other with zero fill
    /// or truncation (color and float3 are identical layouts), any value becomes generic.
    /// Everything else is a type mismatch.
    pub fn coerce(&self, ty: PlugType) -> RenderSetupResult<PlugValue> {
        let from = self.ty();
        if from == ty {
            return Ok(self.clone());
        }
        if !ty.accepts(from) {
            return Err(RenderSetupError::type_mismatch(format!(
                "cannot convert {from} to {ty}"
            )));
        }
        if ty == PlugType::Generic {
            let v = serde_json::to_value(self)
                .map_err(|e| RenderSetupError::serde(format!("encode generic value: {e}")))?;
            return Ok(PlugValue::Generic(v));
        }
        let c = self
            .components()
            .ok_or_else(|| RenderSetupError::type_mismatch(format!("{from} is not numeric")))?;
        PlugValue::from_components(ty, &c)
            .ok_or_else(|| RenderSetupError::type_mismatch(format!("cannot build {ty} value")))
    }

    /// Compute `self * multiply + offset` component-wise and convert back to this value's type.
    ///
    /// `multiply` and `offset` are either scalars (broadcast) or tuples whose components are
    /// zero-filled to this value's arity.
    pub fn affine(&self, multiply: &PlugValue, offset: &PlugValue) -> RenderSetupResult<PlugValue> {
        let ty = self.ty();
        if !ty.supports_relative() {
            return Err(RenderSetupError::type_mismatch(format!(
                "relative override cannot drive {ty}"
            )));
        }
        let base = self
            .components()
            .ok_or_else(|| RenderSetupError::type_mismatch(format!("{ty} is not numeric")))?;
        let mul = broadcast(multiply, base.len(), "multiply")?;
        let off = broadcast(offset, base.len(), "offset")?;
        let out: Vec<f64> = base
            .iter()
            .zip(mul.iter().zip(off.iter()))
            .map(|(x, (m, o))| x * m + o)
            .collect();
        PlugValue::from_components(ty, &out)
            .ok_or_else(|| RenderSetupError::type_mismatch(format!("cannot build {ty} value")))
    }
}

fn broadcast(v: &PlugValue, n: usize, what: &str) -> RenderSetupResult<Vec<f64>> {
    let c = v.components().ok_or_else(|| {
        RenderSetupError::type_mismatch(format!("relative {what} must be numeric, got {}", v.ty()))
    })?;
    if c.len() == 1 {
        return Ok(vec![c[0]; n]);
    }
    let mut out = c;
    out.resize(n, 0.0);
    Ok(out)
}

impl fmt::Display for PlugValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlugValue::String(s) => write!(f, "{s:?}"),
            PlugValue::Message => f.write_str("<message>"),
            PlugValue::Generic(v) => write!(f, "{v}"),
            other => match other.components() {
                Some(c) if c.len() == 1 => write!(f, "{}", c[0]),
                Some(c) => write!(f, "{c:?}"),
                None => write!(f, "{other:?}"),
            },
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/plug/value.rs"]
mod tests;
