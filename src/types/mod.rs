//! Value types and record layouts for ALICE-Magma
//!
//! Every socket in a graph carries one of a handful of value types. At the
//! compiler boundary these collapse to three canonical primitives (`int32`,
//! `float32`, `bool`) with an arity of 1, 3 or 4. Host data may store wider
//! or narrower primitives; those are converted when a channel is read or
//! written, never inside the interpreter.
//!
//! | Named type | Primitive | Arity |
//! |------------|-----------|-------|
//! | `Float`    | float32   | 1     |
//! | `Int`      | int32     | 1     |
//! | `Bool`     | bool      | 1     |
//! | `Vec3`     | float32   | 3     |
//! | `Quat`     | float32   | 4     |
//!
//! Author: Moroya Sakamoto

mod buffer;
mod channel_map;
mod convert;

pub use buffer::ChannelBuffer;
pub use channel_map::{Channel, ChannelAccessor, ChannelError, ChannelMap};
pub use convert::{check_assignable, f16_to_f32, f32_to_f16};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive element type of a channel or value
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean stored as one byte
    Bool = 0,
    /// Signed 8-bit integer
    Int8 = 1,
    /// Signed 16-bit integer
    Int16 = 2,
    /// Signed 32-bit integer
    Int32 = 3,
    /// Signed 64-bit integer
    Int64 = 4,
    /// Unsigned 8-bit integer
    UInt8 = 5,
    /// Unsigned 16-bit integer
    UInt16 = 6,
    /// Unsigned 32-bit integer
    UInt32 = 7,
    /// Unsigned 64-bit integer
    UInt64 = 8,
    /// IEEE half precision float
    Float16 = 9,
    /// IEEE single precision float
    Float32 = 10,
    /// IEEE double precision float
    Float64 = 11,
}

impl ScalarType {
    /// Size of one element in bytes
    #[inline]
    pub fn size(self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 | ScalarType::Float16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::UInt64 | ScalarType::Float64 => 8,
        }
    }

    /// True for the floating point family
    #[inline]
    pub fn is_float(self) -> bool {
        matches!(
            self,
            ScalarType::Float16 | ScalarType::Float32 | ScalarType::Float64
        )
    }

    /// True for the signed and unsigned integer family
    #[inline]
    pub fn is_int(self) -> bool {
        !self.is_float() && self != ScalarType::Bool
    }

    /// The interpreter-side primitive this type is converted to on read
    #[inline]
    pub fn canonical(self) -> ScalarType {
        if self.is_float() {
            ScalarType::Float32
        } else if self.is_int() {
            ScalarType::Int32
        } else {
            ScalarType::Bool
        }
    }

    /// True when no conversion is needed to hold this type in a temporary
    #[inline]
    pub fn is_canonical(self) -> bool {
        self.canonical() == self
    }

    /// Lowercase storage name, e.g. `float32`
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int8 => "int8",
            ScalarType::Int16 => "int16",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::UInt8 => "uint8",
            ScalarType::UInt16 => "uint16",
            ScalarType::UInt32 => "uint32",
            ScalarType::UInt64 => "uint64",
            ScalarType::Float16 => "float16",
            ScalarType::Float32 => "float32",
            ScalarType::Float64 => "float64",
        }
    }
}

/// A value type: primitive plus arity
///
/// Two types are equal only when both primitive and arity match; the display
/// name is derived, never compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType {
    /// Element primitive
    pub scalar: ScalarType,
    /// Number of elements (1, 3 or 4 at the compiler boundary)
    pub arity: u8,
}

impl DataType {
    /// Single precision scalar
    pub const FLOAT: DataType = DataType::new(ScalarType::Float32, 1);
    /// 32-bit integer scalar
    pub const INT: DataType = DataType::new(ScalarType::Int32, 1);
    /// Boolean scalar
    pub const BOOL: DataType = DataType::new(ScalarType::Bool, 1);
    /// Three component float vector
    pub const VEC3: DataType = DataType::new(ScalarType::Float32, 3);
    /// Quaternion stored as four floats (x, y, z, w)
    pub const QUAT: DataType = DataType::new(ScalarType::Float32, 4);

    /// Create a type from primitive and arity
    #[inline]
    pub const fn new(scalar: ScalarType, arity: u8) -> Self {
        DataType { scalar, arity }
    }

    /// Look up one of the named interpreter types
    pub fn from_name(name: &str) -> Option<DataType> {
        match name {
            "Float" => Some(DataType::FLOAT),
            "Int" => Some(DataType::INT),
            "Bool" => Some(DataType::BOOL),
            "Vec3" => Some(DataType::VEC3),
            "Quat" => Some(DataType::QUAT),
            _ => None,
        }
    }

    /// Names accepted by [`DataType::from_name`]
    pub fn named_types() -> &'static [&'static str] {
        &["Float", "Int", "Bool", "Vec3", "Quat"]
    }

    /// Size of a packed element in bytes
    #[inline]
    pub fn size(self) -> usize {
        self.scalar.size() * self.arity as usize
    }

    /// Size of this type inside the temporary arena
    ///
    /// Every canonical element occupies one 32-bit word, bools included.
    #[inline]
    pub fn arena_size(self) -> usize {
        4 * self.arity as usize
    }

    /// The canonical type a channel of this type reads as
    #[inline]
    pub fn canonical(self) -> DataType {
        DataType::new(self.scalar.canonical(), self.arity)
    }

    /// True if a [`Value`] can hold this type
    pub fn is_value_type(self) -> bool {
        matches!(
            self,
            DataType::FLOAT | DataType::INT | DataType::BOOL | DataType::VEC3 | DataType::QUAT
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DataType::FLOAT => write!(f, "Float"),
            DataType::INT => write!(f, "Int"),
            DataType::BOOL => write!(f, "Bool"),
            DataType::VEC3 => write!(f, "Vec3"),
            DataType::QUAT => write!(f, "Quat"),
            DataType { scalar, arity: 1 } => write!(f, "{}", scalar.name()),
            DataType { scalar, arity } => write!(f, "{}[{}]", scalar.name(), arity),
        }
    }
}

/// The type flowing through a socket at compile time
///
/// Besides plain values, sockets may carry handles to the geometry and
/// particle collaborators bound in the compile context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketType {
    /// A value of the given type
    Data(DataType),
    /// A handle to a set of meshes
    Geometry,
    /// A handle to a particle set
    Particles,
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketType::Data(ty) => write!(f, "{}", ty),
            SocketType::Geometry => write!(f, "Geometry"),
            SocketType::Particles => write!(f, "Particles"),
        }
    }
}

impl From<DataType> for SocketType {
    fn from(ty: DataType) -> Self {
        SocketType::Data(ty)
    }
}

/// A single interpreter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Float scalar
    Float(f32),
    /// Integer scalar
    Int(i32),
    /// Boolean
    Bool(bool),
    /// Float vector
    Vec3(Vec3),
    /// Quaternion
    Quat(Quat),
}

impl Default for Value {
    fn default() -> Self {
        Value::Float(0.0)
    }
}

impl Value {
    /// The type of this value
    #[inline]
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Float(_) => DataType::FLOAT,
            Value::Int(_) => DataType::INT,
            Value::Bool(_) => DataType::BOOL,
            Value::Vec3(_) => DataType::VEC3,
            Value::Quat(_) => DataType::QUAT,
        }
    }

    /// The all-zero value of a type (`Quat` zero is the identity)
    pub fn zero(ty: DataType) -> Option<Value> {
        match ty {
            DataType::FLOAT => Some(Value::Float(0.0)),
            DataType::INT => Some(Value::Int(0)),
            DataType::BOOL => Some(Value::Bool(false)),
            DataType::VEC3 => Some(Value::Vec3(Vec3::ZERO)),
            DataType::QUAT => Some(Value::Quat(Quat::IDENTITY)),
            _ => None,
        }
    }

    /// Float payload (integers and bools are widened)
    #[inline]
    pub fn as_f32(&self) -> f32 {
        match *self {
            Value::Float(v) => v,
            Value::Int(v) => v as f32,
            Value::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Vec3(v) => v.x,
            Value::Quat(q) => q.x,
        }
    }

    /// Integer payload (floats truncate)
    #[inline]
    pub fn as_i32(&self) -> i32 {
        match *self {
            Value::Float(v) => v as i32,
            Value::Int(v) => v,
            Value::Bool(v) => v as i32,
            Value::Vec3(v) => v.x as i32,
            Value::Quat(q) => q.x as i32,
        }
    }

    /// Boolean payload (non-zero numbers are true)
    #[inline]
    pub fn as_bool(&self) -> bool {
        match *self {
            Value::Float(v) => v != 0.0,
            Value::Int(v) => v != 0,
            Value::Bool(v) => v,
            Value::Vec3(v) => v != Vec3::ZERO,
            Value::Quat(q) => q != Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
        }
    }

    /// Vector payload (scalars splat)
    #[inline]
    pub fn as_vec3(&self) -> Vec3 {
        match *self {
            Value::Vec3(v) => v,
            Value::Quat(q) => Vec3::new(q.x, q.y, q.z),
            other => Vec3::splat(other.as_f32()),
        }
    }

    /// Quaternion payload
    #[inline]
    pub fn as_quat(&self) -> Quat {
        match *self {
            Value::Quat(q) => q,
            Value::Vec3(v) => Quat::from_xyzw(v.x, v.y, v.z, 0.0),
            _ => Quat::IDENTITY,
        }
    }

    /// Raw 32-bit words of this value in arena order
    pub fn to_words(&self) -> ([u32; 4], usize) {
        match *self {
            Value::Float(v) => ([v.to_bits(), 0, 0, 0], 1),
            Value::Int(v) => ([v as u32, 0, 0, 0], 1),
            Value::Bool(v) => ([v as u32, 0, 0, 0], 1),
            Value::Vec3(v) => ([v.x.to_bits(), v.y.to_bits(), v.z.to_bits(), 0], 3),
            Value::Quat(q) => (
                [q.x.to_bits(), q.y.to_bits(), q.z.to_bits(), q.w.to_bits()],
                4,
            ),
        }
    }

    /// Rebuild a value of `ty` from arena words
    ///
    /// Returns `None` for types a [`Value`] cannot hold.
    pub fn from_words(ty: DataType, words: &[u32]) -> Option<Value> {
        let f = |i: usize| f32::from_bits(words[i]);
        match ty {
            DataType::FLOAT => Some(Value::Float(f(0))),
            DataType::INT => Some(Value::Int(words[0] as i32)),
            DataType::BOOL => Some(Value::Bool(words[0] != 0)),
            DataType::VEC3 => Some(Value::Vec3(Vec3::new(f(0), f(1), f(2)))),
            DataType::QUAT => Some(Value::Quat(Quat::from_xyzw(f(0), f(1), f(2), f(3)))),
            _ => None,
        }
    }

    /// Hashable identity of this value (type tag plus bit pattern)
    ///
    /// Used to deduplicate constants; `-0.0` and `0.0` are distinct keys.
    #[inline]
    pub fn key(&self) -> (DataType, [u32; 4]) {
        (self.data_type(), self.to_words().0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Vec3(v) => write!(f, "[{}, {}, {}]", v.x, v.y, v.z),
            Value::Quat(q) => write!(f, "quat[{}, {}, {}, {}]", q.x, q.y, q.z, q.w),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::Vec3(v)
    }
}

impl From<Quat> for Value {
    fn from(q: Quat) -> Self {
        Value::Quat(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_types() {
        for name in DataType::named_types() {
            let ty = DataType::from_name(name).unwrap();
            assert_eq!(ty.to_string(), *name);
        }
        assert!(DataType::from_name("Vec4").is_none());
    }

    #[test]
    fn test_type_equality_ignores_names() {
        assert_eq!(DataType::new(ScalarType::Float32, 3), DataType::VEC3);
        assert_ne!(DataType::new(ScalarType::Float64, 3), DataType::VEC3);
        assert_ne!(DataType::new(ScalarType::Float32, 4), DataType::VEC3);
    }

    #[test]
    fn test_canonical_types() {
        assert_eq!(ScalarType::Float16.canonical(), ScalarType::Float32);
        assert_eq!(ScalarType::UInt64.canonical(), ScalarType::Int32);
        assert_eq!(ScalarType::Bool.canonical(), ScalarType::Bool);
        assert!(ScalarType::Int32.is_canonical());
        assert!(!ScalarType::Int8.is_canonical());
    }

    #[test]
    fn test_value_words() {
        let v = Value::Vec3(Vec3::new(1.0, -2.0, 3.5));
        let (words, n) = v.to_words();
        assert_eq!(n, 3);
        assert_eq!(Value::from_words(DataType::VEC3, &words[..n]), Some(v));

        let b = Value::Bool(true);
        let (words, _) = b.to_words();
        assert_eq!(Value::from_words(DataType::BOOL, &words), Some(b));
    }

    #[test]
    fn test_value_key_distinguishes_types() {
        assert_ne!(Value::Float(1.0).key(), Value::Int(1).key());
        assert_eq!(Value::Float(2.0).key(), Value::Float(2.0).key());
    }
}
