//! Host scalar objects.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use quaddt_core::{ScalarKind, TypeTag};

/// A fixed-width integer scalar as the host boxes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixedInt {
    /// `int8`.
    I8(i8),
    /// `int16`.
    I16(i16),
    /// `int32`.
    I32(i32),
    /// `int64`.
    I64(i64),
    /// `uint8`.
    U8(u8),
    /// `uint16`.
    U16(u16),
    /// `uint32`.
    U32(u32),
    /// `uint64`.
    U64(u64),
}

impl FixedInt {
    /// Scalar kind of the boxed integer.
    pub fn kind(self) -> ScalarKind {
        match self {
            Self::I8(_) => ScalarKind::Int8,
            Self::I16(_) => ScalarKind::Int16,
            Self::I32(_) => ScalarKind::Int32,
            Self::I64(_) => ScalarKind::Int64,
            Self::U8(_) => ScalarKind::UInt8,
            Self::U16(_) => ScalarKind::UInt16,
            Self::U32(_) => ScalarKind::UInt32,
            Self::U64(_) => ScalarKind::UInt64,
        }
    }

    /// Widen to `i128`; every fixed-width value fits.
    pub fn to_i128(self) -> i128 {
        match self {
            Self::I8(v) => v.into(),
            Self::I16(v) => v.into(),
            Self::I32(v) => v.into(),
            Self::I64(v) => v.into(),
            Self::U8(v) => v.into(),
            Self::U16(v) => v.into(),
            Self::U32(v) => v.into(),
            Self::U64(v) => v.into(),
        }
    }

    /// Narrow an `i128` into `kind`, wrapping like a C cast.
    ///
    /// Returns `None` if `kind` is not a fixed-width integer kind.
    pub fn wrapping_from(kind: ScalarKind, v: i128) -> Option<Self> {
        let out = match kind {
            ScalarKind::Int8 => Self::I8(v as i8),
            ScalarKind::Int16 => Self::I16(v as i16),
            ScalarKind::Int32 => Self::I32(v as i32),
            ScalarKind::Int64 => Self::I64(v as i64),
            ScalarKind::UInt8 => Self::U8(v as u8),
            ScalarKind::UInt16 => Self::U16(v as u16),
            ScalarKind::UInt32 => Self::U32(v as u32),
            ScalarKind::UInt64 => Self::U64(v as u64),
            _ => return None,
        };
        Some(out)
    }
}

/// A scalar of a user-defined type: its tag plus a shared payload.
///
/// The payload is released when the last handle to it is dropped.
#[derive(Clone)]
pub struct ForeignScalar {
    tag: TypeTag,
    type_name: Arc<str>,
    payload: Arc<dyn Any + Send + Sync>,
}

impl ForeignScalar {
    /// Wrap `payload` as a scalar of the user type `tag`.
    pub fn new<T: Any + Send + Sync>(tag: TypeTag, type_name: &str, payload: T) -> Self {
        Self {
            tag,
            type_name: Arc::from(type_name),
            payload: Arc::new(payload),
        }
    }

    /// Type tag of the scalar.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Name of the scalar's type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Borrow the payload as `T`, if that is what it holds.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for ForeignScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignScalar")
            .field("tag", &self.tag)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// A host object.
#[derive(Clone, Debug)]
pub enum Value {
    /// The host's null object.
    None,
    /// Boolean.
    Bool(bool),
    /// Arbitrary-precision integer.
    Int(BigInt),
    /// Fixed-width integer scalar.
    Fixed(FixedInt),
    /// Double-precision float.
    Float(f64),
    /// Single-precision float scalar.
    Float32(f32),
    /// Text.
    Str(String),
    /// Sequence of objects.
    List(Vec<Value>),
    /// Scalar of a user-defined type.
    Foreign(ForeignScalar),
}

impl Value {
    /// Host-visible type name.
    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Fixed(v) => v.kind().name(),
            Self::Float(_) => "float",
            Self::Float32(_) => "float32",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Foreign(f) => f.type_name(),
        }
    }

    /// Construct an arbitrary-precision integer object.
    pub fn int(v: impl Into<BigInt>) -> Self {
        Self::Int(v.into())
    }

    /// Borrow the payload of a foreign scalar holding a `T`.
    pub fn foreign_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Foreign(f) => f.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Tag of a foreign scalar.
    pub fn foreign_tag(&self) -> Option<TypeTag> {
        match self {
            Self::Foreign(f) => Some(f.tag()),
            _ => None,
        }
    }

    /// Numeric value as a double, for builtin element storage.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            Self::Int(i) => i.to_f64(),
            Self::Fixed(v) => Some(v.to_i128() as f64),
            Self::Float(f) => Some(*f),
            Self::Float32(f) => Some(f64::from(*f)),
            _ => None,
        }
    }

    /// Integral value, for builtin integer storage. Floats truncate.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Self::Bool(b) => Some(i128::from(*b)),
            Self::Int(i) => i.to_i128(),
            Self::Fixed(v) => Some(v.to_i128()),
            Self::Float(f) if f.is_finite() => Some(*f as i128),
            Self::Float32(f) if f.is_finite() => Some(*f as i128),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Structural equality. Foreign scalars are equal only when they share
    /// a payload; value comparison goes through the scalar type.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Fixed(a), Self::Fixed(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Float32(a), Self::Float32(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Foreign(a), Self::Foreign(b)) => Arc::ptr_eq(&a.payload, &b.payload),
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(BigInt::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_follow_host_conventions() {
        assert_eq!(Value::None.type_name(), "NoneType");
        assert_eq!(Value::int(3).type_name(), "int");
        assert_eq!(Value::Fixed(FixedInt::U16(1)).type_name(), "uint16");
        assert_eq!(Value::Float32(1.0).type_name(), "float32");
        let f = Value::Foreign(ForeignScalar::new(TypeTag(256), "real128", 1u8));
        assert_eq!(f.type_name(), "real128");
        assert_eq!(f.foreign_tag(), Some(TypeTag(256)));
    }

    #[test]
    fn foreign_payload_downcasts_only_to_its_type() {
        let f = Value::Foreign(ForeignScalar::new(TypeTag(300), "thing", 7u32));
        assert_eq!(f.foreign_ref::<u32>(), Some(&7));
        assert_eq!(f.foreign_ref::<i32>(), None);
        assert_eq!(Value::Float(1.0).foreign_ref::<u32>(), None);
    }

    #[test]
    fn wrapping_narrowing_matches_c_casts() {
        assert_eq!(
            FixedInt::wrapping_from(ScalarKind::UInt8, 257),
            Some(FixedInt::U8(1))
        );
        assert_eq!(
            FixedInt::wrapping_from(ScalarKind::Int8, -129),
            Some(FixedInt::I8(127))
        );
        assert_eq!(FixedInt::wrapping_from(ScalarKind::Float64, 1), None);
    }

    #[test]
    fn numeric_views() {
        assert_eq!(Value::Bool(true).as_i128(), Some(1));
        assert_eq!(Value::Float(-2.7).as_i128(), Some(-2));
        assert_eq!(Value::Float(f64::NAN).as_i128(), None);
        assert_eq!(Value::Fixed(FixedInt::I64(-5)).as_f64(), Some(-5.0));
        assert_eq!(Value::Str("x".into()).as_f64(), None);
    }
}
