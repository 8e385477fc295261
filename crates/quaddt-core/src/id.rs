//! Host type tags.

use std::fmt;

use crate::kind::ScalarKind;

/// Identifies an element type inside the host runtime.
///
/// Builtin tags follow the host's own numbering. User-defined types are
/// assigned tags at or above [`TypeTag::USER_BASE`] by the host when
/// their descriptor is registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(pub i32);

impl TypeTag {
    /// Boolean.
    pub const BOOL: Self = Self(0);
    /// Signed 8-bit integer.
    pub const INT8: Self = Self(1);
    /// Unsigned 8-bit integer.
    pub const UINT8: Self = Self(2);
    /// Signed 16-bit integer.
    pub const INT16: Self = Self(3);
    /// Unsigned 16-bit integer.
    pub const UINT16: Self = Self(4);
    /// Signed 32-bit integer.
    pub const INT32: Self = Self(5);
    /// Unsigned 32-bit integer.
    pub const UINT32: Self = Self(6);
    /// Signed 64-bit integer.
    pub const INT64: Self = Self(7);
    /// Unsigned 64-bit integer.
    pub const UINT64: Self = Self(8);
    /// Single-precision float.
    pub const FLOAT32: Self = Self(11);
    /// Double-precision float.
    pub const FLOAT64: Self = Self(12);
    /// First tag handed out to user-defined types.
    pub const USER_BASE: i32 = 256;

    /// Builtin tags in ascending order.
    pub const BUILTINS: [Self; 11] = [
        Self::BOOL,
        Self::INT8,
        Self::UINT8,
        Self::INT16,
        Self::UINT16,
        Self::INT32,
        Self::UINT32,
        Self::INT64,
        Self::UINT64,
        Self::FLOAT32,
        Self::FLOAT64,
    ];

    /// Tag of a builtin element kind, if the host stores that kind natively.
    pub fn of_kind(kind: ScalarKind) -> Option<Self> {
        let tag = match kind {
            ScalarKind::Bool => Self::BOOL,
            ScalarKind::Int8 => Self::INT8,
            ScalarKind::UInt8 => Self::UINT8,
            ScalarKind::Int16 => Self::INT16,
            ScalarKind::UInt16 => Self::UINT16,
            ScalarKind::Int32 => Self::INT32,
            ScalarKind::UInt32 => Self::UINT32,
            ScalarKind::Int64 => Self::INT64,
            ScalarKind::UInt64 => Self::UINT64,
            ScalarKind::Float32 => Self::FLOAT32,
            ScalarKind::Float64 => Self::FLOAT64,
            ScalarKind::BigInt | ScalarKind::Real128 => return None,
        };
        Some(tag)
    }

    /// Element kind of a builtin tag.
    pub fn builtin_kind(self) -> Option<ScalarKind> {
        let kind = match self {
            Self::BOOL => ScalarKind::Bool,
            Self::INT8 => ScalarKind::Int8,
            Self::UINT8 => ScalarKind::UInt8,
            Self::INT16 => ScalarKind::Int16,
            Self::UINT16 => ScalarKind::UInt16,
            Self::INT32 => ScalarKind::Int32,
            Self::UINT32 => ScalarKind::UInt32,
            Self::INT64 => ScalarKind::Int64,
            Self::UINT64 => ScalarKind::UInt64,
            Self::FLOAT32 => ScalarKind::Float32,
            Self::FLOAT64 => ScalarKind::Float64,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether the tag belongs to a user-defined type.
    pub fn is_user_defined(self) -> bool {
        self.0 >= Self::USER_BASE
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for TypeTag {
    fn from(v: i32) -> Self {
        Self(v)
    }
}
