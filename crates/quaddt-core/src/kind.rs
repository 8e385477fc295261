//! The closed set of scalar kinds and the promotion lattice between them.
//!
//! Every operand the arithmetic adapter accepts falls into one of four
//! [`NumericClass`]es: fixed-width integers (including booleans),
//! arbitrary-precision integers, native floats of a given width, and the
//! foreign quad-precision type. Mixed operations promote both sides to
//! the least kind both can be cast to safely.

use std::fmt;

/// A scalar kind known to the type system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    /// Boolean.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Single-precision float.
    Float32,
    /// Double-precision float.
    Float64,
    /// The host's arbitrary-precision integer.
    BigInt,
    /// The foreign quad-precision type.
    Real128,
}

/// Coarse classification of a [`ScalarKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericClass {
    /// Fixed-width integer. Booleans are one-bit unsigned integers.
    FixedInt {
        /// Width in bits.
        bits: u32,
        /// Whether the integer is signed.
        signed: bool,
    },
    /// Arbitrary-precision integer.
    BigInt,
    /// Native binary float of the given width.
    NativeFloat {
        /// Width in bits.
        bits: u32,
    },
    /// The foreign quad-precision type.
    Foreign,
}

/// Kinds in promotion order: the first kind every operand can be cast to
/// safely is the promoted kind.
const PROMOTION_ORDER: [ScalarKind; 12] = [
    ScalarKind::Bool,
    ScalarKind::UInt8,
    ScalarKind::Int8,
    ScalarKind::UInt16,
    ScalarKind::Int16,
    ScalarKind::UInt32,
    ScalarKind::Int32,
    ScalarKind::UInt64,
    ScalarKind::Int64,
    ScalarKind::Float32,
    ScalarKind::Float64,
    ScalarKind::Real128,
];

impl ScalarKind {
    /// Classify the kind.
    pub fn class(self) -> NumericClass {
        use ScalarKind::*;
        match self {
            Bool => NumericClass::FixedInt {
                bits: 1,
                signed: false,
            },
            Int8 | Int16 | Int32 | Int64 => NumericClass::FixedInt {
                bits: self.bits(),
                signed: true,
            },
            UInt8 | UInt16 | UInt32 | UInt64 => NumericClass::FixedInt {
                bits: self.bits(),
                signed: false,
            },
            Float32 | Float64 => NumericClass::NativeFloat { bits: self.bits() },
            BigInt => NumericClass::BigInt,
            Real128 => NumericClass::Foreign,
        }
    }

    /// Storage width in bits (0 for the arbitrary-precision integer).
    pub fn bits(self) -> u32 {
        use ScalarKind::*;
        match self {
            Bool | Int8 | UInt8 => 8,
            Int16 | UInt16 => 16,
            Int32 | UInt32 | Float32 => 32,
            Int64 | UInt64 | Float64 => 64,
            Real128 => 128,
            BigInt => 0,
        }
    }

    /// Element size in bytes for kinds with a fixed layout.
    pub fn size_bytes(self) -> Option<usize> {
        match self {
            Self::BigInt => None,
            other => Some(other.bits() as usize / 8),
        }
    }

    /// Host-visible name of the kind.
    pub fn name(self) -> &'static str {
        use ScalarKind::*;
        match self {
            Bool => "bool",
            Int8 => "int8",
            Int16 => "int16",
            Int32 => "int32",
            Int64 => "int64",
            UInt8 => "uint8",
            UInt16 => "uint16",
            UInt32 => "uint32",
            UInt64 => "uint64",
            Float32 => "float32",
            Float64 => "float64",
            BigInt => "int",
            Real128 => "real128",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether every value of `from` is representable in `to` without loss
/// of magnitude.
///
/// Every native kind casts safely into the foreign type; the foreign type
/// casts safely into nothing but itself.
pub fn can_cast_safely(from: ScalarKind, to: ScalarKind) -> bool {
    if from == to || to == ScalarKind::Real128 {
        return true;
    }
    match (from.class(), to.class()) {
        (NumericClass::FixedInt { bits: 1, .. }, _) => true,
        (_, NumericClass::BigInt) => matches!(from.class(), NumericClass::FixedInt { .. }),
        (
            NumericClass::FixedInt { bits: fb, signed: fs },
            NumericClass::FixedInt { bits: tb, signed: ts },
        ) => match (fs, ts) {
            (false, false) | (true, true) => tb >= fb,
            (false, true) => tb > fb,
            (true, false) => false,
        },
        (NumericClass::FixedInt { bits, .. }, NumericClass::NativeFloat { bits: fw }) => {
            match fw {
                32 => bits <= 16,
                _ => bits <= 64,
            }
        }
        (NumericClass::NativeFloat { bits: a }, NumericClass::NativeFloat { bits: b }) => b >= a,
        _ => false,
    }
}

/// The kind a mixed binary operation on `a` and `b` is carried out in.
///
/// The arbitrary-precision integer is absent from the promotion order, so
/// pairing it with any other kind lands on the foreign type.
pub fn promote(a: ScalarKind, b: ScalarKind) -> ScalarKind {
    if a == b {
        return a;
    }
    PROMOTION_ORDER
        .iter()
        .copied()
        .find(|&k| can_cast_safely(a, k) && can_cast_safely(b, k))
        .unwrap_or(ScalarKind::Real128)
}
