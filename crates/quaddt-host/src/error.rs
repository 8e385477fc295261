//! Errors raised by runtime operations on arrays and scalars.

use std::error::Error;
use std::fmt;

use quaddt_core::{ConversionError, TypeTag};

/// A runtime operation on arrays or scalars failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostError {
    /// The type tag has no registered descriptor.
    UnknownType {
        /// The offending tag.
        tag: TypeTag,
    },
    /// No scalar type is bound to the tag.
    NoScalarType {
        /// The offending tag.
        tag: TypeTag,
    },
    /// The elementwise operation name is not known.
    UnknownUfunc {
        /// The requested name.
        name: String,
    },
    /// No loop accepts the operand types, even after safe casting.
    NoLoop {
        /// Operation name.
        name: String,
        /// Operand types supplied.
        types: Vec<TypeTag>,
    },
    /// Operand counts or shapes are incompatible.
    ShapeMismatch {
        /// What went wrong.
        reason: String,
    },
    /// No cast function connects the two types.
    NoCastPath {
        /// Source type.
        from: TypeTag,
        /// Destination type.
        to: TypeTag,
    },
    /// The element type lacks an array function the operation needs.
    MissingArrFunc {
        /// Element type.
        tag: TypeTag,
        /// Missing function.
        func: &'static str,
    },
    /// An element index lies outside the array.
    IndexOutOfBounds {
        /// Requested flat index.
        index: usize,
        /// Number of elements.
        len: usize,
    },
    /// The allocator hook returned null.
    AllocationFailed {
        /// Requested size.
        bytes: usize,
    },
    /// The operand's type does not implement the unary operator.
    UnsupportedOperand {
        /// Operator name.
        op: &'static str,
        /// Operand type name.
        ty: String,
    },
    /// Neither operand's type implements the operator.
    UnsupportedOperands {
        /// Operator symbol.
        op: &'static str,
        /// Left operand type name.
        lhs: String,
        /// Right operand type name.
        rhs: String,
    },
    /// A value conversion failed.
    Conversion(ConversionError),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType { tag } => write!(f, "unknown element type {tag}"),
            Self::NoScalarType { tag } => write!(f, "no scalar type bound to {tag}"),
            Self::UnknownUfunc { name } => write!(f, "unknown ufunc '{name}'"),
            Self::NoLoop { name, types } => {
                write!(f, "ufunc '{name}' has no loop for types {types:?}")
            }
            Self::ShapeMismatch { reason } => write!(f, "shape mismatch: {reason}"),
            Self::NoCastPath { from, to } => write!(f, "cannot cast from {from} to {to}"),
            Self::MissingArrFunc { tag, func } => {
                write!(f, "element type {tag} does not provide '{func}'")
            }
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for {len} elements")
            }
            Self::AllocationFailed { bytes } => write!(f, "failed to allocate {bytes} bytes"),
            Self::UnsupportedOperand { op, ty } => {
                write!(f, "bad operand type for {op}: '{ty}'")
            }
            Self::UnsupportedOperands { op, lhs, rhs } => write!(
                f,
                "unsupported operand type(s) for {op}: '{lhs}' and '{rhs}'"
            ),
            Self::Conversion(e) => write!(f, "{e}"),
        }
    }
}

impl Error for HostError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Conversion(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConversionError> for HostError {
    fn from(e: ConversionError) -> Self {
        Self::Conversion(e)
    }
}
