//! Error types shared across the quaddt workspace.
//!
//! Two of the four failure classes surface as values: conversion errors
//! (reported to the caller of a scalar operation) and registration errors
//! (fatal during extension initialisation). Allocation failures are
//! reported as a null pointer by the allocator hooks and never become
//! values; invariant violations are debug assertions.

use std::error::Error;
use std::fmt;

use crate::id::TypeTag;

/// A value could not be converted to or from the quad-precision type.
///
/// Raised by the arithmetic protocol adapter and the descriptor's
/// `setitem`. Inputs the adapter has no conversion for at all are not an
/// error: they yield "not applicable" so the host's reflected-operand
/// protocol can take over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConversionError {
    /// Text could not be parsed as a quad-precision number.
    MalformedText {
        /// The rejected input.
        input: String,
    },
    /// The source object's type has no defined conversion.
    UnsupportedType {
        /// Host-visible name of the offending type.
        type_name: String,
        /// What the caller was attempting.
        context: &'static str,
    },
    /// NaN cannot be converted to an integer (domain error).
    NanToInteger,
    /// An infinity cannot be converted to an integer (overflow error).
    InfinityToInteger,
    /// A scaling exponent does not fit the target representation.
    ExponentOverflow {
        /// Number of binary digits that had to be shifted in.
        bits: u64,
    },
    /// Three-argument (modular) power was requested.
    ModularPowUnsupported,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedText { input } => {
                write!(f, "cannot parse '{input}' as a quad-precision value")
            }
            Self::UnsupportedType { type_name, context } => {
                write!(f, "{context}: unsupported object of type '{type_name}'")
            }
            Self::NanToInteger => write!(f, "cannot convert NaN to integer"),
            Self::InfinityToInteger => write!(f, "cannot convert infinity to integer"),
            Self::ExponentOverflow { bits } => write!(
                f,
                "overflow converting an integer with {bits} low-order bits to quad precision"
            ),
            Self::ModularPowUnsupported => {
                write!(f, "modular exponentiation is not supported for quad-precision values")
            }
        }
    }
}

impl Error for ConversionError {}

/// Registration with the host runtime failed.
///
/// Every variant is fatal during extension initialisation: the caller
/// aborts module setup and propagates the error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationError {
    /// The host refused the type descriptor.
    DescriptorRejected {
        /// Why the descriptor was refused.
        reason: String,
    },
    /// The named elementwise operation does not exist in the host.
    UnknownOperation {
        /// The requested operation name.
        name: String,
    },
    /// The type signature length does not match the operation's arity.
    ArityMismatch {
        /// Operation name.
        name: String,
        /// Inputs plus outputs the operation declares.
        expected: usize,
        /// Length of the signature supplied.
        provided: usize,
    },
    /// A type tag is not known to the host.
    UnknownType {
        /// The unknown tag.
        tag: TypeTag,
    },
    /// A cast registration was refused.
    CastRejected {
        /// Source tag.
        from: TypeTag,
        /// Destination tag.
        to: TypeTag,
        /// Why the registration was refused.
        reason: String,
    },
    /// A scalar type is already bound to the tag.
    ScalarTypeExists {
        /// The tag already carrying a scalar type.
        tag: TypeTag,
    },
    /// The extension configuration is invalid.
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DescriptorRejected { reason } => {
                write!(f, "type descriptor rejected: {reason}")
            }
            Self::UnknownOperation { name } => write!(f, "'{name}' is not a known operation"),
            Self::ArityMismatch {
                name,
                expected,
                provided,
            } => write!(
                f,
                "operation '{name}' takes {expected} types, but {provided} were provided"
            ),
            Self::UnknownType { tag } => write!(f, "type tag {tag} is not registered"),
            Self::CastRejected { from, to, reason } => {
                write!(f, "cast {from} -> {to} rejected: {reason}")
            }
            Self::ScalarTypeExists { tag } => {
                write!(f, "a scalar type is already bound to tag {tag}")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl Error for RegistrationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_message_names_both_counts() {
        let e = RegistrationError::ArityMismatch {
            name: "add".into(),
            expected: 3,
            provided: 2,
        };
        assert_eq!(
            e.to_string(),
            "operation 'add' takes 3 types, but 2 were provided"
        );
    }

    #[test]
    fn unsupported_type_message_carries_context() {
        let e = ConversionError::UnsupportedType {
            type_name: "list".into(),
            context: "setitem",
        };
        assert!(e.to_string().contains("list"));
        assert!(e.to_string().starts_with("setitem"));
    }
}
