//! Core types for the quaddt extension type.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the quad-precision value type [`Real128`] (a fixed-layout wrapper over
//! `twofloat::TwoFloat`), the type tags the host
//! assigns to element types, the closed set of scalar kinds with their
//! promotion lattice, and the error taxonomy shared by every layer.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod kind;
mod math;
pub mod real128;
mod text;

pub use error::{ConversionError, RegistrationError};
pub use id::TypeTag;
pub use kind::{can_cast_safely, promote, NumericClass, ScalarKind};
pub use real128::Real128;
