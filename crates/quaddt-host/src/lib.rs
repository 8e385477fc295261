//! In-process model of the host numerical-array runtime.
//!
//! The extension type integrates with a host that owns a type registry,
//! per-operation dispatch tables, cast tables and a pluggable data-memory
//! allocator. This crate models those contracts with the same shapes the
//! host exposes at its C boundary (fixed-layout descriptors, `extern "C"`
//! hooks, strided loops) so every extension component runs end to end.
//!
//! # Architecture
//!
//! ```text
//! Runtime
//! ├── type registry   TypeTag → Descr (+ ScalarType)
//! ├── UfuncTable      name → (nin, nout) + loops keyed by type signature
//! ├── CastTable       (from, to) → CastFn, safe-cast relation
//! └── MemHandler slot allocator hooks for new array buffers
//! ```
//!
//! This crate, `quaddt-mem` and `quaddt-ext` may contain `unsafe` code,
//! each use allowed per item; the other crates forbid it.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod array;
pub mod builtin;
pub mod cast;
pub mod descr;
pub mod error;
pub mod mem;
pub mod runtime;
pub mod scalar;
pub mod ufunc;
pub mod value;

pub use array::{Array, Shape};
pub use cast::CastFn;
pub use descr::{ArrFuncs, Descr, NEEDS_PYAPI, USE_GETITEM, USE_SETITEM};
pub use error::HostError;
pub use mem::{DataMemAllocator, MemHandler, DEFAULT_HANDLER};
pub use runtime::Runtime;
pub use scalar::{BinaryOp, CompareOp, Outcome, ScalarType, UnaryOp};
pub use ufunc::{LoopFn, UfuncSignature, MATMUL_SIGNATURE};
pub use value::{FixedInt, ForeignScalar, Value};
