//! quaddt: quad-precision floating point as a first-class element type
//! for numerical arrays.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the quaddt sub-crates and wires them together with [`init`].
//!
//! # Quick start
//!
//! ```rust
//! use quaddt::prelude::*;
//!
//! let rt = Runtime::new();
//! let real128 = quaddt::init(&rt)?;
//!
//! let three = real128.value(Real128::from(3));
//! let sum = rt.binary_op(BinaryOp::Add, &three, &Value::int(4))?;
//! assert_eq!(real128.extract(&sum), Some(Real128::from(7)));
//!
//! let a = rt.full(real128.tag(), &[4], &three)?;
//! let b = rt.call_ufunc("multiply", &[&a, &a])?.remove(0);
//! assert_eq!(real128.extract(&rt.get(&b, 3)?), Some(Real128::from(9)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `quaddt-core` | `Real128`, type tags, scalar kinds, errors |
//! | [`host`] | `quaddt-host` | Runtime model: registry, dispatch, casts, arrays |
//! | [`mem`] | `quaddt-mem` | Buffer registry and allocator hooks |
//! | [`ext`] | `quaddt-ext` | Descriptor, scalar protocol, loops, casts |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core value type, tags, kinds and errors (`quaddt-core`).
pub use quaddt_core as types;

/// The host runtime model (`quaddt-host`).
pub use quaddt_host as host;

/// Buffer registry and allocator hooks (`quaddt-mem`).
///
/// [`mem::MemoryRegistry::global`] is the registry behind the hooks
/// [`init`] installs.
pub use quaddt_mem as mem;

/// Exposure of the quad type (`quaddt-ext`).
pub use quaddt_ext as ext;

use quaddt_core::RegistrationError;
use quaddt_ext::{expose_real128, ExposeConfig, Real128Type};
use quaddt_host::Runtime;

/// Install the quaddt allocator hooks in `rt` and expose the quad type
/// under its default name.
///
/// Idempotent. Arrays allocated before the first call keep freeing
/// through the handler that allocated them.
pub fn init(rt: &Runtime) -> Result<Real128Type, RegistrationError> {
    init_with(rt, &ExposeConfig::default())
}

/// As [`init`], with an explicit exposure configuration.
pub fn init_with(rt: &Runtime, config: &ExposeConfig) -> Result<Real128Type, RegistrationError> {
    config.validate()?;
    if quaddt_mem::install_mem_handler(rt) {
        log::debug!("allocator hooks installed before exposing '{}'", config.type_name);
    }
    expose_real128(rt, config)
}

/// [`init`] on the process-wide runtime.
pub fn init_global() -> Result<Real128Type, RegistrationError> {
    init(Runtime::global())
}

/// Common imports for typical quaddt usage.
pub mod prelude {
    pub use quaddt_core::{ConversionError, Real128, RegistrationError, ScalarKind, TypeTag};

    pub use quaddt_host::{
        Array, BinaryOp, CompareOp, HostError, Runtime, ScalarType, UnaryOp, Value,
    };

    pub use quaddt_mem::MemoryRegistry;

    pub use quaddt_ext::{ExposeConfig, Real128Type};
}
