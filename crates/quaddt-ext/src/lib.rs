//! The quad-precision element type, exposed to the host runtime.
//!
//! [`expose_real128`] registers everything the host needs to treat
//! [`Real128`] as a first-class array element:
//!
//! 1. a descriptor with the element vtable ([`descr`]),
//! 2. the scalar number protocol ([`scalar`]), with operand coercion
//!    from native scalars ([`coerce`]),
//! 3. elementwise loops and matmul in the dispatch tables ([`ufunc`]),
//! 4. casts to and from every native kind.
//!
//! Each step is fatal on failure; a half-registered type is never
//! handed back.
//!
//! # Element storage
//!
//! Stores through the descriptor construct elements in place via
//! [`quaddt_mem::construct_at`], so buffers from the quaddt allocator
//! hooks destroy them on release. All element access is unaligned.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

mod cast;
pub mod coerce;
pub mod config;
pub mod descr;
mod loops;
pub mod scalar;
pub mod ufunc;

use std::ptr;
use std::sync::Arc;

use quaddt_core::{Real128, RegistrationError, TypeTag};
use quaddt_host::{Runtime, Value};

pub use config::{ConfigError, ExposeConfig};
pub use descr::REAL128_FUNCS;
pub use scalar::Real128Scalar;
pub use ufunc::register_ufunc;

/// Handle to the exposed type in one runtime.
#[derive(Clone, Debug)]
pub struct Real128Type {
    scalar: Real128Scalar,
}

impl Real128Type {
    /// Host tag of the type.
    pub fn tag(&self) -> TypeTag {
        self.scalar.tag()
    }

    /// Scalar type name.
    pub fn name(&self) -> &str {
        quaddt_host::ScalarType::name(&self.scalar)
    }

    /// Box `q` as a host scalar.
    pub fn value(&self, q: Real128) -> Value {
        self.scalar.wrap(q)
    }

    /// The quad value of a scalar of this type.
    pub fn extract(&self, v: &Value) -> Option<Real128> {
        self.scalar.unwrap(v)
    }

    /// Machine epsilon of the type as a host scalar.
    pub fn epsilon(&self) -> Value {
        self.value(Real128::EPSILON)
    }

    /// The bound scalar type.
    pub fn scalar(&self) -> &Real128Scalar {
        &self.scalar
    }
}

/// Register the quad-precision type with `rt`.
///
/// Exposing again under the same name returns the existing handle. A
/// name already taken by another type is rejected.
pub fn expose_real128(rt: &Runtime, config: &ExposeConfig) -> Result<Real128Type, RegistrationError> {
    config.validate()?;

    if let Some(tag) = rt.lookup_type(&config.type_name) {
        return match rt.descr(tag) {
            Some(d) if ptr::eq(d.f, &REAL128_FUNCS) => {
                log::debug!("'{}' already exposed as {tag}", config.type_name);
                Ok(Real128Type {
                    scalar: Real128Scalar::new(tag, &config.type_name),
                })
            }
            _ => Err(RegistrationError::InvalidConfig {
                reason: format!("type name '{}' is already taken", config.type_name),
            }),
        };
    }

    let tag = rt.register_data_type(descr::leak_descr(config))?;
    log::debug!("descriptor for '{}' registered as {tag}", config.type_name);

    let scalar = Real128Scalar::new(tag, &config.type_name);
    rt.register_scalar_type(tag, Arc::new(scalar.clone()))?;

    let loops = ufunc::register_loops(rt, tag, config.register_matmul)?;
    log::debug!("{loops} loops registered for {tag}");

    let casts = cast::register_casts(rt, tag)?;
    log::debug!("{casts} casts registered for {tag}");

    log::info!(
        "exposed '{}' as {tag}: {loops} loops, {casts} casts",
        config.type_name
    );
    Ok(Real128Type { scalar })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposure_is_idempotent_per_name() {
        let rt = Runtime::new();
        let cfg = ExposeConfig::default();
        let a = expose_real128(&rt, &cfg).unwrap();
        let b = expose_real128(&rt, &cfg).unwrap();
        assert_eq!(a.tag(), b.tag());
        assert_eq!(rt.loop_count("add"), 1);
    }

    #[test]
    fn taken_names_are_rejected() {
        let rt = Runtime::new();
        let cfg = ExposeConfig {
            type_name: "float64".into(),
            ..ExposeConfig::default()
        };
        assert!(matches!(
            expose_real128(&rt, &cfg),
            Err(RegistrationError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn invalid_config_fails_before_registration() {
        let rt = Runtime::new();
        let cfg = ExposeConfig {
            type_name: "two words".into(),
            ..ExposeConfig::default()
        };
        assert!(expose_real128(&rt, &cfg).is_err());
        assert_eq!(rt.lookup_type("two words"), None);
        assert_eq!(rt.loop_count("add"), 0);
    }

    #[test]
    fn handle_round_trips_values() {
        let rt = Runtime::new();
        let ty = expose_real128(&rt, &ExposeConfig::default()).unwrap();
        assert_eq!(ty.name(), "real128");
        let v = ty.value(Real128::PI);
        assert_eq!(ty.extract(&v), Some(Real128::PI));
        assert_eq!(ty.extract(&Value::Float(1.0)), None);
        assert_eq!(ty.extract(&ty.epsilon()), Some(Real128::EPSILON));
    }
}
