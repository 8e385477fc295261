//! Benchmark profiles for quaddt.
//!
//! - [`populated_registry`]: a registry holding many address-only buffer
//!   records, for lookup costs independent of the allocator
//! - [`quad_runtime`] and [`ramp`]: a runtime with the quad type exposed
//!   and arrays to feed its loops

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use quaddt_core::Real128;
use quaddt_ext::{expose_real128, ExposeConfig, Real128Type};
use quaddt_host::{Array, HostError, Runtime, Value};
use quaddt_mem::MemoryRegistry;

/// Spacing between record start addresses; records are half as long,
/// so every other address range is a miss.
pub const RECORD_STRIDE: usize = 0x100;

/// A registry with `n` records starting at `0x10_0000`. No memory is
/// behind them; they are only ever looked up.
pub fn populated_registry(n: usize) -> MemoryRegistry {
    let reg = MemoryRegistry::new();
    for i in 0..n {
        let start = 0x10_0000 + i * RECORD_STRIDE;
        reg.register(start as *const u8, RECORD_STRIDE / 2);
    }
    reg
}

/// A private runtime with the quad type exposed.
pub fn quad_runtime() -> Result<(Runtime, Real128Type), quaddt_core::RegistrationError> {
    let rt = Runtime::new();
    let ty = expose_real128(&rt, &ExposeConfig::default())?;
    Ok((rt, ty))
}

/// `[start, start + step, ...]` of length `len` as a quad array.
pub fn ramp(rt: &Runtime, ty: &Real128Type, start: f64, step: f64, len: usize) -> Result<Array, HostError> {
    rt.arange(
        ty.tag(),
        &ty.value(Real128::from(start)),
        &Value::Float(step),
        len,
    )
}
