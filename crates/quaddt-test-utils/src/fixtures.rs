//! Runtime fixtures.

use quaddt_core::Real128;
use quaddt_ext::{expose_real128, ExposeConfig, Real128Type};
use quaddt_host::{Array, Runtime, Value};

/// A private runtime with the quad type exposed under its default name.
pub fn real128_runtime() -> (Runtime, Real128Type) {
    crate::init_logging();
    let rt = Runtime::new();
    let ty = match expose_real128(&rt, &ExposeConfig::default()) {
        Ok(ty) => ty,
        Err(e) => panic!("exposing real128 failed: {e}"),
    };
    (rt, ty)
}

/// As [`real128_runtime`], with the quaddt allocator hooks installed.
pub fn tracked_real128_runtime() -> (Runtime, Real128Type) {
    let (rt, ty) = real128_runtime();
    quaddt_mem::install_mem_handler(&rt);
    (rt, ty)
}

/// A 1-D quad array holding `xs`.
pub fn quad_array(rt: &Runtime, ty: &Real128Type, xs: &[f64]) -> Array {
    let values: Vec<Value> = xs.iter().map(|&x| ty.value(Real128::from(x))).collect();
    match rt.array(ty.tag(), &[xs.len()], &values) {
        Ok(a) => a,
        Err(e) => panic!("building quad array failed: {e}"),
    }
}

/// Every element of a quad array.
pub fn quad_values(rt: &Runtime, ty: &Real128Type, arr: &Array) -> Vec<Real128> {
    let values = match rt.to_values(arr) {
        Ok(v) => v,
        Err(e) => panic!("reading quad array failed: {e}"),
    };
    values
        .iter()
        .map(|v| ty.extract(v).unwrap_or_else(|| panic!("not a quad scalar: {v:?}")))
        .collect()
}
