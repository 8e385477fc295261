//! Loop registration into the host's dispatch tables.
//!
//! Any failure here is fatal to exposure: the error propagates out of
//! [`expose_real128`](crate::expose_real128) before the type is usable.

use quaddt_core::{RegistrationError, TypeTag};
use quaddt_host::{LoopFn, Runtime};

use crate::descr::matmul_loop;
use crate::loops::{Out, BINARY_LOOPS, UNARY_LOOPS};

/// Register `func` for `name` with operand types `types`.
///
/// The operation must be known to the host and `types` must cover
/// exactly its inputs and outputs.
pub fn register_ufunc(
    rt: &Runtime,
    name: &str,
    tag: TypeTag,
    func: LoopFn,
    types: &[TypeTag],
) -> Result<(), RegistrationError> {
    let sig = rt
        .ufunc_signature(name)
        .ok_or_else(|| RegistrationError::UnknownOperation {
            name: name.to_string(),
        })?;
    if sig.nargs() != types.len() {
        return Err(RegistrationError::ArityMismatch {
            name: name.to_string(),
            expected: sig.nargs(),
            provided: types.len(),
        });
    }
    rt.register_loop_for_type(name, tag, func, types)
}

/// Register every elementwise loop of the type, plus matmul if asked.
/// Returns the number of loops registered.
pub(crate) fn register_loops(
    rt: &Runtime,
    tag: TypeTag,
    with_matmul: bool,
) -> Result<usize, RegistrationError> {
    let out_tag = |out: Out| match out {
        Out::Quad => tag,
        Out::Bool => TypeTag::BOOL,
    };
    let mut count = 0;
    for &(name, func, out) in UNARY_LOOPS {
        register_ufunc(rt, name, tag, func, &[tag, out_tag(out)])?;
        count += 1;
    }
    for &(name, func, out) in BINARY_LOOPS {
        register_ufunc(rt, name, tag, func, &[tag, tag, out_tag(out)])?;
        count += 1;
    }
    if with_matmul {
        register_ufunc(rt, "matmul", tag, matmul_loop, &[tag, tag, tag])?;
        count += 1;
    }
    Ok(count)
}
