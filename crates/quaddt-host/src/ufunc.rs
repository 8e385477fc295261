//! Per-operation dispatch tables.
//!
//! Every elementwise operation the host knows has a fixed arity and a
//! table mapping operand type signatures to inner loops. Extensions add
//! loops for their own type; the host picks a loop at call time, allowing
//! inputs to be safely cast to the loop's input types.

use std::ffi::c_void;

use indexmap::IndexMap;
use quaddt_core::{RegistrationError, TypeTag};
use smallvec::SmallVec;

use crate::error::HostError;

/// Strided inner loop.
///
/// `args` holds one data pointer per operand (inputs first). For plain
/// elementwise operations `dimensions[0]` is the element count and
/// `steps[i]` the byte stride of operand `i`. Generalised operations
/// append their core dimensions and core strides after those.
pub type LoopFn = unsafe extern "C" fn(
    args: *const *mut u8,
    dimensions: *const isize,
    steps: *const isize,
    data: *mut c_void,
);

/// Operand type signature of a loop, inputs then outputs.
pub type LoopTypes = SmallVec<[TypeTag; 3]>;

/// Declared shape of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UfuncSignature {
    /// Number of inputs.
    pub nin: usize,
    /// Number of outputs.
    pub nout: usize,
    /// Core-dimension signature for generalised operations.
    pub core: Option<&'static str>,
}

impl UfuncSignature {
    const fn unary() -> Self {
        Self { nin: 1, nout: 1, core: None }
    }

    const fn binary() -> Self {
        Self { nin: 2, nout: 1, core: None }
    }

    /// Operand count including outputs.
    pub fn nargs(&self) -> usize {
        self.nin + self.nout
    }
}

const UNARY: &[&str] = &[
    "square", "absolute", "fabs", "positive", "negative", "sign", "sqrt", "cbrt", "floor",
    "ceil", "trunc", "sin", "cos", "tan", "arcsin", "arccos", "arctan", "sinh", "cosh", "tanh",
    "arcsinh", "arccosh", "arctanh", "deg2rad", "radians", "rad2deg", "degrees", "exp", "exp2",
    "expm1", "log", "log2", "log10", "log1p", "isfinite", "isnan", "isinf",
];

const BINARY: &[&str] = &[
    "add", "subtract", "multiply", "divide", "true_divide", "floor_divide", "power", "arctan2",
    "maximum", "minimum", "less", "less_equal", "equal", "not_equal", "greater", "greater_equal",
];

/// Core signature of the host's matrix-multiply operation.
pub const MATMUL_SIGNATURE: &str = "(m,n),(n,p)->(m,p)";

#[derive(Debug)]
struct Ufunc {
    signature: UfuncSignature,
    loops: IndexMap<LoopTypes, LoopFn>,
}

/// All operations the host knows, with their registered loops.
#[derive(Debug)]
pub struct UfuncTable {
    ufuncs: IndexMap<&'static str, Ufunc>,
}

impl UfuncTable {
    /// The host's operation set with no loops registered.
    pub fn with_host_ufuncs() -> Self {
        let mut ufuncs = IndexMap::new();
        let entries = UNARY
            .iter()
            .map(|&n| (n, UfuncSignature::unary()))
            .chain(BINARY.iter().map(|&n| (n, UfuncSignature::binary())))
            .chain(std::iter::once((
                "matmul",
                UfuncSignature { nin: 2, nout: 1, core: Some(MATMUL_SIGNATURE) },
            )));
        for (name, signature) in entries {
            ufuncs.insert(name, Ufunc { signature, loops: IndexMap::new() });
        }
        Self { ufuncs }
    }

    /// Declared signature of `name`.
    pub fn signature(&self, name: &str) -> Option<UfuncSignature> {
        self.ufuncs.get(name).map(|u| u.signature)
    }

    /// Names of every known operation.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ufuncs.keys().copied()
    }

    /// Add a loop for `types`, replacing one already registered for the
    /// same signature.
    pub fn register_loop(
        &mut self,
        name: &str,
        func: LoopFn,
        types: &[TypeTag],
    ) -> Result<(), RegistrationError> {
        let ufunc = self
            .ufuncs
            .get_mut(name)
            .ok_or_else(|| RegistrationError::UnknownOperation { name: name.to_string() })?;
        let expected = ufunc.signature.nargs();
        if types.len() != expected {
            return Err(RegistrationError::ArityMismatch {
                name: name.to_string(),
                expected,
                provided: types.len(),
            });
        }
        ufunc.loops.insert(types.iter().copied().collect(), func);
        Ok(())
    }

    /// Number of loops registered for `name`.
    pub fn loop_count(&self, name: &str) -> usize {
        self.ufuncs.get(name).map_or(0, |u| u.loops.len())
    }

    /// Pick the loop for `inputs`.
    ///
    /// An exact match wins. Otherwise the first loop, in registration
    /// order, whose every input type can be reached from the supplied
    /// type by a safe cast.
    pub fn resolve(
        &self,
        name: &str,
        inputs: &[TypeTag],
        can_cast: impl Fn(TypeTag, TypeTag) -> bool,
    ) -> Result<(LoopTypes, LoopFn), HostError> {
        let ufunc = self
            .ufuncs
            .get(name)
            .ok_or_else(|| HostError::UnknownUfunc { name: name.to_string() })?;
        let nin = ufunc.signature.nin;
        let exact = ufunc
            .loops
            .iter()
            .find(|(types, _)| &types[..nin] == inputs);
        let found = exact.or_else(|| {
            ufunc.loops.iter().find(|(types, _)| {
                types[..nin]
                    .iter()
                    .zip(inputs)
                    .all(|(&want, &have)| can_cast(have, want))
            })
        });
        found
            .map(|(types, f)| (types.clone(), *f))
            .ok_or_else(|| HostError::NoLoop {
                name: name.to_string(),
                types: inputs.to_vec(),
            })
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    unsafe extern "C" fn noop(_: *const *mut u8, _: *const isize, _: *const isize, _: *mut c_void) {
    }

    static OTHER_CALLS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn other(_: *const *mut u8, _: *const isize, _: *const isize, _: *mut c_void) {
        OTHER_CALLS.fetch_add(1, Ordering::Relaxed);
    }

    const Q: TypeTag = TypeTag(256);

    #[test]
    fn unknown_names_and_bad_arity_are_rejected() {
        let mut t = UfuncTable::with_host_ufuncs();
        assert_eq!(
            t.register_loop("frobnicate", noop, &[Q, Q]),
            Err(RegistrationError::UnknownOperation { name: "frobnicate".into() })
        );
        assert_eq!(
            t.register_loop("add", noop, &[Q, Q]),
            Err(RegistrationError::ArityMismatch { name: "add".into(), expected: 3, provided: 2 })
        );
        assert!(t.register_loop("sqrt", noop, &[Q, Q]).is_ok());
    }

    #[test]
    fn reregistration_replaces_the_loop() {
        let mut t = UfuncTable::with_host_ufuncs();
        t.register_loop("add", noop, &[Q, Q, Q]).unwrap();
        t.register_loop("add", other, &[Q, Q, Q]).unwrap();
        assert_eq!(t.loop_count("add"), 1);
        let (_, f) = t.resolve("add", &[Q, Q], |a, b| a == b).unwrap();
        // SAFETY: `other` ignores its arguments.
        unsafe { f(std::ptr::null(), std::ptr::null(), std::ptr::null(), std::ptr::null_mut()) };
        assert_eq!(OTHER_CALLS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn resolution_falls_back_to_safe_casts() {
        let mut t = UfuncTable::with_host_ufuncs();
        t.register_loop("multiply", noop, &[Q, Q, Q]).unwrap();
        let cast = |from: TypeTag, to: TypeTag| from == to || to == Q;
        let (types, _) = t.resolve("multiply", &[TypeTag::FLOAT64, Q], cast).unwrap();
        assert_eq!(types.as_slice(), &[Q, Q, Q]);
        let err = t.resolve("multiply", &[TypeTag::FLOAT64, Q], |a, b| a == b);
        assert!(matches!(err, Err(HostError::NoLoop { .. })));
    }

    #[test]
    fn matmul_is_generalised() {
        let t = UfuncTable::with_host_ufuncs();
        let sig = t.signature("matmul").unwrap();
        assert_eq!(sig.core, Some(MATMUL_SIGNATURE));
        assert_eq!(sig.nargs(), 3);
        assert_eq!(t.signature("isfinite"), Some(UfuncSignature::unary()));
    }
}
