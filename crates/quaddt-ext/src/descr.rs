//! The element descriptor of the quad-precision type.
//!
//! Every callback borrows host memory for the duration of the call only.
//! Elements are read and written unaligned: the host may hand over
//! scratch buffers with byte alignment.

use std::ffi::{c_int, c_void};
use std::mem::{align_of, size_of};
use std::ptr;

use quaddt_core::{ConversionError, Real128, TypeTag};
use quaddt_host::{ArrFuncs, Descr, ForeignScalar, Value, NEEDS_PYAPI, USE_GETITEM, USE_SETITEM};
use quaddt_mem::{construct_at, mark_written, MemoryRegistry};

use crate::coerce::Operand;
use crate::config::ExposeConfig;

const ELSIZE: usize = size_of::<Real128>();

#[allow(unsafe_code)]
unsafe fn load(p: *const c_void) -> Real128 {
    ptr::read_unaligned(p.cast::<Real128>())
}

#[allow(unsafe_code)]
unsafe fn store(p: *mut c_void, q: Real128) {
    ptr::write_unaligned(p.cast::<Real128>(), q)
}

#[allow(unsafe_code)]
unsafe fn at(base: *const c_void, stride: isize, i: isize) -> *const c_void {
    base.cast::<u8>().offset(stride * i).cast()
}

// ── Element access ─────────────────────────────────────────────────

#[allow(unsafe_code)]
unsafe fn getitem(data: *const u8, descr: &Descr, tag: TypeTag) -> Value {
    let q = load(data.cast());
    Value::Foreign(ForeignScalar::new(tag, descr.name, q))
}

#[allow(unsafe_code)]
unsafe fn setitem(item: &Value, data: *mut u8, tag: TypeTag) -> Result<(), ConversionError> {
    let q = match Operand::classify(item, tag) {
        Some(op) => op.to_real128()?,
        None => {
            return Err(ConversionError::UnsupportedType {
                type_name: item.type_name().to_string(),
                context: "setitem on a quad-precision array",
            })
        }
    };
    construct_at(MemoryRegistry::global(), data.cast::<Real128>(), q);
    Ok(())
}

// ── Copying ────────────────────────────────────────────────────────

/// Copy an element (when `src` is non-null), then byte-reverse each
/// binary64 component in place when `swap` is set. The leading
/// component stays first.
#[allow(unsafe_code)]
unsafe extern "C" fn copyswap(dst: *mut c_void, src: *const c_void, swap: c_int) {
    if !src.is_null() {
        ptr::copy(src.cast::<u8>(), dst.cast::<u8>(), ELSIZE);
    }
    if swap != 0 {
        let bytes = std::slice::from_raw_parts_mut(dst.cast::<u8>(), ELSIZE);
        for component in bytes.chunks_exact_mut(size_of::<f64>()) {
            component.reverse();
        }
    }
}

#[allow(unsafe_code)]
unsafe extern "C" fn copyswapn(
    dst: *mut c_void,
    dstride: isize,
    src: *const c_void,
    sstride: isize,
    n: isize,
    swap: c_int,
) {
    for i in 0..n {
        let s = if src.is_null() {
            ptr::null()
        } else {
            at(src, sstride, i)
        };
        copyswap(at(dst, dstride, i).cast_mut(), s, swap);
    }
}

// ── Ordering ───────────────────────────────────────────────────────

/// Three-way comparison with NaN ordered after every number, so sorting
/// sees a total order.
#[allow(unsafe_code)]
unsafe extern "C" fn compare(a: *const c_void, b: *const c_void) -> c_int {
    let (x, y) = (load(a), load(b));
    match (x.is_nan(), y.is_nan()) {
        (true, true) => 0,
        (true, false) => 1,
        (false, true) => -1,
        (false, false) if x < y => -1,
        (false, false) if x == y => 0,
        (false, false) => 1,
    }
}

/// Index of the first element `better` prefers over every earlier one.
#[allow(unsafe_code)]
unsafe fn arg_extreme(
    data: *const c_void,
    n: isize,
    out: *mut isize,
    better: impl Fn(Real128, Real128) -> bool,
) -> c_int {
    if n <= 0 {
        return 0;
    }
    let mut best_i = 0;
    let mut best = load(data);
    for i in 1..n {
        let x = load(at(data, ELSIZE as isize, i));
        if better(x, best) {
            best_i = i;
            best = x;
        }
    }
    *out = best_i;
    0
}

#[allow(unsafe_code)]
unsafe extern "C" fn argmax(data: *const c_void, n: isize, out: *mut isize) -> c_int {
    arg_extreme(data, n, out, |x, best| x > best)
}

#[allow(unsafe_code)]
unsafe extern "C" fn argmin(data: *const c_void, n: isize, out: *mut isize) -> c_int {
    arg_extreme(data, n, out, |x, best| x < best)
}

/// NaN counts as non-zero.
#[allow(unsafe_code)]
unsafe extern "C" fn nonzero(data: *const c_void) -> bool {
    !load(data).is_zero()
}

// ── Filling ────────────────────────────────────────────────────────

/// Extend the progression set by elements 0 and 1 by repeated addition
/// of their difference.
#[allow(unsafe_code)]
unsafe extern "C" fn fill(data: *mut c_void, length: isize) -> c_int {
    if length < 2 {
        return 0;
    }
    let first = load(data);
    let mut r = load(at(data, ELSIZE as isize, 1));
    let delta = r - first;
    for i in 2..length {
        r += delta;
        store(at(data, ELSIZE as isize, i).cast_mut(), r);
    }
    let count = length.unsigned_abs();
    mark_written(MemoryRegistry::global(), data.cast::<Real128>(), ELSIZE as isize, count);
    0
}

#[allow(unsafe_code)]
unsafe extern "C" fn fillwithscalar(buffer: *mut c_void, length: isize, value: *const c_void) -> c_int {
    let q = load(value);
    for i in 0..length {
        store(at(buffer, ELSIZE as isize, i).cast_mut(), q);
    }
    let count = usize::try_from(length).unwrap_or(0);
    mark_written(MemoryRegistry::global(), buffer.cast::<Real128>(), ELSIZE as isize, count);
    0
}

// ── Products ───────────────────────────────────────────────────────

/// Fused multiply-accumulate over two strided vectors.
#[allow(unsafe_code)]
unsafe extern "C" fn dot(
    ip0: *const c_void,
    is0: isize,
    ip1: *const c_void,
    is1: isize,
    op: *mut c_void,
    n: isize,
) {
    let mut r = Real128::ZERO;
    for i in 0..n {
        r = load(at(ip0, is0, i)).mul_add(load(at(ip1, is1, i)), r);
    }
    store(op, r);
    mark_written(MemoryRegistry::global(), op.cast::<Real128>(), 0, 1);
}

/// Matrix multiply over core dimensions `(m, n, p)` with strides
/// `[a_m, a_n, b_n, b_p, o_m, o_p]`.
#[allow(unsafe_code)]
unsafe fn matrix_multiply(args: [*mut u8; 3], dims: &[isize; 3], steps: &[isize; 6]) {
    let [dm, dn, dp] = *dims;
    let [a_m, a_n, b_n, b_p, o_m, o_p] = *steps;
    for m in 0..dm {
        let row = args[0].offset(a_m * m);
        for p in 0..dp {
            let col = args[1].offset(b_p * p);
            let out = args[2].offset(o_m * m + o_p * p);
            dot(row.cast(), a_n, col.cast(), b_n, out.cast(), dn);
        }
    }
}

/// Generalised matmul loop: `dimensions = [batch, m, n, p]`, `steps` the
/// three batch strides followed by the six core strides.
#[allow(unsafe_code)]
pub(crate) unsafe extern "C" fn matmul_loop(
    args: *const *mut u8,
    dimensions: *const isize,
    steps: *const isize,
    _data: *mut c_void,
) {
    let args = std::slice::from_raw_parts(args, 3);
    let dims = std::slice::from_raw_parts(dimensions, 4);
    let steps = std::slice::from_raw_parts(steps, 9);
    let core_dims = [dims[1], dims[2], dims[3]];
    let core_steps = [steps[3], steps[4], steps[5], steps[6], steps[7], steps[8]];
    for batch in 0..dims[0] {
        let base = [
            args[0].offset(steps[0] * batch),
            args[1].offset(steps[1] * batch),
            args[2].offset(steps[2] * batch),
        ];
        matrix_multiply(base, &core_dims, &core_steps);
    }
}

// ── Descriptor ─────────────────────────────────────────────────────

/// Byte-level vtable shared by every exposure of the type.
pub static REAL128_FUNCS: ArrFuncs = ArrFuncs {
    getitem: Some(getitem),
    setitem: Some(setitem),
    copyswap: Some(copyswap),
    copyswapn: Some(copyswapn),
    compare: Some(compare),
    argmax: Some(argmax),
    argmin: Some(argmin),
    nonzero: Some(nonzero),
    fill: Some(fill),
    fillwithscalar: Some(fillwithscalar),
    dotfunc: Some(dot),
};

/// Build the descriptor for `config`. The descriptor must outlive the
/// runtime it is registered with, so it is leaked.
pub fn leak_descr(config: &ExposeConfig) -> &'static Descr {
    let name: &'static str = Box::leak(config.type_name.clone().into_boxed_str());
    Box::leak(Box::new(Descr {
        name,
        kind: config.kind,
        type_char: config.type_char,
        byteorder: config.byteorder,
        flags: NEEDS_PYAPI | USE_GETITEM | USE_SETITEM,
        elsize: ELSIZE as isize,
        alignment: align_of::<Real128>() as isize,
        f: &REAL128_FUNCS,
    }))
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    fn q(x: f64) -> Real128 {
        Real128::from(x)
    }

    fn ptr_of(v: &[Real128]) -> *const c_void {
        v.as_ptr().cast()
    }

    fn swapped_parts(x: &Real128) -> (f64, f64) {
        let bytes = unsafe { std::slice::from_raw_parts((x as *const Real128).cast::<u8>(), 16) };
        let part = |b: &[u8]| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(b);
            f64::from_bits(u64::from_ne_bytes(raw).swap_bytes())
        };
        (part(&bytes[..8]), part(&bytes[8..]))
    }

    #[test]
    fn byteswap_reverses_each_component() {
        let src = [Real128::from_parts(1.0, 2f64.powi(-60))];
        let mut dst = [Real128::ZERO];
        unsafe { copyswap(dst.as_mut_ptr().cast(), ptr_of(&src), 1) };
        assert_eq!(swapped_parts(&dst[0]), (1.0, 2f64.powi(-60)));
        unsafe { copyswap(dst.as_mut_ptr().cast(), ptr::null(), 1) };
        assert_eq!(dst[0], src[0]);
    }

    #[test]
    fn strided_byteswap_keeps_the_leading_component_first() {
        let third = q(1.0) / q(3.0);
        let src = [third, q(100.0), -third];
        let mut dst = [Real128::ZERO; 2];
        unsafe { copyswapn(dst.as_mut_ptr().cast(), 16, ptr_of(&src), 32, 2, 1) };
        assert_eq!(swapped_parts(&dst[0]), (third.hi(), third.lo()));
        assert_eq!(swapped_parts(&dst[1]), (-third.hi(), -third.lo()));
        unsafe { copyswapn(dst.as_mut_ptr().cast(), 16, ptr::null(), 0, 2, 1) };
        assert_eq!(dst, [third, -third]);
    }

    #[test]
    fn compare_orders_nan_last() {
        let v = [q(1.0), q(2.0), Real128::NAN];
        let c = |i: usize, j: usize| unsafe { compare(ptr_of(&v[i..]), ptr_of(&v[j..])) };
        assert_eq!((c(0, 1), c(1, 0), c(1, 1)), (-1, 1, 0));
        assert_eq!((c(2, 0), c(0, 2), c(2, 2)), (1, -1, 0));
    }

    #[test]
    fn arg_extremes_pick_the_first_occurrence() {
        let v = [q(3.0), q(-1.0), q(7.0), q(7.0), q(-1.0)];
        let (mut hi, mut lo) = (-1isize, -1isize);
        unsafe {
            argmax(ptr_of(&v), 5, &mut hi);
            argmin(ptr_of(&v), 5, &mut lo);
        }
        assert_eq!((hi, lo), (2, 1));
    }

    #[test]
    fn fill_extrapolates_the_first_two() {
        let mut v = [q(0.5), q(0.75), Real128::ZERO, Real128::ZERO, Real128::ZERO];
        unsafe { fill(v.as_mut_ptr().cast(), 5) };
        assert_eq!(v[4], q(1.5));
        let s = [q(-2.0)];
        unsafe { fillwithscalar(v.as_mut_ptr().cast(), 5, ptr_of(&s)) };
        assert!(v.iter().all(|&x| x == q(-2.0)));
    }

    #[test]
    fn dot_honours_strides() {
        let a = [q(1.0), q(100.0), q(2.0), q(100.0), q(3.0)];
        let b = [q(4.0), q(5.0), q(6.0)];
        let mut out = [Real128::ZERO];
        unsafe { dot(ptr_of(&a), 32, ptr_of(&b), 16, out.as_mut_ptr().cast(), 3) };
        assert_eq!(out[0], q(32.0));
    }

    #[test]
    fn matmul_loop_multiplies_a_batch() {
        // Two batches of (1x2)·(2x1).
        let a = [q(1.0), q(2.0), q(3.0), q(4.0)];
        let b = [q(5.0), q(6.0), q(7.0), q(8.0)];
        let mut o = [Real128::ZERO; 2];
        let args = [a.as_ptr() as *mut u8, b.as_ptr() as *mut u8, o.as_mut_ptr().cast::<u8>()];
        let dims = [2isize, 1, 2, 1];
        let steps = [32isize, 32, 16, 32, 16, 16, 16, 16, 16];
        unsafe { matmul_loop(args.as_ptr(), dims.as_ptr(), steps.as_ptr(), ptr::null_mut()) };
        assert_eq!(o, [q(17.0), q(53.0)]);
    }

    #[test]
    fn descriptor_follows_the_config() {
        let d = leak_descr(&ExposeConfig::default());
        assert_eq!((d.name, d.kind, d.type_char, d.elsize), ("real128", b'f', b'q', 16));
        assert!(d.validate().is_ok());
    }
}
