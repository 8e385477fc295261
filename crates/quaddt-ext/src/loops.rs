//! Strided elementwise loops over quad-precision operands.
//!
//! Each loop reads its inputs as [`Real128`] and writes either a
//! [`Real128`] or a host boolean (one byte, 0 or 1).

use std::ffi::c_void;
use std::ptr;

use quaddt_core::Real128;
use quaddt_host::LoopFn;
use quaddt_mem::{mark_written, MemoryRegistry};

/// An output element type a loop can produce.
pub(crate) trait LoopOutput: Copy {
    /// Write `self` at `p`.
    ///
    /// # Safety
    ///
    /// `p` must be valid for writing one output element.
    #[allow(unsafe_code)]
    unsafe fn put(self, p: *mut u8);

    /// Record `count` outputs written `stride` bytes apart from `first`.
    fn written(_first: *const u8, _stride: isize, _count: usize) {}
}

impl LoopOutput for Real128 {
    #[allow(unsafe_code)]
    unsafe fn put(self, p: *mut u8) {
        ptr::write_unaligned(p.cast::<Real128>(), self)
    }

    fn written(first: *const u8, stride: isize, count: usize) {
        mark_written(MemoryRegistry::global(), first.cast::<Real128>(), stride, count);
    }
}

impl LoopOutput for bool {
    #[allow(unsafe_code)]
    unsafe fn put(self, p: *mut u8) {
        p.write(u8::from(self))
    }
}

/// Apply `f` elementwise: one input, one output.
///
/// # Safety
///
/// `args`, `dimensions` and `steps` must describe two operands of at
/// least `dimensions[0]` elements with the given strides.
#[allow(unsafe_code)]
pub(crate) unsafe fn unary<T: LoopOutput>(
    args: *const *mut u8,
    dimensions: *const isize,
    steps: *const isize,
    f: impl Fn(Real128) -> T,
) {
    let n = *dimensions;
    let (is, os) = (*steps, *steps.add(1));
    let (mut ip, mut op) = (*args, *args.add(1));
    for _ in 0..n {
        f(ptr::read_unaligned(ip.cast::<Real128>())).put(op);
        ip = ip.wrapping_offset(is);
        op = op.wrapping_offset(os);
    }
    T::written(*args.add(1), os, usize::try_from(n).unwrap_or(0));
}

/// Apply `f` elementwise: two inputs, one output.
///
/// # Safety
///
/// As [`unary`], for three operands.
#[allow(unsafe_code)]
pub(crate) unsafe fn binary<T: LoopOutput>(
    args: *const *mut u8,
    dimensions: *const isize,
    steps: *const isize,
    f: impl Fn(Real128, Real128) -> T,
) {
    let n = *dimensions;
    let (is0, is1, os) = (*steps, *steps.add(1), *steps.add(2));
    let (mut i0, mut i1, mut op) = (*args, *args.add(1), *args.add(2));
    for _ in 0..n {
        let x = ptr::read_unaligned(i0.cast::<Real128>());
        let y = ptr::read_unaligned(i1.cast::<Real128>());
        f(x, y).put(op);
        i0 = i0.wrapping_offset(is0);
        i1 = i1.wrapping_offset(is1);
        op = op.wrapping_offset(os);
    }
    T::written(*args.add(2), os, usize::try_from(n).unwrap_or(0));
}

/// Declare one `LoopFn` per entry, each forwarding to `unary`/`binary`
/// with its kernel.
macro_rules! loops {
    ($kernel:ident: $($name:ident => $f:expr;)*) => {$(
        #[allow(unsafe_code)]
        unsafe extern "C" fn $name(
            args: *const *mut u8,
            dimensions: *const isize,
            steps: *const isize,
            _data: *mut c_void,
        ) {
            $kernel(args, dimensions, steps, $f)
        }
    )*};
}

fn floor_divide(x: Real128, y: Real128) -> Real128 {
    (x / y).floor()
}

loops! { unary:
    square => Real128::square;
    absolute => Real128::abs;
    positive => |x: Real128| x;
    negative => |x: Real128| -x;
    sign => Real128::signum;
    sqrt => Real128::sqrt;
    cbrt => Real128::cbrt;
    floor => Real128::floor;
    ceil => Real128::ceil;
    trunc => Real128::trunc;
    sin => Real128::sin;
    cos => Real128::cos;
    tan => Real128::tan;
    arcsin => Real128::asin;
    arccos => Real128::acos;
    arctan => Real128::atan;
    sinh => Real128::sinh;
    cosh => Real128::cosh;
    tanh => Real128::tanh;
    arcsinh => Real128::asinh;
    arccosh => Real128::acosh;
    arctanh => Real128::atanh;
    deg2rad => Real128::to_radians;
    rad2deg => Real128::to_degrees;
    exp => Real128::exp;
    exp2 => Real128::exp2;
    expm1 => Real128::exp_m1;
    log => Real128::ln;
    log2 => Real128::log2;
    log10 => Real128::log10;
    log1p => Real128::ln_1p;
    isfinite => Real128::is_finite;
    isnan => Real128::is_nan;
    isinf => Real128::is_infinite;
}

loops! { binary:
    add => |x: Real128, y: Real128| x + y;
    subtract => |x: Real128, y: Real128| x - y;
    multiply => |x: Real128, y: Real128| x * y;
    divide => |x: Real128, y: Real128| x / y;
    floor_div => floor_divide;
    power => Real128::powf;
    arctan2 => Real128::atan2;
    maximum => Real128::maximum;
    minimum => Real128::minimum;
    less => |x: Real128, y: Real128| x < y;
    less_equal => |x: Real128, y: Real128| x <= y;
    equal => |x: Real128, y: Real128| x == y;
    not_equal => |x: Real128, y: Real128| x != y;
    greater => |x: Real128, y: Real128| x > y;
    greater_equal => |x: Real128, y: Real128| x >= y;
}

/// Output of a loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Out {
    /// Same type as the inputs.
    Quad,
    /// Host boolean.
    Bool,
}

/// Unary operations with their loops.
pub(crate) const UNARY_LOOPS: &[(&str, LoopFn, Out)] = &[
    ("square", square, Out::Quad),
    ("absolute", absolute, Out::Quad),
    ("fabs", absolute, Out::Quad),
    ("positive", positive, Out::Quad),
    ("negative", negative, Out::Quad),
    ("sign", sign, Out::Quad),
    ("sqrt", sqrt, Out::Quad),
    ("cbrt", cbrt, Out::Quad),
    ("floor", floor, Out::Quad),
    ("ceil", ceil, Out::Quad),
    ("trunc", trunc, Out::Quad),
    ("sin", sin, Out::Quad),
    ("cos", cos, Out::Quad),
    ("tan", tan, Out::Quad),
    ("arcsin", arcsin, Out::Quad),
    ("arccos", arccos, Out::Quad),
    ("arctan", arctan, Out::Quad),
    ("sinh", sinh, Out::Quad),
    ("cosh", cosh, Out::Quad),
    ("tanh", tanh, Out::Quad),
    ("arcsinh", arcsinh, Out::Quad),
    ("arccosh", arccosh, Out::Quad),
    ("arctanh", arctanh, Out::Quad),
    ("deg2rad", deg2rad, Out::Quad),
    ("radians", deg2rad, Out::Quad),
    ("rad2deg", rad2deg, Out::Quad),
    ("degrees", rad2deg, Out::Quad),
    ("exp", exp, Out::Quad),
    ("exp2", exp2, Out::Quad),
    ("expm1", expm1, Out::Quad),
    ("log", log, Out::Quad),
    ("log2", log2, Out::Quad),
    ("log10", log10, Out::Quad),
    ("log1p", log1p, Out::Quad),
    ("isfinite", isfinite, Out::Bool),
    ("isnan", isnan, Out::Bool),
    ("isinf", isinf, Out::Bool),
];

/// Binary operations with their loops.
pub(crate) const BINARY_LOOPS: &[(&str, LoopFn, Out)] = &[
    ("add", add, Out::Quad),
    ("subtract", subtract, Out::Quad),
    ("multiply", multiply, Out::Quad),
    ("divide", divide, Out::Quad),
    ("true_divide", divide, Out::Quad),
    ("floor_divide", floor_div, Out::Quad),
    ("power", power, Out::Quad),
    ("arctan2", arctan2, Out::Quad),
    ("maximum", maximum, Out::Quad),
    ("minimum", minimum, Out::Quad),
    ("less", less, Out::Bool),
    ("less_equal", less_equal, Out::Bool),
    ("equal", equal, Out::Bool),
    ("not_equal", not_equal, Out::Bool),
    ("greater", greater, Out::Bool),
    ("greater_equal", greater_equal, Out::Bool),
];

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    fn run_unary(f: LoopFn, input: &[Real128], out: &mut [u8], os: isize) {
        let args = [input.as_ptr() as *mut u8, out.as_mut_ptr()];
        let dims = [input.len() as isize];
        let steps = [16isize, os];
        unsafe { f(args.as_ptr(), dims.as_ptr(), steps.as_ptr(), ptr::null_mut()) };
    }

    #[test]
    fn unary_quad_loop() {
        let input = [Real128::from(4.0), Real128::from(9.0)];
        let mut out = [Real128::ZERO; 2];
        let args = [input.as_ptr() as *mut u8, out.as_mut_ptr().cast::<u8>()];
        let dims = [2isize];
        let steps = [16isize, 16];
        unsafe { sqrt(args.as_ptr(), dims.as_ptr(), steps.as_ptr(), ptr::null_mut()) };
        assert_eq!(out, [Real128::from(2.0), Real128::from(3.0)]);
    }

    #[test]
    fn predicate_loops_write_bytes() {
        let input = [Real128::ONE, Real128::NAN, Real128::NEG_INFINITY];
        let mut out = [9u8; 3];
        run_unary(isfinite, &input, &mut out, 1);
        assert_eq!(out, [1, 0, 0]);
        run_unary(isnan, &input, &mut out, 1);
        assert_eq!(out, [0, 1, 0]);
    }

    #[test]
    fn binary_loop_honours_broadcast_strides() {
        // A zero stride repeats the second operand.
        let a = [Real128::from(1.0), Real128::from(2.0), Real128::from(3.0)];
        let b = [Real128::from(2.0)];
        let mut out = [0u8; 3];
        let args = [a.as_ptr() as *mut u8, b.as_ptr() as *mut u8, out.as_mut_ptr()];
        let dims = [3isize];
        let steps = [16isize, 0, 1];
        unsafe { less(args.as_ptr(), dims.as_ptr(), steps.as_ptr(), ptr::null_mut()) };
        assert_eq!(out, [1, 0, 0]);
    }

    #[test]
    fn tables_cover_distinct_names() {
        let mut names: Vec<&str> = UNARY_LOOPS
            .iter()
            .chain(BINARY_LOOPS)
            .map(|(n, _, _)| *n)
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
