//! Element casts between the quad-precision type and native kinds.
//!
//! Native to quad is exact for every kind here and is declared safe.
//! Quad to native is never safe: floats round to nearest, integers
//! truncate towards zero and saturate at the kind's bounds, and NaN
//! becomes 0. Booleans are `value != 0`, so NaN becomes `true`.

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;

use quaddt_core::{Real128, RegistrationError, TypeTag};
use quaddt_host::{CastFn, Runtime};
use quaddt_mem::{mark_written, MemoryRegistry};

/// A native element layout with conversions to and from [`Real128`].
pub(crate) trait NativeElement: Copy + 'static {
    /// Host tag of the element kind.
    const TAG: TypeTag;

    /// Exact widening.
    fn widen(self) -> Real128;

    /// Narrowing, as described in the module docs.
    fn narrow(q: Real128) -> Self;
}

macro_rules! native_int {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl NativeElement for $t {
            const TAG: TypeTag = TypeTag::$kind;

            fn widen(self) -> Real128 {
                Real128::from(self)
            }

            fn narrow(q: Real128) -> Self {
                let wide = q.to_i128_saturating();
                wide.clamp(i128::from(<$t>::MIN), i128::from(<$t>::MAX)) as $t
            }
        }
    )*};
}

native_int!(
    i8 => INT8,
    i16 => INT16,
    i32 => INT32,
    i64 => INT64,
    u8 => UINT8,
    u16 => UINT16,
    u32 => UINT32,
    u64 => UINT64,
);

impl NativeElement for f32 {
    const TAG: TypeTag = TypeTag::FLOAT32;

    fn widen(self) -> Real128 {
        Real128::from(self)
    }

    fn narrow(q: Real128) -> Self {
        q.to_f32()
    }
}

impl NativeElement for f64 {
    const TAG: TypeTag = TypeTag::FLOAT64;

    fn widen(self) -> Real128 {
        Real128::from(self)
    }

    fn narrow(q: Real128) -> Self {
        q.to_f64()
    }
}

/// Host booleans are one byte; any non-zero byte reads as `true`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct HostBool(u8);

impl NativeElement for HostBool {
    const TAG: TypeTag = TypeTag::BOOL;

    fn widen(self) -> Real128 {
        Real128::from(self.0 != 0)
    }

    fn narrow(q: Real128) -> Self {
        Self(u8::from(!q.is_zero()))
    }
}

#[allow(unsafe_code)]
unsafe extern "C" fn to_real128<T: NativeElement>(from: *const c_void, to: *mut c_void, n: isize) {
    let (src, dst) = (from.cast::<T>(), to.cast::<Real128>());
    for i in 0..n {
        let v = ptr::read_unaligned(src.offset(i));
        ptr::write_unaligned(dst.offset(i), v.widen());
    }
    let count = usize::try_from(n).unwrap_or(0);
    mark_written(MemoryRegistry::global(), dst, size_of::<Real128>() as isize, count);
}

#[allow(unsafe_code)]
unsafe extern "C" fn from_real128<T: NativeElement>(from: *const c_void, to: *mut c_void, n: isize) {
    let (src, dst) = (from.cast::<Real128>(), to.cast::<T>());
    for i in 0..n {
        let q = ptr::read_unaligned(src.offset(i));
        ptr::write_unaligned(dst.offset(i), T::narrow(q));
    }
}

/// One native kind's pair of cast functions.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CastPair {
    pub(crate) native: TypeTag,
    pub(crate) to_quad: CastFn,
    pub(crate) from_quad: CastFn,
}

fn pair<T: NativeElement>() -> CastPair {
    CastPair {
        native: T::TAG,
        to_quad: to_real128::<T>,
        from_quad: from_real128::<T>,
    }
}

/// Cast functions for every native kind, in host tag order.
pub(crate) fn cast_pairs() -> [CastPair; 11] {
    [
        pair::<HostBool>(),
        pair::<i8>(),
        pair::<u8>(),
        pair::<i16>(),
        pair::<u16>(),
        pair::<i32>(),
        pair::<u32>(),
        pair::<i64>(),
        pair::<u64>(),
        pair::<f32>(),
        pair::<f64>(),
    ]
}

/// Register casts both ways between `tag` and every native kind,
/// declaring the native-to-quad direction safe. Returns the number of
/// cast functions registered.
pub(crate) fn register_casts(rt: &Runtime, tag: TypeTag) -> Result<usize, RegistrationError> {
    let pairs = cast_pairs();
    for p in &pairs {
        rt.register_cast_func(p.native, tag, p.to_quad)?;
        rt.register_safe_cast(p.native, tag)?;
        rt.register_cast_func(tag, p.native, p.from_quad)?;
    }
    Ok(pairs.len() * 2)
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    fn narrow_all<T: NativeElement>(qs: &[Real128]) -> Vec<T> {
        qs.iter().map(|&q| T::narrow(q)).collect()
    }

    #[test]
    fn integer_narrowing_saturates_and_maps_nan_to_zero() {
        let qs = [
            Real128::from(300.0),
            Real128::from(-300.0),
            Real128::from(-7.9),
            Real128::NAN,
            Real128::INFINITY,
        ];
        assert_eq!(narrow_all::<i8>(&qs), vec![127, -128, -7, 0, 127]);
        assert_eq!(narrow_all::<u8>(&qs), vec![255, 0, 0, 0, 255]);
        assert_eq!(narrow_all::<u64>(&qs[..1]), vec![300]);
    }

    #[test]
    fn bool_reads_any_nonzero_byte() {
        assert_eq!(HostBool(2).widen(), Real128::ONE);
        assert_eq!(HostBool::narrow(Real128::NAN), HostBool(1));
        assert_eq!(HostBool::narrow(Real128::ZERO), HostBool(0));
    }

    #[test]
    fn bulk_casts_round_trip_exact_values() {
        let src: [i64; 3] = [i64::MIN, -1, i64::MAX];
        let mut mid = [Real128::ZERO; 3];
        let mut back = [0i64; 3];
        unsafe {
            to_real128::<i64>(src.as_ptr().cast(), mid.as_mut_ptr().cast(), 3);
            from_real128::<i64>(mid.as_ptr().cast(), back.as_mut_ptr().cast(), 3);
        }
        assert_eq!(back, src);
    }

    #[test]
    fn pairs_cover_every_builtin_tag() {
        let tags: Vec<TypeTag> = cast_pairs().iter().map(|p| p.native).collect();
        assert_eq!(tags, TypeTag::BUILTINS.to_vec());
    }
}
