//! The quad-precision value type.
//!
//! [`Real128`] is a double-double: an unevaluated sum `hi + lo` of two
//! binary64 values with `|lo| <= ulp(hi) / 2`, stored as a `repr(C)` pair
//! so its 16 bytes have a fixed layout inside host buffers. It carries a
//! 106-bit significand (epsilon `2^-104`) and the exponent range of
//! binary64.
//!
//! Arithmetic and the elementary functions run on [`TwoFloat`]. Special
//! values are settled on the leading components first: when an operand
//! or the binary64 result on the leading components is not finite, that
//! binary64 result is returned with a zero trailing component. So
//! `1 / 0 == +inf` and `NaN != NaN`, exactly as in binary64.

use std::cmp::Ordering;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, Sub, SubAssign};

use twofloat::TwoFloat;

/// A 128-bit double-double floating-point value.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct Real128 {
    hi: f64,
    lo: f64,
}

const _: () = assert!(std::mem::size_of::<Real128>() == 16);
const _: () = assert!(std::mem::align_of::<Real128>() <= 8);

/// Exact `x * 2^n` for results in the normal range.
fn scalbn(mut x: f64, mut n: i32) -> f64 {
    let two_1023 = f64::from_bits(0x7FE0_0000_0000_0000);
    // 2^-969 keeps 53 guard bits when stepping into the subnormal range.
    let two_m969 = f64::from_bits(0x0360_0000_0000_0000);
    if n > 1023 {
        x *= two_1023;
        n -= 1023;
        if n > 1023 {
            x *= two_1023;
            n -= 1023;
            n = n.min(1023);
        }
    } else if n < -1022 {
        x *= two_m969;
        n += 969;
        if n < -1022 {
            x *= two_m969;
            n += 969;
            n = n.max(-1022);
        }
    }
    x * f64::from_bits(((0x3FF + n) as u64) << 52)
}

// ── Construction and inspection ────────────────────────────────────

impl Real128 {
    /// Zero.
    pub const ZERO: Self = Self::from_parts_unchecked(0.0, 0.0);
    /// One.
    pub const ONE: Self = Self::from_parts_unchecked(1.0, 0.0);
    /// Not a number.
    pub const NAN: Self = Self::from_parts_unchecked(f64::NAN, 0.0);
    /// Positive infinity.
    pub const INFINITY: Self = Self::from_parts_unchecked(f64::INFINITY, 0.0);
    /// Negative infinity.
    pub const NEG_INFINITY: Self = Self::from_parts_unchecked(f64::NEG_INFINITY, 0.0);
    /// Largest finite value.
    pub const MAX: Self = Self::from_parts_unchecked(f64::MAX, 9.979_201_547_673_598e291);
    /// Difference between 1 and the next larger representable value (2^-104).
    pub const EPSILON: Self = Self::from_parts_unchecked(4.930_380_657_631_324e-32, 0.0);
    /// Significand width in bits.
    pub const MANTISSA_DIGITS: u32 = 106;
    /// Decimal digits reliably represented.
    pub const DIGITS: u32 = 31;

    /// Archimedes' constant.
    pub const PI: Self =
        Self::from_parts_unchecked(3.141_592_653_589_793_116e0, 1.224_646_799_147_353_207e-16);
    /// π/2.
    pub const FRAC_PI_2: Self =
        Self::from_parts_unchecked(1.570_796_326_794_896_558e0, 6.123_233_995_736_766_036e-17);
    /// π/4.
    pub const FRAC_PI_4: Self =
        Self::from_parts_unchecked(7.853_981_633_974_482_790e-1, 3.061_616_997_868_383_018e-17);
    /// ln 2.
    pub const LN_2: Self =
        Self::from_parts_unchecked(6.931_471_805_599_452_862e-1, 2.319_046_813_846_299_558e-17);
    /// ln 10.
    pub const LN_10: Self =
        Self::from_parts_unchecked(2.302_585_092_994_045_901e0, -2.170_756_223_382_249_351e-16);

    pub(crate) const fn from_parts_unchecked(hi: f64, lo: f64) -> Self {
        Self { hi, lo }
    }

    /// Build a value from two components, renormalising their sum.
    pub fn from_parts(hi: f64, lo: f64) -> Self {
        let approx = hi + lo;
        if !approx.is_finite() {
            return Self::from(approx);
        }
        Self::settle(TwoFloat::new_add(hi, lo), approx)
    }

    /// Keep `t` if both its components are finite, else fall back to the
    /// binary64 result `approx`.
    #[inline]
    fn settle(t: TwoFloat, approx: f64) -> Self {
        let (hi, lo) = (t.hi(), t.lo());
        if hi.is_finite() && lo.is_finite() {
            Self { hi, lo }
        } else {
            Self::from(approx)
        }
    }

    #[inline]
    fn to_twofloat(self) -> TwoFloat {
        TwoFloat::new_add(self.hi, self.lo)
    }

    /// Evaluate a one-argument function: `approx` on the leading
    /// component settles special values, `exact` computes the rest.
    #[inline]
    pub(crate) fn lift(self, approx: fn(f64) -> f64, exact: fn(TwoFloat) -> TwoFloat) -> Self {
        let a = approx(self.hi);
        if !self.is_finite() || !a.is_finite() {
            return Self::from(a);
        }
        Self::settle(exact(self.to_twofloat()), a)
    }

    /// Two-argument form of [`Real128::lift`].
    #[inline]
    pub(crate) fn lift2(
        self,
        rhs: Self,
        approx: fn(f64, f64) -> f64,
        exact: fn(TwoFloat, TwoFloat) -> TwoFloat,
    ) -> Self {
        let a = approx(self.hi, rhs.hi);
        if !self.is_finite() || !rhs.is_finite() || !a.is_finite() {
            return Self::from(a);
        }
        Self::settle(exact(self.to_twofloat(), rhs.to_twofloat()), a)
    }

    /// Leading component; also the nearest binary64 value.
    pub fn hi(self) -> f64 {
        self.hi
    }

    /// Trailing component.
    pub fn lo(self) -> f64 {
        self.lo
    }

    /// Machine epsilon of the type.
    pub fn epsilon() -> Self {
        Self::EPSILON
    }

    /// Nearest binary64 value.
    pub fn to_f64(self) -> f64 {
        self.hi
    }

    /// Nearest binary32 value (rounded through binary64).
    pub fn to_f32(self) -> f32 {
        self.hi as f32
    }

    /// `true` if the value is NaN.
    pub fn is_nan(self) -> bool {
        self.hi.is_nan()
    }

    /// `true` if the value is positive or negative infinity.
    pub fn is_infinite(self) -> bool {
        self.hi.is_infinite()
    }

    /// `true` if the value is neither infinite nor NaN.
    pub fn is_finite(self) -> bool {
        self.hi.is_finite()
    }

    /// `true` for positive and negative zero.
    pub fn is_zero(self) -> bool {
        self.hi == 0.0
    }

    /// `true` if the sign bit is set (including `-0` and negative NaN).
    pub fn is_sign_negative(self) -> bool {
        self.hi.is_sign_negative()
    }

    /// `true` for finite values without a fractional part.
    pub fn is_integer(self) -> bool {
        self.is_finite() && self.floor() == self
    }

    /// `true` for integers not divisible by two. Both components count,
    /// so integers beyond 2^53 still have a parity.
    pub fn is_odd_integer(self) -> bool {
        self.is_integer() && !self.ldexp(-1).is_integer()
    }

    /// Truncate towards zero into an `i128`, saturating at the bounds.
    /// NaN maps to 0.
    pub fn to_i128_saturating(self) -> i128 {
        if self.is_nan() {
            return 0;
        }
        let t = self.trunc();
        // 2^127
        let limit = 1.701_411_834_604_692_3e38;
        if t.hi >= limit {
            i128::MAX
        } else if t.hi <= -limit {
            i128::MIN
        } else {
            (t.hi as i128).saturating_add(t.lo as i128)
        }
    }

    /// Truncate towards zero into a `u128`, saturating at the bounds.
    /// NaN and negative values map to 0.
    pub fn to_u128_saturating(self) -> u128 {
        if self.is_nan() || self.hi <= 0.0 {
            return 0;
        }
        let t = self.trunc();
        // 2^128
        let limit = 3.402_823_669_209_384_6e38;
        if t.hi >= limit {
            u128::MAX
        } else if t.lo >= 0.0 {
            (t.hi as u128).saturating_add(t.lo as u128)
        } else {
            (t.hi as u128).saturating_sub((-t.lo) as u128)
        }
    }

    /// Multiply by `2^n` exactly, barring overflow or underflow.
    pub fn ldexp(self, n: i32) -> Self {
        let hi = scalbn(self.hi, n);
        if hi.is_finite() {
            Self { hi, lo: scalbn(self.lo, n) }
        } else {
            Self::from(hi)
        }
    }

    /// Absolute value.
    pub fn abs(self) -> Self {
        if self.hi.is_sign_negative() {
            -self
        } else {
            self
        }
    }

    /// Sign of the value: `-1`, `0` or `1`; NaN is returned unchanged.
    pub fn signum(self) -> Self {
        if self.is_nan() {
            self
        } else if self.hi > 0.0 {
            Self::ONE
        } else if self.hi < 0.0 {
            -Self::ONE
        } else {
            Self::ZERO
        }
    }

    /// Copy the sign of `sign` onto the magnitude of `self`.
    pub fn copysign(self, sign: Self) -> Self {
        if self.hi.is_sign_negative() == sign.hi.is_sign_negative() {
            self
        } else {
            -self
        }
    }

    /// Largest integer not greater than the value.
    pub fn floor(self) -> Self {
        let hi = self.hi.floor();
        if hi == self.hi {
            Self::from_parts(hi, self.lo.floor())
        } else {
            Self::from(hi)
        }
    }

    /// Smallest integer not less than the value.
    pub fn ceil(self) -> Self {
        let hi = self.hi.ceil();
        if hi == self.hi {
            Self::from_parts(hi, self.lo.ceil())
        } else {
            Self::from(hi)
        }
    }

    /// Integer part, rounding towards zero.
    pub fn trunc(self) -> Self {
        if self.hi >= 0.0 {
            self.floor()
        } else {
            self.ceil()
        }
    }

    /// Nearest integer, ties away from zero.
    pub fn round(self) -> Self {
        let half = Self::from(0.5);
        if self.hi >= 0.0 {
            (self + half).floor()
        } else {
            (self - half).ceil()
        }
    }

    /// `self * self`.
    pub fn square(self) -> Self {
        self * self
    }

    /// `1 / self`.
    pub fn recip(self) -> Self {
        Self::ONE / self
    }

    /// `self * a + b`.
    pub fn mul_add(self, a: Self, b: Self) -> Self {
        self * a + b
    }

    /// Larger of two values; NaN if either operand is NaN.
    pub fn maximum(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            Self::NAN
        } else if self < other {
            other
        } else {
            self
        }
    }

    /// Smaller of two values; NaN if either operand is NaN.
    pub fn minimum(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            Self::NAN
        } else if other < self {
            other
        } else {
            self
        }
    }
}

// ── Conversions ────────────────────────────────────────────────────

impl From<f64> for Real128 {
    fn from(v: f64) -> Self {
        Self { hi: v, lo: 0.0 }
    }
}

impl From<f32> for Real128 {
    fn from(v: f32) -> Self {
        Self::from(f64::from(v))
    }
}

impl From<bool> for Real128 {
    fn from(v: bool) -> Self {
        if v {
            Self::ONE
        } else {
            Self::ZERO
        }
    }
}

macro_rules! from_small_int {
    ($($t:ty),*) => {$(
        impl From<$t> for Real128 {
            fn from(v: $t) -> Self {
                Self::from(f64::from(v))
            }
        }
    )*};
}

from_small_int!(i8, i16, i32, u8, u16, u32);

impl From<i64> for Real128 {
    fn from(v: i64) -> Self {
        let hi = v as f64;
        let lo = (i128::from(v) - hi as i128) as f64;
        Self::from_parts(hi, lo)
    }
}

impl From<u64> for Real128 {
    fn from(v: u64) -> Self {
        let hi = v as f64;
        let lo = (i128::from(v) - hi as i128) as f64;
        Self::from_parts(hi, lo)
    }
}

// ── Comparison ─────────────────────────────────────────────────────

impl PartialEq for Real128 {
    fn eq(&self, other: &Self) -> bool {
        self.hi == other.hi && self.lo == other.lo
    }
}

impl PartialOrd for Real128 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.hi.partial_cmp(&other.hi)? {
            Ordering::Equal => self.lo.partial_cmp(&other.lo),
            ord => Some(ord),
        }
    }
}

// ── Arithmetic ─────────────────────────────────────────────────────

impl Neg for Real128 {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            hi: -self.hi,
            lo: -self.lo,
        }
    }
}

impl Add for Real128 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.lift2(rhs, |a, b| a + b, |a, b| a + b)
    }
}

impl Sub for Real128 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.lift2(rhs, |a, b| a - b, |a, b| a - b)
    }
}

impl Mul for Real128 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.lift2(rhs, |a, b| a * b, |a, b| a * b)
    }
}

impl Div for Real128 {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return Self::from(self.hi / rhs.hi);
        }
        self.lift2(rhs, |a, b| a / b, |a, b| a / b)
    }
}

impl Rem for Real128 {
    type Output = Self;

    /// Remainder with the sign of the dividend, as `%` on binary floats.
    fn rem(self, rhs: Self) -> Self {
        if !self.is_finite() || rhs.is_nan() || rhs.is_zero() {
            return Self::NAN;
        }
        if rhs.is_infinite() {
            return self;
        }
        self - (self / rhs).trunc() * rhs
    }
}

macro_rules! assign_op {
    ($tr:ident, $method:ident, $op:tt) => {
        impl $tr for Real128 {
            fn $method(&mut self, rhs: Self) {
                *self = *self $op rhs;
            }
        }
    };
}

assign_op!(AddAssign, add_assign, +);
assign_op!(SubAssign, sub_assign, -);
assign_op!(MulAssign, mul_assign, *);
assign_op!(DivAssign, div_assign, /);

impl std::iter::Sum for Real128 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(v: f64) -> Real128 {
        Real128::from(v)
    }

    #[test]
    fn layout_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<Real128>(), 16);
        let x = Real128::from_parts(1.0, 2f64.powi(-60));
        assert_eq!((x.hi(), x.lo()), (1.0, 2f64.powi(-60)));
    }

    #[test]
    fn small_integer_arithmetic_is_exact() {
        assert_eq!(q(3.0) + q(4.0), q(7.0));
        assert_eq!(q(3.0) * q(4.0), q(12.0));
        assert_eq!(q(12.0) / q(4.0), q(3.0));
        assert_eq!(q(3.0) - q(4.0), q(-1.0));
    }

    #[test]
    fn carries_more_than_double_precision() {
        let tiny = q(2f64.powi(-80));
        let sum = Real128::ONE + tiny;
        assert_eq!(sum.hi(), 1.0);
        assert_eq!(sum.lo(), 2f64.powi(-80));
        assert_eq!(sum - Real128::ONE, tiny);
    }

    #[test]
    fn one_third_is_accurate_to_about_thirty_digits() {
        let third = Real128::ONE / q(3.0);
        let err = (third * q(3.0) - Real128::ONE).abs();
        assert!(err.hi() < 1e-30, "{err:?}");
    }

    #[test]
    fn special_values_follow_ieee() {
        assert_eq!(Real128::ONE / Real128::ZERO, Real128::INFINITY);
        assert_eq!(-Real128::ONE / Real128::ZERO, Real128::NEG_INFINITY);
        assert!((Real128::ZERO / Real128::ZERO).is_nan());
        assert!((Real128::INFINITY - Real128::INFINITY).is_nan());
        assert_eq!(Real128::INFINITY + q(1.0), Real128::INFINITY);
        assert_eq!(q(1.0) / Real128::INFINITY, Real128::ZERO);
        assert_ne!(Real128::NAN, Real128::NAN);
        assert_eq!(Real128::MAX * q(2.0), Real128::INFINITY);
    }

    #[test]
    fn wide_integers_convert_exactly() {
        let v = i64::MAX;
        let r = Real128::from(v);
        assert_eq!(r.to_i128_saturating(), i128::from(v));
        let u = u64::MAX;
        assert_eq!(Real128::from(u).to_u128_saturating(), u128::from(u));
        assert_eq!(Real128::from(i64::MIN).to_i128_saturating(), i128::from(i64::MIN));
    }

    #[test]
    fn floor_respects_trailing_component() {
        let x = Real128::from_parts(5.0, -1e-20);
        assert_eq!(x.hi(), 5.0);
        assert_eq!(x.floor(), q(4.0));
        assert_eq!(x.trunc(), q(4.0));
        assert_eq!(x.ceil(), q(5.0));
        assert_eq!((-x).trunc(), q(-4.0));
        assert_eq!(q(2.5).round(), q(3.0));
        assert_eq!(q(-2.5).round(), q(-3.0));
    }

    #[test]
    fn parity_reads_both_components() {
        let two_62 = 2f64.powi(62);
        assert!(Real128::from_parts(two_62, 1.0).is_odd_integer());
        assert!(!Real128::from_parts(two_62, 2.0).is_odd_integer());
        assert!(!q(two_62).is_odd_integer());
        assert!(q(-3.0).is_odd_integer());
        assert!(!q(2.5).is_odd_integer());
        assert!(!Real128::INFINITY.is_odd_integer());
    }

    #[test]
    fn saturating_integer_conversion() {
        assert_eq!(Real128::NAN.to_i128_saturating(), 0);
        assert_eq!(Real128::INFINITY.to_i128_saturating(), i128::MAX);
        assert_eq!(Real128::NEG_INFINITY.to_i128_saturating(), i128::MIN);
        assert_eq!(q(-3.0).to_u128_saturating(), 0);
        assert_eq!(q(-7.9).to_i128_saturating(), -7);
    }

    #[test]
    fn sign_helpers() {
        assert_eq!(q(-2.0).signum(), q(-1.0));
        assert_eq!(q(0.0).signum(), q(0.0));
        assert!(Real128::NAN.signum().is_nan());
        assert!(!q(-0.0).abs().is_sign_negative());
        assert_eq!(q(3.0).copysign(q(-1.0)), q(-3.0));
    }

    #[test]
    fn maximum_and_minimum_propagate_nan() {
        assert_eq!(q(1.0).maximum(q(2.0)), q(2.0));
        assert_eq!(q(1.0).minimum(q(2.0)), q(1.0));
        assert!(q(1.0).maximum(Real128::NAN).is_nan());
        assert!(Real128::NAN.minimum(q(1.0)).is_nan());
    }

    #[test]
    fn ordering_uses_both_components() {
        let a = Real128::from_parts(1.0, 1e-20);
        let b = Real128::from_parts(1.0, 2e-20);
        assert!(a < b);
        assert_eq!(Real128::NAN.partial_cmp(&a), None);
        assert_eq!(q(0.0), q(-0.0));
    }

    #[test]
    fn remainder_matches_float_semantics() {
        assert_eq!(q(7.0) % q(3.0), q(1.0));
        assert_eq!(q(-7.0) % q(3.0), q(-1.0));
        assert!((q(1.0) % Real128::ZERO).is_nan());
    }

    #[test]
    fn ldexp_handles_extreme_exponents() {
        assert_eq!(Real128::ONE.ldexp(1023).hi(), 2f64.powi(1023));
        assert_eq!(Real128::ONE.ldexp(2000), Real128::INFINITY);
        assert_eq!(Real128::ONE.ldexp(-1074).hi(), f64::from_bits(1));
        assert_eq!(Real128::ONE.ldexp(-1080), Real128::ZERO);
    }
}
