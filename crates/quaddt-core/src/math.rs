//! Elementary functions on [`Real128`].
//!
//! The transcendental functions come from `twofloat`; this module pins
//! down their domains and special values so they follow C's `<math.h>`.

use crate::real128::Real128;

/// Arguments below this magnitude take the power series in
/// [`Real128::exp_m1`] and [`Real128::ln_1p`].
const SERIES_LIMIT: f64 = 1.0 / 1024.0;
/// Enough terms that `SERIES_LIMIT^k` drops below the working precision.
const SERIES_TERMS: u32 = 12;

fn expm1_series(x: Real128) -> Real128 {
    let mut term = x;
    let mut sum = x;
    for k in 2..=SERIES_TERMS {
        term = term * x / Real128::from(k);
        sum += term;
    }
    sum
}

fn ln1p_series(x: Real128) -> Real128 {
    let mut power = x;
    let mut sum = x;
    for k in 2..=SERIES_TERMS {
        power = -(power * x);
        sum += power / Real128::from(k);
    }
    sum
}

impl Real128 {
    /// Square root: one Newton step from the binary64 root, which keeps
    /// perfect squares exact.
    pub fn sqrt(self) -> Self {
        if self.is_nan() || self.is_zero() || self == Self::INFINITY {
            return self;
        }
        if self.hi() < 0.0 {
            return Self::NAN;
        }
        let x = Self::from(self.hi().sqrt());
        x + (self - x.square()) / (x + x)
    }

    /// Cube root.
    pub fn cbrt(self) -> Self {
        if self.is_zero() {
            return self;
        }
        self.lift(f64::cbrt, |t| t.cbrt())
    }

    /// `e^self`.
    pub fn exp(self) -> Self {
        if self.is_zero() {
            return Self::ONE;
        }
        self.lift(f64::exp, |t| t.exp())
    }

    /// `2^self`.
    pub fn exp2(self) -> Self {
        if self.is_integer() && self.hi().abs() < 2048.0 {
            return Self::ONE.ldexp(self.hi() as i32);
        }
        if !self.is_finite() {
            return Self::from(self.hi().exp2());
        }
        (self * Self::LN_2).exp()
    }

    /// `e^self - 1`, accurate near zero.
    pub fn exp_m1(self) -> Self {
        if !self.is_finite() || self.is_zero() {
            return Self::from(self.hi().exp_m1());
        }
        if self.hi().abs() < SERIES_LIMIT {
            return expm1_series(self);
        }
        self.exp() - Self::ONE
    }

    /// Natural logarithm.
    pub fn ln(self) -> Self {
        if self == Self::ONE {
            return Self::ZERO;
        }
        self.lift(f64::ln, |t| t.ln())
    }

    /// Base-2 logarithm.
    pub fn log2(self) -> Self {
        self.ln() / Self::LN_2
    }

    /// Base-10 logarithm.
    pub fn log10(self) -> Self {
        self.ln() / Self::LN_10
    }

    /// `ln(1 + self)`, accurate near zero.
    pub fn ln_1p(self) -> Self {
        if self.is_nan() || self.is_zero() || self == Self::INFINITY {
            return self;
        }
        if self.hi().abs() < SERIES_LIMIT {
            return ln1p_series(self);
        }
        (Self::ONE + self).ln()
    }

    /// Raise to an integer power by repeated squaring.
    pub fn powi(self, n: i64) -> Self {
        if n == 0 {
            return Self::ONE;
        }
        let mut base = self;
        let mut e = n.unsigned_abs();
        let mut acc = Self::ONE;
        while e > 0 {
            if e & 1 == 1 {
                acc *= base;
            }
            e >>= 1;
            if e > 0 {
                base = base.square();
            }
        }
        if n < 0 {
            acc.recip()
        } else {
            acc
        }
    }

    /// Raise to a real power, following the special cases of C `pow`.
    pub fn powf(self, y: Self) -> Self {
        if y.is_zero() || self == Self::ONE {
            return Self::ONE;
        }
        if self.is_nan() || y.is_nan() {
            return Self::NAN;
        }
        if y.is_infinite() {
            let m = self.abs();
            return if m == Self::ONE {
                Self::ONE
            } else if (m > Self::ONE) == (y.hi() > 0.0) {
                Self::INFINITY
            } else {
                Self::ZERO
            };
        }
        // 2^62
        if y.is_integer() && y.hi().abs() < 4.611_686_018_427_388e18 {
            return self.powi(y.to_i128_saturating() as i64);
        }
        if self.hi() < 0.0 || (self.is_zero() && self.is_sign_negative()) {
            if !y.is_integer() {
                return Self::NAN;
            }
            let m = self.abs().powf(y);
            return if y.is_odd_integer() { -m } else { m };
        }
        if self.is_zero() {
            return if y.hi() > 0.0 {
                Self::ZERO
            } else {
                Self::INFINITY
            };
        }
        if self.is_infinite() {
            return if y.hi() > 0.0 {
                Self::INFINITY
            } else {
                Self::ZERO
            };
        }
        (y * self.ln()).exp()
    }

    /// Sine and cosine together.
    pub fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }

    /// Sine.
    pub fn sin(self) -> Self {
        if self.is_zero() {
            return self;
        }
        self.lift(f64::sin, |t| t.sin())
    }

    /// Cosine.
    pub fn cos(self) -> Self {
        if self.is_zero() {
            return Self::ONE;
        }
        self.lift(f64::cos, |t| t.cos())
    }

    /// Tangent.
    pub fn tan(self) -> Self {
        if self.is_zero() {
            return self;
        }
        self.lift(f64::tan, |t| t.tan())
    }

    /// Four-quadrant arctangent of `self / x`.
    pub fn atan2(self, x: Self) -> Self {
        let y = self;
        if y.is_zero() && !x.is_nan() {
            return if x.is_sign_negative() {
                Self::PI.copysign(y)
            } else {
                y
            };
        }
        if x.is_zero() && !y.is_nan() {
            return Self::FRAC_PI_2.copysign(y);
        }
        y.lift2(x, f64::atan2, |a, b| a.atan2(b))
    }

    /// Arctangent.
    pub fn atan(self) -> Self {
        if self.is_infinite() {
            return Self::FRAC_PI_2.copysign(self);
        }
        if self.is_zero() {
            return self;
        }
        self.lift(f64::atan, |t| t.atan())
    }

    /// Arcsine.
    pub fn asin(self) -> Self {
        if self.abs() == Self::ONE {
            return Self::FRAC_PI_2.copysign(self);
        }
        if self.is_zero() {
            return self;
        }
        self.lift(f64::asin, |t| t.asin())
    }

    /// Arccosine.
    pub fn acos(self) -> Self {
        if self == Self::ONE {
            return Self::ZERO;
        }
        if self == -Self::ONE {
            return Self::PI;
        }
        if self.is_zero() {
            return Self::FRAC_PI_2;
        }
        self.lift(f64::acos, |t| t.acos())
    }

    /// Hyperbolic sine.
    pub fn sinh(self) -> Self {
        if self.is_zero() {
            return self;
        }
        self.lift(f64::sinh, |t| t.sinh())
    }

    /// Hyperbolic cosine.
    pub fn cosh(self) -> Self {
        if self.is_zero() {
            return Self::ONE;
        }
        self.lift(f64::cosh, |t| t.cosh())
    }

    /// Hyperbolic tangent.
    pub fn tanh(self) -> Self {
        if self.is_zero() {
            return self;
        }
        // 1 - tanh(40) is below half an ulp of one.
        if self.hi().abs() > 40.0 {
            return Self::ONE.copysign(self);
        }
        self.lift(f64::tanh, |t| t.tanh())
    }

    /// Inverse hyperbolic sine.
    pub fn asinh(self) -> Self {
        if self.is_zero() {
            return self;
        }
        self.lift(f64::asinh, |t| t.asinh())
    }

    /// Inverse hyperbolic cosine.
    pub fn acosh(self) -> Self {
        if self == Self::ONE {
            return Self::ZERO;
        }
        if self < Self::ONE {
            return Self::NAN;
        }
        self.lift(f64::acosh, |t| t.acosh())
    }

    /// Inverse hyperbolic tangent.
    pub fn atanh(self) -> Self {
        let a = self.abs();
        if self.is_nan() || a > Self::ONE {
            return Self::NAN;
        }
        if a == Self::ONE {
            return Self::INFINITY.copysign(self);
        }
        if self.is_zero() {
            return self;
        }
        self.lift(f64::atanh, |t| t.atanh())
    }

    /// Convert radians to degrees.
    pub fn to_degrees(self) -> Self {
        self * Self::from(180.0) / Self::PI
    }

    /// Convert degrees to radians.
    pub fn to_radians(self) -> Self {
        self * Self::PI / Self::from(180.0)
    }
}
