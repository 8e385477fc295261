//! Operand coercion between host scalars and [`Real128`].
//!
//! Every operand an operator may see is classified into a closed set of
//! variants, each carrying its [`ScalarKind`]. Mixed operations convert
//! through the core promotion lattice, which places the quad-precision
//! type above every native kind; operands with no variant are "not
//! applicable" rather than an error.

use num_bigint::{BigInt, Sign};
use num_traits::{FromPrimitive, ToPrimitive};
use quaddt_core::{promote, ConversionError, Real128, ScalarKind, TypeTag};
use quaddt_host::Value;

/// Width of one limb in the integer magnitude decomposition.
const LIMB_BITS: u32 = 32;

/// A host scalar the quad-precision type knows how to convert.
#[derive(Clone, Debug)]
pub enum Operand<'a> {
    /// A fixed-width integer (including booleans), widened.
    FixedInt {
        /// Source kind.
        kind: ScalarKind,
        /// The value.
        value: i128,
    },
    /// An arbitrary-precision integer.
    BigInt(&'a BigInt),
    /// A native binary floating-point value, widened to double.
    NativeFloat {
        /// Source kind.
        kind: ScalarKind,
        /// The value.
        value: f64,
    },
    /// Already quad precision.
    Quad(Real128),
}

impl<'a> Operand<'a> {
    /// Classify `v`. `tag` is the quad-precision type's tag; foreign
    /// scalars of any other type have no variant.
    pub fn classify(v: &'a Value, tag: TypeTag) -> Option<Self> {
        let op = match v {
            Value::Bool(b) => Self::FixedInt {
                kind: ScalarKind::Bool,
                value: i128::from(*b),
            },
            Value::Fixed(x) => Self::FixedInt {
                kind: x.kind(),
                value: x.to_i128(),
            },
            Value::Int(i) => Self::BigInt(i),
            Value::Float(f) => Self::NativeFloat {
                kind: ScalarKind::Float64,
                value: *f,
            },
            Value::Float32(f) => Self::NativeFloat {
                kind: ScalarKind::Float32,
                value: f64::from(*f),
            },
            Value::Foreign(f) if f.tag() == tag => Self::Quad(*f.downcast_ref::<Real128>()?),
            _ => return None,
        };
        Some(op)
    }

    /// Kind of the operand.
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::FixedInt { kind, .. } | Self::NativeFloat { kind, .. } => *kind,
            Self::BigInt(_) => ScalarKind::BigInt,
            Self::Quad(_) => ScalarKind::Real128,
        }
    }

    /// Convert to quad precision.
    pub fn to_real128(&self) -> Result<Real128, ConversionError> {
        match self {
            Self::FixedInt { value, .. } => Ok(i128_to_real128(*value)),
            Self::BigInt(i) => bigint_to_real128(i),
            Self::NativeFloat { value, .. } => Ok(Real128::from(*value)),
            Self::Quad(q) => Ok(*q),
        }
    }
}

/// Convert both operands of a binary operation, if either is the
/// quad-precision type and the other has a variant.
///
/// `Ok(None)` means the pair is not applicable.
pub fn coerce_pair(
    a: &Value,
    b: &Value,
    tag: TypeTag,
) -> Result<Option<(Real128, Real128)>, ConversionError> {
    let (Some(x), Some(y)) = (Operand::classify(a, tag), Operand::classify(b, tag)) else {
        return Ok(None);
    };
    if !matches!(x, Operand::Quad(_)) && !matches!(y, Operand::Quad(_)) {
        return Ok(None);
    }
    debug_assert_eq!(promote(x.kind(), y.kind()), ScalarKind::Real128);
    Ok(Some((x.to_real128()?, y.to_real128()?)))
}

fn i128_to_real128(v: i128) -> Real128 {
    match i64::try_from(v) {
        Ok(small) => Real128::from(small),
        Err(_) => bigint_to_real128(&BigInt::from(v)).unwrap_or(Real128::NAN),
    }
}

/// Convert an arbitrary-precision integer.
///
/// Limbs are consumed from the most significant one until the
/// significand is saturated; whatever lower-order limbs remain are
/// accounted for by a single power-of-two scaling, so the cost does not
/// depend on the integer's width. Values beyond the finite range become
/// infinite.
pub fn bigint_to_real128(i: &BigInt) -> Result<Real128, ConversionError> {
    if let Some(small) = i.to_i64() {
        return Ok(Real128::from(small));
    }
    let (sign, limbs) = i.to_u32_digits();
    let mut rest = limbs.iter().rev();
    let mut acc = rest.next().map_or(Real128::ZERO, |&top| Real128::from(top));
    let mut consumed = 0;
    let mut remaining = limbs.len().saturating_sub(1);
    while consumed < Real128::MANTISSA_DIGITS && remaining != 0 {
        let Some(&limb) = rest.next() else { break };
        acc = acc.ldexp(LIMB_BITS as i32) + Real128::from(limb);
        consumed += LIMB_BITS;
        remaining -= 1;
    }
    if remaining != 0 {
        let bits = (remaining as u64).saturating_mul(u64::from(LIMB_BITS));
        let shift = i32::try_from(bits).map_err(|_| ConversionError::ExponentOverflow { bits })?;
        acc = acc.ldexp(shift);
    }
    Ok(if sign == Sign::Minus { -acc } else { acc })
}

/// Convert to an arbitrary-precision integer, truncating towards zero.
pub fn real128_to_bigint(q: Real128) -> Result<BigInt, ConversionError> {
    if q.is_nan() {
        return Err(ConversionError::NanToInteger);
    }
    if q.is_infinite() {
        return Err(ConversionError::InfinityToInteger);
    }
    let t = q.trunc();
    // Both parts of a truncated value are integral doubles.
    let hi = BigInt::from_f64(t.hi()).unwrap_or_default();
    let lo = BigInt::from_f64(t.lo()).unwrap_or_default();
    Ok(hi + lo)
}
