//! The quad-precision scalar's number protocol.

use std::sync::Arc;

use num_bigint::BigInt;
use quaddt_core::{ConversionError, Real128, TypeTag};
use quaddt_host::{BinaryOp, CompareOp, ForeignScalar, Outcome, ScalarType, UnaryOp, Value};

use crate::coerce::{coerce_pair, real128_to_bigint, Operand};

/// [`ScalarType`] of [`Real128`] values bound to one host tag.
#[derive(Clone, Debug)]
pub struct Real128Scalar {
    tag: TypeTag,
    name: Arc<str>,
}

impl Real128Scalar {
    /// Scalar type for `tag`, presented as `name`.
    pub fn new(tag: TypeTag, name: &str) -> Self {
        Self {
            tag,
            name: Arc::from(name),
        }
    }

    /// The bound tag.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Box `q` as a host scalar of this type.
    pub fn wrap(&self, q: Real128) -> Value {
        Value::Foreign(ForeignScalar::new(self.tag, &self.name, q))
    }

    /// The value held by a scalar of this type.
    pub fn unwrap(&self, v: &Value) -> Option<Real128> {
        match v {
            Value::Foreign(f) if f.tag() == self.tag => f.downcast_ref::<Real128>().copied(),
            _ => None,
        }
    }

    /// Convert any value the descriptor's `setitem` accepts: this type,
    /// or a native scalar with a conversion.
    pub fn convert(&self, v: &Value, context: &'static str) -> Result<Real128, ConversionError> {
        match Operand::classify(v, self.tag) {
            Some(op) => op.to_real128(),
            None => Err(ConversionError::UnsupportedType {
                type_name: v.type_name().to_string(),
                context,
            }),
        }
    }
}

impl ScalarType for Real128Scalar {
    fn name(&self) -> &str {
        &self.name
    }

    fn construct(&self, arg: Option<&Value>) -> Result<Value, ConversionError> {
        let q = match arg {
            None => Real128::ZERO,
            Some(Value::Str(s)) => s.parse::<Real128>()?,
            Some(v) => self.convert(v, "construct")?,
        };
        Ok(self.wrap(q))
    }

    fn unary(&self, op: UnaryOp, a: &Value) -> Outcome<Value> {
        let Some(x) = self.unwrap(a) else {
            return Outcome::NotImplemented;
        };
        let r = match op {
            UnaryOp::Positive => x,
            UnaryOp::Negative => -x,
            UnaryOp::Absolute => x.abs(),
            UnaryOp::Sign => x.signum(),
        };
        Outcome::Done(self.wrap(r))
    }

    fn binary(
        &self,
        op: BinaryOp,
        a: &Value,
        b: &Value,
    ) -> Result<Outcome<Value>, ConversionError> {
        let Some((x, y)) = coerce_pair(a, b, self.tag)? else {
            return Ok(Outcome::NotImplemented);
        };
        let r = match op {
            BinaryOp::Add => x + y,
            BinaryOp::Subtract => x - y,
            BinaryOp::Multiply => x * y,
            BinaryOp::TrueDivide => x / y,
            BinaryOp::FloorDivide => (x / y).floor(),
            BinaryOp::Power => x.powf(y),
        };
        Ok(Outcome::Done(self.wrap(r)))
    }

    fn power(
        &self,
        base: &Value,
        exp: &Value,
        modulo: Option<&Value>,
    ) -> Result<Outcome<Value>, ConversionError> {
        if modulo.is_some_and(|m| !matches!(m, Value::None)) {
            return Err(ConversionError::ModularPowUnsupported);
        }
        self.binary(BinaryOp::Power, base, exp)
    }

    fn compare(
        &self,
        op: CompareOp,
        a: &Value,
        b: &Value,
    ) -> Result<Outcome<bool>, ConversionError> {
        let Some((x, y)) = coerce_pair(a, b, self.tag)? else {
            return Ok(Outcome::NotImplemented);
        };
        let r = match op {
            CompareOp::Lt => x < y,
            CompareOp::Le => x <= y,
            CompareOp::Eq => x == y,
            CompareOp::Ne => x != y,
            CompareOp::Gt => x > y,
            CompareOp::Ge => x >= y,
        };
        Ok(Outcome::Done(r))
    }

    fn is_truthy(&self, a: &Value) -> bool {
        self.unwrap(a).is_some_and(|x| !x.is_zero())
    }

    fn to_float(&self, a: &Value) -> f64 {
        self.unwrap(a).map_or(f64::NAN, Real128::to_f64)
    }

    fn to_int(&self, a: &Value) -> Result<BigInt, ConversionError> {
        let x = self.unwrap(a).ok_or_else(|| ConversionError::UnsupportedType {
            type_name: a.type_name().to_string(),
            context: "int()",
        })?;
        real128_to_bigint(x)
    }

    fn repr(&self, a: &Value) -> String {
        match self.unwrap(a) {
            Some(x) => x.to_string(),
            None => format!("<{} object>", a.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn st() -> Real128Scalar {
        Real128Scalar::new(TypeTag(256), "real128")
    }

    fn q(s: &Real128Scalar, x: f64) -> Value {
        s.wrap(Real128::from(x))
    }

    fn done(o: Outcome<Value>) -> Value {
        match o {
            Outcome::Done(v) => v,
            Outcome::NotImplemented => panic!("not implemented"),
        }
    }

    #[test]
    fn construction_sources() {
        let s = st();
        let zero = s.construct(None).unwrap();
        assert_eq!(s.unwrap(&zero), Some(Real128::ZERO));
        let parsed = s.construct(Some(&Value::Str("0.1".into()))).unwrap();
        assert_eq!(s.unwrap(&parsed), Some("0.1".parse().unwrap()));
        let copied = s.construct(Some(&parsed)).unwrap();
        assert_eq!(s.unwrap(&copied), s.unwrap(&parsed));
        assert!(matches!(
            s.construct(Some(&Value::Str("zero".into()))),
            Err(ConversionError::MalformedText { .. })
        ));
        assert!(matches!(
            s.construct(Some(&Value::List(vec![]))),
            Err(ConversionError::UnsupportedType { context: "construct", .. })
        ));
    }

    #[test]
    fn unary_slots() {
        let s = st();
        let neg = done(s.unary(UnaryOp::Negative, &q(&s, 2.5)));
        assert_eq!(s.unwrap(&neg), Some(Real128::from(-2.5)));
        let sign = done(s.unary(UnaryOp::Sign, &q(&s, -0.1)));
        assert_eq!(s.unwrap(&sign), Some(Real128::from(-1.0)));
        let nan_sign = done(s.unary(UnaryOp::Sign, &s.wrap(Real128::NAN)));
        assert!(s.unwrap(&nan_sign).unwrap().is_nan());
        assert_eq!(s.unary(UnaryOp::Absolute, &Value::Float(1.0)), Outcome::NotImplemented);
    }

    #[test]
    fn floor_divide_floors_the_quotient() {
        let s = st();
        let r = done(s.binary(BinaryOp::FloorDivide, &q(&s, -7.0), &Value::int(2)).unwrap());
        assert_eq!(s.unwrap(&r), Some(Real128::from(-4.0)));
    }

    #[test]
    fn unsupported_operands_are_not_applicable() {
        let s = st();
        let r = s.binary(BinaryOp::Add, &q(&s, 1.0), &Value::Str("1".into()));
        assert_eq!(r, Ok(Outcome::NotImplemented));
        let c = s.compare(CompareOp::Lt, &Value::None, &q(&s, 1.0));
        assert_eq!(c, Ok(Outcome::NotImplemented));
    }

    #[test]
    fn modular_power_is_rejected_before_anything_else() {
        let s = st();
        let m = Value::int(5);
        assert_eq!(
            s.power(&q(&s, 2.0), &Value::int(3), Some(&m)),
            Err(ConversionError::ModularPowUnsupported)
        );
        let r = done(s.power(&q(&s, 2.0), &Value::int(3), Some(&Value::None)).unwrap());
        assert_eq!(s.unwrap(&r), Some(Real128::from(8.0)));
    }

    #[test]
    fn conversions_out() {
        let s = st();
        assert!(s.is_truthy(&s.wrap(Real128::NAN)));
        assert!(!s.is_truthy(&q(&s, 0.0)));
        assert_eq!(s.to_float(&q(&s, 1.5)), 1.5);
        assert_eq!(s.to_int(&q(&s, -3.9)), Ok(BigInt::from(-3)));
        assert_eq!(s.to_int(&s.wrap(Real128::INFINITY)), Err(ConversionError::InfinityToInteger));
        assert_eq!(s.repr(&q(&s, 1.5)), "1.5000000000000000000000000000000e+00");
    }
}
