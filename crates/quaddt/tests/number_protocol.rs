//! Scalar behaviour of the exposed type through the host runtime.

use num_bigint::BigInt;
use proptest::prelude::*;
use quaddt::prelude::*;

fn setup() -> (Runtime, Real128Type) {
    quaddt_test_utils::init_logging();
    let rt = Runtime::new();
    let ty = quaddt::init(&rt).unwrap();
    (rt, ty)
}

fn quad(rt: &Runtime, ty: &Real128Type, v: Value) -> Value {
    rt.construct(ty.tag(), Some(&v)).unwrap()
}

fn val(ty: &Real128Type, v: &Value) -> Real128 {
    ty.extract(v).unwrap()
}

#[test]
fn arithmetic_identities() {
    let (rt, ty) = setup();
    let three = quad(&rt, &ty, Value::int(3));
    let four = quad(&rt, &ty, Value::int(4));
    let seven = rt.binary_op(BinaryOp::Add, &three, &four).unwrap();
    assert!(rt.compare(CompareOp::Eq, &seven, &quad(&rt, &ty, Value::int(7))).unwrap());

    let one = quad(&rt, &ty, Value::int(1));
    let zero = quad(&rt, &ty, Value::int(0));
    let inf = rt.binary_op(BinaryOp::TrueDivide, &one, &zero).unwrap();
    assert_eq!(val(&ty, &inf), Real128::INFINITY);

    let minus_one = quad(&rt, &ty, Value::int(-1));
    let half = quad(&rt, &ty, Value::Float(0.5));
    let r = rt.power(&minus_one, &half, None).unwrap();
    assert!(val(&ty, &r).is_nan());
}

#[test]
fn three_argument_power_is_rejected() {
    let (rt, ty) = setup();
    let two = quad(&rt, &ty, Value::int(2));
    let err = rt.power(&two, &Value::int(3), Some(&Value::int(5))).unwrap_err();
    assert_eq!(err, HostError::Conversion(ConversionError::ModularPowUnsupported));
}

#[test]
fn native_operands_coerce_from_either_side() {
    let (rt, ty) = setup();
    let x = ty.value(Real128::from(2.5));
    let l = rt.binary_op(BinaryOp::Multiply, &Value::int(2), &x).unwrap();
    let r = rt.binary_op(BinaryOp::Subtract, &x, &Value::Float32(0.5)).unwrap();
    assert_eq!(val(&ty, &l), Real128::from(5));
    assert_eq!(val(&ty, &r), Real128::from(2));
    assert!(rt.compare(CompareOp::Lt, &Value::Float(1.0), &x).unwrap());
    assert!(!rt.compare(CompareOp::Ge, &Value::Bool(true), &x).unwrap());

    let err = rt.binary_op(BinaryOp::Add, &x, &Value::from("1")).unwrap_err();
    assert!(matches!(err, HostError::UnsupportedOperands { op: "+", .. }));
    // Equality against an incomparable object falls back to identity.
    assert!(!rt.compare(CompareOp::Eq, &x, &Value::None).unwrap());
}

#[test]
fn doubles_round_trip_exactly() {
    let (rt, ty) = setup();
    for d in [0.0, 1.5, -2.25, f64::INFINITY] {
        let q = quad(&rt, &ty, Value::Float(d));
        assert_eq!(rt.to_float(&q).unwrap(), d);
    }
    let nan = quad(&rt, &ty, Value::Float(f64::NAN));
    assert!(rt.to_float(&nan).unwrap().is_nan());
    assert!(!rt.compare(CompareOp::Eq, &nan, &nan).unwrap());
    assert!(rt.compare(CompareOp::Ne, &nan, &nan).unwrap());
}

#[test]
fn big_integers_round_trip_within_the_mantissa() {
    let (rt, ty) = setup();
    for exact in [BigInt::from(1u64 << 60), -BigInt::from(1u64 << 60)] {
        let q = quad(&rt, &ty, Value::Int(exact.clone()));
        assert_eq!(rt.to_int(&q).unwrap(), exact);
    }
    let huge: BigInt = (BigInt::from(1) << 300u32) + 1;
    let q = quad(&rt, &ty, Value::Int(huge.clone()));
    let back = rt.to_int(&q).unwrap();
    assert_ne!(back, huge);
    assert_eq!(back, BigInt::from(1) << 300u32);
}

#[test]
fn conversions_out_of_the_type() {
    let (rt, ty) = setup();
    let nan = ty.value(Real128::NAN);
    assert!(rt.is_truthy(&nan));
    assert!(!rt.is_truthy(&ty.value(Real128::ZERO)));
    assert_eq!(
        rt.to_int(&nan),
        Err(HostError::Conversion(ConversionError::NanToInteger))
    );
    assert_eq!(rt.to_int(&ty.value(Real128::from(-3.75))).unwrap(), BigInt::from(-3));
    assert_eq!(rt.repr(&ty.value(Real128::from(1.5))), "1.5000000000000000000000000000000e+00");
    let neg = rt.unary_op(UnaryOp::Negative, &ty.value(Real128::ONE)).unwrap();
    assert_eq!(val(&ty, &neg), Real128::from(-1));
}

#[test]
fn construction_from_every_source() {
    let (rt, ty) = setup();
    assert_eq!(val(&ty, &rt.construct(ty.tag(), None).unwrap()), Real128::ZERO);
    let text = quad(&rt, &ty, Value::from("0.1"));
    assert_eq!(val(&ty, &text), "0.1".parse::<Real128>().unwrap());
    assert_ne!(val(&ty, &text), Real128::from(0.1));
    assert_eq!(val(&ty, &quad(&rt, &ty, Value::Bool(true))), Real128::ONE);
    assert_eq!(val(&ty, &quad(&rt, &ty, text.clone())), val(&ty, &text));
    assert!(matches!(
        rt.construct(ty.tag(), Some(&Value::List(vec![]))),
        Err(HostError::Conversion(ConversionError::UnsupportedType { .. }))
    ));
}

#[test]
fn native_kinds_promote_safely_and_never_back() {
    let (rt, ty) = setup();
    for native in TypeTag::BUILTINS {
        assert!(rt.can_cast(native, ty.tag()), "{native} -> real128");
        assert!(!rt.can_cast(ty.tag(), native), "real128 -> {native}");
    }
}

#[test]
fn type_lookup_and_epsilon() {
    let (rt, ty) = setup();
    assert_eq!(rt.lookup_type("real128"), Some(ty.tag()));
    assert_eq!(rt.lookup_type("float64"), Some(TypeTag::FLOAT64));
    let eps = val(&ty, &ty.epsilon());
    assert!(Real128::ONE + eps > Real128::ONE);
    assert_eq!(eps, Real128::ONE.ldexp(-104));
    // Exposing again hands back the same type.
    assert_eq!(quaddt::init(&rt).unwrap().tag(), ty.tag());
}

proptest! {
    #[test]
    fn finite_doubles_survive_the_scalar_protocol(d in -1e300f64..1e300) {
        let (rt, ty) = setup();
        let q = quad(&rt, &ty, Value::Float(d));
        prop_assert_eq!(rt.to_float(&q).unwrap(), d);
        let twice = rt.binary_op(BinaryOp::Add, &q, &q).unwrap();
        prop_assert_eq!(rt.to_float(&twice).unwrap(), d * 2.0);
    }

    #[test]
    fn exponents_take_at_most_one_sign(
        first in prop::sample::select(vec!['+', '-']),
        second in prop::sample::select(vec!['+', '-']),
        digits in "[0-9]{1,6}",
    ) {
        let (rt, ty) = setup();
        let text = format!("1e{first}{second}{digits}");
        let err = rt.construct(ty.tag(), Some(&Value::Str(text))).unwrap_err();
        let is_malformed = matches!(err, HostError::Conversion(ConversionError::MalformedText { .. }));
        prop_assert!(is_malformed);
        let single = quad(&rt, &ty, Value::Str(format!("1e{second}{digits}")));
        prop_assert!(!val(&ty, &single).is_nan());
    }

    #[test]
    fn negative_bases_follow_the_parity_of_wide_exponents(k in 0u64..1 << 40) {
        let (rt, ty) = setup();
        let minus_one = quad(&rt, &ty, Value::int(-1));
        // 2^62 plus a small remainder only the trailing component carries.
        let odd = ty.value(Real128::from_parts(4.611_686_018_427_388e18, (2 * k + 1) as f64));
        let even = ty.value(Real128::from_parts(4.611_686_018_427_388e18, (2 * k + 2) as f64));
        prop_assert_eq!(val(&ty, &rt.power(&minus_one, &odd, None).unwrap()), -Real128::ONE);
        prop_assert_eq!(val(&ty, &rt.power(&minus_one, &even, None).unwrap()), Real128::ONE);
        let minus_two = quad(&rt, &ty, Value::int(-2));
        prop_assert_eq!(val(&ty, &rt.power(&minus_two, &odd, None).unwrap()), Real128::NEG_INFINITY);
    }

    #[test]
    fn byteswapped_arrays_keep_the_component_order(
        num in -1_000_000i64..1_000_000,
        den in 1i64..1_000_000,
    ) {
        let (rt, ty) = setup();
        let x = Real128::from(num as f64) / Real128::from(den as f64);
        let arr = rt.array(ty.tag(), &[2], &[ty.value(x), ty.value(-x)]).unwrap();
        let swapped = rt.byteswap(&arr).unwrap();
        let part = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&swapped.as_bytes()[at..at + 8]);
            f64::from_bits(u64::from_ne_bytes(raw).swap_bytes())
        };
        prop_assert_eq!((part(0), part(8)), (x.hi(), x.lo()));
        prop_assert_eq!((part(16), part(24)), (-x.hi(), -x.lo()));
        let back = rt.byteswap(&swapped).unwrap();
        prop_assert_eq!(val(&ty, &rt.get(&back, 0).unwrap()), x);
        prop_assert_eq!(val(&ty, &rt.get(&back, 1).unwrap()), -x);
    }
}
