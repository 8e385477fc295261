//! Property tests for operand coercion and integer conversion.

use num_bigint::BigInt;
use proptest::prelude::*;
use quaddt_core::{Real128, TypeTag};
use quaddt_ext::coerce::{bigint_to_real128, coerce_pair, real128_to_bigint};
use quaddt_ext::Real128Scalar;
use quaddt_host::Value;

const TAG: TypeTag = TypeTag(TypeTag::USER_BASE);

proptest! {
    #[test]
    fn integers_within_the_significand_round_trip(v in -(1i128 << 100)..(1i128 << 100)) {
        let q = bigint_to_real128(&BigInt::from(v)).unwrap();
        prop_assert_eq!(real128_to_bigint(q).unwrap(), BigInt::from(v));
    }

    #[test]
    fn wide_integers_keep_their_leading_bits(v in 1u64.., shift in 110u32..900) {
        let big = BigInt::from(v) << shift;
        let q = bigint_to_real128(&big).unwrap();
        prop_assert_eq!(q, Real128::from(v).ldexp(shift as i32));
    }

    #[test]
    fn mixed_pairs_coerce_in_operand_order(x in -1e12f64..1e12, y in -1e12f64..1e12) {
        let s = Real128Scalar::new(TAG, "real128");
        let quad = s.wrap(Real128::from(x));
        let native = Value::Float(y);
        let fwd = coerce_pair(&quad, &native, TAG).unwrap();
        let rev = coerce_pair(&native, &quad, TAG).unwrap();
        prop_assert_eq!(fwd, Some((Real128::from(x), Real128::from(y))));
        prop_assert_eq!(rev, Some((Real128::from(y), Real128::from(x))));
        prop_assert_eq!(coerce_pair(&native, &native, TAG).unwrap(), None);
    }
}
