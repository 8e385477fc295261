//! Element access for the host's builtin element types.

use num_bigint::BigInt;
use quaddt_core::{ConversionError, ScalarKind};

use crate::value::{FixedInt, Value};

/// Box the builtin element of `kind` at `data`.
///
/// # Safety
///
/// `data` must be valid for reading `kind.size_bytes()` bytes.
#[allow(unsafe_code)]
pub unsafe fn read(kind: ScalarKind, data: *const u8) -> Value {
    use std::ptr::read_unaligned as rd;
    match kind {
        ScalarKind::Bool => Value::Bool(rd(data) != 0u8),
        ScalarKind::Int8 => Value::Fixed(FixedInt::I8(rd(data.cast()))),
        ScalarKind::Int16 => Value::Fixed(FixedInt::I16(rd(data.cast()))),
        ScalarKind::Int32 => Value::Fixed(FixedInt::I32(rd(data.cast()))),
        ScalarKind::Int64 => Value::Fixed(FixedInt::I64(rd(data.cast()))),
        ScalarKind::UInt8 => Value::Fixed(FixedInt::U8(rd(data))),
        ScalarKind::UInt16 => Value::Fixed(FixedInt::U16(rd(data.cast()))),
        ScalarKind::UInt32 => Value::Fixed(FixedInt::U32(rd(data.cast()))),
        ScalarKind::UInt64 => Value::Fixed(FixedInt::U64(rd(data.cast()))),
        ScalarKind::Float32 => Value::Float32(rd(data.cast())),
        ScalarKind::Float64 => Value::Float(rd(data.cast())),
        ScalarKind::BigInt | ScalarKind::Real128 => Value::None,
    }
}

/// Store `item` as the builtin element of `kind` at `data`.
///
/// Integers wrap like C casts; floats stored into integer slots truncate.
///
/// # Safety
///
/// `data` must be valid for writing `kind.size_bytes()` bytes.
#[allow(unsafe_code)]
pub unsafe fn write(kind: ScalarKind, item: &Value, data: *mut u8) -> Result<(), ConversionError> {
    use std::ptr::write_unaligned as wr;
    let unsupported = || ConversionError::UnsupportedType {
        type_name: item.type_name().to_string(),
        context: "storing into a builtin array",
    };
    match kind {
        ScalarKind::Bool => {
            let b = match item {
                Value::Bool(b) => *b,
                other => other.as_f64().ok_or_else(unsupported)? != 0.0,
            };
            wr(data, u8::from(b));
        }
        ScalarKind::Float32 => wr(data.cast::<f32>(), item.as_f64().ok_or_else(unsupported)? as f32),
        ScalarKind::Float64 => wr(data.cast::<f64>(), item.as_f64().ok_or_else(unsupported)?),
        ScalarKind::BigInt | ScalarKind::Real128 => return Err(unsupported()),
        int => {
            let v = match item {
                Value::Int(i) => wrap_bigint(i),
                other => other.as_i128().ok_or_else(unsupported)?,
            };
            match FixedInt::wrapping_from(int, v).ok_or_else(unsupported)? {
                FixedInt::I8(x) => wr(data.cast(), x),
                FixedInt::I16(x) => wr(data.cast(), x),
                FixedInt::I32(x) => wr(data.cast(), x),
                FixedInt::I64(x) => wr(data.cast(), x),
                FixedInt::U8(x) => wr(data, x),
                FixedInt::U16(x) => wr(data.cast(), x),
                FixedInt::U32(x) => wr(data.cast(), x),
                FixedInt::U64(x) => wr(data.cast(), x),
            }
        }
    }
    Ok(())
}

/// Low 128 bits of `i` in two's complement.
fn wrap_bigint(i: &BigInt) -> i128 {
    let bytes = i.to_signed_bytes_le();
    let fill = if i.sign() == num_bigint::Sign::Minus { 0xff } else { 0 };
    let mut buf = [fill; 16];
    let n = bytes.len().min(16);
    buf[..n].copy_from_slice(&bytes[..n]);
    i128::from_le_bytes(buf)
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    fn round_trip(kind: ScalarKind, v: &Value) -> Value {
        let mut buf = [0u8; 8];
        unsafe {
            write(kind, v, buf.as_mut_ptr()).unwrap();
            read(kind, buf.as_ptr())
        }
    }

    #[test]
    fn integers_wrap_and_floats_truncate() {
        assert_eq!(round_trip(ScalarKind::UInt8, &Value::int(300)), Value::Fixed(FixedInt::U8(44)));
        assert_eq!(round_trip(ScalarKind::Int32, &Value::Float(-7.9)), Value::Fixed(FixedInt::I32(-7)));
        assert_eq!(round_trip(ScalarKind::Bool, &Value::Float(0.5)), Value::Bool(true));
        assert_eq!(round_trip(ScalarKind::Float32, &Value::int(3)), Value::Float32(3.0));
    }

    #[test]
    fn huge_integers_keep_low_bits() {
        let big = (BigInt::from(1) << 200u32) + BigInt::from(5);
        assert_eq!(round_trip(ScalarKind::Int64, &Value::Int(big)), Value::Fixed(FixedInt::I64(5)));
        assert_eq!(round_trip(ScalarKind::Int16, &Value::int(-2)), Value::Fixed(FixedInt::I16(-2)));
    }

    #[test]
    fn text_is_rejected() {
        let mut buf = [0u8; 8];
        let err = unsafe { write(ScalarKind::Float64, &Value::from("1.0"), buf.as_mut_ptr()) };
        assert!(matches!(err, Err(ConversionError::UnsupportedType { .. })));
    }
}
