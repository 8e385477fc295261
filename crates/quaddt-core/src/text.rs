//! Decimal text conversion for [`Real128`].

use std::fmt;
use std::str::FromStr;

use crate::error::ConversionError;
use crate::real128::Real128;

/// Significant digits printed by `Display`.
const PRINT_DIGITS: usize = 32;
/// Digits beyond this many are not accumulated when parsing.
const PARSE_DIGITS: u32 = 40;
/// Decimal exponents saturate here; anything larger over- or underflows.
const EXP_LIMIT: i64 = 100_000;

/// `x * 10^e`, splitting large exponents so the power itself stays finite.
fn scale10(mut x: Real128, mut e: i64) -> Real128 {
    const STEP: i64 = 300;
    let ten = Real128::from(10.0);
    while e > STEP {
        x *= ten.powi(STEP);
        e -= STEP;
    }
    while e < -STEP {
        x /= ten.powi(STEP);
        e += STEP;
    }
    if e >= 0 {
        x * ten.powi(e)
    } else {
        x / ten.powi(-e)
    }
}

impl FromStr for Real128 {
    type Err = ConversionError;

    /// Parse decimal text: an optional sign, digits with an optional
    /// fraction, an optional exponent; or `inf`, `infinity`, `nan` in
    /// any case. Surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConversionError::MalformedText {
            input: s.to_string(),
        };
        let text = s.trim();
        let (negative, body) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let lower = body.to_ascii_lowercase();
        let special = match lower.as_str() {
            "inf" | "infinity" => Some(Real128::INFINITY),
            "nan" => Some(Real128::NAN),
            _ => None,
        };
        if let Some(v) = special {
            return Ok(if negative { -v } else { v });
        }

        let bytes = body.as_bytes();
        let mut i = 0;
        let mut acc = Real128::ZERO;
        let mut significant = 0u32;
        let mut digits_seen = 0usize;
        let mut exp10: i64 = 0;
        let ten = Real128::from(10.0);

        let mut seen_point = false;
        while i < bytes.len() {
            let b = bytes[i];
            if b.is_ascii_digit() {
                digits_seen += 1;
                let d = b - b'0';
                if significant < PARSE_DIGITS {
                    if d != 0 || significant > 0 {
                        significant += 1;
                    }
                    acc = acc * ten + Real128::from(d);
                    if seen_point {
                        exp10 -= 1;
                    }
                } else if !seen_point {
                    exp10 += 1;
                }
            } else if b == b'.' && !seen_point {
                seen_point = true;
            } else {
                break;
            }
            i += 1;
        }
        if digits_seen == 0 {
            return Err(malformed());
        }
        if i < bytes.len() {
            if bytes[i] != b'e' && bytes[i] != b'E' {
                return Err(malformed());
            }
            let exp_text = &body[i + 1..];
            let (exp_negative, exp_digits) = match exp_text.as_bytes().first() {
                Some(b'-') => (true, &exp_text[1..]),
                Some(b'+') => (false, &exp_text[1..]),
                _ => (false, exp_text),
            };
            if exp_digits.is_empty() || !exp_digits.bytes().all(|c| c.is_ascii_digit()) {
                return Err(malformed());
            }
            // All digits, so parsing fails only on overflow.
            let magnitude = exp_digits.parse::<i64>().unwrap_or(EXP_LIMIT).min(EXP_LIMIT);
            exp10 = exp10.saturating_add(if exp_negative { -magnitude } else { magnitude });
        }
        let value = if acc.is_zero() {
            acc
        } else {
            scale10(acc, exp10)
        };
        Ok(if negative { -value } else { value })
    }
}

impl fmt::Display for Real128 {
    /// Scientific notation with 32 significant digits, e.g.
    /// `1.5000000000000000000000000000000e+00`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nan() {
            return f.write_str("nan");
        }
        if self.is_infinite() {
            return f.write_str(if self.is_sign_negative() { "-inf" } else { "inf" });
        }
        let sign = if self.is_sign_negative() { "-" } else { "" };
        if self.is_zero() {
            return write!(f, "{sign}0.{}e+00", "0".repeat(PRINT_DIGITS - 1));
        }

        let x = self.abs();
        let mut e = x.hi().log10().floor() as i64;
        let mut y = scale10(x, -e);
        let ten = Real128::from(10.0);
        if y >= ten {
            y /= ten;
            e += 1;
        } else if y < Real128::ONE {
            y *= ten;
            e -= 1;
        }

        // One guard digit for rounding.
        let mut digits = [0u8; PRINT_DIGITS + 1];
        for d in digits.iter_mut() {
            let lead = y.floor();
            let v = lead.hi().clamp(0.0, 9.0) as u8;
            *d = v;
            y = (y - Real128::from(v)) * ten;
        }
        if digits[PRINT_DIGITS] >= 5 {
            let mut k = PRINT_DIGITS;
            loop {
                if k == 0 {
                    // Carry out of the leading digit: 9.99… rounds to 1.00…
                    digits[0] = 1;
                    e += 1;
                    break;
                }
                k -= 1;
                if digits[k] == 9 {
                    digits[k] = 0;
                } else {
                    digits[k] += 1;
                    break;
                }
            }
        }

        let mut out = String::with_capacity(PRINT_DIGITS + 8);
        out.push_str(sign);
        out.push(char::from(b'0' + digits[0]));
        out.push('.');
        for &d in &digits[1..PRINT_DIGITS] {
            out.push(char::from(b'0' + d));
        }
        let exp_sign = if e < 0 { '-' } else { '+' };
        write!(f, "{out}e{exp_sign}{:02}", e.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Real128 {
        s.parse().unwrap()
    }

    #[test]
    fn parses_plain_and_scientific_forms() {
        assert_eq!(parse("1.5"), Real128::from(1.5));
        assert_eq!(parse("-2.25"), Real128::from(-2.25));
        assert_eq!(parse("  42  "), Real128::from(42.0));
        assert_eq!(parse("1e3"), Real128::from(1000.0));
        assert_eq!(parse("+.5"), Real128::from(0.5));
        assert_eq!(parse("250e-2"), Real128::from(2.5));
        assert_eq!(parse("0"), Real128::ZERO);
    }

    #[test]
    fn parses_special_values() {
        assert_eq!(parse("inf"), Real128::INFINITY);
        assert_eq!(parse("-Infinity"), Real128::NEG_INFINITY);
        assert!(parse("NaN").is_nan());
        assert_eq!(parse("1e999999999999999999999"), Real128::INFINITY);
        assert_eq!(parse("1e-999999"), Real128::ZERO);
        assert_eq!(parse("1e-99999999999999999999"), Real128::ZERO);
        assert_eq!(parse("-1e+99999999999999999999"), Real128::NEG_INFINITY);
    }

    #[test]
    fn keeps_digits_beyond_double_precision() {
        let x = parse("0.1000000000000000000000000000001");
        let tenth = Real128::ONE / Real128::from(10.0);
        assert!(x > tenth);
        let diff = x - tenth;
        assert!((diff.hi() - 1e-31).abs() < 1e-32, "{diff:?}");
    }

    #[test]
    fn rejects_malformed_text() {
        for bad in [
            "", "abc", "1.2.3", "1e", "--1", "1x", ".", "1e+-5", "1e-+5", "1e--5", "1e++5",
            "1e-", "1e+", "1e5x", "1e 5",
        ] {
            assert!(bad.parse::<Real128>().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn formats_with_thirty_two_digits() {
        assert_eq!(
            Real128::from(1.5).to_string(),
            "1.5000000000000000000000000000000e+00"
        );
        assert_eq!(
            Real128::from(-2.25).to_string(),
            "-2.2500000000000000000000000000000e+00"
        );
        assert_eq!(
            Real128::from(1000.0).to_string(),
            "1.0000000000000000000000000000000e+03"
        );
        assert!(Real128::from(0.001).to_string().starts_with("1.0000"));
        assert!(Real128::from(0.001).to_string().ends_with("e-03"));
        assert_eq!(Real128::INFINITY.to_string(), "inf");
        assert_eq!(Real128::NAN.to_string(), "nan");
    }

    #[test]
    fn text_round_trip_preserves_value() {
        let third = Real128::ONE / Real128::from(3.0);
        let back: Real128 = third.to_string().parse().unwrap();
        let err = (back - third).abs();
        assert!(err.hi() < 1e-31, "{err:?}");
    }
}
