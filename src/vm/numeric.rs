//! Operand extraction and arithmetic for the numeric opcodes.
//!
//! Integer arithmetic wraps on overflow. Integer division and remainder by
//! zero fail; floating point follows IEEE 754.

use evalex_core::{RuntimeError, Value};

type Result<T> = std::result::Result<T, RuntimeError>;

fn cast_error(expected: &str, found: &Value) -> RuntimeError {
    match found {
        Value::Null => RuntimeError::null_value(expected),
        other => RuntimeError::InvalidCast {
            expected: expected.to_string(),
            found: other.type_name(),
        },
    }
}

pub(super) fn as_bool(value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| cast_error("boolean", value))
}

pub(super) fn as_i32(value: &Value) -> Result<i32> {
    value.as_i32().ok_or_else(|| cast_error("int", value))
}

pub(super) fn as_i64(value: &Value) -> Result<i64> {
    match value {
        Value::Long(v) => Ok(*v),
        other => Err(cast_error("long", other)),
    }
}

pub(super) fn as_f32(value: &Value) -> Result<f32> {
    match value {
        Value::Float(v) => Ok(*v),
        other => Err(cast_error("float", other)),
    }
}

pub(super) fn as_f64(value: &Value) -> Result<f64> {
    match value {
        Value::Double(v) => Ok(*v),
        other => Err(cast_error("double", other)),
    }
}

pub(super) fn as_str<'a>(value: &'a Value, what: &str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| cast_error(what, value))
}

pub(super) fn div_i32(a: i32, b: i32) -> Result<i32> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(a.wrapping_div(b))
}

pub(super) fn rem_i32(a: i32, b: i32) -> Result<i32> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(a.wrapping_rem(b))
}

pub(super) fn div_i64(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(a.wrapping_div(b))
}

pub(super) fn rem_i64(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(a.wrapping_rem(b))
}

/// Integral power. Negative exponents truncate toward zero like division.
pub(super) fn pow_i64(base: i64, exponent: i64) -> Result<i64> {
    if exponent >= 0 {
        let mut result: i64 = 1;
        let mut base = base;
        let mut exponent = exponent;
        while exponent > 0 {
            if exponent & 1 == 1 {
                result = result.wrapping_mul(base);
            }
            base = base.wrapping_mul(base);
            exponent >>= 1;
        }
        return Ok(result);
    }
    match base {
        0 => Err(RuntimeError::DivisionByZero),
        1 => Ok(1),
        -1 => Ok(if exponent % 2 == 0 { 1 } else { -1 }),
        _ => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_by_zero_fails() {
        assert_eq!(div_i32(1, 0), Err(RuntimeError::DivisionByZero));
        assert_eq!(rem_i64(1, 0), Err(RuntimeError::DivisionByZero));
        assert_eq!(div_i32(i32::MIN, -1).unwrap(), i32::MIN);
        assert_eq!(rem_i32(-7, 2).unwrap(), -1);
    }

    #[test]
    fn integral_power() {
        assert_eq!(pow_i64(2, 10).unwrap(), 1024);
        assert_eq!(pow_i64(7, 0).unwrap(), 1);
        assert_eq!(pow_i64(2, -1).unwrap(), 0);
        assert_eq!(pow_i64(-1, -3).unwrap(), -1);
        assert_eq!(pow_i64(0, -1), Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn operand_errors() {
        assert!(matches!(as_i32(&Value::Null), Err(RuntimeError::NullValue { .. })));
        assert!(matches!(
            as_i64(&Value::Int(1)),
            Err(RuntimeError::InvalidCast { .. })
        ));
        assert_eq!(as_str(&Value::from("x"), "key").unwrap(), "x");
    }
}
