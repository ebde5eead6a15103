//! Exact conversion between display amounts and integer base units
//!
//! Amounts are rendered as fixed-point decimal strings before being turned
//! into integers, so no float multiplication or exponent notation is involved.

use alloy::primitives::U256;

use crate::error::{Error, Result};

/// Render `amount` as an integer string of base units.
///
/// Fractional digits beyond `decimals` are truncated.
pub fn to_integer_string(amount: f64, decimals: u8) -> Result<String> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidAmount(format!(
            "amount must be a non-negative finite number, got {}",
            amount
        )));
    }

    // f64 Display never uses exponent notation
    let rendered = format!("{}", amount);
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i, f),
        None => (rendered.as_str(), ""),
    };

    let decimals = decimals as usize;
    let mut digits = String::with_capacity(int_part.len() + decimals);
    digits.push_str(int_part);
    if frac_part.len() >= decimals {
        digits.push_str(&frac_part[..decimals]);
    } else {
        digits.push_str(frac_part);
        digits.extend(std::iter::repeat('0').take(decimals - frac_part.len()));
    }

    let trimmed = digits.trim_start_matches('0');
    Ok(if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    })
}

/// Convert a display amount to integer base units
pub fn to_base_units(amount: f64, decimals: u8) -> Result<U256> {
    let digits = to_integer_string(amount, decimals)?;
    U256::from_str_radix(&digits, 10)
        .map_err(|e| Error::InvalidAmount(format!("{} does not fit in 256 bits: {}", amount, e)))
}

/// Convert integer base units to a display amount
pub fn from_base_units(value: U256, decimals: u8) -> f64 {
    let digits = value.to_string();
    let decimals = decimals as usize;

    let fixed = if digits.len() > decimals {
        let (int_part, frac_part) = digits.split_at(digits.len() - decimals);
        format!("{}.{}", int_part, frac_part)
    } else {
        format!("0.{}{}", "0".repeat(decimals - digits.len()), digits)
    };

    fixed.parse::<f64>().unwrap_or(0.0)
}

/// Parse a quantity given as `0x` hex or decimal string of base units
pub fn parse_quantity(raw: &str, decimals: u8) -> Result<f64> {
    let raw = raw.trim();
    let value = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if hex.is_empty() {
            U256::ZERO
        } else {
            U256::from_str_radix(hex, 16)
                .map_err(|e| Error::InvalidAmount(format!("bad hex quantity {}: {}", raw, e)))?
        }
    } else {
        U256::from_str_radix(raw, 10)
            .map_err(|e| Error::InvalidAmount(format!("bad quantity {}: {}", raw, e)))?
    };
    Ok(from_base_units(value, decimals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_amount_has_no_exponent() {
        assert_eq!(to_integer_string(5.0, 18).unwrap(), "5000000000000000000");
        assert_eq!(to_integer_string(20.0, 18).unwrap(), "20000000000000000000");
        assert_eq!(
            to_integer_string(1e21, 18).unwrap(),
            "1000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_round_trip_five() {
        let raw = to_base_units(5.0, 18).unwrap();
        assert_eq!(raw.to_string(), "5000000000000000000");
        assert_eq!(from_base_units(raw, 18), 5.0);
    }

    #[test]
    fn test_fractional_amounts_are_exact() {
        assert_eq!(to_integer_string(0.1, 18).unwrap(), "100000000000000000");
        assert_eq!(to_integer_string(1.5, 6).unwrap(), "1500000");
        assert_eq!(to_integer_string(0.0, 18).unwrap(), "0");
    }

    #[test]
    fn test_excess_precision_is_truncated() {
        assert_eq!(to_integer_string(1.23456789, 2).unwrap(), "123");
        assert_eq!(to_integer_string(7.9, 0).unwrap(), "7");
    }

    #[test]
    fn test_invalid_amounts() {
        assert!(to_integer_string(-1.0, 18).is_err());
        assert!(to_integer_string(f64::NAN, 18).is_err());
        assert!(to_integer_string(f64::INFINITY, 18).is_err());
    }

    #[test]
    fn test_small_base_unit_values() {
        assert_eq!(from_base_units(U256::from(1u64), 18), 1e-18);
        assert_eq!(from_base_units(U256::ZERO, 18), 0.0);
    }

    #[test]
    fn test_parse_quantity() {
        // 2.5 VTHO
        assert_eq!(parse_quantity("0x22b1c8c1227a0000", 18).unwrap(), 2.5);
        assert_eq!(parse_quantity("2500000000000000000", 18).unwrap(), 2.5);
        assert_eq!(parse_quantity("0x0", 18).unwrap(), 0.0);
        assert!(parse_quantity("0xzz", 18).is_err());
    }
}
