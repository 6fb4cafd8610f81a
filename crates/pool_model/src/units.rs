//! Conversion between raw integer amounts and human decimal strings

use std::str::FromStr;

use alloy_primitives::U256;
use rust_decimal::Decimal;
use thiserror::Error;

/// Largest decimals value whose scale factor (10^d) fits in U256
pub const MAX_DECIMALS: u8 = 77;

/// Significant digits a `Decimal` can hold
const DECIMAL_DIGITS: usize = 28;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid character in amount: {0:?}")]
    InvalidDigit(String),
    #[error("amount has {got} fractional digits, asset allows {max}")]
    TooManyDecimals { got: usize, max: u8 },
    #[error("amount does not fit in 256 bits")]
    Overflow,
    #[error("decimals {0} exceeds maximum of 77")]
    UnsupportedDecimals(u8),
}

/// Parse a human amount ("12.5") into raw units for an asset with `decimals`
pub fn parse_units(input: &str, decimals: u8) -> Result<U256, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::UnsupportedDecimals(decimals));
    }

    let input = input.trim();
    if input.is_empty() {
        return Err(UnitsError::Empty);
    }

    let (whole, frac) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(UnitsError::Empty);
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(UnitsError::InvalidDigit(input.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals {
            got: frac.len(),
            max: decimals,
        });
    }

    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(frac);
    for _ in frac.len()..decimals as usize {
        digits.push('0');
    }

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(digits, 10).map_err(|_| UnitsError::Overflow)
}

/// Format raw units as a decimal string, trimming trailing fractional zeros
pub fn format_units(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };

    let (whole, frac) = padded.split_at(padded.len() - decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}

/// Convert raw units to a `Decimal` for display math
///
/// Fractional digits beyond what a `Decimal` can carry are truncated.
/// Integer parts wider than 28 digits return `Overflow`.
pub fn to_decimal(raw: U256, decimals: u8) -> Result<Decimal, UnitsError> {
    let text = format_units(raw, decimals);
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text.as_str(), ""),
    };

    if whole.len() > DECIMAL_DIGITS {
        return Err(UnitsError::Overflow);
    }

    let keep = frac.len().min(DECIMAL_DIGITS - whole.len());
    let trimmed = if keep == 0 {
        whole.to_string()
    } else {
        format!("{}.{}", whole, &frac[..keep])
    };

    Decimal::from_str(&trimmed).map_err(|_| UnitsError::Overflow)
}
