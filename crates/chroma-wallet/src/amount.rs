//! Decimal amount parsing and display.
//!
//! Amounts are carried as integers of the smallest unit everywhere in the
//! engine. These helpers convert user-facing strings such as `"10.5"` with a
//! known number of decimals into base units and back without going through
//! floating point.

use chroma_core::constants::{MAX_COLORED_AMOUNT, MAX_MONEY};

use crate::error::WalletError;

/// Decimals of the native asset (1 TPC = 10^8 tapyrus).
pub const NATIVE_DECIMALS: u8 = 8;

/// Largest supported decimals value.
pub const MAX_DECIMALS: u8 = 18;

/// Parse `input` as an amount with `decimals` fractional digits, bounded by `max`.
///
/// Accepts plain digits, or digits with a single `.` when `decimals > 0`.
/// Rejects signs, exponents, extra fractional digits and values above `max`.
/// Zero parses successfully; operations reject it separately.
pub fn parse_amount(input: &str, decimals: u8, max: u64) -> Result<u64, WalletError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(WalletError::InvalidAmount("empty amount".into()));
    }
    if decimals > MAX_DECIMALS {
        return Err(WalletError::InvalidAmount(format!("unsupported decimals: {decimals}")));
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) if decimals > 0 => (w, f),
        Some(_) => {
            return Err(WalletError::InvalidAmount(format!(
                "{trimmed}: fractional amounts not allowed"
            )));
        }
        None => (trimmed, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !all_digits(whole) || !all_digits(frac) || trimmed.ends_with('.') {
        return Err(WalletError::InvalidAmount(format!("{trimmed}: not a number")));
    }
    if frac.len() > decimals as usize {
        return Err(WalletError::InvalidAmount(format!(
            "{trimmed}: more than {decimals} decimal places"
        )));
    }

    let too_large = || WalletError::InvalidAmount(format!("{trimmed}: exceeds maximum {max}"));
    let scale = 10u128.pow(decimals as u32);
    let whole: u128 = whole.parse().map_err(|_| too_large())?;
    let frac_units: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        padded.parse().map_err(|_| too_large())?
    };
    let total = whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(too_large)?;
    if total > max as u128 {
        return Err(too_large());
    }
    Ok(total as u64)
}

/// Parse a native amount given in TPC.
pub fn parse_native(input: &str) -> Result<u64, WalletError> {
    parse_amount(input, NATIVE_DECIMALS, MAX_MONEY)
}

/// Parse a token amount with the token's decimals.
pub fn parse_token(input: &str, decimals: u8) -> Result<u64, WalletError> {
    parse_amount(input, decimals, MAX_COLORED_AMOUNT)
}

/// Render base units with `decimals` fractional digits, trailing zeros trimmed.
pub fn format_amount(value: u64, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let scale = 10u128.pow(decimals.min(MAX_DECIMALS) as u32);
    let whole = value as u128 / scale;
    let frac = value as u128 % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0>width$}", width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}
