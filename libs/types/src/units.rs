//! Value amounts in the smallest unit of the underlying asset
//!
//! Balances are plain `u128` integers of the smallest unit (wei-like). Human
//! amounts such as `"1.0"` are converted with exact decimal arithmetic via
//! `rust_decimal`, never through floating point.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::UnitsError;

/// Amount in the smallest unit of the underlying asset.
pub type Amount = u128;

/// Decimals of the native asset (1 unit = 10^18 smallest units).
pub const ETHER_DECIMALS: u32 = 18;

/// Largest scale `rust_decimal` can represent.
pub const MAX_DECIMALS: u32 = 28;

/// Convert a human-readable amount into smallest units.
///
/// `parse_units("1.0", 18)` is `1_000_000_000_000_000_000`. Trailing
/// fractional zeros are ignored; any other digit beyond `decimals` is
/// rejected rather than rounded.
pub fn parse_units(input: &str, decimals: u32) -> Result<Amount, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::UnsupportedDecimals {
            decimals,
            max: MAX_DECIMALS,
        });
    }

    let value = Decimal::from_str(input.trim()).map_err(|_| UnitsError::Invalid {
        input: input.to_string(),
    })?;
    if value < Decimal::ZERO {
        return Err(UnitsError::Negative {
            input: input.to_string(),
        });
    }

    let value = value.normalize();
    let scale = value.scale();
    if scale > decimals {
        return Err(UnitsError::TooPrecise {
            input: input.to_string(),
            decimals,
        });
    }

    // Non-negative after the sign check above.
    let mantissa = value.mantissa().unsigned_abs();
    mantissa
        .checked_mul(10u128.pow(decimals - scale))
        .ok_or_else(|| UnitsError::Overflow {
            input: input.to_string(),
        })
}

/// Parse an amount of the native asset (18 decimals).
pub fn parse_ether(input: &str) -> Result<Amount, UnitsError> {
    parse_units(input, ETHER_DECIMALS)
}

/// Render smallest units as a human-readable amount.
///
/// Always keeps at least one fractional digit: `1.0`, `0.5`, `12.000001`.
/// Accepts the same range of `decimals` as [`parse_units`].
pub fn format_units(amount: Amount, decimals: u32) -> Result<String, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::UnsupportedDecimals {
            decimals,
            max: MAX_DECIMALS,
        });
    }
    Ok(render(amount, decimals))
}

/// Render an amount of the native asset (18 decimals).
pub fn format_ether(amount: Amount) -> String {
    render(amount, ETHER_DECIMALS)
}

// `decimals` is at most MAX_DECIMALS here, so the divisor fits in a u128.
fn render(amount: Amount, decimals: u32) -> String {
    if decimals == 0 {
        return format!("{amount}.0");
    }
    let base = 10u128.pow(decimals);
    let whole = amount / base;
    let frac = amount % base;

    let mut frac_str = format!("{:0width$}", frac, width = decimals as usize);
    while frac_str.len() > 1 && frac_str.ends_with('0') {
        frac_str.pop();
    }
    format!("{whole}.{frac_str}")
}
