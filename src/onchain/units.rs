//! Conversion between user-entered decimal amounts and token base units.

use crate::errors::ValidationError;
use alloy::primitives::U256;
use rust_decimal::Decimal;

/// Convert `amount` into the token's smallest unit.
///
/// Rejects non-positive amounts and amounts with more fractional digits
/// than the token supports.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, ValidationError> {
    let amount = amount.normalize();
    if amount <= Decimal::ZERO {
        return Err(ValidationError::ZeroAmount);
    }

    let scale = amount.scale();
    if scale > u32::from(decimals) {
        return Err(ValidationError::TooPrecise(decimals));
    }

    // Positive, so the mantissa fits in u128.
    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    let factor = U256::from(10u64).pow(U256::from(u32::from(decimals) - scale));
    Ok(mantissa * factor)
}

/// Render base units for logs and terminal output.
pub fn format_amount(value: U256, decimals: u8) -> String {
    alloy::primitives::utils::format_units(value, decimals)
        .map(|s| trim_trailing_zeros(&s))
        .unwrap_or_else(|_| value.to_string())
}

fn trim_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
