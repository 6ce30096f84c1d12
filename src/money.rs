//! Monetary helpers.
//!
//! All amounts are `rust_decimal::Decimal` and keep full precision while the
//! cart is being priced. Rounding to cents happens only when a value is
//! displayed or put on the wire.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Default flat sales tax rate (8.25%).
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(825, 0, 0, false, 4);

/// Round to cents, half away from zero.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format as a dollar string with exactly two decimals, e.g. `$10.83`.
pub fn format_usd(amount: Decimal) -> String {
    let cents = round_cents(amount);
    if cents.is_sign_negative() && !cents.is_zero() {
        format!("-${:.2}", cents.abs())
    } else {
        format!("${:.2}", cents.abs())
    }
}

/// Whole number of units rounded up. Negative amounts clamp to zero.
pub(crate) fn ceil_units(amount: Decimal) -> u64 {
    amount.ceil().to_u64().unwrap_or(0)
}

/// Whole number of units rounded down. Negative amounts clamp to zero.
pub(crate) fn floor_units(amount: Decimal) -> u64 {
    amount.floor().to_u64().unwrap_or(0)
}
