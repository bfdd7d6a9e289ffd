//! Precision guard for raw fixed-point amounts.
//!
//! Onchain USD amounts use a 10^30 basis, so a one-cent position is already a
//! 10^28 integer. An f64 mantissa holds 53 bits; these amounts routinely need
//! ~103. Any float round trip on a sufficiently large odd integer is lossy,
//! and downstream the protocol rejects a decrease order whose size no longer
//! matches the live position. This module classifies raw amounts, asserts
//! float-boundary safety, and does the exact integer conversions at the wire.

use crate::types::USD_DECIMALS;
use rust_decimal::Decimal;
use tracing::warn;

/// Above this an integer is a raw fixed-point amount, not a human value.
/// A $0.01 raw amount is already 10^28, so 10^20 has no false negatives.
pub const RAW_FIXED_POINT_THRESHOLD: u128 = 100_000_000_000_000_000_000;

// 10^24: one micro-USD in the 10^30 basis.
const MICRO_USD_DIVISOR: u128 = 1_000_000_000_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrecisionError {
    #[error("{field}: raw amount {value} does not survive an f64 round trip")]
    FloatCorruption { field: String, value: u128 },

    #[error("{field}: {value} is out of range for the 10^{decimals} basis")]
    Unrepresentable {
        field: String,
        value: String,
        decimals: u32,
    },

    #[error("{field}: negative amount {value}")]
    NegativeAmount { field: String, value: String },
}

/// Heuristic: is this integer in the 30-decimal fixed-point basis?
pub fn is_raw_fixed_point(value: u128) -> bool {
    value > RAW_FIXED_POINT_THRESHOLD
}

/// Whether `value` survives a round trip through f64 unchanged.
pub fn float_round_trips(value: u128) -> bool {
    let as_float = value as f64;
    if !as_float.is_finite() || as_float < 0.0 || as_float >= u128::MAX as f64 {
        return false;
    }
    as_float as u128 == value
}

/// Fails when a raw amount is about to cross a float-typed channel it cannot
/// survive (JSON numbers, caller-supplied f64 fields). Violations are fatal:
/// they mean a transaction would be rejected onchain, or worse, submitted
/// with a wrong amount. Never catch-and-ignore this error.
pub fn ensure_float_safe(value: u128, field: &str) -> Result<u128, PrecisionError> {
    if float_round_trips(value) {
        Ok(value)
    } else {
        Err(PrecisionError::FloatCorruption {
            field: field.to_string(),
            value,
        })
    }
}

/// Clamps a requested raw amount to a ceiling, warning on overshoot.
///
/// Used to cap a close/decrease size to the live onchain position size before
/// submission. An overshoot here is the visible symptom of an upstream float
/// round trip.
pub fn cap_to_ceiling(requested: u128, ceiling: u128, field: &str) -> u128 {
    if requested > ceiling {
        warn!(
            field,
            requested,
            ceiling,
            overshoot = requested - ceiling,
            "capping raw amount to ceiling"
        );
        ceiling
    } else {
        requested
    }
}

/// Human-scale USD from a raw 10^30-basis amount, exact to one micro-USD.
///
/// Integer division first, then a small decimal: the raw amount itself never
/// touches a float or a Decimal mantissa it cannot fit.
pub fn usd_from_raw(raw: u128) -> Decimal {
    // raw <= u128::MAX, so micro <= ~3.4e14 and always fits an i64.
    let micro = raw / MICRO_USD_DIVISOR;
    Decimal::new(micro as i64, 6)
}

/// Human-scale token amount from a raw 10^decimals-basis amount.
pub fn tokens_from_raw(raw: u128, decimals: u8, field: &str) -> Result<Decimal, PrecisionError> {
    let scale = decimals as u32;
    if scale <= 28 {
        if raw <= i128::MAX as u128 {
            if let Ok(value) = Decimal::try_from_i128_with_scale(raw as i128, scale) {
                return Ok(value.normalize());
            }
        }
    }
    // Over-wide mantissa or exotic decimals: keep six fractional digits.
    let keep = 6u32;
    if scale > keep {
        if let Some(divisor) = 10u128.checked_pow(scale - keep) {
            let reduced = raw / divisor;
            if reduced <= i128::MAX as u128 {
                if let Ok(value) = Decimal::try_from_i128_with_scale(reduced as i128, keep) {
                    return Ok(value.normalize());
                }
            }
        }
    }
    Err(PrecisionError::Unrepresentable {
        field: field.to_string(),
        value: raw.to_string(),
        decimals: scale,
    })
}

/// Wire formatting: USD decimal to the exact 10^30-basis integer.
///
/// Lossless by construction: the decimal's own mantissa and scale are
/// reconstructed in integer arithmetic, never through a float.
pub fn raw_from_usd(usd: Decimal, field: &str) -> Result<u128, PrecisionError> {
    raw_from_decimal(usd, USD_DECIMALS, field)
}

/// Wire formatting: token-unit decimal to the exact 10^decimals-basis integer.
/// Sub-basis digits are rounded to the nearest representable unit.
pub fn raw_from_tokens(amount: Decimal, decimals: u8, field: &str) -> Result<u128, PrecisionError> {
    raw_from_decimal(amount, decimals as u32, field)
}

fn raw_from_decimal(value: Decimal, basis: u32, field: &str) -> Result<u128, PrecisionError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(PrecisionError::NegativeAmount {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    let rounded = if basis <= 28 {
        value.round_dp(basis).normalize()
    } else {
        value.normalize()
    };
    let mantissa = rounded.mantissa();
    debug_assert!(mantissa >= 0);
    let scale = rounded.scale();
    // scale <= 28 always, and <= basis after round_dp when basis <= 28.
    let exponent = basis.checked_sub(scale).ok_or_else(|| {
        PrecisionError::Unrepresentable {
            field: field.to_string(),
            value: value.to_string(),
            decimals: basis,
        }
    })?;
    10u128
        .checked_pow(exponent)
        .and_then(|unit| (mantissa as u128).checked_mul(unit))
        .ok_or_else(|| PrecisionError::Unrepresentable {
            field: field.to_string(),
            value: value.to_string(),
            decimals: basis,
        })
}
