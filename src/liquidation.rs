//! Liquidation price estimation.
//!
//! Mirrors the exchange's own collateral-threshold formula: a position is
//! force-closed when remaining collateral falls below
//! `max(size * min_collateral_factor, $5)`. Two modes: exact (token-level
//! inputs available) and approximate (USD-only inputs, ±0.5% typical error).
//!
//! This is the human-scale layer. Everything here is pure `Decimal` math on
//! values far below the raw fixed-point boundary, so it is deliberately
//! exempt from the precision guard.

use crate::types::Side;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Closing fee charged on the full position size, 0.1%.
pub const CLOSING_FEE_RATE: Decimal = dec!(0.001);

/// Absolute floor on the liquidation collateral threshold, in USD.
pub const MIN_COLLATERAL_USD: Decimal = dec!(5);

/// Default maintenance margin rate. The liquidation threshold factor is
/// half of this (1% maintenance, 0.5% minimum collateral).
pub const DEFAULT_MAINTENANCE_MARGIN_RATE: Decimal = dec!(0.01);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationInputs {
    pub entry_price: Decimal,
    pub collateral_usd: Decimal,
    pub size_usd: Decimal,
    pub side: Side,
    pub maintenance_margin_rate: Decimal,
    pub pending_funding_fees_usd: Decimal,
    pub pending_borrowing_fees_usd: Decimal,
    pub include_closing_fee: bool,
    /// Collateral token is the market's index token (long collateral case).
    pub collateral_is_index_token: bool,
    /// Collateral amount in whole tokens. Enables exact mode.
    pub collateral_amount: Option<Decimal>,
}

impl LiquidationInputs {
    pub fn new(entry_price: Decimal, collateral_usd: Decimal, size_usd: Decimal, side: Side) -> Self {
        Self {
            entry_price,
            collateral_usd,
            size_usd,
            side,
            maintenance_margin_rate: DEFAULT_MAINTENANCE_MARGIN_RATE,
            pending_funding_fees_usd: Decimal::ZERO,
            pending_borrowing_fees_usd: Decimal::ZERO,
            include_closing_fee: true,
            collateral_is_index_token: false,
            collateral_amount: None,
        }
    }

    pub fn with_pending_fees(mut self, funding_usd: Decimal, borrowing_usd: Decimal) -> Self {
        self.pending_funding_fees_usd = funding_usd;
        self.pending_borrowing_fees_usd = borrowing_usd;
        self
    }

    pub fn with_collateral_tokens(mut self, amount: Decimal, is_index_token: bool) -> Self {
        self.collateral_amount = Some(amount);
        self.collateral_is_index_token = is_index_token;
        self
    }

    pub fn without_closing_fee(mut self) -> Self {
        self.include_closing_fee = false;
        self
    }

    fn closing_fee(&self) -> Decimal {
        if self.include_closing_fee {
            self.size_usd * CLOSING_FEE_RATE
        } else {
            Decimal::ZERO
        }
    }

    fn pending_fees(&self) -> Decimal {
        self.pending_funding_fees_usd + self.pending_borrowing_fees_usd
    }

    /// `max(size * mmr/2, $5)` — the collateral level that triggers closure.
    fn collateral_threshold(&self) -> Decimal {
        let factor = self.maintenance_margin_rate / dec!(2);
        (self.size_usd * factor).max(MIN_COLLATERAL_USD)
    }
}

/// Estimated mark price at which the position is liquidated, clamped to >= 0.
pub fn estimate_liquidation_price(inputs: &LiquidationInputs) -> Decimal {
    let price = match inputs.collateral_amount {
        Some(amount) => exact_mode(inputs, amount),
        None => approximate_mode(inputs),
    };
    price.max(Decimal::ZERO)
}

fn exact_mode(inputs: &LiquidationInputs, collateral_amount: Decimal) -> Decimal {
    if inputs.entry_price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let size_in_tokens = inputs.size_usd / inputs.entry_price;
    let threshold = inputs.collateral_threshold();
    let fees = inputs.pending_fees() + inputs.closing_fee();

    if inputs.collateral_is_index_token {
        // collateral moves with the index: fold it into the token denominator
        let (numerator, denominator) = match inputs.side {
            Side::Long => (
                inputs.size_usd + threshold + fees,
                size_in_tokens + collateral_amount,
            ),
            Side::Short => (
                inputs.size_usd - threshold - fees,
                size_in_tokens - collateral_amount,
            ),
        };
        if denominator.is_zero() {
            return Decimal::ZERO;
        }
        numerator / denominator
    } else {
        if size_in_tokens.is_zero() {
            return Decimal::ZERO;
        }
        let remaining_collateral_usd = inputs.collateral_usd - inputs.pending_fees() - inputs.closing_fee();
        match inputs.side {
            Side::Long => (threshold - remaining_collateral_usd + inputs.size_usd) / size_in_tokens,
            Side::Short => (inputs.size_usd - threshold + remaining_collateral_usd) / size_in_tokens,
        }
    }
}

// USD-only fallback. Diverges from exact mode by ±0.5% typically, more at
// high leverage; the two are not reconciled here.
fn approximate_mode(inputs: &LiquidationInputs) -> Decimal {
    if inputs.size_usd.is_zero() {
        return Decimal::ZERO;
    }
    let threshold = inputs.collateral_threshold();
    let remaining_collateral = inputs.collateral_usd - inputs.pending_fees() - inputs.closing_fee();
    let buffer = (remaining_collateral - threshold) / inputs.size_usd;
    match inputs.side {
        Side::Long => inputs.entry_price * (Decimal::ONE - buffer),
        Side::Short => inputs.entry_price * (Decimal::ONE + buffer),
    }
}
