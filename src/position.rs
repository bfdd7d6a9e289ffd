// 5.0: the normalized position entity. every decode path lands here, so the
// two data sources (onchain tuple, indexer record) can never drift apart.
// 5.1 has the derived-field math at the bottom: leverage, percent profit.

use crate::types::{Address, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Funding/borrowing accumulators carried on a position.
///
/// The indexer cannot supply these; they are zeroed and flagged approximate
/// rather than silently omitted, so callers know an RPC reconciliation is
/// still needed before acting on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAccumulators {
    pub borrowing_factor: u128,
    pub funding_fee_amount_per_size: u128,
    pub long_claimable_funding_per_size: u128,
    pub short_claimable_funding_per_size: u128,
    /// True when the source could not supply the accumulators and they were
    /// zeroed; reconcile against the chain before relying on them.
    pub approximate: bool,
}

impl FeeAccumulators {
    pub fn exact(
        borrowing_factor: u128,
        funding_fee_amount_per_size: u128,
        long_claimable_funding_per_size: u128,
        short_claimable_funding_per_size: u128,
    ) -> Self {
        Self {
            borrowing_factor,
            funding_fee_amount_per_size,
            long_claimable_funding_per_size,
            short_claimable_funding_per_size,
            approximate: false,
        }
    }

    /// All zeros, explicitly marked as needing RPC reconciliation.
    pub fn approximate() -> Self {
        Self {
            borrowing_factor: 0,
            funding_fee_amount_per_size: 0,
            long_claimable_funding_per_size: 0,
            short_claimable_funding_per_size: 0,
            approximate: true,
        }
    }
}

/// A decoded, normalized position. Recreated on every decode call; two
/// decodes of the same onchain state are structurally equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub account: Address,
    pub market_symbol: String,
    pub collateral_token: String,
    pub side: Side,
    /// Human-scale USD size, for display and risk math.
    pub size_usd: Decimal,
    /// Exact 10^30-basis size. Never round-tripped through a float; this is
    /// the value a decrease order must be capped against.
    pub size_usd_raw: u128,
    pub size_in_tokens_raw: u128,
    pub collateral_amount_raw: u128,
    pub collateral_usd: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub leverage: Decimal,
    pub percent_profit: Decimal,
    pub pending_impact_amount: i128,
    pub fees: FeeAccumulators,
    pub increased_at_time: i64,
    pub decreased_at_time: i64,
}

// 5.1: derived-field math, shared by the resolver and both decode paths.

/// `size / collateral`; zero when there is no collateral to divide by.
pub fn leverage_from_usd(size_usd: Decimal, collateral_usd: Decimal) -> Decimal {
    if collateral_usd.is_zero() {
        Decimal::ZERO
    } else {
        size_usd / collateral_usd
    }
}

/// Leveraged return on the mark/entry move, as a percentage.
/// Zero when the entry price is zero (nothing meaningful to compare).
pub fn percent_profit(
    entry_price: Decimal,
    mark_price: Decimal,
    side: Side,
    leverage: Decimal,
) -> Decimal {
    if entry_price.is_zero() {
        return Decimal::ZERO;
    }
    let price_ratio = mark_price / entry_price;
    let move_fraction = match side {
        Side::Long => price_ratio - Decimal::ONE,
        Side::Short => Decimal::ONE - price_ratio,
    };
    move_fraction * leverage * dec!(100)
}
