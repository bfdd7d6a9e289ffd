//! Order-parameter resolution.
//!
//! Turns a partial, symbol-based order intent ("2x long ETH with $10 of
//! USDC") into a fully-qualified, wire-exact parameter set: every address
//! resolved, the swap path discovered, the missing one of
//! {size, collateral, leverage} derived from the other two, and the final
//! amounts formatted as exact fixed-point integers.
//!
//! Resolution is staged and order matters: each step validates against the
//! ones before it, and any invalid or missing required field aborts the
//! whole call with a typed error. No partial results.

use crate::graph::{GraphError, MarketGraph};
use crate::oracle::{OracleError, PriceBook};
use crate::position::leverage_from_usd;
use crate::precision::{raw_from_tokens, raw_from_usd, PrecisionError};
use crate::types::{Address, Chain, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default acceptable-price slippage, 0.3%.
pub const DEFAULT_SLIPPAGE_PERCENT: Decimal = dec!(0.3);

pub const MAX_LEVERAGE: Decimal = dec!(100);
pub const MIN_LEVERAGE: Decimal = dec!(1);

/// Minimum collateral value for an increase order, in USD.
pub const MIN_COLLATERAL_USD: Decimal = dec!(2);

// consistency tolerance when all three of size/collateral/leverage are given
const LEVERAGE_TOLERANCE: Decimal = dec!(0.000001);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Increase,
    Decrease,
}

/// User-supplied subset of an order. Token fields accept a symbol or an
/// address literal. Consumed by [`resolve`]; one intent per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub chain: Option<Chain>,
    pub kind: OrderKind,
    pub side: Side,
    pub index_token: Option<String>,
    /// Explicit market override; normally derived from the index token.
    pub market_key: Option<Address>,
    /// The asset the position is denominated in.
    pub collateral_token: Option<String>,
    /// The asset the caller actually holds; defaults to the collateral token.
    pub start_token: Option<String>,
    pub size_usd: Option<Decimal>,
    /// Collateral delta in start-token units.
    pub collateral_delta: Option<Decimal>,
    pub leverage: Option<Decimal>,
    pub slippage_percent: Option<Decimal>,
}

impl OrderIntent {
    pub fn increase(side: Side) -> Self {
        Self::new(OrderKind::Increase, side)
    }

    pub fn decrease(side: Side) -> Self {
        Self::new(OrderKind::Decrease, side)
    }

    fn new(kind: OrderKind, side: Side) -> Self {
        Self {
            chain: None,
            kind,
            side,
            index_token: None,
            market_key: None,
            collateral_token: None,
            start_token: None,
            size_usd: None,
            collateral_delta: None,
            leverage: None,
            slippage_percent: None,
        }
    }

    pub fn on_chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn index(mut self, token: impl Into<String>) -> Self {
        self.index_token = Some(token.into());
        self
    }

    pub fn collateral(mut self, token: impl Into<String>) -> Self {
        self.collateral_token = Some(token.into());
        self
    }

    pub fn start(mut self, token: impl Into<String>) -> Self {
        self.start_token = Some(token.into());
        self
    }

    pub fn size(mut self, usd: Decimal) -> Self {
        self.size_usd = Some(usd);
        self
    }

    pub fn collateral_amount(mut self, tokens: Decimal) -> Self {
        self.collateral_delta = Some(tokens);
        self
    }

    pub fn leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = Some(leverage);
        self
    }

    pub fn slippage(mut self, percent: Decimal) -> Self {
        self.slippage_percent = Some(percent);
        self
    }
}

/// Fully-qualified, wire-exact order parameters. Hand this to a transaction
/// builder; nothing here needs further resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOrderParameters {
    pub chain: Chain,
    pub kind: OrderKind,
    pub side: Side,
    pub market_address: Address,
    pub index_token_address: Address,
    pub collateral_address: Address,
    pub start_token_address: Address,
    /// 0, 1, or 2 market addresses converting start token into collateral.
    pub swap_path: Vec<Address>,
    pub size_delta_usd: Decimal,
    /// Exact 10^30-basis size delta.
    pub size_delta_raw: u128,
    /// Collateral delta in start-token units.
    pub initial_collateral_delta: Decimal,
    /// Exact 10^start_token_decimals-basis collateral delta.
    pub initial_collateral_delta_raw: u128,
    pub leverage: Decimal,
    pub collateral_usd: Decimal,
    /// Mark price adjusted by slippage in the direction that can fill.
    pub acceptable_price: Decimal,
    pub slippage_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("missing required parameter: {field}")]
    MissingParameter { field: &'static str },

    #[error("intent targets {intent} but snapshot is for {snapshot}")]
    ChainMismatch { intent: Chain, snapshot: Chain },

    #[error("no market with index token {index_token}")]
    NoMarketForIndexToken { index_token: Address },

    #[error("unknown market key: {market}")]
    UnknownMarket { market: Address },

    #[error("token {token} is not a collateral of market {market} (long {long}, short {short})")]
    InvalidCollateralForMarket {
        token: Address,
        market: Address,
        long: Address,
        short: Address,
    },

    #[error("leverage {leverage} outside supported range {min}..={max}")]
    InvalidLeverage {
        leverage: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("collateral value ${collateral_usd} below ${minimum} minimum for an increase")]
    InsufficientCollateral {
        collateral_usd: Decimal,
        minimum: Decimal,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Precision(#[from] PrecisionError),
}

/// Resolves an intent against immutable chain snapshots. Pure over its
/// inputs: same snapshot, same intent, same output.
pub fn resolve(
    intent: &OrderIntent,
    graph: &MarketGraph,
    prices: &PriceBook,
) -> Result<ResolvedOrderParameters, ResolveError> {
    // 1. chain is explicit; no default, no inference.
    let chain = intent
        .chain
        .ok_or(ResolveError::MissingParameter { field: "chain" })?;
    if chain != graph.chain() {
        return Err(ResolveError::ChainMismatch {
            intent: chain,
            snapshot: graph.chain(),
        });
    }

    // 2. index token, with chain alias substitution.
    let index_symbol = intent
        .index_token
        .as_deref()
        .ok_or(ResolveError::MissingParameter {
            field: "index_token",
        })?;
    let index_token_address = graph.resolve_token(index_symbol)?;

    // 3. the market whose index token this is, unless overridden.
    let market = match intent.market_key {
        Some(key) => graph
            .market_by_address(key)
            .ok_or(ResolveError::UnknownMarket { market: key })?,
        None => graph
            .market_for_index_token(index_token_address)
            .ok_or(ResolveError::NoMarketForIndexToken {
                index_token: index_token_address,
            })?,
    };

    // 4. collateral and start tokens, resolved independently.
    let collateral_symbol =
        intent
            .collateral_token
            .as_deref()
            .ok_or(ResolveError::MissingParameter {
                field: "collateral_token",
            })?;
    let collateral_address = graph.resolve_token(collateral_symbol)?;
    let start_token_address = match intent.start_token.as_deref() {
        Some(symbol) => graph.resolve_token(symbol)?,
        None => collateral_address,
    };

    // 5. the market must actually accept this collateral.
    if !market.accepts_collateral(collateral_address) {
        return Err(ResolveError::InvalidCollateralForMarket {
            token: collateral_address,
            market: market.market_address,
            long: market.long_token_address,
            short: market.short_token_address,
        });
    }

    // 6. swap path from what the caller holds to the position collateral.
    let swap_path = if start_token_address == collateral_address {
        Vec::new()
    } else {
        graph
            .find_swap_route(start_token_address, collateral_address)?
            .path
    };

    // 7. derive the missing one of {size, collateral, leverage}. the start
    // token carries the deposit, so its oracle price values the collateral.
    let start_decimals = graph.token_decimals(start_token_address)?;
    let start_price = prices.median_price(start_token_address, start_decimals)?;
    let (size_delta_usd, collateral_delta, leverage) = derive_amounts(intent, start_price)?;
    let collateral_usd = collateral_delta * start_price;

    info!(
        size_usd = %size_delta_usd,
        collateral_tokens = %collateral_delta,
        collateral_usd = %collateral_usd,
        leverage = %leverage,
        "derived order amounts"
    );

    // 8. risk bounds. the $2 floor only gates increases.
    if leverage > MAX_LEVERAGE || leverage < MIN_LEVERAGE {
        return Err(ResolveError::InvalidLeverage {
            leverage,
            min: MIN_LEVERAGE,
            max: MAX_LEVERAGE,
        });
    }
    if intent.kind == OrderKind::Increase && collateral_usd < MIN_COLLATERAL_USD {
        return Err(ResolveError::InsufficientCollateral {
            collateral_usd,
            minimum: MIN_COLLATERAL_USD,
        });
    }

    // 9. wire formatting last, after all validation. exact integer math.
    let size_delta_raw = raw_from_usd(size_delta_usd, "size_delta_usd")?;
    let initial_collateral_delta_raw = raw_from_tokens(
        collateral_delta,
        start_decimals,
        "initial_collateral_delta",
    )?;

    let slippage_percent = intent
        .slippage_percent
        .unwrap_or(DEFAULT_SLIPPAGE_PERCENT);
    let index_decimals = graph.token_decimals(index_token_address)?;
    let index_price = prices.median_price(index_token_address, index_decimals)?;
    let acceptable_price = acceptable_price(index_price, intent.side, intent.kind, slippage_percent);

    Ok(ResolvedOrderParameters {
        chain,
        kind: intent.kind,
        side: intent.side,
        market_address: market.market_address,
        index_token_address,
        collateral_address,
        start_token_address,
        swap_path,
        size_delta_usd,
        size_delta_raw,
        initial_collateral_delta: collateral_delta,
        initial_collateral_delta_raw,
        leverage,
        collateral_usd,
        acceptable_price,
        slippage_percent,
    })
}

// Returns (size_usd, collateral_delta_tokens, leverage). Exactly two of the
// three inputs are required; a third, if present, must agree.
fn derive_amounts(
    intent: &OrderIntent,
    start_price: Decimal,
) -> Result<(Decimal, Decimal, Decimal), ResolveError> {
    match (intent.size_usd, intent.collateral_delta, intent.leverage) {
        (Some(size), Some(collateral), maybe_leverage) => {
            let collateral_usd = collateral * start_price;
            let leverage = leverage_from_usd(size, collateral_usd);
            if let Some(stated) = maybe_leverage {
                if (stated - leverage).abs() > LEVERAGE_TOLERANCE * leverage.max(Decimal::ONE) {
                    return Err(ResolveError::InvalidLeverage {
                        leverage: stated,
                        min: MIN_LEVERAGE,
                        max: MAX_LEVERAGE,
                    });
                }
            }
            Ok((size, collateral, leverage))
        }
        (None, Some(collateral), Some(leverage)) => {
            let collateral_usd = collateral * start_price;
            let size = leverage * collateral_usd;
            Ok((size, collateral, leverage))
        }
        (Some(size), None, Some(leverage)) => {
            if leverage.is_zero() || start_price.is_zero() {
                return Err(ResolveError::InvalidLeverage {
                    leverage,
                    min: MIN_LEVERAGE,
                    max: MAX_LEVERAGE,
                });
            }
            let collateral_usd = size / leverage;
            let collateral = collateral_usd / start_price;
            Ok((size, collateral, leverage))
        }
        _ => Err(ResolveError::MissingParameter {
            field: "two of size_usd, collateral_delta, leverage",
        }),
    }
}

/// Mark price shifted by slippage in the direction the order can fill:
/// orders that buy the index (long increase, short decrease) accept a higher
/// price; orders that sell accept a lower one.
pub fn acceptable_price(
    mark_price: Decimal,
    side: Side,
    kind: OrderKind,
    slippage_percent: Decimal,
) -> Decimal {
    let fraction = slippage_percent / dec!(100);
    let buys_index = matches!(
        (side, kind),
        (Side::Long, OrderKind::Increase) | (Side::Short, OrderKind::Decrease)
    );
    if buys_index {
        mark_price * (Decimal::ONE + fraction)
    } else {
        mark_price * (Decimal::ONE - fraction)
    }
}
