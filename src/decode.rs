//! Position decoding.
//!
//! Two raw shapes describe the same onchain state: the reader contract's
//! positional tuple and the indexer's named record. Both are lowered into a
//! [`DecodedFields`] intermediate and pushed through one normalization
//! routine, so the paths cannot drift apart. Single-record decode fails
//! fast; batch decode skips-and-logs malformed records and returns the
//! subset that survived.

use crate::graph::MarketGraph;
use crate::oracle::{price_from_raw, OracleError, PriceBook};
use crate::position::{leverage_from_usd, percent_profit, FeeAccumulators, Position};
use crate::precision::{tokens_from_raw, usd_from_raw, PrecisionError};
use crate::types::{Address, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("{field}: token {address} missing from metadata snapshot")]
    UnknownToken {
        field: &'static str,
        address: Address,
    },

    #[error("unknown market: {address}")]
    UnknownMarket { address: Address },

    #[error("{field}: malformed value {value}")]
    Malformed { field: &'static str, value: String },

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Precision(#[from] PrecisionError),
}

/// The onchain reader's fixed positional layout: an addresses triple, a
/// numbers tuple, and a flags tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnChainPositionRecord {
    pub account: Address,
    pub market: Address,
    pub collateral_token: Address,
    pub size_usd_raw: u128,
    pub size_in_tokens_raw: u128,
    pub collateral_amount_raw: u128,
    pub pending_impact_amount: i128,
    pub borrowing_factor: u128,
    pub funding_fee_amount_per_size: u128,
    pub long_claimable_funding_per_size: u128,
    pub short_claimable_funding_per_size: u128,
    pub increased_at_time: i64,
    pub decreased_at_time: i64,
    pub is_long: bool,
}

impl OnChainPositionRecord {
    /// Maps the wire tuple's positional fields onto names. The layout is
    /// fixed by the reader contract; reorder nothing.
    #[allow(clippy::type_complexity)]
    pub fn from_tuple(
        addresses: (Address, Address, Address),
        numbers: (u128, u128, u128, i128, u128, u128, u128, u128, i64, i64),
        flags: (bool,),
    ) -> Self {
        let (account, market, collateral_token) = addresses;
        let (
            size_usd_raw,
            size_in_tokens_raw,
            collateral_amount_raw,
            pending_impact_amount,
            borrowing_factor,
            funding_fee_amount_per_size,
            long_claimable_funding_per_size,
            short_claimable_funding_per_size,
            increased_at_time,
            decreased_at_time,
        ) = numbers;
        Self {
            account,
            market,
            collateral_token,
            size_usd_raw,
            size_in_tokens_raw,
            collateral_amount_raw,
            pending_impact_amount,
            borrowing_factor,
            funding_fee_amount_per_size,
            long_claimable_funding_per_size,
            short_claimable_funding_per_size,
            increased_at_time,
            decreased_at_time,
            is_long: flags.0,
        }
    }
}

/// The indexer's record shape. Big integers arrive as strings (GraphQL has
/// no 128-bit numbers) and must never pass through a float; leverage comes
/// pre-scaled at 10^4 instead of being derived.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerPositionRecord {
    pub account: Address,
    pub market: Address,
    pub collateral_token: Address,
    pub size_in_usd: String,
    pub size_in_tokens: String,
    pub collateral_amount: String,
    pub entry_price: String,
    pub leverage: String,
    pub is_long: bool,
    #[serde(default)]
    pub increased_at_time: i64,
    #[serde(default)]
    pub decreased_at_time: i64,
}

/// A record shape the decoder can normalize.
pub trait PositionSource {
    fn decoded_fields(&self) -> Result<DecodedFields, DecodeError>;
}

/// Source-independent intermediate. Fields a source cannot derive stay
/// `None` and are computed (or defaulted with an explicit marker) during
/// normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFields {
    pub account: Address,
    pub market: Address,
    pub collateral_token: Address,
    pub side: Side,
    pub size_usd_raw: u128,
    pub size_in_tokens_raw: u128,
    pub collateral_amount_raw: u128,
    pub pending_impact_amount: i128,
    /// Pre-scaled entry price in the raw oracle basis, when the source
    /// supplies one; otherwise derived from the exact size ratio.
    pub entry_price_raw: Option<u128>,
    pub leverage: Option<Decimal>,
    pub fees: FeeAccumulators,
    pub increased_at_time: i64,
    pub decreased_at_time: i64,
}

impl PositionSource for OnChainPositionRecord {
    fn decoded_fields(&self) -> Result<DecodedFields, DecodeError> {
        Ok(DecodedFields {
            account: self.account,
            market: self.market,
            collateral_token: self.collateral_token,
            side: Side::from_is_long(self.is_long),
            size_usd_raw: self.size_usd_raw,
            size_in_tokens_raw: self.size_in_tokens_raw,
            collateral_amount_raw: self.collateral_amount_raw,
            pending_impact_amount: self.pending_impact_amount,
            entry_price_raw: None,
            leverage: None,
            fees: FeeAccumulators::exact(
                self.borrowing_factor,
                self.funding_fee_amount_per_size,
                self.long_claimable_funding_per_size,
                self.short_claimable_funding_per_size,
            ),
            increased_at_time: self.increased_at_time,
            decreased_at_time: self.decreased_at_time,
        })
    }
}

impl PositionSource for IndexerPositionRecord {
    fn decoded_fields(&self) -> Result<DecodedFields, DecodeError> {
        let size_usd_raw = parse_raw("size_in_usd", &self.size_in_usd)?;
        let size_in_tokens_raw = parse_raw("size_in_tokens", &self.size_in_tokens)?;
        let collateral_amount_raw = parse_raw("collateral_amount", &self.collateral_amount)?;
        let entry_price_raw = parse_raw("entry_price", &self.entry_price)?;
        let leverage_scaled = parse_raw("leverage", &self.leverage)?;
        if leverage_scaled > i64::MAX as u128 {
            return Err(DecodeError::Malformed {
                field: "leverage",
                value: self.leverage.clone(),
            });
        }
        Ok(DecodedFields {
            account: self.account,
            market: self.market,
            collateral_token: self.collateral_token,
            side: Side::from_is_long(self.is_long),
            size_usd_raw,
            size_in_tokens_raw,
            collateral_amount_raw,
            pending_impact_amount: 0,
            entry_price_raw: Some(entry_price_raw),
            leverage: Some(Decimal::new(leverage_scaled as i64, 4)),
            // the indexer cannot supply the accumulators; zeroed and flagged
            fees: FeeAccumulators::approximate(),
            increased_at_time: self.increased_at_time,
            decreased_at_time: self.decreased_at_time,
        })
    }
}

fn parse_raw(field: &'static str, value: &str) -> Result<u128, DecodeError> {
    value.parse::<u128>().map_err(|_| DecodeError::Malformed {
        field,
        value: value.to_string(),
    })
}

/// Decodes raw records against immutable chain snapshots.
pub struct PositionDecoder<'a> {
    graph: &'a MarketGraph,
    prices: &'a PriceBook,
}

impl<'a> PositionDecoder<'a> {
    pub fn new(graph: &'a MarketGraph, prices: &'a PriceBook) -> Self {
        Self { graph, prices }
    }

    /// Fail-fast single-record decode.
    pub fn decode<S: PositionSource>(&self, record: &S) -> Result<Position, DecodeError> {
        self.normalize(record.decoded_fields()?)
    }

    /// Batch decode: a malformed record is logged and skipped, never fatal.
    /// Returns the subset that decoded, in input order.
    pub fn decode_batch<S: PositionSource>(&self, records: &[S]) -> Vec<Position> {
        let mut decoded = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            match self.decode(record) {
                Ok(position) => decoded.push(position),
                Err(error) => {
                    warn!(index, %error, "skipping undecodable position record");
                }
            }
        }
        decoded
    }

    // the one normalization routine both source shapes share
    fn normalize(&self, fields: DecodedFields) -> Result<Position, DecodeError> {
        let market =
            self.graph
                .market_by_address(fields.market)
                .ok_or(DecodeError::UnknownMarket {
                    address: fields.market,
                })?;

        let index_token = self
            .graph
            .token(market.index_token_address)
            .map_err(|_| DecodeError::UnknownToken {
                field: "index_token",
                address: market.index_token_address,
            })?;
        let collateral_token = self
            .graph
            .token(fields.collateral_token)
            .map_err(|_| DecodeError::UnknownToken {
                field: "collateral_token",
                address: fields.collateral_token,
            })?;

        let size_usd = usd_from_raw(fields.size_usd_raw);
        let size_in_tokens = tokens_from_raw(
            fields.size_in_tokens_raw,
            index_token.decimals,
            "size_in_tokens",
        )?;

        let entry_price = match fields.entry_price_raw {
            Some(raw) => price_from_raw(raw, index_token.decimals),
            None => {
                if size_in_tokens.is_zero() {
                    Decimal::ZERO
                } else {
                    size_usd / size_in_tokens
                }
            }
        };

        // mark from the oracle median, entry as the documented fallback
        let mark_price = match self
            .prices
            .median_price(market.index_token_address, index_token.decimals)
        {
            Ok(price) => price,
            Err(OracleError::Unavailable { .. }) => entry_price,
        };

        let collateral_price = self.collateral_price(
            fields.collateral_token,
            collateral_token.decimals,
            market.index_token_address,
            mark_price,
        )?;
        let collateral_amount = tokens_from_raw(
            fields.collateral_amount_raw,
            collateral_token.decimals,
            "collateral_amount",
        )?;
        let collateral_usd = collateral_amount * collateral_price;

        let leverage = fields
            .leverage
            .unwrap_or_else(|| leverage_from_usd(size_usd, collateral_usd));
        let side = fields.side;
        let profit = percent_profit(entry_price, mark_price, side, leverage);

        Ok(Position {
            account: fields.account,
            market_symbol: market.symbol.clone(),
            collateral_token: collateral_token.symbol.clone(),
            side,
            size_usd,
            size_usd_raw: fields.size_usd_raw,
            size_in_tokens_raw: fields.size_in_tokens_raw,
            collateral_amount_raw: fields.collateral_amount_raw,
            collateral_usd,
            entry_price,
            mark_price,
            leverage,
            percent_profit: profit,
            pending_impact_amount: fields.pending_impact_amount,
            fees: fields.fees,
            increased_at_time: fields.increased_at_time,
            decreased_at_time: fields.decreased_at_time,
        })
    }

    // collateral price fallback chain: oracle -> index price when collateral
    // is the index token -> $1 for stables -> unavailable
    fn collateral_price(
        &self,
        collateral: Address,
        collateral_decimals: u8,
        index_token: Address,
        index_mark_price: Decimal,
    ) -> Result<Decimal, DecodeError> {
        match self.prices.median_price(collateral, collateral_decimals) {
            Ok(price) => Ok(price),
            Err(OracleError::Unavailable { .. }) => {
                if collateral == index_token {
                    Ok(index_mark_price)
                } else if self.graph.config().is_stable(collateral) {
                    Ok(dec!(1))
                } else {
                    Err(DecodeError::Oracle(OracleError::Unavailable {
                        token: collateral,
                    }))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::known;
    use crate::oracle::{raw_price_from_usd, OraclePriceSample};
    use crate::types::{Chain, Market, Timestamp, TokenMetadata};
    use std::collections::HashMap;

    fn graph() -> MarketGraph {
        MarketGraph::load(
            Chain::Arbitrum,
            [
                TokenMetadata::new("WETH", known::arbitrum_weth(), 18),
                TokenMetadata::new("USDC", known::arbitrum_usdc(), 6),
            ],
            [Market {
                market_address: Address([0xAA; 20]),
                index_token_address: known::arbitrum_weth(),
                long_token_address: known::arbitrum_weth(),
                short_token_address: known::arbitrum_usdc(),
                symbol: "ETH/USD".to_string(),
            }],
        )
        .unwrap()
    }

    fn prices_at(eth_usd: Decimal) -> PriceBook {
        let mut samples = HashMap::new();
        for (token, usd, decimals) in [
            (known::arbitrum_weth(), eth_usd, 18u8),
            (known::arbitrum_usdc(), dec!(1), 6),
        ] {
            let raw = raw_price_from_usd(usd, decimals).unwrap();
            samples.insert(
                token,
                OraclePriceSample {
                    token_address: token,
                    min_price_raw: raw,
                    max_price_raw: raw,
                    timestamp: Timestamp::from_millis(0),
                },
            );
        }
        PriceBook::from_samples(samples, graph().config())
    }

    // $6000 long over 2 ETH at $2000 entry, $1200 of USDC collateral
    fn onchain_record() -> OnChainPositionRecord {
        OnChainPositionRecord::from_tuple(
            (
                Address([0x01; 20]),
                Address([0xAA; 20]),
                known::arbitrum_usdc(),
            ),
            (
                6000 * 10u128.pow(30),
                3 * 10u128.pow(18),
                1200 * 10u128.pow(6),
                0,
                7,
                11,
                13,
                17,
                1_700_000_000,
                0,
            ),
            (true,),
        )
    }

    #[test]
    fn onchain_decode_normalizes() {
        let graph = graph();
        let prices = prices_at(dec!(2200));
        let decoder = PositionDecoder::new(&graph, &prices);

        let position = decoder.decode(&onchain_record()).unwrap();
        assert_eq!(position.market_symbol, "ETH/USD");
        assert_eq!(position.collateral_token, "USDC");
        assert_eq!(position.side, Side::Long);
        assert_eq!(position.size_usd, dec!(6000));
        assert_eq!(position.size_usd_raw, 6000 * 10u128.pow(30));
        assert_eq!(position.entry_price, dec!(2000));
        assert_eq!(position.mark_price, dec!(2200));
        assert_eq!(position.collateral_usd, dec!(1200));
        assert_eq!(position.leverage, dec!(5));
        // +10% move at 5x
        assert_eq!(position.percent_profit, dec!(50));
        assert!(!position.fees.approximate);
        assert_eq!(position.fees.borrowing_factor, 7);
    }

    #[test]
    fn decode_is_structurally_repeatable() {
        let graph = graph();
        let prices = prices_at(dec!(2200));
        let decoder = PositionDecoder::new(&graph, &prices);
        let a = decoder.decode(&onchain_record()).unwrap();
        let b = decoder.decode(&onchain_record()).unwrap();
        assert_eq!(a, b);
    }

    fn indexer_record() -> IndexerPositionRecord {
        IndexerPositionRecord {
            account: Address([0x01; 20]),
            market: Address([0xAA; 20]),
            collateral_token: known::arbitrum_usdc(),
            size_in_usd: (6000 * 10u128.pow(30)).to_string(),
            size_in_tokens: (3 * 10u128.pow(18)).to_string(),
            collateral_amount: (1200 * 10u128.pow(6)).to_string(),
            // $2000 in the 10^12 raw basis for an 18-decimal index
            entry_price: (2000 * 10u128.pow(12)).to_string(),
            // 5x pre-scaled at 10^4
            leverage: "50000".to_string(),
            is_long: true,
            increased_at_time: 1_700_000_000,
            decreased_at_time: 0,
        }
    }

    #[test]
    fn indexer_decode_matches_onchain_core_fields() {
        let graph = graph();
        let prices = prices_at(dec!(2200));
        let decoder = PositionDecoder::new(&graph, &prices);

        let onchain = decoder.decode(&onchain_record()).unwrap();
        let indexed = decoder.decode(&indexer_record()).unwrap();

        assert_eq!(onchain.market_symbol, indexed.market_symbol);
        assert_eq!(onchain.side, indexed.side);
        assert_eq!(onchain.leverage, indexed.leverage);
        assert_eq!(onchain.entry_price, indexed.entry_price);
        assert_eq!(onchain.size_usd_raw, indexed.size_usd_raw);
        // accumulators legitimately differ: indexer zeroes and flags them
        assert!(indexed.fees.approximate);
        assert_eq!(indexed.fees.borrowing_factor, 0);
        assert!(!onchain.fees.approximate);
    }

    #[test]
    fn indexer_record_deserializes_from_json() {
        let json = format!(
            r#"{{
                "account": "{}",
                "market": "{}",
                "collateralToken": "{}",
                "sizeInUsd": "{}",
                "sizeInTokens": "{}",
                "collateralAmount": "{}",
                "entryPrice": "{}",
                "leverage": "50000",
                "isLong": true,
                "increasedAtTime": 1700000000
            }}"#,
            Address([0x01; 20]),
            Address([0xAA; 20]),
            known::arbitrum_usdc(),
            6000 * 10u128.pow(30),
            3 * 10u128.pow(18),
            1200 * 10u128.pow(6),
            2000 * 10u128.pow(12),
        );
        let record: IndexerPositionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, indexer_record());
    }

    #[test]
    fn unknown_collateral_token_fails_single_decode() {
        let graph = graph();
        let prices = prices_at(dec!(2200));
        let decoder = PositionDecoder::new(&graph, &prices);

        let mut record = onchain_record();
        record.collateral_token = Address([0xEE; 20]);
        let err = decoder.decode(&record).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnknownToken {
                field: "collateral_token",
                ..
            }
        ));
    }

    #[test]
    fn batch_decode_skips_malformed_records() {
        let graph = graph();
        let prices = prices_at(dec!(2200));
        let decoder = PositionDecoder::new(&graph, &prices);

        let good_a = onchain_record();
        let mut bad = onchain_record();
        bad.collateral_token = Address([0xEE; 20]);
        let mut good_b = onchain_record();
        good_b.is_long = false;

        let decoded = decoder.decode_batch(&[good_a, bad, good_b]);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].side, Side::Long);
        assert_eq!(decoded[1].side, Side::Short);
    }

    #[test]
    fn mark_falls_back_to_entry_without_oracle() {
        let graph = graph();
        let empty = PriceBook::from_samples(HashMap::new(), graph.config());
        let decoder = PositionDecoder::new(&graph, &empty);

        let position = decoder.decode(&onchain_record()).unwrap();
        assert_eq!(position.mark_price, position.entry_price);
        // USDC has no feed either: the stable fallback prices it at $1
        assert_eq!(position.collateral_usd, dec!(1200));
        assert_eq!(position.percent_profit, Decimal::ZERO);
    }

    #[test]
    fn index_collateral_falls_back_to_mark_price() {
        let graph = graph();
        // only the index token has a feed; collateral == index
        let mut samples = HashMap::new();
        let raw = raw_price_from_usd(dec!(2200), 18).unwrap();
        samples.insert(
            known::arbitrum_weth(),
            OraclePriceSample {
                token_address: known::arbitrum_weth(),
                min_price_raw: raw,
                max_price_raw: raw,
                timestamp: Timestamp::from_millis(0),
            },
        );
        let prices = PriceBook::from_samples(samples, graph.config());
        let decoder = PositionDecoder::new(&graph, &prices);

        let mut record = onchain_record();
        record.collateral_token = known::arbitrum_weth();
        record.collateral_amount_raw = 10u128.pow(18); // 1 WETH
        let position = decoder.decode(&record).unwrap();
        assert_eq!(position.collateral_usd, dec!(2200));
    }

    #[test]
    fn malformed_indexer_number_fails() {
        let mut record = indexer_record();
        record.size_in_usd = "not-a-number".to_string();
        let graph = graph();
        let prices = prices_at(dec!(2200));
        let decoder = PositionDecoder::new(&graph, &prices);
        assert!(matches!(
            decoder.decode(&record).unwrap_err(),
            DecodeError::Malformed {
                field: "size_in_usd",
                ..
            }
        ));
    }
}
