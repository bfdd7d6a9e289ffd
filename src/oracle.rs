// Oracle price plumbing.
//
// The core never fetches prices itself. A collaborator implements
// OraclePriceSource (blocking I/O, retries, signing — all out of scope) and
// the snapshot it returns is wrapped in a PriceBook that owns lookup policy:
// fallback table for chains without their own oracle, median mark price,
// exact scaling from the raw price basis.

use crate::config::ChainConfig;
use crate::types::{Address, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A raw oracle sample. Prices are scaled to 10^(30 - token_decimals):
/// multiplying by a token amount in 10^decimals lands in the 10^30 USD basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OraclePriceSample {
    pub token_address: Address,
    pub min_price_raw: u128,
    pub max_price_raw: u128,
    pub timestamp: Timestamp,
}

impl OraclePriceSample {
    /// Midpoint of the min/max band, still in the raw basis.
    pub fn median_raw(&self) -> u128 {
        let (lo, hi) = if self.min_price_raw <= self.max_price_raw {
            (self.min_price_raw, self.max_price_raw)
        } else {
            (self.max_price_raw, self.min_price_raw)
        };
        lo + (hi - lo) / 2
    }
}

/// Price snapshot collaborator; implementations are out of scope here.
pub trait OraclePriceSource {
    fn recent_prices(&self) -> HashMap<Address, OraclePriceSample>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("no oracle price for token {token}")]
    Unavailable { token: Address },
}

/// One immutable price snapshot plus lookup policy.
#[derive(Debug, Clone)]
pub struct PriceBook {
    samples: HashMap<Address, OraclePriceSample>,
    fallbacks: HashMap<Address, Address>,
}

impl PriceBook {
    pub fn from_source(source: &dyn OraclePriceSource, config: &ChainConfig) -> Self {
        Self {
            samples: source.recent_prices(),
            fallbacks: config.oracle_fallbacks.clone(),
        }
    }

    pub fn from_samples(
        samples: HashMap<Address, OraclePriceSample>,
        config: &ChainConfig,
    ) -> Self {
        Self {
            samples,
            fallbacks: config.oracle_fallbacks.clone(),
        }
    }

    /// Direct lookup, then the testnet->mainnet fallback table.
    /// Address keys hash on raw bytes, so casing of the source data is moot.
    pub fn sample(&self, token: Address) -> Result<&OraclePriceSample, OracleError> {
        if let Some(sample) = self.samples.get(&token) {
            return Ok(sample);
        }
        if let Some(fallback) = self.fallbacks.get(&token) {
            if let Some(sample) = self.samples.get(fallback) {
                return Ok(sample);
            }
        }
        Err(OracleError::Unavailable { token })
    }

    /// Median mark price in human USD per whole token.
    pub fn median_price(&self, token: Address, token_decimals: u8) -> Result<Decimal, OracleError> {
        let sample = self.sample(token)?;
        Ok(price_from_raw(sample.median_raw(), token_decimals))
    }
}

// 2^96 - 1, the widest mantissa a Decimal can carry.
const DECIMAL_MANTISSA_MAX: u128 = 79_228_162_514_264_337_593_543_950_335;

/// Exact scaling of a raw-basis price into human USD per whole token:
/// `price = raw * 10^(decimals - 30)`. The scaling happens before any
/// division so no precision is dropped early; only digits below the Decimal
/// mantissa are shed, and only when the raw value is too wide to carry.
pub fn price_from_raw(raw: u128, token_decimals: u8) -> Decimal {
    let decimals = u32::from(token_decimals);
    let (mut reduced, mut scale) = if decimals <= 30 {
        let shift = 30 - decimals;
        let dec_scale = shift.min(28);
        let int_shift = shift - dec_scale;
        (raw / 10u128.pow(int_shift), dec_scale)
    } else {
        // tokens wider than the USD basis: multiply up, saturating wide
        let factor = 10u128.checked_pow(decimals - 30);
        let value = factor
            .and_then(|f| raw.checked_mul(f))
            .unwrap_or(DECIMAL_MANTISSA_MAX);
        (value, 0)
    };
    while reduced > DECIMAL_MANTISSA_MAX {
        reduced /= 10;
        if scale == 0 {
            // raw / 10^30 tops out near 3.4e8; unreachable for real samples
            return Decimal::MAX;
        }
        scale -= 1;
    }
    Decimal::try_from_i128_with_scale(reduced as i128, scale)
        .unwrap_or(Decimal::MAX)
        .normalize()
}

/// Inverse of `price_from_raw`, for fixtures and snapshot builders:
/// a human USD price into the 10^(30 - decimals) raw basis.
pub fn raw_price_from_usd(price: Decimal, token_decimals: u8) -> Option<u128> {
    if price.is_sign_negative() {
        return None;
    }
    let normalized = price.normalize();
    let mantissa = normalized.mantissa() as u128;
    let scale = normalized.scale();
    let target = 30u32.checked_sub(u32::from(token_decimals))?;
    let exponent = target.checked_sub(scale)?;
    10u128
        .checked_pow(exponent)
        .and_then(|unit| mantissa.checked_mul(unit))
}
