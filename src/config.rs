// 6.0 config.rs: per-chain tables in one place. quote asset, wrapped-asset
// aliases, stable set, testnet oracle fallbacks. explicit and enumerable —
// never heuristic string matching on symbols.

use crate::types::{Address, Chain};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Arbitrum
const ARBITRUM_WETH: &str = "0x82af49447d8a07e3bd95bd0d56f35241523fbab1";
const ARBITRUM_WBTC: &str = "0x2f2a2543b76a4166549f7aab2e75bef0aefc5b0f";
const ARBITRUM_BTC_SYNTH: &str = "0x47904963fc8b2340414262125af798b9655e58cd";
const ARBITRUM_USDC: &str = "0xaf88d065e77c8cc2239327c5edb3a432268e5831";
const ARBITRUM_USDT: &str = "0xfd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9";
const ARBITRUM_DAI: &str = "0xda10009cbd5d07dd0cecc66161fc93d7c9000da1";

// Avalanche
const AVALANCHE_WAVAX: &str = "0xb31f66aa3c1e785363f0875a1b74e27b85fd66c7";
const AVALANCHE_BTCB: &str = "0x152b9d0fdc40c096757f570a51e494bd4b943e50";
const AVALANCHE_USDC: &str = "0xb97ef9ef8734c71904d8002f8b6bc66dd9c48a6e";

// Avalanche Fuji (testnet)
const FUJI_WAVAX: &str = "0x1d308089a2d1ced3f1ce36b1fcaf815b07217be3";
const FUJI_USDC: &str = "0x3ebdeaa0db3ffde96e7a0dbbafec961fc50f725f";

/// Per-chain resolution tables. Built once, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain: Chain,
    /// The designated stable swap hub between markets.
    pub quote_token: Address,
    /// canonical address -> chain-specific listing. Some markets rename
    /// wrapped assets (e.g. synthetic BTC lists under WBTC on Arbitrum).
    pub aliases: HashMap<Address, Address>,
    /// Tokens pegged to $1; used as the last-resort collateral price.
    pub stable_tokens: Vec<Address>,
    /// testnet token -> mainnet token for chains without their own oracle.
    pub oracle_fallbacks: HashMap<Address, Address>,
}

impl ChainConfig {
    pub fn for_chain(chain: Chain) -> Self {
        match chain {
            Chain::Arbitrum => Self::arbitrum(),
            Chain::Avalanche => Self::avalanche(),
            Chain::AvalancheFuji => Self::avalanche_fuji(),
        }
    }

    pub fn arbitrum() -> Self {
        Self {
            chain: Chain::Arbitrum,
            quote_token: addr(ARBITRUM_USDC),
            aliases: HashMap::from([(addr(ARBITRUM_BTC_SYNTH), addr(ARBITRUM_WBTC))]),
            stable_tokens: vec![
                addr(ARBITRUM_USDC),
                addr(ARBITRUM_USDT),
                addr(ARBITRUM_DAI),
            ],
            oracle_fallbacks: HashMap::new(),
        }
    }

    pub fn avalanche() -> Self {
        Self {
            chain: Chain::Avalanche,
            quote_token: addr(AVALANCHE_USDC),
            aliases: HashMap::new(),
            stable_tokens: vec![addr(AVALANCHE_USDC)],
            oracle_fallbacks: HashMap::new(),
        }
    }

    pub fn avalanche_fuji() -> Self {
        Self {
            chain: Chain::AvalancheFuji,
            quote_token: addr(FUJI_USDC),
            aliases: HashMap::new(),
            stable_tokens: vec![addr(FUJI_USDC)],
            oracle_fallbacks: HashMap::from([
                (addr(FUJI_WAVAX), addr(AVALANCHE_WAVAX)),
                (addr(FUJI_USDC), addr(AVALANCHE_USDC)),
            ]),
        }
    }

    /// Substitute the chain-specific listing for a canonical address.
    /// Identity when no alias is registered.
    pub fn apply_alias(&self, token: Address) -> Address {
        self.aliases.get(&token).copied().unwrap_or(token)
    }

    pub fn is_stable(&self, token: Address) -> bool {
        self.stable_tokens.contains(&token)
    }

    pub fn oracle_fallback(&self, token: Address) -> Option<Address> {
        self.oracle_fallbacks.get(&token).copied()
    }
}

// Preset addresses are compile-time literals; a bad one is a programmer error.
fn addr(hex: &str) -> Address {
    Address::from_hex(hex).expect("preset address literal")
}

/// Well-known addresses re-exported for snapshot builders and tests.
pub mod known {
    use super::*;

    pub fn arbitrum_weth() -> Address {
        addr(ARBITRUM_WETH)
    }
    pub fn arbitrum_wbtc() -> Address {
        addr(ARBITRUM_WBTC)
    }
    pub fn arbitrum_btc_synth() -> Address {
        addr(ARBITRUM_BTC_SYNTH)
    }
    pub fn arbitrum_usdc() -> Address {
        addr(ARBITRUM_USDC)
    }
    pub fn avalanche_wavax() -> Address {
        addr(AVALANCHE_WAVAX)
    }
    pub fn avalanche_btcb() -> Address {
        addr(AVALANCHE_BTCB)
    }
    pub fn avalanche_usdc() -> Address {
        addr(AVALANCHE_USDC)
    }
    pub fn fuji_wavax() -> Address {
        addr(FUJI_WAVAX)
    }
    pub fn fuji_usdc() -> Address {
        addr(FUJI_USDC)
    }
}
