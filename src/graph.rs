//! Market graph: the per-chain snapshot of tokens and markets.
//!
//! Built once per session from snapshot sources and treated as immutable
//! afterwards, so it is freely shareable across threads. Symbol resolution,
//! market lookup by index token, and swap-route discovery all live here.

use crate::config::ChainConfig;
use crate::types::{Address, Chain, Market, TokenMetadata};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Snapshot source for token metadata. Implementations fetch over the
/// network and are out of scope here.
pub trait TokenMetadataSource {
    fn tokens(&self, chain: Chain) -> HashMap<Address, TokenMetadata>;
}

/// Snapshot source for the market registry.
pub trait MarketRegistrySource {
    fn markets(&self, chain: Chain) -> HashMap<Address, Market>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("unknown token: {token}")]
    UnknownToken { token: String },

    #[error("duplicate symbol {symbol} in snapshot: {first} and {second}")]
    DuplicateSymbol {
        symbol: String,
        first: Address,
        second: Address,
    },

    #[error("no swap route from {from} to {to}")]
    NoRoute { from: Address, to: Address },
}

/// A discovered swap route: 0, 1, or 2 markets, hubbed on the quote asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRoute {
    pub path: Vec<Address>,
    pub multi_hop: bool,
}

impl SwapRoute {
    pub fn direct() -> Self {
        Self {
            path: Vec::new(),
            multi_hop: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketGraph {
    chain: Chain,
    config: ChainConfig,
    tokens_by_address: HashMap<Address, TokenMetadata>,
    address_by_symbol: HashMap<String, Address>,
    markets_by_index_token: HashMap<Address, Market>,
    markets_by_address: HashMap<Address, Market>,
}

impl MarketGraph {
    /// Builds the snapshot indices. Fails on symbol collision: two listings
    /// under one symbol in a single chain snapshot is a data bug, and a
    /// silent first-wins pick would route orders to the wrong token.
    pub fn load(
        chain: Chain,
        tokens: impl IntoIterator<Item = TokenMetadata>,
        markets: impl IntoIterator<Item = Market>,
    ) -> Result<Self, GraphError> {
        let config = ChainConfig::for_chain(chain);

        let mut tokens_by_address = HashMap::new();
        let mut address_by_symbol: HashMap<String, Address> = HashMap::new();
        for token in tokens {
            let symbol = token.symbol.to_ascii_uppercase();
            if let Some(&existing) = address_by_symbol.get(&symbol) {
                if existing != token.address {
                    return Err(GraphError::DuplicateSymbol {
                        symbol: token.symbol,
                        first: existing,
                        second: token.address,
                    });
                }
            }
            address_by_symbol.insert(symbol, token.address);
            tokens_by_address.insert(token.address, token);
        }

        let mut markets_by_index_token = HashMap::new();
        let mut markets_by_address = HashMap::new();
        for market in markets {
            markets_by_index_token.insert(market.index_token_address, market.clone());
            markets_by_address.insert(market.market_address, market);
        }

        debug!(
            %chain,
            tokens = tokens_by_address.len(),
            markets = markets_by_address.len(),
            "market graph loaded"
        );

        Ok(Self {
            chain,
            config,
            tokens_by_address,
            address_by_symbol,
            markets_by_index_token,
            markets_by_address,
        })
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Resolves a symbol or address literal to a token address, applying the
    /// chain alias table. Address literals pass through (aliased as well).
    pub fn resolve_token(&self, input: &str) -> Result<Address, GraphError> {
        let address = if Address::looks_like_address(input) {
            Address::from_hex(input).map_err(|_| GraphError::UnknownToken {
                token: input.to_string(),
            })?
        } else {
            *self
                .address_by_symbol
                .get(&input.to_ascii_uppercase())
                .ok_or_else(|| GraphError::UnknownToken {
                    token: input.to_string(),
                })?
        };
        Ok(self.config.apply_alias(address))
    }

    pub fn token(&self, address: Address) -> Result<&TokenMetadata, GraphError> {
        self.tokens_by_address
            .get(&address)
            .ok_or_else(|| GraphError::UnknownToken {
                token: address.to_string(),
            })
    }

    pub fn token_decimals(&self, address: Address) -> Result<u8, GraphError> {
        self.token(address).map(|t| t.decimals)
    }

    pub fn market_for_index_token(&self, index_token: Address) -> Option<&Market> {
        self.markets_by_index_token.get(&index_token)
    }

    pub fn market_by_address(&self, market: Address) -> Option<&Market> {
        self.markets_by_address.get(&market)
    }

    /// Swap-route discovery via the chain's quote asset.
    pub fn find_swap_route(&self, from: Address, to: Address) -> Result<SwapRoute, GraphError> {
        self.find_swap_route_via(from, to, self.config.quote_token)
    }

    /// Route `from` -> `to` hubbed on `quote`:
    /// same token: empty path; one leg touching the quote asset: single hop
    /// through the other leg's market; anything else: two hops via the quote.
    pub fn find_swap_route_via(
        &self,
        from: Address,
        to: Address,
        quote: Address,
    ) -> Result<SwapRoute, GraphError> {
        if from == to {
            return Ok(SwapRoute::direct());
        }

        let no_route = || GraphError::NoRoute { from, to };

        if from == quote {
            let market = self.market_for_index_token(to).ok_or_else(no_route)?;
            return Ok(SwapRoute {
                path: vec![market.market_address],
                multi_hop: false,
            });
        }

        if to == quote {
            let market = self.market_for_index_token(from).ok_or_else(no_route)?;
            return Ok(SwapRoute {
                path: vec![market.market_address],
                multi_hop: false,
            });
        }

        let first = self.market_for_index_token(from).ok_or_else(no_route)?;
        let second = self.market_for_index_token(to).ok_or_else(no_route)?;
        Ok(SwapRoute {
            path: vec![first.market_address, second.market_address],
            multi_hop: true,
        })
    }
}
