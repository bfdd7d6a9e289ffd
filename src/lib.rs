// perps-resolver: order resolution and risk engine for onchain perpetuals.
// precision-first architecture: raw fixed-point integers never touch floats.
// all computation is deterministic over immutable per-chain snapshots.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Address, Chain, Side, Timestamp, Token, Market
//   2.x  precision.rs: float-corruption guard, exact wire conversions
//   3.x  graph.rs: per-chain market graph, symbol resolution, swap routes
//   4.x  oracle.rs: price samples, median mark price, fallback lookup
//   5.x  position.rs: normalized position entity, derived-field math
//   6.x  config.rs: per-chain tables: quote asset, aliases, stables
//   7.x  resolver.rs: partial intent -> wire-exact order parameters
//   8.x  liquidation.rs: exact + approximate liquidation price
//   9.x  decode.rs: onchain tuple / indexer record -> Position

// core resolution modules
pub mod graph;
pub mod precision;
pub mod resolver;
pub mod types;

// risk and decoding modules
pub mod decode;
pub mod liquidation;
pub mod position;

// integration modules
pub mod config;
pub mod oracle;

// re exports for convenience
pub use config::ChainConfig;
pub use decode::{
    DecodeError, IndexerPositionRecord, OnChainPositionRecord, PositionDecoder, PositionSource,
};
pub use graph::{
    GraphError, MarketGraph, MarketRegistrySource, SwapRoute, TokenMetadataSource,
};
pub use liquidation::{estimate_liquidation_price, LiquidationInputs};
pub use oracle::{OracleError, OraclePriceSample, OraclePriceSource, PriceBook};
pub use position::{FeeAccumulators, Position};
pub use precision::{
    cap_to_ceiling, ensure_float_safe, float_round_trips, is_raw_fixed_point, PrecisionError,
};
pub use resolver::{resolve, OrderIntent, OrderKind, ResolveError, ResolvedOrderParameters};
pub use types::{Address, Chain, Market, Side, Timestamp, TokenMetadata};
