//! Resolver simulation.
//!
//! Walks the full client-side lifecycle against an in-memory chain snapshot:
//! intent resolution with each input combination, swap-route discovery,
//! liquidation estimates, and position decoding from both source shapes.

use perps_resolver::*;
use rust_decimal_macros::dec;
use std::collections::HashMap;

use perps_resolver::config::known;
use perps_resolver::oracle::raw_price_from_usd;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perps_resolver=info".into()),
        )
        .init();

    println!("Perps Resolver Simulation");
    println!("Arbitrum snapshot, in-memory oracle, full resolution lifecycle\n");

    let graph = build_graph();
    let prices = build_prices(&graph);

    scenario_1_leverage_intent(&graph, &prices);
    scenario_2_swap_routes(&graph, &prices);
    scenario_3_rejections(&graph, &prices);
    scenario_4_liquidation_estimates();
    scenario_5_position_decoding(&graph, &prices);

    println!("\nAll scenarios completed successfully.");
}

fn build_graph() -> MarketGraph {
    let tokens = [
        TokenMetadata::new("WETH", known::arbitrum_weth(), 18),
        TokenMetadata::new("WBTC", known::arbitrum_wbtc(), 8),
        TokenMetadata::new("USDC", known::arbitrum_usdc(), 6),
    ];
    let markets = [
        Market {
            market_address: Address([0xAA; 20]),
            index_token_address: known::arbitrum_weth(),
            long_token_address: known::arbitrum_weth(),
            short_token_address: known::arbitrum_usdc(),
            symbol: "ETH/USD".to_string(),
        },
        Market {
            market_address: Address([0xBB; 20]),
            index_token_address: known::arbitrum_wbtc(),
            long_token_address: known::arbitrum_wbtc(),
            short_token_address: known::arbitrum_usdc(),
            symbol: "BTC/USD".to_string(),
        },
    ];
    MarketGraph::load(Chain::Arbitrum, tokens, markets).expect("static snapshot")
}

struct StaticPrices(HashMap<Address, OraclePriceSample>);

impl OraclePriceSource for StaticPrices {
    fn recent_prices(&self) -> HashMap<Address, OraclePriceSample> {
        self.0.clone()
    }
}

fn build_prices(graph: &MarketGraph) -> PriceBook {
    let mut samples = HashMap::new();
    for (token, usd, decimals) in [
        (known::arbitrum_weth(), dec!(3000), 18u8),
        (known::arbitrum_wbtc(), dec!(60000), 8),
        (known::arbitrum_usdc(), dec!(1), 6),
    ] {
        let raw = raw_price_from_usd(usd, decimals).expect("static price");
        samples.insert(
            token,
            OraclePriceSample {
                token_address: token,
                min_price_raw: raw,
                max_price_raw: raw,
                timestamp: Timestamp::now(),
            },
        );
    }
    PriceBook::from_source(&StaticPrices(samples), graph.config())
}

/// The headline flow: "open a 2x long on ETH with $10 of USDC".
fn scenario_1_leverage_intent(graph: &MarketGraph, prices: &PriceBook) {
    println!("Scenario 1: Leverage Intent Resolution\n");

    let intent = OrderIntent::increase(Side::Long)
        .on_chain(Chain::Arbitrum)
        .index("ETH")
        .collateral("USDC")
        .collateral_amount(dec!(10))
        .leverage(dec!(2));

    let resolved = resolve(&intent, graph, prices).expect("resolvable intent");

    println!("  Market: {}", resolved.market_address);
    println!("  Size: ${} ({} raw)", resolved.size_delta_usd, resolved.size_delta_raw);
    println!(
        "  Collateral: {} USDC ({} raw)",
        resolved.initial_collateral_delta, resolved.initial_collateral_delta_raw
    );
    println!("  Leverage: {}x", resolved.leverage);
    println!("  Acceptable price: ${}\n", resolved.acceptable_price);
}

/// Swap-path discovery for every hop count.
fn scenario_2_swap_routes(graph: &MarketGraph, prices: &PriceBook) {
    println!("Scenario 2: Swap Route Discovery\n");

    for (label, start) in [("USDC (no swap)", "USDC"), ("WETH (one hop)", "WETH")] {
        let intent = OrderIntent::increase(Side::Long)
            .on_chain(Chain::Arbitrum)
            .index("ETH")
            .collateral("USDC")
            .start(start)
            .size(dec!(500))
            .leverage(dec!(5));
        let resolved = resolve(&intent, graph, prices).expect("resolvable intent");
        println!("  start {label}: path length {}", resolved.swap_path.len());
    }

    let route = graph
        .find_swap_route(known::arbitrum_wbtc(), known::arbitrum_weth())
        .expect("two-hop route");
    println!(
        "  WBTC -> WETH: {} hops via quote asset, multi_hop = {}\n",
        route.path.len(),
        route.multi_hop
    );
}

/// Typed rejections carry the offending field so callers can correct input.
fn scenario_3_rejections(graph: &MarketGraph, prices: &PriceBook) {
    println!("Scenario 3: Fail-Fast Rejections\n");

    let over_levered = OrderIntent::increase(Side::Long)
        .on_chain(Chain::Arbitrum)
        .index("ETH")
        .collateral("USDC")
        .collateral_amount(dec!(10))
        .leverage(dec!(250));
    println!("  250x leverage: {}", resolve(&over_levered, graph, prices).unwrap_err());

    let dust = OrderIntent::increase(Side::Long)
        .on_chain(Chain::Arbitrum)
        .index("ETH")
        .collateral("USDC")
        .collateral_amount(dec!(1))
        .leverage(dec!(2));
    println!("  $1 collateral: {}", resolve(&dust, graph, prices).unwrap_err());

    let wrong_collateral = OrderIntent::increase(Side::Long)
        .on_chain(Chain::Arbitrum)
        .index("ETH")
        .collateral("WBTC")
        .collateral_amount(dec!(0.001))
        .leverage(dec!(2));
    println!(
        "  WBTC on ETH market: {}\n",
        resolve(&wrong_collateral, graph, prices).unwrap_err()
    );
}

/// Exact vs approximate liquidation estimates.
fn scenario_4_liquidation_estimates() {
    println!("Scenario 4: Liquidation Estimates\n");

    let approximate = LiquidationInputs::new(dec!(2000), dec!(1000), dec!(5000), Side::Long)
        .with_pending_fees(dec!(5), dec!(10));
    println!(
        "  5x ETH long from $2000 (approximate): liquidates near ${}",
        estimate_liquidation_price(&approximate)
    );

    let exact = LiquidationInputs::new(dec!(2000), dec!(1000), dec!(5000), Side::Long)
        .with_pending_fees(dec!(5), dec!(10))
        .with_collateral_tokens(dec!(1000), false);
    println!(
        "  same position (exact, USDC collateral): ${}",
        estimate_liquidation_price(&exact)
    );

    let short = LiquidationInputs::new(dec!(2000), dec!(1000), dec!(5000), Side::Short)
        .with_pending_fees(dec!(5), dec!(10));
    println!(
        "  5x short mirror: liquidates near ${}\n",
        estimate_liquidation_price(&short)
    );
}

/// Decoding both source shapes, plus the batch skip policy.
fn scenario_5_position_decoding(graph: &MarketGraph, prices: &PriceBook) {
    println!("Scenario 5: Position Decoding\n");

    let decoder = PositionDecoder::new(graph, prices);

    let onchain = OnChainPositionRecord::from_tuple(
        (
            Address([0x01; 20]),
            Address([0xAA; 20]),
            known::arbitrum_usdc(),
        ),
        (
            6000 * 10u128.pow(30),
            2 * 10u128.pow(18),
            1200 * 10u128.pow(6),
            0,
            0,
            0,
            0,
            0,
            1_700_000_000,
            0,
        ),
        (true,),
    );
    let position = decoder.decode(&onchain).expect("decodable record");
    println!(
        "  onchain: {} {} {}x, entry ${}, mark ${}, pnl {}%",
        position.market_symbol,
        position.side,
        position.leverage.round_dp(2),
        position.entry_price,
        position.mark_price,
        position.percent_profit.round_dp(2)
    );

    let indexed = IndexerPositionRecord {
        account: Address([0x01; 20]),
        market: Address([0xAA; 20]),
        collateral_token: known::arbitrum_usdc(),
        size_in_usd: (6000 * 10u128.pow(30)).to_string(),
        size_in_tokens: (2 * 10u128.pow(18)).to_string(),
        collateral_amount: (1200 * 10u128.pow(6)).to_string(),
        entry_price: (3000 * 10u128.pow(12)).to_string(),
        leverage: "50000".to_string(),
        is_long: true,
        increased_at_time: 1_700_000_000,
        decreased_at_time: 0,
    };
    let position = decoder.decode(&indexed).expect("decodable record");
    println!(
        "  indexer: {} {} {}x, accumulators approximate = {}",
        position.market_symbol, position.side, position.leverage, position.fees.approximate
    );

    let mut bad = onchain.clone();
    bad.collateral_token = Address([0xEE; 20]);
    let batch = decoder.decode_batch(&[onchain.clone(), bad, onchain]);
    println!("  batch of 3 with 1 unknown token: {} decoded\n", batch.len());

    let live_size = 6000 * 10u128.pow(30);
    let requested = live_size + 13; // upstream float corruption artifact
    let capped = cap_to_ceiling(requested, live_size, "close_size");
    println!(
        "  close-size cap: requested {} -> submitted {}",
        requested, capped
    );
}
