//! Property-based tests for the precision and resolution invariants.
//!
//! These tests verify invariants hold under random inputs.

use perps_resolver::config::known;
use perps_resolver::oracle::raw_price_from_usd;
use perps_resolver::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

fn snapshot() -> MarketGraph {
    MarketGraph::load(
        Chain::Arbitrum,
        [
            TokenMetadata::new("WETH", known::arbitrum_weth(), 18),
            TokenMetadata::new("WBTC", known::arbitrum_wbtc(), 8),
            TokenMetadata::new("USDC", known::arbitrum_usdc(), 6),
        ],
        [
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
        ],
    )
    .unwrap()
}

fn price_book(graph: &MarketGraph) -> PriceBook {
    let mut samples = HashMap::new();
    for (token, usd, decimals) in [
        (known::arbitrum_weth(), dec!(3000), 18u8),
        (known::arbitrum_wbtc(), dec!(60000), 8),
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
    PriceBook::from_samples(samples, graph.config())
}

// Strategies for generating test data
fn snapshot_token() -> impl Strategy<Value = Address> {
    prop_oneof![
        Just(known::arbitrum_weth()),
        Just(known::arbitrum_wbtc()),
        Just(known::arbitrum_usdc()),
    ]
}

fn collateral_tokens_strategy() -> impl Strategy<Value = Decimal> {
    (3i64..1_000_000i64).prop_map(|x| Decimal::new(x, 0)) // $3 to $1M of USDC
}

fn leverage_strategy() -> impl Strategy<Value = Decimal> {
    (1u32..=100u32).prop_map(Decimal::from)
}

proptest! {
    /// Any odd integer above 2^53 is corrupted by an f64 round trip.
    #[test]
    fn odd_wide_integers_never_round_trip(half in (1u64 << 52)..(1u64 << 62)) {
        let value = (half as u128) * 2 + 1; // odd, > 2^53
        prop_assert!(!float_round_trips(value));
        prop_assert!(ensure_float_safe(value, "x").is_err());
    }

    /// Values within the mantissa always survive.
    #[test]
    fn narrow_integers_always_round_trip(value in 0u64..(1u64 << 53)) {
        prop_assert!(float_round_trips(value as u128));
    }

    /// The cap never exceeds the ceiling and passes small values through.
    #[test]
    fn cap_respects_ceiling(requested in any::<u128>(), ceiling in any::<u128>()) {
        let capped = cap_to_ceiling(requested, ceiling, "x");
        prop_assert!(capped <= ceiling);
        if requested <= ceiling {
            prop_assert_eq!(capped, requested);
        }
    }

    /// USD wire formatting round-trips exactly through the 10^30 basis.
    #[test]
    fn usd_wire_round_trip(micros in 1i64..1_000_000_000_000i64) {
        let usd = Decimal::new(micros, 6);
        let raw = precision::raw_from_usd(usd, "x").unwrap();
        prop_assert_eq!(precision::usd_from_raw(raw), usd);
    }

    /// Swap routes are never longer than two hops.
    #[test]
    fn routes_are_at_most_two_hops(from in snapshot_token(), to in snapshot_token()) {
        let graph = snapshot();
        let route = graph.find_swap_route(from, to).unwrap();
        prop_assert!(route.path.len() <= 2);
        if from == to {
            prop_assert!(route.path.is_empty());
        }
        prop_assert_eq!(route.multi_hop, route.path.len() == 2);
    }

    /// Resolved leverage always equals size / collateral value, whichever
    /// two of the three amounts the caller supplied.
    #[test]
    fn resolved_leverage_invariant(
        collateral in collateral_tokens_strategy(),
        leverage in leverage_strategy(),
    ) {
        let graph = snapshot();
        let prices = price_book(&graph);
        let base = || {
            OrderIntent::increase(Side::Long)
                .on_chain(Chain::Arbitrum)
                .index("ETH")
                .collateral("USDC")
        };
        let size = leverage * collateral; // USDC is $1

        let from_pair = resolve(&base().collateral_amount(collateral).leverage(leverage), &graph, &prices).unwrap();
        let from_size = resolve(&base().size(size).leverage(leverage), &graph, &prices).unwrap();
        let from_amounts = resolve(&base().size(size).collateral_amount(collateral), &graph, &prices).unwrap();

        for resolved in [from_pair, from_size, from_amounts] {
            let implied = resolved.size_delta_usd / resolved.collateral_usd;
            let error = (implied - resolved.leverage).abs();
            prop_assert!(
                error <= dec!(0.000000001) * resolved.leverage,
                "leverage {} vs implied {}", resolved.leverage, implied
            );
        }
    }

    /// Liquidation estimates are never negative.
    #[test]
    fn liquidation_price_never_negative(
        entry in 1i64..1_000_000i64,
        collateral in 0i64..100_000i64,
        size in 1i64..1_000_000i64,
        is_long in any::<bool>(),
        funding in 0i64..10_000i64,
    ) {
        let inputs = LiquidationInputs::new(
            Decimal::new(entry, 2),
            Decimal::new(collateral, 2),
            Decimal::new(size, 2),
            Side::from_is_long(is_long),
        )
        .with_pending_fees(Decimal::new(funding, 2), Decimal::ZERO);
        prop_assert!(estimate_liquidation_price(&inputs) >= Decimal::ZERO);
    }

    /// Long liquidation sits below entry, short above, whenever the
    /// position is solvent with margin to spare.
    #[test]
    fn liquidation_brackets_entry(
        entry in 100i64..1_000_000i64,
        leverage in 2u32..=50u32,
    ) {
        let entry_price = Decimal::new(entry, 2);
        let size = dec!(10000);
        let collateral = size / Decimal::from(leverage);

        let long = LiquidationInputs::new(entry_price, collateral, size, Side::Long);
        let short = LiquidationInputs::new(entry_price, collateral, size, Side::Short);

        prop_assert!(estimate_liquidation_price(&long) < entry_price);
        prop_assert!(estimate_liquidation_price(&short) > entry_price);
    }
}
