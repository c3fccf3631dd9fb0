//! Property-Based Tests — Domain Layer Invariants
//!
//! Uses `proptest` to verify that ladder generation, price
//! quantization, pool pricing, and slippage floors hold their
//! invariants across random inputs.

use proptest::prelude::*;
use rust_decimal::Decimal;

use amm_ladder_bot::domain::amount::Amount;
use amm_ladder_bot::domain::ladder::{LadderParams, PriceFraction, generate_ladder};
use amm_ladder_bot::domain::pool::PoolParams;
use amm_ladder_bot::usecases::swap_executor::minimum_out;

/// Spot prices in [0.01, 100] with six decimals.
fn spot_strategy() -> impl Strategy<Value = Decimal> {
    (10_000i64..=100_000_000).prop_map(|n| Decimal::new(n, 6))
}

/// Ladder shapes whose deepest bucket stays above zero.
fn params_strategy() -> impl Strategy<Value = LadderParams> {
    (1i64..=10, 1u32..=50, 1i64..=10_000_000).prop_map(|(inc, count, size)| LadderParams {
        unit_size: Decimal::new(size, 7),
        bucket_increment: Decimal::new(inc, 3),
        bucket_count: count,
    })
}

// ── Ladder Properties ───────────────────────────────────────

proptest! {
    /// Deeper buckets always rest at strictly lower prices, before and after quantization.
    #[test]
    fn ladder_prices_strictly_decrease(spot in spot_strategy(), params in params_strategy()) {
        let ladder = generate_ladder(spot, &params).unwrap();
        for pair in ladder.windows(2) {
            prop_assert!(pair[0].target_price > pair[1].target_price);
            prop_assert!(
                pair[0].price_fraction.numerator > pair[1].price_fraction.numerator,
                "bucket {} and {} quantize to the same price",
                pair[0].bucket_index,
                pair[1].bucket_index
            );
        }
    }

    /// One bucket per index, every bucket below spot with the configured size.
    #[test]
    fn ladder_shape_matches_params(spot in spot_strategy(), params in params_strategy()) {
        let ladder = generate_ladder(spot, &params).unwrap();
        prop_assert_eq!(ladder.len(), params.bucket_count as usize);
        for (i, bucket) in ladder.iter().enumerate() {
            prop_assert_eq!(bucket.bucket_index as usize, i + 1);
            prop_assert_eq!(bucket.size, params.unit_size);
            prop_assert!(bucket.target_price < spot);
            prop_assert!(bucket.target_price > Decimal::ZERO);
        }
    }

    /// Quantization lands within half a price unit of the target and is repeatable.
    #[test]
    fn quantization_is_nearest_and_deterministic(spot in spot_strategy(), params in params_strategy()) {
        let half_unit = Decimal::new(5, 8);
        let ladder = generate_ladder(spot, &params).unwrap();
        let again = generate_ladder(spot, &params).unwrap();
        prop_assert_eq!(&ladder, &again);

        for bucket in &ladder {
            let quantized = bucket.price_fraction.to_decimal();
            prop_assert!((quantized - bucket.target_price).abs() <= half_unit);
            prop_assert_eq!(PriceFraction::from_price(quantized).unwrap(), bucket.price_fraction);
        }
    }
}

// ── Pool Pricing Properties ─────────────────────────────────

proptest! {
    /// Scaling both reserves by the same factor leaves the spot price unchanged.
    #[test]
    fn spot_price_depends_on_reserve_ratio(
        a in 1u128..1_000_000_000_000,
        b in 1u128..1_000_000_000_000,
        k in 2u128..1000,
    ) {
        let pool = PoolParams::default();
        let base = pool.spot_price(Amount::from_units(a), Amount::from_units(b)).unwrap();
        let scaled = pool.spot_price(Amount::from_units(a * k), Amount::from_units(b * k)).unwrap();
        prop_assert!((base - scaled).abs() <= base * Decimal::new(1, 15));
    }

    /// The fee adjustment never lowers the price.
    #[test]
    fn fee_adjusted_spot_is_at_least_base(
        a in 1u128..1_000_000_000_000,
        b in 1u128..1_000_000_000_000,
    ) {
        let pool = PoolParams::default();
        let (ra, rb) = (Amount::from_units(a), Amount::from_units(b));
        prop_assert!(pool.spot_price(ra, rb).unwrap() >= pool.base_price(ra, rb).unwrap());
    }
}

// ── Slippage Floor Properties ───────────────────────────────

proptest! {
    /// The floor equals the integer floor of `estimate * (100 - slippage) / 100`.
    #[test]
    fn minimum_out_is_exact_floor(
        estimate in 0u128..1_000_000_000_000_000,
        slippage_bp in 0u128..10_000,
    ) {
        let slippage = Decimal::new(i64::try_from(slippage_bp).unwrap(), 2);
        let floor = minimum_out(Amount::from_units(estimate), slippage).unwrap();

        prop_assert!(floor.units() <= estimate);
        prop_assert_eq!(floor.units(), estimate * (10_000 - slippage_bp) / 10_000);
    }
}
