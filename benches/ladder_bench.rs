//! Ladder Benchmarks — Hot-Path Performance Validation
//!
//! Benchmarks the domain functions that run on every price change:
//! pool spot pricing, ladder generation, and the swap slippage floor.
//!
//! Run with: cargo bench --bench ladder_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal_macros::dec;

use amm_ladder_bot::domain::amount::Amount;
use amm_ladder_bot::domain::ladder::{generate_ladder, LadderParams, PriceFraction};
use amm_ladder_bot::domain::pool::PoolParams;
use amm_ladder_bot::usecases::swap_executor::minimum_out;

/// Benchmark fee-adjusted spot price from two reserves.
fn bench_spot_price(c: &mut Criterion) {
    let pool = PoolParams::default();
    let reserve_a = Amount::from_units(10_000_000_000);
    let reserve_b = Amount::from_units(20_000_000_000);

    c.bench_function("pool_spot_price", |b| {
        b.iter(|| {
            let _spot = pool.spot_price(black_box(reserve_a), black_box(reserve_b));
        });
    });
}

/// Benchmark the reference 10-bucket ladder.
fn bench_generate_ladder(c: &mut Criterion) {
    let params = LadderParams {
        unit_size: dec!(0.05),
        bucket_increment: dec!(0.005),
        bucket_count: 10,
    };

    c.bench_function("generate_ladder_10", |b| {
        b.iter(|| {
            let _ladder = generate_ladder(black_box(dec!(1.5)), black_box(&params));
        });
    });
}

/// Benchmark price quantization alone.
fn bench_quantize(c: &mut Criterion) {
    c.bench_function("price_fraction_quantize", |b| {
        b.iter(|| {
            let _fraction = PriceFraction::from_price(black_box(dec!(0.49899999951)));
        });
    });
}

/// Benchmark the slippage floor on a swap estimate.
fn bench_minimum_out(c: &mut Criterion) {
    let estimate = Amount::from_units(4_900_000);

    c.bench_function("swap_minimum_out", |b| {
        b.iter(|| {
            let _floor = minimum_out(black_box(estimate), black_box(dec!(1)));
        });
    });
}

criterion_group!(
    benches,
    bench_spot_price,
    bench_generate_ladder,
    bench_quantize,
    bench_minimum_out,
);
criterion_main!(benches);
