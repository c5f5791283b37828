//! Benchmarks for moving average implementations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use trading_core::traits::Indicator;
use trading_core::types::Bar;
use trading_indicators::{moving_average, Sma};

fn generate_test_data(size: usize) -> Vec<Decimal> {
    (0..size)
        .map(|i| Decimal::new(10_000 + ((i * 37) % 1_000) as i64, 2))
        .collect()
}

fn benchmark_sma(c: &mut Criterion) {
    let mut group = c.benchmark_group("SMA");

    for size in [1000, 10000].iter() {
        let data = generate_test_data(*size);

        group.bench_with_input(BenchmarkId::new("series", size), &data, |b, data| {
            let sma = Sma::new(20).unwrap();
            b.iter(|| sma.calculate(black_box(data)))
        });
    }

    group.finish();
}

fn benchmark_moving_average(c: &mut Criterion) {
    let mut group = c.benchmark_group("moving_average");

    for window in [20, 50, 200].iter() {
        let bars: Vec<Bar> = generate_test_data(500)
            .into_iter()
            .enumerate()
            .map(|(i, close)| Bar::from_close(i as i64, close))
            .collect();

        group.bench_with_input(BenchmarkId::new("last_window", window), &bars, |b, bars| {
            b.iter(|| moving_average(black_box(bars), black_box(*window)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_sma, benchmark_moving_average);
criterion_main!(benches);
