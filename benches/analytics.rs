//! Benchmarks for the analysis components on hourly series.

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use energy_analytics::core::TimeSeries;
use energy_analytics::detection::{AnomalyDetector, LofConfig, SpcConfig};
use energy_analytics::forecast::{Sarimax, SarimaxConfig, SarimaxOrder};
use energy_analytics::seasonality::Stl;
use energy_analytics::spectral::{spectrogram, SpectrogramConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn generate_hourly(n: usize) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(42);
    let values = (0..n)
        .map(|i| {
            let t = i as f64;
            1000.0
                + 0.01 * t
                + 150.0 * (2.0 * std::f64::consts::PI * t / 24.0).sin()
                + 60.0 * (2.0 * std::f64::consts::PI * t / 168.0).sin()
                + rng.gen_range(-20.0..20.0)
        })
        .collect();
    let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    TimeSeries::hourly(start, values).unwrap()
}

fn bench_decomposition(c: &mut Criterion) {
    let mut group = c.benchmark_group("stl");

    for size in [24 * 30, 24 * 90, 24 * 365].iter() {
        let ts = generate_hourly(*size);
        group.bench_with_input(BenchmarkId::new("plain", size), size, |b, _| {
            let stl = Stl::new(24).with_seasonal_window(13);
            b.iter(|| stl.decompose(black_box(&ts)))
        });
        group.bench_with_input(BenchmarkId::new("robust", size), size, |b, _| {
            let stl = Stl::new(24).with_seasonal_window(13).robust(true);
            b.iter(|| stl.decompose(black_box(&ts)))
        });
    }

    group.finish();
}

fn bench_spectrogram(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectrogram");
    let ts = generate_hourly(24 * 365);

    for window in [64, 256, 1024].iter() {
        let config = SpectrogramConfig::new(*window, window / 2);
        group.bench_with_input(BenchmarkId::from_parameter(window), window, |b, _| {
            b.iter(|| spectrogram(black_box(&ts), &config))
        });
    }

    group.finish();
}

fn bench_outliers(c: &mut Criterion) {
    let mut group = c.benchmark_group("outliers");

    for size in [24 * 30, 24 * 120].iter() {
        let ts = generate_hourly(*size);
        group.bench_with_input(BenchmarkId::new("spc", size), size, |b, _| {
            let detector = SpcConfig::default();
            b.iter(|| detector.detect(black_box(&ts)))
        });
        group.bench_with_input(BenchmarkId::new("lof", size), size, |b, _| {
            let detector = LofConfig::default();
            b.iter(|| detector.detect(black_box(&ts)))
        });
    }

    group.finish();
}

fn bench_forecast(c: &mut Criterion) {
    let mut group = c.benchmark_group("sarimax");
    group.sample_size(10);
    let ts = generate_hourly(24 * 28);

    let orders = [
        ("arima_111", SarimaxOrder::new(1, 1, 1)),
        ("sarima_111_100_24", SarimaxOrder::default()),
    ];
    for (name, order) in orders {
        let model = Sarimax::new(SarimaxConfig::new(order));
        group.bench_function(name, |b| b.iter(|| model.forecast(black_box(&ts), &[], 24)));
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_decomposition,
    bench_spectrogram,
    bench_outliers,
    bench_forecast
);
criterion_main!(benches);
