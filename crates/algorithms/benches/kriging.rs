//! Benchmarks for variogram estimation and kriging prediction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geokrige_algorithms::interpolation::{
    empirical_variogram, FittedVariogram, KrigingParams, OrdinaryKriging, VariogramModel,
    VariogramParams,
};
use geokrige_core::GeoCoord;

/// Deterministic scatter over a 2°×2° window with a smooth field
fn create_points(n: usize) -> (Vec<GeoCoord>, Vec<f64>) {
    (0..n)
        .map(|i| {
            let lon = 10.0 + ((i * 7919) % 1000) as f64 / 500.0;
            let lat = 45.0 + ((i * 104_729) % 997) as f64 / 498.5;
            let value = (lon * 3.0).sin() * (lat * 2.0).cos() + ((i * 13) % 17) as f64 * 0.01;
            (GeoCoord::new(lon, lat), value)
        })
        .unzip()
}

fn bench_empirical_variogram(c: &mut Criterion) {
    let mut group = c.benchmark_group("variogram/empirical");
    for n in [500, 2_000, 5_000] {
        let (coords, values) = create_points(n);
        let params = VariogramParams::default();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| empirical_variogram(black_box(&coords), black_box(&values), &params).unwrap())
        });
    }
    group.finish();
}

fn bench_kriging_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("kriging/predict_1000");
    let variogram = FittedVariogram::new(VariogramModel::Exponential, 0.05, 0.6, 40_000.0);
    // Offset so queries never coincide with samples
    let queries: Vec<GeoCoord> = create_points(1_000)
        .0
        .into_iter()
        .map(|c| GeoCoord::new(c.lon + 0.0007, c.lat + 0.0003))
        .collect();
    for k in [8, 16, 32] {
        let (coords, values) = create_points(5_000);
        let params = KrigingParams {
            max_neighbors: Some(k),
            max_radius_m: None,
        };
        let ok = OrdinaryKriging::new(coords, values, variogram.clone(), &params).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, _| {
            b.iter(|| ok.predict(black_box(&queries)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_empirical_variogram, bench_kriging_predict);
criterion_main!(benches);
