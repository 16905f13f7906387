use criterion::{black_box, criterion_group, criterion_main, Criterion};
use grid_models::{CoordinateSystem, GridOptions};
use nalgebra::DMatrix;
use storm_core::detect::label_regions;
use storm_core::steiner::{classify, SteinerOptions, CONVECTIVE};

/// Reflectivity with a few Gaussian cores over a 20 dBZ background.
fn make_field(n: usize) -> DMatrix<f64> {
    let cores = [(0.25, 0.3), (0.6, 0.7), (0.8, 0.2)];
    DMatrix::from_fn(n, n, |i, j| {
        let peak: f64 = cores
            .iter()
            .map(|&(r, c)| {
                let dr = i as f64 - r * n as f64;
                let dc = j as f64 - c * n as f64;
                30.0 * (-(dr * dr + dc * dc) / 20.0).exp()
            })
            .sum();
        20.0 + peak
    })
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("steiner");

    for n in [50, 100, 200] {
        let field = make_field(n);
        let cartesian = GridOptions::cartesian((n, n), (0.0, 0.0), [2500.0, 2500.0]);
        let (x, y) = cartesian.meshgrid();
        group.bench_function(format!("cartesian_{n}x{n}"), |b| {
            b.iter(|| {
                black_box(classify(
                    &field,
                    &x,
                    &y,
                    &SteinerOptions::default(),
                    CoordinateSystem::Cartesian,
                ))
            });
        });

        let geographic = GridOptions::geographic((n, n), (-15.0, 125.0), [0.025, 0.025]);
        let (lon, lat) = geographic.meshgrid();
        group.bench_function(format!("geographic_{n}x{n}"), |b| {
            b.iter(|| {
                let classes = classify(
                    &field,
                    &lon,
                    &lat,
                    &SteinerOptions::default(),
                    CoordinateSystem::Geographic,
                );
                black_box(label_regions((n, n), |i, j| classes[(i, j)] == CONVECTIVE))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
