//! Benchmarks for field interpolation at particle positions.
//!
//! Run with: `cargo bench --bench interpolation_bench`
//!
//! Compares velocity and tracer interpolation on depth-averaged and 3-D
//! datasets.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use roms_drift::dataset::{AnalyticSourceBuilder, Dataset, MemorySource, RomsDataset};
use roms_drift::grid::RectilinearGridBuilder;
use roms_drift::time::TimeArrow;
use roms_drift::types::GridPos;
use roms_drift::vertical::{SCoordinate, SongHaidvogelStretching, VerticalTransform};

/// 80 x 60 shelf, sloping from 20 m to 200 m, with a sheared current.
fn dataset(nz: usize) -> RomsDataset<MemorySource> {
    let grid = RectilinearGridBuilder::new(-5.0, -4.2, 47.0, 47.6)
        .with_resolution(80, 60)
        .with_depth(|lon, _| 20.0 + 180.0 * (lon + 5.0) / 0.8)
        .build()
        .expect("valid grid");
    let mut builder = AnalyticSourceBuilder::new(grid)
        .with_records(0.0, 3600.0, 4)
        .with_velocity(|lon, lat, depth, t| {
            let shear = 1.0 + depth / 200.0;
            (0.3 * shear * (lat - 47.0).cos(), 0.1 * (lon + 5.0).sin() + 1e-6 * t)
        })
        .with_tracer("temp", |_, _, depth, _| 12.0 + depth / 25.0);
    if nz > 1 {
        let stretching = SongHaidvogelStretching::new(5.0, 0.4);
        let sc = SCoordinate::from_stretching(nz, VerticalTransform::Old, 10.0, &stretching).expect("valid levels");
        builder = builder.with_s_coordinate(sc);
    }
    let mut ds = RomsDataset::new(builder.build()).expect("valid dataset");
    ds.require_variable("temp");
    ds.setup(0.0, TimeArrow::Forward).expect("records bracket t0");
    ds
}

/// Positions spread over the interior of the grid.
fn positions(n: usize, nz: usize) -> Vec<GridPos> {
    (0..n)
        .map(|k| {
            let phase = k as f64 * 0.37;
            GridPos::new(
                2.0 + 75.0 * (0.5 + 0.5 * phase.sin()),
                2.0 + 55.0 * (0.5 + 0.5 * (1.3 * phase).cos()),
                (nz as f64 - 1.0) * (0.5 + 0.5 * (0.7 * phase).sin()),
            )
        })
        .collect()
}

fn bench_velocity(c: &mut Criterion) {
    let mut group = c.benchmark_group("velocity");

    for nz in [1, 20, 40] {
        let ds = dataset(nz);
        let points = positions(1000, nz);

        group.bench_with_input(BenchmarkId::new("dux_dvy", nz), &nz, |b, _| {
            b.iter(|| {
                let mut total = 0.0;
                for p in &points {
                    total += ds.get_dux(black_box(*p), black_box(1800.0));
                    total += ds.get_dvy(black_box(*p), black_box(1800.0));
                }
                total
            });
        });

        if nz > 1 {
            group.bench_with_input(BenchmarkId::new("dwz", nz), &nz, |b, _| {
                b.iter(|| {
                    let mut total = 0.0;
                    for p in &points {
                        total += ds.get_dwz(black_box(*p), black_box(1800.0));
                    }
                    total
                });
            });
        }
    }

    group.finish();
}

fn bench_tracer_and_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracer");
    let nz = 30;
    let ds = dataset(nz);
    let points = positions(1000, nz);

    group.bench_function("temp", |b| {
        b.iter(|| {
            let mut total = 0.0;
            for p in &points {
                total += ds.get("temp", black_box(*p), black_box(1800.0)).unwrap_or(0.0);
            }
            total
        });
    });

    group.bench_function("z2depth_depth2z", |b| {
        b.iter(|| {
            let mut total = 0.0;
            for p in &points {
                let depth = ds.z2depth(p.x, p.y, black_box(p.z));
                total += ds.depth2z(p.x, p.y, black_box(depth));
            }
            total
        });
    });

    group.finish();
}

criterion_group!(benches, bench_velocity, bench_tracer_and_depth);
criterion_main!(benches);
