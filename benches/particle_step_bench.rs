//! Benchmarks for a full particle step.
//!
//! Run with: `cargo bench --bench particle_step_bench`
//!
//! Compares advection schemes and the cost of dispersion and coastline
//! handling on a 3-D dataset.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use roms_drift::action::{
    ActionContext, ActionSet, Advection, AdvectionScheme, AgeMonitoring, CoastlineBehavior, HorizontalDispersion,
    MoveAction, VerticalDispersion,
};
use roms_drift::dataset::{AnalyticSourceBuilder, Dataset, MemorySource, RomsDataset};
use roms_drift::grid::RectilinearGridBuilder;
use roms_drift::particle::Particle;
use roms_drift::simulation::Population;
use roms_drift::time::{Calendar, TimeArrow};
use roms_drift::types::GridPos;
use roms_drift::vertical::{SCoordinate, UniformStretching, VerticalTransform};
use roms_drift::zone::ZoneManager;

/// 60 x 60 basin, 20 levels, land along the eastern edge.
fn dataset() -> RomsDataset<MemorySource> {
    let grid = RectilinearGridBuilder::new(3.0, 3.6, 43.0, 43.6)
        .with_resolution(60, 60)
        .with_constant_depth(80.0)
        .with_land(|i, _| i >= 52)
        .build()
        .expect("valid grid");
    let sc = SCoordinate::from_stretching(20, VerticalTransform::Old, 0.0, &UniformStretching).expect("valid levels");
    let source = AnalyticSourceBuilder::new(grid)
        .with_s_coordinate(sc)
        .with_records(0.0, 3600.0, 4)
        .with_velocity(|_, lat, depth, _| (0.2 + depth / 800.0, 0.05 * (lat - 43.3)))
        .with_tracer("AKt", |_, _, depth, _| 1e-3 * (1.0 + depth / 80.0).max(1e-2))
        .build();
    let mut ds = RomsDataset::new(source).expect("valid dataset");
    ds.require_variable("AKt");
    ds.setup(0.0, TimeArrow::Forward).expect("records bracket t0");
    ds
}

fn population(ds: &dyn Dataset, actions: &ActionSet, zones: &ZoneManager, n: usize) -> Population {
    let mut population = Population::new();
    population.extend((0..n).map(|k| {
        let phase = k as f64 * 0.61;
        let pos = GridPos::new(
            5.0 + 40.0 * (0.5 + 0.5 * phase.sin()),
            5.0 + 50.0 * (0.5 + 0.5 * phase.cos()),
            10.0,
        );
        let mut p = Particle::from_grid(k, pos, 0.0, 42);
        p.point_mut().grid2geo(ds);
        actions.init_particle(&mut p, ds, zones);
        p
    }));
    population
}

fn system() -> (AgeMonitoring, MoveAction) {
    (AgeMonitoring::new(30.0 * 86_400.0, false), MoveAction::new(CoastlineBehavior::Bouncing))
}

fn bench_advection(c: &mut Criterion) {
    let mut group = c.benchmark_group("advection_step");
    let ds = dataset();
    let zones = ZoneManager::new();
    let ctx = ActionContext::new(&ds, &zones, 0.0, 600.0, Calendar::Gregorian);

    for scheme in [AdvectionScheme::Euler, AdvectionScheme::Rk4] {
        let (age, movement) = system();
        let actions = ActionSet::new(age, movement).with_action(Advection::new(scheme));
        let name = format!("{scheme:?}").to_lowercase();

        group.bench_with_input(BenchmarkId::new(name, 1000), &scheme, |b, _| {
            b.iter_batched(
                || population(&ds, &actions, &zones, 1000),
                |mut pop| {
                    pop.step(black_box(&actions), black_box(&ctx)).expect("step");
                    pop
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_full_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_step");
    let ds = dataset();
    let zones = ZoneManager::new();
    let ctx = ActionContext::new(&ds, &zones, 0.0, 600.0, Calendar::Gregorian);

    let (age, movement) = system();
    let actions = ActionSet::new(age, movement)
        .with_action(Advection::default())
        .with_action(HorizontalDispersion::new(1e-9))
        .with_action(VerticalDispersion::new("AKt"));

    for n in [100, 1000] {
        group.bench_with_input(BenchmarkId::new("advection_dispersion", n), &n, |b, &n| {
            b.iter_batched(
                || population(&ds, &actions, &zones, n),
                |mut pop| {
                    pop.step(black_box(&actions), black_box(&ctx)).expect("step");
                    pop
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_advection, bench_full_step);
criterion_main!(benches);
