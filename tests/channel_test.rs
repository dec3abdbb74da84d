//! Integration tests on a straight channel with a uniform current.
//!
//! These tests verify:
//! - Transport distance of RK4 and Euler advection
//! - Backward runs
//! - Reproducibility from the seed
//! - Particles leaving the domain
//! - CSV trajectories

use roms_drift::config::TimeConfig;
use roms_drift::geodesy::{Coordinate, one_deg_longitude_in_meter};
use roms_drift::vertical::UniformStretching;
use roms_drift::{
    Advection, AdvectionScheme, AnalyticSourceBuilder, HorizontalDispersion, MemorySource, Mortality,
    OutputConfig, RectilinearGridBuilder, ReleaseMethod, SCoordinate, Simulation, SimulationConfig, TimeArrow,
    VerticalTransform,
};

const LAT: f64 = 45.1;

/// 0.01° channel from 0° to 0.5° E, 50 m deep, 10 levels, 4 days of hourly
/// records from 1900-01-01.
fn channel(u: f64) -> MemorySource {
    let grid = RectilinearGridBuilder::new(0.0, 0.5, 45.0, 45.2)
        .with_resolution(51, 21)
        .with_constant_depth(50.0)
        .build()
        .unwrap();
    let sc = SCoordinate::from_stretching(10, VerticalTransform::Old, 0.0, &UniformStretching).unwrap();
    AnalyticSourceBuilder::new(grid)
        .with_s_coordinate(sc)
        .with_records(0.0, 3600.0, 96)
        .with_uniform_velocity(u, 0.0)
        .with_tracer("temp", |_, _, depth, _| 15.0 + depth / 50.0)
        .build()
}

fn config(lon: f64, start: &str, duration: &str) -> SimulationConfig {
    let mut output = OutputConfig::default();
    output.enabled = false;
    SimulationConfig::default()
        .with_seed(11)
        .with_time(TimeConfig::new(start, 1800.0, duration))
        .with_release(ReleaseMethod::Stain {
            number_particles: 40,
            lon: Coordinate(lon),
            lat: Coordinate(LAT),
            depth: 10.0,
            radius: 500.0,
            thickness: 0.0,
        })
        .with_output(output)
}

fn mean_lon(sim: &Simulation<MemorySource>) -> f64 {
    let particles = sim.population().particles();
    particles.iter().map(|p| p.geo().lon).sum::<f64>() / particles.len() as f64
}

fn degrees(meters: f64) -> f64 {
    meters / one_deg_longitude_in_meter(LAT)
}

#[test]
fn test_uniform_transport_rk4() {
    let cfg = config(0.1, "year 1900 month 01 day 01 at 00:00", "0001 day(s) 00 hour(s) 00 minute(s)");
    let mut sim = Simulation::new(cfg, channel(0.2)).unwrap();
    let result = sim.run();

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.n_steps, 48);
    assert_eq!(result.n_alive, 40);

    let expected = 0.1 + degrees(0.2 * 86_400.0);
    let lon = mean_lon(&sim);
    assert!((lon - expected).abs() < 0.01, "mean lon {lon}, expected {expected}");

    // no vertical current on a flat bottom
    for p in sim.population().particles() {
        assert!((p.geo().depth + 10.0).abs() < 0.5, "depth {}", p.geo().depth);
    }
}

#[test]
fn test_uniform_transport_euler() {
    let cfg = config(0.1, "year 1900 month 01 day 01 at 00:00", "0001 day(s) 00 hour(s) 00 minute(s)")
        .with_advection(Advection::new(AdvectionScheme::Euler));
    let mut sim = Simulation::new(cfg, channel(0.2)).unwrap();
    assert!(sim.run().success);

    let expected = 0.1 + degrees(0.2 * 86_400.0);
    assert!((mean_lon(&sim) - expected).abs() < 0.01);
}

#[test]
fn test_backward_run() {
    let mut cfg = config(0.4, "year 1900 month 01 day 03 at 00:00", "0000 day(s) 12 hour(s) 00 minute(s)");
    cfg.time = cfg.time.with_arrow(TimeArrow::Backward);
    let mut sim = Simulation::new(cfg, channel(0.2)).unwrap();
    assert!(sim.clock().dt() < 0.0);

    let result = sim.run();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.n_alive, 40);

    let expected = 0.4 - degrees(0.2 * 12.0 * 3600.0);
    let lon = mean_lon(&sim);
    assert!((lon - expected).abs() < 0.01, "mean lon {lon}, expected {expected}");
}

#[test]
fn test_same_seed_same_trajectories() {
    let run = |seed: u64| {
        let cfg = config(0.1, "year 1900 month 01 day 01 at 00:00", "0000 day(s) 06 hour(s) 00 minute(s)")
            .with_seed(seed)
            .with_horizontal_dispersion(HorizontalDispersion::new(1e-8));
        let mut sim = Simulation::new(cfg, channel(0.1)).unwrap();
        assert!(sim.run().success);
        sim.population()
            .particles()
            .iter()
            .map(|p| (p.geo().lon, p.geo().lat))
            .collect::<Vec<_>>()
    };

    let a = run(5);
    let b = run(5);
    let c = run(6);
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_leaving_the_domain() {
    let cfg = config(0.25, "year 1900 month 01 day 01 at 00:00", "0001 day(s) 00 hour(s) 00 minute(s)");
    let mut sim = Simulation::new(cfg, channel(0.5)).unwrap();
    let result = sim.run();

    assert!(result.success);
    assert_eq!(result.n_alive, 0);
    assert_eq!(result.count(Mortality::OutOfDomain), 40);
}

#[test]
fn test_csv_trajectories() {
    let dir = tempfile::tempdir().unwrap();
    let output = OutputConfig::default()
        .with_output_path(dir.path())
        .with_record_frequency(12)
        .with_custom_tracer("temp");
    let cfg = config(0.1, "year 1900 month 01 day 01 at 00:00", "0001 day(s) 00 hour(s) 00 minute(s)")
        .with_id("channel")
        .with_output(output);
    let mut sim = Simulation::new(cfg, channel(0.2)).unwrap();
    let result = sim.run();
    assert!(result.success);
    // steps 0, 12, 24, 36 and 48
    assert_eq!(result.n_records, 5);

    let path = result.output_path.unwrap();
    assert!(!dir.path().join("roms-drift_channel.csv.part").exists());
    let text = std::fs::read_to_string(path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("time,drifter,lon,lat,depth,mortality,temp"));

    let rows: Vec<Vec<f64>> = lines
        .map(|l| l.split(',').map(|v| v.parse::<f64>().unwrap()).collect())
        .collect();
    assert_eq!(rows.len(), 5 * 40);
    assert_eq!(rows[0][0], 0.0);
    assert_eq!(rows.last().unwrap()[0], 86_400.0);
    for row in &rows {
        // released at 10 m in a 15 + depth / 50 °C column
        assert!((row[6] - 14.8).abs() < 0.02, "temp {}", row[6]);
        assert_eq!(row[5], 0.0);
    }
}
