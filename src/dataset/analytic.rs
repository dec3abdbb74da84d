//! Analytic record sources for tests, benchmarks and idealised runs.
//!
//! # Example
//!
//! ```
//! use roms_drift::dataset::{AnalyticSourceBuilder, RecordSource};
//! use roms_drift::grid::RectilinearGridBuilder;
//! use roms_drift::vertical::{SCoordinate, UniformStretching, VerticalTransform};
//!
//! let grid = RectilinearGridBuilder::new(0.0, 1.0, 40.0, 41.0)
//!     .with_resolution(11, 11)
//!     .with_constant_depth(40.0)
//!     .build()
//!     .unwrap();
//! let sc = SCoordinate::from_stretching(5, VerticalTransform::Old, 0.0, &UniformStretching).unwrap();
//!
//! let source = AnalyticSourceBuilder::new(grid)
//!     .with_s_coordinate(sc)
//!     .with_records(0.0, 3600.0, 25)
//!     .with_uniform_velocity(0.2, 0.0)
//!     .with_tracer("temp", |_, _, depth, _| 15.0 + depth / 10.0)
//!     .build();
//!
//! assert_eq!(source.n_records(), 25);
//! ```

use crate::grid::{Field2, Field3, RomsGrid};
use crate::vertical::SCoordinate;

use super::{HydroRecord, MemorySource};

type VelocityFn = Box<dyn Fn(f64, f64, f64, f64) -> (f64, f64)>;
type TracerFn = Box<dyn Fn(f64, f64, f64, f64) -> f64>;
type ZetaFn = Box<dyn Fn(f64, f64, f64) -> f64>;

/// Builds a [`MemorySource`] from analytic functions of
/// `(lon, lat, depth, time)`.
pub struct AnalyticSourceBuilder {
    grid: RomsGrid,
    s_coordinate: Option<SCoordinate>,
    t0: f64,
    dt: f64,
    n_records: usize,
    velocity: VelocityFn,
    zeta: Option<ZetaFn>,
    tracers: Vec<(String, TracerFn)>,
}

impl AnalyticSourceBuilder {
    /// Depth-averaged source at rest with 3 daily records from `t = 0`.
    pub fn new(grid: RomsGrid) -> Self {
        Self {
            grid,
            s_coordinate: None,
            t0: 0.0,
            dt: 86_400.0,
            n_records: 3,
            velocity: Box::new(|_, _, _, _| (0.0, 0.0)),
            zeta: None,
            tracers: Vec::new(),
        }
    }

    /// Make the source 3-D.
    pub fn with_s_coordinate(mut self, sc: SCoordinate) -> Self {
        self.s_coordinate = Some(sc);
        self
    }

    /// `n` records every `dt` seconds from `t0`.
    pub fn with_records(mut self, t0: f64, dt: f64, n: usize) -> Self {
        self.t0 = t0;
        self.dt = dt;
        self.n_records = n;
        self
    }

    /// Eastward/northward velocity (m/s) as a function of
    /// `(lon, lat, depth, time)`.
    pub fn with_velocity(mut self, f: impl Fn(f64, f64, f64, f64) -> (f64, f64) + 'static) -> Self {
        self.velocity = Box::new(f);
        self
    }

    pub fn with_uniform_velocity(self, u: f64, v: f64) -> Self {
        self.with_velocity(move |_, _, _, _| (u, v))
    }

    /// Free surface (m) as a function of `(lon, lat, time)`.
    pub fn with_zeta(mut self, f: impl Fn(f64, f64, f64) -> f64 + 'static) -> Self {
        self.zeta = Some(Box::new(f));
        self
    }

    /// Tracer at rho points as a function of `(lon, lat, depth, time)`.
    pub fn with_tracer(mut self, name: impl Into<String>, f: impl Fn(f64, f64, f64, f64) -> f64 + 'static) -> Self {
        self.tracers.push((name.into(), Box::new(f)));
        self
    }

    pub fn build(self) -> MemorySource {
        let grid = &self.grid;
        let (nx, ny) = (grid.nx(), grid.ny());
        let nz = self.s_coordinate.as_ref().map_or(1, |sc| sc.nz());

        // Unperturbed rho depths, [k][j][i]
        let z_r = Field3::from_fn(nx, ny, nz, |i, j, k| match &self.s_coordinate {
            Some(sc) => sc.z0_r(k, grid.h(i, j)),
            None => -0.5 * grid.h(i, j),
        });
        let water = |i: usize, j: usize| grid.is_in_water(i as isize, j as isize);

        let mut records = Vec::with_capacity(self.n_records);
        for rank in 0..self.n_records {
            let t = self.t0 + rank as f64 * self.dt;

            let u = Field3::from_fn(nx - 1, ny, nz, |i, j, k| {
                if !(water(i, j) && water(i + 1, j)) {
                    return 0.0;
                }
                let lon = 0.5 * (grid.lon(i, j) + grid.lon(i + 1, j));
                let lat = 0.5 * (grid.lat(i, j) + grid.lat(i + 1, j));
                let depth = 0.5 * (z_r.get(i, j, k) + z_r.get(i + 1, j, k));
                (self.velocity)(lon, lat, depth, t).0 as f32
            });
            let v = Field3::from_fn(nx, ny - 1, nz, |i, j, k| {
                if !(water(i, j) && water(i, j + 1)) {
                    return 0.0;
                }
                let lon = 0.5 * (grid.lon(i, j) + grid.lon(i, j + 1));
                let lat = 0.5 * (grid.lat(i, j) + grid.lat(i, j + 1));
                let depth = 0.5 * (z_r.get(i, j, k) + z_r.get(i, j + 1, k));
                (self.velocity)(lon, lat, depth, t).1 as f32
            });

            let mut record = HydroRecord::new(t, u, v);
            if self.s_coordinate.is_some() {
                let zeta = Field2::from_fn(nx, ny, |i, j| match &self.zeta {
                    Some(f) => f(grid.lon(i, j), grid.lat(i, j), t) as f32,
                    None => 0.0,
                });
                record = record.with_zeta(zeta);
            }
            for (name, f) in &self.tracers {
                let field = Field3::from_fn(nx, ny, nz, |i, j, k| {
                    if water(i, j) {
                        f(grid.lon(i, j), grid.lat(i, j), z_r.get(i, j, k), t) as f32
                    } else {
                        f32::NAN
                    }
                });
                record = record.with_tracer(name.clone(), field);
            }
            records.push(record);
        }

        MemorySource::new(self.grid.clone(), self.s_coordinate.clone(), records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::RecordSource;
    use crate::grid::RectilinearGridBuilder;
    use crate::vertical::{UniformStretching, VerticalTransform};

    fn grid() -> RomsGrid {
        RectilinearGridBuilder::new(0.0, 0.5, 40.0, 40.5)
            .with_resolution(6, 6)
            .with_constant_depth(20.0)
            .with_land(|i, _| i == 5)
            .build()
            .unwrap()
    }

    #[test]
    fn test_records_layout() {
        let sc = SCoordinate::from_stretching(4, VerticalTransform::Old, 0.0, &UniformStretching).unwrap();
        let src = AnalyticSourceBuilder::new(grid())
            .with_s_coordinate(sc)
            .with_records(100.0, 50.0, 4)
            .with_uniform_velocity(0.3, -0.1)
            .with_tracer("temp", |_, _, d, _| d)
            .build();

        assert_eq!(src.n_records(), 4);
        assert_eq!(src.record_time(3).unwrap(), 250.0);

        let r = src.read_record(1, &["temp".to_string()]).unwrap();
        assert!(r.validate(6, 6, 4).is_ok());
        assert_eq!(r.u.get(0, 2, 1), 0.3);
        // face between water (4, j) and land (5, j)
        assert_eq!(r.u.get(4, 2, 1), 0.0);
        assert_eq!(r.v.get(2, 2, 0), -0.1);
        assert_eq!(r.tracers["temp"].get(1, 1, 0), -17.5);
        assert!(r.tracers["temp"].get(5, 1, 0).is_nan());
    }

    #[test]
    fn test_missing_tracer() {
        let src = AnalyticSourceBuilder::new(grid()).build();
        assert!(src.read_record(0, &["salt".to_string()]).is_err());
        assert!(src.read_record(7, &[]).is_err());
        assert!(src.read_record(0, &[]).unwrap().zeta.is_none());
    }
}
