//! Builder for analytic rectilinear grids.
//!
//! Real grids come from ROMS grid files; this builder makes regular
//! lon/lat grids for tests, benchmarks and idealised experiments.
//!
//! # Example
//!
//! ```
//! use roms_drift::grid::RectilinearGridBuilder;
//!
//! // 20 x 10 channel, 30 m deep, closed by land on the north and south rows
//! let grid = RectilinearGridBuilder::new(3.0, 4.9, 42.0, 42.9)
//!     .with_resolution(20, 10)
//!     .with_constant_depth(30.0)
//!     .with_land(|_, j| j == 0 || j == 9)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(grid.nx(), 20);
//! assert!(!grid.is_in_water(5, 0));
//! ```

use crate::geodesy::ONE_DEG_LATITUDE_IN_METER;

use super::{Field2, GridError, RomsGrid};

type DepthFn = Box<dyn Fn(f64, f64) -> f64>;
type LandFn = Box<dyn Fn(usize, usize) -> bool>;

/// Builder for regular lon/lat ROMS grids.
pub struct RectilinearGridBuilder {
    lon_min: f64,
    lon_max: f64,
    lat_min: f64,
    lat_max: f64,
    nx: usize,
    ny: usize,
    depth: DepthFn,
    land: LandFn,
}

impl RectilinearGridBuilder {
    /// Grid spanning `[lon_min, lon_max] x [lat_min, lat_max]` at rho points.
    ///
    /// Default resolution is 3 x 3 rho points, 100 m deep, all water.
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Self {
        Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
            nx: 3,
            ny: 3,
            depth: Box::new(|_, _| 100.0),
            land: Box::new(|_, _| false),
        }
    }

    /// Number of rho points along xi and eta.
    pub fn with_resolution(mut self, nx: usize, ny: usize) -> Self {
        self.nx = nx;
        self.ny = ny;
        self
    }

    pub fn with_constant_depth(mut self, h: f64) -> Self {
        self.depth = Box::new(move |_, _| h);
        self
    }

    /// Bathymetry as a function of `(lon, lat)`.
    pub fn with_depth(mut self, f: impl Fn(f64, f64) -> f64 + 'static) -> Self {
        self.depth = Box::new(f);
        self
    }

    /// Land predicate on rho indices `(i, j)`.
    pub fn with_land(mut self, f: impl Fn(usize, usize) -> bool + 'static) -> Self {
        self.land = Box::new(f);
        self
    }

    pub fn build(self) -> Result<RomsGrid, GridError> {
        let (nx, ny) = (self.nx, self.ny);
        if nx < 3 || ny < 3 {
            return Err(GridError::TooSmall { nx, ny });
        }
        if !(self.lon_max > self.lon_min) || !(self.lat_max > self.lat_min) {
            return Err(GridError::InvalidExtent {
                lon_min: self.lon_min,
                lon_max: self.lon_max,
                lat_min: self.lat_min,
                lat_max: self.lat_max,
            });
        }

        let dlon = (self.lon_max - self.lon_min) / (nx - 1) as f64;
        let dlat = (self.lat_max - self.lat_min) / (ny - 1) as f64;
        let lon_at = |i: usize| self.lon_min + i as f64 * dlon;
        let lat_at = |j: usize| self.lat_min + j as f64 * dlat;

        let lon = Field2::from_fn(nx, ny, |i, _| lon_at(i));
        let lat = Field2::from_fn(nx, ny, |_, j| lat_at(j));
        let mask = Field2::from_fn(nx, ny, |i, j| !(self.land)(i, j));
        let h = Field2::from_fn(nx, ny, |i, j| (self.depth)(lon_at(i), lat_at(j)));
        let pm = Field2::from_fn(nx, ny, |_, j| {
            1.0 / (dlon * ONE_DEG_LATITUDE_IN_METER * lat_at(j).to_radians().cos())
        });
        let pn = Field2::filled(nx, ny, 1.0 / (dlat * ONE_DEG_LATITUDE_IN_METER));

        RomsGrid::new(lon, lat, mask, h, pm, pn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let g = RectilinearGridBuilder::new(0.0, 1.0, 0.0, 1.0).build().unwrap();
        assert_eq!((g.nx(), g.ny()), (3, 3));
        assert_eq!(g.h(1, 1), 100.0);
        assert_eq!(g.n_water_points(), 9);
    }

    #[test]
    fn test_builder_depth_function() {
        let g = RectilinearGridBuilder::new(0.0, 1.0, 0.0, 1.0)
            .with_resolution(5, 5)
            .with_depth(|lon, _| 10.0 + 100.0 * lon)
            .build()
            .unwrap();
        assert_eq!(g.h(0, 2), 10.0);
        assert_eq!(g.h(4, 2), 110.0);
    }

    #[test]
    fn test_builder_rejects_bad_input() {
        assert!(matches!(
            RectilinearGridBuilder::new(0.0, 1.0, 0.0, 1.0).with_resolution(2, 5).build(),
            Err(GridError::TooSmall { .. })
        ));
        assert!(matches!(
            RectilinearGridBuilder::new(1.0, 0.0, 0.0, 1.0).build(),
            Err(GridError::InvalidExtent { .. })
        ));
    }
}
