//! Horizontal ROMS grid (Arakawa C, rho points).
//!
//! Land/sea mask, bathymetry, metrics and the conversions between
//! fractional grid coordinates and longitude/latitude.

mod builder;
mod field;
mod roms_grid;

pub use builder::RectilinearGridBuilder;
pub use field::{Field2, Field3};
pub use roms_grid::RomsGrid;
pub(crate) use roms_grid::round_index;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("Array of shape {expected:?} cannot hold {got} values")]
    ShapeMismatch { expected: Vec<usize>, got: usize },

    #[error("Grid variable {name} is {nx}x{ny}, expected {expected_nx}x{expected_ny}")]
    InconsistentShape {
        name: &'static str,
        nx: usize,
        ny: usize,
        expected_nx: usize,
        expected_ny: usize,
    },

    #[error("Grid of {nx}x{ny} rho points is too small (3x3 minimum)")]
    TooSmall { nx: usize, ny: usize },

    #[error("Crop [{ipo}..{ipo}+{nx}] x [{jpo}..{jpo}+{ny}] exceeds the {full_nx}x{full_ny} grid")]
    InvalidCrop {
        ipo: usize,
        jpo: usize,
        nx: usize,
        ny: usize,
        full_nx: usize,
        full_ny: usize,
    },

    #[error("Point lon={lon} lat={lat} is outside the grid")]
    OutsideGrid { lon: f64, lat: f64 },

    #[error("Invalid grid extent lon [{lon_min}, {lon_max}] lat [{lat_min}, {lat_max}]")]
    InvalidExtent {
        lon_min: f64,
        lon_max: f64,
        lat_min: f64,
        lat_max: f64,
    },
}
