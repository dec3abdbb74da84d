//! Hydrodynamic datasets: ROMS grid, time records and the interpolation of
//! velocities, depths and tracers at particle positions.
//!
//! A [`RecordSource`] hands out raw time records ([`HydroRecord`]);
//! [`RomsDataset`] keeps the two records bracketing the current time,
//! derives the vertical velocity from continuity and answers the
//! [`Dataset`] queries the actions make.

mod analytic;
mod record;
mod roms;
mod source;

pub use analytic::AnalyticSourceBuilder;
pub use record::HydroRecord;
pub use roms::RomsDataset;
pub use source::{MemorySource, RecordSource};

use thiserror::Error;

use crate::grid::{GridError, RomsGrid};
use crate::io::NetCDFError;
use crate::time::TimeArrow;
use crate::types::GridPos;
use crate::vertical::VerticalError;

/// Errors raised while reading or interpolating hydrodynamic data.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Vertical(#[from] VerticalError),

    #[error(transparent)]
    NetCDF(#[from] NetCDFError),

    #[error("Dataset has no time record")]
    NoRecords,

    #[error("Time {time} s is not covered by the dataset records [{first}, {last}]")]
    TimeOutOfRange { time: f64, first: f64, last: f64 },

    #[error("No record left after time {time} s")]
    EndOfRecords { time: f64 },

    #[error("Records {rank} and {next} share the same time {time} s")]
    DuplicateRecordTime { rank: usize, next: usize, time: f64 },

    #[error("Record {rank} is out of range (dataset has {n_records} records)")]
    RankOutOfRange { rank: usize, n_records: usize },

    #[error("Variable {0:?} not found in the dataset")]
    MissingVariable(String),

    #[error("Variable {0:?} was not registered before setup")]
    VariableNotLoaded(String),

    #[error("Variable {name} has shape {got:?}, expected {expected:?}")]
    RecordShape {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Dataset used before setup")]
    NotSetUp,
}

/// Queries the actions make on the hydrodynamic dataset.
///
/// Grid queries have default implementations delegating to [`Dataset::grid`].
/// Velocities are returned in grid units per second.
pub trait Dataset: Send + Sync {
    fn grid(&self) -> &RomsGrid;

    /// Number of rho levels (1 for depth-averaged datasets).
    fn nz(&self) -> usize;

    fn is_3d(&self) -> bool;

    // -------------------------------------------------------------------------
    // Grid
    // -------------------------------------------------------------------------

    fn nx(&self) -> usize {
        self.grid().nx()
    }

    fn ny(&self) -> usize {
        self.grid().ny()
    }

    fn is_in_water(&self, i: isize, j: isize) -> bool {
        self.grid().is_in_water(i, j)
    }

    fn is_in_water_xy(&self, x: f64, y: f64) -> bool {
        self.grid().is_in_water_xy(x, y)
    }

    fn is_close_to_coast(&self, x: f64, y: f64) -> bool {
        self.grid().is_close_to_coast(x, y)
    }

    fn is_on_edge(&self, x: f64, y: f64) -> bool {
        self.grid().is_on_edge(x, y)
    }

    /// `(lat, lon)` of a grid position.
    fn xy2latlon(&self, x: f64, y: f64) -> (f64, f64) {
        self.grid().xy2latlon(x, y)
    }

    fn latlon2xy(&self, lat: f64, lon: f64) -> Option<(f64, f64)> {
        self.grid().latlon2xy(lat, lon)
    }

    fn bathy(&self, i: isize, j: isize) -> f64 {
        self.grid().bathy(i, j)
    }

    fn dxi(&self, i: usize, j: usize) -> f64 {
        self.grid().dxi(i, j)
    }

    fn deta(&self, i: usize, j: usize) -> f64 {
        self.grid().deta(i, j)
    }

    // -------------------------------------------------------------------------
    // Vertical
    // -------------------------------------------------------------------------

    /// Fractional level of a depth (m, negative downward).
    fn depth2z(&self, x: f64, y: f64, depth: f64) -> f64;

    /// Depth (m) of a fractional level.
    fn z2depth(&self, x: f64, y: f64, z: f64) -> f64;

    /// Depth (m) of rho level `k` at rho point `(i, j)`.
    fn level_depth(&self, i: usize, j: usize, k: usize) -> f64;

    // -------------------------------------------------------------------------
    // Fields
    // -------------------------------------------------------------------------

    fn get_dux(&self, p: GridPos, time: f64) -> f64;

    fn get_dvy(&self, p: GridPos, time: f64) -> f64;

    fn get_dwz(&self, p: GridPos, time: f64) -> f64;

    /// Tracer interpolated at a particle position.
    fn get(&self, name: &str, p: GridPos, time: f64) -> Result<f64, DatasetError>;

    /// Tracer water column at rho point `(i, j)`, bottom first.
    fn column(&self, name: &str, i: usize, j: usize, time: f64) -> Result<Vec<f64>, DatasetError>;

    // -------------------------------------------------------------------------
    // Time records
    // -------------------------------------------------------------------------

    fn time_tp0(&self) -> f64;

    fn time_tp1(&self) -> f64;

    /// Register a tracer to be read with every record.
    fn require_variable(&mut self, name: &str);

    /// Load the records bracketing `t0`.
    fn setup(&mut self, t0: f64, arrow: TimeArrow) -> Result<(), DatasetError>;

    /// Move to the next record once `time` passes `time_tp1`.
    fn update(&mut self, time: f64) -> Result<(), DatasetError>;
}
