//! # roms-drift
//!
//! Lagrangian particle tracking on ROMS ocean model output.
//!
//! This crate provides the building blocks of an offline drift model for
//! fish eggs, larvae and passive material:
//! - Staggered-grid (rho/u/v/w) interpolation of currents and tracers
//! - Terrain-following S-coordinate transforms
//! - Time bracketing of model records, forward and backward in time
//! - Release in zones, stains, patches or from position files
//! - Actions: advection (Euler, RK4), turbulent dispersion, buoyancy,
//!   growth, lethal temperatures, vertical migration, recruitment
//! - Coastline behaviours (beaching, bouncing, standstill)
//! - Trajectory output (CSV, NetCDF with the `netcdf` feature)
//!
//! ## Features
//!
//! - `parallel`: step particles with rayon
//! - `netcdf`: read ROMS history files and write NetCDF trajectories

pub mod action;
pub mod config;
pub mod dataset;
pub mod geodesy;
pub mod grid;
pub mod io;
pub mod output;
pub mod particle;
pub mod polygon;
pub mod release;
pub mod simulation;
pub mod time;
pub mod types;
pub mod vertical;
pub mod zone;

// Re-export main types for convenience
pub use action::{
    Action, ActionContext, ActionError, ActionSet, Advection, AdvectionScheme, CoastlineBehavior,
    HorizontalDispersion, VerticalDispersion,
};
pub use config::{ConfigError, SimulationConfig};
pub use dataset::{AnalyticSourceBuilder, Dataset, DatasetError, MemorySource, RecordSource, RomsDataset};
pub use grid::{RectilinearGridBuilder, RomsGrid};
pub use output::{OutputConfig, OutputFormat, Tracker};
pub use particle::{Mortality, Particle};
pub use release::{ReleaseMethod, ReleaseSchedule, Releaser};
pub use simulation::{Simulation, SimulationError, SimulationResult};
pub use time::{Calendar, TimeArrow, TimeManager};
pub use types::{GeoPos, GridPos, Move};
pub use vertical::{SCoordinate, VerticalTransform};
pub use zone::{ZoneKind, ZoneManager};

#[cfg(feature = "netcdf")]
pub use io::RomsNetcdfSource;
