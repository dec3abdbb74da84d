//! Simulation driver.
//!
//! Ties the pieces of a run together:
//! - the ROMS dataset and its record bracketing,
//! - the release schedule and release method,
//! - the actions stepping each particle,
//! - the trajectory recorder.
//!
//! # Example
//! ```ignore
//! use roms_drift::config::SimulationConfig;
//! use roms_drift::simulation::Simulation;
//!
//! let config = SimulationConfig::load("run.toml")?;
//! let mut sim = Simulation::new(config, source)?;
//! let result = sim.run_with_callback(|snapshot| {
//!     println!("{} alive at t = {}", snapshot.n_alive, snapshot.time);
//! });
//! assert!(result.success);
//! ```

mod population;
mod runner;

pub use population::Population;
pub use runner::{Simulation, SimulationResult, StepSnapshot};

use thiserror::Error;

use crate::action::ActionError;
use crate::config::ConfigError;
use crate::dataset::DatasetError;
use crate::output::OutputError;
use crate::release::ReleaseError;
use crate::zone::ZoneFileError;

/// Anything that can stop a run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Zone(#[from] ZoneFileError),

    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("Maximum step limit ({0}) reached")]
    MaxSteps(usize),
}
