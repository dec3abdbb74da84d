//! File readers.
//!
//! - **Threshold tables**: `;`-separated step functions used by the biology
//!   actions (lethal temperatures by age, migration depths, egg density).
//! - **NetCDF**: ROMS history files as a [`crate::dataset::RecordSource`]
//!   (requires the `netcdf` feature).
//!
//! # Table files
//!
//! ```text
//! age (h);cold lethal temperature (°C);hot lethal temperature (°C)
//! 0;4.5;28
//! 48;6;30
//! ```
//!
//! The first line is a header. Lines with the wrong number of fields are
//! skipped.

mod netcdf_io;
mod tables;

pub use netcdf_io::{
    FILL_VALUE_F32, NetCDFError, RomsVariableNames, is_valid_f32, truncate_record_time, w_to_rho_levels,
};
#[cfg(feature = "netcdf")]
pub use netcdf_io::RomsNetcdfSource;
pub use tables::{TableFileError, ThresholdTable};
