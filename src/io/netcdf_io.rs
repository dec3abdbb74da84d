//! NetCDF access to ROMS history files.
//!
//! [`RomsNetcdfSource`] reads the horizontal grid, the S-coordinate and the
//! time records of one or several ROMS output files (Rutgers or UCLA
//! flavour). Records of successive files are concatenated in time order.
//!
//! Packed variables are unpacked with their `scale_factor`/`add_offset`
//! attributes and fill values are read as NaN.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "netcdf")]
use std::path::{Path, PathBuf};
#[cfg(feature = "netcdf")]
use tracing::{debug, info};

#[cfg(feature = "netcdf")]
use crate::dataset::{DatasetError, HydroRecord, RecordSource};
#[cfg(feature = "netcdf")]
use crate::grid::{Field2, Field3, RomsGrid};
#[cfg(feature = "netcdf")]
use crate::vertical::{SCoordinate, VerticalTransform};

/// Error type for NetCDF operations.
#[derive(Debug, Error)]
pub enum NetCDFError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// NetCDF library error
    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    #[cfg(feature = "netcdf")]
    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: netcdf::Error,
    },

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Missing variable
    #[error("Missing variable: {0}")]
    MissingVariable(String),

    /// Missing dimension
    #[error("Missing dimension: {0}")]
    MissingDimension(String),

    /// Feature not enabled
    #[error("NetCDF feature not enabled")]
    FeatureDisabled,
}

/// Fill value for missing data (CF-conventions standard).
pub const FILL_VALUE_F32: f32 = 9.96921e+36;

/// Check if a value is valid (not a fill value).
#[inline]
pub fn is_valid_f32(v: f32) -> bool {
    v.is_finite() && v.abs() < 1.0e+30
}

// ============================================================================
// Variable names
// ============================================================================

/// Names of the dimensions and variables of a ROMS output.
///
/// The defaults follow the Rutgers conventions. `hc`, `Cs_r` and `Cs_w` are
/// looked up among the global attributes first (UCLA) then among the
/// variables (Rutgers).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RomsVariableNames {
    pub dim_xi: String,
    pub dim_eta: String,
    pub dim_z: String,
    pub lon: String,
    pub lat: String,
    pub mask: String,
    pub bathy: String,
    pub pm: String,
    pub pn: String,
    pub zeta: String,
    pub u: String,
    pub v: String,
    pub time: String,
    pub hc: String,
    pub cs_r: String,
    pub cs_w: String,
}

impl Default for RomsVariableNames {
    fn default() -> Self {
        Self {
            dim_xi: "xi_rho".to_string(),
            dim_eta: "eta_rho".to_string(),
            dim_z: "s_rho".to_string(),
            lon: "lon_rho".to_string(),
            lat: "lat_rho".to_string(),
            mask: "mask_rho".to_string(),
            bathy: "h".to_string(),
            pm: "pm".to_string(),
            pn: "pn".to_string(),
            zeta: "zeta".to_string(),
            u: "u".to_string(),
            v: "v".to_string(),
            time: "ocean_time".to_string(),
            hc: "hc".to_string(),
            cs_r: "Cs_r".to_string(),
            cs_w: "Cs_w".to_string(),
        }
    }
}

impl RomsVariableNames {
    /// Names for depth-averaged outputs (`ubar`, `vbar`).
    pub fn depth_averaged() -> Self {
        Self {
            u: "ubar".to_string(),
            v: "vbar".to_string(),
            ..Self::default()
        }
    }
}

/// Round a ROMS record time down to a multiple of 100 s.
///
/// Output times written in single precision are off by a few seconds; the
/// truncation puts them back on the record grid.
#[inline]
pub fn truncate_record_time(time: f64) -> f64 {
    time - time % 100.0
}

/// Average `nz + 1` w-level values to `nz` rho levels, `[k][j][i]` order.
pub fn w_to_rho_levels(w: &[f32], nx: usize, ny: usize, nz: usize) -> Vec<f32> {
    let layer = nx * ny;
    let mut rho = Vec::with_capacity(layer * nz);
    for k in 0..nz {
        for idx in 0..layer {
            rho.push(0.5 * (w[k * layer + idx] + w[(k + 1) * layer + idx]));
        }
    }
    rho
}

// ============================================================================
// ROMS source
// ============================================================================

/// Position of a time record among the files.
#[cfg(feature = "netcdf")]
#[derive(Clone, Copy, Debug)]
struct RecordIndex {
    file: usize,
    local: usize,
    time: f64,
}

/// Time records of ROMS history files.
#[cfg(feature = "netcdf")]
#[derive(Clone, Debug)]
pub struct RomsNetcdfSource {
    files: Vec<PathBuf>,
    grid_file: PathBuf,
    names: RomsVariableNames,
    three_d: bool,
    nx: usize,
    ny: usize,
    nz: usize,
    records: Vec<RecordIndex>,
}

#[cfg(feature = "netcdf")]
fn open(path: &Path) -> Result<netcdf::File, NetCDFError> {
    netcdf::open(path).map_err(|source| NetCDFError::Open {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(feature = "netcdf")]
fn dimension_len(file: &netcdf::File, name: &str) -> Result<usize, NetCDFError> {
    file.dimension(name)
        .map(|d| d.len())
        .ok_or_else(|| NetCDFError::MissingDimension(name.to_string()))
}

#[cfg(feature = "netcdf")]
fn variable<'f>(file: &'f netcdf::File, name: &str) -> Result<netcdf::Variable<'f>, NetCDFError> {
    file.variable(name)
        .ok_or_else(|| NetCDFError::MissingVariable(name.to_string()))
}

/// Get f64 attribute value.
#[cfg(feature = "netcdf")]
fn get_attr_f64(var: &netcdf::Variable, name: &str) -> Option<f64> {
    var.attribute_value(name)
        .and_then(|r| r.ok())
        .and_then(|v| match v {
            netcdf::AttributeValue::Double(d) => Some(d),
            netcdf::AttributeValue::Float(f) => Some(f as f64),
            netcdf::AttributeValue::Short(s) => Some(s as f64),
            netcdf::AttributeValue::Int(i) => Some(i as f64),
            _ => None,
        })
}

/// Numeric values of a global attribute.
#[cfg(feature = "netcdf")]
fn global_attr_f64s(file: &netcdf::File, name: &str) -> Option<Vec<f64>> {
    let value = file.attribute(name)?.value().ok()?;
    match value {
        netcdf::AttributeValue::Double(d) => Some(vec![d]),
        netcdf::AttributeValue::Float(f) => Some(vec![f as f64]),
        netcdf::AttributeValue::Int(i) => Some(vec![i as f64]),
        netcdf::AttributeValue::Doubles(d) => Some(d),
        netcdf::AttributeValue::Floats(f) => Some(f.into_iter().map(f64::from).collect()),
        _ => None,
    }
}

#[cfg(feature = "netcdf")]
fn global_attr_str(file: &netcdf::File, name: &str) -> Option<String> {
    match file.attribute(name)?.value().ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

/// Values of a parameter stored as a global attribute or a variable.
#[cfg(feature = "netcdf")]
fn attribute_or_variable(file: &netcdf::File, name: &str) -> Result<Vec<f64>, NetCDFError> {
    if let Some(values) = global_attr_f64s(file, name) {
        return Ok(values);
    }
    match file.variable(name) {
        Some(var) => Ok(var.get_values::<f64, _>(..)?),
        None => Err(NetCDFError::MissingVariable(format!(
            "{name} (neither among global attributes nor variables)"
        ))),
    }
}

/// Unpack raw values and turn fill values into NaN.
#[cfg(feature = "netcdf")]
fn unpack(var: &netcdf::Variable, raw: Vec<f32>) -> Vec<f32> {
    let scale = get_attr_f64(var, "scale_factor").unwrap_or(1.0);
    let offset = get_attr_f64(var, "add_offset").unwrap_or(0.0);
    let fill = get_attr_f64(var, "_FillValue");
    raw.into_iter()
        .map(|v| {
            if !is_valid_f32(v) || fill.is_some_and(|f| v as f64 == f) {
                f32::NAN
            } else {
                (v as f64 * scale + offset) as f32
            }
        })
        .collect()
}

#[cfg(feature = "netcdf")]
fn read_field2_f64(file: &netcdf::File, name: &str, nx: usize, ny: usize) -> Result<Field2<f64>, DatasetError> {
    let values: Vec<f64> = variable(file, name)?.get_values(..).map_err(NetCDFError::from)?;
    Ok(Field2::new(nx, ny, values)?)
}

#[cfg(feature = "netcdf")]
impl RomsNetcdfSource {
    /// Open history `files`; the grid is read from `grid_file`, or from the
    /// first history file when `None`.
    pub fn open(
        files: Vec<PathBuf>,
        grid_file: Option<PathBuf>,
        names: RomsVariableNames,
        three_d: bool,
    ) -> Result<Self, DatasetError> {
        let Some(first) = files.first() else {
            return Err(DatasetError::NoRecords);
        };
        let grid_file = grid_file.unwrap_or_else(|| first.clone());

        let grid_nc = open(&grid_file)?;
        let nx = dimension_len(&grid_nc, &names.dim_xi)?;
        let ny = dimension_len(&grid_nc, &names.dim_eta)?;
        let nz = if three_d {
            dimension_len(&open(first)?, &names.dim_z)?
        } else {
            1
        };

        let mut records = Vec::new();
        for (index, path) in files.iter().enumerate() {
            let nc = open(path)?;
            let times: Vec<f64> = variable(&nc, &names.time)?.get_values(..).map_err(NetCDFError::from)?;
            debug!(file = %path.display(), n_records = times.len(), "ROMS file scanned");
            records.extend(times.into_iter().enumerate().map(|(local, t)| RecordIndex {
                file: index,
                local,
                time: truncate_record_time(t),
            }));
        }
        records.sort_by(|a, b| a.time.total_cmp(&b.time));
        for (rank, pair) in records.windows(2).enumerate() {
            if pair[0].time == pair[1].time {
                return Err(DatasetError::DuplicateRecordTime {
                    rank,
                    next: rank + 1,
                    time: pair[0].time,
                });
            }
        }

        info!(
            files = files.len(),
            records = records.len(),
            nx,
            ny,
            nz,
            "ROMS NetCDF output indexed"
        );

        Ok(Self {
            files,
            grid_file,
            names,
            three_d,
            nx,
            ny,
            nz,
            records,
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn index(&self, rank: usize) -> Result<RecordIndex, DatasetError> {
        self.records.get(rank).copied().ok_or(DatasetError::RankOutOfRange {
            rank,
            n_records: self.records.len(),
        })
    }

    /// Time-dependent field of record `local` with `levels` vertical levels.
    fn read_field3(
        &self,
        var: &netcdf::Variable,
        local: usize,
        nx: usize,
        ny: usize,
    ) -> Result<Field3<f32>, DatasetError> {
        let dims = var.dimensions();
        let (raw, levels): (Vec<f32>, usize) = match dims.len() {
            4 => (
                var.get_values((local, .., .., ..)).map_err(NetCDFError::from)?,
                dims[1].len(),
            ),
            3 => (var.get_values((local, .., ..)).map_err(NetCDFError::from)?, 1),
            n => {
                return Err(NetCDFError::InvalidData(format!(
                    "variable {} has {n} dimensions, expected (time, [level,] eta, xi)",
                    var.name()
                ))
                .into());
            }
        };
        let values = unpack(var, raw);
        let (values, levels) = if levels == self.nz + 1 && self.three_d {
            (w_to_rho_levels(&values, nx, ny, self.nz), self.nz)
        } else {
            (values, levels)
        };
        Ok(Field3::new(nx, ny, levels, values)?)
    }
}

#[cfg(feature = "netcdf")]
impl RecordSource for RomsNetcdfSource {
    fn grid(&self) -> Result<RomsGrid, DatasetError> {
        let nc = open(&self.grid_file)?;
        let (nx, ny) = (self.nx, self.ny);
        let n = &self.names;
        let mask = read_field2_f64(&nc, &n.mask, nx, ny)?.map(|m| m > 0.5);
        Ok(RomsGrid::new(
            read_field2_f64(&nc, &n.lon, nx, ny)?,
            read_field2_f64(&nc, &n.lat, nx, ny)?,
            mask,
            read_field2_f64(&nc, &n.bathy, nx, ny)?,
            read_field2_f64(&nc, &n.pm, nx, ny)?,
            read_field2_f64(&nc, &n.pn, nx, ny)?,
        )?)
    }

    fn s_coordinate(&self) -> Result<Option<SCoordinate>, DatasetError> {
        if !self.three_d {
            return Ok(None);
        }
        let nc = open(&self.files[0])?;
        let hc = attribute_or_variable(&nc, &self.names.hc)?
            .first()
            .copied()
            .ok_or_else(|| NetCDFError::InvalidData("empty hc".to_string()))?;
        let cs_r = attribute_or_variable(&nc, &self.names.cs_r)?;
        let cs_w = attribute_or_variable(&nc, &self.names.cs_w)?;

        let vtransform = nc
            .variable("Vtransform")
            .and_then(|v| v.get_values::<i32, _>(..).ok())
            .and_then(|v| v.first().copied())
            .and_then(VerticalTransform::from_vtransform);
        let transform = vtransform
            .or_else(|| global_attr_str(&nc, "VertCoordType").and_then(|s| VerticalTransform::from_attribute(&s)))
            .unwrap_or_default();
        debug!(hc, transform = ?transform, nz = cs_r.len(), "S-coordinate read");

        Ok(Some(SCoordinate::new(transform, hc, cs_r, cs_w)?))
    }

    fn n_records(&self) -> usize {
        self.records.len()
    }

    fn record_time(&self, rank: usize) -> Result<f64, DatasetError> {
        Ok(self.index(rank)?.time)
    }

    fn read_record(&self, rank: usize, tracers: &[String]) -> Result<HydroRecord, DatasetError> {
        let index = self.index(rank)?;
        let nc = open(&self.files[index.file])?;
        let (nx, ny) = (self.nx, self.ny);

        let u = self.read_field3(&variable(&nc, &self.names.u)?, index.local, nx - 1, ny)?;
        let v = self.read_field3(&variable(&nc, &self.names.v)?, index.local, nx, ny - 1)?;
        let mut record = HydroRecord::new(index.time, u, v);

        if self.three_d {
            let var = variable(&nc, &self.names.zeta)?;
            let raw: Vec<f32> = var.get_values((index.local, .., ..)).map_err(NetCDFError::from)?;
            record = record.with_zeta(Field2::new(nx, ny, unpack(&var, raw))?);
        }
        for name in tracers {
            let var = nc
                .variable(name)
                .ok_or_else(|| DatasetError::MissingVariable(name.clone()))?;
            record = record.with_tracer(name.clone(), self.read_field3(&var, index.local, nx, ny)?);
        }
        Ok(record)
    }

    fn describe(&self) -> String {
        format!(
            "ROMS NetCDF output, {} file(s), {} records",
            self.files.len(),
            self.records.len()
        )
    }
}
