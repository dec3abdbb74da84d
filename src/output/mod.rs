//! Trajectory output.
//!
//! A [`Recorder`] samples the population every `record_frequency` steps
//! through a list of [`Tracker`]s and hands the records to a
//! [`TrajectoryWriter`]: long-format CSV, or NetCDF with the `netcdf`
//! feature. Files are written as `<name>.part` and renamed when closed.

mod csv;
#[cfg(feature = "netcdf")]
mod nc;

pub use self::csv::CsvTrajectoryWriter;
#[cfg(feature = "netcdf")]
pub use self::nc::NetcdfTrajectoryWriter;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::dataset::{Dataset, DatasetError};
use crate::io::NetCDFError;
use crate::particle::{Mortality, Particle};
use crate::zone::{ZoneKind, ZoneManager};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Cannot write output file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    NetCDF(#[from] NetCDFError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Record has {got} columns, the file expects {expected}")]
    ColumnMismatch { expected: usize, got: usize },

    #[error("Particle {drifter} beyond the {n_drifters} drifters of the output file")]
    DrifterOutOfRange { drifter: usize, n_drifters: usize },

    #[error("Output file already closed")]
    Closed,
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Netcdf,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Netcdf => "nc",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub enabled: bool,
    pub format: OutputFormat,
    pub output_path: PathBuf,
    pub file_prefix: String,
    /// Steps between two records.
    pub record_frequency: usize,
    /// Record the release and recruitment zone the particles are in.
    pub zone_tracker: bool,
    /// Record the zone each particle was released in.
    pub release_zone_tracker: bool,
    /// Dataset variables interpolated at the particle positions.
    pub custom_tracers: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: OutputFormat::Csv,
            output_path: PathBuf::from("output"),
            file_prefix: "roms-drift".to_string(),
            record_frequency: 12,
            zone_tracker: false,
            release_zone_tracker: false,
            custom_tracers: Vec::new(),
        }
    }
}

impl OutputConfig {
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_record_frequency(mut self, frequency: usize) -> Self {
        self.record_frequency = frequency;
        self
    }

    pub fn with_custom_tracer(mut self, name: impl Into<String>) -> Self {
        self.custom_tracers.push(name.into());
        self
    }

    /// Final file path, `<output_path>/<prefix>_<id>.<ext>`.
    pub fn file_path(&self, id: &str) -> PathBuf {
        let name = if self.file_prefix.is_empty() {
            format!("{id}.{}", self.format.extension())
        } else {
            format!("{}_{id}.{}", self.file_prefix, self.format.extension())
        };
        self.output_path.join(name)
    }
}

/// Path of the file being written.
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Rename `<path>.part` to `path`.
pub(crate) fn finalize(path: &Path) -> Result<(), OutputError> {
    fs::rename(part_path(path), path).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn create_parent(path: &Path) -> Result<(), OutputError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir).map_err(|source| OutputError::Io {
            path: dir.to_path_buf(),
            source,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Trackers
// =============================================================================

/// A particle property recorded in the output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tracker {
    Lon,
    Lat,
    Depth,
    Mortality,
    /// Index of the zone the particle is in, -1 outside.
    Zone(ZoneKind),
    /// Index of the release zone, -1 when not released in a zone.
    ReleaseZone,
    Length,
    Stage,
    /// 1 once recruited in any zone.
    Recruited,
    /// Dataset variable at the particle position.
    Variable(String),
}

impl Tracker {
    pub fn name(&self) -> String {
        match self {
            Tracker::Lon => "lon".to_string(),
            Tracker::Lat => "lat".to_string(),
            Tracker::Depth => "depth".to_string(),
            Tracker::Mortality => "mortality".to_string(),
            Tracker::Zone(ZoneKind::Release) => "zone_release".to_string(),
            Tracker::Zone(ZoneKind::Recruitment) => "zone_recruitment".to_string(),
            Tracker::ReleaseZone => "release_zone".to_string(),
            Tracker::Length => "length".to_string(),
            Tracker::Stage => "stage".to_string(),
            Tracker::Recruited => "recruited".to_string(),
            Tracker::Variable(name) => name.clone(),
        }
    }

    pub fn long_name(&self) -> String {
        match self {
            Tracker::Lon => "particle longitude".to_string(),
            Tracker::Lat => "particle latitude".to_string(),
            Tracker::Depth => "particle depth".to_string(),
            Tracker::Mortality => format!("particle mortality {}", Mortality::legend()),
            Tracker::Zone(kind) => format!("{kind} zone the particle is in"),
            Tracker::ReleaseZone => "release zone".to_string(),
            Tracker::Length => "particle length".to_string(),
            Tracker::Stage => "development stage".to_string(),
            Tracker::Recruited => "recruitment status".to_string(),
            Tracker::Variable(name) => format!("{name} at particle location"),
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Tracker::Lon => "degree_east",
            Tracker::Lat => "degree_north",
            Tracker::Depth => "meter",
            Tracker::Length => "millimeter",
            _ => "",
        }
    }

    /// Recorded as an integer variable.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Tracker::Mortality | Tracker::Zone(_) | Tracker::ReleaseZone | Tracker::Stage | Tracker::Recruited
        )
    }

    pub fn value(&self, particle: &Particle, dataset: &dyn Dataset, time: f64) -> Result<f64, DatasetError> {
        let index = |zone: Option<usize>| zone.map_or(-1.0, |z| z as f64);
        Ok(match self {
            Tracker::Lon => particle.geo().lon,
            Tracker::Lat => particle.geo().lat,
            Tracker::Depth => particle.geo().depth,
            Tracker::Mortality => particle.death_cause().code() as f64,
            Tracker::Zone(ZoneKind::Release) => index(particle.zones.release),
            Tracker::Zone(ZoneKind::Recruitment) => index(particle.zones.recruitment),
            Tracker::ReleaseZone => index(particle.release_zone()),
            Tracker::Length => particle.growth.map_or(f64::NAN, |g| g.length),
            Tracker::Stage => particle.growth.map_or(f64::NAN, |g| g.stage as f64),
            Tracker::Recruited => {
                let recruited = particle.recruitment.as_ref().is_some_and(|r| r.is_recruited());
                if recruited { 1.0 } else { 0.0 }
            }
            Tracker::Variable(name) => {
                if particle.is_living() {
                    dataset.get(name, particle.pos(), time)?
                } else {
                    f64::NAN
                }
            }
        })
    }
}

// =============================================================================
// Writers
// =============================================================================

/// Zone outline written in the output header.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneOutline {
    pub key: String,
    pub kind: ZoneKind,
    pub color: String,
    /// (lon, lat)
    pub edge: Vec<(f64, f64)>,
}

impl ZoneOutline {
    /// Outlines of every loaded zone, release zones first.
    pub fn from_manager(zones: &ZoneManager) -> Vec<Self> {
        [ZoneKind::Release, ZoneKind::Recruitment]
            .into_iter()
            .flat_map(|kind| zones.zones(kind))
            .map(|zone| ZoneOutline {
                key: zone.key().to_string(),
                kind: zone.kind(),
                color: zone.color().to_string(),
                edge: zone.geo_polygon().vertices().collect(),
            })
            .collect()
    }
}

/// What a writer needs to lay out its file.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputHeader {
    pub trackers: Vec<Tracker>,
    pub n_drifters: usize,
    /// `"3d"` or `"2d"`
    pub transport_dimension: String,
    /// Time units, e.g. `seconds since 1900-01-01 00:00`.
    pub time_units: String,
    pub calendar: String,
    pub zones: Vec<ZoneOutline>,
    /// Configuration parameters as `key = value` pairs.
    pub attributes: Vec<(String, String)>,
}

/// One record: `values[tracker][drifter]`, NaN for drifters not released yet.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub time: f64,
    pub values: Vec<Vec<f64>>,
}

pub trait TrajectoryWriter: Send {
    fn write_record(&mut self, record: &Record) -> Result<(), OutputError>;

    /// Flush, close and rename the file; returns its final path.
    fn finish(&mut self) -> Result<PathBuf, OutputError>;
}

/// Open a writer of the configured format at `path`.
pub fn create_writer(
    format: OutputFormat,
    path: &Path,
    header: &OutputHeader,
) -> Result<Box<dyn TrajectoryWriter>, OutputError> {
    match format {
        OutputFormat::Csv => Ok(Box::new(CsvTrajectoryWriter::create(path, header)?)),
        #[cfg(feature = "netcdf")]
        OutputFormat::Netcdf => Ok(Box::new(NetcdfTrajectoryWriter::create(path, header)?)),
        #[cfg(not(feature = "netcdf"))]
        OutputFormat::Netcdf => Err(NetCDFError::FeatureDisabled.into()),
    }
}

// =============================================================================
// Recorder
// =============================================================================

/// Samples the population and feeds a writer.
pub struct Recorder {
    trackers: Vec<Tracker>,
    frequency: usize,
    n_drifters: usize,
    writer: Box<dyn TrajectoryWriter>,
    n_records: usize,
    last_step: Option<usize>,
}

impl Recorder {
    pub fn new(header: &OutputHeader, frequency: usize, writer: Box<dyn TrajectoryWriter>) -> Self {
        Self {
            trackers: header.trackers.clone(),
            frequency: frequency.max(1),
            n_drifters: header.n_drifters,
            writer,
            n_records: 0,
            last_step: None,
        }
    }

    pub fn is_due(&self, step: usize) -> bool {
        step % self.frequency == 0
    }

    pub fn n_records(&self) -> usize {
        self.n_records
    }

    /// Sample the released particles; particle `index` fills drifter `index`.
    pub fn snapshot(&self, time: f64, particles: &[Particle], dataset: &dyn Dataset) -> Result<Record, OutputError> {
        let mut values = vec![vec![f64::NAN; self.n_drifters]; self.trackers.len()];
        for particle in particles {
            let drifter = particle.index();
            if drifter >= self.n_drifters {
                return Err(OutputError::DrifterOutOfRange {
                    drifter,
                    n_drifters: self.n_drifters,
                });
            }
            for (column, tracker) in values.iter_mut().zip(&self.trackers) {
                column[drifter] = tracker.value(particle, dataset, time)?;
            }
        }
        Ok(Record { time, values })
    }

    /// Write a record at `step` if it is due.
    pub fn record(
        &mut self,
        step: usize,
        time: f64,
        particles: &[Particle],
        dataset: &dyn Dataset,
    ) -> Result<bool, OutputError> {
        if !self.is_due(step) || self.last_step == Some(step) {
            return Ok(false);
        }
        self.force_record(step, time, particles, dataset)?;
        Ok(true)
    }

    /// Write a record at `step` unless one was already written.
    pub fn force_record(
        &mut self,
        step: usize,
        time: f64,
        particles: &[Particle],
        dataset: &dyn Dataset,
    ) -> Result<(), OutputError> {
        if self.last_step == Some(step) {
            return Ok(());
        }
        let record = self.snapshot(time, particles, dataset)?;
        self.writer.write_record(&record)?;
        debug!(record = self.n_records, step, time, "Output record written");
        self.n_records += 1;
        self.last_step = Some(step);
        Ok(())
    }

    pub fn finish(&mut self) -> Result<PathBuf, OutputError> {
        let path = self.writer.finish()?;
        info!(path = %path.display(), records = self.n_records, "Output file closed");
        Ok(path)
    }
}
