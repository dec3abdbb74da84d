//! Simulation configuration.
//!
//! A run is described by a TOML file:
//!
//! ```toml
//! seed = 7
//! id = "gulf_2010"
//!
//! [time]
//! calendar = "gregorian"
//! initial_time = "year 2010 month 01 day 15 at 00:00"
//! time_step = 1800
//! transport_duration = "0030 day(s) 00 hour(s) 00 minute(s)"
//! release_events = ["year 2010 month 01 day 15 at 00:00", "year 2010 month 01 day 16 at 00:00"]
//!
//! [dataset]
//! files = ["roms_his_0001.nc", "roms_his_0002.nc"]
//! three_d = true
//!
//! [transport]
//! coastline = "bouncing"
//!
//! [transport.advection]
//! scheme = "rk4"
//!
//! [dispersion.horizontal]
//! epsilon = 1e-9
//!
//! [release]
//! method = "zone"
//! number_particles = 1000
//! zone_file = "zones.toml"
//!
//! [biology.growth]
//! coeff1 = 0.02
//!
//! [output]
//! format = "netcdf"
//! record_frequency = 6
//! ```
//!
//! Every section has defaults. Relative input paths are resolved against
//! the directory of the configuration file by [`SimulationConfig::load`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::action::{
    Advection, BuoyancyConfig, CoastlineBehavior, HorizontalDispersion, LethalTemperatureConfig, LinearGrowth,
    MigrationConfig, RecruitmentConfig, VerticalDispersion,
};
use crate::geodesy::Coordinate;
use crate::io::RomsVariableNames;
use crate::output::OutputConfig;
use crate::release::ReleaseMethod;
use crate::time::{Calendar, TimeArrow, TimeError, TimeManager, parse_duration};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse configuration {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Invalid configuration value for {field}: {message}")]
    ValidationFailed { field: String, message: String },

    #[error("{field}: {source}")]
    Time {
        field: String,
        #[source]
        source: TimeError,
    },
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationFailed {
        field: field.to_string(),
        message: message.into(),
    }
}

// =============================================================================
// Sections
// =============================================================================

/// `[time]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    pub calendar: Calendar,
    /// `"year YYYY month MM day DD at HH:mm"`
    pub initial_time: String,
    /// Absolute time step (s).
    pub time_step: f64,
    /// `"DDDD day(s) HH hour(s) mm minute(s)"`
    pub transport_duration: String,
    pub time_arrow: TimeArrow,
    /// Particles older than the transport duration keep drifting.
    pub keep_drifting: bool,
    /// Release dates; empty for a single release at the initial time.
    pub release_events: Vec<String>,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            calendar: Calendar::Gregorian,
            initial_time: "year 1900 month 01 day 01 at 00:00".to_string(),
            time_step: 3600.0,
            transport_duration: "0010 day(s) 00 hour(s) 00 minute(s)".to_string(),
            time_arrow: TimeArrow::Forward,
            keep_drifting: false,
            release_events: Vec::new(),
        }
    }
}

impl TimeConfig {
    pub fn new(initial_time: impl Into<String>, time_step: f64, transport_duration: impl Into<String>) -> Self {
        Self {
            initial_time: initial_time.into(),
            time_step,
            transport_duration: transport_duration.into(),
            ..Self::default()
        }
    }

    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_arrow(mut self, arrow: TimeArrow) -> Self {
        self.time_arrow = arrow;
        self
    }

    pub fn with_keep_drifting(mut self, keep_drifting: bool) -> Self {
        self.keep_drifting = keep_drifting;
        self
    }

    pub fn with_release_events(mut self, events: Vec<String>) -> Self {
        self.release_events = events;
        self
    }

    /// Initial time (s since the calendar origin).
    pub fn t0(&self) -> Result<f64, ConfigError> {
        self.calendar
            .parse_date(&self.initial_time)
            .map_err(|source| ConfigError::Time {
                field: "time.initial_time".to_string(),
                source,
            })
    }

    /// Transport duration (s).
    pub fn transport_duration_seconds(&self) -> Result<f64, ConfigError> {
        parse_duration(&self.transport_duration).map_err(|source| ConfigError::Time {
            field: "time.transport_duration".to_string(),
            source,
        })
    }

    /// Release event times (s), in the order given.
    pub fn release_event_times(&self) -> Result<Vec<f64>, ConfigError> {
        self.release_events
            .iter()
            .map(|date| {
                self.calendar.parse_date(date).map_err(|source| ConfigError::Time {
                    field: "time.release_events".to_string(),
                    source,
                })
            })
            .collect()
    }

    /// Clock for the run; the release span is set by the simulation.
    pub fn time_manager(&self) -> Result<TimeManager, ConfigError> {
        Ok(TimeManager::new(
            self.calendar,
            self.t0()?,
            self.time_step,
            self.time_arrow,
            self.transport_duration_seconds()?,
            self.keep_drifting,
        ))
    }
}

/// `[dataset]`: ROMS history files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// History files, concatenated in time order.
    pub files: Vec<PathBuf>,
    /// Grid file when the history files do not carry the grid.
    pub grid_file: Option<PathBuf>,
    /// Transport in 3-D; false runs on depth-averaged currents.
    pub three_d: bool,
    pub variables: RomsVariableNames,
    /// Subdomain corners `[[lon1, lat1], [lon2, lat2]]`.
    pub range: Option<[[Coordinate; 2]; 2]>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            grid_file: None,
            three_d: true,
            variables: RomsVariableNames::default(),
            range: None,
        }
    }
}

impl DatasetConfig {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    pub fn with_grid_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.grid_file = Some(path.into());
        self
    }

    pub fn with_three_d(mut self, three_d: bool) -> Self {
        self.three_d = three_d;
        self
    }

    /// Subdomain corners as `((lon1, lat1), (lon2, lat2))`.
    pub fn range_corners(&self) -> Option<((f64, f64), (f64, f64))> {
        self.range
            .map(|[p1, p2]| ((p1[0].degrees(), p1[1].degrees()), (p2[0].degrees(), p2[1].degrees())))
    }

    /// Checks needed before opening files.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.files.is_empty() {
            return Err(invalid("dataset.files", "at least one history file is required"));
        }
        for file in self.files.iter().chain(self.grid_file.iter()) {
            if !file.exists() {
                return Err(ConfigError::FileNotFound {
                    path: file.display().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// `[transport.advection]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvectionConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub advection: Advection,
}

impl Default for AdvectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            advection: Advection::default(),
        }
    }
}

/// `[transport]`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub advection: AdvectionConfig,
    pub coastline: CoastlineBehavior,
}

/// `[dispersion]`; both processes are off unless their table is present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispersionConfig {
    pub horizontal: Option<HorizontalDispersion>,
    pub vertical: Option<VerticalDispersion>,
}

/// `[biology.*]`; each process is off unless its table is present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiologyConfig {
    pub growth: Option<LinearGrowth>,
    pub buoyancy: Option<BuoyancyConfig>,
    pub lethal_temperature: Option<LethalTemperatureConfig>,
    pub migration: Option<MigrationConfig>,
    pub recruitment: Option<RecruitmentConfig>,
}

// =============================================================================
// Simulation
// =============================================================================

/// Complete description of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Run identifier, used in the output file name.
    pub id: String,
    /// Master seed of every random draw.
    pub seed: u64,
    pub time: TimeConfig,
    pub dataset: DatasetConfig,
    pub transport: TransportConfig,
    pub dispersion: DispersionConfig,
    pub release: ReleaseMethod,
    pub biology: BiologyConfig,
    pub output: OutputConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            id: "run".to_string(),
            seed: 1,
            time: TimeConfig::default(),
            dataset: DatasetConfig::default(),
            transport: TransportConfig::default(),
            dispersion: DispersionConfig::default(),
            release: ReleaseMethod::default(),
            biology: BiologyConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Read, parse and validate a configuration file. Relative input paths
    /// are taken from the directory of the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_time(mut self, time: TimeConfig) -> Self {
        self.time = time;
        self
    }

    pub fn with_dataset(mut self, dataset: DatasetConfig) -> Self {
        self.dataset = dataset;
        self
    }

    pub fn with_advection(mut self, advection: Advection) -> Self {
        self.transport.advection = AdvectionConfig {
            enabled: true,
            advection,
        };
        self
    }

    pub fn without_advection(mut self) -> Self {
        self.transport.advection.enabled = false;
        self
    }

    pub fn with_coastline(mut self, behavior: CoastlineBehavior) -> Self {
        self.transport.coastline = behavior;
        self
    }

    pub fn with_horizontal_dispersion(mut self, dispersion: HorizontalDispersion) -> Self {
        self.dispersion.horizontal = Some(dispersion);
        self
    }

    pub fn with_vertical_dispersion(mut self, dispersion: VerticalDispersion) -> Self {
        self.dispersion.vertical = Some(dispersion);
        self
    }

    pub fn with_release(mut self, release: ReleaseMethod) -> Self {
        self.release = release;
        self
    }

    pub fn with_biology(mut self, biology: BiologyConfig) -> Self {
        self.biology = biology;
        self
    }

    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    /// Check values that the parser cannot. Dataset files are checked
    /// separately by [`DatasetConfig::validate`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let time = &self.time;
        if !(time.time_step.is_finite() && time.time_step > 0.0) {
            return Err(invalid("time.time_step", "must be a positive number of seconds"));
        }
        let t0 = time.t0()?;
        if time.transport_duration_seconds()? <= 0.0 {
            return Err(invalid("time.transport_duration", "must be longer than zero"));
        }
        let sign = time.time_arrow.sign();
        if let Some(event) = time.release_event_times()?.into_iter().find(|&e| sign * e < sign * t0) {
            return Err(invalid(
                "time.release_events",
                format!("event at {event} s precedes the initial time {t0} s"),
            ));
        }

        self.validate_release()?;

        if let Some(h) = &self.dispersion.horizontal {
            if !(h.epsilon.is_finite() && h.epsilon >= 0.0) {
                return Err(invalid("dispersion.horizontal.epsilon", "must be positive or zero"));
            }
        }
        if let Some(growth) = &self.biology.growth {
            growth
                .validate()
                .map_err(|e| invalid("biology.growth", e.to_string()))?;
        }
        if self.output.record_frequency == 0 {
            return Err(invalid("output.record_frequency", "must be at least 1"));
        }
        if let Some(name) = self.output.custom_tracers.iter().find(|n| n.trim().is_empty()) {
            return Err(invalid("output.custom_tracers", format!("empty variable name {name:?}")));
        }
        Ok(())
    }

    fn validate_release(&self) -> Result<(), ConfigError> {
        match &self.release {
            ReleaseMethod::Zone { number_particles, .. } if *number_particles == 0 => {
                Err(invalid("release.number_particles", "must be at least 1"))
            }
            ReleaseMethod::Stain {
                number_particles,
                radius,
                thickness,
                ..
            } => {
                if *number_particles == 0 {
                    Err(invalid("release.number_particles", "must be at least 1"))
                } else if !(*radius > 0.0) {
                    Err(invalid("release.radius", "must be positive"))
                } else if *thickness < 0.0 {
                    Err(invalid("release.thickness", "must be positive or zero"))
                } else {
                    Ok(())
                }
            }
            ReleaseMethod::Patchy {
                number_patches,
                particles_per_patch,
                radius,
                zone_file,
                bbox,
                ..
            } => {
                if *number_patches == 0 || *particles_per_patch == 0 {
                    Err(invalid("release.number_patches", "patches and particles per patch must be at least 1"))
                } else if !(*radius > 0.0) {
                    Err(invalid("release.radius", "must be positive"))
                } else if zone_file.is_none() && bbox.is_none() {
                    Err(invalid("release", "patchy release needs a zone_file or a bbox"))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Prefix relative input paths with `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        self.dataset.files.iter_mut().for_each(resolve);
        if let Some(p) = self.dataset.grid_file.as_mut() {
            resolve(p);
        }
        match &mut self.release {
            ReleaseMethod::Zone { zone_file, .. } => resolve(zone_file),
            ReleaseMethod::TextFile { path } => resolve(path),
            ReleaseMethod::Patchy {
                zone_file: Some(zone_file),
                ..
            } => resolve(zone_file),
            _ => {}
        }

        let bio = &mut self.biology;
        if let Some(p) = bio.buoyancy.as_mut().and_then(|b| b.density_file.as_mut()) {
            resolve(p);
        }
        if let Some(p) = bio.lethal_temperature.as_mut().and_then(|l| l.lethal_temp_file.as_mut()) {
            resolve(p);
        }
        if let Some(m) = bio.migration.as_mut() {
            if let Some(p) = m.daytime_depth_file.as_mut() {
                resolve(p);
            }
            if let Some(p) = m.nighttime_depth_file.as_mut() {
                resolve(p);
            }
        }
        if let Some(r) = bio.recruitment.as_mut() {
            resolve(&mut r.zone_file);
        }
    }

    /// Every parameter as a flat `section.key = value` list, written as
    /// output attributes.
    pub fn attributes(&self) -> Vec<(String, String)> {
        match toml::Value::try_from(self) {
            Ok(value) => {
                let mut out = Vec::new();
                flatten("", &value, &mut out);
                out
            }
            Err(e) => {
                warn!(error = %e, "Cannot serialise the configuration into output attributes");
                Vec::new()
            }
        }
    }
}

fn flatten(prefix: &str, value: &toml::Value, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, v) in table {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&name, v, out);
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}
