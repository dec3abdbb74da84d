//! Diel vertical migration.
//!
//! Between sunrise and sunset particles sit at the daytime depth, the rest
//! of the day at the nighttime depth. Depths are constants or step
//! functions of a particle variable read from `;` tables
//! (`threshold;depth`). The move is exclusive on the vertical: it replaces
//! any other vertical displacement of the step.

use std::path::PathBuf;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::io::ThresholdTable;
use crate::particle::{Particle, ParticleVariable};
use crate::time::ONE_DAY;
use crate::types::Move;

use super::{Action, ActionContext, ActionError, Priority};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Variable enabling the migration and indexing the depth tables.
    pub variable: ParticleVariable,
    /// Migration runs while `threshold_min < variable < threshold_max`.
    pub threshold_min: f64,
    pub threshold_max: Option<f64>,
    /// Metres below the surface.
    pub daytime_depth: f64,
    pub daytime_depth_file: Option<PathBuf>,
    pub nighttime_depth: f64,
    pub nighttime_depth_file: Option<PathBuf>,
    /// `HH:MM`
    pub sunrise: String,
    pub sunset: String,
    pub priority: Priority,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            variable: ParticleVariable::Age,
            threshold_min: 0.0,
            threshold_max: None,
            daytime_depth: 30.0,
            daytime_depth_file: None,
            nighttime_depth: 10.0,
            nighttime_depth_file: None,
            sunrise: "06:00".to_string(),
            sunset: "18:00".to_string(),
            priority: Priority::Normal,
        }
    }
}

fn parse_hour(name: &'static str, value: &str) -> Result<f64, ActionError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map(|t| t.num_seconds_from_midnight() as f64)
        .map_err(|e| ActionError::InvalidParameter {
            action: "migration",
            name,
            message: format!("{value:?} is not a HH:MM time ({e})"),
        })
}

impl MigrationConfig {
    pub fn build(&self, growth: bool, is_3d: bool) -> Result<Migration, ActionError> {
        if !is_3d {
            return Err(ActionError::Requires3D { action: "migration" });
        }
        if !growth && self.variable != ParticleVariable::Age {
            return Err(ActionError::RequiresGrowth { action: "migration" });
        }
        let depth = |value: f64, file: &Option<PathBuf>| -> Result<TargetDepth, ActionError> {
            Ok(match file {
                Some(path) => TargetDepth::Table(ThresholdTable::load(path, 1)?),
                None => TargetDepth::Constant(value),
            })
        };
        Ok(Migration {
            variable: self.variable,
            threshold_min: self.threshold_min,
            threshold_max: self.threshold_max.unwrap_or(f64::INFINITY),
            day: depth(self.daytime_depth, &self.daytime_depth_file)?,
            night: depth(self.nighttime_depth, &self.nighttime_depth_file)?,
            sunrise: parse_hour("sunrise", &self.sunrise)?,
            sunset: parse_hour("sunset", &self.sunset)?,
            priority: self.priority,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
enum TargetDepth {
    Constant(f64),
    Table(ThresholdTable),
}

impl TargetDepth {
    /// Target depth (m, negative downward).
    fn at(&self, value: f64) -> f64 {
        let depth = match self {
            TargetDepth::Constant(d) => *d,
            TargetDepth::Table(table) => table.lookup(value, 0),
        };
        -depth.abs()
    }
}

#[derive(Clone, Debug)]
pub struct Migration {
    variable: ParticleVariable,
    threshold_min: f64,
    threshold_max: f64,
    day: TargetDepth,
    night: TargetDepth,
    /// Seconds since midnight.
    sunrise: f64,
    sunset: f64,
    priority: Priority,
}

impl Migration {
    pub fn is_daytime(&self, time: f64) -> bool {
        let second = time.rem_euclid(ONE_DAY);
        second >= self.sunrise && second < self.sunset
    }

    /// Depth the particle should reach at `time`, `None` outside the
    /// migration window.
    pub fn target_depth(&self, particle: &Particle, time: f64) -> Option<f64> {
        let value = self.variable.value(particle);
        if !(value > self.threshold_min && value < self.threshold_max) {
            return None;
        }
        let target = if self.is_daytime(time) { &self.day } else { &self.night };
        Some(target.at(value))
    }
}

impl Action for Migration {
    fn name(&self) -> &'static str {
        "migration"
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn execute(&self, particle: &mut Particle, ctx: &ActionContext) -> Result<(), ActionError> {
        let Some(target) = self.target_depth(particle, ctx.time) else {
            return Ok(());
        };
        let p = particle.pos();
        let bottom = ctx.dataset.z2depth(p.x, p.y, 0.0);
        if target < bottom {
            return Ok(());
        }
        let dz = ctx.dataset.depth2z(p.x, p.y, target) - p.z;
        particle.increment_exclusive(Move::vertical(dz), false, true)?;
        Ok(())
    }
}
