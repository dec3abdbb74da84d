//! Buoyancy of pelagic eggs.
//!
//! Eggs are prolate spheroids rising or sinking at their terminal velocity
//! in the local seawater (Stokes' law for ellipsoids):
//!
//! ```text
//! w = g l² / (24 μ ρw) (ln(2 d / l) + 1/2) (ρw - ρegg)
//! ```
//!
//! with `l` and `d` the minor and major axes, `μ` the molecular viscosity
//! and `ρw` the UNESCO seawater density, all in CGS units.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::io::ThresholdTable;
use crate::particle::Particle;
use crate::time::{ONE_DAY, ONE_HOUR};
use crate::types::Move;

use super::seawater::water_density;
use super::{Action, ActionContext, ActionError, Priority};

/// Molecular viscosity of seawater (g/cm/s).
const MOLECULAR_VISCOSITY: f64 = 0.01;
/// Gravity (cm/s²).
const G: f64 = 980.0;

/// Configuration of the buoyancy action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuoyancyConfig {
    /// Egg density (g/cm³).
    pub particle_density: f64,
    /// Table of egg density by age: `age (h);density (g/cm³)`.
    pub density_file: Option<PathBuf>,
    /// Age (days) after which buoyancy stops; the transport duration when
    /// unset. Ignored when growth is enabled (buoyancy applies to eggs).
    pub age_max: Option<f64>,
    pub salinity_field: String,
    pub temperature_field: String,
    /// Egg major axis (cm).
    pub mean_major_axis: f64,
    /// Egg minor axis (cm).
    pub mean_minor_axis: f64,
    pub priority: Priority,
}

impl Default for BuoyancyConfig {
    fn default() -> Self {
        Self {
            particle_density: 1.025,
            density_file: None,
            age_max: None,
            salinity_field: "salt".to_string(),
            temperature_field: "temp".to_string(),
            mean_major_axis: 0.14,
            mean_minor_axis: 0.05,
            priority: Priority::Normal,
        }
    }
}

impl BuoyancyConfig {
    /// Build the action.
    ///
    /// `growth` tells whether the growth model is enabled and
    /// `transport_duration` (s) is the default age limit.
    pub fn build(&self, growth: bool, transport_duration: f64) -> Result<Buoyancy, ActionError> {
        let density = match &self.density_file {
            Some(path) => EggDensity::ByAge(ThresholdTable::load(path, 1)?),
            None => EggDensity::Constant(self.particle_density),
        };
        if !(self.mean_minor_axis > 0.0 && self.mean_major_axis > 0.0) {
            return Err(ActionError::InvalidParameter {
                action: "buoyancy",
                name: "mean_minor_axis",
                message: "egg axes must be positive".to_string(),
            });
        }
        let limit = if growth {
            BuoyancyLimit::EggStage
        } else {
            BuoyancyLimit::MaxAge(self.age_max.map_or(transport_duration, |days| days * ONE_DAY))
        };
        Ok(Buoyancy {
            density,
            limit,
            salinity_field: self.salinity_field.clone(),
            temperature_field: self.temperature_field.clone(),
            shape_factor: G * self.mean_minor_axis.powi(2) / (24.0 * MOLECULAR_VISCOSITY)
                * ((2.0 * self.mean_major_axis / self.mean_minor_axis).ln() + 0.5),
            priority: self.priority,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
enum EggDensity {
    Constant(f64),
    /// Ages in hours.
    ByAge(ThresholdTable),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum BuoyancyLimit {
    /// Seconds.
    MaxAge(f64),
    EggStage,
}

#[derive(Clone, Debug)]
pub struct Buoyancy {
    density: EggDensity,
    limit: BuoyancyLimit,
    salinity_field: String,
    temperature_field: String,
    /// `g l² / (24 μ) (ln(2 d / l) + 1/2)`.
    shape_factor: f64,
    priority: Priority,
}

impl Buoyancy {
    /// Vertical velocity (m/s, positive upward) of an egg of density
    /// `egg_density` (g/cm³).
    pub fn terminal_velocity(&self, salinity: f64, temperature: f64, egg_density: f64) -> f64 {
        let rho = water_density(salinity, temperature);
        self.shape_factor / rho * (rho - egg_density) / 100.0
    }

    fn egg_density(&self, age: f64) -> f64 {
        match &self.density {
            EggDensity::Constant(d) => *d,
            EggDensity::ByAge(table) => table.lookup(age / ONE_HOUR, 0),
        }
    }

    fn applies(&self, particle: &Particle) -> bool {
        match self.limit {
            BuoyancyLimit::MaxAge(age_max) => particle.age() < age_max,
            BuoyancyLimit::EggStage => particle.growth.is_some_and(|g| g.stage == 0),
        }
    }
}

impl Action for Buoyancy {
    fn name(&self) -> &'static str {
        "buoyancy"
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn execute(&self, particle: &mut Particle, ctx: &ActionContext) -> Result<(), ActionError> {
        let ds = ctx.dataset;
        if !ds.is_3d() {
            return Err(ActionError::Requires3D { action: self.name() });
        }
        if !self.applies(particle) {
            return Ok(());
        }

        let p = particle.pos();
        let salt = ds.get(&self.salinity_field, p, ctx.time)?;
        let temp = ds.get(&self.temperature_field, p, ctx.time)?;
        if salt.is_nan() || temp.is_nan() {
            return Ok(());
        }
        let w = self.terminal_velocity(salt, temp, self.egg_density(particle.age()));
        let depth = particle.point().depth() + w * ctx.dt.abs();
        let dz = ds.depth2z(p.x, p.y, depth) - p.z;
        particle.increment(Move::vertical(dz))?;
        Ok(())
    }

    fn required_variables(&self) -> Vec<String> {
        vec![self.salinity_field.clone(), self.temperature_field.clone()]
    }
}
