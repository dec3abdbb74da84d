use serde::{Deserialize, Serialize};

use crate::time::ONE_DAY;

use super::Particle;

/// Particle property used by thresholds (migration, recruitment).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticleVariable {
    /// Age in days.
    Age,
    /// Length in mm, NaN without growth.
    Length,
    /// Development stage index, NaN without growth.
    Stage,
}

impl ParticleVariable {
    pub fn value(self, particle: &Particle) -> f64 {
        match self {
            ParticleVariable::Age => particle.age() / ONE_DAY,
            ParticleVariable::Length => particle.growth.map_or(f64::NAN, |g| g.length),
            ParticleVariable::Stage => particle.growth.map_or(f64::NAN, |g| g.stage as f64),
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            ParticleVariable::Age => "day",
            ParticleVariable::Length => "millimeter",
            ParticleVariable::Stage => "",
        }
    }
}
