//! Linear, temperature-driven growth of larvae.
//!
//! ```text
//! dL/dt = (c1 + c2 max(T, Tthr)) Q,    Q = F / (F + ks)
//! ```
//!
//! in mm per day, with `F` an optional food concentration. The stage is the
//! index of the last length threshold reached.

use serde::{Deserialize, Serialize};

use crate::particle::{GrowthState, Particle};
use crate::time::ONE_DAY;

use super::{Action, ActionContext, ActionError, Priority};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearGrowth {
    /// mm/day
    pub coeff1: f64,
    /// mm/day/°C
    pub coeff2: f64,
    /// Temperature (°C) below which growth no longer slows down.
    pub threshold_temp: f64,
    pub temperature_field: String,
    /// Food concentration variable limiting growth.
    pub food_field: Option<String>,
    /// Half-saturation food concentration; 0 disables the limitation.
    pub half_saturation: f64,
    /// Length thresholds (mm) of the stages, increasing. The first one is
    /// the hatching length.
    pub stages: Vec<f64>,
    pub priority: Priority,
}

impl Default for LinearGrowth {
    fn default() -> Self {
        Self {
            coeff1: 0.02,
            coeff2: 0.03,
            threshold_temp: 10.0,
            temperature_field: "temp".to_string(),
            food_field: None,
            half_saturation: 0.0,
            stages: vec![2.8, 4.5],
            priority: Priority::Normal,
        }
    }
}

impl LinearGrowth {
    pub fn new(temperature_field: impl Into<String>) -> Self {
        Self {
            temperature_field: temperature_field.into(),
            ..Self::default()
        }
    }

    pub fn with_food(mut self, field: impl Into<String>, half_saturation: f64) -> Self {
        self.food_field = Some(field.into());
        self.half_saturation = half_saturation;
        self
    }

    pub fn with_stages(mut self, stages: Vec<f64>) -> Self {
        self.stages = stages;
        self
    }

    pub fn validate(&self) -> Result<(), ActionError> {
        let increasing = self.stages.windows(2).all(|w| w[0] < w[1]);
        if self.stages.is_empty() || !increasing {
            return Err(ActionError::InvalidParameter {
                action: "growth",
                name: "stages",
                message: format!("expected increasing length thresholds, got {:?}", self.stages),
            });
        }
        if self.half_saturation < 0.0 {
            return Err(ActionError::InvalidParameter {
                action: "growth",
                name: "half_saturation",
                message: "must be positive or zero".to_string(),
            });
        }
        Ok(())
    }

    /// Stage index for a length.
    pub fn stage(&self, length: f64) -> usize {
        self.stages.partition_point(|&t| t <= length).saturating_sub(1)
    }

    /// Length increment (mm) over `dt` seconds.
    pub fn increment(&self, temperature: f64, food: Option<f64>, dt: f64) -> f64 {
        if temperature.is_nan() {
            return 0.0;
        }
        let limitation = match food {
            Some(_) if self.half_saturation == 0.0 => 1.0,
            Some(f) if f.is_nan() => return 0.0,
            Some(f) => f / (f + self.half_saturation),
            None => 1.0,
        };
        (self.coeff1 + self.coeff2 * temperature.max(self.threshold_temp)) * limitation * dt.abs() / ONE_DAY
    }
}

impl Action for LinearGrowth {
    fn name(&self) -> &'static str {
        "growth"
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn init(&self, particle: &mut Particle) {
        let length = self.stages.first().copied().unwrap_or(0.0);
        particle.growth = Some(GrowthState { length, stage: 0 });
    }

    fn execute(&self, particle: &mut Particle, ctx: &ActionContext) -> Result<(), ActionError> {
        let p = particle.pos();
        let temperature = ctx.dataset.get(&self.temperature_field, p, ctx.time)?;
        let food = match &self.food_field {
            Some(field) => Some(ctx.dataset.get(field, p, ctx.time)?),
            None => None,
        };
        let dl = self.increment(temperature, food, ctx.dt);

        let mut state = particle.growth.unwrap_or(GrowthState {
            length: self.stages.first().copied().unwrap_or(0.0),
            stage: 0,
        });
        state.length += dl;
        state.stage = self.stage(state.length);
        particle.growth = Some(state);
        Ok(())
    }

    fn required_variables(&self) -> Vec<String> {
        let mut vars = vec![self.temperature_field.clone()];
        vars.extend(self.food_field.clone());
        vars
    }
}
