//! Death by cold or hot water.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::io::ThresholdTable;
use crate::particle::{Mortality, Particle};
use crate::time::ONE_HOUR;

use super::{Action, ActionContext, ActionError, Priority};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LethalTemperatureConfig {
    pub temperature_field: String,
    pub cold_lethal_temperature_egg: f64,
    pub hot_lethal_temperature_egg: f64,
    /// Required when growth is enabled.
    pub cold_lethal_temperature_larva: Option<f64>,
    pub hot_lethal_temperature_larva: Option<f64>,
    /// Thresholds by age: `age (h);cold (°C);hot (°C)`. Used without growth.
    pub lethal_temp_file: Option<PathBuf>,
    pub priority: Priority,
}

impl Default for LethalTemperatureConfig {
    fn default() -> Self {
        Self {
            temperature_field: "temp".to_string(),
            cold_lethal_temperature_egg: 4.0,
            hot_lethal_temperature_egg: 30.0,
            cold_lethal_temperature_larva: None,
            hot_lethal_temperature_larva: None,
            lethal_temp_file: None,
            priority: Priority::Normal,
        }
    }
}

impl LethalTemperatureConfig {
    pub fn build(&self, growth: bool) -> Result<LethalTemperature, ActionError> {
        let thresholds = if growth {
            let larva = self.cold_lethal_temperature_larva.zip(self.hot_lethal_temperature_larva);
            let Some((cold, hot)) = larva else {
                return Err(ActionError::InvalidParameter {
                    action: "lethal temperature",
                    name: "cold_lethal_temperature_larva",
                    message: "larva thresholds are required with growth".to_string(),
                });
            };
            Thresholds::Staged {
                egg: (self.cold_lethal_temperature_egg, self.hot_lethal_temperature_egg),
                larva: (cold, hot),
            }
        } else {
            match &self.lethal_temp_file {
                Some(path) => Thresholds::ByAge(ThresholdTable::load(path, 2)?),
                None => Thresholds::Constant(self.cold_lethal_temperature_egg, self.hot_lethal_temperature_egg),
            }
        };
        Ok(LethalTemperature {
            temperature_field: self.temperature_field.clone(),
            thresholds,
            priority: self.priority,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Thresholds {
    Constant(f64, f64),
    /// Ages in hours, columns cold then hot.
    ByAge(ThresholdTable),
    Staged { egg: (f64, f64), larva: (f64, f64) },
}

#[derive(Clone, Debug)]
pub struct LethalTemperature {
    temperature_field: String,
    thresholds: Thresholds,
    priority: Priority,
}

impl LethalTemperature {
    /// Same cold/hot limits at all ages.
    pub fn constant(temperature_field: impl Into<String>, cold: f64, hot: f64) -> Self {
        Self {
            temperature_field: temperature_field.into(),
            thresholds: Thresholds::Constant(cold, hot),
            priority: Priority::Normal,
        }
    }

    /// `(cold, hot)` limits for a particle.
    fn limits(&self, particle: &Particle) -> (f64, f64) {
        match &self.thresholds {
            Thresholds::Constant(cold, hot) => (*cold, *hot),
            Thresholds::ByAge(table) => {
                let hours = particle.age() / ONE_HOUR;
                (table.lookup(hours, 0), table.lookup(hours, 1))
            }
            Thresholds::Staged { egg, larva } => match particle.growth {
                Some(g) if g.stage > 0 => *larva,
                _ => *egg,
            },
        }
    }
}

impl Action for LethalTemperature {
    fn name(&self) -> &'static str {
        "lethal temperature"
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn execute(&self, particle: &mut Particle, ctx: &ActionContext) -> Result<(), ActionError> {
        let temperature = ctx.dataset.get(&self.temperature_field, particle.pos(), ctx.time)?;
        let (cold, hot) = self.limits(particle);
        if temperature <= cold {
            particle.kill(Mortality::DeadCold);
        } else if temperature >= hot {
            particle.kill(Mortality::DeadHot);
        }
        Ok(())
    }

    fn required_variables(&self) -> Vec<String> {
        vec![self.temperature_field.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::basin;
    use crate::particle::GrowthState;
    use crate::time::Calendar;
    use crate::types::GridPos;
    use crate::zone::ZoneManager;

    fn run(action: &LethalTemperature, particle: &mut Particle) {
        // 2-D basin: temp = 17.5 everywhere
        let ds = basin(0.0, 0.0, 1);
        let zones = ZoneManager::new();
        let ctx = ActionContext::new(&ds, &zones, 0.0, 600.0, Calendar::Gregorian);
        action.execute(particle, &ctx).unwrap();
    }

    fn particle() -> Particle {
        Particle::from_grid(0, GridPos::new(5.0, 5.0, 0.0), 0.0, 1)
    }

    #[test]
    fn test_constant_thresholds() {
        let mut p = particle();
        run(&LethalTemperature::constant("temp", 10.0, 25.0), &mut p);
        assert!(p.is_living());

        run(&LethalTemperature::constant("temp", 18.0, 25.0), &mut p);
        assert_eq!(p.death_cause(), Mortality::DeadCold);

        let mut p = particle();
        run(&LethalTemperature::constant("temp", 5.0, 17.5), &mut p);
        assert_eq!(p.death_cause(), Mortality::DeadHot);
    }

    #[test]
    fn test_staged_thresholds() {
        let action = LethalTemperatureConfig {
            cold_lethal_temperature_egg: 18.0,
            hot_lethal_temperature_egg: 30.0,
            cold_lethal_temperature_larva: Some(10.0),
            hot_lethal_temperature_larva: Some(30.0),
            ..LethalTemperatureConfig::default()
        }
        .build(true)
        .unwrap();

        let mut larva = particle();
        larva.growth = Some(GrowthState { length: 5.0, stage: 1 });
        run(&action, &mut larva);
        assert!(larva.is_living());

        let mut egg = particle();
        egg.growth = Some(GrowthState { length: 2.8, stage: 0 });
        run(&action, &mut egg);
        assert_eq!(egg.death_cause(), Mortality::DeadCold);

        assert!(LethalTemperatureConfig::default().build(true).is_err());
    }

    #[test]
    fn test_age_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"age (h);cold;hot\n0;5;30\n24;18;30\n").unwrap();
        let action = LethalTemperatureConfig {
            lethal_temp_file: Some(file.path().to_path_buf()),
            ..LethalTemperatureConfig::default()
        }
        .build(false)
        .unwrap();

        let mut young = particle();
        run(&action, &mut young);
        assert!(young.is_living());

        let mut old = particle();
        old.increment_age(30.0 * ONE_HOUR);
        run(&action, &mut old);
        assert_eq!(old.death_cause(), Mortality::DeadCold);
    }
}
