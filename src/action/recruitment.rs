//! Recruitment in zones.
//!
//! A particle is recruited in a recruitment zone once it has stayed there
//! for `duration_min` while meeting the age or length criterion. The timer
//! is per particle and restarts when the particle changes zone.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::particle::{Particle, RecruitmentState};
use crate::time::ONE_DAY;

use super::{Action, ActionContext, ActionError, Priority};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecruitmentCriterion {
    #[default]
    Age,
    Length,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecruitmentConfig {
    pub criterion: RecruitmentCriterion,
    /// Days.
    pub limit_age: f64,
    /// mm
    pub limit_length: f64,
    /// Days spent in the zone before recruitment.
    pub duration_min: f64,
    /// Freeze recruited particles.
    pub stop_moving: bool,
    pub zone_file: PathBuf,
    pub priority: Priority,
}

impl Default for RecruitmentConfig {
    fn default() -> Self {
        Self {
            criterion: RecruitmentCriterion::Age,
            limit_age: 14.0,
            limit_length: 10.0,
            duration_min: 0.0,
            stop_moving: true,
            zone_file: PathBuf::from("recruitment_zones.toml"),
            priority: Priority::Normal,
        }
    }
}

impl RecruitmentConfig {
    /// Build the action for `n_zones` recruitment zones.
    pub fn build(&self, growth: bool, n_zones: usize) -> Result<RecruitmentZone, ActionError> {
        if self.criterion == RecruitmentCriterion::Length && !growth {
            return Err(ActionError::RequiresGrowth {
                action: "recruitment",
            });
        }
        if self.duration_min < 0.0 {
            return Err(ActionError::InvalidParameter {
                action: "recruitment",
                name: "duration_min",
                message: "must be positive or zero".to_string(),
            });
        }
        let limit = match self.criterion {
            RecruitmentCriterion::Age => self.limit_age,
            RecruitmentCriterion::Length => self.limit_length,
        };
        Ok(RecruitmentZone {
            criterion: self.criterion,
            limit,
            duration_min: self.duration_min * ONE_DAY,
            stop_moving: self.stop_moving,
            n_zones,
            priority: self.priority,
        })
    }
}

#[derive(Clone, Debug)]
pub struct RecruitmentZone {
    criterion: RecruitmentCriterion,
    /// Days or mm.
    limit: f64,
    /// Seconds.
    duration_min: f64,
    stop_moving: bool,
    n_zones: usize,
    priority: Priority,
}

impl RecruitmentZone {
    fn satisfies(&self, particle: &Particle) -> bool {
        match self.criterion {
            RecruitmentCriterion::Age => particle.age() / ONE_DAY >= self.limit,
            RecruitmentCriterion::Length => particle.growth.is_some_and(|g| g.length >= self.limit),
        }
    }

    pub fn stops_moving(&self) -> bool {
        self.stop_moving
    }
}

impl Action for RecruitmentZone {
    fn name(&self) -> &'static str {
        "recruitment"
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn init(&self, particle: &mut Particle) {
        particle.recruitment = Some(RecruitmentState::new(self.n_zones));
    }

    fn execute(&self, particle: &mut Particle, ctx: &ActionContext) -> Result<(), ActionError> {
        let satisfied = self.satisfies(particle);
        let current = particle.zones.recruitment;
        let n_zones = self.n_zones;
        let state = particle.recruitment.get_or_insert_with(|| RecruitmentState::new(n_zones));

        if self.stop_moving && state.is_recruited() {
            particle.lock();
            return Ok(());
        }
        state.new_recruited = false;

        let Some(zone) = current else {
            return Ok(());
        };
        if state.is_recruited_in(zone) || !satisfied {
            return Ok(());
        }
        state.time_in_zone = if state.zone == Some(zone) {
            state.time_in_zone + ctx.dt.abs()
        } else {
            0.0
        };
        state.zone = Some(zone);
        let recruited = state.time_in_zone >= self.duration_min;
        state.new_recruited = recruited;
        state.set_recruited(zone, recruited);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::basin;
    use crate::time::Calendar;
    use crate::types::GridPos;
    use crate::zone::ZoneManager;

    fn particle(age_days: f64, zone: Option<usize>) -> Particle {
        let mut p = Particle::from_grid(0, GridPos::new(5.0, 5.0, 0.0), 0.0, 1);
        p.increment_age(age_days * ONE_DAY);
        p.zones.recruitment = zone;
        p
    }

    #[test]
    fn test_recruited_after_duration() {
        let ds = basin(0.0, 0.0, 1);
        let zones = ZoneManager::new();
        let ctx = ActionContext::new(&ds, &zones, 0.0, ONE_DAY / 2.0, Calendar::Gregorian);
        let action = RecruitmentConfig {
            limit_age: 1.0,
            duration_min: 1.0,
            ..RecruitmentConfig::default()
        }
        .build(false, 2)
        .unwrap();

        let mut p = particle(2.0, Some(1));
        action.init(&mut p);
        // entering: timer starts at 0, then 0.5 and 1 day
        for _ in 0..2 {
            action.execute(&mut p, &ctx).unwrap();
            assert!(!p.recruitment.as_ref().unwrap().is_recruited());
        }
        action.execute(&mut p, &ctx).unwrap();
        let state = p.recruitment.as_ref().unwrap();
        assert!(state.is_recruited_in(1));
        assert!(state.new_recruited);
        assert!(!p.is_locked());

        // next step freezes the particle
        action.execute(&mut p, &ctx).unwrap();
        assert!(p.is_locked());
    }

    #[test]
    fn test_timer_restarts_in_new_zone() {
        let ds = basin(0.0, 0.0, 1);
        let zones = ZoneManager::new();
        let ctx = ActionContext::new(&ds, &zones, 0.0, ONE_DAY, Calendar::Gregorian);
        let action = RecruitmentConfig {
            limit_age: 0.0,
            duration_min: 1.0,
            stop_moving: false,
            ..RecruitmentConfig::default()
        }
        .build(false, 2)
        .unwrap();

        let mut p = particle(1.0, Some(0));
        action.execute(&mut p, &ctx).unwrap();
        p.zones.recruitment = Some(1);
        action.execute(&mut p, &ctx).unwrap();
        let state = p.recruitment.as_ref().unwrap();
        assert_eq!(state.zone, Some(1));
        assert_eq!(state.time_in_zone, 0.0);
        assert!(!state.is_recruited());
    }

    #[test]
    fn test_criterion_not_met() {
        let ds = basin(0.0, 0.0, 1);
        let zones = ZoneManager::new();
        let ctx = ActionContext::new(&ds, &zones, 0.0, ONE_DAY, Calendar::Gregorian);
        let action = RecruitmentConfig::default().build(false, 1).unwrap();
        let mut p = particle(1.0, Some(0));
        action.execute(&mut p, &ctx).unwrap();
        assert_eq!(p.recruitment.as_ref().unwrap().zone, None);

        assert!(matches!(
            RecruitmentConfig {
                criterion: RecruitmentCriterion::Length,
                ..RecruitmentConfig::default()
            }
            .build(false, 1),
            Err(ActionError::RequiresGrowth { .. })
        ));
    }
}
