//! Particle actions.
//!
//! Every step each living particle runs its enabled [`Action`]s in priority
//! order. Actions add displacements to the particle's move accumulator or
//! update its biological state; the system actions then age the particle,
//! apply the accumulated move under the coastline behaviour and refresh the
//! zones the particle is in.
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Advection  │ → │ Dispersion   │ → │ Biology ...  │ → │ System    │
//! │ (move)     │   │ (move)       │   │ (state/move) │   │ age, move │
//! └────────────┘   └──────────────┘   └──────────────┘   └───────────┘
//! ```

mod advection;
mod buoyancy;
mod dispersion;
mod growth;
mod lethal_temp;
mod migration;
mod recruitment;
mod seawater;
mod system;

pub use advection::{Advection, AdvectionScheme};
pub use buoyancy::{Buoyancy, BuoyancyConfig};
pub use dispersion::{HorizontalDispersion, VerticalDispersion};
pub use growth::LinearGrowth;
pub use lethal_temp::{LethalTemperature, LethalTemperatureConfig};
pub use migration::{Migration, MigrationConfig};
pub use recruitment::{RecruitmentConfig, RecruitmentCriterion, RecruitmentZone};
pub use seawater::{density_surface, water_density};
pub use system::{AgeMonitoring, CoastlineBehavior, MoveAction, bounce_coastline};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::{Dataset, DatasetError};
use crate::io::TableFileError;
use crate::particle::{Particle, ParticleError};
use crate::time::{Calendar, TimeArrow};
use crate::zone::{ZoneFileError, ZoneKind, ZoneManager};

/// Errors raised while building or running actions.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Particle(#[from] ParticleError),

    #[error(transparent)]
    Table(#[from] TableFileError),

    #[error(transparent)]
    Zone(#[from] ZoneFileError),

    #[error("{action}: invalid parameter {name}: {message}")]
    InvalidParameter {
        action: &'static str,
        name: &'static str,
        message: String,
    },

    #[error("{action} cannot run on a depth-averaged dataset")]
    Requires3D { action: &'static str },

    #[error("{action} requires the growth model")]
    RequiresGrowth { action: &'static str },
}

/// Execution order of the actions within a step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

/// What an action sees of the simulation during a step.
#[derive(Clone, Copy)]
pub struct ActionContext<'a> {
    pub dataset: &'a dyn Dataset,
    pub zones: &'a ZoneManager,
    /// Current time (s).
    pub time: f64,
    /// Signed time step (s).
    pub dt: f64,
    pub arrow: TimeArrow,
    pub calendar: Calendar,
}

impl<'a> ActionContext<'a> {
    pub fn new(dataset: &'a dyn Dataset, zones: &'a ZoneManager, time: f64, dt: f64, calendar: Calendar) -> Self {
        let arrow = if dt < 0.0 { TimeArrow::Backward } else { TimeArrow::Forward };
        Self {
            dataset,
            zones,
            time,
            dt,
            arrow,
            calendar,
        }
    }
}

/// A process acting on particles once per step.
///
/// Actions are shared between particles (and threads with the `parallel`
/// feature); per-particle state lives on the [`Particle`].
pub trait Action: Send + Sync {
    /// Short name used in logs and output attributes.
    fn name(&self) -> &'static str;

    fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Prepare a freshly released particle.
    fn init(&self, _particle: &mut Particle) {}

    fn execute(&self, particle: &mut Particle, ctx: &ActionContext) -> Result<(), ActionError>;

    /// Tracers the action reads from the dataset.
    fn required_variables(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Enabled actions sorted by priority, plus the system actions.
pub struct ActionSet {
    actions: Vec<Box<dyn Action>>,
    age: AgeMonitoring,
    movement: MoveAction,
    track_zones: bool,
}

impl ActionSet {
    pub fn new(age: AgeMonitoring, movement: MoveAction) -> Self {
        Self {
            actions: Vec::new(),
            age,
            movement,
            track_zones: false,
        }
    }

    /// Add an action; order among equal priorities is insertion order.
    pub fn push(&mut self, action: Box<dyn Action>) {
        self.actions.push(action);
        self.actions.sort_by_key(|a| a.priority());
    }

    pub fn with_action(mut self, action: impl Action + 'static) -> Self {
        self.push(Box::new(action));
        self
    }

    /// Refresh each particle's release/recruitment zone after the move.
    pub fn with_zone_tracking(mut self, enabled: bool) -> Self {
        self.track_zones = enabled;
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn coastline(&self) -> CoastlineBehavior {
        self.movement.behavior()
    }

    pub fn required_variables(&self) -> BTreeSet<String> {
        self.actions.iter().flat_map(|a| a.required_variables()).collect()
    }

    /// Initialise a released particle and its zone membership.
    pub fn init_particle(&self, particle: &mut Particle, dataset: &dyn Dataset, zones: &ZoneManager) {
        for action in &self.actions {
            action.init(particle);
        }
        if self.track_zones {
            update_zones(particle, dataset, zones);
        }
    }

    /// Run one step on a living particle.
    pub fn step(&self, particle: &mut Particle, ctx: &ActionContext) -> Result<(), ActionError> {
        if !particle.is_locked() {
            for action in &self.actions {
                action.execute(particle, ctx)?;
                if !particle.is_living() {
                    return Ok(());
                }
            }
        }

        self.age.execute(particle, ctx);
        if !particle.is_living() {
            return Ok(());
        }
        self.movement.execute(particle, ctx);
        if self.track_zones && particle.is_living() {
            update_zones(particle, ctx.dataset, ctx.zones);
        }
        Ok(())
    }
}

/// Zone membership after a move.
fn update_zones(particle: &mut Particle, dataset: &dyn Dataset, zones: &ZoneManager) {
    let (x, y, depth) = {
        let p = particle.point();
        (p.x(), p.y(), p.depth())
    };
    particle.zones.release = zones.zone_index_of(dataset, x, y, depth, ZoneKind::Release);
    particle.zones.recruitment = zones.zone_index_of(dataset, x, y, depth, ZoneKind::Recruitment);
}

/// Uniform draw in `[-1, 1)`.
#[inline]
pub(crate) fn symmetric_uniform(particle: &mut Particle) -> f64 {
    use rand::Rng;
    2.0 * particle.rng().r#gen::<f64>() - 1.0
}

#[cfg(test)]
pub(crate) mod testing {
    //! Small synthetic datasets shared by the action tests.

    use crate::dataset::{AnalyticSourceBuilder, MemorySource, RomsDataset};
    use crate::grid::RectilinearGridBuilder;
    use crate::time::TimeArrow;
    use crate::vertical::{SCoordinate, UniformStretching, VerticalTransform};

    use super::Dataset;

    /// 21 x 21 grid of 0.01° cells, 50 m deep, land east of `i = 15`.
    pub fn basin(u: f64, v: f64, nz: usize) -> RomsDataset<MemorySource> {
        let grid = RectilinearGridBuilder::new(0.0, 0.2, 45.0, 45.2)
            .with_resolution(21, 21)
            .with_constant_depth(50.0)
            .with_land(|i, _| i >= 16)
            .build()
            .unwrap();
        let mut builder = AnalyticSourceBuilder::new(grid)
            .with_records(0.0, 3600.0, 48)
            .with_uniform_velocity(u, v)
            .with_tracer("temp", |_, _, depth, _| 20.0 + depth / 10.0)
            .with_tracer("salt", |_, _, _, _| 35.0)
            .with_tracer("AKt", |_, _, _, _| 1e-3);
        if nz > 1 {
            let sc = SCoordinate::from_stretching(nz, VerticalTransform::Old, 0.0, &UniformStretching).unwrap();
            builder = builder.with_s_coordinate(sc);
        }
        let mut ds = RomsDataset::new(builder.build()).unwrap();
        for name in ["temp", "salt", "AKt"] {
            ds.require_variable(name);
        }
        ds.setup(0.0, TimeArrow::Forward).unwrap();
        ds
    }
}
