//! Particles: positions, move accumulator, mortality and the state layers
//! the biological actions read and write.

mod grid_point;
mod mortality;
mod variable;

pub use grid_point::GridPoint;
pub use mortality::Mortality;
pub use variable::ParticleVariable;

use rand::SeedableRng;
use rand_pcg::Pcg64;
use thiserror::Error;

use crate::dataset::Dataset;
use crate::types::{GeoPos, GridPos, Move};

/// Errors raised on particle state updates.
#[derive(Debug, Error, PartialEq)]
pub enum ParticleError {
    #[error("Two actions are requesting exclusivity on {axis} transport")]
    TwoExclusiveMoves { axis: &'static str },

    #[error("Position (lon {lon}, lat {lat}) is outside the grid")]
    OutsideGrid { lon: f64, lat: f64 },
}

/// Length and development stage, present when growth is enabled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrowthState {
    /// mm
    pub length: f64,
    pub stage: usize,
}

/// Recruitment bookkeeping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecruitmentState {
    recruited: Vec<bool>,
    /// Recruitment zone the timer is running for.
    pub zone: Option<usize>,
    /// Seconds spent in `zone` while meeting the criterion.
    pub time_in_zone: f64,
    /// Recruited during the current step.
    pub new_recruited: bool,
}

impl RecruitmentState {
    pub fn new(n_zones: usize) -> Self {
        Self {
            recruited: vec![false; n_zones],
            ..Self::default()
        }
    }

    pub fn is_recruited(&self) -> bool {
        self.recruited.iter().any(|&r| r)
    }

    pub fn is_recruited_in(&self, zone: usize) -> bool {
        self.recruited.get(zone).copied().unwrap_or(false)
    }

    pub fn set_recruited(&mut self, zone: usize, recruited: bool) {
        if zone >= self.recruited.len() {
            self.recruited.resize(zone + 1, false);
        }
        self.recruited[zone] = recruited;
    }

    pub fn recruited_zones(&self) -> &[bool] {
        &self.recruited
    }
}

/// Zones the particle is currently in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZoneMembership {
    pub release: Option<usize>,
    pub recruitment: Option<usize>,
}

/// A drifting particle.
#[derive(Clone, Debug)]
pub struct Particle {
    index: usize,
    point: GridPoint,
    /// Seconds since release.
    age: f64,
    living: bool,
    locked: bool,
    death_cause: Mortality,
    release_time: f64,
    release_zone: Option<usize>,
    pub growth: Option<GrowthState>,
    pub recruitment: Option<RecruitmentState>,
    pub zones: ZoneMembership,
    rng: Pcg64,
}

impl Particle {
    fn with_point(index: usize, point: GridPoint, release_time: f64, seed: u64) -> Self {
        Self {
            index,
            point,
            age: 0.0,
            living: true,
            locked: false,
            death_cause: Mortality::Alive,
            release_time,
            release_zone: None,
            growth: None,
            recruitment: None,
            zones: ZoneMembership::default(),
            rng: Pcg64::seed_from_u64(stream_seed(seed, index)),
        }
    }

    /// Particle released at a geographic position.
    pub fn from_geo(index: usize, geo: GeoPos, release_time: f64, seed: u64) -> Self {
        Self::with_point(index, GridPoint::from_geo(geo), release_time, seed)
    }

    /// Particle released at a grid position.
    pub fn from_grid(index: usize, pos: GridPos, release_time: f64, seed: u64) -> Self {
        Self::with_point(index, GridPoint::from_grid(pos), release_time, seed)
    }

    /// Tag the release zone.
    pub fn with_release_zone(mut self, zone: usize) -> Self {
        self.release_zone = Some(zone);
        self
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn point(&self) -> &GridPoint {
        &self.point
    }

    #[inline]
    pub fn point_mut(&mut self) -> &mut GridPoint {
        &mut self.point
    }

    #[inline]
    pub fn pos(&self) -> GridPos {
        self.point.pos()
    }

    #[inline]
    pub fn geo(&self) -> GeoPos {
        self.point.geo()
    }

    #[inline]
    pub fn age(&self) -> f64 {
        self.age
    }

    pub fn increment_age(&mut self, dt: f64) {
        self.age += dt.abs();
    }

    #[inline]
    pub fn is_living(&self) -> bool {
        self.living
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    #[inline]
    pub fn death_cause(&self) -> Mortality {
        self.death_cause
    }

    /// Kill the particle. Only the first cause is kept.
    pub fn kill(&mut self, cause: Mortality) {
        if self.living {
            self.living = false;
            self.death_cause = cause;
        }
    }

    #[inline]
    pub fn release_time(&self) -> f64 {
        self.release_time
    }

    #[inline]
    pub fn release_zone(&self) -> Option<usize> {
        self.release_zone
    }

    /// Random stream owned by this particle.
    #[inline]
    pub fn rng(&mut self) -> &mut Pcg64 {
        &mut self.rng
    }

    /// Accumulate an action's move.
    pub fn increment(&mut self, mv: Move) -> Result<(), ParticleError> {
        self.point.increment(mv, false, false)
    }

    pub fn increment_exclusive(&mut self, mv: Move, horizontal: bool, vertical: bool) -> Result<(), ParticleError> {
        self.point.increment(mv, horizontal, vertical)
    }

    pub fn is_in_water(&self, dataset: &dyn Dataset) -> bool {
        self.point.is_in_water(dataset)
    }

    pub fn is_on_edge(&self, dataset: &dyn Dataset) -> bool {
        self.point.is_on_edge(dataset)
    }
}

/// Per-particle seed derived from the master seed.
fn stream_seed(seed: u64, index: usize) -> u64 {
    // splitmix64 finaliser
    let mut z = seed.wrapping_add((index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
