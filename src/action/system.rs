//! System actions run on every particle after the configured ones.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dataset::Dataset;
use crate::particle::{Mortality, Particle};
use crate::types::Move;

use super::ActionContext;

/// Bisection iterations when looking for the coastline crossing.
const MAX_BISECTION: usize = 1000;
/// Successive reflections before giving up on a bounce.
const MAX_BOUNCES: usize = 10;
/// Distance (grid units) below which a point is on a cell face.
const FACE_TOLERANCE: f64 = 1e-8;

// =============================================================================
// Age
// =============================================================================

/// Ages particles and kills those older than the transport duration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgeMonitoring {
    /// Seconds.
    transport_duration: f64,
    keep_drifting: bool,
}

impl AgeMonitoring {
    pub fn new(transport_duration: f64, keep_drifting: bool) -> Self {
        Self {
            transport_duration,
            keep_drifting,
        }
    }

    pub fn execute(&self, particle: &mut Particle, ctx: &ActionContext) {
        particle.increment_age(ctx.dt);
        if !self.keep_drifting && particle.age() > self.transport_duration {
            particle.kill(Mortality::Old);
        }
    }
}

// =============================================================================
// Move
// =============================================================================

/// What happens to a particle the currents push ashore.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CoastlineBehavior {
    /// Move anyway.
    None,
    /// The particle dies on land.
    #[default]
    Beaching,
    /// The particle is reflected on the coastline.
    Bouncing,
    /// The move is cancelled.
    Standstill,
}

impl CoastlineBehavior {
    pub fn as_str(self) -> &'static str {
        match self {
            CoastlineBehavior::None => "none",
            CoastlineBehavior::Beaching => "beaching",
            CoastlineBehavior::Bouncing => "bouncing",
            CoastlineBehavior::Standstill => "standstill",
        }
    }
}

impl From<String> for CoastlineBehavior {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => CoastlineBehavior::None,
            "beaching" => CoastlineBehavior::Beaching,
            "bouncing" => CoastlineBehavior::Bouncing,
            "standstill" => CoastlineBehavior::Standstill,
            _ => {
                warn!(value = %value, "unknown coastline behavior, using beaching");
                CoastlineBehavior::Beaching
            }
        }
    }
}

impl From<CoastlineBehavior> for String {
    fn from(value: CoastlineBehavior) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for CoastlineBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies the accumulated move of a particle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MoveAction {
    behavior: CoastlineBehavior,
}

impl MoveAction {
    pub fn new(behavior: CoastlineBehavior) -> Self {
        Self { behavior }
    }

    pub fn behavior(&self) -> CoastlineBehavior {
        self.behavior
    }

    pub fn execute(&self, particle: &mut Particle, ctx: &ActionContext) {
        let ds = ctx.dataset;
        let nz = ds.nz();

        if particle.is_locked() {
            particle.point_mut().set_pending_move(Move::ZERO);
            particle.point_mut().apply_move(nz);
            return;
        }

        let p = particle.pos();
        let mv = particle.point().pending_move();
        match self.behavior {
            CoastlineBehavior::None | CoastlineBehavior::Beaching => {}
            CoastlineBehavior::Standstill => {
                if !ds.is_in_water_xy(p.x + mv.dx, p.y + mv.dy) {
                    particle.point_mut().set_pending_move(Move::ZERO);
                }
            }
            CoastlineBehavior::Bouncing => {
                let (dx, dy) = bounce_coastline(ds, p.x, p.y, mv.dx, mv.dy);
                particle.point_mut().set_pending_move(Move::new(dx, dy, mv.dz));
            }
        }
        particle.point_mut().apply_move(nz);

        if self.behavior == CoastlineBehavior::Beaching && !particle.is_in_water(ds) {
            particle.kill(Mortality::Beached);
        }
        if particle.is_on_edge(ds) {
            particle.kill(Mortality::OutOfDomain);
        }
        particle.point_mut().grid2geo(ds);
    }
}

/// Reflect a horizontal move `(dx, dy)` from `(x, y)` on the coastline.
///
/// The crossing with land is found by bisection along the move; the part of
/// the move beyond it is mirrored on the cell face that was hit (meridional,
/// zonal, or both at a corner). A reflection landing on land again is
/// reflected anew; a move that cannot be brought back to water is cancelled.
pub fn bounce_coastline(ds: &dyn Dataset, x: f64, y: f64, dx: f64, dy: f64) -> (f64, f64) {
    let (mut dx, mut dy) = (dx, dy);
    for _ in 0..=MAX_BOUNCES {
        if ds.is_in_water_xy(x + dx, y + dy) {
            return (dx, dy);
        }
        match reflect(ds, x, y, dx, dy) {
            Some(mv) => (dx, dy) = mv,
            None => return (0.0, 0.0),
        }
    }
    if ds.is_in_water_xy(x + dx, y + dy) { (dx, dy) } else { (0.0, 0.0) }
}

#[inline]
fn on_face(s: f64) -> bool {
    let w = s + 0.5;
    (w - w.round()).abs() < FACE_TOLERANCE
}

/// Nearest cell face (half-integer grid coordinate).
#[inline]
fn face(s: f64) -> f64 {
    (s + 0.5).round() - 0.5
}

fn reflect(ds: &dyn Dataset, x: f64, y: f64, dx: f64, dy: f64) -> Option<(f64, f64)> {
    // bisection on the fraction t of the move
    let mut t = 0.0;
    let mut step = 1.0;
    let mut sign = 1.0;
    let (mut meridional, mut zonal) = (false, false);
    let (mut s, mut ys) = (x, y);
    let mut n = 0;
    while !(meridional || zonal) && n < MAX_BISECTION {
        step *= 0.5;
        t += sign * step;
        s = x + t * dx;
        ys = y + t * dy;
        sign = if ds.is_in_water_xy(s, ys) { 1.0 } else { -1.0 };
        meridional = dx != 0.0 && on_face(s);
        zonal = dy != 0.0 && on_face(ys);
        n += 1;
    }

    let new_dx = if meridional { 2.0 * (face(s) - x) - dx } else { dx };
    let new_dy = if zonal { 2.0 * (face(ys) - y) - dy } else { dy };
    (meridional || zonal).then_some((new_dx, new_dy))
}
