//! Transport by the resolved currents.
//!
//! Velocities come from [`Dataset::get_dux`] and friends in grid units per
//! second, so a move is directly a displacement in grid coordinates.
//!
//! # Backward runs
//!
//! With a negative time step the particle is advected twice: a first
//! estimate finds where the particle comes from, then the move is
//! recomputed from that position. A first estimate that leaves the domain
//! kills the particle.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dataset::Dataset;
use crate::particle::{Mortality, Particle};
use crate::time::TimeArrow;
use crate::types::{GridPos, Move};

use super::{Action, ActionContext, ActionError, Priority};

/// Largest displacement (grid cells) per step before warning.
const CFL_THRESHOLD: f64 = 1.0;

/// Numerical scheme of the advection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvectionScheme {
    /// Forward Euler.
    Euler,
    /// Fourth-order Runge-Kutta.
    #[default]
    Rk4,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Advection {
    pub scheme: AdvectionScheme,
    /// Advect along xi and eta.
    pub horizontal: bool,
    /// Advect along the vertical (3-D datasets only).
    pub vertical: bool,
    pub priority: Priority,
}

impl Default for Advection {
    fn default() -> Self {
        Self {
            scheme: AdvectionScheme::Rk4,
            horizontal: true,
            vertical: true,
            priority: Priority::Normal,
        }
    }
}

impl Advection {
    pub fn new(scheme: AdvectionScheme) -> Self {
        Self {
            scheme,
            ..Self::default()
        }
    }

    pub fn with_horizontal(mut self, enabled: bool) -> Self {
        self.horizontal = enabled;
        self
    }

    pub fn with_vertical(mut self, enabled: bool) -> Self {
        self.vertical = enabled;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Displacement over `dt` starting from `p` at `time`.
    pub fn displacement(&self, dataset: &dyn Dataset, p: GridPos, time: f64, dt: f64) -> Move {
        match self.scheme {
            AdvectionScheme::Euler => euler(dataset, p, time, dt),
            AdvectionScheme::Rk4 => rk4(dataset, p, time, dt),
        }
    }

    fn masked(&self, mv: Move) -> Move {
        Move {
            dx: if self.horizontal { mv.dx } else { 0.0 },
            dy: if self.horizontal { mv.dy } else { 0.0 },
            dz: if self.vertical { mv.dz } else { 0.0 },
        }
    }
}

impl Action for Advection {
    fn name(&self) -> &'static str {
        "advection"
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn execute(&self, particle: &mut Particle, ctx: &ActionContext) -> Result<(), ActionError> {
        let ds = ctx.dataset;
        let p = particle.pos();

        let mv = match ctx.arrow {
            TimeArrow::Forward => self.displacement(ds, p, ctx.time, ctx.dt),
            TimeArrow::Backward => {
                let first = self.displacement(ds, p, ctx.time, ctx.dt);
                let origin = p + first;
                if ds.is_on_edge(origin.x, origin.y) {
                    particle.kill(Mortality::OutOfDomain);
                    return Ok(());
                }
                self.displacement(ds, origin, ctx.time, ctx.dt)
            }
        };

        particle.increment(self.masked(mv))?;
        Ok(())
    }
}

fn velocity(dataset: &dyn Dataset, p: GridPos, time: f64) -> Move {
    Move::new(dataset.get_dux(p, time), dataset.get_dvy(p, time), dataset.get_dwz(p, time))
}

fn euler(dataset: &dyn Dataset, p: GridPos, time: f64, dt: f64) -> Move {
    let mv = velocity(dataset, p, time).scale(dt);
    if mv.dx.abs() > CFL_THRESHOLD {
        warn!(dx = mv.dx, x = p.x, y = p.y, "CFL broken along xi, reduce the time step");
    }
    if mv.dy.abs() > CFL_THRESHOLD {
        warn!(dy = mv.dy, x = p.x, y = p.y, "CFL broken along eta, reduce the time step");
    }
    mv
}

/// Runge-Kutta 4 with a partial return when an intermediate point falls on
/// the domain edge; the vertical component is dropped in that case.
fn rk4(dataset: &dyn Dataset, p0: GridPos, time: f64, dt: f64) -> Move {
    let half = 0.5 * dt;
    let on_edge = |p: GridPos| dataset.is_on_edge(p.x, p.y);

    let k1 = velocity(dataset, p0, time).scale(dt);
    let p1 = p0 + k1.scale(0.5);
    if on_edge(p1) {
        return Move::horizontal(0.5 * k1.dx, 0.5 * k1.dy);
    }

    let k2 = velocity(dataset, p1, time + half).scale(dt);
    let p2 = p0 + k2.scale(0.5);
    if on_edge(p2) {
        return Move::horizontal(0.5 * k2.dx, 0.5 * k2.dy);
    }

    let k3 = velocity(dataset, p2, time + half).scale(dt);
    let p3 = p0 + k3;
    if on_edge(p3) {
        return Move::horizontal(k3.dx, k3.dy);
    }

    let k4 = velocity(dataset, p3, time + dt).scale(dt);

    (k1 + k2.scale(2.0) + k3.scale(2.0) + k4).scale(1.0 / 6.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::basin;
    use crate::time::Calendar;
    use crate::zone::ZoneManager;
    use approx::assert_relative_eq;

    /// Grid cell along xi at 45.1°N for 0.01° cells (m).
    fn dxi() -> f64 {
        0.01 * crate::geodesy::ONE_DEG_LATITUDE_IN_METER * 45.1f64.to_radians().cos()
    }

    #[test]
    fn test_euler_uniform_flow() {
        let ds = basin(0.2, 0.0, 1);
        let zones = ZoneManager::new();
        let ctx = ActionContext::new(&ds, &zones, 0.0, 1800.0, Calendar::Gregorian);
        let mut p = Particle::from_grid(0, GridPos::new(5.0, 10.0, 0.0), 0.0, 1);

        Advection::new(AdvectionScheme::Euler).execute(&mut p, &ctx).unwrap();
        let mv = p.point().pending_move();
        assert_relative_eq!(mv.dx, 0.2 * 1800.0 / dxi(), max_relative = 1e-3);
        assert_relative_eq!(mv.dy, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rk4_matches_euler_in_uniform_flow() {
        // pm varies with latitude only: an eastward flow keeps the particle on
        // a row of constant grid velocity, and pn is constant everywhere
        let p = GridPos::new(6.3, 8.7, 0.0);
        for (u, v) in [(0.1, 0.0), (0.0, -0.05)] {
            let ds = basin(u, v, 1);
            let e = Advection::new(AdvectionScheme::Euler).displacement(&ds, p, 0.0, 900.0);
            let r = Advection::new(AdvectionScheme::Rk4).displacement(&ds, p, 0.0, 900.0);
            assert_relative_eq!(e.dx, r.dx, epsilon = 1e-12, max_relative = 1e-9);
            assert_relative_eq!(e.dy, r.dy, epsilon = 1e-12, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_rk4_follows_metric_change() {
        // a northward drift moves into rows of larger pm, the midpoint
        // velocities seen by RK4 differ slightly from the Euler start value
        let ds = basin(0.1, 0.1, 1);
        let p = GridPos::new(6.3, 8.7, 0.0);
        let e = Advection::new(AdvectionScheme::Euler).displacement(&ds, p, 0.0, 900.0);
        let r = Advection::new(AdvectionScheme::Rk4).displacement(&ds, p, 0.0, 900.0);
        assert_relative_eq!(e.dy, r.dy, max_relative = 1e-9);
        assert!(r.dx > e.dx);
        assert_relative_eq!(e.dx, r.dx, max_relative = 1e-4);
    }

    #[test]
    fn test_rk4_partial_move_near_edge() {
        let ds = basin(0.0, -0.5, 1);
        // one large step south from y = 1.5 crosses the edge at y < 1
        let p = GridPos::new(6.0, 1.5, 0.0);
        let mv = Advection::default().displacement(&ds, p, 0.0, 3600.0);
        let full = Advection::new(AdvectionScheme::Euler).displacement(&ds, p, 0.0, 3600.0);
        assert_relative_eq!(mv.dy, 0.5 * full.dy, max_relative = 1e-9);
        assert_eq!(mv.dz, 0.0);
    }

    #[test]
    fn test_masks() {
        let ds = basin(0.2, 0.1, 1);
        let zones = ZoneManager::new();
        let ctx = ActionContext::new(&ds, &zones, 0.0, 600.0, Calendar::Gregorian);
        let mut p = Particle::from_grid(0, GridPos::new(5.0, 10.0, 0.0), 0.0, 1);
        Advection::default()
            .with_horizontal(false)
            .execute(&mut p, &ctx)
            .unwrap();
        assert_eq!(p.point().pending_move(), Move::ZERO);
    }

    #[test]
    fn test_backward_advection() {
        let ds = basin(0.2, 0.0, 1);
        let zones = ZoneManager::new();
        let ctx = ActionContext::new(&ds, &zones, 7200.0, -1800.0, Calendar::Gregorian);
        let mut p = Particle::from_grid(0, GridPos::new(8.0, 10.0, 0.0), 0.0, 1);

        Advection::default().execute(&mut p, &ctx).unwrap();
        let mv = p.point().pending_move();
        assert!(p.is_living());
        assert_relative_eq!(mv.dx, -0.2 * 1800.0 / dxi(), max_relative = 1e-3);
    }

    #[test]
    fn test_backward_origin_outside_kills() {
        let ds = basin(0.5, 0.0, 1);
        let zones = ZoneManager::new();
        let ctx = ActionContext::new(&ds, &zones, 7200.0, -3600.0, Calendar::Gregorian);
        let mut p = Particle::from_grid(0, GridPos::new(1.5, 10.0, 0.0), 0.0, 1);

        Advection::default().execute(&mut p, &ctx).unwrap();
        assert_eq!(p.death_cause(), Mortality::OutOfDomain);
    }
}
