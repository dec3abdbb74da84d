//! Sub-grid turbulent dispersion.
//!
//! Horizontal dispersion follows a Richardson-like scaling of the turbulent
//! dissipation rate `ε`: the random displacement grows with the cell size
//! as `dL^(2/3)`.
//!
//! Vertical dispersion is a random walk on the vertical diffusivity `Kv`
//! (Visser 1997):
//!
//! ```text
//! dz = Kv'(z) dt + R sqrt(6 Kv(z + Kv'(z) dt / 2) dt),  R ∈ [-1, 1]
//! ```
//!
//! computed in metres from a cubic spline of the `Kv` water column, then
//! converted to levels with the local level spacing and reflected at the
//! bottom and top rho levels.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::grid::round_index;
use crate::particle::Particle;
use crate::types::{GridPos, Move};

use super::{Action, ActionContext, ActionError, Priority, symmetric_uniform};

/// Draws before giving up on a dispersion that keeps landing ashore.
const MAX_TRIES: usize = 5;

// =============================================================================
// Horizontal
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizontalDispersion {
    /// Turbulent dissipation rate (m²/s³).
    pub epsilon: f64,
    pub priority: Priority,
}

impl Default for HorizontalDispersion {
    fn default() -> Self {
        Self {
            epsilon: 1e-9,
            priority: Priority::Normal,
        }
    }
}

impl HorizontalDispersion {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            ..Self::default()
        }
    }

    /// Amplitude (m) of the random displacement for a cell of mean size
    /// `dl` (m).
    pub fn amplitude(&self, dl: f64, dt: f64) -> f64 {
        (2.0 * dt.abs()).sqrt() * self.epsilon.powf(1.0 / 6.0) * dl.powf(2.0 / 3.0)
    }
}

impl Action for HorizontalDispersion {
    fn name(&self) -> &'static str {
        "horizontal dispersion"
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn execute(&self, particle: &mut Particle, ctx: &ActionContext) -> Result<(), ActionError> {
        let ds = ctx.dataset;
        let p = particle.pos();
        let (i, j) = ds.grid().clamp_index(round_index(p.x), round_index(p.y));
        let (dxi, deta) = (ds.dxi(i, j), ds.deta(i, j));
        let cff = self.amplitude(0.5 * (dxi + deta), ctx.dt);

        for _ in 0..MAX_TRIES {
            let dx = symmetric_uniform(particle) * cff / dxi;
            let dy = symmetric_uniform(particle) * cff / deta;
            if ds.is_in_water_xy(p.x + dx, p.y + dy) {
                particle.increment(Move::horizontal(dx, dy))?;
                return Ok(());
            }
        }
        Ok(())
    }
}

// =============================================================================
// Vertical
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerticalDispersion {
    /// Vertical diffusivity variable at rho levels (m²/s).
    pub kv_field: String,
    pub priority: Priority,
}

impl Default for VerticalDispersion {
    fn default() -> Self {
        Self {
            kv_field: "AKt".to_string(),
            priority: Priority::Normal,
        }
    }
}

/// Diffusivity and its vertical derivative at a particle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct KvSample {
    /// dKv/dz (m/s), z positive upward.
    gradient: f64,
    /// Kv at the mid-step position (m²/s).
    kv: f64,
}

impl VerticalDispersion {
    pub fn new(kv_field: impl Into<String>) -> Self {
        Self {
            kv_field: kv_field.into(),
            ..Self::default()
        }
    }

    /// Vertical move (levels) for one step.
    fn displacement(&self, ds: &dyn Dataset, p: GridPos, time: f64, dt: f64, r: f64) -> Result<f64, ActionError> {
        let nz = ds.nz();
        let top = (nz - 1) as f64;
        let z = p.z.clamp(0.0, top - 1e-5);
        let depth = ds.z2depth(p.x, p.y, z);
        let Some(sample) = self.sample(ds, p, depth, time, dt)? else {
            return Ok(0.0);
        };

        let dz_m = sample.gradient * dt.abs() + r * (6.0 * sample.kv * dt.abs()).sqrt();

        // metres per level around the particle
        let k = z.floor();
        let spacing = ds.z2depth(p.x, p.y, k + 1.0) - ds.z2depth(p.x, p.y, k);
        if !(spacing > 0.0) {
            return Ok(0.0);
        }
        let mut dz = dz_m / spacing;

        let new_z = p.z + dz;
        if new_z < 0.0 {
            dz = -(2.0 * p.z + dz);
        }
        if new_z >= top {
            dz = 2.0 * (top - p.z) - dz;
        }
        Ok(dz)
    }

    /// Horizontally weighted spline sample around the particle.
    fn sample(&self, ds: &dyn Dataset, p: GridPos, depth: f64, time: f64, dt: f64) -> Result<Option<KvSample>, ActionError> {
        let n = if ds.is_close_to_coast(p.x, p.y) { 1 } else { 2 };
        let (i0, j0) = if n == 1 {
            (round_index(p.x), round_index(p.y))
        } else {
            (p.x.floor() as isize, p.y.floor() as isize)
        };
        let dx = p.x - i0 as f64;
        let dy = p.y - j0 as f64;

        let mut weight = 0.0;
        let mut out = KvSample::default();
        for ii in 0..n {
            for jj in 0..n {
                let (i, j) = (i0 + ii as isize, j0 + jj as isize);
                if !ds.is_in_water(i, j) {
                    continue;
                }
                let co = if n == 1 {
                    1.0
                } else {
                    ((1.0 - ii as f64 - dx) * (1.0 - jj as f64 - dy)).abs()
                };
                let (i, j) = (i as usize, j as usize);
                let column = ds.column(&self.kv_field, i, j, time)?;
                let s = column_sample(ds, &column, i, j, depth, dt);
                out.gradient += co * s.gradient;
                out.kv += co * s.kv;
                weight += co;
            }
        }
        if weight > 0.0 {
            out.gradient /= weight;
            out.kv /= weight;
            Ok(Some(out))
        } else {
            Ok(None)
        }
    }
}

/// Spline sample of the `Kv` column of rho point `(i, j)` at `depth`.
fn column_sample(ds: &dyn Dataset, kv: &[f64], i: usize, j: usize, depth: f64, dt: f64) -> KvSample {
    let (x, y) = (i as f64, j as f64);
    let top = (kv.len() - 1) as f64;

    let z = ds.depth2z(x, y, depth).clamp(0.0, top - 1e-5);
    let (_, dkv_dlevel) = spline(kv, z);
    let spacing = level_spacing(ds, x, y, z);
    let gradient = if spacing > 0.0 { dkv_dlevel / spacing } else { 0.0 };

    let z_mid = ds.depth2z(x, y, depth + 0.5 * gradient * dt.abs()).clamp(0.0, top - 1e-5);
    let (value, _) = spline(kv, z_mid);

    KvSample {
        gradient,
        kv: value.max(0.0),
    }
}

fn level_spacing(ds: &dyn Dataset, x: f64, y: f64, z: f64) -> f64 {
    let k = z.floor();
    ds.z2depth(x, y, k + 1.0) - ds.z2depth(x, y, k)
}

/// Second difference of `v` at `k`, zero at both ends.
fn diff2(v: &[f64], k: usize) -> f64 {
    if k == 0 || k + 1 >= v.len() {
        0.0
    } else {
        v[k + 1] - 2.0 * v[k] + v[k - 1]
    }
}

/// Cubic spline of `v` (one value per level) at fractional level `z`.
///
/// Returns the value and its derivative per level.
fn spline(v: &[f64], z: f64) -> (f64, f64) {
    if v.len() < 2 {
        return (v.first().copied().unwrap_or(0.0), 0.0);
    }
    let k = (z.floor().max(0.0) as usize).min(v.len() - 2);
    let f = z - k as f64;

    let a = (diff2(v, k + 1) - diff2(v, k)) / 6.0;
    let b = diff2(v, k) / 2.0;
    let c = (v[k + 1] - v[k]) - (diff2(v, k + 1) + 2.0 * diff2(v, k)) / 6.0;
    let d = v[k];

    (d + f * (c + f * (b + f * a)), c + f * (2.0 * b + 3.0 * a * f))
}

impl Action for VerticalDispersion {
    fn name(&self) -> &'static str {
        "vertical dispersion"
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn execute(&self, particle: &mut Particle, ctx: &ActionContext) -> Result<(), ActionError> {
        if !ctx.dataset.is_3d() {
            return Err(ActionError::Requires3D { action: self.name() });
        }
        let r = symmetric_uniform(particle);
        let dz = self.displacement(ctx.dataset, particle.pos(), ctx.time, ctx.dt, r)?;
        particle.increment(Move::vertical(dz))?;
        Ok(())
    }

    fn required_variables(&self) -> Vec<String> {
        vec![self.kv_field.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::basin;
    use crate::time::Calendar;
    use crate::zone::ZoneManager;
    use approx::assert_relative_eq;

    #[test]
    fn test_spline_on_linear_profile() {
        let v = [0.0, 1.0, 2.0, 3.0, 4.0];
        let (value, slope) = spline(&v, 2.25);
        assert_relative_eq!(value, 2.25, epsilon = 1e-12);
        assert_relative_eq!(slope, 1.0, epsilon = 1e-12);
        assert_eq!(spline(&v, 4.0).0, 4.0);
    }

    #[test]
    fn test_diff2_edges() {
        let v = [1.0, 4.0, 9.0];
        assert_eq!(diff2(&v, 0), 0.0);
        assert_eq!(diff2(&v, 1), 2.0);
        assert_eq!(diff2(&v, 2), 0.0);
    }

    #[test]
    fn test_hdisp_amplitude() {
        let hd = HorizontalDispersion::new(1e-9);
        // sqrt(2 * 100) * 10^-1.5 * 1000^(2/3)
        let expected = 200f64.sqrt() * 10f64.powf(-1.5) * 100.0;
        assert_relative_eq!(hd.amplitude(1000.0, -100.0), expected, max_relative = 1e-10);
    }

    #[test]
    fn test_hdisp_stays_in_water() {
        let ds = basin(0.0, 0.0, 1);
        let zones = ZoneManager::new();
        let ctx = ActionContext::new(&ds, &zones, 0.0, 3600.0, Calendar::Gregorian);
        let hd = HorizontalDispersion::new(1e-6);
        for n in 0..50 {
            let mut p = Particle::from_grid(n, GridPos::new(15.2, 10.0, 0.0), 0.0, 9);
            hd.execute(&mut p, &ctx).unwrap();
            let mv = p.point().pending_move();
            assert!(ds.is_in_water_xy(15.2 + mv.dx, 10.0 + mv.dy));
            assert!(mv.dx.abs() <= hd.amplitude(0.5 * (ds.dxi(15, 10) + ds.deta(15, 10)), 3600.0) / ds.dxi(15, 10));
        }
    }

    #[test]
    fn test_vdisp_constant_kv_has_no_drift() {
        let ds = basin(0.0, 0.0, 10);
        let vd = VerticalDispersion::new("AKt");
        let p = GridPos::new(5.0, 5.0, 4.5);
        // R = 0 leaves only the gradient term, zero for a uniform Kv
        let dz = vd.displacement(&ds, p, 0.0, 600.0, 0.0).unwrap();
        assert_relative_eq!(dz, 0.0, epsilon = 1e-9);

        // R = 1: sqrt(6e-3 * 600) = 1.897 m over 5 m levels
        let dz = vd.displacement(&ds, p, 0.0, 600.0, 1.0).unwrap();
        assert_relative_eq!(dz, (6.0e-3 * 600.0f64).sqrt() / 5.0, max_relative = 1e-6);
    }

    #[test]
    fn test_vdisp_reflects_at_bottom() {
        let ds = basin(0.0, 0.0, 10);
        let vd = VerticalDispersion::new("AKt");
        let p = GridPos::new(5.0, 5.0, 0.1);
        let dz = vd.displacement(&ds, p, 0.0, 600.0, -1.0).unwrap();
        let raw = -(6.0e-3 * 600.0f64).sqrt() / 5.0;
        assert_relative_eq!(dz, -(2.0 * 0.1 + raw), max_relative = 1e-6);
        assert!(p.z + dz >= 0.0);
    }

    #[test]
    fn test_vdisp_requires_3d() {
        let ds = basin(0.0, 0.0, 1);
        let zones = ZoneManager::new();
        let ctx = ActionContext::new(&ds, &zones, 0.0, 600.0, Calendar::Gregorian);
        let mut p = Particle::from_grid(0, GridPos::new(5.0, 5.0, 0.0), 0.0, 1);
        assert!(matches!(
            VerticalDispersion::default().execute(&mut p, &ctx),
            Err(ActionError::Requires3D { .. })
        ));
    }
}
