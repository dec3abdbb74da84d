//! Vertical stretching curves for S-coordinate grids.
//!
//! A stretching curve `Cs(s)` maps the uniform S-coordinate `s ∈ [-1, 0]`
//! onto `[-1, 0]`, clustering levels near the surface and/or the bottom.
//! ROMS output files carry the curves as `Cs_r` / `Cs_w`; the functions here
//! rebuild them for analytic or synthetic grids.
//!
//! # Example
//!
//! ```
//! use roms_drift::vertical::{SongHaidvogelStretching, Stretching, UniformStretching};
//!
//! let (cs_r, cs_w) = UniformStretching.compute_cs(10);
//! assert_eq!(cs_r.len(), 10);
//! assert_eq!(cs_w.len(), 11);
//!
//! let (_, cs_w) = SongHaidvogelStretching::new(6.0, 0.2).compute_cs(30);
//! assert_eq!(cs_w[0], -1.0);
//! assert_eq!(cs_w[30], 0.0);
//! ```

use super::s_coordinate::{sc_r, sc_w};

/// Trait for vertical stretching curves.
///
/// # Implementation Notes
///
/// - `cs(-1) = -1` and `cs(0) = 0`
/// - `cs` is monotonically increasing
pub trait Stretching: Send + Sync {
    /// Stretching curve at S-coordinate `s`.
    fn cs(&self, s: f64) -> f64;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Description of parameters (for diagnostics).
    fn description(&self) -> String {
        self.name().to_string()
    }

    /// Curves at rho levels (length `nz`) and w levels (length `nz + 1`).
    fn compute_cs(&self, nz: usize) -> (Vec<f64>, Vec<f64>) {
        let cs_r = (0..nz).map(|k| self.cs(sc_r(k, nz))).collect();
        let mut cs_w: Vec<f64> = (0..=nz).map(|k| self.cs(sc_w(k, nz))).collect();
        cs_w[0] = -1.0;
        cs_w[nz] = 0.0;
        (cs_r, cs_w)
    }
}

// =============================================================================
// Uniform Stretching
// =============================================================================

/// `Cs(s) = s`: levels equally spaced in the water column.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformStretching;

impl Stretching for UniformStretching {
    #[inline]
    fn cs(&self, s: f64) -> f64 {
        s
    }

    fn name(&self) -> &'static str {
        "uniform"
    }
}

// =============================================================================
// Song-Haidvogel Stretching (ROMS Vstretching = 1)
// =============================================================================

/// Song-Haidvogel (1994) stretching.
///
/// ```text
/// Cs(s) = (1 - θb) sinh(θs s) / sinh(θs)
///       + θb [tanh(θs (s + 1/2)) / (2 tanh(θs / 2)) - 1/2]
/// ```
///
/// - `theta_s`: surface stretching parameter (0 to 8)
/// - `theta_b`: bottom stretching parameter (0 to 1)
#[derive(Clone, Copy, Debug)]
pub struct SongHaidvogelStretching {
    pub theta_s: f64,
    pub theta_b: f64,
}

impl Default for SongHaidvogelStretching {
    fn default() -> Self {
        Self {
            theta_s: 6.0,
            theta_b: 0.0,
        }
    }
}

impl SongHaidvogelStretching {
    pub fn new(theta_s: f64, theta_b: f64) -> Self {
        Self { theta_s, theta_b }
    }
}

impl Stretching for SongHaidvogelStretching {
    fn cs(&self, s: f64) -> f64 {
        if self.theta_s <= 0.0 {
            return s;
        }
        let surface = (self.theta_s * s).sinh() / self.theta_s.sinh();
        let bottom = (self.theta_s * (s + 0.5)).tanh() / (2.0 * (0.5 * self.theta_s).tanh()) - 0.5;
        (1.0 - self.theta_b) * surface + self.theta_b * bottom
    }

    fn name(&self) -> &'static str {
        "song_haidvogel"
    }

    fn description(&self) -> String {
        format!(
            "Song-Haidvogel (theta_s={:.1}, theta_b={:.2})",
            self.theta_s, self.theta_b
        )
    }
}

// =============================================================================
// Shchepetkin 2010 Stretching (ROMS Vstretching = 4)
// =============================================================================

/// Shchepetkin (2010) double stretching: a cosh surface refinement followed
/// by an exponential bottom refinement.
#[derive(Clone, Copy, Debug)]
pub struct Shchepetkin2010Stretching {
    pub theta_s: f64,
    pub theta_b: f64,
}

impl Default for Shchepetkin2010Stretching {
    fn default() -> Self {
        Self {
            theta_s: 7.0,
            theta_b: 2.0,
        }
    }
}

impl Stretching for Shchepetkin2010Stretching {
    fn cs(&self, s: f64) -> f64 {
        let c = if self.theta_s > 0.0 {
            (1.0 - (self.theta_s * s).cosh()) / (self.theta_s.cosh() - 1.0)
        } else {
            -s * s
        };
        if self.theta_b > 0.0 {
            ((self.theta_b * c).exp() - 1.0) / (1.0 - (-self.theta_b).exp())
        } else {
            c
        }
    }

    fn name(&self) -> &'static str {
        "shchepetkin_2010"
    }

    fn description(&self) -> String {
        format!(
            "Shchepetkin 2010 (theta_s={:.1}, theta_b={:.1})",
            self.theta_s, self.theta_b
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    fn assert_monotonic(cs: &[f64]) {
        for k in 1..cs.len() {
            assert!(cs[k] > cs[k - 1], "Cs should increase: {:?}", cs);
        }
    }

    #[test]
    fn test_uniform_matches_s_levels() {
        let (cs_r, cs_w) = UniformStretching.compute_cs(4);
        assert!((cs_r[0] - (-0.875)).abs() < TOL);
        assert!((cs_r[3] - (-0.125)).abs() < TOL);
        assert!((cs_w[2] - (-0.5)).abs() < TOL);
    }

    #[test]
    fn test_song_haidvogel_bounds() {
        let st = SongHaidvogelStretching::new(5.0, 0.4);
        let (cs_r, cs_w) = st.compute_cs(30);
        assert_eq!(cs_r.len(), 30);
        assert_eq!(cs_w.len(), 31);
        assert!((st.cs(-1.0) + 1.0).abs() < TOL);
        assert!(st.cs(0.0).abs() < TOL);
        assert_monotonic(&cs_w);
        assert_monotonic(&cs_r);
    }

    #[test]
    fn test_song_haidvogel_surface_refinement() {
        let (_, cs_w) = SongHaidvogelStretching::new(6.0, 0.0).compute_cs(20);
        let surface = cs_w[20] - cs_w[19];
        let bottom = cs_w[1] - cs_w[0];
        assert!(surface < bottom);
    }

    #[test]
    fn test_shchepetkin_bounds() {
        let st = Shchepetkin2010Stretching::default();
        assert!((st.cs(-1.0) + 1.0).abs() < TOL);
        assert!(st.cs(0.0).abs() < TOL);
        let (_, cs_w) = st.compute_cs(25);
        assert_monotonic(&cs_w);
    }

    #[test]
    fn test_stretching_names() {
        assert_eq!(UniformStretching.name(), "uniform");
        assert_eq!(SongHaidvogelStretching::default().name(), "song_haidvogel");
        assert_eq!(Shchepetkin2010Stretching::default().name(), "shchepetkin_2010");
    }
}
