//! ROMS S-coordinate: terrain-following levels from the sea bed to the free
//! surface.
//!
//! # Coordinate Transform
//!
//! The unperturbed depth of a level is
//!
//! ```text
//! Old:  z0 = hc (s - Cs) + Cs h
//! New:  z0 = h (s hc + Cs h) / (hc + h)
//! ```
//!
//! and the free surface stretches the column:
//!
//! ```text
//! z = z0 + ζ (1 + z0 / h)
//! ```
//!
//! Level `k = 0` is the bottom rho level; w levels run from `z_w[0] = -h`
//! to `z_w[nz] = 0` (`ζ` once the free surface is applied).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::stretching::Stretching;

/// Free-surface value marking missing data in some ROMS outputs.
pub const ZETA_FILL: f32 = 999.0;

#[derive(Debug, Error, PartialEq)]
pub enum VerticalError {
    #[error("Cs_r has {got} values, expected {expected}")]
    CsRLength { got: usize, expected: usize },

    #[error("Cs_w has {got} values, expected {expected}")]
    CsWLength { got: usize, expected: usize },

    #[error("Critical depth hc must be positive or zero, got {0}")]
    InvalidHc(f64),
}

/// Vertical transform equation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalTransform {
    /// `Vtransform = 1`.
    #[default]
    Old,
    /// `Vtransform = 2`.
    New,
}

impl VerticalTransform {
    /// Transform from a ROMS `Vtransform` value.
    pub fn from_vtransform(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Old),
            2 => Some(Self::New),
            _ => None,
        }
    }

    /// Transform from a UCLA `VertCoordType` attribute value.
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "old" => Some(Self::Old),
            "new" => Some(Self::New),
            _ => None,
        }
    }
}

/// S-coordinate at rho level `k` of `nz`.
#[inline]
pub fn sc_r(k: usize, nz: usize) -> f64 {
    (k as f64 - nz as f64 + 0.5) / nz as f64
}

/// S-coordinate at w level `k` of `nz` (`-1` at `k = 0`).
#[inline]
pub fn sc_w(k: usize, nz: usize) -> f64 {
    if k == 0 {
        -1.0
    } else {
        (k as f64 - nz as f64) / nz as f64
    }
}

/// Apply the free-surface correction to an unperturbed depth.
///
/// `999` is read as a flat surface and NaN keeps the unperturbed depth.
#[inline]
pub fn zeta_correction(z0: f64, zeta: f32, h: f64) -> f64 {
    if zeta.is_nan() || zeta == ZETA_FILL {
        z0
    } else {
        z0 + zeta as f64 * (1.0 + z0 / h)
    }
}

/// S-coordinate parameters of a ROMS grid.
#[derive(Clone, Debug, PartialEq)]
pub struct SCoordinate {
    transform: VerticalTransform,
    hc: f64,
    cs_r: Vec<f64>,
    cs_w: Vec<f64>,
}

impl SCoordinate {
    /// `cs_r` holds `nz` values and `cs_w` holds `nz + 1`.
    pub fn new(
        transform: VerticalTransform,
        hc: f64,
        cs_r: Vec<f64>,
        cs_w: Vec<f64>,
    ) -> Result<Self, VerticalError> {
        let nz = cs_r.len();
        if cs_w.len() != nz + 1 {
            return Err(VerticalError::CsWLength {
                got: cs_w.len(),
                expected: nz + 1,
            });
        }
        if nz == 0 {
            return Err(VerticalError::CsRLength {
                got: 0,
                expected: 1,
            });
        }
        if !(hc >= 0.0) {
            return Err(VerticalError::InvalidHc(hc));
        }
        Ok(Self {
            transform,
            hc,
            cs_r,
            cs_w,
        })
    }

    /// Build the curves from a stretching function.
    pub fn from_stretching(
        nz: usize,
        transform: VerticalTransform,
        hc: f64,
        stretching: &impl Stretching,
    ) -> Result<Self, VerticalError> {
        let (cs_r, cs_w) = stretching.compute_cs(nz);
        Self::new(transform, hc, cs_r, cs_w)
    }

    /// Single-layer coordinate used by depth-averaged datasets.
    pub fn single_layer() -> Self {
        Self {
            transform: VerticalTransform::Old,
            hc: 0.0,
            cs_r: vec![-0.5],
            cs_w: vec![-1.0, 0.0],
        }
    }

    #[inline]
    pub fn nz(&self) -> usize {
        self.cs_r.len()
    }

    #[inline]
    pub fn hc(&self) -> f64 {
        self.hc
    }

    #[inline]
    pub fn transform(&self) -> VerticalTransform {
        self.transform
    }

    #[inline]
    pub fn cs_r(&self) -> &[f64] {
        &self.cs_r
    }

    #[inline]
    pub fn cs_w(&self) -> &[f64] {
        &self.cs_w
    }

    #[inline]
    fn z0(&self, sc: f64, cs: f64, h: f64) -> f64 {
        match self.transform {
            VerticalTransform::Old => self.hc * (sc - cs) + cs * h,
            VerticalTransform::New => h * (sc * self.hc + cs * h) / (self.hc + h),
        }
    }

    /// Unperturbed depth of rho level `k` for water depth `h`.
    #[inline]
    pub fn z0_r(&self, k: usize, h: f64) -> f64 {
        self.z0(sc_r(k, self.nz()), self.cs_r[k], h)
    }

    /// Unperturbed depth of w level `k` for water depth `h`.
    #[inline]
    pub fn z0_w(&self, k: usize, h: f64) -> f64 {
        let nz = self.nz();
        if k == 0 {
            -h
        } else if k == nz {
            0.0
        } else {
            self.z0(sc_w(k, nz), self.cs_w[k], h)
        }
    }

    /// Unperturbed rho and w level depths of a water column.
    ///
    /// # Example
    ///
    /// ```
    /// use roms_drift::vertical::{SCoordinate, UniformStretching, VerticalTransform};
    ///
    /// let sc = SCoordinate::from_stretching(10, VerticalTransform::Old, 0.0, &UniformStretching).unwrap();
    /// let (z_r, z_w) = sc.levels(100.0);
    /// assert_eq!(z_w[0], -100.0);
    /// assert_eq!(z_w[10], 0.0);
    /// assert!((z_r[0] + 95.0).abs() < 1e-9);
    /// ```
    pub fn levels(&self, h: f64) -> (Vec<f64>, Vec<f64>) {
        let nz = self.nz();
        let z_r = (0..nz).map(|k| self.z0_r(k, h)).collect();
        let z_w = (0..=nz).map(|k| self.z0_w(k, h)).collect();
        (z_r, z_w)
    }
}
