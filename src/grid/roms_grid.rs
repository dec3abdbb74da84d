use crate::polygon::contains_point;
use crate::types::Bounds2D;

use super::{Field2, GridError};

/// Java-style rounding (half up), used for every nearest-point lookup.
#[inline]
pub(crate) fn round_index(x: f64) -> isize {
    (x + 0.5).floor() as isize
}

/// Horizontal ROMS grid at rho points.
///
/// Arrays are indexed `(i, j)` with `i` along xi (`x`) and `j` along eta
/// (`y`). Fractional grid coordinates put rho point `(i, j)` at `(i, j)`.
#[derive(Clone, Debug)]
pub struct RomsGrid {
    nx: usize,
    ny: usize,
    lon: Field2<f64>,
    lat: Field2<f64>,
    mask: Field2<bool>,
    h: Field2<f64>,
    pm: Field2<f64>,
    pn: Field2<f64>,
}

impl RomsGrid {
    pub fn new(
        lon: Field2<f64>,
        lat: Field2<f64>,
        mask: Field2<bool>,
        h: Field2<f64>,
        pm: Field2<f64>,
        pn: Field2<f64>,
    ) -> Result<Self, GridError> {
        let (nx, ny) = (lon.nx(), lon.ny());
        if nx < 3 || ny < 3 {
            return Err(GridError::TooSmall { nx, ny });
        }
        let shapes = [
            ("lat", lat.nx(), lat.ny()),
            ("mask", mask.nx(), mask.ny()),
            ("h", h.nx(), h.ny()),
            ("pm", pm.nx(), pm.ny()),
            ("pn", pn.nx(), pn.ny()),
        ];
        for (name, fx, fy) in shapes {
            if fx != nx || fy != ny {
                return Err(GridError::InconsistentShape {
                    name,
                    nx: fx,
                    ny: fy,
                    expected_nx: nx,
                    expected_ny: ny,
                });
            }
        }
        Ok(Self {
            nx,
            ny,
            lon,
            lat,
            mask,
            h,
            pm,
            pn,
        })
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    #[inline]
    pub fn lon(&self, i: usize, j: usize) -> f64 {
        self.lon.get(i, j)
    }

    #[inline]
    pub fn lat(&self, i: usize, j: usize) -> f64 {
        self.lat.get(i, j)
    }

    /// Raw bathymetry (also defined on land).
    #[inline]
    pub fn h(&self, i: usize, j: usize) -> f64 {
        self.h.get(i, j)
    }

    #[inline]
    pub fn pm(&self, i: usize, j: usize) -> f64 {
        self.pm.get(i, j)
    }

    #[inline]
    pub fn pn(&self, i: usize, j: usize) -> f64 {
        self.pn.get(i, j)
    }

    pub fn mask(&self) -> &Field2<bool> {
        &self.mask
    }

    // =========================================================================
    // Land / sea queries
    // =========================================================================

    /// True on a water rho point, false on land or out of the grid.
    #[inline]
    pub fn is_in_water(&self, i: isize, j: isize) -> bool {
        self.mask.checked(i, j).unwrap_or(false)
    }

    /// [`Self::is_in_water`] at the nearest rho point.
    #[inline]
    pub fn is_in_water_xy(&self, x: f64, y: f64) -> bool {
        self.is_in_water(round_index(x), round_index(y))
    }

    /// True when one of the three rho points facing the particle from its
    /// nearest rho point is land.
    pub fn is_close_to_coast(&self, x: f64, y: f64) -> bool {
        let i = round_index(x);
        let j = round_index(y);
        let ii = if i == x.floor() as isize { 1 } else { -1 };
        let jj = if j == y.floor() as isize { 1 } else { -1 };
        !(self.is_in_water(i + ii, j) && self.is_in_water(i + ii, j + jj) && self.is_in_water(i, j + jj))
    }

    /// True within one cell of the grid border.
    #[inline]
    pub fn is_on_edge(&self, x: f64, y: f64) -> bool {
        x > self.nx as f64 - 2.0 || x < 1.0 || y > self.ny as f64 - 2.0 || y < 1.0
    }

    /// Bathymetry at a water point, NaN on land or out of the grid.
    pub fn bathy(&self, i: isize, j: isize) -> f64 {
        if self.is_in_water(i, j) {
            self.h.get(i as usize, j as usize)
        } else {
            f64::NAN
        }
    }

    /// Cell width along xi (m).
    #[inline]
    pub fn dxi(&self, i: usize, j: usize) -> f64 {
        1.0 / self.pm.get(i, j)
    }

    /// Cell width along eta (m).
    #[inline]
    pub fn deta(&self, i: usize, j: usize) -> f64 {
        1.0 / self.pn.get(i, j)
    }

    /// Clamp signed indices onto the grid.
    #[inline]
    pub fn clamp_index(&self, i: isize, j: isize) -> (usize, usize) {
        (
            i.clamp(0, self.nx as isize - 1) as usize,
            j.clamp(0, self.ny as isize - 1) as usize,
        )
    }

    // =========================================================================
    // Coordinate conversion
    // =========================================================================

    /// Grid to geographic coordinates, returned as `(lat, lon)`.
    pub fn xy2latlon(&self, x: f64, y: f64) -> (f64, f64) {
        let ix = x.clamp(0.00001, self.nx as f64 - 1.00001);
        let jy = y.clamp(0.00001, self.ny as f64 - 1.00001);
        let i = ix.floor() as usize;
        let j = jy.floor() as usize;
        let dx = ix - i as f64;
        let dy = jy - j as f64;

        let mut lat = 0.0;
        let mut lon = 0.0;
        for ii in 0..2 {
            for jj in 0..2 {
                let co = ((1.0 - ii as f64 - dx) * (1.0 - jj as f64 - dy)).abs();
                lat += co * self.lat.get(i + ii, j + jj);
                lon += co * self.lon.get(i + ii, j + jj);
            }
        }
        (lat, lon)
    }

    /// Geographic to grid coordinates, `None` outside the grid.
    pub fn latlon2xy(&self, lat: f64, lon: f64) -> Option<(f64, f64)> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        let (mut imin, mut imax) = (0, self.nx - 1);
        let (mut jmin, mut jmax) = (0, self.ny - 1);
        if !self.sub_grid_contains(imin, imax, jmin, jmax, lon, lat) {
            return None;
        }

        while imax - imin > 1 || jmax - jmin > 1 {
            if imax - imin > 1 {
                let i0 = (imin + imax) / 2;
                if self.sub_grid_contains(imin, i0, jmin, jmax, lon, lat) {
                    imax = i0;
                } else {
                    imin = i0;
                }
            }
            if jmax - jmin > 1 {
                let j0 = (jmin + jmax) / 2;
                if self.sub_grid_contains(imin, imax, jmin, j0, lon, lat) {
                    jmax = j0;
                } else {
                    jmin = j0;
                }
            }
        }

        let lon0 = self.lon.get(imin, jmin);
        let lat0 = self.lat.get(imin, jmin);
        let dy1 = self.lat.get(imin, jmin + 1) - lat0;
        let dx1 = self.lon.get(imin, jmin + 1) - lon0;
        let dy2 = self.lat.get(imin + 1, jmin) - lat0;
        let dx2 = self.lon.get(imin + 1, jmin) - lon0;
        let det = dx2 * dy1 - dy2 * dx1;

        let c1 = lon * dy1 - lat * dx1;
        let c2 = lon0 * dy2 - lat0 * dx2;
        let deltax = ((c1 * dx2 - c2 * dx1) / det - lon0) / dx2;
        let x = imin as f64 + deltax.clamp(0.0, 1.0);

        let c1 = lon0 * dy1 - lat0 * dx1;
        let c2 = lon * dy2 - lat * dx2;
        let deltay = ((c1 * dy2 - c2 * dy1) / det - lat0) / dy1;
        let y = jmin as f64 + deltay.clamp(0.0, 1.0);

        Some((x, y))
    }

    /// Crossing-number test against the border of the sub-grid
    /// `[imin, imax] x [jmin, jmax]`.
    fn sub_grid_contains(&self, imin: usize, imax: usize, jmin: usize, jmax: usize, lon: f64, lat: f64) -> bool {
        let n = 2 * (jmax - jmin + imax - imin);
        let mut xb = Vec::with_capacity(n + 1);
        let mut yb = Vec::with_capacity(n + 1);
        let mut push = |i: usize, j: usize| {
            xb.push(self.lon.get(i, j));
            yb.push(self.lat.get(i, j));
        };

        for i in imin..imax {
            push(i, jmin);
        }
        for j in jmin..jmax {
            push(imax, j);
        }
        for i in ((imin + 1)..=imax).rev() {
            push(i, jmax);
        }
        for j in ((jmin + 1)..=jmax).rev() {
            push(imin, j);
        }
        push(imin, jmin);

        contains_point(&xb, &yb, lon, lat)
    }

    /// Geographic extent: `x` is longitude, `y` latitude.
    pub fn geo_bounds(&self) -> Bounds2D {
        let mut bounds = Bounds2D::from_point(self.lon.get(0, 0), self.lat.get(0, 0));
        for (lon, lat) in self.lon.as_slice().iter().zip(self.lat.as_slice()) {
            bounds.expand_to_include(*lon, *lat);
        }
        bounds
    }

    /// Number of water points.
    pub fn n_water_points(&self) -> usize {
        self.mask.as_slice().iter().filter(|&&m| m).count()
    }

    // =========================================================================
    // Sub-domain
    // =========================================================================

    /// Restrict the grid to `[ipo, ipo + nx) x [jpo, jpo + ny)`.
    pub fn crop(&self, ipo: usize, jpo: usize, nx: usize, ny: usize) -> Result<Self, GridError> {
        Self::new(
            self.lon.crop(ipo, jpo, nx, ny)?,
            self.lat.crop(ipo, jpo, nx, ny)?,
            self.mask.crop(ipo, jpo, nx, ny)?,
            self.h.crop(ipo, jpo, nx, ny)?,
            self.pm.crop(ipo, jpo, nx, ny)?,
            self.pn.crop(ipo, jpo, nx, ny)?,
        )
    }

    /// Index window `(ipo, jpo, nx, ny)` covering two geographic corners.
    pub fn subdomain(&self, p1: (f64, f64), p2: (f64, f64)) -> Result<(usize, usize, usize, usize), GridError> {
        let outside = |(lon, lat): (f64, f64)| GridError::OutsideGrid { lon, lat };
        let (x1, y1) = self.latlon2xy(p1.1, p1.0).ok_or_else(|| outside(p1))?;
        let (x2, y2) = self.latlon2xy(p2.1, p2.0).ok_or_else(|| outside(p2))?;

        let ipo = x1.min(x2).floor().max(0.0) as usize;
        let jpo = y1.min(y2).floor().max(0.0) as usize;
        let imax = (x1.max(x2).ceil() as usize).min(self.nx - 1);
        let jmax = (y1.max(y2).ceil() as usize).min(self.ny - 1);
        let nx = imax - ipo + 1;
        let ny = jmax - jpo + 1;
        if nx < 3 || ny < 3 {
            return Err(GridError::TooSmall { nx, ny });
        }
        Ok((ipo, jpo, nx, ny))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RectilinearGridBuilder;
    use approx::assert_relative_eq;

    /// 10 x 8 grid on [0, 0.9] x [40, 40.7] with an island at (5, 4).
    fn test_grid() -> RomsGrid {
        RectilinearGridBuilder::new(0.0, 0.9, 40.0, 40.7)
            .with_resolution(10, 8)
            .with_constant_depth(50.0)
            .with_land(|i, j| i == 5 && j == 4)
            .build()
            .unwrap()
    }

    #[test]
    fn test_in_water() {
        let g = test_grid();
        assert!(g.is_in_water(2, 2));
        assert!(!g.is_in_water(5, 4));
        assert!(!g.is_in_water(-1, 2));
        assert!(!g.is_in_water(2, 8));
        assert!(!g.is_in_water_xy(5.3, 3.6));
        assert!(g.is_in_water_xy(5.6, 3.6));
    }

    #[test]
    fn test_close_to_coast() {
        let g = test_grid();
        // nearest (4, 4), looking east towards the island
        assert!(g.is_close_to_coast(4.2, 4.2));
        // nearest (4, 4), looking west, all water
        assert!(!g.is_close_to_coast(3.8, 3.8));
        assert!(!g.is_close_to_coast(2.2, 2.2));
    }

    #[test]
    fn test_on_edge() {
        let g = test_grid();
        assert!(g.is_on_edge(0.5, 3.0));
        assert!(g.is_on_edge(8.1, 3.0));
        assert!(g.is_on_edge(3.0, 6.5));
        assert!(!g.is_on_edge(1.0, 1.0));
        assert!(!g.is_on_edge(8.0, 6.0));
    }

    #[test]
    fn test_bathy_nan_on_land() {
        let g = test_grid();
        assert_eq!(g.bathy(1, 1), 50.0);
        assert!(g.bathy(5, 4).is_nan());
        assert!(g.bathy(50, 4).is_nan());
    }

    #[test]
    fn test_xy2latlon() {
        let g = test_grid();
        let (lat, lon) = g.xy2latlon(2.5, 3.25);
        assert_relative_eq!(lon, 0.25, epsilon = 1e-9);
        assert_relative_eq!(lat, 40.325, epsilon = 1e-9);

        // clamped to the grid
        let (lat, lon) = g.xy2latlon(-3.0, 100.0);
        assert_relative_eq!(lon, 0.0, epsilon = 1e-5);
        assert_relative_eq!(lat, 40.7, epsilon = 1e-5);
    }

    #[test]
    fn test_latlon2xy_inverse() {
        let g = test_grid();
        for &(x, y) in &[(2.5, 3.25), (0.3, 0.7), (7.9, 6.1), (4.0, 4.0)] {
            let (lat, lon) = g.xy2latlon(x, y);
            let (gx, gy) = g.latlon2xy(lat, lon).unwrap();
            assert_relative_eq!(gx, x, epsilon = 1e-6);
            assert_relative_eq!(gy, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_latlon2xy_outside() {
        let g = test_grid();
        assert!(g.latlon2xy(39.0, 0.5).is_none());
        assert!(g.latlon2xy(40.3, 1.5).is_none());
        assert!(g.latlon2xy(f64::NAN, 0.5).is_none());
    }

    #[test]
    fn test_metrics() {
        let g = test_grid();
        assert_relative_eq!(g.deta(3, 3), 0.1 * 111_138.0, epsilon = 1e-6);
        assert!(g.dxi(3, 3) < g.deta(3, 3));
    }

    #[test]
    fn test_crop_and_subdomain() {
        let g = test_grid();
        let (ipo, jpo, nx, ny) = g.subdomain((0.25, 40.15), (0.55, 40.45)).unwrap();
        assert_eq!((ipo, jpo, nx, ny), (2, 1, 5, 5));

        let c = g.crop(ipo, jpo, nx, ny).unwrap();
        assert_eq!(c.nx(), 5);
        assert_relative_eq!(c.lon(0, 0), 0.2, epsilon = 1e-12);
        assert!(!c.is_in_water(3, 3));

        assert!(matches!(
            g.subdomain((5.0, 40.0), (0.5, 40.5)),
            Err(GridError::OutsideGrid { .. })
        ));
    }
}
