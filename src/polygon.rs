//! Crossing-number point-in-polygon test.
//!
//! Used both to locate geographic points on the curvilinear grid (the
//! polygon is the boundary of a sub-grid) and to test zone membership.

use crate::types::Bounds2D;

/// Crossing-number test on a closed boundary (`xb[n-1] == xb[0]`).
///
/// Edges are walked in order; vertical edges are ignored. A point equal to
/// a vertex is inside.
pub fn contains_point(xb: &[f64], yb: &[f64], x: f64, y: f64) -> bool {
    debug_assert_eq!(xb.len(), yb.len());
    let n = xb.len().min(yb.len());
    if n < 2 {
        return false;
    }

    let mut crossings: i64 = 0;
    for k in 0..n - 1 {
        if xb[k] == x && yb[k] == y {
            return true;
        }
        if xb[k] == xb[k + 1] {
            continue;
        }
        let dx1 = x - xb[k];
        let dx2 = xb[k + 1] - x;
        let dxy = dx2 * (y - yb[k]) - dx1 * (yb[k + 1] - y);

        let inc = if (dx1 == 0.0 && y >= yb[k]) || (dx2 == 0.0 && y >= yb[k + 1]) {
            1
        } else if dx1 * dx2 > 0.0 && (xb[k + 1] - xb[k]) * dxy >= 0.0 {
            2
        } else {
            0
        };

        if xb[k + 1] > xb[k] {
            crossings += inc;
        } else {
            crossings -= inc;
        }
    }
    crossings != 0
}

/// Closed polygon in an arbitrary plane (grid or lon/lat coordinates).
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl Polygon {
    /// Build a polygon from its vertices; it is closed if needed.
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
        if let (Some(&x0), Some(&y0)) = (xs.first(), ys.first()) {
            let open = xs.last() != Some(&x0) || ys.last() != Some(&y0);
            if open || xs.len() == 1 {
                xs.push(x0);
                ys.push(y0);
            }
        }
        Self { xs, ys }
    }

    /// Number of stored vertices, closing vertex included.
    #[inline]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn vertices(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }

    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        contains_point(&self.xs, &self.ys, x, y)
    }

    /// Bounding box of the vertices.
    pub fn bounds(&self) -> Option<Bounds2D> {
        Bounds2D::from_points(self.vertices())
    }
}
