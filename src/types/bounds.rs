//! Axis-aligned boxes.

use std::fmt;

/// Box `[x_min, x_max] × [y_min, y_max]`.
///
/// Zones keep one in grid coordinates for a cheap rejection test before the
/// polygon test; patch releases draw centres in one in lon/lat. A single
/// point is a valid box, so a box can be grown vertex by vertex.
///
/// # Example
///
/// ```
/// use roms_drift::types::Bounds2D;
///
/// let b = Bounds2D::new(5.0, 7.0, 37.0, 41.0);
/// assert_eq!(b.lerp(0.5, 0.5), (6.0, 39.0));
/// assert!(b.contains(7.0, 37.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds2D {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds2D {
    /// # Panics
    ///
    /// Panics if a maximum is below its minimum.
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        assert!(x_min <= x_max, "inverted x range: x_min {x_min} > x_max {x_max}");
        assert!(y_min <= y_max, "inverted y range: y_min {y_min} > y_max {y_max}");
        Self { x_min, x_max, y_min, y_max }
    }

    pub fn from_point(x: f64, y: f64) -> Self {
        Self { x_min: x, x_max: x, y_min: y, y_max: y }
    }

    /// Smallest box holding every point, `None` without points.
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut points = points.into_iter();
        let (x, y) = points.next()?;
        let mut bbox = Self::from_point(x, y);
        for (x, y) in points {
            bbox.expand_to_include(x, y);
        }
        Some(bbox)
    }

    pub fn expand_to_include(&mut self, x: f64, y: f64) {
        self.x_min = self.x_min.min(x);
        self.x_max = self.x_max.max(x);
        self.y_min = self.y_min.min(y);
        self.y_max = self.y_max.max(y);
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (0.5 * (self.x_min + self.x_max), 0.5 * (self.y_min + self.y_max))
    }

    /// Edges included.
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y)
    }

    /// Point at fractions `(u, v)` of the width and height, used to draw
    /// uniform positions from `u, v` in `[0, 1)`.
    #[inline]
    pub fn lerp(&self, u: f64, v: f64) -> (f64, f64) {
        (self.x_min + u * self.width(), self.y_min + v * self.height())
    }
}

impl fmt::Display for Bounds2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x {}..{} y {}..{}", self.x_min, self.x_max, self.y_min, self.y_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_from_vertices() {
        let b = Bounds2D::from_points([(5.0, 41.0), (6.0, 37.0), (7.0, 41.0)]).unwrap();
        assert_eq!(b, Bounds2D::new(5.0, 7.0, 37.0, 41.0));
        assert!(Bounds2D::from_points(std::iter::empty()).is_none());

        let p = Bounds2D::from_point(3.0, 4.0);
        assert_eq!(p.width(), 0.0);
        assert!(p.contains(3.0, 4.0));
    }

    #[test]
    fn test_edges_are_inside() {
        let b = Bounds2D::new(0.0, 10.0, 0.0, 5.0);
        assert!(b.contains(0.0, 0.0));
        assert!(b.contains(10.0, 5.0));
        assert!(!b.contains(-0.1, 2.0));
        assert!(!b.contains(5.0, 5.1));
    }

    #[test]
    fn test_lerp_corners() {
        let b = Bounds2D::new(-2.0, 2.0, 10.0, 11.0);
        assert_eq!(b.lerp(0.0, 0.0), (-2.0, 10.0));
        assert_eq!(b.lerp(1.0, 1.0), (2.0, 11.0));
        assert_eq!(b.lerp(0.5, 0.5), b.center());
    }

    #[test]
    #[should_panic(expected = "inverted x range")]
    fn test_inverted_range() {
        Bounds2D::new(1.0, 0.0, 0.0, 1.0);
    }
}
