//! Grid and geographic positions.

use std::fmt;
use std::ops::{Add, AddAssign};

/// Position in grid index space.
///
/// `x` runs along xi (i index), `y` along eta (j index), `z` is the
/// fractional rho level (0 = bottom level). 2D simulations leave `z` at 0.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GridPos {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl GridPos {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn horizontal(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Same horizontal position, different level.
    #[inline]
    pub fn with_z(self, z: f64) -> Self {
        Self { z, ..self }
    }
}

impl Add<Move> for GridPos {
    type Output = GridPos;

    #[inline]
    fn add(self, m: Move) -> GridPos {
        GridPos::new(self.x + m.dx, self.y + m.dy, self.z + m.dz)
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.4}, y: {:.4}, z: {:.4})", self.x, self.y, self.z)
    }
}

/// Geographic position: degrees east, degrees north, metres (negative down).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPos {
    pub lon: f64,
    pub lat: f64,
    pub depth: f64,
}

impl GeoPos {
    #[inline]
    pub const fn new(lon: f64, lat: f64, depth: f64) -> Self {
        Self { lon, lat, depth }
    }

    /// Surface or 2D position, depth unknown.
    #[inline]
    pub const fn surface(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            depth: f64::NAN,
        }
    }
}

impl Default for GeoPos {
    fn default() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN)
    }
}

impl fmt::Display for GeoPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.depth.is_nan() {
            write!(f, "({:.5}, {:.5})", self.lat, self.lon)
        } else {
            write!(f, "({:.5}, {:.5}, {:.2})", self.lat, self.lon, self.depth)
        }
    }
}

/// Displacement in grid units, accumulated by actions during a time step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Move {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl Move {
    pub const ZERO: Self = Self {
        dx: 0.0,
        dy: 0.0,
        dz: 0.0,
    };

    #[inline]
    pub const fn new(dx: f64, dy: f64, dz: f64) -> Self {
        Self { dx, dy, dz }
    }

    #[inline]
    pub const fn horizontal(dx: f64, dy: f64) -> Self {
        Self { dx, dy, dz: 0.0 }
    }

    #[inline]
    pub const fn vertical(dz: f64) -> Self {
        Self {
            dx: 0.0,
            dy: 0.0,
            dz,
        }
    }

    #[inline]
    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.dx * factor, self.dy * factor, self.dz * factor)
    }
}

impl Add for Move {
    type Output = Move;

    #[inline]
    fn add(self, o: Move) -> Move {
        Move::new(self.dx + o.dx, self.dy + o.dy, self.dz + o.dz)
    }
}

impl AddAssign for Move {
    #[inline]
    fn add_assign(&mut self, o: Move) {
        self.dx += o.dx;
        self.dy += o.dy;
        self.dz += o.dz;
    }
}
