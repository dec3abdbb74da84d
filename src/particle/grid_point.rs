//! Particle position kept in grid and geographic coordinates.

use crate::dataset::Dataset;
use crate::types::{GeoPos, GridPos, Move};

use super::ParticleError;

/// Position in both coordinate systems plus the move accumulated during the
/// current step.
///
/// Each side records whether it changed so that conversions only run when
/// needed: [`GridPoint::geo2grid`] after a geographic update (release),
/// [`GridPoint::grid2geo`] after a grid update (move).
#[derive(Clone, Debug)]
pub struct GridPoint {
    grid: GridPos,
    geo: GeoPos,
    pending: Move,
    exclusive_h: bool,
    exclusive_v: bool,
    xy_changed: bool,
    z_changed: bool,
    latlon_changed: bool,
    depth_changed: bool,
}

impl GridPoint {
    /// Point known by its geographic coordinates, grid side not yet computed.
    pub fn from_geo(geo: GeoPos) -> Self {
        Self {
            grid: GridPos::default(),
            geo,
            pending: Move::ZERO,
            exclusive_h: false,
            exclusive_v: false,
            xy_changed: false,
            z_changed: false,
            latlon_changed: true,
            depth_changed: !geo.depth.is_nan(),
        }
    }

    /// Point known by its grid coordinates, geographic side not yet computed.
    pub fn from_grid(grid: GridPos) -> Self {
        Self {
            grid,
            geo: GeoPos::default(),
            pending: Move::ZERO,
            exclusive_h: false,
            exclusive_v: false,
            xy_changed: true,
            z_changed: true,
            latlon_changed: false,
            depth_changed: false,
        }
    }

    #[inline]
    pub fn pos(&self) -> GridPos {
        self.grid
    }

    #[inline]
    pub fn geo(&self) -> GeoPos {
        self.geo
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.grid.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.grid.y
    }

    #[inline]
    pub fn z(&self) -> f64 {
        self.grid.z
    }

    #[inline]
    pub fn lon(&self) -> f64 {
        self.geo.lon
    }

    #[inline]
    pub fn lat(&self) -> f64 {
        self.geo.lat
    }

    #[inline]
    pub fn depth(&self) -> f64 {
        self.geo.depth
    }

    /// Move accumulated since the last [`GridPoint::apply_move`].
    #[inline]
    pub fn pending_move(&self) -> Move {
        self.pending
    }

    pub fn set_x(&mut self, x: f64) {
        if self.grid.x != x {
            self.grid.x = x;
            self.xy_changed = true;
        }
    }

    pub fn set_y(&mut self, y: f64) {
        if self.grid.y != y {
            self.grid.y = y;
            self.xy_changed = true;
        }
    }

    /// Set the level, bounded to `[0, nz - 1]`.
    pub fn set_z(&mut self, z: f64, nz: usize) {
        let z = z.clamp(0.0, nz.saturating_sub(1) as f64);
        if self.grid.z != z {
            self.grid.z = z;
            self.z_changed = true;
        }
    }

    pub fn set_depth(&mut self, depth: f64) {
        if self.geo.depth != depth {
            self.geo.depth = depth;
            self.depth_changed = true;
        }
    }

    pub fn set_lonlat(&mut self, lon: f64, lat: f64) {
        if self.geo.lon != lon || self.geo.lat != lat {
            self.geo.lon = lon;
            self.geo.lat = lat;
            self.latlon_changed = true;
        }
    }

    /// Add an action's move to the accumulator.
    ///
    /// An exclusive move replaces whatever was accumulated on its axis and
    /// freezes that axis for the rest of the step. Later non-exclusive moves
    /// on a frozen axis are ignored; a second exclusive claim is an error.
    pub fn increment(&mut self, mv: Move, exclusive_h: bool, exclusive_v: bool) -> Result<(), ParticleError> {
        if self.exclusive_h && exclusive_h {
            return Err(ParticleError::TwoExclusiveMoves { axis: "horizontal" });
        }
        if self.exclusive_v && exclusive_v {
            return Err(ParticleError::TwoExclusiveMoves { axis: "vertical" });
        }

        if !self.exclusive_h {
            if exclusive_h {
                self.pending.dx = mv.dx;
                self.pending.dy = mv.dy;
                self.exclusive_h = true;
            } else {
                self.pending.dx += mv.dx;
                self.pending.dy += mv.dy;
            }
        }
        if !self.exclusive_v {
            if exclusive_v {
                self.pending.dz = mv.dz;
                self.exclusive_v = true;
            } else {
                self.pending.dz += mv.dz;
            }
        }
        Ok(())
    }

    /// Replace the accumulated move, keeping exclusivity flags.
    pub fn set_pending_move(&mut self, mv: Move) {
        self.pending = mv;
    }

    /// Apply and clear the accumulated move.
    pub fn apply_move(&mut self, nz: usize) {
        let Move { dx, dy, dz } = self.pending;
        self.set_x(self.grid.x + dx);
        self.set_y(self.grid.y + dy);
        if nz > 1 {
            self.set_z(self.grid.z + dz, nz);
        }
        self.pending = Move::ZERO;
        self.exclusive_h = false;
        self.exclusive_v = false;
    }

    /// Refresh grid coordinates from changed geographic ones.
    pub fn geo2grid(&mut self, dataset: &dyn Dataset) -> Result<(), ParticleError> {
        if self.latlon_changed {
            let (x, y) = dataset
                .latlon2xy(self.geo.lat, self.geo.lon)
                .ok_or(ParticleError::OutsideGrid {
                    lon: self.geo.lon,
                    lat: self.geo.lat,
                })?;
            self.grid.x = x;
            self.grid.y = y;
            self.latlon_changed = false;
        }
        if dataset.is_3d() && self.depth_changed {
            self.grid.z = dataset.depth2z(self.grid.x, self.grid.y, self.geo.depth);
            self.depth_changed = false;
        }
        Ok(())
    }

    /// Refresh geographic coordinates from changed grid ones.
    pub fn grid2geo(&mut self, dataset: &dyn Dataset) {
        // depth of a level depends on the column, so a horizontal move refreshes it too
        if dataset.is_3d() && (self.z_changed || self.xy_changed) {
            self.geo.depth = dataset.z2depth(self.grid.x, self.grid.y, self.grid.z);
            self.z_changed = false;
        }
        if self.xy_changed {
            let (lat, lon) = dataset.xy2latlon(self.grid.x, self.grid.y);
            self.geo.lat = lat;
            self.geo.lon = lon;
            self.xy_changed = false;
        }
    }

    pub fn is_in_water(&self, dataset: &dyn Dataset) -> bool {
        dataset.is_in_water_xy(self.grid.x, self.grid.y)
    }

    pub fn is_on_edge(&self, dataset: &dyn Dataset) -> bool {
        dataset.is_on_edge(self.grid.x, self.grid.y)
    }
}
