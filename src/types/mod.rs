//! Small value types shared across the crate.
//!
//! Grid positions are fractional indices on the ROMS rho grid, geographic
//! positions are longitude/latitude in degrees and depth in metres
//! (negative below the surface).
//!
//! # Example
//!
//! ```
//! use roms_drift::types::{Bounds2D, GridPos, Move};
//!
//! let p = GridPos::new(10.2, 4.7, 3.5);
//! let q = p + Move::new(0.5, -0.2, 0.0);
//! assert!((q.x - 10.7).abs() < 1e-12);
//!
//! let mut bbox = Bounds2D::from_point(p.x, p.y);
//! bbox.expand_to_include(q.x, q.y);
//! assert!(bbox.contains(10.5, 4.6));
//! ```

mod bounds;
mod position;

pub use bounds::Bounds2D;
pub use position::{GeoPos, GridPos, Move};
