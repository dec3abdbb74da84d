//! Vertical coordinate of ROMS grids.
//!
//! ROMS discretises the water column with terrain-following S-coordinates:
//! `nz` rho levels between `nz + 1` w levels, the bottom w level on the sea
//! bed (`-h`) and the top one on the free surface (`ζ`). The level depths
//! depend on the critical depth `hc`, the stretching curves `Cs_r`/`Cs_w`
//! and the transform equation (see [`VerticalTransform`]).
//!
//! # Example
//!
//! ```
//! use roms_drift::vertical::{SCoordinate, SongHaidvogelStretching, VerticalTransform};
//!
//! // 30 levels, Song-Haidvogel curves, critical depth 10 m
//! let sc = SCoordinate::from_stretching(
//!     30,
//!     VerticalTransform::Old,
//!     10.0,
//!     &SongHaidvogelStretching::new(6.0, 0.0),
//! )
//! .unwrap();
//!
//! let (z_r, z_w) = sc.levels(500.0);
//! assert!(z_r[0] < -400.0);   // bottom level near the sea bed
//! assert!(z_r[29] > -5.0);    // top level near the surface
//! assert_eq!(z_w.len(), 31);
//! ```

mod s_coordinate;
mod stretching;

pub use s_coordinate::{
    SCoordinate, VerticalError, VerticalTransform, ZETA_FILL, sc_r, sc_w, zeta_correction,
};
pub use stretching::{
    Shchepetkin2010Stretching, SongHaidvogelStretching, Stretching, UniformStretching,
};
