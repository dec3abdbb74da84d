//! Geographic zones: release areas and recruitment areas.
//!
//! Zones are read from TOML zone files:
//!
//! ```toml
//! [[zone]]
//! key = "Gulf of Lions"
//! type = "release"
//! color = "#3366ff"
//! polygon = [[3.0, 43.0], [4.5, 43.0], [4.5, 43.6], [3.0, 43.6]]
//! bathy_mask = { inshore = 0.0, offshore = 200.0 }
//! thickness = { upper = 0.0, lower = 50.0 }
//! ```
//!
//! Polygon vertices are `[lon, lat]` pairs in any notation accepted by
//! [`crate::geodesy::parse_lonlat`].

mod file;
mod manager;
mod zone;

pub use file::{BathyMask, Thickness, ZoneDefinition, ZoneFile};
pub use manager::ZoneManager;
pub use zone::Zone;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Release,
    Recruitment,
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneKind::Release => f.write_str("release"),
            ZoneKind::Recruitment => f.write_str("recruitment"),
        }
    }
}

/// Errors raised while reading zone files and building zones.
#[derive(Debug, Error)]
pub enum ZoneFileError {
    #[error("Cannot read zone file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid zone file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{kind} zone {key:?}: polygon needs at least 3 points, got {n}")]
    TooFewPoints { kind: ZoneKind, key: String, n: usize },

    #[error("{kind} zone {key:?}: point (lon {lon}, lat {lat}) is out of the domain")]
    OutOfDomain {
        kind: ZoneKind,
        key: String,
        lon: f64,
        lat: f64,
    },

    #[error("{kind} zone {key:?}: lower depth ({lower} m) must be deeper than upper depth ({upper} m)")]
    InvalidThickness {
        kind: ZoneKind,
        key: String,
        upper: f64,
        lower: f64,
    },

    #[error("{kind} zone {key:?}: offshore line ({offshore} m) must be deeper than inshore line ({inshore} m)")]
    InvalidBathyMask {
        kind: ZoneKind,
        key: String,
        inshore: f64,
        offshore: f64,
    },
}
