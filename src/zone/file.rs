use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geodesy::Coordinate;

use super::{ZoneFileError, ZoneKind};

fn default_true() -> bool {
    true
}

fn default_color() -> String {
    "#ff0000".to_string()
}

/// Bathymetric band (m, positive depths) a zone is restricted to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BathyMask {
    pub inshore: f64,
    pub offshore: f64,
}

/// Depth layer (m, positive depths) a zone is restricted to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thickness {
    pub upper: f64,
    pub lower: f64,
}

/// One `[[zone]]` table of a zone file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: ZoneKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_color")]
    pub color: String,
    /// `[lon, lat]` vertices.
    pub polygon: Vec<[Coordinate; 2]>,
    #[serde(default)]
    pub bathy_mask: Option<BathyMask>,
    #[serde(default)]
    pub thickness: Option<Thickness>,
    /// User-defined share of the released particles.
    #[serde(default)]
    pub proportion: Option<f64>,
}

impl ZoneDefinition {
    /// Zone with a polygon given in decimal degrees.
    pub fn new(key: impl Into<String>, kind: ZoneKind, polygon: &[(f64, f64)]) -> Self {
        Self {
            key: key.into(),
            kind,
            enabled: true,
            color: default_color(),
            polygon: polygon
                .iter()
                .map(|&(lon, lat)| [Coordinate(lon), Coordinate(lat)])
                .collect(),
            bathy_mask: None,
            thickness: None,
            proportion: None,
        }
    }

    pub fn with_bathy_mask(mut self, inshore: f64, offshore: f64) -> Self {
        self.bathy_mask = Some(BathyMask { inshore, offshore });
        self
    }

    pub fn with_thickness(mut self, upper: f64, lower: f64) -> Self {
        self.thickness = Some(Thickness { upper, lower });
        self
    }

    pub fn with_proportion(mut self, proportion: f64) -> Self {
        self.proportion = Some(proportion);
        self
    }

    /// Polygon as `(lon, lat)` pairs.
    pub fn lonlat(&self) -> Vec<(f64, f64)> {
        self.polygon.iter().map(|[lon, lat]| (lon.0, lat.0)).collect()
    }
}

/// Content of a zone file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneFile {
    #[serde(rename = "zone", default)]
    pub zones: Vec<ZoneDefinition>,
}

impl ZoneFile {
    pub fn from_toml_str(s: &str) -> Result<Self, ZoneFileError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ZoneFileError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ZoneFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Enabled zones of one kind, in file order.
    pub fn enabled(&self, kind: ZoneKind) -> impl Iterator<Item = &ZoneDefinition> {
        self.zones.iter().filter(move |z| z.enabled && z.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZONES: &str = r##"
[[zone]]
key = "coast"
type = "release"
color = "#00ff00"
polygon = [[3.0, 43.0], ["4° 30'", 43.0], [4.5, "43° 36'"]]
bathy_mask = { inshore = 0.0, offshore = 200.0 }

[[zone]]
key = "off"
type = "release"
enabled = false
polygon = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]

[[zone]]
key = "nursery"
type = "recruitment"
polygon = [[5.0, 43.0], [6.0, 43.0], [6.0, 44.0]]
thickness = { upper = 0.0, lower = 30.0 }
"##;

    #[test]
    fn test_parse_zone_file() {
        let file = ZoneFile::from_toml_str(ZONES).unwrap();
        assert_eq!(file.zones.len(), 3);
        let release: Vec<_> = file.enabled(ZoneKind::Release).collect();
        assert_eq!(release.len(), 1);
        assert_eq!(release[0].key, "coast");
        assert_eq!(release[0].lonlat()[1], (4.5, 43.0));
        assert!((release[0].lonlat()[2].1 - 43.6).abs() < 1e-9);
        assert_eq!(
            release[0].bathy_mask,
            Some(BathyMask {
                inshore: 0.0,
                offshore: 200.0
            })
        );

        let recruitment: Vec<_> = file.enabled(ZoneKind::Recruitment).collect();
        assert_eq!(recruitment[0].color, "#ff0000");
        assert_eq!(recruitment[0].thickness.map(|t| t.lower), Some(30.0));
    }

    #[test]
    fn test_bad_type() {
        let err = ZoneFile::from_toml_str("[[zone]]\nkey = \"a\"\ntype = \"spawn\"\npolygon = []\n");
        assert!(matches!(err, Err(ZoneFileError::Toml(_))));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            ZoneFile::load("/nonexistent/zones.toml"),
            Err(ZoneFileError::Io { .. })
        ));
    }
}
