use geo::{GeodesicArea, LineString};

use crate::dataset::Dataset;
use crate::grid::round_index;
use crate::polygon::Polygon;
use crate::types::Bounds2D;

use super::{BathyMask, Thickness, ZoneDefinition, ZoneFileError, ZoneKind};

/// A zone located on the grid.
#[derive(Clone, Debug)]
pub struct Zone {
    key: String,
    index: usize,
    kind: ZoneKind,
    color: String,
    /// lon/lat vertices, closed
    geo_polygon: Polygon,
    /// grid vertices, closed
    polygon: Polygon,
    bbox: Bounds2D,
    bathy_mask: Option<BathyMask>,
    thickness: Option<Thickness>,
    proportion: Option<f64>,
}

impl Zone {
    /// Locate a zone definition on the dataset grid.
    pub fn new(def: &ZoneDefinition, index: usize, dataset: &dyn Dataset) -> Result<Self, ZoneFileError> {
        let lonlat = def.lonlat();
        if lonlat.len() < 3 {
            return Err(ZoneFileError::TooFewPoints {
                kind: def.kind,
                key: def.key.clone(),
                n: lonlat.len(),
            });
        }
        if let Some(t) = def.thickness.filter(|t| t.lower < t.upper) {
            return Err(ZoneFileError::InvalidThickness {
                kind: def.kind,
                key: def.key.clone(),
                upper: t.upper,
                lower: t.lower,
            });
        }
        if let Some(b) = def.bathy_mask.filter(|b| b.offshore < b.inshore) {
            return Err(ZoneFileError::InvalidBathyMask {
                kind: def.kind,
                key: def.key.clone(),
                inshore: b.inshore,
                offshore: b.offshore,
            });
        }

        let grid_points = lonlat
            .iter()
            .map(|&(lon, lat)| {
                dataset.latlon2xy(lat, lon).ok_or_else(|| ZoneFileError::OutOfDomain {
                    kind: def.kind,
                    key: def.key.clone(),
                    lon,
                    lat,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let bbox = Bounds2D::from_points(grid_points.iter().copied()).ok_or_else(|| ZoneFileError::TooFewPoints {
            kind: def.kind,
            key: def.key.clone(),
            n: 0,
        })?;

        Ok(Self {
            key: def.key.clone(),
            index,
            kind: def.kind,
            color: def.color.clone(),
            geo_polygon: Polygon::new(lonlat),
            polygon: Polygon::new(grid_points),
            bbox,
            bathy_mask: def.bathy_mask,
            thickness: def.thickness,
            proportion: def.proportion,
        })
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Index among the zones of the same kind.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn kind(&self) -> ZoneKind {
        self.kind
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub fn geo_polygon(&self) -> &Polygon {
        &self.geo_polygon
    }

    pub fn bathy_mask(&self) -> Option<BathyMask> {
        self.bathy_mask
    }

    pub fn thickness(&self) -> Option<Thickness> {
        self.thickness
    }

    pub fn proportion(&self) -> Option<f64> {
        self.proportion
    }

    /// Bounding box in grid coordinates.
    pub fn bbox(&self) -> Bounds2D {
        self.bbox
    }

    fn is_between_bathy_lines(&self, dataset: &dyn Dataset, x: f64, y: f64) -> bool {
        match self.bathy_mask {
            Some(mask) => {
                let h = dataset.bathy(round_index(x), round_index(y));
                h > mask.inshore && h < mask.offshore
            }
            None => true,
        }
    }

    /// Water point inside the polygon and the bathymetric band.
    pub fn contains_point(&self, dataset: &dyn Dataset, x: f64, y: f64) -> bool {
        self.bbox.contains(x, y)
            && dataset.is_in_water_xy(x, y)
            && self.is_between_bathy_lines(dataset, x, y)
            && self.polygon.contains(x, y)
    }

    /// [`Zone::contains_point`] plus the depth layer in 3-D.
    pub fn contains_particle(&self, dataset: &dyn Dataset, x: f64, y: f64, depth: f64) -> bool {
        if let (true, Some(t)) = (dataset.is_3d(), self.thickness) {
            let d = depth.abs();
            if !(d >= t.upper && d <= t.lower) {
                return false;
            }
        }
        self.contains_point(dataset, x, y)
    }

    /// Water area inside the zone (km²).
    pub fn area_km2(&self, dataset: &dyn Dataset) -> f64 {
        let mut area = 0.0;
        for j in 0..dataset.ny() {
            for i in 0..dataset.nx() {
                if self.contains_point(dataset, i as f64, j as f64) {
                    area += dataset.dxi(i, j) * dataset.deta(i, j) * 1e-6;
                }
            }
        }
        area
    }

    /// Geodesic area enclosed by the lon/lat polygon (km²), land included.
    pub fn polygon_area_km2(&self) -> f64 {
        let ring: LineString<f64> = self.geo_polygon.vertices().collect();
        geo::Polygon::new(ring, vec![]).geodesic_area_unsigned() * 1e-6
    }
}
