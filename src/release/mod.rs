//! Particle release: schedule of release events and the release methods
//! placing particles in zones, stains, patches or at listed positions.

mod patchy;
mod schedule;
mod stain;
mod text_file;
mod zone_release;

pub use schedule::ReleaseSchedule;
pub use text_file::parse_release_points;

use std::path::PathBuf;

use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::dataset::Dataset;
use crate::geodesy::Coordinate;
use crate::grid::round_index;
use crate::particle::{Particle, ParticleError};
use crate::types::{Bounds2D, GeoPos};
use crate::zone::{ZoneFileError, ZoneKind, ZoneManager};

/// Failed draws allowed per particle before giving up.
pub const DRAW_MAX: usize = 2000;

/// Errors raised while scheduling and releasing particles.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("Release event at {event} s cannot occur before the initial time {t0} s")]
    EventBeforeStart { event: f64, t0: f64 },

    #[error(transparent)]
    Zone(#[from] ZoneFileError),

    #[error(transparent)]
    Particle(#[from] ParticleError),

    #[error("No {0} zone defined")]
    NoZone(ZoneKind),

    #[error("User-defined zone proportions must be set on every zone and sum to 1, got {sum}")]
    InvalidProportions { sum: f64 },

    #[error("Unable to release a particle in {target} after {attempts} draws, check its definition")]
    DrawLimit { target: String, attempts: usize },

    #[error("Centre of the stain (lon {lon}, lat {lat}) is not in water or out of the domain")]
    StainNotInWater { lon: f64, lat: f64 },

    #[error("Cannot read release file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Release file {path}, line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// How particles are placed at each release event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ReleaseMethod {
    /// Uniformly in the release zones of a zone file, dispatched by area.
    Zone {
        number_particles: usize,
        zone_file: PathBuf,
        #[serde(default)]
        user_defined_proportions: bool,
    },
    /// In a disk of `radius` metres around a point.
    Stain {
        number_particles: usize,
        lon: Coordinate,
        lat: Coordinate,
        /// m, positive
        #[serde(default)]
        depth: f64,
        radius: f64,
        #[serde(default)]
        thickness: f64,
    },
    /// At the positions listed in a text file.
    TextFile { path: PathBuf },
    /// Patches of aggregated particles, centred in the release zones or in
    /// a lon/lat box.
    Patchy {
        number_patches: usize,
        particles_per_patch: usize,
        radius: f64,
        #[serde(default)]
        thickness: f64,
        #[serde(default)]
        zone_file: Option<PathBuf>,
        /// `[lon_min, lon_max, lat_min, lat_max]`
        #[serde(default)]
        bbox: Option<[Coordinate; 4]>,
    },
}

impl Default for ReleaseMethod {
    fn default() -> Self {
        ReleaseMethod::Stain {
            number_particles: 100,
            lon: Coordinate(0.0),
            lat: Coordinate(0.0),
            depth: 0.0,
            radius: 1000.0,
            thickness: 0.0,
        }
    }
}

impl ReleaseMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ReleaseMethod::Zone { .. } => "zone",
            ReleaseMethod::Stain { .. } => "stain",
            ReleaseMethod::TextFile { .. } => "text_file",
            ReleaseMethod::Patchy { .. } => "patchy",
        }
    }

    /// Zone file to load as release zones, if any.
    pub fn zone_file(&self) -> Option<&PathBuf> {
        match self {
            ReleaseMethod::Zone { zone_file, .. } => Some(zone_file),
            ReleaseMethod::Patchy { zone_file, .. } => zone_file.as_ref(),
            _ => None,
        }
    }
}

// =============================================================================
// Releaser
// =============================================================================

/// Places particles according to a [`ReleaseMethod`].
///
/// Draws come from a stream seeded by the simulation seed; each released
/// particle gets its own stream derived from the same seed and its index.
pub struct Releaser {
    method: ReleaseMethod,
    seed: u64,
    rng: Pcg64,
    points: Vec<GeoPos>,
    next_point: usize,
}

impl Releaser {
    pub fn new(method: ReleaseMethod, seed: u64) -> Self {
        Self {
            method,
            seed,
            rng: Pcg64::seed_from_u64(seed ^ 0x5EED_0F_4E1E_A5E),
            points: Vec::new(),
            next_point: 0,
        }
    }

    pub fn method(&self) -> &ReleaseMethod {
        &self.method
    }

    /// Load the release zones and text files the method needs.
    pub fn prepare(&mut self, dataset: &dyn Dataset, zones: &mut ZoneManager) -> Result<(), ReleaseError> {
        if let Some(path) = self.method.zone_file() {
            zones.load_file(path, ZoneKind::Release, dataset)?;
            if zones.zones(ZoneKind::Release).is_empty() {
                return Err(ReleaseError::NoZone(ZoneKind::Release));
            }
        }
        if let ReleaseMethod::TextFile { path } = &self.method {
            self.points = text_file::read_release_points(path)?;
        }
        Ok(())
    }

    /// Total number of particles over all release events.
    pub fn number_particles(&self) -> usize {
        match &self.method {
            ReleaseMethod::Zone { number_particles, .. } | ReleaseMethod::Stain { number_particles, .. } => {
                *number_particles
            }
            ReleaseMethod::TextFile { .. } => self.points.len(),
            ReleaseMethod::Patchy {
                number_patches,
                particles_per_patch,
                ..
            } => number_patches * particles_per_patch,
        }
    }

    /// Release `n` particles at `time`, indexed from `first_index`.
    ///
    /// Patchy releases round `n` to whole patches. Text-file releases take
    /// the next `n` listed points and may return fewer particles when
    /// points are not in water.
    pub fn release(
        &mut self,
        n: usize,
        first_index: usize,
        time: f64,
        dataset: &dyn Dataset,
        zones: &ZoneManager,
    ) -> Result<Vec<Particle>, ReleaseError> {
        let ctx = ReleaseContext {
            dataset,
            seed: self.seed,
            time,
        };
        match &self.method {
            ReleaseMethod::Zone {
                user_defined_proportions,
                ..
            } => zone_release::release(&ctx, &mut self.rng, zones, n, first_index, *user_defined_proportions),
            ReleaseMethod::Stain {
                lon,
                lat,
                depth,
                radius,
                thickness,
                ..
            } => {
                let centre = GeoPos::new(lon.0, lat.0, -depth.abs());
                stain::check_centre(dataset, centre)?;
                let mut out = Vec::with_capacity(n);
                for k in 0..n {
                    let p = stain::draw(&ctx, &mut self.rng, first_index + k, centre, *radius, *thickness, None)?;
                    out.push(p);
                }
                Ok(out)
            }
            ReleaseMethod::TextFile { .. } => {
                let end = (self.next_point + n).min(self.points.len());
                let points = &self.points[self.next_point..end];
                self.next_point = end;
                text_file::release(&ctx, points, first_index)
            }
            ReleaseMethod::Patchy {
                particles_per_patch,
                radius,
                thickness,
                bbox,
                ..
            } => {
                let per_patch = (*particles_per_patch).max(1);
                let n_patches = n.div_ceil(per_patch);
                let area = match bbox {
                    Some([lon_min, lon_max, lat_min, lat_max]) => patchy::PatchArea::Box(Bounds2D::new(
                        lon_min.0.min(lon_max.0),
                        lon_min.0.max(lon_max.0),
                        lat_min.0.min(lat_max.0),
                        lat_min.0.max(lat_max.0),
                    )),
                    None => patchy::PatchArea::Zones(zones),
                };
                let patch = patchy::Patch {
                    per_patch,
                    radius: *radius,
                    thickness: *thickness,
                };
                patchy::release(&ctx, &mut self.rng, &area, &patch, n_patches, first_index)
            }
        }
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

pub(crate) struct ReleaseContext<'a> {
    pub dataset: &'a dyn Dataset,
    pub seed: u64,
    pub time: f64,
}

/// Depth (m, negative) lies between the sea bed and the surface.
pub(crate) fn is_above_bottom(dataset: &dyn Dataset, x: f64, y: f64, depth: f64) -> bool {
    let h = dataset.bathy(round_index(x), round_index(y));
    depth <= 0.0 && depth >= -h
}

/// Particle at a geographic position, `None` when the position is not a
/// valid release point.
pub(crate) fn geo_particle(
    ctx: &ReleaseContext<'_>,
    index: usize,
    geo: GeoPos,
) -> Result<Option<Particle>, ReleaseError> {
    let ds = ctx.dataset;
    let Some((x, y)) = ds.latlon2xy(geo.lat, geo.lon) else {
        return Ok(None);
    };
    if !ds.is_in_water_xy(x, y) || ds.is_on_edge(x, y) {
        return Ok(None);
    }
    let geo = if ds.is_3d() {
        let depth = if geo.depth.is_nan() { 0.0 } else { geo.depth };
        if !is_above_bottom(ds, x, y, depth) {
            return Ok(None);
        }
        GeoPos::new(geo.lon, geo.lat, depth)
    } else {
        GeoPos::surface(geo.lon, geo.lat)
    };
    let mut particle = Particle::from_geo(index, geo, ctx.time, ctx.seed);
    particle.point_mut().geo2grid(ds)?;
    Ok(Some(particle))
}

/// Split `total` proportionally to `weights`, correcting the rounding one
/// particle at a time round-robin. Zones already at zero are skipped when
/// removing a surplus, so the counts always sum to `total`.
pub(crate) fn dispatch(total: usize, weights: &[f64]) -> Vec<usize> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let sum: f64 = weights.iter().sum();
    let mut counts: Vec<usize> = weights
        .iter()
        .map(|w| if sum > 0.0 { (total as f64 * w / sum).round().max(0.0) as usize } else { 0 })
        .collect();

    let mut assigned: usize = counts.iter().sum();
    let mut k = 0;
    while assigned != total {
        let zone = k % n;
        if assigned < total {
            counts[zone] += 1;
            assigned += 1;
        } else if counts[zone] > 0 {
            counts[zone] -= 1;
            assigned -= 1;
        }
        k += 1;
    }

    for (zone, &c) in counts.iter().enumerate() {
        if c == 0 {
            warn!(zone, "Release zone has not been attributed any particle, it may be too small or badly defined");
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_weight() {
        assert_eq!(dispatch(10, &[1.0, 1.0, 2.0]), vec![2, 3, 5]);
        assert_eq!(dispatch(100, &[0.5, 0.25, 0.25]), vec![50, 25, 25]);
        let d = dispatch(7, &[1.0, 1.0, 1.0]);
        assert_eq!(d.iter().sum::<usize>(), 7);
        assert_eq!(d, vec![3, 2, 2]);
        assert_eq!(dispatch(1, &[1000.0, 1.0]), vec![1, 0]);
    }

    #[test]
    fn test_dispatch_tiny_zone_keeps_total() {
        // rounding gives 0 + 1 + 1 + 1, the surplus must not come from the empty zone
        let d = dispatch(2, &[0.001, 1.0, 1.0, 1.0]);
        assert_eq!(d, vec![0, 0, 1, 1]);
        assert_eq!(d.iter().sum::<usize>(), 2);

        for total in [1, 2, 5, 13, 100] {
            let d = dispatch(total, &[1e-6, 0.3, 0.3, 0.3, 2e-6, 0.1]);
            assert_eq!(d.iter().sum::<usize>(), total, "total {total}");
        }
        assert_eq!(dispatch(4, &[0.0, 0.0]), vec![2, 2]);
    }

    use crate::dataset::{AnalyticSourceBuilder, MemorySource, RomsDataset};
    use crate::grid::RectilinearGridBuilder;
    use crate::vertical::{SCoordinate, UniformStretching, VerticalTransform};
    use crate::zone::{ZoneDefinition, ZoneFile};

    fn dataset() -> RomsDataset<MemorySource> {
        // 0.05° cells, land east of lon 0.85
        let grid = RectilinearGridBuilder::new(0.0, 1.0, 40.0, 41.0)
            .with_resolution(21, 21)
            .with_constant_depth(50.0)
            .with_land(|i, _| i >= 18)
            .build()
            .unwrap();
        let sc = SCoordinate::from_stretching(5, VerticalTransform::Old, 0.0, &UniformStretching).unwrap();
        RomsDataset::new(AnalyticSourceBuilder::new(grid).with_s_coordinate(sc).build()).unwrap()
    }

    fn zones(ds: &dyn Dataset) -> ZoneManager {
        let file = ZoneFile {
            zones: vec![
                ZoneDefinition::new("small", ZoneKind::Release, &[(0.1, 40.1), (0.3, 40.1), (0.3, 40.3), (0.1, 40.3)])
                    .with_thickness(0.0, 20.0),
                ZoneDefinition::new("large", ZoneKind::Release, &[(0.4, 40.4), (0.8, 40.4), (0.8, 40.8), (0.4, 40.8)]),
            ],
        };
        let mut zm = ZoneManager::new();
        zm.add_zones(&file, ZoneKind::Release, ds).unwrap();
        zm
    }

    #[test]
    fn test_zone_release() {
        let ds = dataset();
        let zm = zones(&ds);
        let method = ReleaseMethod::Zone {
            number_particles: 100,
            zone_file: PathBuf::from("unused.toml"),
            user_defined_proportions: false,
        };
        let mut releaser = Releaser::new(method, 3);
        let particles = releaser.release(100, 10, 0.0, &ds, &zm).unwrap();
        assert_eq!(particles.len(), 100);
        assert_eq!(particles[0].index(), 10);
        assert_eq!(particles[99].index(), 109);

        let n_small = particles.iter().filter(|p| p.release_zone() == Some(0)).count();
        assert!(n_small > 10 && n_small < 35, "n_small = {n_small}");
        for p in &particles {
            let zone = &zm.zones(ZoneKind::Release)[p.release_zone().unwrap()];
            assert!(zone.contains_point(&ds, p.pos().x, p.pos().y));
            assert!(p.geo().depth <= 0.0 && p.geo().depth >= -50.0);
            if zone.index() == 0 {
                assert!(p.geo().depth >= -20.0 - 1e-6);
            }
        }
    }

    #[test]
    fn test_zone_release_user_proportions() {
        let ds = dataset();
        let zm = zones(&ds);
        let mut releaser = Releaser::new(
            ReleaseMethod::Zone {
                number_particles: 10,
                zone_file: PathBuf::from("unused.toml"),
                user_defined_proportions: true,
            },
            3,
        );
        assert!(matches!(
            releaser.release(10, 0, 0.0, &ds, &zm),
            Err(ReleaseError::InvalidProportions { .. })
        ));
    }

    #[test]
    fn test_stain_release() {
        let ds = dataset();
        let zm = ZoneManager::new();
        let method = ReleaseMethod::Stain {
            number_particles: 50,
            lon: Coordinate(0.5),
            lat: Coordinate(40.5),
            depth: 10.0,
            radius: 3000.0,
            thickness: 4.0,
        };
        let mut releaser = Releaser::new(method, 11);
        assert_eq!(releaser.number_particles(), 50);
        let particles = releaser.release(50, 0, 0.0, &ds, &zm).unwrap();
        assert_eq!(particles.len(), 50);
        for p in &particles {
            let g = p.geo();
            assert!(crate::geodesy::geodesic_distance(g.lat, g.lon, 40.5, 0.5) <= 3000.0 + 1e-6);
            assert!(g.depth <= -8.0 + 1e-6 && g.depth >= -12.0 - 1e-6, "depth = {}", g.depth);
        }
    }

    #[test]
    fn test_stain_on_land() {
        let ds = dataset();
        let mut releaser = Releaser::new(
            ReleaseMethod::Stain {
                number_particles: 5,
                lon: Coordinate(0.95),
                lat: Coordinate(40.5),
                depth: 0.0,
                radius: 100.0,
                thickness: 0.0,
            },
            1,
        );
        assert!(matches!(
            releaser.release(5, 0, 0.0, &ds, &ZoneManager::new()),
            Err(ReleaseError::StainNotInWater { .. })
        ));
    }

    #[test]
    fn test_patchy_release_in_box() {
        let ds = dataset();
        let method = ReleaseMethod::Patchy {
            number_patches: 4,
            particles_per_patch: 5,
            radius: 2000.0,
            thickness: 2.0,
            zone_file: None,
            bbox: Some([Coordinate(0.2), Coordinate(0.6), Coordinate(40.2), Coordinate(40.6)]),
        };
        let mut releaser = Releaser::new(method, 5);
        assert_eq!(releaser.number_particles(), 20);
        let particles = releaser.release(20, 0, 0.0, &ds, &ZoneManager::new()).unwrap();
        assert_eq!(particles.len(), 20);
        let indices: Vec<_> = particles.iter().map(Particle::index).collect();
        assert_eq!(indices, (0..20).collect::<Vec<_>>());
        // aggregated particles stay near their centre
        let c = particles[5].geo();
        for p in &particles[6..10] {
            assert!(crate::geodesy::geodesic_distance(p.geo().lat, p.geo().lon, c.lat, c.lon) <= 2000.0 + 1e-6);
        }
    }

    #[test]
    fn test_patchy_centres_inside_zones() {
        let ds = dataset();
        let zm = zones(&ds);
        let method = ReleaseMethod::Patchy {
            number_patches: 6,
            particles_per_patch: 4,
            radius: 1000.0,
            thickness: 0.0,
            zone_file: Some(PathBuf::from("unused.toml")),
            bbox: None,
        };
        let mut releaser = Releaser::new(method, 8);
        let particles = releaser.release(24, 0, 0.0, &ds, &zm).unwrap();
        assert_eq!(particles.len(), 24);

        for centre in particles.iter().step_by(4) {
            let zone = &zm.zones(ZoneKind::Release)[centre.release_zone().unwrap()];
            let g = centre.geo();
            assert!(zone.geo_polygon().contains(g.lon, g.lat), "centre ({}, {})", g.lon, g.lat);
            assert!(zone.contains_point(&ds, centre.pos().x, centre.pos().y));
        }
    }

    #[test]
    fn test_text_file_release_skips_land() {
        let ds = dataset();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.txt");
        std::fs::write(&path, "0.5 40.5 5\n0.95 40.5 5\n0.3 40.3\n").unwrap();

        let mut zm = ZoneManager::new();
        let mut releaser = Releaser::new(ReleaseMethod::TextFile { path }, 0);
        releaser.prepare(&ds, &mut zm).unwrap();
        assert_eq!(releaser.number_particles(), 3);
        let particles = releaser.release(3, 0, 0.0, &ds, &zm).unwrap();
        assert_eq!(particles.len(), 2);
        assert_eq!(particles[1].index(), 1);
        assert!((particles[0].geo().depth + 5.0).abs() < 1e-9);
        assert_eq!(particles[1].geo().depth, 0.0);
    }

    #[test]
    fn test_method_from_toml() {
        #[derive(Deserialize)]
        struct W {
            release: ReleaseMethod,
        }
        let w: W = toml::from_str(
            r#"
[release]
method = "stain"
number_particles = 50
lon = "4° 30'"
lat = 43.2
radius = 500.0
"#,
        )
        .unwrap();
        match w.release {
            ReleaseMethod::Stain { lon, depth, .. } => {
                assert!((lon.0 - 4.5).abs() < 1e-12);
                assert_eq!(depth, 0.0);
            }
            other => panic!("unexpected method {other:?}"),
        }

        let w: W = toml::from_str("[release]\nmethod = \"zone\"\nnumber_particles = 10\nzone_file = \"zones.toml\"\n").unwrap();
        assert_eq!(w.release.name(), "zone");
        assert_eq!(w.release.zone_file(), Some(&PathBuf::from("zones.toml")));
    }
}
