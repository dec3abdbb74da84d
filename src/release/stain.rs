use rand::Rng;
use rand_pcg::Pcg64;

use crate::dataset::Dataset;
use crate::geodesy::{ONE_DEG_LATITUDE_IN_METER, geodesic_distance};
use crate::particle::Particle;
use crate::types::GeoPos;

use super::{DRAW_MAX, ReleaseContext, ReleaseError, geo_particle};

pub(crate) fn check_centre(dataset: &dyn Dataset, centre: GeoPos) -> Result<(), ReleaseError> {
    match dataset.latlon2xy(centre.lat, centre.lon) {
        Some((x, y)) if dataset.is_in_water_xy(x, y) => Ok(()),
        _ => Err(ReleaseError::StainNotInWater {
            lon: centre.lon,
            lat: centre.lat,
        }),
    }
}

/// Uniform point in the disk of `radius` metres around `centre`.
fn draw_in_disk(rng: &mut Pcg64, centre: GeoPos, radius: f64) -> Option<(f64, f64)> {
    let lat = centre.lat + 2.0 * radius * (rng.r#gen::<f64>() - 0.5) / ONE_DEG_LATITUDE_IN_METER;
    let one_deg_lon = ONE_DEG_LATITUDE_IN_METER * centre.lat.to_radians().cos();
    let lon = centre.lon + 2.0 * radius * (rng.r#gen::<f64>() - 0.5) / one_deg_lon;
    (geodesic_distance(lat, lon, centre.lat, centre.lon) <= radius).then_some((lon, lat))
}

/// Draw one particle in the stain around `centre` (depth in m, negative).
///
/// The depth is spread over `thickness` around the centre depth.
pub(crate) fn draw(
    ctx: &ReleaseContext<'_>,
    rng: &mut Pcg64,
    index: usize,
    centre: GeoPos,
    radius: f64,
    thickness: f64,
    release_zone: Option<usize>,
) -> Result<Particle, ReleaseError> {
    for _ in 0..DRAW_MAX {
        let Some((lon, lat)) = draw_in_disk(rng, centre, radius) else {
            continue;
        };
        let depth = if ctx.dataset.is_3d() {
            -(centre.depth.abs() + thickness * (rng.r#gen::<f64>() - 0.5)).abs()
        } else {
            f64::NAN
        };
        if let Some(particle) = geo_particle(ctx, index, GeoPos::new(lon, lat, depth))? {
            return Ok(match release_zone {
                Some(zone) => particle.with_release_zone(zone),
                None => particle,
            });
        }
    }
    Err(ReleaseError::DrawLimit {
        target: format!("stain at (lon {}, lat {})", centre.lon, centre.lat),
        attempts: DRAW_MAX,
    })
}
