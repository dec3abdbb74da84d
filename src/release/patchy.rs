use rand::Rng;
use rand_pcg::Pcg64;

use crate::particle::Particle;
use crate::types::{Bounds2D, GeoPos};
use crate::zone::{Zone, ZoneKind, ZoneManager};

use super::{DRAW_MAX, ReleaseContext, ReleaseError, geo_particle, stain, zone_release};

/// Where patch centres are drawn.
pub(crate) enum PatchArea<'a> {
    Zones(&'a ZoneManager),
    /// lon/lat box
    Box(Bounds2D),
}

pub(crate) struct Patch {
    pub per_patch: usize,
    pub radius: f64,
    pub thickness: f64,
}

fn centre_in_box(
    ctx: &ReleaseContext<'_>,
    rng: &mut Pcg64,
    bbox: &Bounds2D,
    index: usize,
) -> Result<Particle, ReleaseError> {
    for _ in 0..DRAW_MAX {
        let (lon, lat) = bbox.lerp(rng.r#gen(), rng.r#gen());
        let depth = if ctx.dataset.is_3d() { 0.0 } else { f64::NAN };
        if let Some(p) = geo_particle(ctx, index, GeoPos::new(lon, lat, depth))? {
            return Ok(p);
        }
    }
    Err(ReleaseError::DrawLimit {
        target: format!("patch box {bbox}"),
        attempts: DRAW_MAX,
    })
}

/// Patch centre drawn uniformly in lon/lat inside a release zone.
fn centre_in_zone(
    ctx: &ReleaseContext<'_>,
    rng: &mut Pcg64,
    zone: &Zone,
    index: usize,
) -> Result<Particle, ReleaseError> {
    let ds = ctx.dataset;
    let geo_polygon = zone.geo_polygon();
    let (upper, lower) = zone.thickness().map_or((0.0, 0.0), |t| (t.upper, t.lower));

    if let Some(bbox) = geo_polygon.bounds() {
        for _ in 0..DRAW_MAX {
            let (lon, lat) = bbox.lerp(rng.r#gen(), rng.r#gen());
            if !geo_polygon.contains(lon, lat) {
                continue;
            }
            let depth = if ds.is_3d() {
                -(upper + rng.r#gen::<f64>() * (lower - upper))
            } else {
                f64::NAN
            };
            let Some(p) = geo_particle(ctx, index, GeoPos::new(lon, lat, depth))? else {
                continue;
            };
            if zone.contains_particle(ds, p.pos().x, p.pos().y, depth) {
                return Ok(p.with_release_zone(zone.index()));
            }
        }
    }
    Err(ReleaseError::DrawLimit {
        target: format!("patch centre in release zone {:?}", zone.key()),
        attempts: DRAW_MAX,
    })
}

/// Release `n_patches` patches of `patch.per_patch` particles each.
pub(crate) fn release(
    ctx: &ReleaseContext<'_>,
    rng: &mut Pcg64,
    area: &PatchArea<'_>,
    patch: &Patch,
    n_patches: usize,
    first_index: usize,
) -> Result<Vec<Particle>, ReleaseError> {
    let mut particles = Vec::with_capacity(n_patches * patch.per_patch);
    let mut index = first_index;

    let mut centres = Vec::with_capacity(n_patches);
    match area {
        PatchArea::Zones(zones) => {
            let release_zones = zones.zones(ZoneKind::Release);
            if release_zones.is_empty() {
                return Err(ReleaseError::NoZone(ZoneKind::Release));
            }
            let per_zone = zone_release::particles_per_zone(ctx, release_zones, n_patches, false)?;
            for (zone, &count) in release_zones.iter().zip(&per_zone) {
                for _ in 0..count {
                    centres.push(centre_in_zone(ctx, rng, zone, index)?);
                    index += patch.per_patch;
                }
            }
        }
        PatchArea::Box(bbox) => {
            for _ in 0..n_patches {
                centres.push(centre_in_box(ctx, rng, bbox, index)?);
                index += patch.per_patch;
            }
        }
    }

    for centre in centres {
        let geo = centre.geo();
        let zone = centre.release_zone();
        let centre_index = centre.index();
        particles.push(centre);
        for k in 1..patch.per_patch {
            let p = stain::draw(ctx, rng, centre_index + k, geo, patch.radius, patch.thickness, zone)?;
            particles.push(p);
        }
    }
    Ok(particles)
}
