use rand::Rng;
use rand_pcg::Pcg64;

use crate::particle::Particle;
use crate::types::GridPos;
use crate::zone::{Zone, ZoneKind, ZoneManager};

use super::{DRAW_MAX, ReleaseContext, ReleaseError, dispatch, is_above_bottom};

/// Particles per release zone, by water area or user proportions.
pub(crate) fn particles_per_zone(
    ctx: &ReleaseContext<'_>,
    zones: &[Zone],
    n: usize,
    user_defined_proportions: bool,
) -> Result<Vec<usize>, ReleaseError> {
    let weights: Vec<f64> = if user_defined_proportions {
        let props: Option<Vec<f64>> = zones.iter().map(Zone::proportion).collect();
        let sum = props.as_ref().map_or(f64::NAN, |p| p.iter().sum());
        match props {
            Some(p) if (sum - 1.0).abs() < 1e-6 => p,
            _ => return Err(ReleaseError::InvalidProportions { sum }),
        }
    } else {
        zones.iter().map(|z| z.area_km2(ctx.dataset)).collect()
    };
    Ok(dispatch(n, &weights))
}

/// Draw one particle uniformly in a zone.
pub(crate) fn draw_in_zone(
    ctx: &ReleaseContext<'_>,
    rng: &mut Pcg64,
    zone: &Zone,
    index: usize,
) -> Result<Particle, ReleaseError> {
    let ds = ctx.dataset;
    let bbox = zone.bbox();
    let (upper, lower) = zone.thickness().map_or((0.0, 0.0), |t| (t.upper, t.lower));

    for _ in 0..DRAW_MAX {
        let (x, y) = bbox.lerp(rng.r#gen(), rng.r#gen());
        let depth = if ds.is_3d() {
            -(upper + rng.r#gen::<f64>() * (lower - upper))
        } else {
            f64::NAN
        };

        if !ds.is_in_water_xy(x, y) || ds.is_on_edge(x, y) {
            continue;
        }
        if ds.is_3d() && !is_above_bottom(ds, x, y, depth) {
            continue;
        }
        if !zone.contains_particle(ds, x, y, depth) {
            continue;
        }

        let z = if ds.is_3d() { ds.depth2z(x, y, depth) } else { 0.0 };
        let mut particle =
            Particle::from_grid(index, GridPos::new(x, y, z), ctx.time, ctx.seed).with_release_zone(zone.index());
        particle.point_mut().grid2geo(ds);
        return Ok(particle);
    }
    Err(ReleaseError::DrawLimit {
        target: format!("release zone {:?}", zone.key()),
        attempts: DRAW_MAX,
    })
}

pub(crate) fn release(
    ctx: &ReleaseContext<'_>,
    rng: &mut Pcg64,
    zones: &ZoneManager,
    n: usize,
    first_index: usize,
    user_defined_proportions: bool,
) -> Result<Vec<Particle>, ReleaseError> {
    let release_zones = zones.zones(ZoneKind::Release);
    if release_zones.is_empty() {
        return Err(ReleaseError::NoZone(ZoneKind::Release));
    }
    let per_zone = particles_per_zone(ctx, release_zones, n, user_defined_proportions)?;

    let mut particles = Vec::with_capacity(n);
    let mut index = first_index;
    for (zone, &count) in release_zones.iter().zip(&per_zone) {
        for _ in 0..count {
            particles.push(draw_in_zone(ctx, rng, zone, index)?);
            index += 1;
        }
    }
    Ok(particles)
}
