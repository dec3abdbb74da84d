//! Release positions listed in a text file.
//!
//! ```text
//! # lon lat [depth]
//! 4.25 43.10 -10
//! 4.30 43.12
//! ```

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::particle::Particle;
use crate::types::GeoPos;

use super::{ReleaseContext, ReleaseError, geo_particle};

/// Parse `lon lat [depth]` lines; `#` starts a comment.
pub fn parse_release_points(text: &str, path: &Path) -> Result<Vec<GeoPos>, ReleaseError> {
    let mut points = Vec::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let parse_error = |message: String| ReleaseError::Parse {
            path: path.to_path_buf(),
            line: lineno + 1,
            message,
        };
        let values = line
            .split(|c: char| c.is_whitespace() || c == ';' || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>().map_err(|_| parse_error(format!("invalid number {s:?}"))))
            .collect::<Result<Vec<_>, _>>()?;
        let point = match values.as_slice() {
            [lon, lat] => GeoPos::surface(*lon, *lat),
            [lon, lat, depth] => GeoPos::new(*lon, *lat, -depth.abs()),
            _ => return Err(parse_error(format!("expected lon lat [depth], got {} values", values.len()))),
        };
        points.push(point);
    }
    Ok(points)
}

pub(crate) fn read_release_points(path: &Path) -> Result<Vec<GeoPos>, ReleaseError> {
    let text = fs::read_to_string(path).map_err(|source| ReleaseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_release_points(&text, path)
}

pub(crate) fn release(
    ctx: &ReleaseContext<'_>,
    points: &[GeoPos],
    first_index: usize,
) -> Result<Vec<Particle>, ReleaseError> {
    let mut particles = Vec::with_capacity(points.len());
    for point in points {
        match geo_particle(ctx, first_index + particles.len(), *point)? {
            Some(p) => particles.push(p),
            None => warn!(lon = point.lon, lat = point.lat, depth = point.depth, "Release point not in water, skipped"),
        }
    }
    Ok(particles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_points() {
        let text = "# drifters\n4.25 43.10 -10\n\n4.30;43.12 # buoy\n";
        let pts = parse_release_points(text, Path::new("drifters.txt")).unwrap();
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[0], GeoPos::new(4.25, 43.10, -10.0));
        assert!(pts[1].depth.is_nan());
    }

    #[test]
    fn test_parse_error_line() {
        let err = parse_release_points("4.0 43.0\n4.1 x\n", Path::new("p.txt")).unwrap_err();
        assert!(matches!(err, ReleaseError::Parse { line: 2, .. }));
        let err = parse_release_points("4.0\n", Path::new("p.txt")).unwrap_err();
        assert!(matches!(err, ReleaseError::Parse { line: 1, .. }));
    }
}
