//! Great-circle (haversine) distance.

/// Earth radius used by the haversine formula (m).
pub const EARTH_RADIUS: f64 = 6_367_000.0;

/// Length of one degree of latitude (m).
pub const ONE_DEG_LATITUDE_IN_METER: f64 = 111_138.0;

/// Length of one degree of longitude at the given latitude (m).
#[inline]
pub fn one_deg_longitude_in_meter(lat: f64) -> f64 {
    ONE_DEG_LATITUDE_IN_METER * lat.to_radians().cos()
}

/// Haversine distance in metres between two points given in degrees.
///
/// # Example
///
/// ```
/// use roms_drift::geodesy::geodesic_distance;
///
/// // One degree of latitude along a meridian
/// let d = geodesic_distance(43.0, 5.0, 44.0, 5.0);
/// assert!((d - 111_125.0).abs() < 100.0);
/// ```
pub fn geodesic_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_distance() {
        assert_eq!(geodesic_distance(41.0, 12.0, 41.0, 12.0), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let d1 = geodesic_distance(41.0, 12.0, 43.5, 9.0);
        let d2 = geodesic_distance(43.5, 9.0, 41.0, 12.0);
        assert_relative_eq!(d1, d2, epsilon = 1e-6);
    }

    #[test]
    fn test_equator_degree() {
        // 2 pi R / 360
        let expected = 2.0 * std::f64::consts::PI * EARTH_RADIUS / 360.0;
        assert_relative_eq!(geodesic_distance(0.0, 0.0, 0.0, 1.0), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_longitude_shrinks_with_latitude() {
        assert_relative_eq!(one_deg_longitude_in_meter(0.0), ONE_DEG_LATITUDE_IN_METER);
        assert_relative_eq!(
            one_deg_longitude_in_meter(60.0),
            ONE_DEG_LATITUDE_IN_METER / 2.0,
            epsilon = 1e-6
        );
    }
}
