//! Geographic helpers: great-circle distance and lon/lat notations.

mod distance;
mod lonlat;

pub use distance::{EARTH_RADIUS, ONE_DEG_LATITUDE_IN_METER, geodesic_distance, one_deg_longitude_in_meter};
pub use lonlat::{Coordinate, GeoError, LonLatFormat, format_lonlat, parse_lonlat, to_dms};
