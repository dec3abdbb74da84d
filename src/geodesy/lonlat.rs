//! Longitude/latitude notations.
//!
//! Three notations are recognised:
//!
//! ```text
//! 12.5125             decimal degrees
//! 12° 30.75'          degrees and decimal minutes
//! 12° 30' 45.0"       degrees, minutes and seconds
//! ```
//!
//! Degrees carry the sign; minutes and seconds are always positive. A trailing
//! hemisphere letter (`N`, `S`, `E`, `W`) is accepted, `S` and `W` meaning
//! negative values.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error raised for unreadable coordinates.
#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("Invalid lon/lat format: {0:?}")]
    InvalidFormat(String),
}

/// Coordinate notation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LonLatFormat {
    DecimalDeg,
    DegDecimalMin,
    DegMinSec,
}

impl LonLatFormat {
    /// Detect the notation of a coordinate string.
    pub fn detect(value: &str) -> Option<Self> {
        let v = value.trim();
        if v.parse::<f64>().is_ok() {
            Some(Self::DecimalDeg)
        } else if v.ends_with('"') {
            Some(Self::DegMinSec)
        } else if v.ends_with('\'') {
            Some(Self::DegDecimalMin)
        } else {
            None
        }
    }
}

fn round_to(value: f64, digits: i32) -> f64 {
    let p = 10f64.powi(digits);
    (value * p).round() / p
}

fn parse_part(s: &str, original: &str) -> Result<f64, GeoError> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| GeoError::InvalidFormat(original.to_string()))
}

/// Parse a coordinate in any supported notation into decimal degrees.
///
/// # Example
///
/// ```
/// use roms_drift::geodesy::parse_lonlat;
///
/// assert_eq!(parse_lonlat("12.5").unwrap(), 12.5);
/// assert!((parse_lonlat("-4° 30' 0\"").unwrap() + 4.5).abs() < 1e-9);
/// assert!((parse_lonlat("43° 15.0'").unwrap() - 43.25).abs() < 1e-9);
/// ```
pub fn parse_lonlat(value: &str) -> Result<f64, GeoError> {
    let trimmed = value.trim();
    let (v, hemisphere) = match trimmed.chars().last() {
        Some(c @ ('N' | 'S' | 'E' | 'W' | 'n' | 's' | 'e' | 'w')) => {
            let sign = if matches!(c, 'S' | 'W' | 's' | 'w') { -1.0 } else { 1.0 };
            (trimmed[..trimmed.len() - 1].trim_end(), sign)
        }
        _ => (trimmed, 1.0),
    };
    parse_signed(v, value).map(|d| hemisphere * d)
}

fn parse_signed(v: &str, value: &str) -> Result<f64, GeoError> {
    let format = LonLatFormat::detect(v).ok_or_else(|| GeoError::InvalidFormat(value.to_string()))?;

    match format {
        LonLatFormat::DecimalDeg => parse_part(v, value),
        LonLatFormat::DegDecimalMin | LonLatFormat::DegMinSec => {
            let (deg_str, rest) = v
                .split_once('°')
                .ok_or_else(|| GeoError::InvalidFormat(value.to_string()))?;
            let (min_str, rest) = rest
                .split_once('\'')
                .ok_or_else(|| GeoError::InvalidFormat(value.to_string()))?;

            let deg = parse_part(deg_str, value)?;
            let min = parse_part(min_str, value)?;
            let sec = if format == LonLatFormat::DegMinSec {
                parse_part(rest.trim_end_matches('"'), value)?
            } else {
                0.0
            };

            let magnitude = deg.abs() + min / 60.0 + sec / 3600.0;
            let sign = if deg_str.trim_start().starts_with('-') {
                -1.0
            } else {
                1.0
            };
            Ok(sign * magnitude)
        }
    }
}

/// Format decimal degrees in the requested notation.
pub fn format_lonlat(value: f64, format: LonLatFormat) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    let deg = abs.trunc();
    match format {
        LonLatFormat::DecimalDeg => format!("{}", round_to(value, 5)),
        LonLatFormat::DegDecimalMin => {
            let min = round_to(abs - deg, 5) * 60.0;
            format!("{}{}° {}'", sign, deg, round_to(min, 5))
        }
        LonLatFormat::DegMinSec => {
            let minf = round_to(abs - deg, 7) * 60.0;
            let min = minf.trunc();
            let sec = round_to((minf - min) * 60.0, 3);
            format!("{}{}° {}' {}\"", sign, deg, min, sec)
        }
    }
}

/// Degrees, minutes and seconds with a hemisphere letter,
/// e.g. `43°15'30.00" N`.
pub fn to_dms(value: f64, is_lat: bool) -> String {
    let hemisphere = match (is_lat, value < 0.0) {
        (true, false) => 'N',
        (true, true) => 'S',
        (false, false) => 'E',
        (false, true) => 'W',
    };
    // Work in hundredths of a second so rounding carries into minutes and degrees.
    let total = (value.abs() * 360_000.0).round() as u64;
    let deg = total / 360_000;
    let min = (total % 360_000) / 6000;
    let sec = (total % 6000) as f64 / 100.0;
    format!("{}°{}'{:.2}\" {}", deg, min, sec, hemisphere)
}

/// Decimal-degree coordinate that deserialises from a number or any
/// supported notation string.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Coordinate(pub f64);

impl Coordinate {
    #[inline]
    pub fn degrees(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for Coordinate {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(Coordinate(v)),
            Raw::Int(v) => Ok(Coordinate(v as f64)),
            Raw::Text(s) => parse_lonlat(&s)
                .map(Coordinate)
                .map_err(serde::de::Error::custom),
        }
    }
}
