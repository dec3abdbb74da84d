use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::TimeError;

pub const ONE_MINUTE: f64 = 60.0;
pub const ONE_HOUR: f64 = 3600.0;
pub const ONE_DAY: f64 = 86_400.0;
pub const ONE_YEAR_NOLEAP: f64 = 365.0 * ONE_DAY;

/// Cumulative day count at the end of each month of a 365-day year.
pub const MONTH_EDGES: [u32; 12] = [31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];

/// chrono pattern of the input date strings.
pub const DATE_FORMAT: &str = "year %Y month %m day %d at %H:%M";

/// Unix timestamp of 1900-01-01 00:00 UTC.
const ORIGIN_UNIX: i64 = -2_208_988_800;
const ORIGIN_YEAR: i32 = 1900;

/// Calendar used to turn dates into seconds since the origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Calendar {
    #[default]
    Gregorian,
    /// 365-day years, no February 29.
    #[serde(alias = "365_day")]
    NoLeap,
}

impl Calendar {
    /// Seconds elapsed between the origin and `date`.
    pub fn seconds(&self, date: &NaiveDateTime) -> f64 {
        match self {
            Calendar::Gregorian => (date.and_utc().timestamp() - ORIGIN_UNIX) as f64,
            Calendar::NoLeap => {
                let month = date.month() as usize;
                let month_offset = if month == 1 {
                    0.0
                } else {
                    MONTH_EDGES[month - 2] as f64 * ONE_DAY
                };
                month_offset
                    + (date.year() - ORIGIN_YEAR) as f64 * ONE_YEAR_NOLEAP
                    + (date.day() - 1) as f64 * ONE_DAY
                    + date.hour() as f64 * ONE_HOUR
                    + date.minute() as f64 * ONE_MINUTE
                    + date.second() as f64
            }
        }
    }

    /// Calendar date of `seconds` since the origin.
    pub fn date(&self, seconds: f64) -> Result<NaiveDateTime, TimeError> {
        if !seconds.is_finite() {
            return Err(TimeError::OutOfRange(seconds));
        }
        match self {
            Calendar::Gregorian => DateTime::from_timestamp(seconds.floor() as i64 + ORIGIN_UNIX, 0)
                .map(|d| d.naive_utc())
                .ok_or(TimeError::OutOfRange(seconds)),
            Calendar::NoLeap => {
                let years = (seconds / ONE_YEAR_NOLEAP).floor();
                let mut rem = seconds - years * ONE_YEAR_NOLEAP;
                let day_of_year = (rem / ONE_DAY).floor() as u32;
                rem -= day_of_year as f64 * ONE_DAY;

                let month0 = MONTH_EDGES
                    .iter()
                    .position(|&edge| day_of_year < edge)
                    .unwrap_or(11);
                let first_day = if month0 == 0 { 0 } else { MONTH_EDGES[month0 - 1] };
                let day = day_of_year - first_day + 1;

                let hour = (rem / ONE_HOUR).floor();
                rem -= hour * ONE_HOUR;
                let minute = (rem / ONE_MINUTE).floor();
                rem -= minute * ONE_MINUTE;

                chrono::NaiveDate::from_ymd_opt(ORIGIN_YEAR + years as i32, month0 as u32 + 1, day)
                    .and_then(|d| d.and_hms_opt(hour as u32, minute as u32, rem.floor() as u32))
                    .ok_or(TimeError::OutOfRange(seconds))
            }
        }
    }

    /// Parse a `"year YYYY month MM day DD at HH:mm"` string into seconds.
    pub fn parse_date(&self, value: &str) -> Result<f64, TimeError> {
        let date = NaiveDateTime::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
            TimeError::InvalidDate {
                value: value.to_string(),
            }
        })?;
        Ok(self.seconds(&date))
    }

    /// Format seconds as a `"year YYYY month MM day DD at HH:mm"` string.
    pub fn format_date(&self, seconds: f64) -> Result<String, TimeError> {
        Ok(self.date(seconds)?.format(DATE_FORMAT).to_string())
    }

    /// Short ISO-like rendering used in logs, e.g. `2010-01-01T06:00`.
    pub fn iso_string(&self, seconds: f64) -> String {
        match self.date(seconds) {
            Ok(d) => d.format("%Y-%m-%dT%H:%M").to_string(),
            Err(_) => format!("{seconds} s"),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Gregorian => write!(f, "gregorian"),
            Calendar::NoLeap => write!(f, "noleap"),
        }
    }
}

impl FromStr for Calendar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gregorian" | "standard" | "proleptic_gregorian" => Ok(Calendar::Gregorian),
            "noleap" | "365_day" => Ok(Calendar::NoLeap),
            other => Err(format!("unknown calendar {other:?}")),
        }
    }
}

/// Parse a `"DDDD day(s) HH hour(s) mm minute(s)"` string into seconds.
pub fn parse_duration(value: &str) -> Result<f64, TimeError> {
    let invalid = || TimeError::InvalidDuration {
        value: value.to_string(),
    };

    let tokens: Vec<&str> = value.split_whitespace().collect();
    if tokens.len() != 6 {
        return Err(invalid());
    }

    let mut seconds = 0.0;
    for (pair, (unit, factor)) in tokens
        .chunks(2)
        .zip([("day", ONE_DAY), ("hour", ONE_HOUR), ("minute", ONE_MINUTE)])
    {
        if !pair[1].starts_with(unit) {
            return Err(invalid());
        }
        let n: u64 = pair[0].parse().map_err(|_| invalid())?;
        seconds += n as f64 * factor;
    }
    Ok(seconds)
}

/// Format seconds as a `"DDDD day(s) HH hour(s) mm minute(s)"` string.
pub fn format_duration(seconds: f64) -> String {
    let total_minutes = (seconds.abs() / ONE_MINUTE).round() as u64;
    let days = total_minutes / 1440;
    let hours = (total_minutes % 1440) / 60;
    let minutes = total_minutes % 60;
    format!("{days:04} day(s) {hours:02} hour(s) {minutes:02} minute(s)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_is_zero() {
        for cal in [Calendar::Gregorian, Calendar::NoLeap] {
            let t = cal.parse_date("year 1900 month 01 day 01 at 00:00").unwrap();
            assert_eq!(t, 0.0);
        }
    }

    #[test]
    fn test_gregorian_counts_leap_days() {
        let cal = Calendar::Gregorian;
        let t0 = cal.parse_date("year 2004 month 02 day 28 at 00:00").unwrap();
        let t1 = cal.parse_date("year 2004 month 03 day 01 at 00:00").unwrap();
        assert_eq!(t1 - t0, 2.0 * ONE_DAY);
    }

    #[test]
    fn test_noleap_ignores_leap_days() {
        let cal = Calendar::NoLeap;
        let t0 = cal.parse_date("year 2004 month 02 day 28 at 00:00").unwrap();
        let t1 = cal.parse_date("year 2004 month 03 day 01 at 00:00").unwrap();
        assert_eq!(t1 - t0, ONE_DAY);

        let t = cal.parse_date("year 1901 month 01 day 01 at 00:00").unwrap();
        assert_eq!(t, ONE_YEAR_NOLEAP);
    }

    #[test]
    fn test_format_date_inverse() {
        for cal in [Calendar::Gregorian, Calendar::NoLeap] {
            let s = "year 2010 month 12 day 31 at 18:45";
            let t = cal.parse_date(s).unwrap();
            assert_eq!(cal.format_date(t).unwrap(), s);
        }
    }

    #[test]
    fn test_invalid_date() {
        assert!(matches!(
            Calendar::Gregorian.parse_date("2010-01-01"),
            Err(TimeError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_duration_strings() {
        let d = parse_duration("0012 day(s) 06 hour(s) 30 minute(s)").unwrap();
        assert_eq!(d, 12.0 * ONE_DAY + 6.0 * ONE_HOUR + 30.0 * ONE_MINUTE);
        assert_eq!(format_duration(d), "0012 day(s) 06 hour(s) 30 minute(s)");
        assert!(parse_duration("12 days").is_err());
        assert!(parse_duration("0012 hour(s) 06 day(s) 30 minute(s)").is_err());
    }

    #[test]
    fn test_calendar_from_str() {
        assert_eq!("NoLeap".parse::<Calendar>(), Ok(Calendar::NoLeap));
        assert_eq!("standard".parse::<Calendar>(), Ok(Calendar::Gregorian));
        assert!("julian".parse::<Calendar>().is_err());
    }
}
