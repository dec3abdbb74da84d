//! Simulation clock: calendars, date and duration strings, time stepping.
//!
//! Times are `f64` seconds since the origin `1900-01-01 00:00`, counted in
//! the configured [`Calendar`].

mod calendar;
mod manager;

pub use calendar::{
    Calendar, DATE_FORMAT, MONTH_EDGES, ONE_DAY, ONE_HOUR, ONE_MINUTE, ONE_YEAR_NOLEAP,
    format_duration, parse_duration,
};
pub use manager::{TimeArrow, TimeManager};

use thiserror::Error;

/// Errors raised when reading dates and durations.
#[derive(Debug, Error, PartialEq)]
pub enum TimeError {
    #[error("Invalid date {value:?}, expected \"year YYYY month MM day DD at HH:mm\"")]
    InvalidDate { value: String },

    #[error("Invalid duration {value:?}, expected \"DDDD day(s) HH hour(s) mm minute(s)\"")]
    InvalidDuration { value: String },

    #[error("Time {0} s is outside the representable calendar range")]
    OutOfRange(f64),
}
