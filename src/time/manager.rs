use std::fmt;

use serde::{Deserialize, Serialize};

use super::Calendar;

/// Direction of the simulated time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeArrow {
    #[default]
    Forward,
    Backward,
}

impl TimeArrow {
    /// `+1.0` forward, `-1.0` backward.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            TimeArrow::Forward => 1.0,
            TimeArrow::Backward => -1.0,
        }
    }
}

impl fmt::Display for TimeArrow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeArrow::Forward => write!(f, "forward"),
            TimeArrow::Backward => write!(f, "backward"),
        }
    }
}

/// Simulation clock.
///
/// The simulation lasts `transport_duration` plus the span of the release
/// events; [`TimeManager::initialize`] sets that span.
#[derive(Clone, Debug)]
pub struct TimeManager {
    calendar: Calendar,
    t0: f64,
    time: f64,
    dt: f64,
    transport_duration: f64,
    simulation_duration: f64,
    keep_drifting: bool,
    i_step: usize,
    n_steps: usize,
}

impl TimeManager {
    /// `dt` is the absolute time step in seconds; its sign follows `arrow`.
    pub fn new(
        calendar: Calendar,
        t0: f64,
        dt: f64,
        arrow: TimeArrow,
        transport_duration: f64,
        keep_drifting: bool,
    ) -> Self {
        let mut tm = Self {
            calendar,
            t0,
            time: t0,
            dt: dt.abs() * arrow.sign(),
            transport_duration,
            simulation_duration: transport_duration,
            keep_drifting,
            i_step: 0,
            n_steps: 0,
        };
        tm.initialize(0.0);
        tm
    }

    /// Reset the clock to `t0` and extend the run by the release span.
    pub fn initialize(&mut self, release_span: f64) {
        self.simulation_duration = self.transport_duration + release_span.abs();
        self.time = self.t0;
        self.i_step = 0;
        self.n_steps = if self.dt == 0.0 {
            0
        } else {
            (self.simulation_duration / self.dt).abs() as usize
        };
    }

    /// Advance the clock by `dt`; false once the simulation duration is
    /// reached.
    pub fn has_next_step(&mut self) -> bool {
        self.time += self.dt;
        if (self.time - self.t0).abs() < self.simulation_duration {
            self.i_step += 1;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[inline]
    pub fn t0(&self) -> f64 {
        self.t0
    }

    /// Signed time step.
    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    #[inline]
    pub fn arrow(&self) -> TimeArrow {
        if self.dt < 0.0 {
            TimeArrow::Backward
        } else {
            TimeArrow::Forward
        }
    }

    #[inline]
    pub fn transport_duration(&self) -> f64 {
        self.transport_duration
    }

    #[inline]
    pub fn simulation_duration(&self) -> f64 {
        self.simulation_duration
    }

    #[inline]
    pub fn keep_drifting(&self) -> bool {
        self.keep_drifting
    }

    #[inline]
    pub fn step_index(&self) -> usize {
        self.i_step
    }

    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    #[inline]
    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// Current time formatted by the calendar.
    pub fn time_string(&self) -> String {
        self.calendar.iso_string(self.time)
    }

    /// `"Step i / n"` progress label.
    pub fn step_string(&self) -> String {
        format!("Step {} / {}", self.i_step + 1, self.n_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ONE_DAY;

    #[test]
    fn test_step_count_forward() {
        let mut tm = TimeManager::new(Calendar::Gregorian, 0.0, 3600.0, TimeArrow::Forward, ONE_DAY, false);
        assert_eq!(tm.n_steps(), 24);

        let mut steps = 0;
        while tm.has_next_step() {
            steps += 1;
        }
        assert_eq!(steps, 23);
        assert_eq!(tm.step_index(), 23);
    }

    #[test]
    fn test_backward_dt_is_negative() {
        let mut tm = TimeManager::new(Calendar::NoLeap, 1000.0, 100.0, TimeArrow::Backward, 500.0, false);
        assert_eq!(tm.dt(), -100.0);
        assert_eq!(tm.arrow(), TimeArrow::Backward);
        assert!(tm.has_next_step());
        assert_eq!(tm.time(), 900.0);
    }

    #[test]
    fn test_release_span_extends_duration() {
        let mut tm = TimeManager::new(Calendar::Gregorian, 0.0, 60.0, TimeArrow::Forward, 600.0, true);
        tm.initialize(300.0);
        assert_eq!(tm.simulation_duration(), 900.0);
        assert_eq!(tm.n_steps(), 15);
        assert!(tm.keep_drifting());
    }

    #[test]
    fn test_time_string() {
        let cal = Calendar::Gregorian;
        let t0 = cal.parse_date("year 2010 month 01 day 01 at 00:00").unwrap();
        let mut tm = TimeManager::new(cal, t0, 1800.0, TimeArrow::Forward, ONE_DAY, false);
        tm.has_next_step();
        assert_eq!(tm.time_string(), "2010-01-01T00:30");
        assert_eq!(tm.step_string(), "Step 2 / 48");
    }
}
