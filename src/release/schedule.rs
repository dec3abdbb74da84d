use crate::time::TimeArrow;

use super::ReleaseError;

/// Release event times, sorted in the direction of the time arrow.
#[derive(Clone, Debug, PartialEq)]
pub struct ReleaseSchedule {
    events: Vec<f64>,
    t0: f64,
    arrow: TimeArrow,
    next: usize,
}

impl ReleaseSchedule {
    /// Schedule from event times (s). No event may precede `t0` in the
    /// direction of the time arrow.
    pub fn new(mut events: Vec<f64>, t0: f64, arrow: TimeArrow) -> Result<Self, ReleaseError> {
        let sign = arrow.sign();
        if events.is_empty() {
            events.push(t0);
        }
        if let Some(&event) = events.iter().find(|&&e| sign * e < sign * t0) {
            return Err(ReleaseError::EventBeforeStart { event, t0 });
        }
        events.sort_by(|a, b| (sign * a).total_cmp(&(sign * b)));
        Ok(Self {
            events,
            t0,
            arrow,
            next: 0,
        })
    }

    /// Single release at `t0`.
    pub fn single(t0: f64, arrow: TimeArrow) -> Self {
        Self {
            events: vec![t0],
            t0,
            arrow,
            next: 0,
        }
    }

    pub fn events(&self) -> &[f64] {
        &self.events
    }

    pub fn n_events(&self) -> usize {
        self.events.len()
    }

    /// Time between `t0` and the last event (s, positive).
    pub fn span(&self) -> f64 {
        self.events.last().map_or(0.0, |&e| (e - self.t0).abs())
    }

    pub fn is_all_released(&self) -> bool {
        self.next >= self.events.len()
    }

    /// Share of `total` particles released at event `k`; the remainder goes
    /// to the first events.
    pub fn particles_for_event(&self, total: usize, k: usize) -> usize {
        let n = self.events.len().max(1);
        total / n + usize::from(k < total % n)
    }

    /// Events falling in the step `[time, time + dt)` (mirrored backward),
    /// returned as `(event index, event time)`. Each event is returned once.
    pub fn due_events(&mut self, time: f64, dt: f64) -> Vec<(usize, f64)> {
        let mut due = Vec::new();
        while let Some(&event) = self.events.get(self.next) {
            let in_step = match self.arrow {
                TimeArrow::Forward => event >= time && event < time + dt,
                TimeArrow::Backward => event <= time && event > time + dt,
            };
            if !in_step {
                break;
            }
            due.push((self.next, event));
            self.next += 1;
        }
        due
    }
}
