//! Discrete simulated clock.

use cosim_types::SimTime;

/// Deterministic clock that advances only when the driver tells it to.
///
/// Time never moves backwards; the driver advances it to the timestamp of
/// each event it dispatches.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: SimTime,
}

impl SimClock {
    /// Creates a new clock starting at time zero.
    pub fn new() -> Self {
        Self { now: SimTime::ZERO }
    }

    /// Creates a clock starting at the specified time.
    pub fn at(now: SimTime) -> Self {
        Self { now }
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Advances time to the given value.
    ///
    /// # Panics
    ///
    /// Panics if `time` is earlier than the current time.
    pub fn advance_to(&mut self, time: SimTime) {
        assert!(
            time >= self.now,
            "time cannot go backwards: current={}, target={}",
            self.now,
            time
        );
        self.now = time;
    }
}
