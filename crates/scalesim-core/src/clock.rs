//! Simulated time.
//!
//! [`SimClock`] only moves when the engine pops an event, so a run over a
//! full day of demand takes as long as its event count, not a day.

use serde::{Deserialize, Serialize};

/// Microseconds per second.
pub const US_PER_SEC: u64 = 1_000_000;

/// Convert a duration in seconds to whole microseconds (rounded).
///
/// Negative and NaN inputs map to zero.
pub fn secs_to_us(secs: f64) -> u64 {
    if secs > 0.0 {
        (secs * US_PER_SEC as f64).round() as u64
    } else {
        0
    }
}

/// Convert microseconds to seconds.
pub fn us_to_secs(us: u64) -> f64 {
    us as f64 / US_PER_SEC as f64
}

/// Virtual simulation clock.
///
/// Time is tracked in integral microseconds so that equal timestamps compare
/// exactly; most APIs expose seconds, the unit of the latency model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimClock {
    /// Current simulation time in microseconds.
    current_us: u64,
}

impl SimClock {
    /// Create a new clock starting at time zero.
    pub fn new() -> Self {
        Self { current_us: 0 }
    }

    /// Current time in microseconds.
    pub fn now_us(&self) -> u64 {
        self.current_us
    }

    /// Current time in seconds.
    pub fn now_secs(&self) -> f64 {
        us_to_secs(self.current_us)
    }

    /// Advance the clock to a specific time in microseconds.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `us` is in the past.
    pub fn advance_to_us(&mut self, us: u64) {
        debug_assert!(
            us >= self.current_us,
            "Cannot move clock backwards: current={}us, target={}us",
            self.current_us,
            us,
        );
        self.current_us = us;
    }
}
