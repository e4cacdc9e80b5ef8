//! Streaming statistics: running mean/variance and a fixed-width histogram.
//!
//! Runs produce tens of millions of response-time samples, so nothing here
//! stores individual values.

use serde::{Deserialize, Serialize};

/// Running mean, variance, min and max (Welford's algorithm).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the samples; zero when empty.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance; zero with fewer than two samples.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

/// Fixed-width histogram with underflow and overflow counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub low: f64,
    pub step: f64,
    pub counts: Vec<u64>,
    pub underflow: u64,
    pub overflow: u64,
}

impl Histogram {
    /// Buckets `[low + i*step, low + (i+1)*step)` for `i` in `0..buckets`.
    pub fn new(low: f64, step: f64, buckets: usize) -> Self {
        Self {
            low,
            step,
            counts: vec![0; buckets],
            underflow: 0,
            overflow: 0,
        }
    }

    pub fn record(&mut self, value: f64) {
        if value < self.low {
            self.underflow += 1;
            return;
        }
        let idx = ((value - self.low) / self.step).floor() as usize;
        match self.counts.get_mut(idx) {
            Some(count) => *count += 1,
            None => self.overflow += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.underflow + self.overflow + self.counts.iter().sum::<u64>()
    }

    /// Upper edge of the last bucket.
    pub fn high(&self) -> f64 {
        self.low + self.step * self.counts.len() as f64
    }

    /// Estimate the `q` quantile (0.0..=1.0) by linear interpolation
    /// inside the bucket that holds it.
    ///
    /// Samples outside the histogram range are clamped to `low` / `high`.
    pub fn quantile(&self, q: f64) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let target = q.clamp(0.0, 1.0) * total as f64;
        let mut cumulative = self.underflow as f64;
        if target <= cumulative {
            return self.low;
        }
        for (i, &count) in self.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let next = cumulative + count as f64;
            if target <= next {
                let fraction = (target - cumulative) / count as f64;
                return self.low + self.step * (i as f64 + fraction);
            }
            cumulative = next;
        }
        self.high()
    }
}
