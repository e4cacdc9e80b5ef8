//! Request model and the load-dependent service time.

use crate::clock::secs_to_us;
use serde::{Deserialize, Serialize};

/// A single request flowing through the simulated pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    /// Arrival time in simulation microseconds.
    pub arrival_us: u64,
}

impl Request {
    /// Response time if the request finishes at `now_us`.
    pub fn response_us(&self, now_us: u64) -> u64 {
        now_us.saturating_sub(self.arrival_us)
    }
}

/// Processing time grows linearly with the instance's load:
/// `base * (1 + alpha * load)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceModel {
    pub base_service_time_secs: f64,
    pub alpha: f64,
}

impl ServiceModel {
    /// Processing time for a request accepted onto an instance whose load,
    /// counting this request, is `load`.
    pub fn processing_secs(&self, load: u32) -> f64 {
        self.base_service_time_secs * (1.0 + self.alpha * load as f64)
    }

    pub fn processing_us(&self, load: u32) -> u64 {
        secs_to_us(self.processing_secs(load))
    }
}
