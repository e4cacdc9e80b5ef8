//! A single service instance and its lifecycle.
//!
//! ```text
//!   Inactive --activate--> Starting --start--> Ready
//!       ^                      |                 |
//!       +------deactivate------+-----------------+
//! ```
//!
//! Activation fixes the billing timestamp: an instance is paid for from the
//! moment it is requested, including its startup time. Deactivating while
//! requests are still in flight is allowed; those requests drain and release
//! normally, but the instance no longer receives new work.

use crate::clock::us_to_secs;
use crate::stats::RunningStats;
use scalesim_policies::{InstanceSnapshot, InstanceState};
use thiserror::Error;

/// Misuse of an instance's request accounting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstanceError {
    #[error("instance {id} cannot accept requests while {state:?}")]
    NotReady { id: u32, state: InstanceState },
    #[error("instance {0} has no active requests to release")]
    NoActiveRequests(u32),
    #[error("unknown instance {0}")]
    UnknownInstance(u32),
}

/// A simulated service instance.
#[derive(Debug, Clone)]
pub struct Instance {
    pub id: u32,
    state: InstanceState,
    active_requests: u32,
    /// Simulation time of the most recent activation.
    activation_us: u64,
    /// Active time accumulated by completed activation stints.
    cumulative_active_us: u64,
    /// Incremented on every activation; startup timers carry it.
    activation_seq: u64,
    requests_served: u64,
    /// Load observed after every accept and release.
    load_stats: RunningStats,
}

impl Instance {
    /// A fresh, never-activated instance.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            state: InstanceState::Inactive,
            active_requests: 0,
            activation_us: 0,
            cumulative_active_us: 0,
            activation_seq: 0,
            requests_served: 0,
            load_stats: RunningStats::new(),
        }
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == InstanceState::Ready
    }

    /// Starting or Ready.
    pub fn is_active(&self) -> bool {
        self.state != InstanceState::Inactive
    }

    pub fn active_requests(&self) -> u32 {
        self.active_requests
    }

    /// Always equal to the number of in-flight requests.
    pub fn load(&self) -> u32 {
        self.active_requests
    }

    pub fn activation_seq(&self) -> u64 {
        self.activation_seq
    }

    pub fn activation_us(&self) -> u64 {
        self.activation_us
    }

    pub fn requests_served(&self) -> u64 {
        self.requests_served
    }

    pub fn load_stats(&self) -> &RunningStats {
        &self.load_stats
    }

    /// Inactive -> Starting. Returns the new activation sequence number, or
    /// `None` if the instance was already active.
    pub fn activate(&mut self, now_us: u64) -> Option<u64> {
        if self.is_active() {
            return None;
        }
        self.state = InstanceState::Starting;
        self.activation_us = now_us;
        self.activation_seq += 1;
        Some(self.activation_seq)
    }

    /// Starting -> Ready, only if `activation_seq` still names the current
    /// activation. Returns whether the transition happened.
    pub fn start(&mut self, activation_seq: u64) -> bool {
        if self.state != InstanceState::Starting || activation_seq != self.activation_seq {
            return false;
        }
        self.state = InstanceState::Ready;
        true
    }

    /// Starting/Ready -> Inactive, closing the current billing stint.
    /// Returns false (and does nothing) if already Inactive.
    pub fn deactivate(&mut self, now_us: u64) -> bool {
        if !self.is_active() {
            return false;
        }
        self.cumulative_active_us += now_us.saturating_sub(self.activation_us);
        self.state = InstanceState::Inactive;
        true
    }

    /// Take one more request. Returns the load after acceptance.
    pub fn accept_request(&mut self) -> Result<u32, InstanceError> {
        if !self.is_ready() {
            return Err(InstanceError::NotReady {
                id: self.id,
                state: self.state,
            });
        }
        self.active_requests += 1;
        self.requests_served += 1;
        self.load_stats.record(self.active_requests as f64);
        Ok(self.active_requests)
    }

    /// Finish one in-flight request. Allowed in any state so that requests
    /// on a deactivated instance can drain.
    pub fn release_request(&mut self) -> Result<u32, InstanceError> {
        if self.active_requests == 0 {
            return Err(InstanceError::NoActiveRequests(self.id));
        }
        self.active_requests -= 1;
        self.load_stats.record(self.active_requests as f64);
        Ok(self.active_requests)
    }

    /// Total active time up to `now_us`, including an open stint.
    pub fn active_us_at(&self, now_us: u64) -> u64 {
        let open = if self.is_active() {
            now_us.saturating_sub(self.activation_us)
        } else {
            0
        };
        self.cumulative_active_us + open
    }

    pub fn active_secs_at(&self, now_us: u64) -> f64 {
        us_to_secs(self.active_us_at(now_us))
    }

    /// Operating cost up to `now_us` at `cost_per_hour`.
    pub fn cost_at(&self, now_us: u64, cost_per_hour: f64) -> f64 {
        self.active_secs_at(now_us) / 3600.0 * cost_per_hour
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            id: self.id,
            state: self.state,
            active_requests: self.active_requests,
        }
    }
}
