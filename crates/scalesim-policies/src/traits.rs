//! Policy trait definitions.
//!
//! Routing policies pick an instance for each arriving request; scaling
//! policies inspect the pool once per control cycle and decide how many
//! instances to add or remove. Both only ever see read-only
//! [`InstanceSnapshot`]s, never the simulator's own instances.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an instance, as seen by policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceState {
    Inactive,
    Starting,
    Ready,
}

/// Read-only snapshot of one instance slot.
///
/// This is the policy crate's view of an instance: only what routing and
/// scaling decisions need, not the accounting the simulator keeps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub id: u32,
    pub state: InstanceState,
    pub active_requests: u32,
}

impl InstanceSnapshot {
    /// Current load. Always equal to the number of active requests.
    pub fn load(&self) -> f64 {
        self.active_requests as f64
    }

    pub fn is_ready(&self) -> bool {
        self.state == InstanceState::Ready
    }

    /// Starting or Ready: the instance counts toward the pool size.
    pub fn is_active(&self) -> bool {
        self.state != InstanceState::Inactive
    }
}

/// Virtual simulation clock interface for policies.
pub trait Clock {
    fn now_secs(&self) -> f64;
}

/// Read-only accessor for the demand forecast.
///
/// The predictive policy depends on demand only through this trait, so any
/// forecast source (shifted profile, model output, fixed test data) plugs in.
pub trait DemandForecast {
    /// Predicted arrival rate, in requests per second, for the bucket
    /// containing `at_secs`.
    fn predicted_rate(&self, at_secs: f64) -> f64;

    /// Width of one forecast bucket in seconds.
    fn bucket_secs(&self) -> f64;

    /// Maximum predicted rate over every bucket touching `[from_secs, to_secs]`.
    fn max_rate_between(&self, from_secs: f64, to_secs: f64) -> f64 {
        let bucket = self.bucket_secs();
        if bucket <= 0.0 || to_secs < from_secs {
            return self.predicted_rate(from_secs).max(0.0);
        }
        let first = (from_secs / bucket).floor() as u64;
        let last = (to_secs / bucket).floor() as u64;
        // Sample bucket midpoints so float error never lands in a neighbour.
        (first..=last)
            .map(|i| self.predicted_rate((i as f64 + 0.5) * bucket))
            .fold(0.0, f64::max)
    }
}

/// Forecast that predicts no demand at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoForecast;

impl DemandForecast for NoForecast {
    fn predicted_rate(&self, _at_secs: f64) -> f64 {
        0.0
    }

    fn bucket_secs(&self) -> f64 {
        1.0
    }
}

/// Decision returned by a routing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Assign the request to this instance.
    Route(u32),
    /// No Ready instance exists right now.
    NoReadyInstance,
}

/// Routing policy trait.
///
/// The engine calls [`RoutingPolicy::route`] with a snapshot of every
/// instance slot in ascending id order.
pub trait RoutingPolicy: Send + Sync {
    fn route(&mut self, instances: &[InstanceSnapshot]) -> RoutingDecision;

    /// Human-readable name for reports.
    fn name(&self) -> &str;
}

/// Pool state handed to a scaling policy at each control cycle.
#[derive(Debug, Clone, Copy)]
pub struct PoolView<'a> {
    /// Every instance ever created, ascending by id.
    pub instances: &'a [InstanceSnapshot],
    pub min_instances: u32,
    pub max_instances: u32,
}

impl PoolView<'_> {
    /// Number of Starting or Ready instances.
    pub fn active_count(&self) -> u32 {
        self.instances.iter().filter(|i| i.is_active()).count() as u32
    }

    pub fn ready_count(&self) -> u32 {
        self.instances.iter().filter(|i| i.is_ready()).count() as u32
    }

    pub fn starting_count(&self) -> u32 {
        self.instances
            .iter()
            .filter(|i| i.state == InstanceState::Starting)
            .count() as u32
    }

    /// Mean load over Ready instances; zero when none is Ready.
    pub fn average_ready_load(&self) -> f64 {
        let (total, ready) = self
            .instances
            .iter()
            .filter(|i| i.is_ready())
            .fold((0.0, 0u32), |(sum, n), i| (sum + i.load(), n + 1));
        if ready == 0 {
            0.0
        } else {
            total / ready as f64
        }
    }
}

/// Decision returned by a scaling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Activate this many additional instances.
    ScaleUp(u32),
    /// Deactivate this many instances.
    ScaleDown(u32),
    NoChange,
}

/// Autoscaling policy trait.
///
/// Called once per scaling interval. The returned delta must keep the pool
/// within `[min_instances, max_instances]`; the pool also enforces this.
pub trait ScalingPolicy: Send + Sync {
    fn evaluate(
        &mut self,
        pool: &PoolView<'_>,
        forecast: &dyn DemandForecast,
        clock: &dyn Clock,
    ) -> ScaleDecision;

    /// Human-readable name for reports.
    fn name(&self) -> &str;
}

/// Filter snapshots down to the Ready instances.
pub fn ready_instances(instances: &[InstanceSnapshot]) -> impl Iterator<Item = &InstanceSnapshot> {
    instances.iter().filter(|i| i.is_ready())
}
