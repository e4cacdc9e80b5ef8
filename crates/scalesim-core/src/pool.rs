//! The instance pool: every instance ever created, indexed by id.
//!
//! Instances are created lazily and never destroyed. Scale-down deactivates
//! the highest-id active instance; scale-up reactivates the lowest-id
//! inactive one before creating a new slot, so per-instance history is kept
//! across activations.

use crate::instance::{Instance, InstanceError};
use scalesim_policies::{InstanceSnapshot, PoolView};
use tracing::{debug, warn};

/// An activation that still needs its startup timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub id: u32,
    pub seq: u64,
}

#[derive(Debug, Clone)]
pub struct InstancePool {
    instances: Vec<Instance>,
    min_instances: u32,
    max_instances: u32,
}

impl InstancePool {
    pub fn new(min_instances: u32, max_instances: u32) -> Self {
        Self {
            instances: Vec::with_capacity(max_instances as usize),
            min_instances,
            max_instances,
        }
    }

    /// Create the initial `min_instances` at time 0.
    ///
    /// Warm instances are Ready immediately and nothing is returned; with
    /// `cold_start` they stay Starting and the caller must schedule a timer
    /// for each returned activation.
    pub fn initialize(&mut self, cold_start: bool) -> Vec<Activation> {
        let mut pending = Vec::new();
        while self.active_count() < self.min_instances {
            let Some(activation) = self.add_instance(0) else {
                break;
            };
            if cold_start {
                pending.push(activation);
            } else if let Some(inst) = self.instances.get_mut(activation.id as usize) {
                inst.start(activation.seq);
            }
        }
        pending
    }

    pub fn min_instances(&self) -> u32 {
        self.min_instances
    }

    pub fn max_instances(&self) -> u32 {
        self.max_instances
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn get(&self, id: u32) -> Option<&Instance> {
        self.instances.get(id as usize)
    }

    fn get_mut(&mut self, id: u32) -> Result<&mut Instance, InstanceError> {
        self.instances
            .get_mut(id as usize)
            .ok_or(InstanceError::UnknownInstance(id))
    }

    /// Instances ever created, active or not.
    pub fn created_count(&self) -> u32 {
        self.instances.len() as u32
    }

    /// Starting or Ready instances: the pool size.
    pub fn active_count(&self) -> u32 {
        self.instances.iter().filter(|i| i.is_active()).count() as u32
    }

    pub fn ready_count(&self) -> u32 {
        self.instances.iter().filter(|i| i.is_ready()).count() as u32
    }

    /// Activate one more instance, or `None` at `max_instances`.
    pub fn add_instance(&mut self, now_us: u64) -> Option<Activation> {
        if self.active_count() >= self.max_instances {
            warn!(max = self.max_instances, "scale-up refused: pool at capacity");
            return None;
        }
        let idx = match self.instances.iter().position(|i| !i.is_active()) {
            Some(idx) => idx,
            None => {
                let id = self.instances.len() as u32;
                self.instances.push(Instance::new(id));
                self.instances.len() - 1
            }
        };
        let inst = &mut self.instances[idx];
        let seq = inst.activate(now_us)?;
        debug!(id = inst.id, seq, now_us, "instance activated");
        Some(Activation { id: inst.id, seq })
    }

    /// Deactivate the highest-id active instance, or `None` at
    /// `min_instances`. In-flight requests on it drain normally.
    pub fn remove_instance(&mut self, now_us: u64) -> Option<u32> {
        if self.active_count() <= self.min_instances {
            return None;
        }
        let inst = self.instances.iter_mut().rev().find(|i| i.is_active())?;
        inst.deactivate(now_us);
        debug!(
            id = inst.id,
            now_us,
            draining = inst.active_requests(),
            "instance deactivated"
        );
        Some(inst.id)
    }

    /// Fire a startup timer. Returns whether the instance became Ready.
    pub fn start_instance(&mut self, id: u32, seq: u64) -> Result<bool, InstanceError> {
        Ok(self.get_mut(id)?.start(seq))
    }

    pub fn accept_request(&mut self, id: u32) -> Result<u32, InstanceError> {
        self.get_mut(id)?.accept_request()
    }

    pub fn release_request(&mut self, id: u32) -> Result<u32, InstanceError> {
        self.get_mut(id)?.release_request()
    }

    /// Refresh `buf` with one snapshot per instance, ascending by id.
    pub fn fill_snapshots(&self, buf: &mut Vec<InstanceSnapshot>) {
        buf.clear();
        buf.extend(self.instances.iter().map(Instance::snapshot));
    }

    /// Policy view over snapshots previously filled from this pool.
    pub fn view<'a>(&self, snapshots: &'a [InstanceSnapshot]) -> PoolView<'a> {
        PoolView {
            instances: snapshots,
            min_instances: self.min_instances,
            max_instances: self.max_instances,
        }
    }

    /// Operating cost of every instance up to `now_us`, crediting open stints.
    pub fn total_cost(&self, now_us: u64, cost_per_hour: f64) -> f64 {
        self.instances
            .iter()
            .map(|i| i.cost_at(now_us, cost_per_hour))
            .sum()
    }
}
