//! Round-robin routing policy.
//!
//! Cycles through Ready instances regardless of their load. Useful as a
//! baseline against least-loaded routing, since processing time grows with
//! per-instance load.

use crate::traits::*;

/// Round-robin router.
///
/// Tracks the last-used instance by id rather than positional index, so the
/// rotation is stable while instances are activated and deactivated.
pub struct RoundRobin {
    /// Id of the last instance we routed to (None on first call).
    last_instance_id: Option<u32>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            last_instance_id: None,
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingPolicy for RoundRobin {
    fn route(&mut self, instances: &[InstanceSnapshot]) -> RoutingDecision {
        let mut ready = ready_instances(instances);
        let first = match ready.next() {
            Some(first) => first,
            None => return RoutingDecision::NoReadyInstance,
        };

        // Next Ready instance after the last one we used, wrapping around.
        let chosen = match self.last_instance_id {
            Some(last_id) if first.id <= last_id => std::iter::once(first)
                .chain(ready)
                .find(|i| i.id > last_id)
                .unwrap_or(first),
            _ => first,
        };

        self.last_instance_id = Some(chosen.id);
        RoutingDecision::Route(chosen.id)
    }

    fn name(&self) -> &str {
        "round_robin"
    }
}
