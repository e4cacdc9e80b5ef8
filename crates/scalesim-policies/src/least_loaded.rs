//! Least-loaded routing policy.
//!
//! Routes each request to the Ready instance with the fewest active
//! requests. Ties go to the lowest id, so routing is deterministic.

use crate::traits::*;

/// Least-loaded router.
pub struct LeastLoaded;

impl LeastLoaded {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LeastLoaded {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingPolicy for LeastLoaded {
    fn route(&mut self, instances: &[InstanceSnapshot]) -> RoutingDecision {
        // min_by_key keeps the first of equal minima.
        match ready_instances(instances).min_by_key(|i| i.active_requests) {
            Some(best) => RoutingDecision::Route(best.id),
            None => RoutingDecision::NoReadyInstance,
        }
    }

    fn name(&self) -> &str {
        "least_loaded"
    }
}
