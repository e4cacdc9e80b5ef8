//! Reactive (threshold-based) autoscaling.
//!
//! Each cycle compares the mean load of Ready instances against two
//! thresholds and adds or removes a single instance. Starting instances are
//! left out of the mean, since they cannot serve traffic yet and would drag
//! the signal down; while any instance is still starting, scale-up waits.

use crate::traits::*;

/// Parameters of the reactive autoscaler.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactiveParams {
    pub min_instances: u32,
    pub max_instances: u32,
    /// Scale up when the mean Ready load is strictly above this.
    pub scale_up_load: f64,
    /// Scale down when the mean Ready load is strictly below this.
    pub scale_down_load: f64,
}

impl Default for ReactiveParams {
    fn default() -> Self {
        Self {
            min_instances: 1,
            max_instances: 40,
            scale_up_load: 38.0,
            scale_down_load: 10.0,
        }
    }
}

/// Threshold-on-current-load autoscaler.
pub struct ReactiveAutoscaler {
    params: ReactiveParams,
}

impl ReactiveAutoscaler {
    pub fn new(params: ReactiveParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ReactiveParams {
        &self.params
    }
}

impl ScalingPolicy for ReactiveAutoscaler {
    fn evaluate(
        &mut self,
        pool: &PoolView<'_>,
        _forecast: &dyn DemandForecast,
        _clock: &dyn Clock,
    ) -> ScaleDecision {
        let average_load = pool.average_ready_load();
        let active = pool.active_count();
        let max = self.params.max_instances.min(pool.max_instances);
        let min = self.params.min_instances.max(pool.min_instances);

        if average_load > self.params.scale_up_load && active < max {
            // Capacity already in flight: wait for it instead of overshooting.
            if pool.starting_count() == 0 {
                return ScaleDecision::ScaleUp(1);
            }
            return ScaleDecision::NoChange;
        }

        if average_load < self.params.scale_down_load && active > min {
            return ScaleDecision::ScaleDown(1);
        }

        ScaleDecision::NoChange
    }

    fn name(&self) -> &str {
        "reactive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{make_instances, FixedClock};

    fn params() -> ReactiveParams {
        ReactiveParams {
            min_instances: 1,
            max_instances: 5,
            scale_up_load: 8.0,
            scale_down_load: 4.0,
        }
    }

    fn evaluate(instances: &[InstanceSnapshot]) -> ScaleDecision {
        let mut scaler = ReactiveAutoscaler::new(params());
        let pool = PoolView {
            instances,
            min_instances: 1,
            max_instances: 5,
        };
        scaler.evaluate(&pool, &NoForecast, &FixedClock(0.0))
    }

    #[test]
    fn test_scales_up_above_threshold() {
        let mut instances = make_instances(2);
        instances[0].active_requests = 9;
        instances[1].active_requests = 10;
        assert_eq!(evaluate(&instances), ScaleDecision::ScaleUp(1));
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut instances = make_instances(2);
        instances[0].active_requests = 8;
        instances[1].active_requests = 8;
        assert_eq!(evaluate(&instances), ScaleDecision::NoChange);

        instances[0].active_requests = 4;
        instances[1].active_requests = 4;
        assert_eq!(evaluate(&instances), ScaleDecision::NoChange);
    }

    #[test]
    fn test_waits_while_instance_starting() {
        let mut instances = make_instances(3);
        instances[0].active_requests = 20;
        instances[1].active_requests = 20;
        instances[2].state = InstanceState::Starting;
        // The starting instance is excluded from the mean (still 20).
        assert_eq!(evaluate(&instances), ScaleDecision::NoChange);
    }

    #[test]
    fn test_respects_max_instances() {
        let mut instances = make_instances(5);
        for i in instances.iter_mut() {
            i.active_requests = 50;
        }
        assert_eq!(evaluate(&instances), ScaleDecision::NoChange);
    }

    #[test]
    fn test_scales_down_below_threshold() {
        let mut instances = make_instances(3);
        instances[0].active_requests = 1;
        assert_eq!(evaluate(&instances), ScaleDecision::ScaleDown(1));
    }

    #[test]
    fn test_never_below_min() {
        let instances = make_instances(1);
        assert_eq!(evaluate(&instances), ScaleDecision::NoChange);
    }

    #[test]
    fn test_no_ready_instances_reads_as_zero_load() {
        let mut instances = make_instances(2);
        instances[0].state = InstanceState::Starting;
        instances[1].state = InstanceState::Starting;
        assert_eq!(evaluate(&instances), ScaleDecision::ScaleDown(1));
    }

    #[test]
    fn test_inactive_slots_do_not_count() {
        let mut instances = make_instances(3);
        instances[1].state = InstanceState::Inactive;
        instances[2].state = InstanceState::Inactive;
        // One active instance at min, idle: nothing to remove.
        assert_eq!(evaluate(&instances), ScaleDecision::NoChange);
    }
}
