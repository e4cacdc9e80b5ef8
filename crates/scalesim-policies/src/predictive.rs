//! Predictive (forecast-driven) autoscaling.
//!
//! An instance activated now only starts serving after the startup latency,
//! and it has to carry its share until the next control cycle. The policy
//! therefore provisions for the worst forecast rate in the window
//! `[now + startup_latency, now + startup_latency + scaling_interval]`.
//!
//! The rate is turned into an instance count by inverting the latency model
//! `base * (1 + alpha * load)`:
//!
//! ```text
//! target_response  = target_sla_fraction * sla_threshold
//! desired_load     = (target_response / base - 1) / alpha
//! required         = ceil(max_rate * target_response / desired_load)
//! ```
//!
//! `max_rate * target_response` is the expected number of requests in
//! service (Little's law) when every instance runs at `desired_load`.

use crate::traits::*;

/// Parameters of the predictive autoscaler.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictiveParams {
    pub min_instances: u32,
    pub max_instances: u32,
    pub scaling_interval_secs: f64,
    pub startup_latency_secs: f64,
    pub base_service_time_secs: f64,
    pub alpha: f64,
    pub sla_threshold_secs: f64,
    /// Fraction of the SLA threshold the pool is sized to hit.
    pub target_sla_fraction: f64,
    /// Scale up only when `required >= current + scale_up_margin`.
    pub scale_up_margin: u32,
    /// Scale down only when `required <= current - scale_down_margin`.
    pub scale_down_margin: u32,
}

impl Default for PredictiveParams {
    fn default() -> Self {
        Self {
            min_instances: 1,
            max_instances: 40,
            scaling_interval_secs: 120.0,
            startup_latency_secs: 0.0,
            base_service_time_secs: 0.1,
            alpha: 0.02,
            sla_threshold_secs: 0.2,
            target_sla_fraction: 0.8,
            scale_up_margin: 1,
            scale_down_margin: 2,
        }
    }
}

impl PredictiveParams {
    /// Response time the pool is sized for.
    pub fn target_response_secs(&self) -> f64 {
        self.target_sla_fraction * self.sla_threshold_secs
    }

    /// Per-instance load at which processing time equals the target.
    ///
    /// Infinite when latency does not depend on load (`alpha == 0`).
    pub fn desired_load(&self) -> f64 {
        if self.alpha <= 0.0 {
            return f64::INFINITY;
        }
        (self.target_response_secs() / self.base_service_time_secs - 1.0) / self.alpha
    }

    /// Instances needed for `rate_per_sec`, clamped to `[min, max]`.
    pub fn required_instances(&self, rate_per_sec: f64) -> u32 {
        let desired = self.desired_load();
        let raw = if !(rate_per_sec > 0.0) || desired.is_infinite() {
            0.0
        } else if desired <= 0.0 {
            // Target unreachable at any load: provision everything.
            self.max_instances as f64
        } else {
            (rate_per_sec * self.target_response_secs() / desired).ceil()
        };
        let raw = raw.min(self.max_instances as f64) as u32;
        raw.clamp(self.min_instances, self.max_instances.max(self.min_instances))
    }
}

/// Forecast-driven autoscaler with asymmetric hysteresis.
pub struct PredictiveAutoscaler {
    params: PredictiveParams,
    last_required: Option<u32>,
}

impl PredictiveAutoscaler {
    pub fn new(params: PredictiveParams) -> Self {
        Self {
            params,
            last_required: None,
        }
    }

    pub fn params(&self) -> &PredictiveParams {
        &self.params
    }

    /// Instance count computed at the most recent cycle.
    pub fn last_required(&self) -> Option<u32> {
        self.last_required
    }
}

impl ScalingPolicy for PredictiveAutoscaler {
    fn evaluate(
        &mut self,
        pool: &PoolView<'_>,
        forecast: &dyn DemandForecast,
        clock: &dyn Clock,
    ) -> ScaleDecision {
        let window_start = clock.now_secs() + self.params.startup_latency_secs;
        let window_end = window_start + self.params.scaling_interval_secs;
        let max_rate = forecast.max_rate_between(window_start, window_end);

        let min = self.params.min_instances.max(pool.min_instances);
        let max = self.params.max_instances.min(pool.max_instances);
        let required = self.params.required_instances(max_rate).clamp(min, max.max(min));
        self.last_required = Some(required);

        let current = pool.active_count();
        if required > current && required >= current + self.params.scale_up_margin {
            // Full delta in one step: the forecast already covers startup delay.
            let delta = (required - current).min(max.saturating_sub(current));
            if delta > 0 {
                return ScaleDecision::ScaleUp(delta);
            }
        } else if required < current
            && required.saturating_add(self.params.scale_down_margin) <= current
        {
            let delta = (current - required).min(current.saturating_sub(min));
            if delta > 0 {
                return ScaleDecision::ScaleDown(delta);
            }
        }

        ScaleDecision::NoChange
    }

    fn name(&self) -> &str {
        "predictive"
    }
}
