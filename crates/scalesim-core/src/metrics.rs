//! Metrics collection and aggregation for simulation runs.
//!
//! Tracks response times (running moments and a fixed-width histogram), SLA
//! violations, autoscaler actions and the instance-count trajectory. Cost and
//! per-instance load statistics are read from the pool at aggregation time.

use crate::clock::{secs_to_us, us_to_secs};
use crate::pool::InstancePool;
use crate::stats::{Histogram, RunningStats};
use serde::{Deserialize, Serialize};

/// Summary of the response-time distribution, in seconds.
///
/// Percentiles are estimated from the histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl ResponseTimeSummary {
    pub fn from_stats(stats: &RunningStats, histogram: &Histogram) -> Self {
        Self {
            mean: stats.mean(),
            std_dev: stats.std_dev(),
            min: stats.min(),
            max: stats.max(),
            p50: histogram.quantile(0.50),
            p95: histogram.quantile(0.95),
            p99: histogram.quantile(0.99),
        }
    }
}

/// Per-instance report line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub id: u32,
    pub requests_served: u64,
    /// Mean of the load sampled at every accept and release.
    pub mean_load: f64,
    pub std_dev_load: f64,
    pub active_secs: f64,
    pub cost: f64,
}

/// Active instance count right after an autoscaler cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub time_secs: f64,
    pub active_instances: u32,
}

/// Aggregated metrics for an entire simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetrics {
    pub scaling_policy: String,
    pub router: String,
    pub horizon_secs: f64,
    pub completed_requests: u64,
    /// Requests arrived but not finished when the horizon was reached.
    pub pending_requests: u64,
    pub sla_violations: u64,
    /// Percentage of completed requests within the SLA; 100 when none completed.
    pub sla_compliance_pct: f64,
    pub response_time: ResponseTimeSummary,
    pub histogram: Histogram,
    pub instances: Vec<InstanceSummary>,
    pub instances_created: u32,
    pub peak_active_instances: u32,
    pub scale_up_actions: u64,
    pub scale_down_actions: u64,
    pub total_cost: f64,
    pub trajectory: Vec<TrajectoryPoint>,
}

/// Collector that accumulates metrics during a run.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    response: RunningStats,
    histogram: Histogram,
    sla_threshold_us: u64,
    sla_violations: u64,
    scale_up_actions: u64,
    scale_down_actions: u64,
    peak_active: u32,
    trajectory: Vec<TrajectoryPoint>,
}

impl MetricsCollector {
    pub fn new(sla_threshold_secs: f64, histogram: Histogram) -> Self {
        Self {
            response: RunningStats::new(),
            histogram,
            sla_threshold_us: secs_to_us(sla_threshold_secs),
            sla_violations: 0,
            scale_up_actions: 0,
            scale_down_actions: 0,
            peak_active: 0,
            trajectory: Vec::new(),
        }
    }

    /// Record one completed request. Returns whether it violated the SLA.
    ///
    /// The comparison is strict and in whole microseconds: a response
    /// exceeds the threshold only once it is at least 1 µs longer. Excesses
    /// under half a microsecond are rounded away when durations are
    /// converted with [`secs_to_us`].
    pub fn record_response(&mut self, response_us: u64) -> bool {
        let secs = us_to_secs(response_us);
        self.response.record(secs);
        self.histogram.record(secs);
        let violated = response_us > self.sla_threshold_us;
        if violated {
            self.sla_violations += 1;
        }
        violated
    }

    /// Track the active instance count for the peak.
    pub fn observe_active(&mut self, active: u32) {
        self.peak_active = self.peak_active.max(active);
    }

    /// Record the outcome of one autoscaler cycle.
    pub fn record_scaling_cycle(&mut self, time_us: u64, added: u32, removed: u32, active: u32) {
        if added > 0 {
            self.scale_up_actions += 1;
        }
        if removed > 0 {
            self.scale_down_actions += 1;
        }
        self.observe_active(active);
        self.trajectory.push(TrajectoryPoint {
            time_secs: us_to_secs(time_us),
            active_instances: active,
        });
    }

    pub fn completed_count(&self) -> u64 {
        self.response.count()
    }

    pub fn sla_violations(&self) -> u64 {
        self.sla_violations
    }

    /// SLA compliance in percent, 100 when nothing completed.
    pub fn sla_compliance_pct(&self) -> f64 {
        let total = self.response.count();
        if total == 0 {
            return 100.0;
        }
        100.0 * (total - self.sla_violations) as f64 / total as f64
    }

    /// Aggregate everything into a report at `horizon_us`.
    pub fn aggregate(
        &self,
        scaling_policy: &str,
        router: &str,
        horizon_us: u64,
        pending_requests: u64,
        pool: &InstancePool,
        cost_per_instance_hour: f64,
    ) -> SimulationMetrics {
        let instances: Vec<InstanceSummary> = pool
            .instances()
            .iter()
            .map(|inst| InstanceSummary {
                id: inst.id,
                requests_served: inst.requests_served(),
                mean_load: inst.load_stats().mean(),
                std_dev_load: inst.load_stats().std_dev(),
                active_secs: inst.active_secs_at(horizon_us),
                cost: inst.cost_at(horizon_us, cost_per_instance_hour),
            })
            .collect();
        let total_cost = instances.iter().map(|i| i.cost).sum();

        SimulationMetrics {
            scaling_policy: scaling_policy.to_string(),
            router: router.to_string(),
            horizon_secs: us_to_secs(horizon_us),
            completed_requests: self.response.count(),
            pending_requests,
            sla_violations: self.sla_violations,
            sla_compliance_pct: self.sla_compliance_pct(),
            response_time: ResponseTimeSummary::from_stats(&self.response, &self.histogram),
            histogram: self.histogram.clone(),
            instances,
            instances_created: pool.created_count(),
            peak_active_instances: self.peak_active.max(pool.active_count()),
            scale_up_actions: self.scale_up_actions,
            scale_down_actions: self.scale_down_actions,
            total_cost,
            trajectory: self.trajectory.clone(),
        }
    }
}

/// Format metrics as a pretty-printed table string.
pub fn format_table(metrics: &SimulationMetrics) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{:=<70}\n",
        format!("  {} / {} Results  ", metrics.scaling_policy, metrics.router)
    ));
    out.push_str(&format!(
        "  Horizon: {:.0}s | Completed: {} | Pending: {}\n",
        metrics.horizon_secs, metrics.completed_requests, metrics.pending_requests
    ));
    out.push_str(&format!("{:-<70}\n", "  Response time (s)  "));
    let rt = &metrics.response_time;
    out.push_str(&format!(
        "  Mean={:.4}  Std={:.4}  Min={:.4}  Max={:.4}\n",
        rt.mean, rt.std_dev, rt.min, rt.max
    ));
    out.push_str(&format!(
        "  P50={:.4}  P95={:.4}  P99={:.4}\n",
        rt.p50, rt.p95, rt.p99
    ));
    out.push_str(&format!(
        "  SLA violations: {} ({:.2}% compliant)\n",
        metrics.sla_violations, metrics.sla_compliance_pct
    ));
    out.push_str(&format!("{:-<70}\n", "  Histogram  "));
    let h = &metrics.histogram;
    let total = h.total().max(1) as f64;
    out.push_str(&format!(
        "  {:>8} < {:<8.3} {:>10} {:>6.2}%\n",
        "",
        h.low,
        h.underflow,
        100.0 * h.underflow as f64 / total
    ));
    for (i, &count) in h.counts.iter().enumerate() {
        let from = h.low + h.step * i as f64;
        out.push_str(&format!(
            "  {:>8.3} - {:<8.3} {:>10} {:>6.2}%\n",
            from,
            from + h.step,
            count,
            100.0 * count as f64 / total
        ));
    }
    out.push_str(&format!(
        "  {:>8} >= {:<7.3} {:>10} {:>6.2}%\n",
        "",
        h.high(),
        h.overflow,
        100.0 * h.overflow as f64 / total
    ));
    out.push_str(&format!("{:-<70}\n", "  Instances  "));
    out.push_str(&format!(
        "  Created: {}  Peak active: {}  Scale-ups: {}  Scale-downs: {}\n",
        metrics.instances_created,
        metrics.peak_active_instances,
        metrics.scale_up_actions,
        metrics.scale_down_actions
    ));
    out.push_str(&format!(
        "  {:>4} {:>10} {:>9} {:>9} {:>11} {:>9}\n",
        "Id", "Served", "Load avg", "Load std", "Active (s)", "Cost"
    ));
    for inst in &metrics.instances {
        out.push_str(&format!(
            "  {:>4} {:>10} {:>9.2} {:>9.2} {:>11.0} {:>9.4}\n",
            inst.id,
            inst.requests_served,
            inst.mean_load,
            inst.std_dev_load,
            inst.active_secs,
            inst.cost
        ));
    }
    out.push_str(&format!("{:-<70}\n", "  Cost  "));
    out.push_str(&format!("  Total operating cost: {:.4}\n", metrics.total_cost));
    out.push_str(&format!("{:=<70}\n", ""));
    out
}

/// Format a comparison table of multiple policy results.
pub fn format_comparison_table(results: &[SimulationMetrics]) -> String {
    if results.is_empty() {
        return String::from("No results to compare.\n");
    }

    let mut out = String::new();
    out.push_str(&format!("\n{:=<90}\n", "  Policy Comparison  "));
    out.push_str(&format!(
        "{:<14} {:>10} {:>8} {:>8} {:>8} {:>8} {:>6} {:>6} {:>10}\n",
        "Policy", "Completed", "SLA%", "Mean(s)", "P95(s)", "P99(s)", "Peak", "Acts", "Cost"
    ));
    out.push_str(&format!("{:-<90}\n", ""));

    for m in results {
        out.push_str(&format!(
            "{:<14} {:>10} {:>7.2}% {:>8.4} {:>8.4} {:>8.4} {:>6} {:>6} {:>10.4}\n",
            m.scaling_policy,
            m.completed_requests,
            m.sla_compliance_pct,
            m.response_time.mean,
            m.response_time.p95,
            m.response_time.p99,
            m.peak_active_instances,
            m.scale_up_actions + m.scale_down_actions,
            m.total_cost,
        ));
    }
    out.push_str(&format!("{:=<90}\n", ""));
    out
}
