//! TOML configuration parsing for ScaleSim.
//!
//! Every field has a default, so an empty document is a valid configuration
//! of the reference experiment apart from the demand profile itself.

use crate::demand::{load_profile, DemandError, DemandProfile};
use scalesim_policies::{
    available_routers, available_scaling_policies, router_by_name, PredictiveAutoscaler,
    PredictiveParams, ReactiveAutoscaler, ReactiveParams, RoutingPolicy, ScalingPolicy,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
    #[error(transparent)]
    Demand(#[from] DemandError),
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: SimulationSection,
    #[serde(default)]
    pub pool: PoolSection,
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub demand: DemandSection,
    #[serde(default)]
    pub autoscaler: AutoscalerSection,
    #[serde(default)]
    pub routing: RoutingSection,
    #[serde(default)]
    pub metrics: MetricsSection,
}

/// How a request that finds no Ready instance waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Park in a FIFO queue, woken when an instance becomes Ready.
    WaitQueue,
    /// Retry every `poll_interval_secs`.
    Poll,
}

/// General simulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    #[serde(default = "default_sim_name")]
    pub name: String,
    /// Seed for arrivals and demand noise.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Simulated horizon; one full profile cycle when unset.
    #[serde(default)]
    pub horizon_secs: Option<f64>,
    #[serde(default = "default_dispatch")]
    pub dispatch: DispatchMode,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,
}

fn default_sim_name() -> String {
    "simulation".to_string()
}
fn default_seed() -> u64 {
    42
}
fn default_dispatch() -> DispatchMode {
    DispatchMode::WaitQueue
}
fn default_poll_interval() -> f64 {
    0.01
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            name: default_sim_name(),
            seed: default_seed(),
            horizon_secs: None,
            dispatch: default_dispatch(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Instance pool bounds and lifecycle costs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSection {
    #[serde(default = "default_min_instances")]
    pub min_instances: u32,
    #[serde(default = "default_max_instances")]
    pub max_instances: u32,
    /// Delay between activation and readiness.
    #[serde(default)]
    pub startup_latency_secs: f64,
    #[serde(default = "default_cost_per_hour")]
    pub cost_per_instance_hour: f64,
    /// Initial instances start in Starting instead of Ready.
    #[serde(default)]
    pub cold_start: bool,
}

fn default_min_instances() -> u32 {
    1
}
fn default_max_instances() -> u32 {
    40
}
fn default_cost_per_hour() -> f64 {
    0.1
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            min_instances: default_min_instances(),
            max_instances: default_max_instances(),
            startup_latency_secs: 0.0,
            cost_per_instance_hour: default_cost_per_hour(),
            cold_start: false,
        }
    }
}

/// Latency model: `base * (1 + alpha * load)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default = "default_base_service_time")]
    pub base_service_time_secs: f64,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_sla_threshold")]
    pub sla_threshold_secs: f64,
}

fn default_base_service_time() -> f64 {
    0.1
}
fn default_alpha() -> f64 {
    0.02
}
fn default_sla_threshold() -> f64 {
    0.2
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            base_service_time_secs: default_base_service_time(),
            alpha: default_alpha(),
            sla_threshold_secs: default_sla_threshold(),
        }
    }
}

/// Demand profile source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandSection {
    /// Profile data file; takes precedence over `samples`.
    #[serde(default)]
    pub path: Option<String>,
    /// "text" or "json".
    #[serde(default = "default_demand_format")]
    pub format: String,
    /// Inline profile.
    #[serde(default)]
    pub samples: Option<Vec<f64>>,
    #[serde(default = "default_bucket_secs")]
    pub bucket_secs: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Relative std-dev of the realized-demand perturbation.
    #[serde(default)]
    pub noise_std: f64,
}

fn default_demand_format() -> String {
    "text".to_string()
}
fn default_bucket_secs() -> f64 {
    60.0
}
fn default_multiplier() -> f64 {
    1.0
}

impl Default for DemandSection {
    fn default() -> Self {
        Self {
            path: None,
            format: default_demand_format(),
            samples: None,
            bucket_secs: default_bucket_secs(),
            multiplier: default_multiplier(),
            noise_std: 0.0,
        }
    }
}

/// Autoscaler selection and parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoscalerSection {
    /// "reactive" or "predictive".
    #[serde(default = "default_scaling_policy")]
    pub policy: String,
    #[serde(default = "default_scaling_interval")]
    pub interval_secs: f64,
    #[serde(default)]
    pub reactive: ReactiveSection,
    #[serde(default)]
    pub predictive: PredictiveSection,
}

fn default_scaling_policy() -> String {
    "reactive".to_string()
}
fn default_scaling_interval() -> f64 {
    120.0
}

impl Default for AutoscalerSection {
    fn default() -> Self {
        Self {
            policy: default_scaling_policy(),
            interval_secs: default_scaling_interval(),
            reactive: ReactiveSection::default(),
            predictive: PredictiveSection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactiveSection {
    #[serde(default = "default_scale_up_load")]
    pub scale_up_load: f64,
    #[serde(default = "default_scale_down_load")]
    pub scale_down_load: f64,
}

fn default_scale_up_load() -> f64 {
    38.0
}
fn default_scale_down_load() -> f64 {
    10.0
}

impl Default for ReactiveSection {
    fn default() -> Self {
        Self {
            scale_up_load: default_scale_up_load(),
            scale_down_load: default_scale_down_load(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveSection {
    #[serde(default = "default_target_sla_fraction")]
    pub target_sla_fraction: f64,
    #[serde(default = "default_scale_up_margin")]
    pub scale_up_margin: u32,
    #[serde(default = "default_scale_down_margin")]
    pub scale_down_margin: u32,
}

fn default_target_sla_fraction() -> f64 {
    0.8
}
fn default_scale_up_margin() -> u32 {
    1
}
fn default_scale_down_margin() -> u32 {
    2
}

impl Default for PredictiveSection {
    fn default() -> Self {
        Self {
            target_sla_fraction: default_target_sla_fraction(),
            scale_up_margin: default_scale_up_margin(),
            scale_down_margin: default_scale_down_margin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingSection {
    /// "least_loaded" or "round_robin".
    #[serde(default = "default_router")]
    pub policy: String,
}

fn default_router() -> String {
    "least_loaded".to_string()
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            policy: default_router(),
        }
    }
}

/// Response-time histogram layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSection {
    #[serde(default)]
    pub histogram_low_secs: f64,
    #[serde(default = "default_histogram_step")]
    pub histogram_step_secs: f64,
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: usize,
}

fn default_histogram_step() -> f64 {
    0.05
}
fn default_histogram_buckets() -> usize {
    20
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            histogram_low_secs: 0.0,
            histogram_step_secs: default_histogram_step(),
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

impl SimConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if let Some(h) = sim.horizon_secs {
            if !(h > 0.0 && h.is_finite()) {
                return Err(invalid("horizon_secs must be > 0"));
            }
        }
        if !(sim.poll_interval_secs > 0.0) {
            return Err(invalid("poll_interval_secs must be > 0"));
        }

        let pool = &self.pool;
        if pool.min_instances < 1 {
            return Err(invalid("min_instances must be >= 1"));
        }
        if pool.max_instances < pool.min_instances {
            return Err(invalid(format!(
                "max_instances ({}) must be >= min_instances ({})",
                pool.max_instances, pool.min_instances
            )));
        }
        if !(pool.startup_latency_secs >= 0.0 && pool.startup_latency_secs.is_finite()) {
            return Err(invalid("startup_latency_secs must be >= 0"));
        }
        if !(pool.cost_per_instance_hour >= 0.0) {
            return Err(invalid("cost_per_instance_hour must be >= 0"));
        }

        let service = &self.service;
        if !(service.base_service_time_secs > 0.0) {
            return Err(invalid("base_service_time_secs must be > 0"));
        }
        if !(service.alpha >= 0.0 && service.alpha.is_finite()) {
            return Err(invalid("alpha must be >= 0"));
        }
        if !(service.sla_threshold_secs > 0.0) {
            return Err(invalid("sla_threshold_secs must be > 0"));
        }

        let demand = &self.demand;
        if !["text", "txt", "json"].contains(&demand.format.as_str()) {
            return Err(invalid(format!(
                "Unknown demand format '{}' (expected text or json)",
                demand.format
            )));
        }
        if !(demand.bucket_secs > 0.0) {
            return Err(invalid("bucket_secs must be > 0"));
        }
        if !(demand.multiplier >= 0.0 && demand.multiplier.is_finite()) {
            return Err(invalid("multiplier must be >= 0"));
        }
        if !(demand.noise_std >= 0.0 && demand.noise_std.is_finite()) {
            return Err(invalid("noise_std must be >= 0"));
        }

        let autoscaler = &self.autoscaler;
        if !available_scaling_policies().contains(&autoscaler.policy.as_str()) {
            return Err(invalid(format!(
                "Unknown scaling policy '{}'. Available: {:?}",
                autoscaler.policy,
                available_scaling_policies()
            )));
        }
        if !(autoscaler.interval_secs > 0.0) {
            return Err(invalid("interval_secs must be > 0"));
        }
        if autoscaler.reactive.scale_up_load <= autoscaler.reactive.scale_down_load {
            return Err(invalid(format!(
                "scale_up_load ({}) must exceed scale_down_load ({})",
                autoscaler.reactive.scale_up_load, autoscaler.reactive.scale_down_load
            )));
        }
        let predictive = &autoscaler.predictive;
        if !(predictive.target_sla_fraction > 0.0 && predictive.target_sla_fraction <= 1.0) {
            return Err(invalid("target_sla_fraction must be in (0, 1]"));
        }
        if predictive.scale_up_margin < 1 || predictive.scale_down_margin < 1 {
            return Err(invalid("scale_up_margin and scale_down_margin must be >= 1"));
        }
        if autoscaler.policy == "predictive" {
            self.check_predictive_target()?;
        }

        if !available_routers().contains(&self.routing.policy.as_str()) {
            return Err(invalid(format!(
                "Unknown routing policy '{}'. Available: {:?}",
                self.routing.policy,
                available_routers()
            )));
        }

        let metrics = &self.metrics;
        if !(metrics.histogram_step_secs > 0.0) || metrics.histogram_buckets == 0 {
            return Err(invalid(
                "histogram_step_secs must be > 0 and histogram_buckets > 0",
            ));
        }
        Ok(())
    }

    /// The predictive policy needs a reachable target response time.
    fn check_predictive_target(&self) -> Result<(), ConfigError> {
        let target =
            self.autoscaler.predictive.target_sla_fraction * self.service.sla_threshold_secs;
        if target <= self.service.base_service_time_secs {
            return Err(invalid(format!(
                "predictive target response {:.4}s must exceed base_service_time_secs {:.4}s",
                target, self.service.base_service_time_secs
            )));
        }
        Ok(())
    }

    /// Load the demand profile from `[demand]`: the file if `path` is set,
    /// otherwise the inline `samples`.
    pub fn load_profile(&self) -> Result<DemandProfile, ConfigError> {
        let samples = match (&self.demand.path, &self.demand.samples) {
            (Some(path), _) => load_profile(Path::new(path), &self.demand.format)?,
            (None, Some(samples)) => samples.clone(),
            (None, None) => {
                return Err(invalid("[demand] needs either path or samples"));
            }
        };
        Ok(DemandProfile::new(samples, self.demand.bucket_secs)?)
    }

    /// Simulated horizon for `profile`: the configured value, or one cycle.
    pub fn horizon_secs(&self, profile: &DemandProfile) -> f64 {
        self.simulation
            .horizon_secs
            .unwrap_or_else(|| profile.duration_secs())
    }

    pub fn reactive_params(&self) -> ReactiveParams {
        ReactiveParams {
            min_instances: self.pool.min_instances,
            max_instances: self.pool.max_instances,
            scale_up_load: self.autoscaler.reactive.scale_up_load,
            scale_down_load: self.autoscaler.reactive.scale_down_load,
        }
    }

    pub fn predictive_params(&self) -> PredictiveParams {
        PredictiveParams {
            min_instances: self.pool.min_instances,
            max_instances: self.pool.max_instances,
            scaling_interval_secs: self.autoscaler.interval_secs,
            startup_latency_secs: self.pool.startup_latency_secs,
            base_service_time_secs: self.service.base_service_time_secs,
            alpha: self.service.alpha,
            sla_threshold_secs: self.service.sla_threshold_secs,
            target_sla_fraction: self.autoscaler.predictive.target_sla_fraction,
            scale_up_margin: self.autoscaler.predictive.scale_up_margin,
            scale_down_margin: self.autoscaler.predictive.scale_down_margin,
        }
    }

    /// Build the configured scaling policy.
    pub fn build_scaling_policy(&self) -> Result<Box<dyn ScalingPolicy>, ConfigError> {
        self.build_scaling_policy_named(&self.autoscaler.policy)
    }

    /// Build a scaling policy by name with this configuration's parameters.
    pub fn build_scaling_policy_named(
        &self,
        name: &str,
    ) -> Result<Box<dyn ScalingPolicy>, ConfigError> {
        match name {
            "reactive" => Ok(Box::new(ReactiveAutoscaler::new(self.reactive_params()))),
            "predictive" => {
                self.check_predictive_target()?;
                Ok(Box::new(PredictiveAutoscaler::new(self.predictive_params())))
            }
            other => Err(invalid(format!(
                "Unknown scaling policy '{}'. Available: {:?}",
                other,
                available_scaling_policies()
            ))),
        }
    }

    /// Build the configured router.
    pub fn build_router(&self) -> Result<Box<dyn RoutingPolicy>, ConfigError> {
        router_by_name(&self.routing.policy).ok_or_else(|| {
            invalid(format!(
                "Unknown routing policy '{}'. Available: {:?}",
                self.routing.policy,
                available_routers()
            ))
        })
    }
}
