//! ScaleSim: discrete-event simulator for autoscaled instance pools.
//!
//! A pool of stateless instances serves a stream of short requests whose
//! rate follows a cyclic demand profile. An autoscaling policy from
//! `scalesim-policies` resizes the pool every control interval and a routing
//! policy assigns each request to a Ready instance. Runs report SLA
//! compliance and operating cost so policies can be compared on the same
//! demand.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐     ┌───────────┐     ┌──────────────┐
//! │  Demand  │────▶│  Engine   │────▶│   Metrics    │
//! │ Profile  │     │ (Events)  │     │  Collection  │
//! └────┬─────┘     └─────┬─────┘     └──────────────┘
//!      │ forecast        │
//!      ▼         ┌───────┴────────┐
//! ┌──────────┐   │     Router     │
//! │ Scaling  │   └───────┬────────┘
//! │ Policy   │           │
//! └────┬─────┘           ▼
//!      │   ┌──────────────────────────────┐
//!      └──▶│ Instance Pool  0 | 1 | ... N │
//!          └──────────────────────────────┘
//! ```

pub mod clock;
pub mod config;
pub mod demand;
pub mod engine;
pub mod instance;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod request;
pub mod stats;

// Re-export key types for convenience.
pub use clock::SimClock;
pub use config::{ConfigError, DispatchMode, SimConfig};
pub use demand::{load_profile, write_profile, DemandError, DemandProfile, Forecast};
pub use engine::{SimEvent, SimulationEngine};
pub use instance::{Instance, InstanceError};
pub use metrics::{format_comparison_table, format_table, MetricsCollector, SimulationMetrics};
pub use pool::InstancePool;
pub use request::{Request, ServiceModel};

use scalesim_policies::{RoutingPolicy, ScalingPolicy};

/// Run a complete simulation with explicit policies.
pub fn run_simulation(
    config: &SimConfig,
    profile: &DemandProfile,
    scaling_policy: Box<dyn ScalingPolicy>,
    router: Box<dyn RoutingPolicy>,
) -> SimulationMetrics {
    let mut engine = SimulationEngine::new(config, profile, scaling_policy, router);
    engine.run()
}

/// Run a simulation with the policies named in the configuration.
pub fn run_with_config(
    config: &SimConfig,
    profile: &DemandProfile,
) -> Result<SimulationMetrics, ConfigError> {
    let scaling_policy = config.build_scaling_policy()?;
    let router = config.build_router()?;
    Ok(run_simulation(config, profile, scaling_policy, router))
}

/// Run every named scaling policy on the same config, profile and seed.
///
/// Names that cannot be built for this configuration are skipped.
pub fn compare_policies(
    config: &SimConfig,
    profile: &DemandProfile,
    policy_names: &[&str],
) -> Vec<SimulationMetrics> {
    policy_names
        .iter()
        .filter_map(|name| {
            let policy = config.build_scaling_policy_named(name).ok()?;
            let router = config.build_router().ok()?;
            Some(run_simulation(config, profile, policy, router))
        })
        .collect()
}
