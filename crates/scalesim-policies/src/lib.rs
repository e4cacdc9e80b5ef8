//! Built-in routing and autoscaling policies for ScaleSim.
//!
//! This crate provides the [`RoutingPolicy`] and [`ScalingPolicy`] traits
//! and the implementations the simulator ships with:
//!
//! | Policy | Kind | Strategy |
//! |--------|------|----------|
//! | [`LeastLoaded`] | routing | Fewest active requests, lowest id on ties |
//! | [`RoundRobin`] | routing | Cycle through Ready instances |
//! | [`ReactiveAutoscaler`] | scaling | Thresholds on current mean load |
//! | [`PredictiveAutoscaler`] | scaling | Size for the forecast peak after startup |
//!
//! Scaling policies need parameters, so they are built by the simulator's
//! configuration; routers take none and can be created by name here.

pub mod least_loaded;
pub mod predictive;
pub mod reactive;
pub mod round_robin;
pub mod traits;

pub use least_loaded::LeastLoaded;
pub use predictive::{PredictiveAutoscaler, PredictiveParams};
pub use reactive::{ReactiveAutoscaler, ReactiveParams};
pub use round_robin::RoundRobin;
pub use traits::*;

/// Create a routing policy by name.
pub fn router_by_name(name: &str) -> Option<Box<dyn RoutingPolicy>> {
    match name {
        "least_loaded" => Some(Box::new(LeastLoaded::new())),
        "round_robin" => Some(Box::new(RoundRobin::new())),
        _ => None,
    }
}

/// List all available routing policy names.
pub fn available_routers() -> Vec<&'static str> {
    vec!["least_loaded", "round_robin"]
}

/// List all available scaling policy names.
pub fn available_scaling_policies() -> Vec<&'static str> {
    vec!["reactive", "predictive"]
}
