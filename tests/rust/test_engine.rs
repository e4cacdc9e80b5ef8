/// Integration tests for the simulation engine.
use scalesim_core::config::SimConfig;
use scalesim_core::demand::DemandProfile;
use scalesim_core::SimulationEngine;
use scalesim_policies::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Constant demand: `per_sec` requests per second in one-minute buckets.
fn constant_profile(per_sec: f64) -> DemandProfile {
    DemandProfile::new(vec![per_sec * 60.0], 60.0).unwrap()
}

fn small_pool_config(extra: &str) -> SimConfig {
    SimConfig::from_str(&format!(
        r#"
[simulation]
name = "integration-test"
seed = 42
horizon_secs = 1800

[service]
base_service_time_secs = 0.1
alpha = 0.0
sla_threshold_secs = 0.2

[autoscaler]
policy = "reactive"
interval_secs = 10

[autoscaler.reactive]
scale_up_load = 8
scale_down_load = 4

{}
"#,
        extra
    ))
    .unwrap()
}

#[test]
fn test_reactive_converges_under_constant_load() {
    let config = small_pool_config("[pool]\nmin_instances = 1\nmax_instances = 5");
    let metrics = scalesim_core::run_with_config(&config, &constant_profile(240.0)).unwrap();

    assert!(metrics.completed_requests > 400_000);
    assert!(metrics.scale_up_actions >= 1);
    for point in metrics.trajectory.iter().filter(|p| p.time_secs >= 300.0) {
        assert!(
            (2..=5).contains(&point.active_instances),
            "{} instances at {}s",
            point.active_instances,
            point.time_secs
        );
    }
}

#[test]
fn test_startup_latency_gates_readiness() {
    let config = small_pool_config(
        "[pool]\nmin_instances = 1\nmax_instances = 3\nstartup_latency_secs = 30",
    );
    let profile = constant_profile(240.0);
    let mut engine = SimulationEngine::new(
        &config,
        &profile,
        config.build_scaling_policy().unwrap(),
        config.build_router().unwrap(),
    );

    // First scale-up happens at the 10 s cycle.
    engine.run_until(10.0);
    assert_eq!(engine.pool().active_count(), 2);
    assert_eq!(
        engine.pool().get(1).map(|i| i.state()),
        Some(InstanceState::Starting)
    );

    engine.run_until(39.9);
    let starting = engine.pool().get(1).unwrap();
    assert_eq!(starting.state(), InstanceState::Starting);
    assert_eq!(starting.requests_served(), 0);
    // No second activation while one is still starting.
    assert_eq!(engine.pool().active_count(), 2);

    engine.run_until(40.0);
    assert_eq!(engine.pool().ready_count(), 2);
    engine.run_until(41.0);
    assert!(engine.pool().get(1).unwrap().requests_served() > 0);
}

#[test]
fn test_predictive_with_empty_forecast_stays_at_minimum() {
    let config = SimConfig::from_str(
        r#"
[simulation]
horizon_secs = 3600

[pool]
min_instances = 2
max_instances = 10

[demand]
samples = [0, 0, 0]

[autoscaler]
policy = "predictive"
"#,
    )
    .unwrap();
    let profile = config.load_profile().unwrap();
    let metrics = scalesim_core::run_with_config(&config, &profile).unwrap();

    assert_eq!(metrics.scaling_policy, "predictive");
    assert!(!metrics.trajectory.is_empty());
    assert!(metrics.trajectory.iter().all(|p| p.active_instances == 2));
    assert_eq!(metrics.scale_up_actions + metrics.scale_down_actions, 0);
}

#[test]
fn test_cost_of_single_idle_instance_for_an_hour() {
    let config = SimConfig::from_str(
        r#"
[simulation]
horizon_secs = 3600

[pool]
min_instances = 1
max_instances = 1
cost_per_instance_hour = 0.1

[demand]
samples = [0]
"#,
    )
    .unwrap();
    let profile = config.load_profile().unwrap();
    let metrics = scalesim_core::run_with_config(&config, &profile).unwrap();

    assert_eq!(metrics.completed_requests, 0);
    assert_eq!(metrics.sla_compliance_pct, 100.0);
    assert_eq!(metrics.instances_created, 1);
    assert!((metrics.total_cost - 0.1).abs() < 1e-12);
    assert!((metrics.instances[0].active_secs - 3600.0).abs() < 1e-9);
}

fn sla_boundary_config(base: f64) -> SimConfig {
    SimConfig::from_str(&format!(
        r#"
[simulation]
horizon_secs = 600

[pool]
min_instances = 2
max_instances = 4

[service]
base_service_time_secs = {}
alpha = 0.0
sla_threshold_secs = 0.2
"#,
        base
    ))
    .unwrap()
}

#[test]
fn test_arrivals_resume_after_empty_fractional_buckets() {
    let config = small_pool_config("[pool]\nmin_instances = 1\nmax_instances = 2");
    // Only every fourth 0.7 s bucket has demand.
    let profile = DemandProfile::new(vec![0.0, 0.0, 0.0, 5.0], 0.7).unwrap();
    let metrics = scalesim_core::run_with_config(&config, &profile).unwrap();

    // About 5 requests per 2.8 s over 1800 s.
    assert!(
        (2_500..4_000).contains(&metrics.completed_requests),
        "completed {}",
        metrics.completed_requests
    );
    assert!(metrics.pending_requests <= 5);
}

#[test]
fn test_response_equal_to_threshold_is_not_a_violation() {
    let config = sla_boundary_config(0.2);
    let metrics = scalesim_core::run_with_config(&config, &constant_profile(20.0)).unwrap();
    assert!(metrics.completed_requests > 0);
    assert_eq!(metrics.sla_violations, 0);
    assert_eq!(metrics.sla_compliance_pct, 100.0);
}

#[test]
fn test_response_above_threshold_always_violates() {
    let config = sla_boundary_config(0.201);
    let metrics = scalesim_core::run_with_config(&config, &constant_profile(20.0)).unwrap();
    assert!(metrics.completed_requests > 0);
    assert_eq!(metrics.sla_violations, metrics.completed_requests);
    assert_eq!(metrics.sla_compliance_pct, 0.0);
}

#[test]
fn test_same_seed_is_deterministic() {
    let config = small_pool_config("[pool]\nmax_instances = 5\nstartup_latency_secs = 20");
    let profile = DemandProfile::new(vec![3000.0, 12000.0, 6000.0, 600.0], 60.0).unwrap();

    let a = scalesim_core::run_with_config(&config, &profile).unwrap();
    let b = scalesim_core::run_with_config(&config, &profile).unwrap();
    assert_eq!(a, b);

    let mut other_seed = config.clone();
    other_seed.simulation.seed = 43;
    let c = scalesim_core::run_with_config(&other_seed, &profile).unwrap();
    assert!(a.completed_requests > 0);
    assert_ne!(a.completed_requests, c.completed_requests);
}

#[test]
fn test_pool_size_stays_within_bounds() {
    let profile = DemandProfile::new(vec![600.0, 30000.0, 60.0, 18000.0], 60.0).unwrap();
    for policy in available_scaling_policies() {
        let mut config = small_pool_config("[pool]\nmin_instances = 2\nmax_instances = 6");
        config.autoscaler.policy = policy.to_string();
        config.service.alpha = 0.02;
        let metrics = scalesim_core::run_with_config(&config, &profile).unwrap();

        assert!(metrics.peak_active_instances <= 6, "{}", policy);
        assert!(metrics.instances_created <= 6, "{}", policy);
        assert!(
            metrics
                .trajectory
                .iter()
                .all(|p| (2..=6).contains(&p.active_instances)),
            "{} left bounds",
            policy
        );
    }
}

/// Least-loaded router that checks every decision it makes.
struct CheckedRouter {
    inner: LeastLoaded,
    routed: Arc<AtomicUsize>,
    bad: Arc<AtomicUsize>,
}

impl RoutingPolicy for CheckedRouter {
    fn route(&mut self, instances: &[InstanceSnapshot]) -> RoutingDecision {
        let decision = self.inner.route(instances);
        if let RoutingDecision::Route(id) = decision {
            self.routed.fetch_add(1, Ordering::Relaxed);
            let min_load = ready_instances(instances)
                .map(|i| i.active_requests)
                .min();
            let chosen = instances.iter().find(|i| i.id == id);
            let ok = matches!(chosen, Some(c) if c.is_ready() && Some(c.active_requests) == min_load);
            if !ok {
                self.bad.fetch_add(1, Ordering::Relaxed);
            }
        }
        decision
    }

    fn name(&self) -> &str {
        "checked_least_loaded"
    }
}

#[test]
fn test_requests_only_go_to_least_loaded_ready_instances() {
    let config = small_pool_config(
        "[pool]\nmin_instances = 1\nmax_instances = 5\nstartup_latency_secs = 15",
    );
    let routed = Arc::new(AtomicUsize::new(0));
    let bad = Arc::new(AtomicUsize::new(0));
    let router = CheckedRouter {
        inner: LeastLoaded::new(),
        routed: Arc::clone(&routed),
        bad: Arc::clone(&bad),
    };
    let profile = DemandProfile::new(vec![6000.0, 15000.0, 1200.0], 60.0).unwrap();
    let metrics = scalesim_core::run_simulation(
        &config,
        &profile,
        config.build_scaling_policy().unwrap(),
        Box::new(router),
    );

    assert_eq!(metrics.router, "checked_least_loaded");
    assert!(routed.load(Ordering::Relaxed) as u64 >= metrics.completed_requests);
    assert_eq!(bad.load(Ordering::Relaxed), 0);
}

fn cold_start_config(dispatch: &str) -> SimConfig {
    SimConfig::from_str(&format!(
        r#"
[simulation]
horizon_secs = 60
dispatch = "{}"
poll_interval_secs = 0.01

[pool]
min_instances = 1
max_instances = 1
startup_latency_secs = 5
cold_start = true

[service]
base_service_time_secs = 0.1
alpha = 0.0
"#,
        dispatch
    ))
    .unwrap()
}

#[test]
fn test_wait_queue_request_completes_at_startup_plus_processing() {
    let config = cold_start_config("wait_queue");
    let metrics = scalesim_core::run_with_config(&config, &constant_profile(1.0)).unwrap();

    // The first request arrives at t = 0 and waits for the 5 s startup.
    assert!((metrics.response_time.max - 5.1).abs() < 1e-9);
    assert!(metrics.completed_requests > 30);
    assert!(metrics.sla_violations >= 1);
    assert!(metrics.histogram.overflow >= 1);
}

#[test]
fn test_poll_mode_completes_waiting_requests() {
    let config = cold_start_config("poll");
    let metrics = scalesim_core::run_with_config(&config, &constant_profile(1.0)).unwrap();

    assert!(metrics.response_time.max >= 5.1 - 1e-9);
    assert!(metrics.response_time.max <= 5.11 + 1e-9);

    let queued = scalesim_core::run_with_config(&cold_start_config("wait_queue"), &constant_profile(1.0))
        .unwrap();
    assert_eq!(metrics.completed_requests, queued.completed_requests);
}

#[test]
fn test_compare_policies_on_shared_profile() {
    let config = small_pool_config("[pool]\nmax_instances = 8\nstartup_latency_secs = 30");
    let profile = DemandProfile::new(vec![1200.0, 6000.0, 18000.0, 6000.0], 60.0).unwrap();
    let results = scalesim_core::compare_policies(&config, &profile, &["reactive", "predictive"]);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].scaling_policy, "reactive");
    assert_eq!(results[1].scaling_policy, "predictive");
    for r in &results {
        assert!(r.completed_requests > 0);
        assert!(r.total_cost > 0.0);
        assert!(r.response_time.p50 <= r.response_time.p95);
        assert!(r.response_time.p95 <= r.response_time.p99);
    }
}

#[test]
fn test_unknown_policy_is_skipped_in_comparison() {
    let config = small_pool_config("");
    let results =
        scalesim_core::compare_policies(&config, &constant_profile(1.0), &["reactive", "magic"]);
    assert_eq!(results.len(), 1);
}

#[test]
fn test_unreachable_predictive_target_is_an_error() {
    let mut config = small_pool_config("");
    config.autoscaler.policy = "predictive".to_string();
    config.service.base_service_time_secs = 0.5;
    assert!(scalesim_core::run_with_config(&config, &constant_profile(1.0)).is_err());
}
