/// Integration tests for scaling and routing policies in a simulation context.
use scalesim_core::config::SimConfig;
use scalesim_core::demand::DemandProfile;
use scalesim_core::SimulationMetrics;

fn fixed_pool_config(router: &str, instances: u32) -> SimConfig {
    SimConfig::from_str(&format!(
        r#"
[simulation]
name = "policy-test"
seed = 42
horizon_secs = 600

[pool]
min_instances = {n}
max_instances = {n}

[service]
base_service_time_secs = 0.1
alpha = 0.02

[routing]
policy = "{router}"
"#,
        n = instances,
        router = router
    ))
    .unwrap()
}

fn constant_profile(per_sec: f64) -> DemandProfile {
    DemandProfile::new(vec![per_sec * 60.0], 60.0).unwrap()
}

#[test]
fn test_round_robin_spreads_requests_evenly() {
    let config = fixed_pool_config("round_robin", 4);
    let metrics = scalesim_core::run_with_config(&config, &constant_profile(50.0)).unwrap();

    assert_eq!(metrics.router, "round_robin");
    let served: Vec<u64> = metrics.instances.iter().map(|i| i.requests_served).collect();
    assert_eq!(served.len(), 4);
    let max = served.iter().max().unwrap();
    let min = served.iter().min().unwrap();
    assert!(max - min <= 1, "uneven: {:?}", served);
}

#[test]
fn test_least_loaded_balances_load() {
    let config = fixed_pool_config("least_loaded", 4);
    let metrics = scalesim_core::run_with_config(&config, &constant_profile(200.0)).unwrap();

    assert_eq!(metrics.router, "least_loaded");
    let means: Vec<f64> = metrics.instances.iter().map(|i| i.mean_load).collect();
    let max = means.iter().cloned().fold(f64::MIN, f64::max);
    let min = means.iter().cloned().fold(f64::MAX, f64::min);
    // About 21 requests in service, spread over four instances.
    assert!(min > 3.0, "means: {:?}", means);
    assert!(max - min < 1.5, "means: {:?}", means);
}

/// Ten one-minute buckets: quiet for five, then a burst of 1500 req/s.
fn step_config_and_profile(policy: &str) -> (SimConfig, DemandProfile) {
    let config = SimConfig::from_str(&format!(
        r#"
[simulation]
seed = 11

[pool]
min_instances = 1
max_instances = 20
startup_latency_secs = 60

[service]
base_service_time_secs = 0.1
alpha = 0.02
sla_threshold_secs = 0.2

[autoscaler]
policy = "{}"
interval_secs = 60
"#,
        policy
    ))
    .unwrap();
    let mut samples = vec![600.0; 5];
    samples.extend(vec![90_000.0; 5]);
    (config, DemandProfile::new(samples, 60.0).unwrap())
}

fn active_at(metrics: &SimulationMetrics, time_secs: f64) -> u32 {
    metrics
        .trajectory
        .iter()
        .find(|p| p.time_secs == time_secs)
        .map(|p| p.active_instances)
        .unwrap()
}

#[test]
fn test_predictive_provisions_before_the_step() {
    let (config, profile) = step_config_and_profile("predictive");
    let predictive = scalesim_core::run_with_config(&config, &profile).unwrap();

    let (config, profile) = step_config_and_profile("reactive");
    let reactive = scalesim_core::run_with_config(&config, &profile).unwrap();

    // Sized for 1500 req/s at a 0.16 s target: ceil(1500 * 0.16 / 30) = 8.
    assert_eq!(active_at(&predictive, 60.0), 1);
    assert_eq!(active_at(&predictive, 120.0), 8);
    assert_eq!(active_at(&predictive, 240.0), 8);
    assert_eq!(active_at(&reactive, 240.0), 1);

    assert!(predictive.sla_compliance_pct > reactive.sla_compliance_pct);
}

#[test]
fn test_predictive_scales_down_after_the_burst() {
    let (config, profile) = step_config_and_profile("predictive");
    let metrics = scalesim_core::run_with_config(&config, &profile).unwrap();

    assert!(metrics.scale_up_actions >= 1);
    assert!(metrics.scale_down_actions >= 1);
    let last = metrics.trajectory.last().unwrap();
    assert_eq!(last.active_instances, 1);
}

#[test]
fn test_reactive_adds_one_instance_per_cycle() {
    let (config, profile) = step_config_and_profile("reactive");
    let metrics = scalesim_core::run_with_config(&config, &profile).unwrap();

    for pair in metrics.trajectory.windows(2) {
        let (before, after) = (pair[0].active_instances, pair[1].active_instances);
        assert!(
            after <= before + 1,
            "jumped from {} to {} at {}s",
            before,
            after,
            pair[1].time_secs
        );
    }
}

#[test]
fn test_policy_params_follow_config() {
    let (config, _) = step_config_and_profile("predictive");
    let params = config.predictive_params();
    assert_eq!(params.startup_latency_secs, 60.0);
    assert_eq!(params.scaling_interval_secs, 60.0);
    assert_eq!(params.required_instances(1500.0), 8);
    assert_eq!(params.required_instances(0.0), 1);

    let reactive = config.reactive_params();
    assert_eq!(reactive.max_instances, 20);
    assert_eq!(reactive.scale_up_load, 38.0);
}
