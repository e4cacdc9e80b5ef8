//! Discrete-event simulation engine.
//!
//! The engine maintains a priority queue of [`SimEvent`]s sorted by timestamp
//! and scheduling order. Each iteration pops the next event, advances the
//! virtual clock, and processes the event, possibly scheduling new ones.
//! Request handling, the arrival source, startup timers and the autoscaler
//! are all expressed as events, so exactly one of them runs at a time and the
//! instance pool needs no locking.

use crate::clock::{secs_to_us, us_to_secs, SimClock};
use crate::config::{DispatchMode, SimConfig};
use crate::demand::{DemandProfile, Forecast, RealizedDemand};
use crate::metrics::{MetricsCollector, SimulationMetrics};
use crate::pool::{Activation, InstancePool};
use crate::request::{Request, ServiceModel};
use crate::stats::Histogram;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use scalesim_policies::{
    InstanceSnapshot, RoutingDecision, RoutingPolicy, ScaleDecision, ScalingPolicy,
};
use std::collections::{BinaryHeap, VecDeque};
use tracing::{debug, info, trace, warn};

/// RNG stream for interarrival times.
const ARRIVAL_STREAM: u64 = 0;
/// RNG stream for the realized-demand perturbation.
const DEMAND_NOISE_STREAM: u64 = 1;

/// Events in the discrete-event simulation.
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// The arrival source fires: one request arrives now.
    RequestArrival,
    /// A request finishes processing on an instance.
    RequestComplete { request: Request, instance_id: u32 },
    /// A polling request looks for a Ready instance again.
    RequestRetry(Request),
    /// Startup timer of one activation.
    InstanceReady { instance_id: u32, activation_seq: u64 },
    /// One autoscaler control cycle.
    AutoscalerTick,
}

/// A timestamped event for the priority queue.
#[derive(Debug, Clone)]
struct TimedEvent {
    time_us: u64,
    sequence: u64,
    event: SimEvent,
}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time_us == other.time_us && self.sequence == other.sequence
    }
}

impl Eq for TimedEvent {}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; we want min-heap
        other
            .time_us
            .cmp(&self.time_us)
            .then(other.sequence.cmp(&self.sequence))
    }
}

/// Clock adapter implementing the policy crate's Clock trait.
struct ClockAdapter<'a>(&'a SimClock);

impl scalesim_policies::Clock for ClockAdapter<'_> {
    fn now_secs(&self) -> f64 {
        self.0.now_secs()
    }
}

/// The main simulation engine.
pub struct SimulationEngine {
    /// Virtual clock.
    pub clock: SimClock,
    /// Event queue (min-heap by time, FIFO on ties).
    event_queue: BinaryHeap<TimedEvent>,
    sequence: u64,
    pool: InstancePool,
    metrics: MetricsCollector,
    scaling_policy: Box<dyn ScalingPolicy>,
    router: Box<dyn RoutingPolicy>,
    forecast: Forecast,
    realized: RealizedDemand,
    arrival_rng: ChaCha8Rng,
    service: ServiceModel,
    dispatch: DispatchMode,
    poll_interval_us: u64,
    startup_latency_us: u64,
    scaling_interval_us: u64,
    cost_per_instance_hour: f64,
    horizon_us: u64,
    /// Requests waiting for an instance to become Ready.
    wait_queue: VecDeque<Request>,
    /// Requests accepted by an instance and not yet complete.
    in_flight: u64,
    /// Requests sleeping until their next poll.
    polling: u64,
    next_request_id: u64,
    /// Reused snapshot buffer handed to policies.
    snapshots: Vec<InstanceSnapshot>,
    /// Total events processed.
    pub events_processed: u64,
}

impl SimulationEngine {
    /// Create an engine for `profile` (raw, unscaled) with the given
    /// policies. The initial instances, the first autoscaler cycle and the
    /// first arrival are scheduled immediately.
    pub fn new(
        config: &SimConfig,
        profile: &DemandProfile,
        scaling_policy: Box<dyn ScalingPolicy>,
        router: Box<dyn RoutingPolicy>,
    ) -> Self {
        let scaled = profile.scaled(config.demand.multiplier);
        let forecast = Forecast::from_profile(&scaled);

        let mut noise_rng = ChaCha8Rng::seed_from_u64(config.simulation.seed);
        noise_rng.set_stream(DEMAND_NOISE_STREAM);
        let realized = RealizedDemand::new(&scaled, config.demand.noise_std, &mut noise_rng);

        let mut arrival_rng = ChaCha8Rng::seed_from_u64(config.simulation.seed);
        arrival_rng.set_stream(ARRIVAL_STREAM);

        let metrics = &config.metrics;
        let histogram = Histogram::new(
            metrics.histogram_low_secs,
            metrics.histogram_step_secs,
            metrics.histogram_buckets,
        );

        let mut engine = Self {
            clock: SimClock::new(),
            event_queue: BinaryHeap::new(),
            sequence: 0,
            pool: InstancePool::new(config.pool.min_instances, config.pool.max_instances),
            metrics: MetricsCollector::new(config.service.sla_threshold_secs, histogram),
            scaling_policy,
            router,
            forecast,
            realized,
            arrival_rng,
            service: ServiceModel {
                base_service_time_secs: config.service.base_service_time_secs,
                alpha: config.service.alpha,
            },
            dispatch: config.simulation.dispatch,
            poll_interval_us: secs_to_us(config.simulation.poll_interval_secs).max(1),
            startup_latency_us: secs_to_us(config.pool.startup_latency_secs),
            scaling_interval_us: secs_to_us(config.autoscaler.interval_secs).max(1),
            cost_per_instance_hour: config.pool.cost_per_instance_hour,
            horizon_us: secs_to_us(config.horizon_secs(profile)),
            wait_queue: VecDeque::new(),
            in_flight: 0,
            polling: 0,
            next_request_id: 0,
            snapshots: Vec::new(),
            events_processed: 0,
        };

        for activation in engine.pool.initialize(config.pool.cold_start) {
            engine.schedule_startup(activation);
        }
        engine.metrics.observe_active(engine.pool.active_count());
        engine.schedule_event(0, SimEvent::AutoscalerTick);
        if let Some(first) = engine.realized.next_active_time(0.0) {
            engine.schedule_event(secs_to_us(first), SimEvent::RequestArrival);
        }
        engine
    }

    /// Schedule an event at a given time.
    pub fn schedule_event(&mut self, time_us: u64, event: SimEvent) {
        self.event_queue.push(TimedEvent {
            time_us,
            sequence: self.sequence,
            event,
        });
        self.sequence += 1;
    }

    /// Read-only view of the instance pool.
    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    pub fn metrics_collector(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn horizon_secs(&self) -> f64 {
        us_to_secs(self.horizon_us)
    }

    /// Requests arrived but not yet completed.
    pub fn pending_requests(&self) -> u64 {
        self.in_flight + self.polling + self.wait_queue.len() as u64
    }

    /// Requests parked in the wait queue.
    pub fn waiting_requests(&self) -> usize {
        self.wait_queue.len()
    }

    /// Run the simulation to the horizon and aggregate the results.
    pub fn run(&mut self) -> SimulationMetrics {
        info!(
            scaling_policy = self.scaling_policy.name(),
            router = self.router.name(),
            horizon_secs = self.horizon_secs(),
            "simulation started"
        );
        self.run_until_us(self.horizon_us);
        let report = self.report();
        info!(
            completed = report.completed_requests,
            pending = report.pending_requests,
            sla_compliance_pct = report.sla_compliance_pct,
            total_cost = report.total_cost,
            events = self.events_processed,
            "simulation finished"
        );
        report
    }

    /// Process every event up to `time_secs` (capped at the horizon), then
    /// leave the clock there.
    pub fn run_until(&mut self, time_secs: f64) {
        self.run_until_us(secs_to_us(time_secs));
    }

    fn run_until_us(&mut self, time_us: u64) {
        let until_us = time_us.min(self.horizon_us);
        while self
            .event_queue
            .peek()
            .is_some_and(|next| next.time_us <= until_us)
        {
            let Some(timed_event) = self.event_queue.pop() else {
                break;
            };
            self.clock.advance_to_us(timed_event.time_us);
            self.process_event(timed_event.event);
            self.events_processed += 1;
        }
        if self.clock.now_us() < until_us {
            self.clock.advance_to_us(until_us);
        }
    }

    /// Aggregate metrics at the current clock, crediting instances that are
    /// still active.
    pub fn report(&self) -> SimulationMetrics {
        self.metrics.aggregate(
            self.scaling_policy.name(),
            self.router.name(),
            self.clock.now_us(),
            self.pending_requests(),
            &self.pool,
            self.cost_per_instance_hour,
        )
    }

    /// Process a single event.
    fn process_event(&mut self, event: SimEvent) {
        match event {
            SimEvent::RequestArrival => self.handle_arrival(),
            SimEvent::RequestComplete {
                request,
                instance_id,
            } => self.handle_request_complete(request, instance_id),
            SimEvent::RequestRetry(request) => {
                self.polling = self.polling.saturating_sub(1);
                self.dispatch_request(request);
            }
            SimEvent::InstanceReady {
                instance_id,
                activation_seq,
            } => self.handle_instance_ready(instance_id, activation_seq),
            SimEvent::AutoscalerTick => self.handle_autoscaler_tick(),
        }
    }

    /// Spawn one request and reschedule the arrival source.
    fn handle_arrival(&mut self) {
        let now = self.clock.now_us();
        let request = Request {
            id: self.next_request_id,
            arrival_us: now,
        };
        self.next_request_id += 1;
        self.dispatch_request(request);

        if let Some(next) = self
            .realized
            .next_arrival(self.clock.now_secs(), &mut self.arrival_rng)
        {
            // Never schedule into the past, even for sub-microsecond draws.
            self.schedule_event(secs_to_us(next).max(now), SimEvent::RequestArrival);
        }
    }

    /// Route a request, or park it until an instance can take it.
    fn dispatch_request(&mut self, request: Request) {
        self.pool.fill_snapshots(&mut self.snapshots);
        match self.router.route(&self.snapshots) {
            RoutingDecision::Route(instance_id) => match self.pool.accept_request(instance_id) {
                Ok(load) => {
                    let done = self.clock.now_us() + self.service.processing_us(load);
                    self.in_flight += 1;
                    self.schedule_event(
                        done,
                        SimEvent::RequestComplete {
                            request,
                            instance_id,
                        },
                    );
                }
                Err(err) => {
                    warn!(request = request.id, error = %err, "router chose an unusable instance");
                    self.park_request(request);
                }
            },
            RoutingDecision::NoReadyInstance => self.park_request(request),
        }
    }

    fn park_request(&mut self, request: Request) {
        match self.dispatch {
            DispatchMode::WaitQueue => self.wait_queue.push_back(request),
            DispatchMode::Poll => {
                self.polling += 1;
                let at = self.clock.now_us() + self.poll_interval_us;
                self.schedule_event(at, SimEvent::RequestRetry(request));
            }
        }
    }

    fn handle_request_complete(&mut self, request: Request, instance_id: u32) {
        if let Err(err) = self.pool.release_request(instance_id) {
            warn!(request = request.id, error = %err, "release failed");
        }
        self.in_flight = self.in_flight.saturating_sub(1);
        let response_us = request.response_us(self.clock.now_us());
        self.metrics.record_response(response_us);
    }

    fn handle_instance_ready(&mut self, instance_id: u32, activation_seq: u64) {
        match self.pool.start_instance(instance_id, activation_seq) {
            Ok(true) => {
                trace!(
                    id = instance_id,
                    now_secs = self.clock.now_secs(),
                    waiting = self.wait_queue.len(),
                    "instance ready"
                );
                // Every waiter is routed now, in arrival order.
                let waiting = std::mem::take(&mut self.wait_queue);
                for request in waiting {
                    self.dispatch_request(request);
                }
            }
            Ok(false) => {
                trace!(id = instance_id, activation_seq, "stale startup timer ignored");
            }
            Err(err) => warn!(error = %err, "startup timer for unknown instance"),
        }
    }

    fn schedule_startup(&mut self, activation: Activation) {
        let at = self.clock.now_us() + self.startup_latency_us;
        self.schedule_event(
            at,
            SimEvent::InstanceReady {
                instance_id: activation.id,
                activation_seq: activation.seq,
            },
        );
    }

    /// One autoscaler cycle: evaluate, apply, record, reschedule.
    fn handle_autoscaler_tick(&mut self) {
        let now = self.clock.now_us();
        self.pool.fill_snapshots(&mut self.snapshots);
        let view = self.pool.view(&self.snapshots);
        let clock = ClockAdapter(&self.clock);
        let decision = self
            .scaling_policy
            .evaluate(&view, &self.forecast, &clock);

        let mut added = 0;
        let mut removed = 0;
        match decision {
            ScaleDecision::ScaleUp(n) => {
                for _ in 0..n {
                    match self.pool.add_instance(now) {
                        Some(activation) => {
                            self.schedule_startup(activation);
                            added += 1;
                        }
                        None => break,
                    }
                }
            }
            ScaleDecision::ScaleDown(n) => {
                for _ in 0..n {
                    if self.pool.remove_instance(now).is_none() {
                        break;
                    }
                    removed += 1;
                }
            }
            ScaleDecision::NoChange => {}
        }

        let active = self.pool.active_count();
        if added > 0 || removed > 0 {
            debug!(
                policy = self.scaling_policy.name(),
                now_secs = self.clock.now_secs(),
                added,
                removed,
                active,
                "scaling decision applied"
            );
        }
        self.metrics.record_scaling_cycle(now, added, removed, active);
        self.schedule_event(now + self.scaling_interval_us, SimEvent::AutoscalerTick);
    }
}
