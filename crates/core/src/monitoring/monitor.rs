//! Performance monitor coordinator
//!
//! One [`PerformanceMonitor`] is built per process by the composition root
//! and cloned into every caller; clones share the same state. All mutable
//! state sits behind a single coordinator-wide lock, so each metric
//! submission updates the recent window, service statistics, circuit
//! breaker and cost tracker atomically. Sinks are invoked after the lock is
//! released.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mealwise_common::resilience::{
    CircuitBreaker, CircuitBreakerConfig, Clock, ResilienceError, ResilienceResult, SystemClock,
};
use mealwise_domain::{
    CircuitBreakerStatus, CostSummary, DashboardData, HealthCheck, HealthStatus, MealwiseError,
    Metadata, MetricRecord, MonitorConfig, ServiceStatsSnapshot,
};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::cost::{CostAttributor, CostTracker, HeuristicCostAttributor, PriceTable};
use super::millis;
use super::ports::{MetricFlag, MetricSink};
use super::stats::ServiceStats;
use super::timer::{OperationTimer, ScopedTimer};

#[derive(Debug, Clone)]
struct Settings {
    capacity: usize,
    slow_threshold: Duration,
    dashboard_window: Duration,
    cost_alert_threshold_usd: f64,
}

struct MonitorState<C: Clock> {
    recent: VecDeque<MetricRecord>,
    stats: HashMap<String, ServiceStats>,
    breakers: HashMap<String, CircuitBreaker<Arc<C>>>,
    costs: CostTracker,
}

impl<C: Clock> MonitorState<C> {
    /// Breaker for `service`, created closed on first use
    fn breaker(
        &mut self,
        template: &CircuitBreaker<Arc<C>>,
        service: &str,
    ) -> &CircuitBreaker<Arc<C>> {
        self.breakers.entry(service.to_string()).or_insert_with(|| template.fresh_for(service))
    }
}

struct Inner<C: Clock> {
    clock: Arc<C>,
    enabled: AtomicBool,
    settings: Settings,
    breaker_template: CircuitBreaker<Arc<C>>,
    attributor: Arc<dyn CostAttributor>,
    sinks: Vec<Arc<dyn MetricSink>>,
    state: Mutex<MonitorState<C>>,
}

/// Metrics from the recent window that fall inside the dashboard lookback
struct WindowSummary {
    overall: ServiceStats,
    per_service: BTreeMap<String, ServiceStats>,
    costs: CostTracker,
}

/// Central registry for call measurement, circuit breaking and cost
/// accounting
pub struct PerformanceMonitor<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for PerformanceMonitor<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: Clock> fmt::Debug for PerformanceMonitor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("enabled", &self.is_enabled())
            .field("settings", &self.inner.settings)
            .field("sinks", &self.inner.sinks.len())
            .finish_non_exhaustive()
    }
}

impl PerformanceMonitor<SystemClock> {
    /// Build a monitor with the system clock, heuristic cost attribution and
    /// no sinks
    ///
    /// # Errors
    /// Returns `MealwiseError::Config` if the configuration is invalid.
    pub fn new(config: MonitorConfig) -> mealwise_domain::Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: MonitorConfig) -> PerformanceMonitorBuilder<SystemClock> {
        PerformanceMonitorBuilder::new(config)
    }
}

impl<C: Clock> PerformanceMonitor<C> {
    /* ---------------------------------------------------------------------- */
    /* Lifecycle */
    /* ---------------------------------------------------------------------- */

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Turn monitoring on or off without discarding any state
    ///
    /// While disabled, new timers are inert, submitted metrics are dropped
    /// and every service reports as available.
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.inner.enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!(enabled, "Performance monitoring toggled");
        }
    }

    /* ---------------------------------------------------------------------- */
    /* Capture */
    /* ---------------------------------------------------------------------- */

    /// Start timing an operation against a service
    pub fn start_timer(
        &self,
        operation: impl Into<String>,
        service: impl Into<String>,
    ) -> OperationTimer<C> {
        self.start_timer_with(operation, service, Metadata::new())
    }

    /// Start timing an operation, attaching caller context to its metric
    pub fn start_timer_with(
        &self,
        operation: impl Into<String>,
        service: impl Into<String>,
        metadata: Metadata,
    ) -> OperationTimer<C> {
        let clock = Arc::clone(&self.inner.clock);
        if self.is_enabled() {
            OperationTimer::live(self.clone(), clock, operation.into(), service.into(), metadata)
        } else {
            OperationTimer::disabled(clock, operation.into(), service.into())
        }
    }

    /// Fold a completed metric into the monitor
    ///
    /// Timers call this for you; it is public for callers that measure
    /// calls themselves. Dropped silently while monitoring is disabled.
    pub fn record(&self, metric: MetricRecord) {
        if !self.is_enabled() {
            debug!(
                service = metric.service(),
                operation = metric.operation(),
                "Monitoring disabled, dropping metric"
            );
            return;
        }

        let flags = self.flags_for(&metric);
        let cost_key = self.inner.attributor.cost_key(metric.service(), metric.operation());

        {
            let mut state = self.inner.state.lock();

            state
                .stats
                .entry(metric.service().to_string())
                .or_insert_with(|| ServiceStats::new(metric.service()))
                .add_metric(&metric);

            let breaker = state.breaker(&self.inner.breaker_template, metric.service());
            if metric.is_success() {
                breaker.record_success();
            } else {
                breaker.record_failure();
            }

            if let Some(key) = &cost_key {
                state.costs.track_usage(key, 1);
            }

            state.recent.push_back(metric.clone());
            while state.recent.len() > self.inner.settings.capacity {
                state.recent.pop_front();
            }
        }

        debug!(
            metric_id = %metric.id(),
            service = metric.service(),
            operation = metric.operation(),
            duration_ms = millis(metric.duration()),
            success = metric.is_success(),
            cost_key = cost_key.as_deref(),
            "Recorded metric"
        );

        for sink in &self.inner.sinks {
            sink.record(&metric);
            for flag in &flags {
                sink.flag(&metric, *flag);
            }
        }
    }

    fn flags_for(&self, metric: &MetricRecord) -> Vec<MetricFlag> {
        let mut flags = Vec::new();
        if metric.duration() > self.inner.settings.slow_threshold {
            flags.push(MetricFlag::Slow);
        }
        if !metric.is_success() {
            flags.push(MetricFlag::Failed);
        }
        flags
    }

    /* ---------------------------------------------------------------------- */
    /* Guarded execution */
    /* ---------------------------------------------------------------------- */

    /// Run an async operation gated by the service's circuit breaker
    ///
    /// Exactly one metric is recorded when the operation runs, including
    /// when the returned future is dropped before completion.
    ///
    /// # Errors
    /// - `ResilienceError::CircuitOpen` if the breaker refuses the call;
    ///   the operation is not run and nothing is recorded.
    /// - `ResilienceError::OperationFailed` wrapping the operation's error.
    pub async fn execute<F, Fut, T, E>(
        &self,
        operation: &str,
        service: &str,
        call: F,
    ) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.is_service_available(service) {
            debug!(service, operation, "Circuit open, rejecting call");
            return Err(ResilienceError::CircuitOpen { service: service.to_string() });
        }

        let scoped = ScopedTimer::new(self.start_timer(operation, service));
        match call().await {
            Ok(value) => {
                scoped.timer().complete();
                Ok(value)
            }
            Err(error) => {
                scoped.timer().fail(error.to_string());
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Run a synchronous operation gated by the service's circuit breaker
    ///
    /// # Errors
    /// Same as [`execute`](Self::execute).
    pub fn execute_sync<F, T, E>(
        &self,
        operation: &str,
        service: &str,
        call: F,
    ) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.is_service_available(service) {
            debug!(service, operation, "Circuit open, rejecting call");
            return Err(ResilienceError::CircuitOpen { service: service.to_string() });
        }

        let scoped = ScopedTimer::new(self.start_timer(operation, service));
        match call() {
            Ok(value) => {
                scoped.timer().complete();
                Ok(value)
            }
            Err(error) => {
                scoped.timer().fail(error.to_string());
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /* ---------------------------------------------------------------------- */
    /* Reads */
    /* ---------------------------------------------------------------------- */

    /// Whether callers should issue a request to `service` now
    ///
    /// Always `true` while monitoring is disabled. Otherwise consults the
    /// service's breaker, which may close itself if its recovery timeout has
    /// elapsed.
    pub fn is_service_available(&self, service: &str) -> bool {
        if !self.is_enabled() {
            return true;
        }

        let mut state = self.inner.state.lock();
        state.breaker(&self.inner.breaker_template, service).can_execute()
    }

    /// Lifetime statistics for one service
    pub fn service_stats(&self, service: &str) -> Option<ServiceStatsSnapshot> {
        self.inner.state.lock().stats.get(service).map(ServiceStats::snapshot)
    }

    /// Lifetime statistics for every observed service
    pub fn all_service_stats(&self) -> BTreeMap<String, ServiceStatsSnapshot> {
        let state = self.inner.state.lock();
        state.stats.iter().map(|(service, stats)| (service.clone(), stats.snapshot())).collect()
    }

    /// The newest `limit` metrics in the recent window, oldest first
    pub fn recent_metrics(&self, limit: usize) -> Vec<MetricRecord> {
        let state = self.inner.state.lock();
        let skip = state.recent.len().saturating_sub(limit);
        state.recent.iter().skip(skip).cloned().collect()
    }

    /// Number of metrics currently held in the recent window
    pub fn recent_metrics_len(&self) -> usize {
        self.inner.state.lock().recent.len()
    }

    pub fn circuit_breaker_status(&self, service: &str) -> Option<CircuitBreakerStatus> {
        self.inner.state.lock().breakers.get(service).map(breaker_status)
    }

    /// Status of every known breaker, sorted by service
    pub fn circuit_breaker_statuses(&self) -> Vec<CircuitBreakerStatus> {
        let state = self.inner.state.lock();
        sorted_statuses(&state.breakers)
    }

    /// Lifetime cost accounting since the last clear
    pub fn cost_summary(&self) -> CostSummary {
        self.inner.state.lock().costs.summary()
    }

    /// Snapshot of the recent window restricted to the dashboard lookback
    ///
    /// Only metrics still held in the bounded window are considered, so under
    /// heavy traffic the figures cover less than the nominal lookback.
    pub fn dashboard_data(&self) -> DashboardData {
        let now = self.inner.clock.utc_now();
        let state = self.inner.state.lock();
        let summary = self.window_summary(&state, now);

        DashboardData {
            generated_at: now,
            total_operations: summary.overall.total_calls(),
            success_count: summary.overall.success_count(),
            fail_count: summary.overall.fail_count(),
            average_response_time_ms: millis(summary.overall.average_duration()),
            per_service_stats: summary
                .per_service
                .iter()
                .map(|(service, stats)| (service.clone(), stats.snapshot()))
                .collect(),
            cost_breakdown: summary.costs.cost_breakdown(),
            total_cost_usd: summary.costs.total_cost(),
            circuit_breaker_statuses: sorted_statuses(&state.breakers),
        }
    }

    /// Overall health: degraded while any breaker is open
    ///
    /// Breakers are inspected without attempting recovery.
    pub fn health_check(&self) -> HealthCheck {
        let now = self.inner.clock.utc_now();
        let state = self.inner.state.lock();

        let mut open_circuit_breakers: Vec<String> = state
            .breakers
            .iter()
            .filter(|(_, breaker)| breaker.is_open())
            .map(|(service, _)| service.clone())
            .collect();
        open_circuit_breakers.sort();

        let total_cost = self.window_costs(&state, now).total_cost();
        let status = if open_circuit_breakers.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthCheck {
            status,
            open_circuit_breakers,
            total_cost_24h_usd: total_cost,
            cost_alert: total_cost > self.inner.settings.cost_alert_threshold_usd,
            timestamp: now,
        }
    }

    fn window_summary(&self, state: &MonitorState<C>, now: DateTime<Utc>) -> WindowSummary {
        let mut summary = WindowSummary {
            overall: ServiceStats::new("all"),
            per_service: BTreeMap::new(),
            costs: CostTracker::new(state.costs.prices().clone()),
        };

        for metric in self.in_window(state, now) {
            summary.overall.add_metric(metric);
            summary
                .per_service
                .entry(metric.service().to_string())
                .or_insert_with(|| ServiceStats::new(metric.service()))
                .add_metric(metric);
            self.attribute(&mut summary.costs, metric);
        }

        summary
    }

    /// Cost of the metrics inside the dashboard lookback, without statistics
    fn window_costs(&self, state: &MonitorState<C>, now: DateTime<Utc>) -> CostTracker {
        let mut costs = CostTracker::new(state.costs.prices().clone());
        for metric in self.in_window(state, now) {
            self.attribute(&mut costs, metric);
        }
        costs
    }

    fn in_window<'a>(
        &self,
        state: &'a MonitorState<C>,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a MetricRecord> + 'a {
        let cutoff = chrono::Duration::from_std(self.inner.settings.dashboard_window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window));

        state
            .recent
            .iter()
            .filter(move |metric| cutoff.map_or(true, |cutoff| metric.start_time() >= cutoff))
    }

    fn attribute(&self, costs: &mut CostTracker, metric: &MetricRecord) {
        if let Some(key) = self.inner.attributor.cost_key(metric.service(), metric.operation()) {
            costs.track_usage(&key, 1);
        }
    }

    /* ---------------------------------------------------------------------- */
    /* Mutations */
    /* ---------------------------------------------------------------------- */

    /// Force one service's breaker closed; `false` if the service is unknown
    pub fn reset_circuit_breaker(&self, service: &str) -> bool {
        let state = self.inner.state.lock();
        match state.breakers.get(service) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn reset_all_circuit_breakers(&self) {
        let state = self.inner.state.lock();
        for breaker in state.breakers.values() {
            breaker.reset();
        }
        info!(count = state.breakers.len(), "All circuit breakers reset");
    }

    /// Drop every metric, statistic, breaker and cost record
    pub fn clear_data(&self) {
        let mut state = self.inner.state.lock();
        state.recent.clear();
        state.stats.clear();
        state.breakers.clear();
        state.costs.reset();
        info!("Performance monitor data cleared");
    }
}

fn breaker_status<C: Clock>(breaker: &CircuitBreaker<C>) -> CircuitBreakerStatus {
    let metrics = breaker.metrics();
    CircuitBreakerStatus {
        is_open: metrics.is_open(),
        service: metrics.service,
        failure_count: metrics.failure_count,
        last_failure_time: metrics.last_failure_time,
    }
}

fn sorted_statuses<C: Clock>(
    breakers: &HashMap<String, CircuitBreaker<C>>,
) -> Vec<CircuitBreakerStatus> {
    let mut statuses: Vec<_> = breakers.values().map(breaker_status).collect();
    statuses.sort_by(|a, b| a.service.cmp(&b.service));
    statuses
}

/* -------------------------------------------------------------------------- */
/* Builder */
/* -------------------------------------------------------------------------- */

/// Builder for [`PerformanceMonitor`]
pub struct PerformanceMonitorBuilder<C: Clock = SystemClock> {
    config: MonitorConfig,
    clock: C,
    attributor: Arc<dyn CostAttributor>,
    sinks: Vec<Arc<dyn MetricSink>>,
}

impl PerformanceMonitorBuilder<SystemClock> {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            clock: SystemClock,
            attributor: Arc::new(HeuristicCostAttributor),
            sinks: Vec::new(),
        }
    }
}

impl<C: Clock> PerformanceMonitorBuilder<C> {
    /// Use a custom clock (useful for testing)
    pub fn clock<C2: Clock>(self, clock: C2) -> PerformanceMonitorBuilder<C2> {
        PerformanceMonitorBuilder {
            config: self.config,
            clock,
            attributor: self.attributor,
            sinks: self.sinks,
        }
    }

    /// Replace the heuristic cost attribution
    pub fn attributor(mut self, attributor: impl CostAttributor + 'static) -> Self {
        self.attributor = Arc::new(attributor);
        self
    }

    /// Register a sink; sinks are called in registration order
    pub fn sink(mut self, sink: Arc<dyn MetricSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Validate the configuration and build the monitor
    ///
    /// # Errors
    /// Returns `MealwiseError::Config` if the configuration is invalid.
    pub fn build(self) -> mealwise_domain::Result<PerformanceMonitor<C>> {
        self.config.validate()?;

        let clock = Arc::new(self.clock);
        let breaker_config = CircuitBreakerConfig::builder()
            .failure_threshold(self.config.circuit_breaker.failure_threshold)
            .recovery_timeout(self.config.circuit_breaker.recovery_timeout())
            .build()
            .map_err(|err| MealwiseError::Config(err.to_string()))?;
        let breaker_template = CircuitBreaker::with_clock(breaker_config, Arc::clone(&clock))
            .map_err(|err| MealwiseError::Config(err.to_string()))?;

        let prices = PriceTable::default().with_overrides(&self.config.prices);
        let settings = Settings {
            capacity: self.config.recent_metrics_capacity,
            slow_threshold: self.config.slow_operation_threshold(),
            dashboard_window: self.config.dashboard_window(),
            cost_alert_threshold_usd: self.config.cost_alert_threshold_usd,
        };

        info!(
            enabled = self.config.enabled,
            capacity = settings.capacity,
            failure_threshold = self.config.circuit_breaker.failure_threshold,
            sinks = self.sinks.len(),
            "Performance monitor initialized"
        );

        Ok(PerformanceMonitor {
            inner: Arc::new(Inner {
                clock,
                enabled: AtomicBool::new(self.config.enabled),
                state: Mutex::new(MonitorState {
                    recent: VecDeque::with_capacity(settings.capacity.min(1024)),
                    stats: HashMap::new(),
                    breakers: HashMap::new(),
                    costs: CostTracker::new(prices),
                }),
                settings,
                breaker_template,
                attributor: self.attributor,
                sinks: self.sinks,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the performance monitor
    //!
    //! Time is driven by `MockClock`, so durations, recovery timeouts and
    //! the dashboard lookback are exact.

    use mealwise_common::resilience::MockClock;
    use serde_json::json;

    use super::*;
    use crate::monitoring::cost::cost_keys;

    #[derive(Default)]
    struct RecordingSink {
        recorded: parking_lot::Mutex<Vec<String>>,
        flagged: parking_lot::Mutex<Vec<(String, MetricFlag)>>,
    }

    impl MetricSink for RecordingSink {
        fn record(&self, metric: &MetricRecord) {
            self.recorded.lock().push(metric.operation().to_string());
        }

        fn flag(&self, metric: &MetricRecord, flag: MetricFlag) {
            self.flagged.lock().push((metric.operation().to_string(), flag));
        }
    }

    fn monitor_with(config: MonitorConfig) -> (PerformanceMonitor<MockClock>, MockClock) {
        let clock = MockClock::new();
        let monitor = PerformanceMonitor::builder(config).clock(clock.clone()).build().unwrap();
        (monitor, clock)
    }

    fn monitor() -> (PerformanceMonitor<MockClock>, MockClock) {
        monitor_with(MonitorConfig::default())
    }

    fn run(
        monitor: &PerformanceMonitor<MockClock>,
        clock: &MockClock,
        operation: &str,
        service: &str,
        duration_ms: u64,
        success: bool,
    ) {
        let timer = monitor.start_timer(operation, service);
        clock.advance_millis(duration_ms);
        if success {
            timer.complete();
        } else {
            timer.fail("upstream error");
        }
    }

    /// Validates the three-lookup scenario end to end.
    ///
    /// Assertions:
    /// - Average 200ms, min 100ms, max 300ms, rate 1.0.
    /// - `operation_counts["lookup"] == 3`.
    /// - Unpriced service accrues no cost.
    #[test]
    fn test_three_lookups_scenario() {
        let (monitor, clock) = monitor();
        for duration in [100, 200, 300] {
            run(&monitor, &clock, "lookup", "search", duration, true);
        }

        let stats = monitor.service_stats("search").unwrap();
        assert_eq!(stats.average_duration_ms, 200.0);
        assert_eq!(stats.min_duration_ms, 100.0);
        assert_eq!(stats.max_duration_ms, 300.0);
        assert_eq!(stats.success_rate, 1.0);
        assert_eq!(stats.operation_counts.get("lookup"), Some(&3));
        assert_eq!(monitor.cost_summary().total_cost_usd, 0.0);
    }

    /// Validates five consecutive failures degrade health.
    ///
    /// Assertions:
    /// - Health is degraded with exactly `["infer"]` open.
    /// - The service is reported unavailable.
    #[test]
    fn test_five_failures_degrade_health() {
        let (monitor, clock) = monitor();
        for _ in 0..5 {
            run(&monitor, &clock, "predict", "infer", 10, false);
        }

        let health = monitor.health_check();
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.open_circuit_breakers, vec!["infer".to_string()]);
        assert!(!monitor.is_service_available("infer"));
        assert!(monitor.is_service_available("search"), "unseen services start closed");
    }

    #[test]
    fn test_success_resets_failure_count() {
        let (monitor, clock) = monitor();
        for _ in 0..4 {
            run(&monitor, &clock, "predict", "infer", 10, false);
        }
        run(&monitor, &clock, "predict", "infer", 10, true);

        let status = monitor.circuit_breaker_status("infer").unwrap();
        assert_eq!(status.failure_count, 0);
        assert!(!status.is_open);
        assert!(status.last_failure_time.is_none());

        for _ in 0..4 {
            run(&monitor, &clock, "predict", "infer", 10, false);
        }
        assert!(monitor.is_service_available("infer"));
    }

    /// Validates optimistic recovery through the monitor.
    ///
    /// Assertions:
    /// - Unavailable until the recovery timeout since the last failure.
    /// - Available afterwards with the breaker closed.
    #[test]
    fn test_breaker_recovers_after_timeout() {
        let (monitor, clock) = monitor();
        for _ in 0..5 {
            run(&monitor, &clock, "predict", "infer", 0, false);
        }

        clock.advance(Duration::from_secs(299));
        assert!(!monitor.is_service_available("infer"));

        clock.advance(Duration::from_secs(1));
        assert!(monitor.is_service_available("infer"));
        assert_eq!(monitor.health_check().status, HealthStatus::Healthy);
        assert_eq!(monitor.circuit_breaker_status("infer").unwrap().failure_count, 0);
    }

    /// Validates the first terminal call wins.
    ///
    /// Assertions:
    /// - complete-then-fail records one success.
    /// - fail twice records one failure.
    #[test]
    fn test_timer_records_exactly_once() {
        let (monitor, clock) = monitor();

        let timer = monitor.start_timer("embedding", "ai_inference");
        clock.advance_millis(5);
        timer.complete();
        timer.fail("late failure");
        timer.complete();
        assert!(timer.is_finished());
        assert_eq!(monitor.recent_metrics_len(), 1);
        assert!(monitor.recent_metrics(1)[0].is_success());

        let timer = monitor.start_timer("embedding", "ai_inference");
        timer.fail("first");
        timer.fail("second");
        let recent = monitor.recent_metrics(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].error_message(), Some("first"));

        let stats = monitor.service_stats("ai_inference").unwrap();
        assert_eq!(stats.total_calls, 2);
    }

    #[test]
    fn test_abandoned_timer_records_nothing() {
        let (monitor, _clock) = monitor();
        {
            let _timer = monitor.start_timer("vision_analysis", "ai_inference");
        }
        assert_eq!(monitor.recent_metrics_len(), 0);
        assert!(monitor.service_stats("ai_inference").is_none());
        assert!(monitor.circuit_breaker_status("ai_inference").is_none());
    }

    #[test]
    fn test_metadata_merges_with_completion_winning() {
        let (monitor, _clock) = monitor();
        let mut start = Metadata::new();
        start.insert("meal_id".into(), json!("m-1"));
        start.insert("attempt".into(), json!(1));

        let timer = monitor.start_timer_with("vision_analysis", "ai_inference", start);
        let mut extra = Metadata::new();
        extra.insert("attempt".into(), json!(2));
        extra.insert("tokens".into(), json!(512));
        timer.complete_with(extra);

        let metric = &monitor.recent_metrics(1)[0];
        assert_eq!(metric.metadata()["meal_id"], json!("m-1"));
        assert_eq!(metric.metadata()["attempt"], json!(2));
        assert_eq!(metric.metadata()["tokens"], json!(512));
    }

    /// Validates FIFO eviction at the window capacity.
    ///
    /// Assertions:
    /// - The window never exceeds 1000 entries.
    /// - The oldest metrics are the ones evicted.
    /// - The dashboard only counts what remains, lifetime stats count all.
    #[test]
    fn test_recent_window_is_bounded_fifo() {
        let (monitor, _clock) = monitor();
        for i in 0..1005 {
            monitor.start_timer(format!("op-{i}"), "search").complete();
            assert!(monitor.recent_metrics_len() <= 1000);
        }

        let recent = monitor.recent_metrics(usize::MAX);
        assert_eq!(recent.len(), 1000);
        assert_eq!(recent[0].operation(), "op-5");
        assert_eq!(recent[999].operation(), "op-1004");

        assert_eq!(monitor.dashboard_data().total_operations, 1000);
        assert_eq!(monitor.service_stats("search").unwrap().total_calls, 1005);
    }

    #[test]
    fn test_small_capacity_from_config() {
        let config = MonitorConfig { recent_metrics_capacity: 2, ..MonitorConfig::default() };
        let (monitor, _clock) = monitor_with(config);
        for op in ["a", "b", "c"] {
            monitor.start_timer(op, "search").complete();
        }
        let ops: Vec<_> =
            monitor.recent_metrics(10).iter().map(|m| m.operation().to_string()).collect();
        assert_eq!(ops, vec!["b", "c"]);
    }

    /// Validates disabling keeps state but stops recording and gating.
    ///
    /// Assertions:
    /// - Open breaker reports available while disabled.
    /// - Timers are inert and direct records are dropped.
    /// - Re-enabling resumes with the breaker still open.
    #[test]
    fn test_disable_preserves_state() {
        let (monitor, clock) = monitor();
        for _ in 0..5 {
            run(&monitor, &clock, "predict", "infer", 1, false);
        }
        assert!(!monitor.is_service_available("infer"));

        monitor.set_enabled(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.is_service_available("infer"));

        let timer = monitor.start_timer("predict", "infer");
        assert!(!timer.is_live());
        clock.advance_millis(40);
        assert_eq!(timer.elapsed(), Duration::from_millis(40));
        timer.complete();
        assert_eq!(monitor.recent_metrics_len(), 5);

        let live = monitor.clone();
        live.set_enabled(true);
        assert!(!monitor.is_service_available("infer"));
        assert_eq!(monitor.service_stats("infer").unwrap().fail_count, 5);
    }

    #[test]
    fn test_timer_started_before_disable_is_dropped() {
        let (monitor, _clock) = monitor();
        let timer = monitor.start_timer("lookup", "nutrition_db");
        monitor.set_enabled(false);
        timer.complete();
        assert_eq!(monitor.recent_metrics_len(), 0);
    }

    /// Validates a deserialized record with a reversed span and a stale
    /// duration cannot skew statistics.
    ///
    /// Assertions:
    /// - The record counts as a failure with a placeholder message.
    /// - Its duration contributes zero, not the serialized value.
    #[test]
    fn test_deserialized_record_is_normalized_before_recording() {
        let (monitor, _clock) = monitor();
        let metric: MetricRecord = serde_json::from_value(json!({
            "id": "01890a5d-ac96-774b-bcce-b302099a8057",
            "operation": "lookup",
            "service": "nutrition_db",
            "startTime": "1970-01-01T00:00:10Z",
            "endTime": "1970-01-01T00:00:00Z",
            "durationMs": 999_999,
            "success": false
        }))
        .unwrap();

        monitor.record(metric);

        let stats = monitor.service_stats("nutrition_db").unwrap();
        assert_eq!(stats.fail_count, 1);
        assert_eq!(stats.max_duration_ms, 0.0);
        let recorded = monitor.recent_metrics(1);
        assert_eq!(recorded[0].error_message(), Some(mealwise_domain::UNSPECIFIED_ERROR));
    }

    #[test]
    fn test_dashboard_excludes_metrics_outside_window() {
        let (monitor, clock) = monitor();
        run(&monitor, &clock, "embedding", "ai_inference", 100, true);

        clock.advance(Duration::from_secs(25 * 60 * 60));
        run(&monitor, &clock, "lookup", "search", 300, false);

        let dashboard = monitor.dashboard_data();
        assert_eq!(dashboard.total_operations, 1);
        assert_eq!(dashboard.fail_count, 1);
        assert_eq!(dashboard.average_response_time_ms, 300.0);
        assert!(dashboard.per_service_stats.contains_key("search"));
        assert!(!dashboard.per_service_stats.contains_key("ai_inference"));
        assert_eq!(dashboard.total_cost_usd, 0.0);
        assert_eq!(monitor.cost_summary().usage_breakdown.get(cost_keys::OPENAI_EMBEDDING), Some(&1));
    }

    #[test]
    fn test_dashboard_aggregates() {
        let (monitor, clock) = monitor();
        run(&monitor, &clock, "embedding", "ai_inference", 100, true);
        run(&monitor, &clock, "embedding", "ai_inference", 300, false);
        run(&monitor, &clock, "vision_analysis", "ai_inference", 200, true);
        run(&monitor, &clock, "lookup", "search", 200, true);

        let dashboard = monitor.dashboard_data();
        assert_eq!(dashboard.total_operations, 4);
        assert_eq!(dashboard.success_count, 3);
        assert_eq!(dashboard.fail_count, 1);
        assert_eq!(dashboard.average_response_time_ms, 200.0);
        assert_eq!(dashboard.per_service_stats["ai_inference"].total_calls, 3);
        assert_eq!(dashboard.cost_breakdown.len(), 2);
        assert!((dashboard.total_cost_usd - 0.0102).abs() < 1e-12);

        let services: Vec<_> =
            dashboard.circuit_breaker_statuses.iter().map(|s| s.service.as_str()).collect();
        assert_eq!(services, vec!["ai_inference", "search"]);
    }

    #[test]
    fn test_cost_alert_above_threshold() {
        let mut config = MonitorConfig::default();
        config.prices.insert(cost_keys::OPENAI_VISION.to_string(), 6.0);
        let (monitor, clock) = monitor_with(config);

        run(&monitor, &clock, "vision_analysis", "ai_inference", 10, true);
        assert!(!monitor.health_check().cost_alert);

        run(&monitor, &clock, "image_vision", "openai", 10, true);
        let health = monitor.health_check();
        assert!(health.cost_alert);
        assert_eq!(health.total_cost_24h_usd, 12.0);
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    /// Validates the health check prices only metrics inside the lookback.
    ///
    /// Assertions:
    /// - Windowed cost matches the dashboard total.
    /// - Metrics older than the window drop out of the health cost.
    #[test]
    fn test_health_cost_follows_dashboard_window() {
        let (monitor, clock) = monitor();
        run(&monitor, &clock, "vision_analysis", "ai_inference", 10, true);
        clock.advance(Duration::from_secs(23 * 60 * 60));
        run(&monitor, &clock, "embedding", "ai_inference", 10, true);
        run(&monitor, &clock, "lookup", "search", 10, true);

        let health = monitor.health_check();
        assert!((health.total_cost_24h_usd - 0.0101).abs() < 1e-12);
        assert_eq!(health.total_cost_24h_usd, monitor.dashboard_data().total_cost_usd);

        clock.advance(Duration::from_secs(2 * 60 * 60));
        let health = monitor.health_check();
        assert!((health.total_cost_24h_usd - 0.0001).abs() < 1e-12);
        assert!((monitor.cost_summary().total_cost_usd - 0.0101).abs() < 1e-12);
    }

    #[test]
    fn test_custom_attributor_replaces_heuristic() {
        struct FlatAttributor;
        impl CostAttributor for FlatAttributor {
            fn cost_key(&self, _service: &str, _operation: &str) -> Option<String> {
                Some("flat".to_string())
            }
        }

        let mut config = MonitorConfig::default();
        config.prices.insert("flat".to_string(), 0.5);
        let clock = MockClock::new();
        let monitor = PerformanceMonitor::builder(config)
            .clock(clock)
            .attributor(FlatAttributor)
            .build()
            .unwrap();

        monitor.start_timer("lookup", "search").complete();
        monitor.start_timer("anything", "anywhere").complete();
        assert_eq!(monitor.cost_summary().total_cost_usd, 1.0);
    }

    /// Validates sink notification and flagging.
    ///
    /// Assertions:
    /// - Every metric reaches `record`.
    /// - Only durations strictly above 5s are flagged slow.
    /// - Failures are flagged failed.
    #[test]
    fn test_sinks_receive_records_and_flags() {
        let sink = Arc::new(RecordingSink::default());
        let clock = MockClock::new();
        let monitor = PerformanceMonitor::builder(MonitorConfig::default())
            .clock(clock.clone())
            .sink(sink.clone())
            .build()
            .unwrap();

        run(&monitor, &clock, "fast", "search", 10, true);
        run(&monitor, &clock, "borderline", "search", 5_000, true);
        run(&monitor, &clock, "slow", "search", 5_001, true);
        run(&monitor, &clock, "slow_fail", "search", 6_000, false);

        assert_eq!(sink.recorded.lock().len(), 4);
        assert_eq!(
            *sink.flagged.lock(),
            vec![
                ("slow".to_string(), MetricFlag::Slow),
                ("slow_fail".to_string(), MetricFlag::Slow),
                ("slow_fail".to_string(), MetricFlag::Failed),
            ]
        );
    }

    #[test]
    fn test_reset_operations() {
        let (monitor, clock) = monitor();
        for service in ["infer", "vector_search"] {
            for _ in 0..5 {
                run(&monitor, &clock, "call", service, 1, false);
            }
        }
        assert_eq!(monitor.health_check().open_circuit_breakers.len(), 2);

        assert!(monitor.reset_circuit_breaker("infer"));
        assert!(!monitor.reset_circuit_breaker("unknown"));
        assert_eq!(monitor.health_check().open_circuit_breakers, vec!["vector_search".to_string()]);

        monitor.reset_all_circuit_breakers();
        assert_eq!(monitor.health_check().status, HealthStatus::Healthy);
        assert_eq!(monitor.service_stats("infer").unwrap().fail_count, 5);
    }

    #[test]
    fn test_clear_data_wipes_everything() {
        let (monitor, clock) = monitor();
        run(&monitor, &clock, "embedding", "ai_inference", 10, true);
        for _ in 0..5 {
            run(&monitor, &clock, "predict", "infer", 1, false);
        }

        monitor.clear_data();
        assert_eq!(monitor.recent_metrics_len(), 0);
        assert!(monitor.all_service_stats().is_empty());
        assert!(monitor.circuit_breaker_statuses().is_empty());
        assert_eq!(monitor.cost_summary(), CostSummary::default());
        assert!(monitor.is_service_available("infer"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MonitorConfig { recent_metrics_capacity: 0, ..MonitorConfig::default() };
        assert!(matches!(PerformanceMonitor::new(config), Err(MealwiseError::Config(_))));
    }

    #[derive(Debug)]
    struct CallError(&'static str);

    impl fmt::Display for CallError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for CallError {}

    #[test]
    fn test_execute_sync_records_outcomes() {
        let (monitor, _clock) = monitor();

        let value = monitor.execute_sync("lookup", "nutrition_db", || Ok::<_, CallError>(42));
        assert_eq!(value.unwrap(), 42);

        let err = monitor.execute_sync("lookup", "nutrition_db", || Err::<(), _>(CallError("404")));
        assert!(matches!(err, Err(ResilienceError::OperationFailed { .. })));

        let recent = monitor.recent_metrics(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].error_message(), Some("404"));
    }

    #[tokio::test]
    async fn test_execute_rejects_when_open() {
        let (monitor, clock) = monitor();
        for _ in 0..5 {
            run(&monitor, &clock, "predict", "infer", 1, false);
        }

        let mut ran = false;
        let result = monitor
            .execute("predict", "infer", || {
                ran = true;
                async { Ok::<_, CallError>(()) }
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::CircuitOpen { ref service }) if service == "infer"));
        assert!(!ran);
        assert_eq!(monitor.recent_metrics_len(), 5);
    }

    #[tokio::test]
    async fn test_execute_records_async_failure() {
        let (monitor, _clock) = monitor();
        let result = monitor
            .execute("embedding", "ai_inference", || async { Err::<u8, _>(CallError("timeout")) })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Operation failed: timeout");
        let metric = &monitor.recent_metrics(1)[0];
        assert!(!metric.is_success());
        assert_eq!(metric.error_message(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_execute_cancelled_future_still_records() {
        let (monitor, _clock) = monitor();
        let call = monitor.execute("embedding", "ai_inference", || async {
            std::future::pending::<Result<(), CallError>>().await
        });

        let outcome = tokio::time::timeout(Duration::from_millis(10), call).await;
        assert!(outcome.is_err(), "pending call should time out");

        let metric = &monitor.recent_metrics(1)[0];
        assert_eq!(metric.error_message(), Some("operation cancelled"));
    }
}
