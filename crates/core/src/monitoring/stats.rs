//! Running per-service statistics

use std::collections::BTreeMap;
use std::time::Duration;

use mealwise_domain::{MetricRecord, ServiceStatsSnapshot};

use super::millis;

/// Incremental aggregate of every metric recorded for one service
///
/// Each [`add_metric`](Self::add_metric) is O(1) apart from the operation
/// map lookup. There is no removal; the monitor drops the whole aggregate on
/// a full reset.
#[derive(Debug, Clone, Default)]
pub struct ServiceStats {
    service: String,
    total_calls: u64,
    success_count: u64,
    fail_count: u64,
    total_duration: Duration,
    min_duration: Option<Duration>,
    max_duration: Option<Duration>,
    operation_counts: BTreeMap<String, u64>,
}

impl ServiceStats {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into(), ..Self::default() }
    }

    /// Fold one metric into the aggregate
    pub fn add_metric(&mut self, metric: &MetricRecord) {
        let duration = metric.duration();

        self.total_calls += 1;
        if metric.is_success() {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }

        self.total_duration = self.total_duration.saturating_add(duration);
        self.min_duration = Some(self.min_duration.map_or(duration, |min| min.min(duration)));
        self.max_duration = Some(self.max_duration.map_or(duration, |max| max.max(duration)));

        *self.operation_counts.entry(metric.operation().to_string()).or_insert(0) += 1;
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    pub fn fail_count(&self) -> u64 {
        self.fail_count
    }

    /// Fraction of successful calls, `0.0` when nothing was recorded
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.total_calls as f64
    }

    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    /// Mean duration, zero when nothing was recorded
    pub fn average_duration(&self) -> Duration {
        if self.total_calls == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_duration.as_nanos() / u128::from(self.total_calls);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    pub fn min_duration(&self) -> Option<Duration> {
        self.min_duration
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    pub fn operation_count(&self, operation: &str) -> u64 {
        self.operation_counts.get(operation).copied().unwrap_or(0)
    }

    pub fn operation_counts(&self) -> &BTreeMap<String, u64> {
        &self.operation_counts
    }

    /// Owned, serializable copy of the aggregate
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            service: self.service.clone(),
            total_calls: self.total_calls,
            success_count: self.success_count,
            fail_count: self.fail_count,
            success_rate: self.success_rate(),
            total_duration_ms: millis(self.total_duration),
            average_duration_ms: millis(self.average_duration()),
            min_duration_ms: self.min_duration.map_or(0.0, millis),
            max_duration_ms: self.max_duration.map_or(0.0, millis),
            operation_counts: self.operation_counts.clone(),
        }
    }
}
