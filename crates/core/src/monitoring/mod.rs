//! Performance monitoring for calls to external, metered dependencies
//!
//! A caller starts an [`OperationTimer`] on the [`PerformanceMonitor`],
//! performs the external call, then completes or fails the timer once. The
//! resulting metric is folded into the recent window, the service's
//! [`ServiceStats`], its circuit breaker and, when the call is billable, the
//! [`CostTracker`].

pub mod cost;
pub mod monitor;
pub mod ports;
pub mod stats;
pub mod timer;

pub use cost::{cost_keys, CostAttributor, CostTracker, HeuristicCostAttributor, PriceTable};
pub use monitor::{PerformanceMonitor, PerformanceMonitorBuilder};
pub use ports::{MetricFlag, MetricSink, NoopMetricSink};
pub use stats::ServiceStats;
pub use timer::OperationTimer;

use std::time::Duration;

/// Duration as fractional milliseconds, exact for whole-millisecond values
pub(crate) fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}
