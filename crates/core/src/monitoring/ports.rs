//! Metric sink port - side-effect hooks for recorded metrics
//!
//! The monitor calls sinks synchronously after each metric has been folded
//! into its state and the state lock has been released. Implementations
//! must be fast and must not fail the caller: a sink that cannot deliver
//! should drop the event and log it.

use std::fmt;

use mealwise_domain::MetricRecord;

/// Why a metric was singled out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricFlag {
    /// Duration exceeded the slow-operation threshold
    Slow,
    /// The operation failed
    Failed,
}

impl MetricFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MetricFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port trait for metric side effects (logs, metrics exporters)
///
/// Both hooks default to no-ops; implement the ones you need.
pub trait MetricSink: Send + Sync {
    /// Called once for every recorded metric
    fn record(&self, _metric: &MetricRecord) {}

    /// Called once per applicable flag for slow or failed metrics
    fn flag(&self, _metric: &MetricRecord, _flag: MetricFlag) {}
}

/// Sink that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetricSink;

impl MetricSink for NoopMetricSink {}
