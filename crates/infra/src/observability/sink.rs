//! Metric sink adapters
//!
//! Implementations of [`MetricSink`] for the two observability backends
//! the workspace uses: `tracing` events and the `metrics` facade.

use mealwise_core::{MetricFlag, MetricSink};
use mealwise_domain::MetricRecord;
use tracing::{debug, warn};

use super::telemetry;

/// Logs flagged metrics at `warn` and every metric at `debug`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetricSink;

impl MetricSink for TracingMetricSink {
    fn record(&self, metric: &MetricRecord) {
        debug!(
            service = metric.service(),
            operation = metric.operation(),
            duration_ms = metric.duration_ms(),
            success = metric.is_success(),
            "Recorded operation metric"
        );
    }

    fn flag(&self, metric: &MetricRecord, flag: MetricFlag) {
        match flag {
            MetricFlag::Slow => warn!(
                service = metric.service(),
                operation = metric.operation(),
                duration_ms = metric.duration_ms(),
                "Slow operation detected"
            ),
            MetricFlag::Failed => warn!(
                service = metric.service(),
                operation = metric.operation(),
                error = metric.error_message().unwrap_or_default(),
                "Operation failed"
            ),
        }
    }
}

/// Forwards metrics to whatever `metrics` recorder the host installed
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsFacadeSink;

impl MetricSink for MetricsFacadeSink {
    fn record(&self, metric: &MetricRecord) {
        let status = if metric.is_success() { telemetry::STATUS_OK } else { telemetry::STATUS_ERROR };

        metrics::counter!(telemetry::OPERATIONS_TOTAL,
            "service" => metric.service().to_owned(),
            "operation" => metric.operation().to_owned(),
            "status" => status,
        )
        .increment(1);

        metrics::histogram!(telemetry::OPERATION_DURATION_SECONDS,
            "service" => metric.service().to_owned(),
            "operation" => metric.operation().to_owned(),
        )
        .record(metric.duration().as_secs_f64());
    }

    fn flag(&self, metric: &MetricRecord, flag: MetricFlag) {
        metrics::counter!(telemetry::FLAGGED_OPERATIONS_TOTAL,
            "service" => metric.service().to_owned(),
            "operation" => metric.operation().to_owned(),
            "flag" => flag.as_str(),
        )
        .increment(1);
    }
}
