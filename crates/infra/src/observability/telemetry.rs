//! Telemetry metric name constants.
//!
//! Metric names emitted by [`MetricsFacadeSink`](super::MetricsFacadeSink).
//! The host application installs its own `metrics` recorder; without one,
//! every metric call is a no-op.
//!
//! # Naming
//!
//! All metrics are prefixed with `mealwise_`. Counters end in `_total`,
//! histograms carry their unit (`_seconds`).
//!
//! # Common labels
//!
//! - `service` - external dependency name (e.g. "ai_inference")
//! - `operation` - operation name within the service
//! - `status` - outcome: "ok" or "error"
//! - `flag` - "slow" or "failed"

/// Total operations recorded by the monitor.
///
/// Labels: `service`, `operation`, `status`.
pub const OPERATIONS_TOTAL: &str = "mealwise_operations_total";

/// Operation duration in seconds.
///
/// Labels: `service`, `operation`.
pub const OPERATION_DURATION_SECONDS: &str = "mealwise_operation_duration_seconds";

/// Total metrics flagged as slow or failed.
///
/// Labels: `service`, `operation`, `flag`.
pub const FLAGGED_OPERATIONS_TOTAL: &str = "mealwise_flagged_operations_total";

pub(crate) const STATUS_OK: &str = "ok";
pub(crate) const STATUS_ERROR: &str = "error";
