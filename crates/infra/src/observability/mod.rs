//! Observability adapters
//!
//! - `logging`: global tracing subscriber setup
//! - `sink`: [`MetricSink`](mealwise_core::MetricSink) implementations
//! - `telemetry`: metric names emitted through the `metrics` facade

pub mod logging;
pub mod sink;
pub mod telemetry;

pub use sink::{MetricsFacadeSink, TracingMetricSink};
