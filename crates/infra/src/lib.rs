//! # Mealwise Infrastructure
//!
//! Adapters around the monitoring core:
//! - Configuration loading from environment variables and files
//! - Structured logging setup
//! - Metric sinks for `tracing` and the `metrics` facade
//! - Bootstrap helpers that assemble a ready monitor

pub mod bootstrap;
pub mod config;
pub mod observability;

pub use bootstrap::{bootstrap, build_monitor, build_monitor_with_clock};
pub use observability::{MetricsFacadeSink, TracingMetricSink};
