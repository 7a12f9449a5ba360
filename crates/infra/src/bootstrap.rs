//! Application bootstrap
//!
//! Wires the loaded configuration into a ready [`PerformanceMonitor`] with
//! the tracing and `metrics` facade sinks attached.

use std::sync::Arc;

use mealwise_common::resilience::Clock;
use mealwise_core::PerformanceMonitor;
use mealwise_domain::{AppConfig, MonitorConfig, Result};

use crate::config;
use crate::observability::{logging, MetricsFacadeSink, TracingMetricSink};

/// Build a monitor on the system clock with the standard sinks
///
/// # Errors
/// Returns `MealwiseError::Config` if `config` is invalid.
pub fn build_monitor(config: &MonitorConfig) -> Result<PerformanceMonitor> {
    PerformanceMonitor::builder(config.clone())
        .sink(Arc::new(TracingMetricSink))
        .sink(Arc::new(MetricsFacadeSink))
        .build()
}

/// Build a monitor on a custom clock with the standard sinks
///
/// # Errors
/// Returns `MealwiseError::Config` if `config` is invalid.
pub fn build_monitor_with_clock<C: Clock>(
    config: &MonitorConfig,
    clock: C,
) -> Result<PerformanceMonitor<C>> {
    PerformanceMonitor::builder(config.clone())
        .clock(clock)
        .sink(Arc::new(TracingMetricSink))
        .sink(Arc::new(MetricsFacadeSink))
        .build()
}

/// Load configuration, initialize logging and build the monitor
///
/// # Errors
/// Returns an error if the configuration cannot be loaded, logging is
/// already initialized, or the monitor cannot be built.
pub fn bootstrap() -> Result<(AppConfig, PerformanceMonitor)> {
    let app_config = config::load()?;
    logging::init(&app_config.logging)?;
    let monitor = build_monitor(&app_config.monitor)?;
    Ok((app_config, monitor))
}
