//! # Mealwise Core
//!
//! Pure monitoring and resilience logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Per-service statistics aggregation
//! - Cost accounting and the cost attribution heuristic
//! - The performance monitor coordinator and its operation timers
//! - Port interfaces (traits) for metric sinks
//!
//! ## Architecture Principles
//! - Only depends on `mealwise-common` and `mealwise-domain`
//! - No I/O; every operation is bounded in-memory work
//! - Side effects are delegated to [`MetricSink`] implementations

pub mod monitoring;

pub use monitoring::{
    CostAttributor, CostTracker, HeuristicCostAttributor, MetricFlag, MetricSink,
    NoopMetricSink, OperationTimer, PerformanceMonitor, PerformanceMonitorBuilder, PriceTable,
    ServiceStats,
};
