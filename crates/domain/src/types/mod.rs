//! Domain data types
//!
//! - [`metrics`]: the immutable record of one completed operation
//! - [`stats`]: serializable snapshots for dashboards and health checks

pub mod metrics;
pub mod stats;

pub use metrics::{Metadata, MetricRecord, UNSPECIFIED_ERROR};
pub use stats::{
    CircuitBreakerStatus, CostSummary, DashboardData, HealthCheck, HealthStatus,
    ServiceStatsSnapshot,
};
