//! Statistics snapshots produced by the performance monitor
//!
//! This module centralizes the read-side structures handed to dashboards
//! and health endpoints:
//! - Per-service statistics
//! - Circuit breaker status
//! - Dashboard and health check snapshots
//! - Cost summary
//!
//! All of them are owned copies; mutating one never affects monitor state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;

/* -------------------------------------------------------------------------- */
/* Service Statistics */
/* -------------------------------------------------------------------------- */

/// Aggregated statistics for one service
///
/// Durations are in milliseconds. `min`/`max` are `0` until the first
/// metric is recorded and `success_rate` is `0` when `total_calls == 0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatsSnapshot {
    pub service: String,

    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub total_calls: u64,

    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub success_count: u64,

    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub fail_count: u64,

    /// Fraction of successful calls in `[0, 1]`
    pub success_rate: f64,

    pub total_duration_ms: f64,
    pub average_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,

    /// Occurrences per operation name
    #[cfg_attr(feature = "ts-gen", ts(type = "Record<string, number>"))]
    pub operation_counts: BTreeMap<String, u64>,
}

/* -------------------------------------------------------------------------- */
/* Circuit Breaker Status */
/* -------------------------------------------------------------------------- */

/// External view of one service's circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerStatus {
    pub service: String,
    pub is_open: bool,

    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub failure_count: u64,

    pub last_failure_time: Option<DateTime<Utc>>,
}

/* -------------------------------------------------------------------------- */
/* Dashboard */
/* -------------------------------------------------------------------------- */

/// Time-windowed view of recent activity
///
/// Computed only from metrics still held in the bounded recent window, so
/// under heavy traffic it covers less than the nominal lookback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub generated_at: DateTime<Utc>,

    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub total_operations: u64,

    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub success_count: u64,

    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub fail_count: u64,

    pub average_response_time_ms: f64,
    pub per_service_stats: BTreeMap<String, ServiceStatsSnapshot>,
    pub cost_breakdown: BTreeMap<String, f64>,
    pub total_cost_usd: f64,
    pub circuit_breaker_statuses: Vec<CircuitBreakerStatus>,
}

/* -------------------------------------------------------------------------- */
/* Health Check */
/* -------------------------------------------------------------------------- */

/// Overall service health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// At least one circuit breaker is open
    Degraded,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health snapshot for operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub open_circuit_breakers: Vec<String>,
    #[serde(rename = "totalCost24hUsd")]
    pub total_cost_24h_usd: f64,
    pub cost_alert: bool,
    pub timestamp: DateTime<Utc>,
}

/* -------------------------------------------------------------------------- */
/* Cost Summary */
/* -------------------------------------------------------------------------- */

/// Lifetime cost accounting since the last reset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub total_cost_usd: f64,
    pub cost_breakdown: BTreeMap<String, f64>,

    #[cfg_attr(feature = "ts-gen", ts(type = "Record<string, number>"))]
    pub usage_breakdown: BTreeMap<String, u64>,
}
