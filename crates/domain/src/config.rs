//! Configuration structures
//!
//! Every field has a default, so an empty file or an empty environment
//! yields a working configuration. Call [`AppConfig::validate`] after
//! loading from an untrusted source.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COST_ALERT_THRESHOLD_USD, DEFAULT_DASHBOARD_WINDOW_SECS, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_LOG_LEVEL, DEFAULT_RECENT_METRICS_CAPACITY, DEFAULT_RECOVERY_TIMEOUT_SECS,
    DEFAULT_SLOW_OPERATION_THRESHOLD_MS,
};
use crate::errors::{MealwiseError, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validate every section
    ///
    /// # Errors
    /// Returns `MealwiseError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()?;
        self.logging.validate()
    }
}

/// Performance monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Whether monitoring starts enabled
    pub enabled: bool,
    /// Capacity of the recent-metrics window (FIFO eviction beyond it)
    pub recent_metrics_capacity: usize,
    /// Metrics slower than this are flagged to the sinks
    pub slow_operation_threshold_ms: u64,
    /// Lookback used by the dashboard and health check
    pub dashboard_window_secs: u64,
    /// Health check raises `cost_alert` above this windowed cost
    pub cost_alert_threshold_usd: f64,
    pub circuit_breaker: CircuitBreakerSettings,
    /// Unit price overrides keyed by cost key, merged over the built-in table
    pub prices: BTreeMap<String, f64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recent_metrics_capacity: DEFAULT_RECENT_METRICS_CAPACITY,
            slow_operation_threshold_ms: DEFAULT_SLOW_OPERATION_THRESHOLD_MS,
            dashboard_window_secs: DEFAULT_DASHBOARD_WINDOW_SECS,
            cost_alert_threshold_usd: DEFAULT_COST_ALERT_THRESHOLD_USD,
            circuit_breaker: CircuitBreakerSettings::default(),
            prices: BTreeMap::new(),
        }
    }
}

impl MonitorConfig {
    pub fn slow_operation_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_operation_threshold_ms)
    }

    pub fn dashboard_window(&self) -> Duration {
        Duration::from_secs(self.dashboard_window_secs)
    }

    /// Validate monitor settings
    ///
    /// # Errors
    /// Returns `MealwiseError::Config` if the window capacity or dashboard
    /// window is zero, the alert threshold or any price is negative or not
    /// finite, or the breaker settings are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.recent_metrics_capacity == 0 {
            return Err(MealwiseError::Config(
                "monitor.recent_metrics_capacity must be greater than 0".to_string(),
            ));
        }
        if self.dashboard_window_secs == 0 {
            return Err(MealwiseError::Config(
                "monitor.dashboard_window_secs must be greater than 0".to_string(),
            ));
        }
        if !self.cost_alert_threshold_usd.is_finite() || self.cost_alert_threshold_usd < 0.0 {
            return Err(MealwiseError::Config(format!(
                "monitor.cost_alert_threshold_usd must be a non-negative number, got {}",
                self.cost_alert_threshold_usd
            )));
        }
        if let Some((key, price)) =
            self.prices.iter().find(|(_, price)| !price.is_finite() || **price < 0.0)
        {
            return Err(MealwiseError::Config(format!(
                "monitor.prices.{key} must be a non-negative number, got {price}"
            )));
        }
        self.circuit_breaker.validate()
    }
}

/// Per-service circuit breaker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u64,
    pub recovery_timeout_secs: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout_secs: DEFAULT_RECOVERY_TIMEOUT_SECS,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(MealwiseError::Config(
                "monitor.circuit_breaker.failure_threshold must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info` or
    /// `mealwise_core=debug`)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), format: LogFormat::default() }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            return Err(MealwiseError::Config("logging.level must not be empty".to_string()));
        }
        Ok(())
    }
}
