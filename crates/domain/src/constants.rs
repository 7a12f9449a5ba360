//! Application constants
//!
//! Centralized location for the monitoring defaults and well-known service
//! names.

// Monitor defaults
pub const DEFAULT_RECENT_METRICS_CAPACITY: usize = 1000;
pub const DEFAULT_SLOW_OPERATION_THRESHOLD_MS: u64 = 5_000;
pub const DEFAULT_DASHBOARD_WINDOW_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_COST_ALERT_THRESHOLD_USD: f64 = 10.0;

// Circuit breaker defaults
pub const DEFAULT_FAILURE_THRESHOLD: u64 = 5;
pub const DEFAULT_RECOVERY_TIMEOUT_SECS: u64 = 5 * 60;

// Logging defaults
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Well-known services measured by the app
pub const SERVICE_AI_INFERENCE: &str = "ai_inference";
pub const SERVICE_VECTOR_SEARCH: &str = "vector_search";
pub const SERVICE_NUTRITION_DB: &str = "nutrition_db";
pub const SERVICE_REMOTE_DB: &str = "firestore";
