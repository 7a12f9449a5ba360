//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from `MEALWISE_*` environment variables
//! 2. If none are set, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//! 5. If no file exists either, uses the built-in defaults
//!
//! Every source is validated before it is returned.
//!
//! ## Environment Variables
//! - `MEALWISE_MONITOR_ENABLED`: Whether monitoring starts enabled (true/false)
//! - `MEALWISE_RECENT_METRICS_CAPACITY`: Recent-metrics window capacity
//! - `MEALWISE_SLOW_OPERATION_THRESHOLD_MS`: Slow-operation flag threshold
//! - `MEALWISE_DASHBOARD_WINDOW_SECS`: Dashboard lookback in seconds
//! - `MEALWISE_COST_ALERT_THRESHOLD_USD`: Health check cost alert threshold
//! - `MEALWISE_CB_FAILURE_THRESHOLD`: Failures before a breaker opens
//! - `MEALWISE_CB_RECOVERY_TIMEOUT_SECS`: Breaker recovery timeout
//! - `MEALWISE_PRICE_<KEY>`: Unit price override for cost key `<key>`
//!   (e.g. `MEALWISE_PRICE_OPENAI_VISION=0.02`)
//! - `MEALWISE_LOG_LEVEL`: Default log filter directive
//! - `MEALWISE_LOG_FORMAT`: `pretty` or `json`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. The path in `MEALWISE_CONFIG`, if set
//! 2. `./mealwise.{json,toml}` or `./config.{json,toml}` (current directory)
//! 3. `../config.{json,toml}` and `../../config.{json,toml}`
//! 4. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use mealwise_common::error::{CommonError, CommonResult};
use mealwise_domain::{AppConfig, LogFormat, MealwiseError, Result};

const ENV_PREFIX: &str = "MEALWISE_";
const PRICE_PREFIX: &str = "MEALWISE_PRICE_";
const CONFIG_PATH_VAR: &str = "MEALWISE_CONFIG";

/// Load configuration with automatic fallback strategy
///
/// Environment variables win when any are set; otherwise a config file is
/// used; otherwise the defaults.
///
/// # Errors
/// Returns `MealwiseError::Config` if the chosen source is malformed or
/// fails validation.
pub fn load() -> Result<AppConfig> {
    if has_env_overrides() {
        let config = load_from_env()?;
        tracing::info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::info!("No configuration found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load configuration from environment variables
///
/// Unset variables keep their defaults. See module documentation for the
/// complete list.
///
/// # Errors
/// Returns `MealwiseError::Config` if no `MEALWISE_*` variable is set, a
/// value cannot be parsed, or the result fails validation.
pub fn load_from_env() -> Result<AppConfig> {
    if !has_env_overrides() {
        return Err(MealwiseError::Config(
            "No MEALWISE_* environment variables are set".to_string(),
        ));
    }

    let mut config = AppConfig::default();
    let monitor = &mut config.monitor;

    monitor.enabled = env_bool("MEALWISE_MONITOR_ENABLED", monitor.enabled);
    if let Some(capacity) = env_parse("MEALWISE_RECENT_METRICS_CAPACITY")? {
        monitor.recent_metrics_capacity = capacity;
    }
    if let Some(threshold) = env_parse("MEALWISE_SLOW_OPERATION_THRESHOLD_MS")? {
        monitor.slow_operation_threshold_ms = threshold;
    }
    if let Some(window) = env_parse("MEALWISE_DASHBOARD_WINDOW_SECS")? {
        monitor.dashboard_window_secs = window;
    }
    if let Some(threshold) = env_parse("MEALWISE_COST_ALERT_THRESHOLD_USD")? {
        monitor.cost_alert_threshold_usd = threshold;
    }
    if let Some(threshold) = env_parse("MEALWISE_CB_FAILURE_THRESHOLD")? {
        monitor.circuit_breaker.failure_threshold = threshold;
    }
    if let Some(timeout) = env_parse("MEALWISE_CB_RECOVERY_TIMEOUT_SECS")? {
        monitor.circuit_breaker.recovery_timeout_secs = timeout;
    }

    for (key, value) in std::env::vars_os() {
        let (Some(key), Some(value)) = (key.to_str(), value.to_str()) else {
            continue;
        };
        if let Some(cost_key) = key.strip_prefix(PRICE_PREFIX) {
            let price = value.parse::<f64>().map_err(|e| {
                MealwiseError::Config(format!("Invalid price in {}: {}", key, e))
            })?;
            monitor.prices.insert(cost_key.to_ascii_lowercase(), price);
        }
    }

    if let Ok(level) = std::env::var("MEALWISE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(format) = std::env::var("MEALWISE_LOG_FORMAT") {
        config.logging.format = parse_log_format(&format)?;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
/// Missing fields take their defaults.
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `MealwiseError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(MealwiseError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            MealwiseError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| MealwiseError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    let parsed: CommonResult<AppConfig> = match extension {
        "toml" => toml::from_str(contents).map_err(CommonError::from),
        "json" => serde_json::from_str(contents).map_err(CommonError::from),
        _ => {
            return Err(MealwiseError::Config(format!(
                "Unsupported config format: {}",
                extension
            )))
        }
    };

    parsed.map_err(|err| {
        tracing::warn!(
            path = %path.display(),
            error_type = err.error_type_name(),
            "Config file could not be parsed"
        );
        MealwiseError::Config(err.to_string())
    })
}

/// Probe multiple paths for configuration files
///
/// Searches `MEALWISE_CONFIG` first, then the working directory and its
/// parents (up to 2 levels), then the executable's directory.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from) {
        if explicit.exists() {
            return Some(explicit);
        }
        tracing::warn!(path = %explicit.display(), "MEALWISE_CONFIG points to a missing file");
    }

    let mut candidates = Vec::new();

    // Try current working directory
    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidate_files(&cwd));
    }

    // Try relative to executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidate_files(exe_dir));
        }
    }

    // Return first existing candidate
    candidates.into_iter().find(|path| path.exists())
}

fn candidate_files(base: &Path) -> Vec<PathBuf> {
    vec![
        base.join("mealwise.json"),
        base.join("mealwise.toml"),
        base.join("config.json"),
        base.join("config.toml"),
        base.join("../config.json"),
        base.join("../config.toml"),
        base.join("../../config.json"),
        base.join("../../config.toml"),
    ]
}

/// Whether any configuration variable is set (`MEALWISE_CONFIG` excluded)
fn has_env_overrides() -> bool {
    std::env::vars_os().any(|(key, _)| {
        key.to_str().is_some_and(|key| key.starts_with(ENV_PREFIX) && key != CONFIG_PATH_VAR)
    })
}

/// Parse an optional environment variable
///
/// # Errors
/// Returns `MealwiseError::Config` if the variable is set but cannot be
/// parsed as `T`.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| MealwiseError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
///
/// # Returns
/// The parsed boolean value, or `default` if not set.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn parse_log_format(raw: &str) -> Result<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(MealwiseError::Config(format!(
            "Invalid value for MEALWISE_LOG_FORMAT: {} (expected pretty or json)",
            other
        ))),
    }
}
