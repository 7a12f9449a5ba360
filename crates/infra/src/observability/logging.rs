//! Structured logging setup
//!
//! `RUST_LOG` wins over the configured level when it is set.

use mealwise_domain::{LogFormat, LoggingConfig, MealwiseError, Result};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
///
/// Call once at application startup.
///
/// # Errors
/// Returns `MealwiseError::Internal` if a global subscriber is already
/// installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().with_target(true).with_thread_ids(true).json())
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    installed.map_err(|e| {
        MealwiseError::Internal(format!("Failed to set global tracing subscriber: {}", e))
    })?;

    tracing::info!(level = %config.level, format = ?config.format, "Structured logging initialized");
    Ok(())
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
