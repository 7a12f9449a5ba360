//! Common error types shared by the Mealwise crates
//!
//! The monitoring core never fails on normal inputs, so this vocabulary
//! only covers the edges: configuration validation, circuit-breaker
//! rejections surfaced to callers, failures of the guarded call itself,
//! and parse failures while loading configuration files.
//!
//! Crate-specific errors compose with [`CommonError`] rather than duplicate
//! its variants:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum SinkError {
//!     #[error("Sink rejected metric: {0}")]
//!     Rejected(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Error variants that appear across multiple crates
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommonError {
    #[error("Configuration error{}: {message}", in_field(.field))]
    Config { message: String, field: Option<String> },

    /// Circuit breaker refused the call
    #[error("Circuit breaker open for '{service}'{}", retry_hint(.retry_after))]
    CircuitBreakerOpen { service: String, retry_after: Option<Duration> },

    #[error("Serialization error ({format}): {message}")]
    Serialization { format: String, message: String },

    /// External dependency reported a failure
    #[error("Backend error from '{service}': {message}")]
    Backend { service: String, message: String, is_retryable: bool },
}

fn in_field(field: &Option<String>) -> String {
    field.as_ref().map(|f| format!(" in field '{f}'")).unwrap_or_default()
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after.map(|d| format!(" (retry in {d:?})")).unwrap_or_default()
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::CircuitBreakerOpen { .. } => true,
            Self::Backend { is_retryable, .. } => *is_retryable,
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CircuitBreakerOpen { .. } => ErrorSeverity::Warning,
            Self::Config { .. } | Self::Serialization { .. } | Self::Backend { .. } => {
                ErrorSeverity::Error
            }
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitBreakerOpen { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl CommonError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Configuration error pinned to a named field
    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    pub fn circuit_breaker(service: impl Into<String>) -> Self {
        Self::CircuitBreakerOpen { service: service.into(), retry_after: None }
    }

    pub fn circuit_breaker_with_retry(service: impl Into<String>, retry_after: Duration) -> Self {
        Self::CircuitBreakerOpen { service: service.into(), retry_after: Some(retry_after) }
    }

    pub fn serialization(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization { format: format.into(), message: message.into() }
    }

    pub fn backend(service: impl Into<String>, message: impl Into<String>, is_retryable: bool) -> Self {
        Self::Backend { service: service.into(), message: message.into(), is_retryable }
    }

    /// Short, stable name of the variant for structured log fields
    pub fn error_type_name(&self) -> &'static str {
        match self {
            Self::Config { .. } => "Config",
            Self::CircuitBreakerOpen { .. } => "CircuitBreakerOpen",
            Self::Serialization { .. } => "Serialization",
            Self::Backend { .. } => "Backend",
        }
    }
}

/// Classify errors by retryability and severity
pub trait ErrorClassification {
    /// Transient failures worth retrying later, like an open breaker
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    /// Suggested delay before retrying, if known
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Severity scale used in log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("JSON", err.to_string())
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization("TOML", err.to_string())
    }
}
