//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Mealwise
///
/// The monitoring core itself never fails on normal inputs; these variants
/// cover configuration, construction and bootstrap failures.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum MealwiseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Mealwise operations
pub type Result<T> = std::result::Result<T, MealwiseError>;
