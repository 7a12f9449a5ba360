//! # Mealwise Domain
//!
//! Domain types for the Mealwise resilience and observability core.
//!
//! This crate contains:
//! - The immutable metric record produced by every measured call
//! - Serializable snapshots (service stats, breaker status, dashboard,
//!   health check, cost summary)
//! - Configuration structures with defaults and validation
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other Mealwise crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
