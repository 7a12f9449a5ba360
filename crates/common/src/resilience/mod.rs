//! Resilience patterns for fault tolerance
//!
//! This module provides the circuit breaker used to stop hammering a failing
//! external dependency, along with the [`Clock`] abstraction that lets
//! timeout-driven behavior be tested deterministically with [`MockClock`].

pub mod circuit_breaker;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerBuilderWithClock, CircuitBreakerConfig,
    CircuitBreakerConfigBuilder, CircuitBreakerMetrics, CircuitState, Clock, MockClock,
    ResilienceError, ResilienceResult, SystemClock,
};
