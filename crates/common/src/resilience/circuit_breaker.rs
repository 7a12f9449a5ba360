//! Circuit breaker for guarding calls to unreliable external services
//!
//! A two-state breaker: **CLOSED** lets calls through and counts failures,
//! **OPEN** refuses calls until the recovery timeout has elapsed since the
//! last recorded failure. Recovery is optimistic: once the timeout elapses
//! the breaker closes on the next availability check, without waiting for
//! a probe call to succeed, and the failure counter restarts from zero.
//! There is no half-open state.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};

/// Service name used when a breaker is built without one
const UNNAMED_SERVICE: &str = "default";

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// Breakers and monitors use real system time in production and controlled
/// mock time in tests, so timeout-based behavior can be tested without
/// sleeping.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get the wall clock as a UTC timestamp
    fn utc_now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.system_time())
    }

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Implement Clock for Arc<T> where T: Clock for convenient sharing
impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Mock clock for deterministic testing
///
/// Wall-clock time starts at the UNIX epoch and moves in lockstep with the
/// monotonic instant, so both views advance together.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += duration;
        }
    }

    /// Advance the mock clock by milliseconds (convenience method)
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed = duration;
        }
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|e| *e).unwrap_or(Duration::ZERO)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + self.elapsed()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Errors produced by breaker-guarded execution
///
/// Generic over the underlying operation error type `E` so the original
/// error is preserved as the source.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open, rejecting calls
    #[error("Circuit breaker for '{service}' is open, rejecting calls")]
    CircuitOpen { service: String },

    /// The underlying operation failed
    #[error("Operation failed: {source}")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Whether the call was refused without running the operation
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Unwrap the operation error, if the operation actually ran
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::OperationFailed { source } => Some(source),
        }
    }

    /// Convert into the shared error vocabulary, tagging backend failures
    /// with the service they came from
    pub fn into_common(self, service: &str) -> CommonError {
        match self {
            Self::CircuitOpen { service } => CommonError::circuit_breaker(service),
            Self::OperationFailed { source } => {
                CommonError::backend(service, source.to_string(), false)
            }
        }
    }
}

impl<E> ErrorClassification for ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn is_retryable(&self) -> bool {
        self.is_circuit_open()
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CircuitOpen { .. } => ErrorSeverity::Warning,
            Self::OperationFailed { .. } => ErrorSeverity::Error,
        }
    }
}

/// Result type for breaker-guarded operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests until the recovery timeout elapses
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
        }
    }
}

//==============================================================================
// Configuration
//==============================================================================

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u64,
    /// Time after the last failure before an open circuit closes again
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_timeout: Duration::from_secs(5 * 60) }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> CommonResult<()> {
        if self.failure_threshold == 0 {
            return Err(CommonError::config_field(
                "failure_threshold",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u64) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    /// Set a custom clock, building a breaker directly (useful for testing)
    pub fn clock<C: Clock>(self, clock: C) -> CircuitBreakerBuilderWithClock<C> {
        CircuitBreakerBuilderWithClock { config: self.config, clock, service: None }
    }

    pub fn build(self) -> CommonResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Builder with custom clock that builds a CircuitBreaker directly
pub struct CircuitBreakerBuilderWithClock<C: Clock> {
    config: CircuitBreakerConfig,
    clock: C,
    service: Option<String>,
}

impl<C: Clock> CircuitBreakerBuilderWithClock<C> {
    pub fn failure_threshold(mut self, threshold: u64) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn build(self) -> CommonResult<CircuitBreaker<C>> {
        let breaker = CircuitBreaker::with_clock(self.config, self.clock)?;
        Ok(match self.service {
            Some(service) => breaker.named(service),
            None => breaker,
        })
    }
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Snapshot of a breaker for health reporting
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerMetrics {
    pub service: String,
    pub state: CircuitState,
    pub failure_count: u64,
    pub failure_threshold: u64,
    pub recovery_timeout: Duration,
    pub last_failure_time: Option<DateTime<Utc>>,
    /// Remaining time before an open breaker recovers (`None` when closed)
    pub retry_after: Option<Duration>,
}

impl CircuitBreakerMetrics {
    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }
}

#[derive(Debug, Clone, Copy)]
struct FailureMark {
    instant: Instant,
    at: DateTime<Utc>,
}

/// Two-state circuit breaker with optimistic recovery
///
/// Cloning yields a handle to the same breaker state.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    service: String,
    config: CircuitBreakerConfig,
    state: Arc<RwLock<CircuitState>>,
    failure_count: Arc<AtomicU64>,
    last_failure: Arc<RwLock<Option<FailureMark>>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("service", &self.service)
            .field("config", &self.config)
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            failure_count: Arc::clone(&self.failure_count),
            last_failure: Arc::clone(&self.last_failure),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker with the given configuration using system
    /// clock
    pub fn new(config: CircuitBreakerConfig) -> CommonResult<Self> {
        Self::with_clock(config, SystemClock)
    }

    /// Create a circuit breaker with default configuration
    pub fn with_defaults() -> Self {
        Self::from_parts(CircuitBreakerConfig::default(), SystemClock)
    }

    /// Create a circuit breaker using the builder pattern
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> CommonResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, clock))
    }

    fn from_parts(config: CircuitBreakerConfig, clock: C) -> Self {
        Self {
            service: UNNAMED_SERVICE.to_string(),
            config,
            state: Arc::new(RwLock::new(CircuitState::Closed)),
            failure_count: Arc::new(AtomicU64::new(0)),
            last_failure: Arc::new(RwLock::new(None)),
            clock: Arc::new(clock),
        }
    }

    /// Attach the name of the guarded service (used in logs and errors)
    pub fn named(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Create an independent, closed breaker for another service that shares
    /// this breaker's configuration and clock
    pub fn fresh_for(&self, service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            config: self.config.clone(),
            state: Arc::new(RwLock::new(CircuitState::Closed)),
            failure_count: Arc::new(AtomicU64::new(0)),
            last_failure: Arc::new(RwLock::new(None)),
            clock: Arc::clone(&self.clock),
        }
    }

    /// Name of the guarded service
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Breaker configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Check if the circuit breaker allows execution
    ///
    /// A closed breaker always allows. An open breaker allows once the
    /// recovery timeout has elapsed since the last failure, closing itself
    /// in the process; until then it refuses.
    pub fn can_execute(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let Some(mark) = self.last_failure() else {
                    // Open without a failure mark: nothing to wait for.
                    self.close();
                    return true;
                };

                let elapsed = self.clock.now().saturating_duration_since(mark.instant);
                if elapsed >= self.config.recovery_timeout {
                    self.close();
                    info!(
                        service = %self.service,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Circuit breaker recovery timeout elapsed, closing"
                    );
                    true
                } else {
                    debug!(service = %self.service, "Circuit breaker rejecting call");
                    false
                }
            }
        }
    }

    /// Check whether the breaker is currently open, without attempting
    /// recovery
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Record a successful operation
    ///
    /// Success always returns the breaker to CLOSED and clears the failure
    /// history.
    pub fn record_success(&self) {
        if self.is_open() {
            debug!(service = %self.service, "Success recorded while open, closing circuit");
        }
        self.close();
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        let failure_count = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
        self.set_last_failure(Some(FailureMark {
            instant: self.clock.now(),
            at: self.clock.utc_now(),
        }));

        if failure_count >= self.config.failure_threshold && !self.is_open() {
            self.set_state(CircuitState::Open);
            warn!(
                service = %self.service,
                failures = failure_count,
                threshold = self.config.failure_threshold,
                "Circuit breaker opened"
            );
        }
    }

    /// Execute an operation with circuit breaker protection
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.can_execute() {
            return Err(ResilienceError::CircuitOpen { service: self.service.clone() });
        }

        match operation().await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(error) => {
                self.record_failure();
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Execute a synchronous operation with circuit breaker protection
    pub fn call<F, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.can_execute() {
            return Err(ResilienceError::CircuitOpen { service: self.service.clone() });
        }

        match operation() {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(error) => {
                self.record_failure();
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Get the current state of the circuit breaker
    ///
    /// Handles poisoned locks by returning the state from the poisoned data.
    pub fn state(&self) -> CircuitState {
        match self.state.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn!(service = %self.service, "Circuit breaker state lock poisoned during read");
                *poisoned.into_inner()
            }
        }
    }

    /// Current consecutive failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Acquire)
    }

    /// Wall-clock time of the most recent failure, if any
    pub fn last_failure_time(&self) -> Option<DateTime<Utc>> {
        self.last_failure().map(|mark| mark.at)
    }

    /// Remaining time before an open breaker recovers
    pub fn retry_after(&self) -> Option<Duration> {
        if !self.is_open() {
            return None;
        }
        let mark = self.last_failure()?;
        let elapsed = self.clock.now().saturating_duration_since(mark.instant);
        Some(self.config.recovery_timeout.saturating_sub(elapsed))
    }

    /// Get circuit breaker metrics
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            service: self.service.clone(),
            state: self.state(),
            failure_count: self.failure_count(),
            failure_threshold: self.config.failure_threshold,
            recovery_timeout: self.config.recovery_timeout,
            last_failure_time: self.last_failure_time(),
            retry_after: self.retry_after(),
        }
    }

    /// Reset the circuit breaker to closed state regardless of history
    pub fn reset(&self) {
        self.close();
        info!(service = %self.service, "Circuit breaker manually reset to closed state");
    }

    fn close(&self) {
        self.failure_count.store(0, Ordering::Release);
        self.set_last_failure(None);
        self.set_state(CircuitState::Closed);
    }

    fn set_state(&self, next: CircuitState) {
        match self.state.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => {
                warn!(service = %self.service, "Circuit breaker state lock poisoned during write");
                *poisoned.into_inner() = next;
            }
        }
    }

    fn last_failure(&self) -> Option<FailureMark> {
        match self.last_failure.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_last_failure(&self, mark: Option<FailureMark>) {
        match self.last_failure.write() {
            Ok(mut guard) => *guard = mark,
            Err(poisoned) => *poisoned.into_inner() = mark,
        }
    }
}
