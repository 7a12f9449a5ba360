//! Operation timer - captures one external call
//!
//! A live timer accepts exactly one terminal call: the first of
//! [`complete`](OperationTimer::complete) or [`fail`](OperationTimer::fail)
//! submits a metric and every later call is silently ignored. A timer that
//! is dropped without either records nothing and reports no error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use mealwise_common::resilience::{Clock, SystemClock};
use mealwise_domain::{Metadata, MetricRecord};
use tracing::trace;

use super::monitor::PerformanceMonitor;

/// Timer for a single operation against a service
pub struct OperationTimer<C: Clock = SystemClock> {
    operation: String,
    service: String,
    metadata: Metadata,
    started_at: Instant,
    start_time: DateTime<Utc>,
    clock: Arc<C>,
    /// `None` for timers started while monitoring was disabled
    monitor: Option<PerformanceMonitor<C>>,
    finished: AtomicBool,
}

impl<C: Clock> OperationTimer<C> {
    pub(crate) fn live(
        monitor: PerformanceMonitor<C>,
        clock: Arc<C>,
        operation: String,
        service: String,
        metadata: Metadata,
    ) -> Self {
        Self::start(Some(monitor), clock, operation, service, metadata)
    }

    pub(crate) fn disabled(clock: Arc<C>, operation: String, service: String) -> Self {
        Self::start(None, clock, operation, service, Metadata::new())
    }

    fn start(
        monitor: Option<PerformanceMonitor<C>>,
        clock: Arc<C>,
        operation: String,
        service: String,
        metadata: Metadata,
    ) -> Self {
        Self {
            operation,
            service,
            metadata,
            started_at: clock.now(),
            start_time: clock.utc_now(),
            clock,
            monitor,
            finished: AtomicBool::new(false),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Whether this timer will record a metric when finished
    pub fn is_live(&self) -> bool {
        self.monitor.is_some()
    }

    /// Whether a terminal call has already been accepted
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Time since the timer started; works for disabled timers too
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started_at)
    }

    /// Record a successful outcome
    pub fn complete(&self) {
        self.finish(None, Metadata::new());
    }

    /// Record a successful outcome, merging `extra` over the start metadata
    pub fn complete_with(&self, extra: Metadata) {
        self.finish(None, extra);
    }

    /// Record a failed outcome
    pub fn fail(&self, error_message: impl Into<String>) {
        self.finish(Some(error_message.into()), Metadata::new());
    }

    /// Record a failed outcome, merging `extra` over the start metadata
    pub fn fail_with(&self, error_message: impl Into<String>, extra: Metadata) {
        self.finish(Some(error_message.into()), extra);
    }

    fn finish(&self, error_message: Option<String>, extra: Metadata) {
        let Some(monitor) = &self.monitor else {
            return;
        };

        if self.finished.swap(true, Ordering::AcqRel) {
            trace!(
                operation = %self.operation,
                service = %self.service,
                "Ignoring repeated terminal call on finished timer"
            );
            return;
        }

        let end_time = chrono::Duration::from_std(self.elapsed())
            .ok()
            .and_then(|elapsed| self.start_time.checked_add_signed(elapsed))
            .unwrap_or(self.start_time);

        let mut metadata = self.metadata.clone();
        metadata.extend(extra);

        let metric = match error_message {
            None => MetricRecord::success(
                self.operation.clone(),
                self.service.clone(),
                self.start_time,
                end_time,
                metadata,
            ),
            Some(error_message) => MetricRecord::failure(
                self.operation.clone(),
                self.service.clone(),
                self.start_time,
                end_time,
                error_message,
                metadata,
            ),
        };

        monitor.record(metric);
    }
}

impl<C: Clock> Drop for OperationTimer<C> {
    fn drop(&mut self) {
        if self.monitor.is_some() && !self.is_finished() {
            trace!(
                operation = %self.operation,
                service = %self.service,
                "Timer dropped without completion, no metric recorded"
            );
        }
    }
}

/// Timer that fails itself if dropped unfinished
///
/// Used by the monitor's scoped `execute` helpers so cancellation and
/// panics still produce exactly one metric.
pub(crate) struct ScopedTimer<C: Clock>(OperationTimer<C>);

impl<C: Clock> ScopedTimer<C> {
    pub(crate) fn new(timer: OperationTimer<C>) -> Self {
        Self(timer)
    }

    pub(crate) fn timer(&self) -> &OperationTimer<C> {
        &self.0
    }
}

impl<C: Clock> Drop for ScopedTimer<C> {
    fn drop(&mut self) {
        if !self.0.is_finished() {
            let reason = if std::thread::panicking() {
                "operation panicked"
            } else {
                "operation cancelled"
            };
            self.0.fail(reason);
        }
    }
}
