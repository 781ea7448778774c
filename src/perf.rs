//! Performance-metric capture
//!
//! A second producer of the persistence interface, structurally
//! parallel to the event pipeline but independent of the buffer and of
//! the circuit breaker: one metric per completed operation, written
//! best-effort. A failed metric write is swallowed and logged to
//! console only — metrics never affect request handling.

use crate::correlation;
use crate::redact::Redactor;
use crate::store::LogStore;
use crate::types::{now_millis, PerformanceMetric};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Factory for per-operation timers
pub struct PerfTracker {
    store: Arc<dyn LogStore>,
    redactor: Arc<Redactor>,
    local_mode: bool,
}

impl PerfTracker {
    /// Create a tracker writing through `store`
    pub fn new(store: Arc<dyn LogStore>, redactor: Arc<Redactor>, local_mode: bool) -> Self {
        Self {
            store,
            redactor,
            local_mode,
        }
    }

    /// Begin timing one operation
    pub fn start(&self, endpoint: impl Into<String>, method: impl Into<String>) -> PerfTimer {
        PerfTimer {
            store: self.store.clone(),
            redactor: self.redactor.clone(),
            local_mode: self.local_mode,
            endpoint: endpoint.into(),
            method: method.into(),
            started: Instant::now(),
            backend_started: None,
            backend_total: Duration::ZERO,
            user_email: None,
        }
    }
}

/// Live timer for one tracked operation
///
/// Mark backend-call boundaries as they happen; `complete` computes the
/// total and backend durations and persists a single
/// [`PerformanceMetric`].
pub struct PerfTimer {
    store: Arc<dyn LogStore>,
    redactor: Arc<Redactor>,
    local_mode: bool,
    endpoint: String,
    method: String,
    started: Instant,
    backend_started: Option<Instant>,
    backend_total: Duration,
    user_email: Option<String>,
}

impl PerfTimer {
    /// Attach the acting user's identifier (redacted before persisting)
    pub fn with_user_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    /// Mark the start of a backend call
    pub fn backend_call_start(&mut self) {
        if self.backend_started.is_none() {
            self.backend_started = Some(Instant::now());
        }
    }

    /// Mark the end of a backend call; segments accumulate
    pub fn backend_call_end(&mut self) {
        if let Some(started) = self.backend_started.take() {
            self.backend_total += started.elapsed();
        }
    }

    /// Finish the operation and persist one metric record
    ///
    /// Never fails: a store error is logged at `warn` and swallowed.
    pub async fn complete(mut self, status_code: u16) {
        // A dangling backend mark counts up to completion time
        self.backend_call_end();

        let backend_ms = if self.backend_total > Duration::ZERO {
            Some(self.backend_total.as_millis() as u64)
        } else {
            None
        };

        let metric = PerformanceMetric {
            endpoint: self.endpoint,
            method: self.method,
            duration_ms: self.started.elapsed().as_millis() as u64,
            backend_ms,
            status_code,
            user_email: self.user_email.map(|e| self.redactor.redact(&e)),
            correlation_id: correlation::current(),
            timestamp: now_millis(),
        };

        tracing::debug!(
            endpoint = %metric.endpoint,
            method = %metric.method,
            duration_ms = metric.duration_ms,
            status = metric.status_code,
            "Operation timed"
        );

        if self.local_mode {
            return;
        }

        if let Err(e) = self.store.write_metric(&metric).await {
            tracing::warn!(
                error = %e,
                endpoint = %metric.endpoint,
                "Metric write failed; record dropped"
            );
        }
    }
}
