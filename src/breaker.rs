//! Circuit breaker guarding the persistence backend
//!
//! One canonical state machine; every write path (buffered drain and
//! the immediate path for urgent events) routes through the same
//! instance. States:
//!
//! ```text
//! Closed    -> Open:      failure count reaches threshold
//! Open      -> Half-Open: first eligibility check at/after cooldown
//! Half-Open -> Closed:    next recorded success
//! Half-Open -> Open:      next recorded failure (fresh cooldown)
//! ```
//!
//! The Open -> Half-Open transition is a side effect of `can_attempt`,
//! not of a timer. Half-Open does not limit concurrent trial attempts;
//! every `can_attempt` call before an outcome lands returns true.

use crate::types::now_millis;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Capacity of the recent-failure diagnostic ring
pub const MAX_RECENT_FAILURES: usize = 10;

/// Health state of the persistence path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CircuitState {
    /// Normal operation, writes permitted
    Closed,
    /// Backend assumed down, writes fail fast
    Open,
    /// Cooldown elapsed, trial writes permitted
    HalfOpen,
}

/// One remembered failure cause
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureCause {
    /// Failure message as recorded
    pub message: String,
    /// Unix timestamp in milliseconds
    pub at: u64,
}

/// Externally visible diagnostics — state, counters, recent causes
///
/// Serializable for an admin/health endpoint; the pipeline exposes it
/// through `circuit_snapshot()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<u64>,
    pub recent_failures: Vec<FailureCause>,
}

struct Inner {
    state: CircuitState,
    failures: u32,
    last_failure_at: Option<u64>,
    next_attempt: Option<Instant>,
    next_attempt_at: Option<u64>,
    recent: VecDeque<FailureCause>,
}

/// Failure-detection state machine for the persistence backend
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a breaker with the given failure threshold and cooldown
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                last_failure_at: None,
                next_attempt: None,
                next_attempt_at: None,
                recent: VecDeque::with_capacity(MAX_RECENT_FAILURES),
            }),
        }
    }

    // A panicked holder cannot leave the state machine half-updated in a
    // way that matters here; recover the guard rather than propagate.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a write may be attempted right now
    ///
    /// In Open state, the first call at or past the cooldown deadline
    /// flips the state to Half-Open and returns true.
    pub fn can_attempt(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => match inner.next_attempt {
                Some(at) if Instant::now() >= at => {
                    inner.state = CircuitState::HalfOpen;
                    tracing::info!(
                        failures = inner.failures,
                        "Circuit half-open, trial writes permitted"
                    );
                    true
                }
                _ => false,
            },
        }
    }

    /// Record a successful write
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => inner.failures = 0,
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failures = 0;
                inner.next_attempt = None;
                inner.next_attempt_at = None;
                tracing::info!("Circuit closed after successful trial write");
            }
            // No attempt should have been permitted; nothing to update
            CircuitState::Open => {}
        }
    }

    /// Record a failed write and its cause
    pub fn record_failure(&self, cause: &str) {
        let mut inner = self.lock();
        inner.failures += 1;
        inner.last_failure_at = Some(now_millis());

        if inner.recent.len() >= MAX_RECENT_FAILURES {
            inner.recent.pop_front();
        }
        inner.recent.push_back(FailureCause {
            message: cause.to_string(),
            at: now_millis(),
        });

        let should_trip = matches!(
            inner.state,
            CircuitState::Closed | CircuitState::HalfOpen
        ) && inner.failures >= self.threshold;

        if should_trip {
            inner.state = CircuitState::Open;
            inner.next_attempt = Some(Instant::now() + self.cooldown);
            inner.next_attempt_at = Some(now_millis() + self.cooldown.as_millis() as u64);
            tracing::warn!(
                failures = inner.failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                cause,
                "Circuit opened, persistence writes suspended"
            );
        }
    }

    /// Current state without side effects
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Current consecutive-failure count
    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    /// Diagnostic snapshot for the admin surface
    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            state: inner.state,
            failure_count: inner.failures,
            last_failure_at: inner.last_failure_at,
            next_attempt_at: inner.next_attempt_at,
            recent_failures: inner.recent.iter().cloned().collect(),
        }
    }

    /// Manual reset to Closed, clearing counters, timers, and history
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.last_failure_at = None;
        inner.next_attempt = None;
        inner.next_attempt_at = None;
        inner.recent.clear();
        tracing::info!("Circuit manually reset to closed");
    }
}
