//! Bounded event buffer with size- and time-triggered flush
//!
//! Non-urgent events queue here and drain through the circuit-breaker
//! gate into the store. The drain takes the whole pending set in one
//! locked step, so a size-triggered drain and a timer-triggered drain
//! can never process overlapping entries — a second trigger arriving
//! mid-flush observes an empty queue and does nothing.
//!
//! A failed or gated entry is always logged to console with its full
//! content before the drain moves on; entries are never silently
//! dropped.

use crate::breaker::CircuitBreaker;
use crate::store::LogStore;
use crate::types::LogEvent;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Outcome counts for one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Entries persisted
    pub written: usize,
    /// Entries whose write failed
    pub failed: usize,
    /// Entries not attempted because the circuit was open
    pub skipped: usize,
}

impl DrainStats {
    /// Entries handled by this pass
    pub fn total(&self) -> usize {
        self.written + self.failed + self.skipped
    }
}

enum WriteOutcome {
    Written,
    Failed,
    Skipped,
}

struct Shared {
    queue: Mutex<Vec<LogEvent>>,
    capacity: usize,
    flush_interval: Duration,
    store: Arc<dyn LogStore>,
    breaker: Arc<CircuitBreaker>,
    shutdown: Notify,
    flusher: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Owner of the pending-event queue and its flush discipline
#[derive(Clone)]
pub struct BufferManager {
    shared: Arc<Shared>,
}

impl BufferManager {
    /// Create a manager draining into `store` through `breaker`
    pub fn new(
        capacity: usize,
        flush_interval: Duration,
        store: Arc<dyn LogStore>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Vec::new()),
                capacity: capacity.max(1),
                flush_interval,
                store,
                breaker,
                shutdown: Notify::new(),
                flusher: Mutex::new(None),
            }),
        }
    }

    fn queue(&self) -> MutexGuard<'_, Vec<LogEvent>> {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event; reaching capacity triggers an immediate drain
    ///
    /// Outside a tokio runtime the drain cannot be spawned; events stay
    /// queued until an explicit `drain_and_flush`.
    pub fn enqueue(&self, event: LogEvent) {
        let at_capacity = {
            let mut queue = self.queue();
            queue.push(event);
            queue.len() >= self.shared.capacity
        };

        if at_capacity {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                tracing::debug!(
                    capacity = self.shared.capacity,
                    "Buffer full, draining ahead of timer"
                );
                let manager = self.clone();
                handle.spawn(async move {
                    manager.drain_and_flush().await;
                });
            }
        }
    }

    /// Pending entries not yet drained
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Atomically take everything queued and write each entry in order
    ///
    /// One failing write records a breaker failure and moves on; the
    /// rest of the batch is still attempted.
    pub async fn drain_and_flush(&self) -> DrainStats {
        let batch = std::mem::take(&mut *self.queue());
        if batch.is_empty() {
            return DrainStats::default();
        }

        let mut stats = DrainStats::default();
        for event in &batch {
            match self.write_gated(event).await {
                WriteOutcome::Written => stats.written += 1,
                WriteOutcome::Failed => stats.failed += 1,
                WriteOutcome::Skipped => stats.skipped += 1,
            }
        }

        tracing::debug!(
            written = stats.written,
            failed = stats.failed,
            skipped = stats.skipped,
            "Buffer drained"
        );
        stats
    }

    /// Write one event through the breaker gate immediately
    ///
    /// The path urgent events take, bypassing the queue.
    pub(crate) async fn write_now(&self, event: LogEvent) {
        self.write_gated(&event).await;
    }

    async fn write_gated(&self, event: &LogEvent) -> WriteOutcome {
        if !self.shared.breaker.can_attempt() {
            tracing::warn!(
                entry = %render_entry(event),
                "Persistence gate open; entry kept on console only"
            );
            return WriteOutcome::Skipped;
        }

        match self.shared.store.write(event).await {
            Ok(()) => {
                self.shared.breaker.record_success();
                WriteOutcome::Written
            }
            Err(e) => {
                self.shared.breaker.record_failure(&e.to_string());
                tracing::error!(
                    error = %e,
                    entry = %render_entry(event),
                    "Failed to persist log entry"
                );
                WriteOutcome::Failed
            }
        }
    }

    /// Start the periodic background flusher
    ///
    /// Returns false when no tokio runtime is available to host it.
    pub fn start_flusher(&self) -> bool {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => return false,
        };

        let manager = self.clone();
        let interval = self.shared.flush_interval;
        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately; the queue is empty then
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.drain_and_flush().await;
                    }
                    _ = manager.shared.shutdown.notified() => {
                        manager.drain_and_flush().await;
                        break;
                    }
                }
            }
        });

        *self
            .shared
            .flusher
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
        true
    }

    /// Stop the flusher and perform one final drain
    pub async fn shutdown(&self) {
        let task = self
            .shared
            .flusher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            self.shared.shutdown.notify_one();
            let _ = task.await;
        }

        // Catch anything enqueued while the flusher was winding down
        self.drain_and_flush().await;
    }
}

fn render_entry(event: &LogEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|_| format!("{:?}", event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::types::LogLevel;

    fn test_event(message: &str) -> LogEvent {
        LogEvent::new(LogLevel::Info, "test", "unit.case", message)
    }

    fn manager_with(
        capacity: usize,
        interval_ms: u64,
        threshold: u32,
    ) -> (BufferManager, Arc<MemoryStore>, Arc<CircuitBreaker>) {
        let store = Arc::new(MemoryStore::default());
        let breaker = Arc::new(CircuitBreaker::new(threshold, Duration::from_secs(60)));
        let manager = BufferManager::new(
            capacity,
            Duration::from_millis(interval_ms),
            store.clone(),
            breaker.clone(),
        );
        (manager, store, breaker)
    }

    #[tokio::test]
    async fn test_capacity_triggers_immediate_drain() {
        let (manager, store, _) = manager_with(3, 60_000, 5);

        manager.enqueue(test_event("a"));
        manager.enqueue(test_event("b"));
        assert_eq!(manager.pending(), 2);

        manager.enqueue(test_event("c"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(manager.pending(), 0);
        assert_eq!(store.event_count().await, 3);
    }

    #[tokio::test]
    async fn test_drain_continues_past_failures() {
        let (manager, store, _) = manager_with(100, 60_000, 10);
        for i in 1..=5 {
            manager.enqueue(test_event(&format!("entry {}", i)));
        }

        store.fail_next(3);
        let stats = manager.drain_and_flush().await;

        assert_eq!(stats.failed, 3);
        assert_eq!(stats.written, 2);
        let persisted = store.events().await;
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].message, "entry 4");
        assert_eq!(persisted[1].message, "entry 5");
    }

    #[tokio::test]
    async fn test_open_circuit_skips_remaining_entries() {
        let (manager, store, breaker) = manager_with(100, 60_000, 2);
        for i in 0..3 {
            manager.enqueue(test_event(&format!("e{}", i)));
        }

        store.set_fail_always(true);
        let stats = manager.drain_and_flush().await;

        // Two failures trip the breaker; the third entry is gated
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(breaker.state(), crate::breaker::CircuitState::Open);
    }

    #[tokio::test]
    async fn test_breaker_success_recorded_on_writes() {
        let (manager, _, breaker) = manager_with(100, 60_000, 5);
        breaker.record_failure("earlier failure");

        manager.enqueue(test_event("ok"));
        manager.drain_and_flush().await;

        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_drains_never_double_process() {
        let (manager, store, _) = manager_with(100, 60_000, 5);
        for i in 0..10 {
            manager.enqueue(test_event(&format!("e{}", i)));
        }

        let (a, b) = tokio::join!(manager.drain_and_flush(), manager.drain_and_flush());
        assert_eq!(a.total() + b.total(), 10);
        assert_eq!(store.event_count().await, 10);
    }

    #[tokio::test]
    async fn test_periodic_flusher_drains_below_capacity() {
        let (manager, store, _) = manager_with(100, 20, 5);
        assert!(manager.start_flusher());

        manager.enqueue(test_event("a"));
        manager.enqueue(test_event("b"));
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(store.event_count().await, 2);
        assert_eq!(manager.pending(), 0);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_performs_final_flush() {
        let (manager, store, _) = manager_with(100, 60_000, 5);
        assert!(manager.start_flusher());

        manager.enqueue(test_event("tail"));
        manager.shutdown().await;

        assert_eq!(store.event_count().await, 1);
        assert_eq!(manager.pending(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_without_flusher_still_drains() {
        let (manager, store, _) = manager_with(100, 60_000, 5);
        manager.enqueue(test_event("tail"));
        manager.shutdown().await;
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_drain_is_a_noop() {
        let (manager, _, _) = manager_with(100, 60_000, 5);
        let stats = manager.drain_and_flush().await;
        assert_eq!(stats, DrainStats::default());
    }
}
