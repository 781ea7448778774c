//! In-memory store for development and testing
//!
//! Keeps records in bounded vectors and supports injected write
//! failures so breaker and flush behavior can be exercised without a
//! real backend.

use crate::error::{LogError, Result};
use crate::store::{LogStore, StoreInfo};
use crate::types::{LogEvent, PerformanceMetric};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory `LogStore` implementation
pub struct MemoryStore {
    events: Arc<RwLock<Vec<LogEvent>>>,
    metrics: Arc<RwLock<Vec<PerformanceMetric>>>,
    max_records: usize,
    fail_next: AtomicU32,
    fail_always: AtomicBool,
}

impl MemoryStore {
    /// Create a store retaining at most `max_records` of each kind
    pub fn new(max_records: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            metrics: Arc::new(RwLock::new(Vec::new())),
            max_records,
            fail_next: AtomicU32::new(0),
            fail_always: AtomicBool::new(false),
        }
    }

    /// Make the next `n` writes fail with a store error
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Make every write fail until turned off (simulated outage)
    pub fn set_fail_always(&self, failing: bool) {
        self.fail_always.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of stored events
    pub async fn events(&self) -> Vec<LogEvent> {
        self.events.read().await.clone()
    }

    /// Snapshot of stored metrics
    pub async fn metrics(&self) -> Vec<PerformanceMetric> {
        self.metrics.read().await.clone()
    }

    /// Number of stored events
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    fn check_injected_failure(&self) -> Result<()> {
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(LogError::store("injected outage"));
        }
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(LogError::store("injected failure"));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn write(&self, event: &LogEvent) -> Result<()> {
        self.check_injected_failure()?;

        let mut events = self.events.write().await;
        events.push(event.clone());

        if self.max_records > 0 && events.len() > self.max_records {
            let drain_count = events.len() - self.max_records;
            events.drain(..drain_count);
        }

        Ok(())
    }

    async fn write_metric(&self, metric: &PerformanceMetric) -> Result<()> {
        self.check_injected_failure()?;

        let mut metrics = self.metrics.write().await;
        metrics.push(metric.clone());

        if self.max_records > 0 && metrics.len() > self.max_records {
            let drain_count = metrics.len() - self.max_records;
            metrics.drain(..drain_count);
        }

        Ok(())
    }

    async fn info(&self) -> Result<StoreInfo> {
        Ok(StoreInfo {
            store: "memory".to_string(),
            events: self.events.read().await.len() as u64,
            metrics: self.metrics.read().await.len() as u64,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
