//! Persistence adapter trait — the seam to the durable backend
//!
//! All backends implement `LogStore` to provide append-only, one
//! record-per-call persistence for log events and performance metrics.
//! The pipeline never talks to a concrete backend directly.

use crate::error::Result;
use crate::types::{LogEvent, PerformanceMetric};
use async_trait::async_trait;

pub mod jsonl;
pub mod memory;

/// Append-only store for diagnostic records
///
/// Implementations must be safe to call concurrently; the pipeline
/// writes from the flush task and the immediate path at the same time.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one log event
    async fn write(&self, event: &LogEvent) -> Result<()>;

    /// Append one performance metric
    async fn write_metric(&self, metric: &PerformanceMetric) -> Result<()>;

    /// Store status (record counts, etc.)
    async fn info(&self) -> Result<StoreInfo>;

    /// Store name (e.g., "memory", "jsonl")
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: LogStore + ?Sized> LogStore for std::sync::Arc<T> {
    async fn write(&self, event: &LogEvent) -> Result<()> {
        (**self).write(event).await
    }

    async fn write_metric(&self, metric: &PerformanceMetric) -> Result<()> {
        (**self).write_metric(metric).await
    }

    async fn info(&self) -> Result<StoreInfo> {
        (**self).info().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Store status information
#[derive(Debug, Clone)]
pub struct StoreInfo {
    /// Store name
    pub store: String,
    /// Log events written
    pub events: u64,
    /// Performance metrics written
    pub metrics: u64,
}
