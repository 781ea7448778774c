//! # logpipe
//!
//! Buffered, fault-tolerant diagnostic log pipeline with PII redaction
//! and circuit-breaker guarded persistence.
//!
//! ## Overview
//!
//! `logpipe` ingests structured diagnostic events from a running
//! service and persists them through a pluggable append-only store —
//! without ever blocking or erroring the caller, even while the backend
//! is down. Error-grade events take an immediate fire-and-forget write
//! path; everything else batches through a bounded buffer with size-
//! and time-triggered flushing. A circuit breaker suspends writes after
//! repeated failures and probes for recovery after a cooldown. Console
//! output (via `tracing`) always happens and is the fallback when
//! persistence degrades.
//!
//! ## Quick Start
//!
//! ```rust
//! use logpipe::{EmitContext, LogLevel, LogPipeline, PipelineConfig};
//! use logpipe::MemoryStore;
//!
//! # async fn example() -> logpipe::Result<()> {
//! let pipeline = LogPipeline::new(PipelineConfig::default(), MemoryStore::default())?;
//!
//! // PII in the message is masked before the event exists
//! pipeline.emit(
//!     LogLevel::Info,
//!     "billing",
//!     "quote.calculated",
//!     "Quote ready for customer@example.com",
//!     EmitContext::new().with_correlation_id("req-42"),
//! );
//!
//! let stats = pipeline.flush().await;
//! println!("persisted {} events", stats.written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Stores
//!
//! - **memory** — In-memory store for testing and single-process use
//! - **jsonl** — Durable append-only JSONL files with size rotation
//!
//! ## Architecture
//!
//! - **LogStore** trait — the persistence seam all backends implement
//! - **LogPipeline** — the `emit` surface: filter, correlate, redact,
//!   console, then route to the immediate path or the buffer
//! - **BufferManager** — bounded queue, atomic drain, periodic flusher
//! - **CircuitBreaker** — Closed/Open/Half-Open gate on backend writes
//! - **correlation** — scoped ids grouping events of one operation
//! - **PerfTracker** — one performance metric per tracked operation

pub mod breaker;
pub mod buffer;
pub mod config;
pub mod correlation;
pub mod error;
pub mod perf;
pub mod pipeline;
pub mod redact;
pub mod store;
pub mod types;

// Re-export core types
pub use breaker::{CircuitBreaker, CircuitSnapshot, CircuitState, FailureCause};
pub use buffer::{BufferManager, DrainStats};
pub use config::PipelineConfig;
pub use correlation::{Correlated, CorrelationGuard};
pub use error::{LogError, Result};
pub use perf::{PerfTimer, PerfTracker};
pub use pipeline::LogPipeline;
pub use redact::Redactor;
pub use types::{EmitContext, LogEvent, LogLevel, PerformanceMetric};

// Re-export stores for convenience
pub use store::jsonl::{JsonlConfig, JsonlStore};
pub use store::memory::MemoryStore;
pub use store::{LogStore, StoreInfo};
