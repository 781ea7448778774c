//! The log pipeline — the crate's public emit surface
//!
//! `emit` is synchronous, infallible, and never blocks on I/O: it
//! filters, resolves correlation, redacts, always writes to the console
//! sink, then routes the event either to the immediate write path
//! (error-grade severities) or into the buffer. Persistence problems
//! degrade log durability, never the caller.

use crate::breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
use crate::buffer::{BufferManager, DrainStats};
use crate::config::PipelineConfig;
use crate::correlation;
use crate::error::Result;
use crate::perf::{PerfTimer, PerfTracker};
use crate::redact::Redactor;
use crate::store::{LogStore, StoreInfo};
use crate::types::{EmitContext, LogEvent, LogLevel};
use std::sync::Arc;

/// Buffered, breaker-guarded diagnostic pipeline over a pluggable store
///
/// Owns every piece of shared state (buffer, circuit, redactor) —
/// nothing module-global. Cheap to share behind an `Arc`.
pub struct LogPipeline {
    config: PipelineConfig,
    redactor: Arc<Redactor>,
    breaker: Arc<CircuitBreaker>,
    buffer: BufferManager,
    store: Arc<dyn LogStore>,
    perf: PerfTracker,
}

impl LogPipeline {
    /// Build a pipeline over `store` and start the background flusher
    ///
    /// The flusher starts only when a tokio runtime is present; without
    /// one, events still buffer and can be drained with [`flush`].
    ///
    /// [`flush`]: LogPipeline::flush
    pub fn new(config: PipelineConfig, store: impl LogStore + 'static) -> Result<Self> {
        let config = config.validated();
        let store: Arc<dyn LogStore> = Arc::new(store);
        let redactor = Arc::new(Redactor::new()?);
        let breaker = Arc::new(CircuitBreaker::new(
            config.failure_threshold,
            config.cooldown(),
        ));
        let buffer = BufferManager::new(
            config.buffer_capacity,
            config.flush_interval(),
            store.clone(),
            breaker.clone(),
        );
        let perf = PerfTracker::new(store.clone(), redactor.clone(), config.local_mode);

        if !config.local_mode && !buffer.start_flusher() {
            tracing::debug!("No tokio runtime at construction; periodic flush disabled");
        }

        tracing::info!(
            store = store.name(),
            min_level = %config.min_level,
            buffer_capacity = config.buffer_capacity,
            local_mode = config.local_mode,
            "Log pipeline ready"
        );

        Ok(Self {
            config,
            redactor,
            breaker,
            buffer,
            store,
            perf,
        })
    }

    /// Build a pipeline configured from environment variables
    pub fn from_env(store: impl LogStore + 'static) -> Result<Self> {
        Self::new(PipelineConfig::from_env(), store)
    }

    /// Ingest one diagnostic event
    ///
    /// Never errors, never panics, never blocks on I/O. Below the
    /// configured minimum level this is a complete no-op.
    pub fn emit(
        &self,
        level: LogLevel,
        category: &str,
        event_type: &str,
        message: &str,
        ctx: EmitContext,
    ) {
        if level < self.config.min_level {
            return;
        }

        let mut event = LogEvent::new(level, category, event_type, self.redactor.redact(message));
        event.user_email = self.redactor.redact_opt(ctx.user_email);
        event.user_role = ctx.user_role;
        event.correlation_id = ctx.correlation_id.or_else(correlation::current);
        event.duration_ms = ctx.duration_ms;
        event.error_code = ctx.error_code;
        event.error_class = ctx.error_class;
        event.stack_trace = ctx.stack_trace;
        event.server_context = ctx.server_context;

        // Console first: this path never degrades, whatever the backend does
        console_emit(&event);

        if self.config.local_mode {
            return;
        }

        if level.is_urgent() {
            // Fire-and-forget: the caller must not wait on persistence
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let buffer = self.buffer.clone();
                handle.spawn(async move {
                    buffer.write_now(event).await;
                });
            } else {
                tracing::warn!(
                    event_id = %event.id,
                    "No runtime for immediate write; event kept on console only"
                );
            }
        } else {
            self.buffer.enqueue(event);
        }
    }

    /// Emit at `Debug` level
    pub fn debug(&self, category: &str, event_type: &str, message: &str, ctx: EmitContext) {
        self.emit(LogLevel::Debug, category, event_type, message, ctx);
    }

    /// Emit at `Info` level
    pub fn info(&self, category: &str, event_type: &str, message: &str, ctx: EmitContext) {
        self.emit(LogLevel::Info, category, event_type, message, ctx);
    }

    /// Emit at `Warn` level
    pub fn warn(&self, category: &str, event_type: &str, message: &str, ctx: EmitContext) {
        self.emit(LogLevel::Warn, category, event_type, message, ctx);
    }

    /// Emit at `Error` level
    pub fn error(&self, category: &str, event_type: &str, message: &str, ctx: EmitContext) {
        self.emit(LogLevel::Error, category, event_type, message, ctx);
    }

    /// Emit at `Critical` level
    pub fn critical(&self, category: &str, event_type: &str, message: &str, ctx: EmitContext) {
        self.emit(LogLevel::Critical, category, event_type, message, ctx);
    }

    /// Begin timing one operation (see [`PerfTimer`])
    pub fn track(&self, endpoint: impl Into<String>, method: impl Into<String>) -> PerfTimer {
        self.perf.start(endpoint, method)
    }

    /// Drain the buffer now, returning per-entry outcome counts
    pub async fn flush(&self) -> DrainStats {
        self.buffer.drain_and_flush().await
    }

    /// Stop the background flusher and perform one final flush
    pub async fn shutdown(&self) {
        self.buffer.shutdown().await;
        tracing::info!("Log pipeline shut down");
    }

    /// Buffered events not yet drained
    pub fn pending(&self) -> usize {
        self.buffer.pending()
    }

    /// Current circuit state
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Diagnostic snapshot of the circuit for the admin surface
    pub fn circuit_snapshot(&self) -> CircuitSnapshot {
        self.breaker.snapshot()
    }

    /// Manually reset the circuit to closed
    pub fn reset_circuit(&self) {
        self.breaker.reset();
    }

    /// Status of the underlying store
    pub async fn store_info(&self) -> Result<StoreInfo> {
        self.store.info().await
    }

    /// Effective configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

/// Synchronous console emission through `tracing`
fn console_emit(event: &LogEvent) {
    match event.level {
        LogLevel::Debug => tracing::debug!(
            event_id = %event.id,
            category = %event.category,
            event_type = %event.event_type,
            correlation_id = event.correlation_id.as_deref(),
            "{}",
            event.message
        ),
        LogLevel::Info => tracing::info!(
            event_id = %event.id,
            category = %event.category,
            event_type = %event.event_type,
            correlation_id = event.correlation_id.as_deref(),
            "{}",
            event.message
        ),
        LogLevel::Warn => tracing::warn!(
            event_id = %event.id,
            category = %event.category,
            event_type = %event.event_type,
            correlation_id = event.correlation_id.as_deref(),
            "{}",
            event.message
        ),
        LogLevel::Error => tracing::error!(
            event_id = %event.id,
            category = %event.category,
            event_type = %event.event_type,
            correlation_id = event.correlation_id.as_deref(),
            error_class = event.error_class.as_deref(),
            "{}",
            event.message
        ),
        LogLevel::Critical => tracing::error!(
            event_id = %event.id,
            category = %event.category,
            event_type = %event.event_type,
            correlation_id = event.correlation_id.as_deref(),
            error_class = event.error_class.as_deref(),
            critical = true,
            "{}",
            event.message
        ),
    }
}
