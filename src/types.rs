//! Core types for the logpipe system
//!
//! All persisted records use camelCase JSON serialization for wire
//! compatibility with the backing log schema.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity level of a log event
///
/// Ordered: `Debug < Info < Warn < Error < Critical`. Events below the
/// pipeline's configured minimum are dropped before any other work.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    /// Whether this level routes through the immediate (unbuffered) write path
    pub fn is_urgent(self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for LogLevel {
    type Err = crate::error::LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "critical" | "fatal" => Ok(Self::Critical),
            other => Err(crate::error::LogError::Config(format!(
                "Unknown log level: '{}'",
                other
            ))),
        }
    }
}

/// A single diagnostic event
///
/// Built exclusively by the pipeline — message and user identifier are
/// already redacted by the time an event exists. Consumed exactly once
/// by either the immediate write path or the buffer; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Unique event identifier (evt-<uuid>)
    pub id: String,

    /// Unix timestamp in milliseconds
    pub timestamp: u64,

    /// Severity level
    pub level: LogLevel,

    /// Top-level category for grouping (e.g., "billing", "auth")
    pub category: String,

    /// Event type identifier (e.g., "quote.calculated", "login.failed")
    pub event_type: String,

    /// Human-readable message, PII-redacted
    pub message: String,

    /// User identifier, PII-redacted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,

    /// Role of the acting user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,

    /// Correlation id grouping events from one logical operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Duration of the operation being logged, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// OS or library error code (e.g., "111", "ECONNREFUSED")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    /// Error type name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<String>,

    /// Error trace — in practice the source chain of the captured error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,

    /// Opaque server-side context blob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_context: Option<serde_json::Value>,
}

impl LogEvent {
    /// Create a bare event with auto-generated id and timestamp
    ///
    /// Optional fields start empty; the pipeline fills them from the
    /// emit context after redaction.
    pub fn new(
        level: LogLevel,
        category: impl Into<String>,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("evt-{}", uuid::Uuid::new_v4()),
            timestamp: now_millis(),
            level,
            category: category.into(),
            event_type: event_type.into(),
            message: message.into(),
            user_email: None,
            user_role: None,
            correlation_id: None,
            duration_ms: None,
            error_code: None,
            error_class: None,
            stack_trace: None,
            server_context: None,
        }
    }
}

/// Caller-supplied context for `emit`
///
/// Everything is optional. The `with_` builders mirror the fields; the
/// interesting ones are [`EmitContext::with_error`], which extracts
/// structured fields from a live error value, and
/// [`EmitContext::with_server_context`], which never fails — an
/// unserializable value becomes a placeholder marker instead.
#[derive(Debug, Clone, Default)]
pub struct EmitContext {
    pub user_email: Option<String>,
    pub user_role: Option<String>,
    pub correlation_id: Option<String>,
    pub duration_ms: Option<u64>,
    pub error_code: Option<String>,
    pub error_class: Option<String>,
    pub stack_trace: Option<String>,
    pub server_context: Option<serde_json::Value>,
}

/// Marker substituted for a server context that failed to serialize
pub const UNSERIALIZABLE_CONTEXT: &str = "[unserializable-context]";

impl EmitContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the acting user
    pub fn with_user(
        mut self,
        email: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        self.user_email = Some(email.into());
        self.user_role = Some(role.into());
        self
    }

    /// Attach only a user identifier
    pub fn with_user_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    /// Attach an explicit correlation id (overrides the ambient scope)
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Attach an operation duration
    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    /// Attach an explicit error code
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Attach an explicit trace string
    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    /// Extract structured fields from a live error value
    ///
    /// Captures the error's type name as `error_class`, its `source()`
    /// chain as `stack_trace`, and — when an `std::io::Error` appears
    /// anywhere in the chain — the raw OS error code as `error_code`.
    /// Explicitly set fields are not overwritten.
    pub fn with_error<E>(mut self, error: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        if self.error_class.is_none() {
            self.error_class = Some(short_type_name(std::any::type_name::<E>()));
        }

        let mut segments = vec![error.to_string()];
        let mut current: Option<&(dyn std::error::Error + 'static)> = error.source();
        while let Some(cause) = current {
            segments.push(cause.to_string());
            current = cause.source();
        }
        if self.stack_trace.is_none() {
            self.stack_trace = Some(segments.join(" <- "));
        }

        if self.error_code.is_none() {
            let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
            while let Some(err) = current {
                if let Some(io) = err.downcast_ref::<std::io::Error>() {
                    if let Some(code) = io.raw_os_error() {
                        self.error_code = Some(code.to_string());
                        break;
                    }
                }
                current = err.source();
            }
        }

        self
    }

    /// Attach an opaque server-context value
    ///
    /// Serialization failures are absorbed: the context becomes the
    /// [`UNSERIALIZABLE_CONTEXT`] marker and emission continues.
    pub fn with_server_context<T: Serialize>(mut self, value: &T) -> Self {
        self.server_context = Some(
            serde_json::to_value(value)
                .unwrap_or_else(|_| serde_json::Value::String(UNSERIALIZABLE_CONTEXT.into())),
        );
        self
    }
}

/// One timing record for a tracked operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetric {
    /// Endpoint or operation name (e.g., "/api/quotes")
    pub endpoint: String,

    /// Method or verb (e.g., "POST")
    pub method: String,

    /// Total wall-clock duration in milliseconds
    pub duration_ms: u64,

    /// Time spent in backend calls, if marked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_ms: Option<u64>,

    /// Response status code
    pub status_code: u16,

    /// User identifier, PII-redacted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,

    /// Correlation id in effect when the operation completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Unix timestamp in milliseconds
    pub timestamp: u64,
}

fn short_type_name(full: &str) -> String {
    // "std::io::Error" -> "Error"; generic params keep their own short names
    match full.rsplit("::").next() {
        Some(last) => last.to_string(),
        None => full.to_string(),
    }
}

/// Current time in Unix milliseconds
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Critical);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" critical ".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_level_serialization() {
        let json = serde_json::to_string(&LogLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: LogLevel = serde_json::from_str("\"warn\"").unwrap();
        assert_eq!(parsed, LogLevel::Warn);
    }

    #[test]
    fn test_urgent_levels() {
        assert!(LogLevel::Error.is_urgent());
        assert!(LogLevel::Critical.is_urgent());
        assert!(!LogLevel::Warn.is_urgent());
        assert!(!LogLevel::Debug.is_urgent());
    }

    #[test]
    fn test_event_creation() {
        let event = LogEvent::new(LogLevel::Info, "billing", "quote.calculated", "Quote ready");

        assert!(event.id.starts_with("evt-"));
        assert!(event.timestamp > 0);
        assert_eq!(event.category, "billing");
        assert_eq!(event.event_type, "quote.calculated");
        assert!(event.user_email.is_none());
        assert!(event.server_context.is_none());
    }

    #[test]
    fn test_event_serialization_camel_case() {
        let mut event = LogEvent::new(LogLevel::Error, "auth", "login.failed", "Login failed");
        event.correlation_id = Some("corr-1".to_string());
        event.error_class = Some("TimeoutError".to_string());

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"eventType\":\"login.failed\""));
        assert!(json.contains("\"correlationId\":\"corr-1\""));
        assert!(json.contains("\"errorClass\":\"TimeoutError\""));
        assert!(json.contains("\"level\":\"error\""));

        let parsed: LogEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, event.id);
        assert_eq!(parsed.level, LogLevel::Error);
    }

    #[test]
    fn test_event_skips_empty_optionals() {
        let event = LogEvent::new(LogLevel::Info, "billing", "quote.calculated", "ok");
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("userEmail"));
        assert!(!json.contains("stackTrace"));
        assert!(!json.contains("serverContext"));
    }

    #[test]
    fn test_context_builders() {
        let ctx = EmitContext::new()
            .with_user("a@b.com", "admin")
            .with_correlation_id("corr-9")
            .with_duration_ms(42);

        assert_eq!(ctx.user_email.as_deref(), Some("a@b.com"));
        assert_eq!(ctx.user_role.as_deref(), Some("admin"));
        assert_eq!(ctx.correlation_id.as_deref(), Some("corr-9"));
        assert_eq!(ctx.duration_ms, Some(42));
    }

    #[test]
    fn test_context_error_extraction() {
        let io = std::io::Error::from_raw_os_error(111);
        let ctx = EmitContext::new().with_error(&io);

        assert_eq!(ctx.error_class.as_deref(), Some("Error"));
        assert_eq!(ctx.error_code.as_deref(), Some("111"));
        assert!(ctx.stack_trace.is_some());
    }

    #[test]
    fn test_context_error_does_not_overwrite_explicit_fields() {
        let io = std::io::Error::from_raw_os_error(13);
        let ctx = EmitContext::new()
            .with_error_code("EACCES")
            .with_error(&io);

        assert_eq!(ctx.error_code.as_deref(), Some("EACCES"));
    }

    #[test]
    fn test_context_server_context_roundtrip() {
        #[derive(Serialize)]
        struct Extra {
            region: &'static str,
        }

        let ctx = EmitContext::new().with_server_context(&Extra { region: "eu-1" });
        assert_eq!(ctx.server_context.unwrap()["region"], "eu-1");
    }

    #[test]
    fn test_context_unserializable_server_context_placeholder() {
        // Maps with non-string keys are not representable in JSON objects
        let mut bad = std::collections::HashMap::new();
        bad.insert(vec![1u8], "x");

        let ctx = EmitContext::new().with_server_context(&bad);
        assert_eq!(
            ctx.server_context,
            Some(serde_json::Value::String(UNSERIALIZABLE_CONTEXT.into()))
        );
    }

    #[test]
    fn test_metric_serialization() {
        let metric = PerformanceMetric {
            endpoint: "/api/quotes".to_string(),
            method: "POST".to_string(),
            duration_ms: 120,
            backend_ms: Some(80),
            status_code: 200,
            user_email: None,
            correlation_id: Some("corr-3".to_string()),
            timestamp: now_millis(),
        };

        let json = serde_json::to_string(&metric).unwrap();
        assert!(json.contains("\"durationMs\":120"));
        assert!(json.contains("\"backendMs\":80"));
        assert!(json.contains("\"statusCode\":200"));
        assert!(!json.contains("userEmail"));

        let parsed: PerformanceMetric = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.duration_ms, 120);
        assert_eq!(parsed.backend_ms, Some(80));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("std::io::Error"), "Error");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
