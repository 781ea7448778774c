//! Pipeline configuration
//!
//! All knobs come from environment-style inputs with per-field defaults.
//! A missing or unparseable value silently falls back to its default —
//! configuration can degrade the pipeline's tuning, never its liveness.

use crate::types::LogLevel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ENV_MIN_LEVEL: &str = "LOGPIPE_MIN_LEVEL";
const ENV_BUFFER_CAPACITY: &str = "LOGPIPE_BUFFER_CAPACITY";
const ENV_FLUSH_INTERVAL_MS: &str = "LOGPIPE_FLUSH_INTERVAL_MS";
const ENV_CB_THRESHOLD: &str = "LOGPIPE_CB_THRESHOLD";
const ENV_CB_COOLDOWN_MS: &str = "LOGPIPE_CB_COOLDOWN_MS";
const ENV_LOCAL_MODE: &str = "LOGPIPE_LOCAL_MODE";

/// Tuning knobs for the log pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Minimum severity that enters the pipeline at all
    pub min_level: LogLevel,

    /// Buffered events that trigger an immediate drain
    pub buffer_capacity: usize,

    /// Periodic background flush interval in milliseconds
    pub flush_interval_ms: u64,

    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// How long the circuit stays open before a trial attempt, in milliseconds
    pub cooldown_ms: u64,

    /// Local development mode: console only, no persistence or buffering
    pub local_mode: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            buffer_capacity: 50,
            flush_interval_ms: 10_000,
            failure_threshold: 5,
            cooldown_ms: 60_000,
            local_mode: false,
        }
    }
}

impl PipelineConfig {
    /// Build a config from environment variables
    ///
    /// Every variable is optional; absent or malformed values keep the
    /// default for that field.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_level: env_parse(ENV_MIN_LEVEL).unwrap_or(defaults.min_level),
            buffer_capacity: env_parse(ENV_BUFFER_CAPACITY).unwrap_or(defaults.buffer_capacity),
            flush_interval_ms: env_parse(ENV_FLUSH_INTERVAL_MS)
                .unwrap_or(defaults.flush_interval_ms),
            failure_threshold: env_parse(ENV_CB_THRESHOLD).unwrap_or(defaults.failure_threshold),
            cooldown_ms: env_parse(ENV_CB_COOLDOWN_MS).unwrap_or(defaults.cooldown_ms),
            local_mode: env_parse(ENV_LOCAL_MODE).unwrap_or(defaults.local_mode),
        }
        .validated()
    }

    /// Clamp degenerate values so a bad config can never stall the pipeline
    pub fn validated(mut self) -> Self {
        if self.buffer_capacity == 0 {
            tracing::warn!("buffer_capacity 0 clamped to 1");
            self.buffer_capacity = 1;
        }
        if self.flush_interval_ms == 0 {
            tracing::warn!("flush_interval_ms 0 clamped to 1");
            self.flush_interval_ms = 1;
        }
        if self.failure_threshold == 0 {
            tracing::warn!("failure_threshold 0 clamped to 1");
            self.failure_threshold = 1;
        }
        self
    }

    /// Flush interval as a `Duration`
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Circuit cooldown as a `Duration`
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.min_level, LogLevel::Info);
        assert_eq!(config.buffer_capacity, 50);
        assert_eq!(config.flush_interval_ms, 10_000);
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown_ms, 60_000);
        assert!(!config.local_mode);
    }

    #[test]
    fn test_validation_clamps_zeroes() {
        let config = PipelineConfig {
            buffer_capacity: 0,
            flush_interval_ms: 0,
            failure_threshold: 0,
            ..Default::default()
        }
        .validated();

        assert_eq!(config.buffer_capacity, 1);
        assert_eq!(config.flush_interval_ms, 1);
        assert_eq!(config.failure_threshold, 1);
    }

    #[test]
    fn test_serde_partial_config_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"minLevel":"warn","bufferCapacity":10}"#).unwrap();
        assert_eq!(config.min_level, LogLevel::Warn);
        assert_eq!(config.buffer_capacity, 10);
        assert_eq!(config.cooldown_ms, 60_000);
    }

    #[test]
    fn test_from_env_overrides_and_fallbacks() {
        // Env mutation: keep to one test to avoid cross-test races
        std::env::set_var(ENV_MIN_LEVEL, "error");
        std::env::set_var(ENV_BUFFER_CAPACITY, "not-a-number");
        std::env::set_var(ENV_CB_COOLDOWN_MS, "250");
        std::env::set_var(ENV_LOCAL_MODE, "true");

        let config = PipelineConfig::from_env();
        assert_eq!(config.min_level, LogLevel::Error);
        assert_eq!(config.buffer_capacity, 50); // malformed -> default
        assert_eq!(config.cooldown_ms, 250);
        assert!(config.local_mode);

        std::env::remove_var(ENV_MIN_LEVEL);
        std::env::remove_var(ENV_BUFFER_CAPACITY);
        std::env::remove_var(ENV_CB_COOLDOWN_MS);
        std::env::remove_var(ENV_LOCAL_MODE);
    }

    #[test]
    fn test_durations() {
        let config = PipelineConfig {
            flush_interval_ms: 1500,
            cooldown_ms: 30_000,
            ..Default::default()
        };
        assert_eq!(config.flush_interval(), Duration::from_millis(1500));
        assert_eq!(config.cooldown(), Duration::from_secs(30));
    }
}
