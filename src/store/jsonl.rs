//! Durable append-only JSONL store with file rotation
//!
//! Events and metrics append to separate `.jsonl` files under one
//! directory. When a file exceeds `max_file_bytes` it is rotated
//! (renamed with a timestamp suffix) and a fresh file is started; old
//! rotated files are pruned to keep at most `max_rotated_files` per
//! kind.

use crate::error::{LogError, Result};
use crate::store::{LogStore, StoreInfo};
use crate::types::{LogEvent, PerformanceMetric};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const EVENTS_STEM: &str = "events";
const METRICS_STEM: &str = "metrics";

/// Rotation settings for the JSONL store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsonlConfig {
    /// Maximum size of an active file before rotation (bytes)
    pub max_file_bytes: u64,
    /// Rotated files to keep per record kind
    pub max_rotated_files: usize,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024,
            max_rotated_files: 5,
        }
    }
}

/// File-backed `LogStore` implementation
pub struct JsonlStore {
    dir: PathBuf,
    events_path: PathBuf,
    metrics_path: PathBuf,
    config: JsonlConfig,
    events_written: AtomicU64,
    metrics_written: AtomicU64,
}

impl JsonlStore {
    /// Create a store under `dir`, ensuring the directory exists
    pub async fn new(dir: impl Into<PathBuf>, config: JsonlConfig) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            LogError::Config(format!(
                "Failed to create log directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let events_path = dir.join(format!("{}.jsonl", EVENTS_STEM));
        let metrics_path = dir.join(format!("{}.jsonl", METRICS_STEM));
        Ok(Self {
            dir,
            events_path,
            metrics_path,
            config,
            events_written: AtomicU64::new(0),
            metrics_written: AtomicU64::new(0),
        })
    }

    /// Directory holding the active and rotated files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the most recent `limit` events from the active file
    pub async fn load_recent_events(&self, limit: usize) -> Vec<LogEvent> {
        let all = self.load_events_from(&self.events_path).await;
        if all.len() <= limit {
            all
        } else {
            all[all.len() - limit..].to_vec()
        }
    }

    async fn load_events_from(&self, path: &Path) -> Vec<LogEvent> {
        let file = match fs::File::open(path).await {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };

        let mut events = Vec::new();
        let mut lines = BufReader::new(file).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match serde_json::from_str::<LogEvent>(&line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping corrupt log line")
                }
            }
        }
        events
    }

    async fn append_line(&self, path: &Path, stem: &str, line: &str) -> Result<()> {
        self.maybe_rotate(path, stem).await?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| {
                LogError::store(format!("Failed to open {}: {}", path.display(), e))
            })?;

        let mut buf = line.to_string();
        buf.push('\n');
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| LogError::store(format!("Failed to append record: {}", e)))?;
        Ok(())
    }

    /// Rotate the active file when it exceeds `max_file_bytes`
    async fn maybe_rotate(&self, path: &Path, stem: &str) -> Result<()> {
        let meta = match fs::metadata(path).await {
            Ok(m) => m,
            // No file yet, nothing to rotate
            Err(_) => return Ok(()),
        };
        if meta.len() < self.config.max_file_bytes {
            return Ok(());
        }

        let ts = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6f").to_string();
        let mut rotated = self.dir.join(format!("{}-{}.jsonl", stem, ts));
        let mut counter = 1u32;
        while fs::try_exists(&rotated).await.unwrap_or(false) {
            rotated = self.dir.join(format!("{}-{}-{}.jsonl", stem, ts, counter));
            counter += 1;
        }

        fs::rename(path, &rotated)
            .await
            .map_err(|e| LogError::store(format!("Failed to rotate {}: {}", path.display(), e)))?;
        tracing::debug!(from = %path.display(), to = %rotated.display(), "Rotated log file");

        self.prune_rotated(stem).await
    }

    /// Delete the oldest rotated files past `max_rotated_files`
    async fn prune_rotated(&self, stem: &str) -> Result<()> {
        let prefix = format!("{}-", stem);
        let mut rotated: Vec<PathBuf> = Vec::new();

        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| LogError::store(format!("Failed to read log dir: {}", e)))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LogError::store(format!("Failed to read dir entry: {}", e)))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) && name.ends_with(".jsonl") {
                rotated.push(entry.path());
            }
        }

        if rotated.len() <= self.config.max_rotated_files {
            return Ok(());
        }

        // Timestamped names sort chronologically
        rotated.sort();
        let excess = rotated.len() - self.config.max_rotated_files;
        for path in rotated.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to prune rotated file");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LogStore for JsonlStore {
    async fn write(&self, event: &LogEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        self.append_line(&self.events_path, EVENTS_STEM, &line).await?;
        self.events_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn write_metric(&self, metric: &PerformanceMetric) -> Result<()> {
        let line = serde_json::to_string(metric)?;
        self.append_line(&self.metrics_path, METRICS_STEM, &line).await?;
        self.metrics_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn info(&self) -> Result<StoreInfo> {
        Ok(StoreInfo {
            store: "jsonl".to_string(),
            events: self.events_written.load(Ordering::Relaxed),
            metrics: self.metrics_written.load(Ordering::Relaxed),
        })
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}
