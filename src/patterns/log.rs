//! Access log model and append-only JSONL persistence.
//!
//! Grounded on the corpus's `tracing-appender` rolling-file idiom for
//! append-only logs, simplified here to a single growing JSONL file windowed
//! at read time rather than rotated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::core::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    pub timestamp: DateTime<Utc>,
    pub file_name: String,
    pub task_id: Option<String>,
    pub operation: String,
}

/// Append-only access log, scanned at most `window` entries at a time.
pub struct AccessLog {
    path: PathBuf,
    window: usize,
}

impl AccessLog {
    pub fn new(bank_root: impl Into<PathBuf>, window: usize) -> Self {
        Self {
            path: bank_root.into().join("access.log.jsonl"),
            window,
        }
    }

    pub async fn record(&self, event: AccessEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Return the trailing `min(|log|, window)` entries, oldest first.
    pub async fn tail(&self) -> Result<Vec<AccessEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let mut events: Vec<AccessEvent> = contents
            .lines()
            .filter(|l| !l.is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect();
        if events.len() > self.window {
            events = events.split_off(events.len() - self.window);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tail_windows_to_the_configured_size() {
        let temp = tempfile::TempDir::new().unwrap();
        let log = AccessLog::new(temp.path(), 3);
        for i in 0..5 {
            log.record(AccessEvent {
                timestamp: Utc::now(),
                file_name: format!("f{i}.md"),
                task_id: None,
                operation: "read".into(),
            })
            .await
            .unwrap();
        }
        let tail = log.tail().await.unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].file_name, "f2.md");
        assert_eq!(tail[2].file_name, "f4.md");
    }
}
