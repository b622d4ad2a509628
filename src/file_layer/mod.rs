//! Durable file layer (C1): path validation, per-path locking, atomic writes,
//! content hashing, rate limiting, and conflict detection.
//!
//! Grounded on the corpus's `core/file_access.rs` verify-then-act shape and
//! `core/updater.rs`'s atomic-rename-replace pattern.

mod lock;
mod rate_limit;

pub use lock::LockRegistry;
pub use rate_limit::RateLimiter;

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::core::config::FileLayerConfig;
use crate::core::error::{BankError, ConflictReason, Result};

const MERGE_MARKERS: [&str; 3] = ["<<<<<<<", "=======", ">>>>>>>"];
const RESERVED_NAMES: [&str; 9] = [
    "con", "prn", "aux", "nul", "com1", "com2", "lpt1", "lpt2", "lpt3",
];
const MAX_NAME_LEN: usize = 255;

/// Outcome of a successful write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub sha256: String,
    pub size_bytes: u64,
}

/// Outcome of a successful read.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub bytes: Vec<u8>,
    pub sha256: String,
}

/// Durable, concurrency-safe access to files rooted under `bank_root`.
pub struct FileLayer {
    bank_root: PathBuf,
    locks: LockRegistry,
    rate_limiter: Arc<RateLimiter>,
    lock_timeout: Duration,
}

impl FileLayer {
    pub fn new(bank_root: impl Into<PathBuf>, config: &FileLayerConfig) -> Self {
        Self {
            bank_root: bank_root.into(),
            locks: LockRegistry::new(),
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_ops_per_sec,
                Duration::from_secs(config.rate_wait_s),
            )),
            lock_timeout: Duration::from_secs(config.lock_timeout_s),
        }
    }

    /// Validate a bare file name: non-empty after trim, no traversal, no
    /// control characters, not reserved, doesn't end in space/period, ≤255 chars.
    pub fn validate_name(name: &str) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(BankError::invalid("file name is empty"));
        }
        if trimmed.len() > MAX_NAME_LEN {
            return Err(BankError::invalid(format!(
                "file name exceeds {MAX_NAME_LEN} characters"
            )));
        }
        if trimmed.contains("..") || trimmed.starts_with('/') || trimmed.starts_with('\\') {
            return Err(BankError::invalid("file name contains path traversal"));
        }
        if trimmed.chars().any(|c| c.is_control()) {
            return Err(BankError::invalid("file name contains control characters"));
        }
        if trimmed.ends_with(' ') || trimmed.ends_with('.') {
            return Err(BankError::invalid(
                "file name must not end in space or period",
            ));
        }
        let stem = trimmed.split('.').next().unwrap_or(trimmed).to_lowercase();
        if RESERVED_NAMES.contains(&stem.as_str()) {
            return Err(BankError::invalid(format!("'{trimmed}' is a reserved name")));
        }
        Ok(())
    }

    /// Resolve `name` to a canonical absolute path rooted inside the bank.
    pub fn validate_path(&self, name: &str) -> Result<PathBuf> {
        Self::validate_name(name)?;
        let candidate = self.bank_root.join(name);
        let root = normalize(&self.bank_root);
        let resolved = normalize(&candidate);
        if !resolved.starts_with(&root) {
            return Err(BankError::path_escape(resolved));
        }
        Ok(resolved)
    }

    /// Read a file, optionally verifying its hash matches `expected_hash`.
    /// Retries transient failures (lock timeouts, rate limiting) with
    /// exponential backoff before giving up.
    pub async fn read(&self, name: &str, expected_hash: Option<&str>) -> Result<ReadOutcome> {
        with_retry(|| self.read_once(name, expected_hash)).await
    }

    async fn read_once(&self, name: &str, expected_hash: Option<&str>) -> Result<ReadOutcome> {
        let path = self.validate_path(name)?;
        let bytes = tokio::fs::read(&path).await?;
        let sha256 = hash_bytes(&bytes);
        if let Some(expected) = expected_hash {
            if expected != sha256 {
                return Err(BankError::conflict(name, ConflictReason::HashMismatch));
            }
        }
        Ok(ReadOutcome { bytes, sha256 })
    }

    /// Atomically write `content`, serialized per-path, hash-checked, rate-limited.
    /// Retries transient failures (lock timeouts, rate limiting) with
    /// exponential backoff before giving up.
    pub async fn write(
        &self,
        name: &str,
        content: &[u8],
        expected_hash: Option<&str>,
    ) -> Result<WriteOutcome> {
        with_retry(|| self.write_once(name, content, expected_hash)).await
    }

    async fn write_once(
        &self,
        name: &str,
        content: &[u8],
        expected_hash: Option<&str>,
    ) -> Result<WriteOutcome> {
        scan_for_merge_markers(name, content)?;

        self.rate_limiter
            .acquire("write")
            .await
            .map_err(|_| BankError::RateLimited {
                operation: "write".to_string(),
                limit_per_sec: self.rate_limiter.limit_per_sec(),
            })?;

        let path = self.validate_path(name)?;
        let guard = self.locks.acquire(&path, self.lock_timeout).await?;
        let _guard = guard;

        if path.exists() {
            let existing = tokio::fs::read(&path).await?;
            let existing_hash = hash_bytes(&existing);
            if let Some(expected) = expected_hash {
                if expected != existing_hash {
                    return Err(BankError::conflict(name, ConflictReason::HashMismatch));
                }
            }
        } else if expected_hash.is_some() {
            return Err(BankError::conflict(name, ConflictReason::HashMismatch));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_name = format!(".tmp-{}", uuid::Uuid::new_v4());
        let tmp_path = path
            .parent()
            .map(|p| p.join(&tmp_name))
            .unwrap_or_else(|| PathBuf::from(&tmp_name));

        {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp_path, &path).await?;

        let sha256 = hash_bytes(content);
        Ok(WriteOutcome {
            sha256,
            size_bytes: content.len() as u64,
        })
    }

    /// Remove a file, recording its deletion in the caller's index.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = self.validate_path(name)?;
        let guard = self.locks.acquire(&path, self.lock_timeout).await?;
        let _guard = guard;
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    pub fn bank_root(&self) -> &Path {
        &self.bank_root
    }
}

/// Retry attempts for transient errors before surfacing the last one.
const RETRY_ATTEMPTS: u32 = 3;
/// Base delay for the exponential backoff between retries.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Run `op`, retrying with exponential backoff (base 100ms, factor 2) while
/// it keeps failing with a transient error, up to `RETRY_ATTEMPTS` total tries.
async fn with_retry<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < RETRY_ATTEMPTS => {
                tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn scan_for_merge_markers(name: &str, content: &[u8]) -> Result<()> {
    let text = String::from_utf8_lossy(content);
    for marker in MERGE_MARKERS {
        if text.lines().any(|line| line.starts_with(marker)) {
            return Err(BankError::conflict(name, ConflictReason::MergeMarkers));
        }
    }
    Ok(())
}

/// SHA-256 hex digest of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FileLayerConfig;

    fn layer(root: &Path) -> FileLayer {
        FileLayer::new(root.to_path_buf(), &FileLayerConfig::default())
    }

    #[test]
    fn rejects_traversal_names() {
        assert!(FileLayer::validate_name("../escape.md").is_err());
        assert!(FileLayer::validate_name("ok.md").is_ok());
    }

    #[test]
    fn rejects_names_ending_in_period_or_space() {
        assert!(FileLayer::validate_name("foo.").is_err());
        assert!(FileLayer::validate_name("foo ").is_err());
    }

    #[tokio::test]
    async fn write_then_read_round_trips_hash() {
        let temp = tempfile::TempDir::new().unwrap();
        let fl = layer(temp.path());
        let outcome = fl.write("a.md", b"hello", None).await.unwrap();
        let read = fl.read("a.md", None).await.unwrap();
        assert_eq!(outcome.sha256, read.sha256);
        assert_eq!(read.bytes, b"hello");
    }

    #[tokio::test]
    async fn write_with_stale_expected_hash_conflicts() {
        let temp = tempfile::TempDir::new().unwrap();
        let fl = layer(temp.path());
        let first = fl.write("a.md", b"hello", None).await.unwrap();
        fl.write("a.md", b"world", Some(&first.sha256)).await.unwrap();
        let result = fl.write("a.md", b"stale edit", Some(&first.sha256)).await;
        assert!(matches!(result, Err(BankError::Conflict { .. })));
    }

    #[tokio::test]
    async fn write_rejects_merge_markers() {
        let temp = tempfile::TempDir::new().unwrap();
        let fl = layer(temp.path());
        let content = b"<<<<<<< HEAD\nours\n=======\ntheirs\n>>>>>>> branch\n";
        let result = fl.write("a.md", content, None).await;
        assert!(matches!(result, Err(BankError::Conflict { .. })));
    }

    #[tokio::test]
    async fn path_cannot_escape_bank_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let fl = layer(temp.path());
        assert!(fl.validate_path("../../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn write_retries_past_a_transient_lock_timeout() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = FileLayerConfig::default();
        config.lock_timeout_s = 0;
        let fl = Arc::new(FileLayer::new(temp.path().to_path_buf(), &config));

        let path = fl.validate_path("a.md").unwrap();
        let held = fl.locks.acquire(&path, Duration::from_secs(1)).await.unwrap();

        let fl2 = fl.clone();
        let writer = tokio::spawn(async move { fl2.write("a.md", b"hello", None).await });

        tokio::time::sleep(Duration::from_millis(150)).await;
        drop(held);

        let result = writer.await.unwrap();
        assert!(result.is_ok());
    }
}
