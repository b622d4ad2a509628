//! Per-path lock registry with bounded-wait acquisition.
//!
//! Grounded on the corpus's `Arc<tokio::sync::Mutex<_>>` handle-per-resource
//! style in `core/file_access.rs`, generalized to a map of handles keyed by path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::error::{BankError, Result};

/// Registry of per-path `tokio::sync::Mutex` handles, created lazily.
#[derive(Default)]
pub struct LockRegistry {
    handles: StdMutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

/// Holds a path's lock for the lifetime of the guard.
pub struct PathLockGuard {
    _inner: OwnedMutexGuard<()>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut handles = self.handles.lock().expect("lock registry poisoned");
        handles
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the lock for `path`, waiting up to `timeout` before failing.
    pub async fn acquire(&self, path: &Path, timeout: Duration) -> Result<PathLockGuard> {
        let handle = self.handle_for(path);
        match tokio::time::timeout(timeout, handle.lock_owned()).await {
            Ok(guard) => Ok(PathLockGuard { _inner: guard }),
            Err(_) => Err(BankError::LockTimeout {
                file: path.display().to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Number of distinct paths that have ever been locked (handles are never evicted).
    pub fn tracked_paths(&self) -> usize {
        self.handles.lock().expect("lock registry poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_waiter_is_serialized_behind_first() {
        let registry = LockRegistry::new();
        let path = PathBuf::from("a.md");
        let guard1 = registry.acquire(&path, Duration::from_millis(200)).await.unwrap();
        let registry = Arc::new(registry);
        let registry2 = registry.clone();
        let path2 = path.clone();
        let handle = tokio::spawn(async move {
            registry2.acquire(&path2, Duration::from_millis(200)).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard1);
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn acquisition_times_out_when_held() {
        let registry = LockRegistry::new();
        let path = PathBuf::from("a.md");
        let _guard = registry.acquire(&path, Duration::from_millis(200)).await.unwrap();
        let result = registry.acquire(&path, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(BankError::LockTimeout { .. })));
    }
}
