//! Version store (C2): immutable, append-only snapshots per write, and
//! rollback by replaying a prior snapshot's bytes through the file layer.
//!
//! Grounded on the corpus's append-only audit log shape (`security/audit.rs`):
//! history is never rewritten in place, only appended to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::error::{BankError, Result};
use crate::file_layer::FileLayer;

/// Immutable tuple capturing a file's bytes at a specific version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub file_name: String,
    pub version: u64,
    pub sha256: String,
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only per-file snapshot history, persisted under `versions/<file>/vN.bin`.
pub struct VersionStore {
    versions_root: PathBuf,
    history: Arc<RwLock<HashMap<String, Vec<Snapshot>>>>,
}

impl VersionStore {
    pub fn new(bank_root: impl Into<PathBuf>) -> Self {
        Self {
            versions_root: bank_root.into().join("versions"),
            history: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Append a new snapshot for `file_name`, returning its assigned version.
    pub async fn append(&self, file_name: &str, sha256: String, bytes: Vec<u8>) -> Result<Snapshot> {
        let mut history = self.history.write().await;
        let entries = history.entry(file_name.to_string()).or_default();
        let version = entries.last().map(|s| s.version + 1).unwrap_or(1);
        let snapshot = Snapshot {
            file_name: file_name.to_string(),
            version,
            sha256,
            bytes,
            timestamp: Utc::now(),
        };
        self.persist(&snapshot).await?;
        entries.push(snapshot.clone());
        Ok(snapshot)
    }

    /// Fetch the snapshot at `version`, or the latest if `version` is `None`.
    pub async fn get(&self, file_name: &str, version: Option<u64>) -> Result<Snapshot> {
        let history = self.history.read().await;
        let entries = history
            .get(file_name)
            .ok_or_else(|| BankError::not_found(format!("version history for {file_name}")))?;
        match version {
            Some(v) => entries
                .iter()
                .find(|s| s.version == v)
                .cloned()
                .ok_or_else(|| BankError::not_found(format!("{file_name} v{v}"))),
            None => entries
                .last()
                .cloned()
                .ok_or_else(|| BankError::not_found(format!("version history for {file_name}"))),
        }
    }

    pub async fn history_for(&self, file_name: &str) -> Vec<Snapshot> {
        self.history
            .read()
            .await
            .get(file_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Roll `file_name` back to `version` by rewriting it through `file_layer`
    /// with that snapshot's bytes, and recording a fresh snapshot (history is
    /// append-only; rollback never deletes prior versions).
    pub async fn rollback(
        &self,
        file_layer: &FileLayer,
        file_name: &str,
        version: u64,
    ) -> Result<Snapshot> {
        let target = self.get(file_name, Some(version)).await?;
        let current_hash = file_layer
            .read(file_name, None)
            .await
            .map(|r| r.sha256)
            .ok();
        let outcome = file_layer
            .write(file_name, &target.bytes, current_hash.as_deref())
            .await?;
        self.append(file_name, outcome.sha256, target.bytes).await
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let dir = self.versions_root.join(&snapshot.file_name);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("v{}.bin", snapshot.version));
        let encoded = serde_json::to_vec(snapshot)?;
        tokio::fs::write(&path, encoded).await?;
        Ok(())
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FileLayerConfig;

    #[tokio::test]
    async fn versions_increase_strictly() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = VersionStore::new(temp.path());
        let s1 = store.append("a.md", "h1".into(), b"one".to_vec()).await.unwrap();
        let s2 = store.append("a.md", "h2".into(), b"two".to_vec()).await.unwrap();
        assert_eq!(s1.version, 1);
        assert_eq!(s2.version, 2);
    }

    #[tokio::test]
    async fn rollback_restores_byte_identical_content() {
        let temp = tempfile::TempDir::new().unwrap();
        let fl = FileLayer::new(temp.path().to_path_buf(), &FileLayerConfig::default());
        let store = VersionStore::new(temp.path());

        let out1 = fl.write("a.md", b"version one", None).await.unwrap();
        store.append("a.md", out1.sha256.clone(), b"version one".to_vec()).await.unwrap();

        let out2 = fl.write("a.md", b"version two", Some(&out1.sha256)).await.unwrap();
        store.append("a.md", out2.sha256, b"version two".to_vec()).await.unwrap();

        store.rollback(&fl, "a.md", 1).await.unwrap();
        let read = fl.read("a.md", None).await.unwrap();
        assert_eq!(read.bytes, b"version one");

        let history = store.history_for("a.md").await;
        assert_eq!(history.len(), 3, "rollback appends, never deletes history");
    }
}
