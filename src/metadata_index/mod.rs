//! Metadata index (C3): the authoritative per-file record store.
//!
//! Mutations are serialized through a single writer task driven by an `mpsc`
//! command channel with `oneshot` reply slots — the same "one task owns
//! shared state" actor shape as the corpus's `core/db_actor.rs`, generalized
//! from owning a database connection to owning an in-memory index plus its
//! on-disk JSON mirror.

pub mod model;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

use crate::core::error::{BankError, Result};
pub use model::{FileRecord, FileRecordPatch, OutgoingLink, Section, VersionEntry};

#[derive(Debug, Serialize, Deserialize, Default)]
struct IndexDocument {
    files: HashMap<String, FileRecord>,
}

enum Command {
    Get(String, oneshot::Sender<Option<FileRecord>>),
    Update(String, FileRecordPatch, oneshot::Sender<Result<FileRecord>>),
    AppendVersion(String, String, Option<String>, oneshot::Sender<Result<FileRecord>>),
    ListAll(oneshot::Sender<Vec<FileRecord>>),
    Delete(String, oneshot::Sender<Result<()>>),
    RecordAccess(String, oneshot::Sender<Result<()>>),
    Flush(oneshot::Sender<Result<()>>),
}

/// Handle to the single-writer metadata index actor. Cheaply cloneable.
#[derive(Clone)]
pub struct MetadataIndex {
    tx: mpsc::Sender<Command>,
}

impl MetadataIndex {
    /// Load `<bank_root>/index.json`, verifying its `.sha256` sidecar, and
    /// spawn the owning writer task.
    pub async fn load(bank_root: impl Into<PathBuf>) -> Result<Self> {
        let bank_root = bank_root.into();
        let index_path = bank_root.join("index.json");
        let hash_path = bank_root.join("index.json.sha256");

        let document = if index_path.exists() {
            let bytes = tokio::fs::read(&index_path).await?;
            if hash_path.exists() {
                let expected = tokio::fs::read_to_string(&hash_path).await?;
                let actual = crate::file_layer::hash_bytes(&bytes);
                if expected.trim() != actual {
                    return Err(BankError::IndexCorrupted {
                        message: "index.json.sha256 does not match index.json contents".into(),
                    });
                }
            }
            serde_json::from_slice(&bytes)?
        } else {
            IndexDocument::default()
        };

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(writer_task(rx, document, bank_root));
        Ok(Self { tx })
    }

    pub async fn get(&self, file: &str) -> Option<FileRecord> {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Get(file.to_string(), tx)).await;
        rx.await.unwrap_or(None)
    }

    pub async fn update(&self, file: &str, patch: FileRecordPatch) -> Result<FileRecord> {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(Command::Update(file.to_string(), patch, tx))
            .await;
        rx.await
            .map_err(|_| BankError::internal("metadata_index", "writer task gone"))?
    }

    pub async fn append_version(
        &self,
        file: &str,
        sha256: &str,
        author: Option<String>,
    ) -> Result<FileRecord> {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(Command::AppendVersion(
                file.to_string(),
                sha256.to_string(),
                author,
                tx,
            ))
            .await;
        rx.await
            .map_err(|_| BankError::internal("metadata_index", "writer task gone"))?
    }

    pub async fn list_all(&self) -> Vec<FileRecord> {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(Command::ListAll(tx)).await;
        rx.await.unwrap_or_default()
    }

    pub async fn delete(&self, file: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Delete(file.to_string(), tx)).await;
        rx.await
            .map_err(|_| BankError::internal("metadata_index", "writer task gone"))?
    }

    pub async fn record_access(&self, file: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(Command::RecordAccess(file.to_string(), tx))
            .await;
        rx.await
            .map_err(|_| BankError::internal("metadata_index", "writer task gone"))?
    }

    /// Force an immediate persist of the index document (normally done after
    /// every mutation).
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Flush(tx)).await;
        rx.await
            .map_err(|_| BankError::internal("metadata_index", "writer task gone"))?
    }
}

async fn writer_task(
    mut rx: mpsc::Receiver<Command>,
    mut document: IndexDocument,
    bank_root: PathBuf,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Get(file, reply) => {
                let _ = reply.send(document.files.get(&file).cloned());
            }
            Command::Update(file, patch, reply) => {
                let record = document
                    .files
                    .entry(file.clone())
                    .or_insert_with(|| FileRecord::new(file.clone()));
                if let Some(size) = patch.size_bytes {
                    record.size_bytes = size;
                }
                if let Some(sha) = patch.sha256 {
                    record.sha256 = sha;
                }
                if let Some(tokens) = patch.token_count {
                    record.token_count = tokens;
                }
                if let Some(sections) = patch.sections {
                    record.sections = sections;
                }
                if let Some(links) = patch.outgoing_links {
                    record.outgoing_links = links;
                }
                if let Some(exists) = patch.exists {
                    record.exists = exists;
                }
                let result = record.clone();
                let persisted = persist(&document, &bank_root).await;
                let _ = reply.send(persisted.map(|_| result));
            }
            Command::AppendVersion(file, sha256, author, reply) => {
                let record = document
                    .files
                    .entry(file.clone())
                    .or_insert_with(|| FileRecord::new(file.clone()));
                record.record_version(sha256, author);
                let result = record.clone();
                let persisted = persist(&document, &bank_root).await;
                let _ = reply.send(persisted.map(|_| result));
            }
            Command::ListAll(reply) => {
                let _ = reply.send(document.files.values().cloned().collect());
            }
            Command::Delete(file, reply) => {
                if let Some(record) = document.files.get_mut(&file) {
                    record.exists = false;
                }
                let persisted = persist(&document, &bank_root).await;
                let _ = reply.send(persisted);
            }
            Command::RecordAccess(file, reply) => {
                let result = match document.files.get_mut(&file) {
                    Some(record) => {
                        record.record_access();
                        Ok(())
                    }
                    None => Err(BankError::not_found(file)),
                };
                let _ = reply.send(result);
            }
            Command::Flush(reply) => {
                let _ = reply.send(persist(&document, &bank_root).await);
            }
        }
    }
}

async fn persist(document: &IndexDocument, bank_root: &PathBuf) -> Result<()> {
    tokio::fs::create_dir_all(bank_root).await?;
    let bytes = serde_json::to_vec_pretty(document)?;
    let hash = crate::file_layer::hash_bytes(&bytes);
    tokio::fs::write(bank_root.join("index.json"), &bytes).await?;
    tokio::fs::write(bank_root.join("index.json.sha256"), hash).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_creates_record_on_first_write() {
        let temp = tempfile::TempDir::new().unwrap();
        let index = MetadataIndex::load(temp.path()).await.unwrap();
        let patch = FileRecordPatch {
            sha256: Some("abc".into()),
            size_bytes: Some(5),
            ..Default::default()
        };
        let record = index.update("a.md", patch).await.unwrap();
        assert_eq!(record.sha256, "abc");
        assert!(record.exists);
    }

    #[tokio::test]
    async fn append_version_increments_monotonically() {
        let temp = tempfile::TempDir::new().unwrap();
        let index = MetadataIndex::load(temp.path()).await.unwrap();
        index.append_version("a.md", "h1", None).await.unwrap();
        let r2 = index.append_version("a.md", "h2", None).await.unwrap();
        assert_eq!(r2.current_version, 2);
        assert_eq!(r2.version_history.len(), 2);
    }

    #[tokio::test]
    async fn delete_marks_exists_false_but_retains_history() {
        let temp = tempfile::TempDir::new().unwrap();
        let index = MetadataIndex::load(temp.path()).await.unwrap();
        index.append_version("a.md", "h1", None).await.unwrap();
        index.delete("a.md").await.unwrap();
        let record = index.get("a.md").await.unwrap();
        assert!(!record.exists);
        assert_eq!(record.version_history.len(), 1);
    }

    #[tokio::test]
    async fn reload_round_trips_through_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        {
            let index = MetadataIndex::load(temp.path()).await.unwrap();
            index.append_version("a.md", "h1", None).await.unwrap();
            index.flush().await.unwrap();
        }
        let index2 = MetadataIndex::load(temp.path()).await.unwrap();
        let record = index2.get("a.md").await.unwrap();
        assert_eq!(record.sha256, "h1");
    }

    #[tokio::test]
    async fn corrupted_index_fails_to_load() {
        let temp = tempfile::TempDir::new().unwrap();
        tokio::fs::write(temp.path().join("index.json"), b"{}").await.unwrap();
        tokio::fs::write(temp.path().join("index.json.sha256"), "deadbeef")
            .await
            .unwrap();
        let result = MetadataIndex::load(temp.path()).await;
        assert!(matches!(result, Err(BankError::IndexCorrupted { .. })));
    }
}
