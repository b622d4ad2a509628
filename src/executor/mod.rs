//! Refactoring executor (C12): validate → approve → capture pre-state →
//! apply → post-validate → (rollback). Strictly sequential per suggestion.
//!
//! Grounded on the corpus's retry/rollback discipline; the dispatch table
//! keyed by operation type expresses a closed set of operations as a tagged
//! variant rather than open dispatch.

use std::collections::HashMap;

use crate::core::error::{BankError, Result};
use crate::dep_graph::DependencyGraph;
use crate::file_layer::FileLayer;
use crate::link_parser;
use crate::metadata_index::model::LinkTargetKind;
use crate::metadata_index::MetadataIndex;
use crate::planners::suggestion::{Operation, Suggestion, SuggestionState};
use crate::version_store::VersionStore;

/// Per-file snapshot version captured before applying a suggestion, so a
/// rollback can restore it exactly.
#[derive(Debug, Clone)]
struct TransactionState {
    transaction_id: String,
    pre_versions: HashMap<String, u64>,
}

pub struct RefactoringExecutor<'a> {
    file_layer: &'a FileLayer,
    index: &'a MetadataIndex,
    versions: &'a VersionStore,
}

impl<'a> RefactoringExecutor<'a> {
    pub fn new(file_layer: &'a FileLayer, index: &'a MetadataIndex, versions: &'a VersionStore) -> Self {
        Self {
            file_layer,
            index,
            versions,
        }
    }

    /// Step 1: validate a suggestion against current state. Files must still
    /// exist and their hashes must match what was recorded at proposal time.
    pub async fn validate(&self, suggestion: &Suggestion) -> Result<()> {
        for file in &suggestion.affected_files {
            let Some(expected) = suggestion.expected_hashes.get(file) else {
                continue;
            };
            match self.index.get(file).await {
                Some(record) if record.exists && &record.sha256 == expected => {}
                Some(_) => {
                    return Err(BankError::Stale {
                        kind: "suggestion".to_string(),
                        reason: format!("{file} has changed since the suggestion was produced"),
                    })
                }
                None => {
                    if !matches!(
                        suggestion_creates(suggestion, file),
                        true
                    ) {
                        return Err(BankError::Stale {
                            kind: "suggestion".to_string(),
                            reason: format!("{file} no longer exists"),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Step 2: request approval. Advances `proposed -> pending_approval` then,
    /// on `approve=true`, `pending_approval -> approved`; on `approve=false`,
    /// `pending_approval -> rejected` (terminal).
    pub fn request_approval(&self, suggestion: &mut Suggestion, approve: bool) -> Result<()> {
        suggestion.transition(SuggestionState::PendingApproval)?;
        if approve {
            suggestion.transition(SuggestionState::Approved)
        } else {
            suggestion.transition(SuggestionState::Rejected)
        }
    }

    /// Steps 3-6: capture pre-state, apply, post-validate, rollback on failure.
    pub async fn apply(&self, suggestion: &mut Suggestion, graph: &mut DependencyGraph) -> Result<()> {
        self.validate(suggestion).await?;
        suggestion.transition(SuggestionState::Applying)?;

        let transaction = self.capture_pre_state(suggestion).await?;

        match self.apply_operations(suggestion).await {
            Ok(()) => {}
            Err(err) => {
                self.rollback(&transaction).await?;
                suggestion.transition(SuggestionState::RolledBack)?;
                return Err(err);
            }
        }

        if let Err(err) = self.post_validate(suggestion, graph).await {
            self.rollback(&transaction).await?;
            suggestion.transition(SuggestionState::RolledBack)?;
            return Err(err);
        }

        suggestion.transition(SuggestionState::Applied)?;
        Ok(())
    }

    async fn capture_pre_state(&self, suggestion: &Suggestion) -> Result<TransactionState> {
        let mut pre_versions = HashMap::new();
        for file in &suggestion.affected_files {
            if let Some(record) = self.index.get(file).await {
                pre_versions.insert(file.clone(), record.current_version);
            }
        }
        Ok(TransactionState {
            transaction_id: suggestion.suggestion_id.clone(),
            pre_versions,
        })
    }

    async fn apply_operations(&self, suggestion: &Suggestion) -> Result<()> {
        for operation in &suggestion.operations {
            self.dispatch(operation).await?;
        }
        Ok(())
    }

    async fn dispatch(&self, operation: &Operation) -> Result<()> {
        match operation {
            Operation::ReplaceSection { file, section, new_content } => {
                self.rewrite_section(file, section, Some(new_content)).await
            }
            Operation::RemoveSection { file, section } => {
                self.rewrite_section(file, section, None).await
            }
            Operation::CreateFile { file, content } => {
                let outcome = self.file_layer.write(file, content.as_bytes(), None).await?;
                self.index.append_version(file, &outcome.sha256, None).await?;
                Ok(())
            }
            Operation::MoveFile { from, to } | Operation::RenameFile { from, to } => {
                let read = self.file_layer.read(from, None).await?;
                self.file_layer.write(to, &read.bytes, None).await?;
                self.file_layer.delete(from).await?;
                self.index.delete(from).await?;
                let outcome = crate::file_layer::hash_bytes(&read.bytes);
                self.index.append_version(to, &outcome, None).await?;
                Ok(())
            }
            Operation::CreateCategory { .. } => Ok(()),
        }
    }

    async fn rewrite_section(&self, file: &str, section: &str, replacement: Option<&str>) -> Result<()> {
        let read = self.file_layer.read(file, None).await?;
        let text = String::from_utf8_lossy(&read.bytes).to_string();
        let rewritten = replace_section_text(&text, section, replacement);
        let outcome = self
            .file_layer
            .write(file, rewritten.as_bytes(), Some(&read.sha256))
            .await?;
        self.index.append_version(file, &outcome.sha256, None).await?;
        Ok(())
    }

    async fn post_validate(&self, suggestion: &Suggestion, graph: &mut DependencyGraph) -> Result<()> {
        for file in &suggestion.affected_files {
            if let Ok(read) = self.file_layer.read(file, None).await {
                let text = String::from_utf8_lossy(&read.bytes).to_string();
                let links = link_parser::parse(&text);
                graph.remove_edges_from(file);
                for link in links {
                    if link.kind == link_parser::LinkKind::External {
                        continue;
                    }
                    let kind = match link.kind {
                        link_parser::LinkKind::Markdown => LinkTargetKind::Markdown,
                        link_parser::LinkKind::Transclusion => LinkTargetKind::Transclusion,
                        link_parser::LinkKind::External => LinkTargetKind::External,
                    };
                    if !self.index.get(&link.target).await.map(|r| r.exists).unwrap_or(false) {
                        return Err(BankError::ValidationFailed {
                            message: format!(
                                "{file} now references missing {} (broken link introduced by refactor)",
                                link.target
                            ),
                        });
                    }
                    graph.add_edge(
                        file,
                        &link.target,
                        crate::dep_graph::DependencyEdge {
                            kind,
                            source_line: link.source_line,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// Restore every file in the transaction to its pre-state snapshot.
    /// Idempotent and append-only: it creates new versions, never deletes history.
    async fn rollback(&self, transaction: &TransactionState) -> Result<()> {
        for (file, version) in &transaction.pre_versions {
            self.versions.rollback(self.file_layer, file, *version).await?;
        }
        let _ = &transaction.transaction_id;
        Ok(())
    }
}

fn suggestion_creates(suggestion: &Suggestion, file: &str) -> bool {
    suggestion.operations.iter().any(|op| {
        matches!(op, Operation::CreateFile { file: f, .. } if f == file)
            || matches!(op, Operation::MoveFile { to, .. } if to == file)
            || matches!(op, Operation::RenameFile { to, .. } if to == file)
    })
}

fn replace_section_text(text: &str, section_title: &str, replacement: Option<&str>) -> String {
    let heading_marker = format!("## {section_title}");
    let mut out = Vec::new();
    let mut skipping = false;
    for line in text.lines() {
        if line.trim_start().starts_with(&heading_marker) {
            skipping = true;
            if let Some(new_content) = replacement {
                out.push(heading_marker.clone());
                out.push(new_content.to_string());
            }
            continue;
        }
        if skipping && line.starts_with("## ") {
            skipping = false;
        }
        if !skipping {
            out.push(line.to_string());
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FileLayerConfig;
    use crate::planners::suggestion::SuggestionType;

    async fn setup() -> (tempfile::TempDir, FileLayer, MetadataIndex, VersionStore) {
        let temp = tempfile::TempDir::new().unwrap();
        let fl = FileLayer::new(temp.path().to_path_buf(), &FileLayerConfig::default());
        let index = MetadataIndex::load(temp.path()).await.unwrap();
        let versions = VersionStore::new(temp.path());
        (temp, fl, index, versions)
    }

    #[tokio::test]
    async fn stale_suggestion_fails_validation() {
        let (_temp, fl, index, versions) = setup().await;
        let outcome = fl.write("a.md", b"original", None).await.unwrap();
        index.append_version("a.md", &outcome.sha256, None).await.unwrap();

        fl.write("a.md", b"changed externally", Some(&outcome.sha256))
            .await
            .unwrap();

        let mut hashes = HashMap::new();
        hashes.insert("a.md".to_string(), outcome.sha256);
        let suggestion = Suggestion::new(
            SuggestionType::Consolidate,
            vec!["a.md".to_string()],
            "test".into(),
            0.8,
            1,
            vec![],
            hashes,
        );

        let executor = RefactoringExecutor::new(&fl, &index, &versions);
        let result = executor.validate(&suggestion).await;
        assert!(matches!(result, Err(BankError::Stale { .. })));
    }

    #[tokio::test]
    async fn rollback_restores_bytes_on_post_validate_failure() {
        let (_temp, fl, index, versions) = setup().await;
        let original = b"## Intro\nhello\n## Links\n[broken](missing.md)\n";
        let outcome = fl.write("a.md", original, None).await.unwrap();
        index.append_version("a.md", &outcome.sha256, None).await.unwrap();

        let mut hashes = HashMap::new();
        hashes.insert("a.md".to_string(), outcome.sha256);
        let mut suggestion = Suggestion::new(
            SuggestionType::Consolidate,
            vec!["a.md".to_string()],
            "test".into(),
            0.8,
            1,
            vec![Operation::ReplaceSection {
                file: "a.md".to_string(),
                section: "Intro".to_string(),
                new_content: "rewritten".to_string(),
            }],
            hashes,
        );
        suggestion.transition(SuggestionState::PendingApproval).unwrap();
        suggestion.transition(SuggestionState::Approved).unwrap();

        let executor = RefactoringExecutor::new(&fl, &index, &versions);
        let mut graph = DependencyGraph::new();
        let result = executor.apply(&mut suggestion, &mut graph).await;
        assert!(result.is_err());
        assert!(matches!(suggestion.state, SuggestionState::RolledBack));

        let read = fl.read("a.md", None).await.unwrap();
        assert_eq!(read.bytes, original);
    }
}
