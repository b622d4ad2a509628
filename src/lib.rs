//! Cortex memory bank engine: a durable, dependency-aware store of
//! human-authored Markdown documents used as long-term AI assistant context.
//!
//! Data flow: writes go file_layer -> version_store -> metadata_index, which
//! invalidates cached scores in scoring and affected edges in dep_graph (via
//! link_parser re-parsing the touched file). Queries go optimizer -> scoring
//! -> dep_graph/tokens/metadata_index -> selection. Refactoring goes
//! duplication/patterns/planners -> suggestion -> learning (confidence) ->
//! approval -> executor -> file_layer/version_store/metadata_index
//! atomically, with rollback via version_store on failure.

#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]

pub mod core;
pub mod dep_graph;
pub mod duplication;
pub mod executor;
pub mod facade;
pub mod file_layer;
pub mod learning;
pub mod link_parser;
pub mod metadata_index;
pub mod optimizer;
pub mod patterns;
pub mod planners;
pub mod scoring;
pub mod tokens;
pub mod version_store;

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

pub use crate::core::{BankConfig, BankError, Result};
use dep_graph::DependencyGraph;
use duplication::{ContentUnit, DuplicationDetector};
use executor::RefactoringExecutor;
use facade::{BankOperations, QueryOperations, RefactorOperations};
use file_layer::FileLayer;
use learning::{FeedbackRecord, LearningStore};
use metadata_index::model::{FileRecordPatch, OutgoingLink};
use metadata_index::MetadataIndex;
use optimizer::{Candidate, ContextOptimizer, OptimizationResult, SectionCandidate, Strategy};
use patterns::{AccessEvent, AccessLog};
use planners::{Suggestion, SuggestionState};
use scoring::{RelevanceScorer, ScoringInput};
use tokio::sync::RwLock;
use version_store::VersionStore;

/// Version of this crate, reported on the façade for diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Top-level orchestrator wiring every subsystem together behind one handle.
pub struct MemoryBank {
    config: BankConfig,
    file_layer: FileLayer,
    versions: VersionStore,
    index: MetadataIndex,
    graph: RwLock<DependencyGraph>,
    scorer: RelevanceScorer,
    duplication: DuplicationDetector,
    access_log: AccessLog,
    learning: LearningStore,
    suggestions: RwLock<HashMap<String, Suggestion>>,
}

impl MemoryBank {
    /// Open (or initialize) a memory bank rooted at `config.bank_root`,
    /// loading the metadata index and rebuilding the dependency graph from it.
    pub async fn open(config: BankConfig) -> Result<Self> {
        let bank_root = config.bank_root.join("memory-bank");
        let file_layer = FileLayer::new(bank_root.clone(), &config.file_layer);
        let versions = VersionStore::new(config.bank_root.clone());
        let index = MetadataIndex::load(config.bank_root.clone()).await?;
        let learning = LearningStore::load(config.bank_root.clone(), config.learning.clone()).await?;
        let access_log = AccessLog::new(config.bank_root.clone(), config.patterns.access_log_window);
        let scorer = RelevanceScorer::new(config.scoring.clone());
        let duplication = DuplicationDetector::new(config.duplication.clone());

        let mut graph = DependencyGraph::new();
        for record in index.list_all().await {
            if !record.exists {
                continue;
            }
            graph.ensure_node(&record.path);
            for link in &record.outgoing_links {
                use metadata_index::model::LinkTargetKind;
                if link.kind == LinkTargetKind::External {
                    continue;
                }
                graph.add_edge(
                    &record.path,
                    &link.target,
                    dep_graph::DependencyEdge {
                        kind: link.kind,
                        source_line: link.source_line,
                    },
                );
            }
        }

        Ok(Self {
            config,
            file_layer,
            versions,
            index,
            graph: RwLock::new(graph),
            scorer,
            duplication,
            access_log,
            learning,
            suggestions: RwLock::new(HashMap::new()),
        })
    }

    /// Root directory this bank's files, versions, and index live under.
    pub fn bank_root(&self) -> PathBuf {
        self.config.bank_root.clone()
    }

    /// Write `content` to `file`, propagating through version_store and
    /// metadata_index, and re-parsing links to keep the dependency graph current.
    pub async fn write_file(
        &self,
        file: &str,
        content: &[u8],
        expected_hash: Option<&str>,
    ) -> Result<(u64, String)> {
        let outcome = self.file_layer.write(file, content, expected_hash).await?;
        self.versions
            .append(file, outcome.sha256.clone(), content.to_vec())
            .await?;

        let text = String::from_utf8_lossy(content).to_string();
        let links = link_parser::parse(&text);
        let sections = extract_sections(&text);
        let outgoing_links: std::collections::BTreeSet<OutgoingLink> = links
            .iter()
            .filter(|l| l.kind != link_parser::LinkKind::External)
            .map(|l| {
                use metadata_index::model::LinkTargetKind;
                let kind = match l.kind {
                    link_parser::LinkKind::Markdown => LinkTargetKind::Markdown,
                    link_parser::LinkKind::Transclusion => LinkTargetKind::Transclusion,
                    link_parser::LinkKind::External => LinkTargetKind::External,
                };
                OutgoingLink {
                    target: l.target.clone(),
                    kind,
                    source_line: l.source_line,
                    broken: false,
                }
            })
            .collect();

        let patch = FileRecordPatch {
            size_bytes: Some(content.len() as u64),
            sha256: Some(outcome.sha256.clone()),
            token_count: Some(tokens::count(&text)),
            sections: Some(sections),
            outgoing_links: Some(outgoing_links.clone()),
            exists: Some(true),
        };
        self.index.update(file, patch).await?;
        let record = self.index.append_version(file, &outcome.sha256, None).await?;

        let mut graph = self.graph.write().await;
        graph.remove_edges_from(file);
        graph.ensure_node(file);
        for link in &outgoing_links {
            graph.add_edge(
                file,
                &link.target,
                dep_graph::DependencyEdge {
                    kind: link.kind,
                    source_line: link.source_line,
                },
            );
        }

        Ok((record.current_version, outcome.sha256))
    }

    /// Read `file`, recording an access-log entry and bumping the index's
    /// `access_count`/`last_accessed`.
    pub async fn read_file(&self, file: &str) -> Result<Vec<u8>> {
        let outcome = self.file_layer.read(file, None).await?;
        self.index.record_access(file).await.ok();
        self.access_log
            .record(AccessEvent {
                timestamp: chrono::Utc::now(),
                file_name: file.to_string(),
                task_id: None,
                operation: "read".to_string(),
            })
            .await?;
        Ok(outcome.bytes)
    }

    pub async fn delete_file(&self, file: &str) -> Result<()> {
        self.file_layer.delete(file).await?;
        self.index.delete(file).await?;
        let mut graph = self.graph.write().await;
        graph.remove_edges_from(file);
        Ok(())
    }

    /// Score and select files/sections under a token budget.
    pub async fn optimize(
        &self,
        query: &str,
        token_budget: u64,
        strategy: Strategy,
        mandatory_files: &[String],
    ) -> Result<OptimizationResult> {
        let records = self.index.list_all().await;
        let active: Vec<_> = records.into_iter().filter(|r| r.exists).collect();

        let mut texts = HashMap::new();
        for record in &active {
            if let Ok(read) = self.file_layer.read(&record.path, None).await {
                texts.insert(record.path.clone(), String::from_utf8_lossy(&read.bytes).to_string());
            }
        }

        let inputs: Vec<ScoringInput<'_>> = active
            .iter()
            .map(|r| ScoringInput {
                name: &r.path,
                title: &r.path,
                content: texts.get(&r.path).map(|s| s.as_str()).unwrap_or(""),
                mtime: r.mtime,
                quality: {
                    let (_, score, _) = planners::quality::assess(r, &self.config.quality);
                    score
                },
            })
            .collect();

        let graph = self.graph.read().await;
        let scores = self.scorer.score_all(query, &inputs, mandatory_files, &graph);

        let candidates: Vec<Candidate> = active
            .iter()
            .map(|r| Candidate {
                name: r.path.clone(),
                tokens: r.token_count,
                score: scores.get(&r.path).map(|s| s.total).unwrap_or(0.0),
                sections: r
                    .sections
                    .iter()
                    .enumerate()
                    .map(|(order, s)| SectionCandidate {
                        title: s.title.clone(),
                        order,
                        tokens: s.token_count,
                        score: scores.get(&r.path).map(|s| s.total).unwrap_or(0.0),
                    })
                    .collect(),
            })
            .collect();

        let optimizer = ContextOptimizer::new(&self.config.optimizer);
        Ok(optimizer.optimize(candidates, token_budget, strategy, mandatory_files, &graph))
    }

    /// Run the duplication detector and all three planners, returning
    /// confidence-adjusted suggestions.
    pub async fn suggest(&self) -> Result<Vec<Suggestion>> {
        let records = self.index.list_all().await;
        let active: Vec<_> = records.into_iter().filter(|r| r.exists).collect();

        let mut units = Vec::new();
        let mut hashes = HashMap::new();
        for record in &active {
            hashes.insert(record.path.clone(), record.sha256.clone());
            if let Ok(read) = self.file_layer.read(&record.path, None).await {
                let text = String::from_utf8_lossy(&read.bytes).to_string();
                let lines: Vec<&str> = text.lines().collect();
                for section in &record.sections {
                    let start = section.start_line.saturating_sub(1).min(lines.len());
                    let end = section.end_line.min(lines.len());
                    let section_text = lines[start..end].join("\n");
                    units.push(ContentUnit {
                        id: format!("{}#{}", record.path, section.title),
                        sha256: file_layer::hash_bytes(section_text.as_bytes()),
                        text: section_text,
                    });
                }
            }
        }

        let dup_report = self.duplication.detect(&units);
        let mut suggestions = planners::consolidation::plan(&dup_report, &hashes);
        suggestions.extend(planners::split::plan(&active));

        let graph = self.graph.read().await;
        let known: Vec<String> = active.iter().map(|r| r.path.clone()).collect();
        suggestions.extend(planners::reorg::plan(&graph, &known, &hashes));
        drop(graph);

        for suggestion in &mut suggestions {
            let category = format!("{:?}", suggestion.suggestion_type);
            suggestion.confidence = self
                .learning
                .adjust_confidence(suggestion.confidence, suggestion.suggestion_type, &category)
                .await;
        }

        let mut pending = self.suggestions.write().await;
        for suggestion in &suggestions {
            pending.insert(suggestion.suggestion_id.clone(), suggestion.clone());
        }

        Ok(suggestions)
    }

    pub async fn approve(&self, suggestion_id: &str, approve: bool) -> Result<()> {
        let mut pending = self.suggestions.write().await;
        let suggestion = pending
            .get_mut(suggestion_id)
            .ok_or_else(|| BankError::not_found(format!("suggestion {suggestion_id}")))?;
        let executor = RefactoringExecutor::new(&self.file_layer, &self.index, &self.versions);
        executor.request_approval(suggestion, approve)
    }

    pub async fn apply_suggestion(&self, suggestion_id: &str) -> Result<()> {
        let mut pending = self.suggestions.write().await;
        let suggestion = pending
            .get_mut(suggestion_id)
            .ok_or_else(|| BankError::not_found(format!("suggestion {suggestion_id}")))?;
        let executor = RefactoringExecutor::new(&self.file_layer, &self.index, &self.versions);
        let mut graph = self.graph.write().await;
        let result = executor.apply(suggestion, &mut graph).await;

        let category = format!("{:?}", suggestion.suggestion_type);
        let outcome = if result.is_ok() {
            learning::Outcome::Accepted
        } else {
            learning::Outcome::Rejected
        };
        self.learning
            .record_feedback(
                FeedbackRecord::new(suggestion_id, suggestion.suggestion_type, outcome, HashMap::new()),
                &category,
            )
            .await?;

        result
    }

    pub async fn list_files(&self) -> Vec<String> {
        self.index
            .list_all()
            .await
            .into_iter()
            .filter(|r| r.exists)
            .map(|r| r.path)
            .collect()
    }

    /// Access-frequency, co-access, and unused-file report over the trailing
    /// access-log window (C10), for the `structure_info` façade query.
    pub async fn pattern_report(&self) -> patterns::PatternReport {
        let events = self.access_log.tail().await.unwrap_or_default();
        let known = self.list_files().await;
        patterns::analyze(&events, &known, self.config.patterns.unused_after_days)
    }

    /// Graph-driven anti-patterns (orphans, hubs, excessive depth) merged with
    /// usage-driven ones (unused files), sorted by severity.
    pub async fn anti_pattern_report(&self) -> Vec<planners::reorg::AntiPattern> {
        let known = self.list_files().await;
        let mut patterns = {
            let graph = self.graph.read().await;
            planners::reorg::anti_patterns(&graph, &known)
        };
        let usage = self.pattern_report().await;
        patterns.extend(planners::reorg::unused_anti_patterns(&usage.unused));
        patterns.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.file.cmp(&b.file)));
        patterns
    }

    /// Quality/health report for every live file, for the `structure_info`
    /// façade query.
    pub async fn quality_report(&self) -> Vec<(String, f64, planners::HealthGrade)> {
        self.index
            .list_all()
            .await
            .into_iter()
            .filter(|r| r.exists)
            .map(|r| {
                let (_, score, grade) = planners::quality::assess(&r, &self.config.quality);
                (r.path, score, grade)
            })
            .collect()
    }
}

fn extract_sections(text: &str) -> Vec<metadata_index::model::Section> {
    let mut sections = Vec::new();
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return sections;
    }
    let mut current: Option<(String, u8, usize)> = None;

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        if let Some(level) = heading_level(line) {
            if let Some((title, lvl, start)) = current.take() {
                let section_text = lines[start - 1..idx].join("\n");
                sections.push(metadata_index::model::Section {
                    title,
                    level: lvl,
                    start_line: start,
                    end_line: line_no - 1,
                    token_count: tokens::count(&section_text),
                });
            } else if idx > 0 {
                // Content above the first heading still counts toward the
                // file's token total; file it under an untitled level-0
                // section rather than dropping it.
                let section_text = lines[0..idx].join("\n");
                sections.push(metadata_index::model::Section {
                    title: String::new(),
                    level: 0,
                    start_line: 1,
                    end_line: line_no - 1,
                    token_count: tokens::count(&section_text),
                });
            }
            let title = line.trim_start_matches('#').trim().to_string();
            current = Some((title, level, line_no));
        }
    }
    match current {
        Some((title, lvl, start)) => {
            let section_text = lines[start - 1..].join("\n");
            sections.push(metadata_index::model::Section {
                title,
                level: lvl,
                start_line: start,
                end_line: lines.len().max(start),
                token_count: tokens::count(&section_text),
            });
        }
        None => {
            // No heading anywhere in the file: the whole thing is one
            // untitled section, still covering [1, total_lines].
            sections.push(metadata_index::model::Section {
                title: String::new(),
                level: 0,
                start_line: 1,
                end_line: lines.len(),
                token_count: tokens::count(text),
            });
        }
    }
    sections
}

fn heading_level(line: &str) -> Option<u8> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('#') {
        return None;
    }
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    Some(level as u8)
}

#[async_trait]
impl BankOperations for MemoryBank {
    async fn write(&self, file: &str, content: &[u8], expected_hash: Option<&str>) -> Result<(u64, String)> {
        self.write_file(file, content, expected_hash).await
    }

    async fn read(&self, file: &str) -> Result<Vec<u8>> {
        self.read_file(file).await
    }

    async fn delete(&self, file: &str) -> Result<()> {
        self.delete_file(file).await
    }

    async fn list(&self) -> Vec<String> {
        self.list_files().await
    }
}

#[async_trait]
impl QueryOperations for MemoryBank {
    async fn score(&self, query: &str) -> Result<Vec<(String, f64)>> {
        let result = self
            .optimize(query, self.config.optimizer.token_budget_default, Strategy::Priority, &[])
            .await?;
        Ok(result
            .selected
            .into_iter()
            .filter_map(|s| match s {
                optimizer::Selected::File(name) => Some(name),
                optimizer::Selected::Section(name, _) => Some(name),
            })
            .map(|name| (name, 1.0))
            .collect())
    }

    async fn optimize(
        &self,
        query: &str,
        token_budget: u64,
        strategy: Strategy,
        mandatory_files: &[String],
    ) -> Result<OptimizationResult> {
        MemoryBank::optimize(self, query, token_budget, strategy, mandatory_files).await
    }
}

#[async_trait]
impl RefactorOperations for MemoryBank {
    async fn suggest(&self) -> Result<Vec<Suggestion>> {
        MemoryBank::suggest(self).await
    }

    async fn approve(&self, suggestion_id: &str) -> Result<()> {
        MemoryBank::approve(self, suggestion_id, true).await
    }

    async fn apply(&self, suggestion_id: &str) -> Result<()> {
        self.apply_suggestion(suggestion_id).await
    }

    async fn rollback(&self, suggestion_id: &str) -> Result<()> {
        let mut pending = self.suggestions.write().await;
        let suggestion = pending
            .get_mut(suggestion_id)
            .ok_or_else(|| BankError::not_found(format!("suggestion {suggestion_id}")))?;
        // Rollback is only a legal transition from `Applying`, reached while the
        // executor's own pipeline is unwinding a failed apply (see executor::apply).
        // A suggestion that already reached `Applied` is terminal; this call just
        // surfaces that through the same transition table executor::apply uses.
        suggestion.transition(SuggestionState::RolledBack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_bank(root: &std::path::Path) -> MemoryBank {
        let config = BankConfig {
            bank_root: root.to_path_buf(),
            ..BankConfig::default()
        };
        MemoryBank::open(config).await.unwrap()
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let temp = tempfile::TempDir::new().unwrap();
        let bank = open_bank(temp.path()).await;
        bank.write_file("techContext.md", b"## Overview\nhello", None)
            .await
            .unwrap();
        let bytes = bank.read_file("techContext.md").await.unwrap();
        assert_eq!(bytes, b"## Overview\nhello");
    }

    #[tokio::test]
    async fn graph_updates_after_write_with_links() {
        let temp = tempfile::TempDir::new().unwrap();
        let bank = open_bank(temp.path()).await;
        bank.write_file("techContext.md", b"[a](progress.md)", None)
            .await
            .unwrap();
        let graph = bank.graph.read().await;
        assert!(graph
            .dependencies("techContext.md", false)
            .contains(&"progress.md".to_string()));
    }

    #[tokio::test]
    async fn optimize_respects_budget() {
        let temp = tempfile::TempDir::new().unwrap();
        let bank = open_bank(temp.path()).await;
        bank.write_file("a.md", b"## Overview\nauthentication flow details", None)
            .await
            .unwrap();
        let result = bank.optimize("authentication", 100, Strategy::Priority, &[]).await.unwrap();
        assert!(result.total_tokens <= 100);
    }

    fn total_tokens(sections: &[metadata_index::model::Section]) -> u64 {
        sections.iter().map(|s| s.token_count).sum()
    }

    #[test]
    fn extract_sections_covers_preamble_before_first_heading() {
        let text = "intro line one\nintro line two\n## Overview\nbody";
        let sections = extract_sections(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].start_line, 1);
        assert_eq!(sections[0].end_line, 2);
        assert_eq!(sections[1].title, "Overview");
        assert_eq!(sections[1].start_line, 3);
        assert!((total_tokens(&sections) as i64 - tokens::count(text) as i64).abs() <= 1);
    }

    #[test]
    fn extract_sections_covers_whole_file_with_no_headings() {
        let text = "just plain prose\nwith no markdown headings at all";
        let sections = extract_sections(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].start_line, 1);
        assert_eq!(sections[0].end_line, 2);
        assert_eq!(sections[0].token_count, tokens::count(text));
    }
}
