//! Reorganization planner: graph-driven orphan/hub/depth detection plus
//! anti-pattern reporting, grounded on the corpus's
//! `analysis/dependency.rs` `DependencyStats` complexity-scoring shape.

use std::collections::HashMap;

use crate::dep_graph::DependencyGraph;
use crate::planners::suggestion::{Operation, Suggestion, SuggestionType};

/// In/out-degree above which a file is a "hub".
pub const HUB_DEGREE_THRESHOLD: usize = 8;
/// Dependency-chain depth above which a file is flagged for excessive depth.
pub const DEPTH_THRESHOLD: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct AntiPattern {
    pub file: String,
    pub kind: String,
    pub severity: Severity,
    pub detail: String,
}

pub fn anti_patterns(graph: &DependencyGraph, known_files: &[String]) -> Vec<AntiPattern> {
    let mut patterns = Vec::new();
    for name in known_files {
        let out_degree = graph.dependencies(name, false).len();
        let in_degree = graph.dependents(name, false).len();

        if out_degree == 0 && in_degree == 0 && graph.contains(name) {
            patterns.push(AntiPattern {
                file: name.clone(),
                kind: "orphan".into(),
                severity: Severity::Medium,
                detail: "no incoming or outgoing references".into(),
            });
        }
        if out_degree > HUB_DEGREE_THRESHOLD || in_degree > HUB_DEGREE_THRESHOLD {
            patterns.push(AntiPattern {
                file: name.clone(),
                kind: "hub".into(),
                severity: Severity::High,
                detail: format!("{in_degree} incoming / {out_degree} outgoing references"),
            });
        }
        let depth = graph.dependencies(name, true).len();
        if depth > DEPTH_THRESHOLD {
            patterns.push(AntiPattern {
                file: name.clone(),
                kind: "excessive_depth".into(),
                severity: Severity::Medium,
                detail: format!("transitive dependency closure has {depth} files"),
            });
        }
    }
    patterns.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.file.cmp(&b.file)));
    patterns
}

/// Anti-patterns driven by access history rather than the graph: files the
/// pattern analyzer (C10) has not seen touched within the configured window.
/// Reported for visibility; they do not yet carry a generated operation.
pub fn unused_anti_patterns(unused_files: &[String]) -> Vec<AntiPattern> {
    unused_files
        .iter()
        .map(|file| AntiPattern {
            file: file.clone(),
            kind: "unused".into(),
            severity: Severity::Low,
            detail: "no access within the configured window".into(),
        })
        .collect()
}

/// Emit category/move suggestions from the detected anti-patterns.
pub fn plan(graph: &DependencyGraph, known_files: &[String], hashes: &HashMap<String, String>) -> Vec<Suggestion> {
    let patterns = anti_patterns(graph, known_files);
    let hubs: Vec<&AntiPattern> = patterns.iter().filter(|p| p.kind == "hub").collect();
    if hubs.is_empty() {
        return Vec::new();
    }

    hubs.iter()
        .map(|hub| {
            let mut expected_hashes = HashMap::new();
            if let Some(h) = hashes.get(&hub.file) {
                expected_hashes.insert(hub.file.clone(), h.clone());
            }
            Suggestion::new(
                SuggestionType::Reorganize,
                vec![hub.file.clone()],
                format!("{} is a hub ({}); consider splitting into a category", hub.file, hub.detail),
                0.5,
                2,
                vec![Operation::CreateCategory {
                    name: format!("{}-category", hub.file.trim_end_matches(".md")),
                    members: vec![hub.file.clone()],
                }],
                expected_hashes,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata_index::model::LinkTargetKind;

    #[test]
    fn identifies_orphans_with_no_edges() {
        let mut graph = DependencyGraph::new();
        graph.ensure_node("lonely.md");
        let patterns = anti_patterns(&graph, &["lonely.md".to_string()]);
        assert!(patterns.iter().any(|p| p.kind == "orphan"));
    }

    #[test]
    fn identifies_hubs_above_threshold() {
        let mut graph = DependencyGraph::new();
        for i in 0..(HUB_DEGREE_THRESHOLD + 1) {
            graph.add_edge(
                "hub.md",
                &format!("leaf{i}.md"),
                crate::dep_graph::DependencyEdge {
                    kind: LinkTargetKind::Markdown,
                    source_line: 1,
                },
            );
        }
        let patterns = anti_patterns(&graph, &["hub.md".to_string()]);
        assert!(patterns.iter().any(|p| p.kind == "hub" && p.severity == Severity::High));
    }

    #[test]
    fn unused_files_report_as_low_severity() {
        let patterns = unused_anti_patterns(&["stale.md".to_string()]);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].severity, Severity::Low);
        assert_eq!(patterns[0].kind, "unused");
    }

    #[test]
    fn patterns_sorted_by_severity_descending() {
        let mut graph = DependencyGraph::new();
        graph.ensure_node("a.md");
        for i in 0..(HUB_DEGREE_THRESHOLD + 1) {
            graph.add_edge(
                "hub.md",
                &format!("l{i}.md"),
                crate::dep_graph::DependencyEdge {
                    kind: LinkTargetKind::Markdown,
                    source_line: 1,
                },
            );
        }
        let patterns = anti_patterns(&graph, &["a.md".to_string(), "hub.md".to_string()]);
        assert_eq!(patterns[0].severity, Severity::High);
    }
}
