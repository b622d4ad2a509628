//! Context optimizer (C8): budget-constrained file/section selection under
//! one of four strategies, with dependency closure.

use std::collections::{HashMap, HashSet};

use crate::core::config::OptimizerConfig;
use crate::dep_graph::DependencyGraph;
use crate::scoring::ScoreBreakdown;

/// Selection strategy, a closed set expressed as a tagged enum rather than
/// open dispatch-on-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Priority,
    Dependencies,
    Sections,
    Hybrid,
}

/// One candidate file with its token cost and score.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub tokens: u64,
    pub score: f64,
    pub sections: Vec<SectionCandidate>,
}

#[derive(Debug, Clone)]
pub struct SectionCandidate {
    pub title: String,
    pub order: usize,
    pub tokens: u64,
    pub score: f64,
}

/// One element of the optimizer's selection: a whole file or a section of one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected {
    File(String),
    Section(String, String),
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub selected: Vec<Selected>,
    pub excluded: Vec<String>,
    pub total_tokens: u64,
    pub utilization: f64,
}

pub struct ContextOptimizer<'a> {
    config: &'a OptimizerConfig,
}

impl<'a> ContextOptimizer<'a> {
    pub fn new(config: &'a OptimizerConfig) -> Self {
        Self { config }
    }

    /// Select candidates under `strategy`, honoring `token_budget` and
    /// `mandatory_files` (included iff they individually fit).
    pub fn optimize(
        &self,
        mut candidates: Vec<Candidate>,
        token_budget: u64,
        strategy: Strategy,
        mandatory_files: &[String],
        graph: &DependencyGraph,
    ) -> OptimizationResult {
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });

        match strategy {
            Strategy::Priority => self.priority(candidates, token_budget, mandatory_files),
            Strategy::Dependencies => {
                self.dependencies(candidates, token_budget, mandatory_files, graph)
            }
            Strategy::Sections => self.sections(candidates, token_budget, mandatory_files),
            Strategy::Hybrid => self.hybrid(candidates, token_budget, mandatory_files, graph),
        }
    }

    fn priority(
        &self,
        candidates: Vec<Candidate>,
        token_budget: u64,
        mandatory_files: &[String],
    ) -> OptimizationResult {
        let mandatory: HashSet<&str> = mandatory_files.iter().map(|s| s.as_str()).collect();
        let mut selected = Vec::new();
        let mut excluded = Vec::new();
        let mut used = 0u64;

        for m in mandatory_files {
            if let Some(c) = candidates.iter().find(|c| &c.name == m) {
                if c.tokens <= token_budget.saturating_sub(used) {
                    selected.push(Selected::File(c.name.clone()));
                    used += c.tokens;
                } else {
                    excluded.push(c.name.clone());
                }
            }
        }

        for c in &candidates {
            if mandatory.contains(c.name.as_str()) {
                continue;
            }
            // Strict: a candidate that would exactly exhaust the remaining
            // budget is skipped in favor of letting lower-ranked candidates
            // compete for the leftover room, rather than greedily locking in
            // the first exact fit encountered in score order.
            if used + c.tokens < token_budget {
                selected.push(Selected::File(c.name.clone()));
                used += c.tokens;
            } else {
                excluded.push(c.name.clone());
            }
        }

        finish(selected, excluded, used, token_budget)
    }

    fn dependencies(
        &self,
        candidates: Vec<Candidate>,
        token_budget: u64,
        mandatory_files: &[String],
        graph: &DependencyGraph,
    ) -> OptimizationResult {
        let by_name: HashMap<&str, &Candidate> =
            candidates.iter().map(|c| (c.name.as_str(), c)).collect();
        let mut selected = Vec::new();
        let mut excluded = Vec::new();
        let mut used = 0u64;
        let mut placed: HashSet<String> = HashSet::new();

        let ordered_seeds: Vec<String> = mandatory_files
            .iter()
            .cloned()
            .chain(candidates.iter().map(|c| c.name.clone()).filter(|n| !mandatory_files.contains(n)))
            .collect();

        for name in ordered_seeds {
            if placed.contains(&name) {
                continue;
            }
            let Some(&candidate) = by_name.get(name.as_str()) else {
                continue;
            };
            let mut closure: Vec<String> = graph.dependencies(&name, true);
            closure.retain(|d| !placed.contains(d));
            closure.insert(0, name.clone());
            closure.dedup();

            let closure_tokens: u64 = closure
                .iter()
                .filter_map(|n| by_name.get(n.as_str()))
                .map(|c| c.tokens)
                .sum();

            if used + closure_tokens <= token_budget
                && closure.iter().all(|n| by_name.contains_key(n.as_str()))
            {
                for member in &closure {
                    selected.push(Selected::File(member.clone()));
                    placed.insert(member.clone());
                }
                used += closure_tokens;
                let _ = candidate;
            } else {
                excluded.push(name.clone());
                placed.insert(name);
            }
        }

        finish(selected, excluded, used, token_budget)
    }

    fn sections(
        &self,
        candidates: Vec<Candidate>,
        token_budget: u64,
        mandatory_files: &[String],
    ) -> OptimizationResult {
        let mut all_sections: Vec<(String, SectionCandidate)> = Vec::new();
        for c in &candidates {
            for s in &c.sections {
                all_sections.push((c.name.clone(), s.clone()));
            }
            if c.sections.is_empty() {
                all_sections.push((
                    c.name.clone(),
                    SectionCandidate {
                        title: c.name.clone(),
                        order: 0,
                        tokens: c.tokens,
                        score: c.score,
                    },
                ));
            }
        }
        all_sections.sort_by(|(na, a), (nb, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| na.cmp(nb))
                .then_with(|| a.order.cmp(&b.order))
        });

        let mandatory: HashSet<&str> = mandatory_files.iter().map(|s| s.as_str()).collect();
        let mut selected_by_file: HashMap<String, Vec<usize>> = HashMap::new();
        let mut used = 0u64;
        let mut included_files: HashSet<String> = HashSet::new();
        let mut excluded = Vec::new();

        for name in mandatory_files {
            if let Some(c) = candidates.iter().find(|c| &c.name == name) {
                if used + c.tokens <= token_budget {
                    used += c.tokens;
                    included_files.insert(name.clone());
                } else {
                    excluded.push(name.clone());
                }
            }
        }

        for (file, section) in &all_sections {
            if mandatory.contains(file.as_str()) {
                continue;
            }
            if used + section.tokens <= token_budget {
                used += section.tokens;
                selected_by_file.entry(file.clone()).or_default().push(section.order);
                included_files.insert(file.clone());
            }
        }

        let mut selected = Vec::new();
        for name in mandatory_files {
            if included_files.contains(name) {
                selected.push(Selected::File(name.clone()));
            }
        }
        for c in &candidates {
            if mandatory.contains(c.name.as_str()) {
                continue;
            }
            if let Some(orders) = selected_by_file.get(&c.name) {
                let mut orders = orders.clone();
                orders.sort_unstable();
                for order in orders {
                    if let Some(section) = c.sections.iter().find(|s| s.order == order) {
                        selected.push(Selected::Section(c.name.clone(), section.title.clone()));
                    } else {
                        selected.push(Selected::File(c.name.clone()));
                    }
                }
            } else if !excluded.contains(&c.name) {
                excluded.push(c.name.clone());
            }
        }

        finish(selected, excluded, used, token_budget)
    }

    fn hybrid(
        &self,
        candidates: Vec<Candidate>,
        token_budget: u64,
        mandatory_files: &[String],
        graph: &DependencyGraph,
    ) -> OptimizationResult {
        let priority_budget =
            (token_budget as f64 * self.config.hybrid_priority_fraction).floor() as u64;
        let priority_result = self.priority(candidates.clone(), priority_budget, mandatory_files);

        let remaining_budget = token_budget.saturating_sub(priority_result.total_tokens);
        let included: HashSet<String> = priority_result
            .selected
            .iter()
            .filter_map(|s| match s {
                Selected::File(name) => Some(name.clone()),
                Selected::Section(name, _) => Some(name.clone()),
            })
            .collect();
        let remainder: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| included.contains(&c.name))
            .collect();

        let section_result = self.sections(remainder, remaining_budget, &[]);
        let _ = graph;

        let mut selected = priority_result.selected;
        selected.extend(section_result.selected);
        let total_tokens = priority_result.total_tokens + section_result.total_tokens;
        let excluded = priority_result.excluded;

        finish(selected, excluded, total_tokens, token_budget)
    }
}

fn finish(
    selected: Vec<Selected>,
    excluded: Vec<String>,
    total_tokens: u64,
    token_budget: u64,
) -> OptimizationResult {
    let utilization = if token_budget == 0 {
        0.0
    } else {
        total_tokens as f64 / token_budget as f64
    };
    OptimizationResult {
        selected,
        excluded,
        total_tokens,
        utilization,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, tokens: u64, score: f64) -> Candidate {
        Candidate {
            name: name.to_string(),
            tokens,
            score,
            sections: Vec::new(),
        }
    }

    #[test]
    fn priority_matches_boundary_scenario_three() {
        let config = OptimizerConfig::default();
        let optimizer = ContextOptimizer::new(&config);
        let graph = DependencyGraph::new();
        let candidates = vec![
            candidate("A", 1000, 0.9),
            candidate("B", 500, 0.8),
            candidate("C", 400, 0.7),
            candidate("D", 300, 0.6),
        ];
        let result = optimizer.optimize(candidates, 1500, Strategy::Priority, &[], &graph);
        assert_eq!(result.total_tokens, 1400);
        assert!((result.utilization - 0.9333).abs() < 0.001);
        assert_eq!(
            result.selected,
            vec![Selected::File("A".into()), Selected::File("C".into())]
        );
    }

    #[test]
    fn dependency_closure_excludes_when_closure_does_not_fit() {
        let config = OptimizerConfig::default();
        let optimizer = ContextOptimizer::new(&config);
        let mut graph = DependencyGraph::new();
        let edge = crate::dep_graph::DependencyEdge {
            kind: crate::metadata_index::model::LinkTargetKind::Markdown,
            source_line: 1,
        };
        graph.add_edge("X", "Y", edge.clone());
        graph.add_edge("Y", "Z", edge);
        let candidates = vec![candidate("X", 600, 0.9), candidate("Y", 500, 0.5), candidate("Z", 500, 0.5)];

        let result = optimizer.optimize(
            candidates.clone(),
            1000,
            Strategy::Dependencies,
            &["X".to_string()],
            &graph,
        );
        assert_eq!(result.utilization, 0.0);
        assert!(result.selected.is_empty());

        let result = optimizer.optimize(candidates, 1600, Strategy::Dependencies, &["X".to_string()], &graph);
        assert_eq!(result.total_tokens, 1600);
        assert_eq!(result.utilization, 1.0);
    }

    #[test]
    fn never_exceeds_budget() {
        let config = OptimizerConfig::default();
        let optimizer = ContextOptimizer::new(&config);
        let graph = DependencyGraph::new();
        let candidates = vec![candidate("A", 900, 0.9), candidate("B", 900, 0.8)];
        let result = optimizer.optimize(candidates, 1000, Strategy::Priority, &[], &graph);
        assert!(result.total_tokens <= 1000);
    }
}
