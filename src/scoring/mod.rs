//! Relevance scorer (C7): keyword + dependency + recency + quality scoring,
//! with a FIFO-evicted dependency-score cache.
//!
//! Keyword scoring is grounded on the corpus's `memory/retrieval.rs`
//! keyword-extraction-and-scoring shape; the dependency cache is grounded on
//! `cache/mod.rs`'s fixed-capacity map, adapted here to FIFO eviction rather
//! than that module's LRU policy.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::core::config::ScoringConfig;
use crate::dep_graph::DependencyGraph;
use crate::tokens;

/// Per-file components feeding the score formula.
#[derive(Debug, Clone)]
pub struct ScoringInput<'a> {
    pub name: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub mtime: DateTime<Utc>,
    pub quality: f64,
}

/// `score(f,q) = w_k*keyword + w_d*dependency + w_r*recency + w_q*quality`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreBreakdown {
    pub keyword: f64,
    pub dependency: f64,
    pub recency: f64,
    pub quality: f64,
    pub total: f64,
}

/// Fixed-capacity FIFO cache for dependency scores, keyed by a SHA-256 of the
/// rounded keyword-score map. Sound because `dependency(f,q)` depends only on
/// that map plus the static graph, both captured by the key.
struct DependencyCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, HashMap<String, f64>>,
}

impl DependencyCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn get(&self, key: &str) -> Option<&HashMap<String, f64>> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: String, value: HashMap<String, f64>) {
        if !self.entries.contains_key(&key) {
            if self.order.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
            self.order.push_back(key.clone());
        }
        self.entries.insert(key, value);
    }
}

/// Scores files and sections against a query, with a bounded dependency cache.
pub struct RelevanceScorer {
    config: ScoringConfig,
    dependency_cache: Mutex<DependencyCache>,
}

impl RelevanceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        let cap = config.dependency_cache_cap;
        Self {
            config,
            dependency_cache: Mutex::new(DependencyCache::new(cap)),
        }
    }

    /// Score every file in `inputs` against `query`, given the selected seed
    /// set (files already chosen, used for dependency affinity) and the graph.
    pub fn score_all(
        &self,
        query: &str,
        inputs: &[ScoringInput<'_>],
        seed_set: &[String],
        graph: &DependencyGraph,
    ) -> HashMap<String, ScoreBreakdown> {
        let query_tokens = keyword_set(query);
        let mut keyword_scores = HashMap::new();
        for input in inputs {
            keyword_scores.insert(input.name.to_string(), keyword_score(&query_tokens, input));
        }

        let cache_key = dependency_cache_key(&keyword_scores);
        let dependency_scores = {
            let mut cache = self.dependency_cache.lock().expect("cache poisoned");
            if let Some(cached) = cache.get(&cache_key) {
                cached.clone()
            } else {
                let computed = self.compute_dependency_scores(inputs, seed_set, graph);
                cache.insert(cache_key, computed.clone());
                computed
            }
        };

        let mut out = HashMap::new();
        for input in inputs {
            let keyword = keyword_scores[input.name];
            let dependency = *dependency_scores.get(input.name).unwrap_or(&0.0);
            let recency = recency_score(input.mtime, self.config.recency_half_life_days);
            let quality = input.quality.clamp(0.0, 1.0);
            let total = self.config.w_keyword * keyword
                + self.config.w_dependency * dependency
                + self.config.w_recency * recency
                + self.config.w_quality * quality;
            out.insert(
                input.name.to_string(),
                ScoreBreakdown {
                    keyword,
                    dependency,
                    recency,
                    quality,
                    total: total.clamp(0.0, 1.0),
                },
            );
        }
        out
    }

    fn compute_dependency_scores(
        &self,
        inputs: &[ScoringInput<'_>],
        seed_set: &[String],
        graph: &DependencyGraph,
    ) -> HashMap<String, f64> {
        if seed_set.is_empty() {
            return inputs.iter().map(|i| (i.name.to_string(), 0.0)).collect();
        }
        let seed_total = seed_set.len().max(1) as f64;
        inputs
            .iter()
            .map(|input| {
                let related = seed_set
                    .iter()
                    .filter(|s| {
                        s.as_str() != input.name
                            && (graph.dependencies(s, false).iter().any(|d| d == input.name)
                                || graph.dependents(s, false).iter().any(|d| d == input.name))
                    })
                    .count();
                (input.name.to_string(), (related as f64 / seed_total).min(1.0))
            })
            .collect()
    }

    /// Score a single section's text, inheriting the file's non-keyword components.
    pub fn score_section(
        &self,
        query: &str,
        section_text: &str,
        file_non_keyword: &ScoreBreakdown,
    ) -> ScoreBreakdown {
        let query_tokens = keyword_set(query);
        let section_tokens = keyword_set(section_text);
        let keyword = jaccard_like(&query_tokens, &section_tokens);
        let total = self.config.w_keyword * keyword
            + self.config.w_dependency * file_non_keyword.dependency
            + self.config.w_recency * file_non_keyword.recency
            + self.config.w_quality * file_non_keyword.quality;
        ScoreBreakdown {
            keyword,
            dependency: file_non_keyword.dependency,
            recency: file_non_keyword.recency,
            quality: file_non_keyword.quality,
            total: total.clamp(0.0, 1.0),
        }
    }
}

fn keyword_set(text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for token in tokens::tokenize(text) {
        let lower = token.to_lowercase();
        if lower.chars().any(|c| c.is_alphanumeric()) {
            *counts.entry(lower).or_insert(0u32) += 1;
        }
    }
    counts
}

fn keyword_score(query_tokens: &HashMap<String, u32>, input: &ScoringInput<'_>) -> f64 {
    let content_tokens = keyword_set(&format!("{} {}", input.title, input.content));
    jaccard_like(query_tokens, &content_tokens)
}

fn jaccard_like(a: &HashMap<String, u32>, b: &HashMap<String, u32>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut overlap = 0.0;
    let mut query_total = 0.0;
    for (term, qcount) in a {
        query_total += *qcount as f64;
        if let Some(&dcount) = b.get(term) {
            overlap += (*qcount as f64).min(dcount as f64);
        }
    }
    if query_total == 0.0 {
        0.0
    } else {
        (overlap / query_total).clamp(0.0, 1.0)
    }
}

fn recency_score(mtime: DateTime<Utc>, half_life_days: f64) -> f64 {
    let age_days = (Utc::now() - mtime).num_seconds() as f64 / 86_400.0;
    let age_days = age_days.max(0.0);
    0.5_f64.powf(age_days / half_life_days.max(0.001))
}

fn dependency_cache_key(keyword_scores: &HashMap<String, f64>) -> String {
    let mut pairs: Vec<_> = keyword_scores
        .iter()
        .map(|(name, score)| format!("{name}:{:.3}", score))
        .collect();
    pairs.sort();
    crate::file_layer::hash_bytes(pairs.join(",").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(name: &'a str, title: &'a str, content: &'a str, days_old: i64) -> ScoringInput<'a> {
        ScoringInput {
            name,
            title,
            content,
            mtime: Utc::now() - chrono::Duration::days(days_old),
            quality: 0.5,
        }
    }

    #[test]
    fn keyword_match_increases_score() {
        let scorer = RelevanceScorer::new(ScoringConfig::default());
        let graph = DependencyGraph::new();
        let inputs = vec![
            input("a.md", "Auth Flow", "login session token auth", 1),
            input("b.md", "Unrelated", "gardening recipes weather", 1),
        ];
        let scores = scorer.score_all("auth token", &inputs, &[], &graph);
        assert!(scores["a.md"].keyword > scores["b.md"].keyword);
    }

    #[test]
    fn recency_decays_with_age() {
        let scorer = RelevanceScorer::new(ScoringConfig::default());
        let graph = DependencyGraph::new();
        let inputs = vec![input("fresh.md", "x", "x", 0), input("old.md", "x", "x", 90)];
        let scores = scorer.score_all("x", &inputs, &[], &graph);
        assert!(scores["fresh.md"].recency > scores["old.md"].recency);
    }

    #[test]
    fn dependency_cache_hit_matches_miss_byte_for_byte() {
        let scorer = RelevanceScorer::new(ScoringConfig::default());
        let mut graph = DependencyGraph::new();
        graph.add_edge(
            "a.md",
            "b.md",
            crate::dep_graph::DependencyEdge {
                kind: crate::metadata_index::model::LinkTargetKind::Markdown,
                source_line: 1,
            },
        );
        let inputs = vec![input("a.md", "x", "x", 1), input("b.md", "x", "x", 1)];
        let seed = vec!["a.md".to_string()];
        let first = scorer.score_all("x", &inputs, &seed, &graph);
        let second = scorer.score_all("x", &inputs, &seed, &graph);
        assert_eq!(first["b.md"].dependency, second["b.md"].dependency);
    }
}
