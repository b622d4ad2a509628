//! Duplication detector (C9): exact-hash clustering plus bucketed similarity
//! comparison, with a fixed-capacity pair cache.
//!
//! Exact clustering is a plain group-by. Similarity comparison is grounded on
//! the corpus's fixed-capacity cache pattern in `cache/mod.rs`, here keyed by
//! `(sha_a, sha_b)` pairs rather than file paths, and restricted to
//! length-bucket pairs rather than the full cross product, for an O(n) + O(k^2)
//! bound instead of O(n^2).

use similar::TextDiff;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::core::config::DuplicationConfig;

/// A content unit considered for duplication (a whole file or a section).
#[derive(Debug, Clone)]
pub struct ContentUnit {
    pub id: String,
    pub sha256: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ExactCluster {
    pub sha256: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SimilarPair {
    pub a: String,
    pub b: String,
    pub ratio: f64,
}

#[derive(Debug, Clone)]
pub struct DuplicationReport {
    pub exact_duplicates: Vec<ExactCluster>,
    pub similar_content: Vec<SimilarPair>,
    pub duplicates_found: usize,
}

struct PairCache {
    capacity: usize,
    order: VecDeque<(String, String)>,
    entries: HashMap<(String, String), f64>,
}

impl PairCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    fn get(&self, a: &str, b: &str) -> Option<f64> {
        self.entries.get(&Self::key(a, b)).copied()
    }

    fn insert(&mut self, a: &str, b: &str, ratio: f64) {
        let key = Self::key(a, b);
        if !self.entries.contains_key(&key) {
            if self.order.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
            self.order.push_back(key.clone());
        }
        self.entries.insert(key, ratio);
    }
}

pub struct DuplicationDetector {
    config: DuplicationConfig,
    cache: Mutex<PairCache>,
}

impl DuplicationDetector {
    pub fn new(config: DuplicationConfig) -> Self {
        let cap = config.similarity_cache_cap;
        Self {
            config,
            cache: Mutex::new(PairCache::new(cap)),
        }
    }

    /// Run both detection phases over `units`.
    pub fn detect(&self, units: &[ContentUnit]) -> DuplicationReport {
        let exact_duplicates = self.exact_clusters(units);
        let clustered: std::collections::HashSet<&str> = exact_duplicates
            .iter()
            .flat_map(|c| c.members.iter().map(|s| s.as_str()))
            .collect();

        let similar_content = self.similar_pairs(units, &clustered);
        let duplicates_found = exact_duplicates
            .iter()
            .map(|c| c.members.len())
            .sum::<usize>()
            + similar_content.len();

        DuplicationReport {
            exact_duplicates,
            similar_content,
            duplicates_found,
        }
    }

    fn exact_clusters(&self, units: &[ContentUnit]) -> Vec<ExactCluster> {
        let mut by_hash: HashMap<&str, Vec<String>> = HashMap::new();
        for unit in units {
            by_hash.entry(unit.sha256.as_str()).or_default().push(unit.id.clone());
        }
        by_hash
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(sha256, members)| ExactCluster {
                sha256: sha256.to_string(),
                members,
            })
            .collect()
    }

    /// Bucket by length quartile (not full cross-product) and compare only
    /// within-bucket pairs, for an O(n)+O(k^2) bound instead of O(n^2).
    fn similar_pairs(
        &self,
        units: &[ContentUnit],
        skip_ids: &std::collections::HashSet<&str>,
    ) -> Vec<SimilarPair> {
        let mut buckets: HashMap<usize, Vec<&ContentUnit>> = HashMap::new();
        for unit in units {
            if skip_ids.contains(unit.id.as_str()) {
                continue;
            }
            let bucket = length_bucket(unit.text.len());
            buckets.entry(bucket).or_default().push(unit);
        }

        let mut pairs = Vec::new();
        for bucket in buckets.values() {
            for i in 0..bucket.len() {
                for j in (i + 1)..bucket.len() {
                    let a = bucket[i];
                    let b = bucket[j];
                    let ratio = self.similarity_ratio(a, b);
                    if ratio >= self.config.similarity_threshold {
                        pairs.push(SimilarPair {
                            a: a.id.clone(),
                            b: b.id.clone(),
                            ratio,
                        });
                    }
                }
            }
        }
        pairs
    }

    fn similarity_ratio(&self, a: &ContentUnit, b: &ContentUnit) -> f64 {
        if let Some(cached) = self.cache.lock().expect("cache poisoned").get(&a.sha256, &b.sha256) {
            return cached;
        }
        let ratio = TextDiff::from_words(&a.text, &b.text).ratio() as f64;
        self.cache
            .lock()
            .expect("cache poisoned")
            .insert(&a.sha256, &b.sha256, ratio);
        ratio
    }
}

fn length_bucket(len: usize) -> usize {
    (len / 200).min(64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, sha: &str, text: &str) -> ContentUnit {
        ContentUnit {
            id: id.to_string(),
            sha256: sha.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn exact_duplicates_group_by_hash() {
        let detector = DuplicationDetector::new(DuplicationConfig::default());
        let units = vec![
            unit("a.md#Testing", "h1", "identical testing section content"),
            unit("b.md#Testing", "h1", "identical testing section content"),
            unit("c.md#Other", "h2", "unrelated content"),
        ];
        let report = detector.detect(&units);
        assert_eq!(report.exact_duplicates.len(), 1);
        assert_eq!(report.exact_duplicates[0].members.len(), 2);
    }

    #[test]
    fn similarity_is_symmetric_and_excludes_self_pairs() {
        let detector = DuplicationDetector::new(DuplicationConfig::default());
        let ab = detector.similarity_ratio(
            &unit("a", "ha", "the quick brown fox jumps over the lazy dog"),
            &unit("b", "hb", "the quick brown fox jumps over the lazy cat"),
        );
        let ba = detector.similarity_ratio(
            &unit("b", "hb", "the quick brown fox jumps over the lazy cat"),
            &unit("a", "ha", "the quick brown fox jumps over the lazy dog"),
        );
        assert_eq!(ab, ba);
    }

    #[test]
    fn near_duplicates_flagged_above_threshold() {
        let detector = DuplicationDetector::new(DuplicationConfig::default());
        let units = vec![
            unit("a.md", "ha", "alpha beta gamma delta epsilon zeta eta theta"),
            unit("b.md", "hb", "alpha beta gamma delta epsilon zeta eta iota"),
        ];
        let report = detector.detect(&units);
        assert_eq!(report.similar_content.len(), 1);
        assert!(report.similar_content[0].ratio >= 0.85);
    }
}
