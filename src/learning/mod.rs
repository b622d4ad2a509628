//! Learning store (C13): feedback history, pattern success rates, and
//! confidence adjustment at read time.
//!
//! Grounded on the corpus's `memory/pattern_learning.rs` `PatternLearner`
//! (pattern signatures with running success rates and sample counts);
//! persisted as `learning.json`, FIFO-pruned once it exceeds the configured
//! retention cap, same as the metadata index's single-file-plus-mirror shape.

pub mod feedback;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::core::config::LearningConfig;
use crate::core::error::Result;
use crate::planners::suggestion::SuggestionType;
pub use feedback::{FeedbackRecord, Outcome};

/// Running statistics for a structural pattern signature (type + affected-category).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PatternStatistics {
    pub sample_count: u64,
    pub success_count: u64,
}

impl PatternStatistics {
    pub fn success_rate(&self) -> f64 {
        if self.sample_count == 0 {
            0.5
        } else {
            self.success_count as f64 / self.sample_count as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LearningDocument {
    feedback: Vec<FeedbackRecord>,
    patterns: HashMap<String, PatternStatistics>,
    preferences: HashMap<String, f64>,
}

pub struct LearningStore {
    path: PathBuf,
    config: LearningConfig,
    document: tokio::sync::RwLock<LearningDocument>,
}

impl LearningStore {
    pub async fn load(bank_root: impl Into<PathBuf>, config: LearningConfig) -> Result<Self> {
        let path = bank_root.into().join("learning.json");
        let document = if path.exists() {
            let bytes = tokio::fs::read(&path).await?;
            serde_json::from_slice(&bytes)?
        } else {
            LearningDocument::default()
        };
        Ok(Self {
            path,
            config,
            document: tokio::sync::RwLock::new(document),
        })
    }

    /// Signature combining suggestion type and an affected-category tag, the
    /// key for the pattern table.
    pub fn signature(suggestion_type: SuggestionType, category: &str) -> String {
        format!("{suggestion_type:?}:{category}")
    }

    /// Record feedback: appends to history, updates the pattern's running
    /// success rate, nudges the per-type preference weight, FIFO-prunes.
    pub async fn record_feedback(
        &self,
        record: FeedbackRecord,
        category: &str,
    ) -> Result<()> {
        let mut doc = self.document.write().await;
        let signature = Self::signature(record.suggestion_type, category);
        let stats = doc.patterns.entry(signature).or_default();
        stats.sample_count += 1;
        if record.outcome == Outcome::Accepted {
            stats.success_count += 1;
        }

        let pref_key = format!("{:?}", record.suggestion_type);
        let current = *doc.preferences.get(&pref_key).unwrap_or(&0.5);
        let delta = match record.outcome {
            Outcome::Accepted => 0.05,
            Outcome::Rejected => -0.05,
            Outcome::Modified => 0.0,
        };
        doc.preferences.insert(pref_key, (current + delta).clamp(0.0, 1.0));

        doc.feedback.push(record);
        if doc.feedback.len() > self.config.retention_cap {
            let overflow = doc.feedback.len() - self.config.retention_cap;
            doc.feedback.drain(0..overflow);
        }

        self.persist(&doc).await
    }

    /// Adjust `confidence` using the pattern's success rate and the per-type
    /// preference weight: pure, side-effect-free — no state changes here.
    /// `c' = clamp(c * (1 + alpha*(pattern.success - 0.5)) + beta*(preference - 0.5), 0, 1)`.
    pub async fn adjust_confidence(
        &self,
        confidence: f64,
        suggestion_type: SuggestionType,
        category: &str,
    ) -> f64 {
        let doc = self.document.read().await;
        let signature = Self::signature(suggestion_type, category);
        let pattern_success = doc
            .patterns
            .get(&signature)
            .map(|s| s.success_rate())
            .unwrap_or(0.5);
        let preference = *doc
            .preferences
            .get(&format!("{suggestion_type:?}"))
            .unwrap_or(&0.5);

        let adjusted = confidence * (1.0 + self.config.alpha * (pattern_success - 0.5))
            + self.config.beta * (preference - 0.5);
        adjusted.clamp(0.0, 1.0)
    }

    pub async fn pattern_stats(&self, suggestion_type: SuggestionType, category: &str) -> PatternStatistics {
        let doc = self.document.read().await;
        doc.patterns
            .get(&Self::signature(suggestion_type, category))
            .cloned()
            .unwrap_or_default()
    }

    async fn persist(&self, doc: &LearningDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(doc)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    #[tokio::test]
    async fn accepted_feedback_raises_future_confidence() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = LearningStore::load(temp.path(), LearningConfig::default()).await.unwrap();

        let baseline = store.adjust_confidence(0.5, SuggestionType::Consolidate, "markdown").await;

        for _ in 0..5 {
            store
                .record_feedback(
                    FeedbackRecord::new("s1", SuggestionType::Consolidate, Outcome::Accepted, Map::new()),
                    "markdown",
                )
                .await
                .unwrap();
        }

        let adjusted = store.adjust_confidence(0.5, SuggestionType::Consolidate, "markdown").await;
        assert!(adjusted > baseline);
    }

    #[tokio::test]
    async fn retention_cap_prunes_oldest_feedback_fifo() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = LearningConfig::default();
        config.retention_cap = 3;
        let store = LearningStore::load(temp.path(), config).await.unwrap();

        for i in 0..5 {
            store
                .record_feedback(
                    FeedbackRecord::new(format!("s{i}"), SuggestionType::Split, Outcome::Modified, Map::new()),
                    "markdown",
                )
                .await
                .unwrap();
        }

        let doc = store.document.read().await;
        assert_eq!(doc.feedback.len(), 3);
        assert_eq!(doc.feedback[0].suggestion_id, "s2");
    }
}
