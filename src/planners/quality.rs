//! Quality metrics per file: completeness, consistency, freshness, structure,
//! efficiency, combined into a weighted score and a letter health grade.

use crate::core::config::QualityWeights;
use crate::metadata_index::model::FileRecord;

#[derive(Debug, Clone, Copy)]
pub struct QualityMetrics {
    pub completeness: f64,
    pub consistency: f64,
    pub freshness: f64,
    pub structure: f64,
    pub efficiency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthGrade {
    A,
    B,
    C,
    D,
    F,
}

impl HealthGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::A
        } else if score >= 0.8 {
            Self::B
        } else if score >= 0.7 {
            Self::C
        } else if score >= 0.6 {
            Self::D
        } else {
            Self::F
        }
    }
}

/// Required section titles for a "complete" file, used by `completeness`.
const REQUIRED_SECTION_HINTS: [&str; 1] = ["Overview"];

pub fn assess(record: &FileRecord, weights: &QualityWeights) -> (QualityMetrics, f64, HealthGrade) {
    let completeness = completeness_score(record);
    let consistency = consistency_score(record);
    let freshness = freshness_score(record);
    let structure = structure_score(record);
    let efficiency = efficiency_score(record);

    let metrics = QualityMetrics {
        completeness,
        consistency,
        freshness,
        structure,
        efficiency,
    };

    let score = weights.completeness * completeness
        + weights.consistency * consistency
        + weights.freshness * freshness
        + weights.structure * structure
        + weights.efficiency * efficiency;

    (metrics, score.clamp(0.0, 1.0), HealthGrade::from_score(score))
}

fn completeness_score(record: &FileRecord) -> f64 {
    if record.sections.is_empty() {
        return 0.0;
    }
    let present = REQUIRED_SECTION_HINTS
        .iter()
        .filter(|hint| record.sections.iter().any(|s| s.title.contains(*hint)))
        .count();
    (present as f64 / REQUIRED_SECTION_HINTS.len() as f64).max(0.5)
}

fn consistency_score(record: &FileRecord) -> f64 {
    if record.sections.len() < 2 {
        return 1.0;
    }
    let levels: Vec<u8> = record.sections.iter().map(|s| s.level).collect();
    let jumps = levels.windows(2).filter(|w| w[1] > w[0] + 1).count();
    1.0 - (jumps as f64 / levels.len() as f64).min(1.0)
}

fn freshness_score(record: &FileRecord) -> f64 {
    let age_days = (chrono::Utc::now() - record.mtime).num_seconds() as f64 / 86_400.0;
    (1.0 - (age_days / 90.0).min(1.0)).max(0.0)
}

fn structure_score(record: &FileRecord) -> f64 {
    if record.sections.is_empty() {
        return 0.3;
    }
    let avg_len: f64 = record
        .sections
        .iter()
        .map(|s| s.token_count as f64)
        .sum::<f64>()
        / record.sections.len() as f64;
    let balance = record
        .sections
        .iter()
        .map(|s| 1.0 - ((s.token_count as f64 - avg_len).abs() / avg_len.max(1.0)).min(1.0))
        .sum::<f64>()
        / record.sections.len() as f64;
    balance.clamp(0.0, 1.0)
}

fn efficiency_score(record: &FileRecord) -> f64 {
    if record.token_count == 0 {
        return 0.0;
    }
    let useful_units = record.sections.len().max(1) as f64;
    let tokens_per_unit = record.token_count as f64 / useful_units;
    (400.0 / tokens_per_unit.max(1.0)).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata_index::model::Section;

    #[test]
    fn grade_thresholds_are_fixed() {
        assert_eq!(HealthGrade::from_score(0.95), HealthGrade::A);
        assert_eq!(HealthGrade::from_score(0.65), HealthGrade::D);
        assert_eq!(HealthGrade::from_score(0.2), HealthGrade::F);
    }

    #[test]
    fn empty_file_scores_low_completeness() {
        let record = FileRecord::new("a.md");
        let (metrics, _score, _grade) = assess(&record, &QualityWeights::default());
        assert_eq!(metrics.completeness, 0.0);
    }

    #[test]
    fn file_with_overview_section_scores_complete() {
        let mut record = FileRecord::new("a.md");
        record.sections.push(Section {
            title: "Overview".into(),
            level: 1,
            start_line: 1,
            end_line: 10,
            token_count: 50,
        });
        let (metrics, _score, _grade) = assess(&record, &QualityWeights::default());
        assert_eq!(metrics.completeness, 1.0);
    }
}
