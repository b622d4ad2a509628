//! Split recommender: files above a size or multi-topic threshold get a
//! suggested split at section boundaries.

use std::collections::HashMap;

use crate::metadata_index::model::FileRecord;
use crate::planners::suggestion::{Operation, Suggestion, SuggestionType};

/// Token count above which a file is a split candidate.
pub const SIZE_THRESHOLD_TOKENS: u64 = 4000;
/// Section count above which a file is considered multi-topic.
pub const TOPIC_COUNT_THRESHOLD: usize = 8;

pub fn plan(records: &[FileRecord]) -> Vec<Suggestion> {
    records
        .iter()
        .filter(|r| r.exists && is_split_candidate(r))
        .filter_map(build_suggestion)
        .collect()
}

fn is_split_candidate(record: &FileRecord) -> bool {
    record.token_count > SIZE_THRESHOLD_TOKENS || record.sections.len() > TOPIC_COUNT_THRESHOLD
}

fn build_suggestion(record: &FileRecord) -> Option<Suggestion> {
    if record.sections.len() < 2 {
        return None;
    }
    let midpoint = record.sections.len() / 2;
    let tail_sections = &record.sections[midpoint..];
    let new_file = derived_split_name(&record.path);

    let mut operations = Vec::new();
    let tail_content: String = tail_sections
        .iter()
        .map(|s| format!("## {}\n", s.title))
        .collect();
    operations.push(Operation::CreateFile {
        file: new_file.clone(),
        content: tail_content,
    });
    for section in tail_sections {
        operations.push(Operation::RemoveSection {
            file: record.path.clone(),
            section: section.title.clone(),
        });
    }

    let mut expected_hashes = HashMap::new();
    expected_hashes.insert(record.path.clone(), record.sha256.clone());

    Some(Suggestion::new(
        SuggestionType::Split,
        vec![record.path.clone(), new_file.clone()],
        format!(
            "{} is {} tokens across {} sections; split trailing sections into {new_file}",
            record.path,
            record.token_count,
            record.sections.len()
        ),
        0.6,
        1,
        operations,
        expected_hashes,
    ))
}

fn derived_split_name(path: &str) -> String {
    let stem = path.strip_suffix(".md").unwrap_or(path);
    format!("{stem}-part2.md")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata_index::model::Section;

    fn big_record() -> FileRecord {
        let mut record = FileRecord::new("techContext.md");
        record.exists = true;
        record.token_count = SIZE_THRESHOLD_TOKENS + 1;
        for i in 0..4 {
            record.sections.push(Section {
                title: format!("Section {i}"),
                level: 2,
                start_line: i * 10 + 1,
                end_line: i * 10 + 9,
                token_count: 200,
            });
        }
        record
    }

    #[test]
    fn oversized_file_produces_split_suggestion() {
        let suggestions = plan(&[big_record()]);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].affected_files.len(), 2);
    }

    #[test]
    fn small_file_is_not_a_candidate() {
        let record = FileRecord::new("small.md");
        assert!(plan(&[record]).is_empty());
    }
}
