//! Consolidation planner: turns C9's clusters into suggestions that replace
//! duplicate sections with transclusion to a canonical one.

use std::collections::HashMap;

use crate::duplication::{DuplicationReport, ExactCluster};
use crate::planners::suggestion::{Operation, Suggestion, SuggestionType};

/// Build one suggestion per exact cluster, canonical member = lexicographically
/// first id (stable tie-break), proposing the rest transclude it.
pub fn plan(report: &DuplicationReport, hashes: &HashMap<String, String>) -> Vec<Suggestion> {
    report
        .exact_duplicates
        .iter()
        .filter_map(|cluster| build_suggestion(cluster, hashes))
        .collect()
}

fn build_suggestion(cluster: &ExactCluster, hashes: &HashMap<String, String>) -> Option<Suggestion> {
    let mut members = cluster.members.clone();
    members.sort();
    let canonical = members.first()?.clone();

    let affected_files: Vec<String> = members
        .iter()
        .map(|m| m.split('#').next().unwrap_or(m).to_string())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let operations: Vec<Operation> = members
        .iter()
        .skip(1)
        .map(|member| {
            let (file, section) = split_member(member);
            Operation::ReplaceSection {
                file,
                section: section.to_string(),
                new_content: format!("{{{{include: {canonical}}}}}"),
            }
        })
        .collect();

    let expected_hashes: HashMap<String, String> = affected_files
        .iter()
        .filter_map(|f| hashes.get(f).map(|h| (f.clone(), h.clone())))
        .collect();

    Some(Suggestion::new(
        SuggestionType::Consolidate,
        affected_files,
        format!(
            "{} files contain identical content (sha256 {}); replace duplicates with transclusion to {canonical}",
            members.len(),
            &cluster.sha256[..8.min(cluster.sha256.len())]
        ),
        0.8,
        members.len() as u32,
        operations,
        expected_hashes,
    ))
}

fn split_member(member: &str) -> (String, &str) {
    match member.split_once('#') {
        Some((file, section)) => (file.to_string(), section),
        None => (member.to_string(), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplication::DuplicationReport;

    #[test]
    fn builds_one_suggestion_per_cluster() {
        let report = DuplicationReport {
            exact_duplicates: vec![ExactCluster {
                sha256: "deadbeef".into(),
                members: vec!["b.md#Testing".into(), "a.md#Testing".into()],
            }],
            similar_content: vec![],
            duplicates_found: 2,
        };
        let suggestions = plan(&report, &HashMap::new());
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].operations.len(), 1);
    }
}
