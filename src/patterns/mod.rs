//! Pattern analyzer (C10): access frequency, co-access pairs, and unused-file
//! detection over the trailing window of the access log.

pub mod log;

use chrono::Utc;
use std::collections::{HashMap, HashSet};

pub use log::{AccessEvent, AccessLog};

#[derive(Debug, Clone)]
pub struct FileAccessStats {
    pub file_name: String,
    pub access_count: usize,
    pub days_since_last_access: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoAccessPair {
    pub a: String,
    pub b: String,
}

#[derive(Debug, Clone)]
pub struct PatternReport {
    pub frequency: Vec<FileAccessStats>,
    pub co_access: HashMap<CoAccessPair, usize>,
    pub unused: Vec<String>,
}

/// Analyze `events` (already windowed to at most N entries by the caller).
/// `known_files` is the full set of files that exist, so files with zero
/// accesses in the window still show up as "unused".
pub fn analyze(events: &[AccessEvent], known_files: &[String], unused_after_days: i64) -> PatternReport {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut last_access: HashMap<&str, chrono::DateTime<Utc>> = HashMap::new();
    let mut by_task: HashMap<&str, Vec<&str>> = HashMap::new();

    for event in events {
        *counts.entry(event.file_name.as_str()).or_insert(0) += 1;
        last_access
            .entry(event.file_name.as_str())
            .and_modify(|t| {
                if event.timestamp > *t {
                    *t = event.timestamp;
                }
            })
            .or_insert(event.timestamp);
        if let Some(task) = &event.task_id {
            by_task.entry(task.as_str()).or_default().push(event.file_name.as_str());
        }
    }

    let now = Utc::now();
    let frequency: Vec<FileAccessStats> = known_files
        .iter()
        .map(|f| {
            let access_count = counts.get(f.as_str()).copied().unwrap_or(0);
            let days_since_last_access = last_access
                .get(f.as_str())
                .map(|t| (now - *t).num_seconds() as f64 / 86_400.0)
                .unwrap_or(f64::INFINITY);
            FileAccessStats {
                file_name: f.clone(),
                access_count,
                days_since_last_access,
            }
        })
        .collect();

    let mut co_access: HashMap<CoAccessPair, usize> = HashMap::new();
    for files in by_task.values() {
        let unique: HashSet<&str> = files.iter().copied().collect();
        let mut unique: Vec<&str> = unique.into_iter().collect();
        unique.sort_unstable();
        for i in 0..unique.len() {
            for j in (i + 1)..unique.len() {
                let pair = CoAccessPair {
                    a: unique[i].to_string(),
                    b: unique[j].to_string(),
                };
                *co_access.entry(pair).or_insert(0) += 1;
            }
        }
    }

    let unused: Vec<String> = frequency
        .iter()
        .filter(|s| s.days_since_last_access >= unused_after_days as f64)
        .map(|s| s.file_name.clone())
        .collect();

    PatternReport {
        frequency,
        co_access,
        unused,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(file: &str, task: Option<&str>, days_ago: i64) -> AccessEvent {
        AccessEvent {
            timestamp: Utc::now() - Duration::days(days_ago),
            file_name: file.to_string(),
            task_id: task.map(|s| s.to_string()),
            operation: "read".to_string(),
        }
    }

    #[test]
    fn counts_frequency_per_file() {
        let events = vec![event("a.md", None, 1), event("a.md", None, 2), event("b.md", None, 1)];
        let known = vec!["a.md".to_string(), "b.md".to_string()];
        let report = analyze(&events, &known, 30);
        let a = report.frequency.iter().find(|s| s.file_name == "a.md").unwrap();
        assert_eq!(a.access_count, 2);
    }

    #[test]
    fn co_access_pairs_share_a_task_id() {
        let events = vec![
            event("a.md", Some("t1"), 1),
            event("b.md", Some("t1"), 1),
            event("c.md", Some("t2"), 1),
        ];
        let known = vec!["a.md".to_string(), "b.md".to_string(), "c.md".to_string()];
        let report = analyze(&events, &known, 30);
        assert_eq!(report.co_access.len(), 1);
    }

    #[test]
    fn files_with_no_recent_access_are_unused() {
        let events = vec![event("a.md", None, 1)];
        let known = vec!["a.md".to_string(), "b.md".to_string()];
        let report = analyze(&events, &known, 30);
        assert!(report.unused.contains(&"b.md".to_string()));
        assert!(!report.unused.contains(&"a.md".to_string()));
    }
}
