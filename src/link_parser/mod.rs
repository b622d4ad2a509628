//! Link parser (C4): pure, stateless extraction of Markdown links,
//! transclusion directives, and bank file references.
//!
//! Grounded on the corpus's compile-once query pattern (`analysis/parser.rs`
//! compiles its tree-sitter queries once via `once_cell::sync::Lazy`); here
//! the "queries" are regexes instead of tree-sitter grammars.

use once_cell::sync::Lazy;
use regex::Regex;

/// Canonical memory bank file names recognized as bank references.
pub const CANONICAL_BANK_FILES: [&str; 6] = [
    "projectBrief",
    "productContext",
    "techContext",
    "systemPatterns",
    "activeContext",
    "progress",
];

const EXTERNAL_PROTOCOLS: [&str; 4] = ["http://", "https://", "mailto:", "file://"];

/// Kind of a parsed link target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Markdown,
    Transclusion,
    External,
}

/// A single extracted reference, with the line it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub kind: LinkKind,
    pub target: String,
    pub anchor: Option<String>,
    pub source_line: usize,
    pub options: Vec<(String, TransclusionOption)>,
}

/// A parsed transclusion option value.
#[derive(Debug, Clone, PartialEq)]
pub enum TransclusionOption {
    Bool(bool),
    Number(f64),
    Text(String),
}

static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\(([^)#\s]+)(#([^)\s]+))?\)").unwrap());
static TRANSCLUSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{include:\s*([^|}]+?)\s*((?:\|[^|}]+)*)\}\}").unwrap());

/// Extract every link, transclusion directive, and bank reference from `text`.
pub fn parse(text: &str) -> Vec<Link> {
    let mut links = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        for cap in MARKDOWN_LINK.captures_iter(line) {
            let target = cap.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
            if is_external(&target) {
                links.push(Link {
                    kind: LinkKind::External,
                    target,
                    anchor: None,
                    source_line: line_no,
                    options: Vec::new(),
                });
                continue;
            }
            let anchor = cap.get(4).map(|m| m.as_str().to_string());
            links.push(Link {
                kind: LinkKind::Markdown,
                target,
                anchor,
                source_line: line_no,
                options: Vec::new(),
            });
        }
        for cap in TRANSCLUSION.captures_iter(line) {
            let target = cap
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            let options = cap
                .get(2)
                .map(|m| parse_options(m.as_str()))
                .unwrap_or_default();
            links.push(Link {
                kind: LinkKind::Transclusion,
                target,
                anchor: None,
                source_line: line_no,
                options,
            });
        }
    }
    links
}

fn is_external(target: &str) -> bool {
    let lower = target.to_lowercase();
    EXTERNAL_PROTOCOLS.iter().any(|p| lower.starts_with(p))
}

fn parse_options(raw: &str) -> Vec<(String, TransclusionOption)> {
    raw.split('|')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.trim().to_string();
            let value = parts.next().unwrap_or("").trim();
            Some((key.clone(), parse_option_value(&key, value)))
        })
        .collect()
}

fn parse_option_value(key: &str, value: &str) -> TransclusionOption {
    if key == "strip_header" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
        || value == "1"
    {
        if matches!(value.to_lowercase().as_str(), "true" | "yes" | "1") {
            return TransclusionOption::Bool(true);
        }
    }
    if matches!(value.to_lowercase().as_str(), "false" | "no" | "0") {
        return TransclusionOption::Bool(false);
    }
    if let Ok(n) = value.parse::<f64>() {
        return TransclusionOption::Number(n);
    }
    TransclusionOption::Text(value.to_string())
}

/// True if `target` matches one of the canonical bank file names (ignoring extension).
pub fn is_canonical_bank_reference(target: &str) -> bool {
    let stem = target.trim_end_matches(".md");
    CANONICAL_BANK_FILES.contains(&stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_markdown_link_with_anchor() {
        let links = parse("see [context](techContext.md#setup) for details");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind, LinkKind::Markdown);
        assert_eq!(links[0].target, "techContext.md");
        assert_eq!(links[0].anchor.as_deref(), Some("setup"));
    }

    #[test]
    fn external_links_are_tagged_and_not_markdown() {
        let links = parse("[docs](https://example.com/docs)");
        assert_eq!(links[0].kind, LinkKind::External);
    }

    #[test]
    fn transclusion_options_parse_bool_and_number() {
        let links = parse("{{include: systemPatterns.md|strip_header=true|level=2}}");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind, LinkKind::Transclusion);
        assert_eq!(links[0].target, "systemPatterns.md");
        let opts: std::collections::HashMap<_, _> = links[0].options.iter().cloned().collect();
        assert_eq!(opts.get("strip_header"), Some(&TransclusionOption::Bool(true)));
        assert_eq!(opts.get("level"), Some(&TransclusionOption::Number(2.0)));
    }

    #[test]
    fn source_line_numbers_are_one_indexed() {
        let links = parse("line one\n[a](b.md)\nline three");
        assert_eq!(links[0].source_line, 2);
    }

    #[test]
    fn recognizes_canonical_bank_file_names() {
        assert!(is_canonical_bank_reference("techContext.md"));
        assert!(!is_canonical_bank_reference("randomFile.md"));
    }
}
