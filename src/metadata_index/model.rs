//! Data model for the metadata index (C3): per-file records and sections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::link_parser::LinkKind;

/// Kind of a link recorded in `FileRecord::outgoing_links`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LinkTargetKind {
    Markdown,
    Transclusion,
    External,
}

impl From<LinkKind> for LinkTargetKind {
    fn from(kind: LinkKind) -> Self {
        match kind {
            LinkKind::Markdown => Self::Markdown,
            LinkKind::Transclusion => Self::Transclusion,
            LinkKind::External => Self::External,
        }
    }
}

/// One outgoing reference from a file, recorded even if its target is broken.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutgoingLink {
    pub target: String,
    pub kind: LinkTargetKind,
    pub source_line: usize,
    pub broken: bool,
}

/// A titled section of a file, with its token count and line range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub level: u8,
    pub start_line: usize,
    pub end_line: usize,
    pub token_count: u64,
}

/// One entry in a file's version history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: u64,
    pub sha256: String,
    pub timestamp: DateTime<Utc>,
    pub author: Option<String>,
}

/// Authoritative record for one bank file, owned by the metadata index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub exists: bool,
    pub size_bytes: u64,
    pub mtime: DateTime<Utc>,
    pub sha256: String,
    pub token_count: u64,
    pub sections: Vec<Section>,
    pub outgoing_links: BTreeSet<OutgoingLink>,
    pub current_version: u64,
    pub version_history: Vec<VersionEntry>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
}

impl FileRecord {
    pub fn new(path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            path: path.into(),
            exists: true,
            size_bytes: 0,
            mtime: now,
            sha256: String::new(),
            token_count: 0,
            sections: Vec::new(),
            outgoing_links: BTreeSet::new(),
            current_version: 0,
            version_history: Vec::new(),
            last_accessed: now,
            access_count: 0,
        }
    }

    pub fn record_version(&mut self, sha256: String, author: Option<String>) {
        let version = self.current_version + 1;
        self.version_history.push(VersionEntry {
            version,
            sha256: sha256.clone(),
            timestamp: Utc::now(),
            author,
        });
        self.current_version = version;
        self.sha256 = sha256;
        self.mtime = Utc::now();
    }

    pub fn record_access(&mut self) {
        self.last_accessed = Utc::now();
        self.access_count += 1;
    }
}

/// Patch applied to a `FileRecord` by `MetadataIndex::update`.
#[derive(Debug, Clone, Default)]
pub struct FileRecordPatch {
    pub size_bytes: Option<u64>,
    pub sha256: Option<String>,
    pub token_count: Option<u64>,
    pub sections: Option<Vec<Section>>,
    pub outgoing_links: Option<BTreeSet<OutgoingLink>>,
    pub exists: Option<bool>,
}
